use bson::{Bson, Document, doc};
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::numeric::{negate, numeric_operand};
use super::push_options::PushOptions;
use crate::errors::OdmError;
use crate::logger::QUERY_TARGET;
use crate::mapping::{EncodedValue, EntityModel, Mapped, Mapper, ResolvedPath};

/// Update operator tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOperator {
    Set,
    SetOnInsert,
    Unset,
    Inc,
    Max,
    Min,
    Push,
    AddToSet,
    Pop,
    Pull,
    PullAll,
}

impl UpdateOperator {
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Set => "$set",
            Self::SetOnInsert => "$setOnInsert",
            Self::Unset => "$unset",
            Self::Inc => "$inc",
            Self::Max => "$max",
            Self::Min => "$min",
            Self::Push => "$push",
            Self::AddToSet => "$addToSet",
            Self::Pop => "$pop",
            Self::Pull => "$pull",
            Self::PullAll => "$pullAll",
        }
    }
}

impl fmt::Display for UpdateOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    /// Annotated for its target field at render.
    Value(EncodedValue),
    /// Numbers and markers written as they are.
    Literal(Bson),
    /// `{$each: [...]}` plus push modifiers.
    Each(Vec<EncodedValue>, PushOptions),
    /// A plain array of encoded values (`$pullAll`).
    List(Vec<EncodedValue>),
}

impl Operand {
    fn render(&self, mapper: &Mapper, target: &ResolvedPath) -> Bson {
        let annotate_all = |values: &[EncodedValue]| -> Vec<Bson> {
            values.iter().map(|v| mapper.annotate(v, target)).collect()
        };
        match self {
            Self::Value(v) => mapper.annotate(v, target),
            Self::Literal(b) => b.clone(),
            Self::Each(values, options) => {
                let mut each = doc! { "$each": annotate_all(values) };
                options.write_to(&mut each);
                Bson::Document(each)
            }
            Self::List(values) => Bson::Array(annotate_all(values)),
        }
    }
}

/// Field-level update directives for entities of type `T`, grouped by
/// update operator.
///
/// Writing the same path under the same operator again replaces the earlier
/// value. Methods taking a value encode it immediately and fail fast on
/// values the operator cannot take, and on paths addressing inside a
/// reference field.
pub struct UpdateOperations<T> {
    mapper: Arc<Mapper>,
    model: Arc<EntityModel>,
    ops: Vec<(UpdateOperator, Vec<(String, Operand)>)>,
    deferred: Option<OdmError>,
    validate: bool,
    isolated: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for UpdateOperations<T> {
    fn clone(&self) -> Self {
        Self {
            mapper: Arc::clone(&self.mapper),
            model: Arc::clone(&self.model),
            ops: self.ops.clone(),
            deferred: self.deferred.clone(),
            validate: self.validate,
            isolated: self.isolated,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for UpdateOperations<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateOperations")
            .field("type", &self.model.name)
            .field("ops", &self.ops)
            .field("validate", &self.validate)
            .field("isolated", &self.isolated)
            .finish_non_exhaustive()
    }
}

impl<T: Mapped> UpdateOperations<T> {
    #[must_use]
    pub fn new(mapper: Arc<Mapper>, validate: bool) -> Self {
        let model = mapper.model::<T>();
        Self { mapper, model, ops: Vec::new(), deferred: None, validate, isolated: false, _marker: PhantomData }
    }

    fn check_path(&self, path: &str) -> Result<(), OdmError> {
        self.mapper.check_reference_path(&self.model, path)
    }

    /// Paths through a reference are recorded and reported by `to_document`.
    fn put(mut self, op: UpdateOperator, path: &str, operand: Operand) -> Self {
        if let Err(e) = self.check_path(path) {
            self.deferred.get_or_insert(e);
            return self;
        }
        let entries = match self.ops.iter().position(|(o, _)| *o == op) {
            Some(i) => &mut self.ops[i].1,
            None => {
                self.ops.push((op, Vec::new()));
                let last = self.ops.len() - 1;
                &mut self.ops[last].1
            }
        };
        match entries.iter_mut().find(|(p, _)| p == path) {
            Some(slot) => slot.1 = operand,
            None => entries.push((path.to_string(), operand)),
        }
        self
    }

    fn encode<V: Serialize + ?Sized>(&self, value: &V) -> Result<EncodedValue, OdmError> {
        self.mapper.encode_value(value)
    }

    fn encode_all<V: Serialize>(&self, values: impl IntoIterator<Item = V>) -> Result<Vec<EncodedValue>, OdmError> {
        values.into_iter().map(|v| self.encode(&v)).collect()
    }

    fn number<V: Serialize + ?Sized>(&self, op: UpdateOperator, value: &V) -> Result<Bson, OdmError> {
        numeric_operand(op.token(), self.encode(value)?.value)
    }

    /// # Errors
    /// Returns an error when `value` cannot be encoded.
    pub fn set<V: Serialize + ?Sized>(self, path: &str, value: &V) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let v = self.encode(value)?;
        Ok(self.put(UpdateOperator::Set, path, Operand::Value(v)))
    }

    /// Applied only when an upsert inserts the document.
    ///
    /// # Errors
    /// Returns an error when `value` cannot be encoded.
    pub fn set_on_insert<V: Serialize + ?Sized>(self, path: &str, value: &V) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let v = self.encode(value)?;
        Ok(self.put(UpdateOperator::SetOnInsert, path, Operand::Value(v)))
    }

    #[must_use]
    pub fn unset(self, path: &str) -> Self {
        self.put(UpdateOperator::Unset, path, Operand::Literal(Bson::Int32(1)))
    }

    /// Increments by one.
    #[must_use]
    pub fn inc(self, path: &str) -> Self {
        self.put(UpdateOperator::Inc, path, Operand::Literal(Bson::Int32(1)))
    }

    /// # Errors
    /// Returns `IllegalArgument` unless `value` encodes to Int32, Int64 or Double.
    pub fn inc_by<V: Serialize + ?Sized>(self, path: &str, value: &V) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let n = self.number(UpdateOperator::Inc, value)?;
        Ok(self.put(UpdateOperator::Inc, path, Operand::Literal(n)))
    }

    /// Decrements by one.
    #[must_use]
    pub fn dec(self, path: &str) -> Self {
        self.put(UpdateOperator::Inc, path, Operand::Literal(Bson::Int32(-1)))
    }

    /// `$inc` by the negated value.
    ///
    /// # Errors
    /// Returns `IllegalArgument` for non-numeric values and for `i64::MIN`.
    pub fn dec_by<V: Serialize + ?Sized>(self, path: &str, value: &V) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let n = negate(self.number(UpdateOperator::Inc, value)?)?;
        Ok(self.put(UpdateOperator::Inc, path, Operand::Literal(n)))
    }

    /// Keeps the larger of the stored and given value.
    ///
    /// # Errors
    /// Returns `IllegalArgument` unless `value` encodes to Int32, Int64 or Double.
    pub fn max<V: Serialize + ?Sized>(self, path: &str, value: &V) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let n = self.number(UpdateOperator::Max, value)?;
        Ok(self.put(UpdateOperator::Max, path, Operand::Literal(n)))
    }

    /// Keeps the smaller of the stored and given value.
    ///
    /// # Errors
    /// Returns `IllegalArgument` unless `value` encodes to Int32, Int64 or Double.
    pub fn min<V: Serialize + ?Sized>(self, path: &str, value: &V) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let n = self.number(UpdateOperator::Min, value)?;
        Ok(self.put(UpdateOperator::Min, path, Operand::Literal(n)))
    }

    /// Appends `value`; with `add_dups` false the append is skipped when the
    /// array already holds it (`$addToSet`), otherwise it always happens
    /// (`$push`).
    ///
    /// # Errors
    /// Returns an error when `value` cannot be encoded.
    pub fn add<V: Serialize + ?Sized>(self, path: &str, value: &V, add_dups: bool) -> Result<Self, OdmError> {
        if add_dups { self.push(path, value) } else { self.add_to_set(path, value) }
    }

    /// List form of [`UpdateOperations::add`].
    ///
    /// # Errors
    /// Returns an error when a value cannot be encoded.
    pub fn add_all<V: Serialize>(
        self,
        path: &str,
        values: impl IntoIterator<Item = V>,
        add_dups: bool,
    ) -> Result<Self, OdmError> {
        if add_dups { self.push_all(path, values) } else { self.add_to_set_all(path, values) }
    }

    /// # Errors
    /// Returns an error when `value` cannot be encoded.
    pub fn add_to_set<V: Serialize + ?Sized>(self, path: &str, value: &V) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let v = self.encode(value)?;
        Ok(self.put(UpdateOperator::AddToSet, path, Operand::Value(v)))
    }

    /// `$addToSet` with `$each`.
    ///
    /// # Errors
    /// Returns an error when a value cannot be encoded.
    pub fn add_to_set_all<V: Serialize>(self, path: &str, values: impl IntoIterator<Item = V>) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let vs = self.encode_all(values)?;
        Ok(self.put(UpdateOperator::AddToSet, path, Operand::Each(vs, PushOptions::default())))
    }

    /// # Errors
    /// Returns an error when `value` cannot be encoded.
    pub fn push<V: Serialize + ?Sized>(self, path: &str, value: &V) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let v = self.encode(value)?;
        Ok(self.put(UpdateOperator::Push, path, Operand::Value(v)))
    }

    /// # Errors
    /// Returns an error when a value cannot be encoded.
    pub fn push_all<V: Serialize>(self, path: &str, values: impl IntoIterator<Item = V>) -> Result<Self, OdmError> {
        self.push_all_with(path, values, PushOptions::default())
    }

    /// Single value with `$position` / `$slice` / `$sort` modifiers.
    ///
    /// # Errors
    /// Returns an error when `value` cannot be encoded.
    pub fn push_with<V: Serialize + ?Sized>(self, path: &str, value: &V, options: PushOptions) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let v = self.encode(value)?;
        Ok(self.put(UpdateOperator::Push, path, Operand::Each(vec![v], options)))
    }

    /// # Errors
    /// Returns an error when a value cannot be encoded.
    pub fn push_all_with<V: Serialize>(
        self,
        path: &str,
        values: impl IntoIterator<Item = V>,
        options: PushOptions,
    ) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let vs = self.encode_all(values)?;
        Ok(self.put(UpdateOperator::Push, path, Operand::Each(vs, options)))
    }

    /// `$pop: -1`.
    #[must_use]
    pub fn remove_first(self, path: &str) -> Self {
        self.put(UpdateOperator::Pop, path, Operand::Literal(Bson::Int32(-1)))
    }

    /// `$pop: 1`.
    #[must_use]
    pub fn remove_last(self, path: &str) -> Self {
        self.put(UpdateOperator::Pop, path, Operand::Literal(Bson::Int32(1)))
    }

    /// `$pull`: removes every element equal to `value`.
    ///
    /// # Errors
    /// Returns an error when `value` cannot be encoded.
    pub fn remove_all<V: Serialize + ?Sized>(self, path: &str, value: &V) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let v = self.encode(value)?;
        Ok(self.put(UpdateOperator::Pull, path, Operand::Value(v)))
    }

    /// `$pullAll`: removes every element equal to any of `values`.
    ///
    /// # Errors
    /// Returns an error when a value cannot be encoded.
    pub fn remove_all_values<V: Serialize>(self, path: &str, values: impl IntoIterator<Item = V>) -> Result<Self, OdmError> {
        self.check_path(path)?;
        let vs = self.encode_all(values)?;
        Ok(self.put(UpdateOperator::PullAll, path, Operand::List(vs)))
    }

    /// Adds `$isolated: true` to the rendered update.
    #[must_use]
    pub const fn isolated(mut self) -> Self {
        self.isolated = true;
        self
    }

    #[must_use]
    pub const fn is_isolated(&self) -> bool {
        self.isolated
    }

    /// Paths not present on `T` are accepted. Operand checks still run.
    #[must_use]
    pub const fn disable_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    #[must_use]
    pub const fn enable_validation(mut self) -> Self {
        self.validate = true;
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Renders `{op: {path: value}, ...}` in the order operators were first
    /// used.
    ///
    /// # Errors
    /// Returns the first path error recorded by an infallible call,
    /// `InvalidFieldPath` for unknown paths while validating, and
    /// `ConflictingUpdate` when one path (or a path and its parent) appears
    /// under two different operators.
    pub fn to_document(&self) -> Result<Document, OdmError> {
        if let Some(e) = &self.deferred {
            return Err(e.clone());
        }
        let mut out = Document::new();
        let mut written: Vec<(String, UpdateOperator)> = Vec::new();
        for (op, entries) in &self.ops {
            let mut fields = Document::new();
            for (path, operand) in entries {
                let resolved = self.mapper.resolve_field_path(&self.model, path, self.validate)?;
                self.check_conflict(&written, &resolved.path, *op)?;
                fields.insert(resolved.path.clone(), operand.render(&self.mapper, &resolved));
                written.push((resolved.path, *op));
            }
            out.insert(op.token(), fields);
        }
        if self.isolated {
            out.insert("$isolated", true);
        }
        log::debug!(target: QUERY_TARGET, "{} update {out}", self.model.name);
        Ok(out)
    }

    fn check_conflict(&self, written: &[(String, UpdateOperator)], path: &str, op: UpdateOperator) -> Result<(), OdmError> {
        let class_key = self.mapper.class_name_key();
        if path.rsplit('.').next() == Some(class_key) {
            return Ok(());
        }
        let overlaps = |a: &str, b: &str| {
            a == b || a.strip_prefix(b).is_some_and(|r| r.starts_with('.')) || b.strip_prefix(a).is_some_and(|r| r.starts_with('.'))
        };
        match written.iter().find(|(p, o)| *o != op && overlaps(p, path)) {
            Some((p, o)) => Err(OdmError::ConflictingUpdate {
                path: if p.len() <= path.len() { p.clone() } else { path.to_string() },
                first: o.token().to_string(),
                second: op.token().to_string(),
            }),
            None => Ok(()),
        }
    }
}
