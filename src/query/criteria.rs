use bson::{Bson, Document, doc};
use std::sync::Arc;

use super::geo_criteria::{GeoFieldCriteria, LegacyGeoCriteria};
use super::operator::FilterOperator;
use crate::errors::OdmError;
use crate::mapping::{EntityModel, Mapper};

/// What a criteria tree renders against: the mapper, the bound type and
/// whether unknown field paths are errors.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub mapper: &'a Mapper,
    pub model: &'a Arc<EntityModel>,
    pub validate: bool,
}

impl RenderContext<'_> {
    /// # Errors
    /// Returns `InvalidFieldPath` when the path does not resolve.
    pub fn resolve(&self, path: &str) -> Result<String, OdmError> {
        Ok(self.mapper.resolve_field_path(self.model, path, self.validate)?.path)
    }
}

/// True for `{ "$op": ... }` documents.
pub(crate) fn is_operator_doc(d: &Document) -> bool {
    !d.is_empty() && !d.contains_key("$ref") && d.keys().all(|k| k.starts_with('$'))
}

/// Writes `{path: fragment}`, merging into an operator document already
/// stored under `path`. Same-token entries are replaced.
pub(crate) fn put_operator(target: &mut Document, path: &str, fragment: Document) {
    if let Some(Bson::Document(existing)) = target.get_mut(path)
        && is_operator_doc(existing)
    {
        for (k, v) in fragment {
            existing.insert(k, v);
        }
        return;
    }
    target.insert(path, fragment);
}

/// A single `field <op> value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCriteria {
    path: String,
    operator: FilterOperator,
    value: Bson,
    not: bool,
}

impl FieldCriteria {
    /// # Errors
    /// Returns `OperatorValueMismatch` when `value` cannot be used with
    /// `operator`, including any geo operator.
    pub fn new(path: impl Into<String>, operator: FilterOperator, value: impl Into<Bson>) -> Result<Self, OdmError> {
        let value = value.into();
        check_value(operator, &value)?;
        Ok(Self { path: path.into(), operator, value, not: false })
    }

    /// Wraps the condition in `$not` (equality becomes `$ne`).
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.not = !self.not;
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn operator(&self) -> FilterOperator {
        self.operator
    }

    #[must_use]
    pub const fn value(&self) -> &Bson {
        &self.value
    }

    #[must_use]
    pub const fn is_negated(&self) -> bool {
        self.not
    }

    fn fragment(&self) -> Document {
        let inner = match (self.operator, &self.value) {
            (FilterOperator::Equal, v) if self.not => return doc! { "$ne": v.clone() },
            (FilterOperator::Regex, Bson::Document(d)) => d.clone(),
            (FilterOperator::Not, v) => doc! { "$not": v.clone() },
            (op, v) => doc! { op.token(): v.clone() },
        };
        if self.not { doc! { "$not": inner } } else { inner }
    }

    /// Writes the condition into `target`. Equality writes the bare value and
    /// replaces anything stored under the field; every other operator merges
    /// into the field's operator document.
    ///
    /// # Errors
    /// Returns `InvalidFieldPath` when the path does not resolve.
    pub fn add_to(&self, target: &mut Document, ctx: &RenderContext<'_>) -> Result<(), OdmError> {
        let path = ctx.resolve(&self.path)?;
        if self.operator == FilterOperator::Equal && !self.not {
            target.insert(path, self.value.clone());
        } else {
            put_operator(target, &path, self.fragment());
        }
        Ok(())
    }
}

fn mismatch(operator: FilterOperator, expected: &'static str) -> OdmError {
    OdmError::OperatorValueMismatch { operator: operator.token().to_string(), expected }
}

fn is_number(v: &Bson) -> bool {
    matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn check_value(operator: FilterOperator, value: &Bson) -> Result<(), OdmError> {
    use FilterOperator as Op;
    let ok = match operator {
        Op::In | Op::NotIn | Op::All => {
            if matches!(value, Bson::Array(_)) { true } else { return Err(mismatch(operator, "an array")) }
        }
        Op::Size => matches!(value, Bson::Int32(_) | Bson::Int64(_)),
        Op::Exists => matches!(value, Bson::Boolean(_)),
        Op::Mod => matches!(value, Bson::Array(a) if a.len() == 2 && a.iter().all(is_number)),
        Op::ElementMatch | Op::Not => matches!(value, Bson::Document(_)),
        Op::Type => matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::String(_)),
        Op::Regex => match value {
            Bson::String(_) => true,
            Bson::Document(d) => d.contains_key("$regex"),
            _ => false,
        },
        Op::Where => return Err(mismatch(operator, "a top-level JavaScript expression")),
        op if op.is_geo() => return Err(mismatch(operator, "a geometry")),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(mismatch(operator, expected_for(operator)))
    }
}

const fn expected_for(operator: FilterOperator) -> &'static str {
    match operator {
        FilterOperator::Size => "an integer",
        FilterOperator::Exists => "a boolean",
        FilterOperator::Mod => "[divisor, remainder]",
        FilterOperator::ElementMatch | FilterOperator::Not => "a document",
        FilterOperator::Type => "a type number or alias",
        FilterOperator::Regex => "a pattern",
        _ => "a value",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaJoin {
    And,
    Or,
    Nor,
}

impl CriteriaJoin {
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::And => "$and",
            Self::Or => "$or",
            Self::Nor => "$nor",
        }
    }
}

/// Child criteria joined by AND, OR or NOR.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaContainer {
    join: CriteriaJoin,
    children: Vec<Criteria>,
}

impl CriteriaContainer {
    #[must_use]
    pub const fn new(join: CriteriaJoin) -> Self {
        Self { join, children: Vec::new() }
    }

    pub fn add(&mut self, criteria: Criteria) {
        self.children.push(criteria);
    }

    #[must_use]
    pub const fn join(&self) -> CriteriaJoin {
        self.join
    }

    #[must_use]
    pub fn children(&self) -> &[Criteria] {
        &self.children
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn render_children(&self, ctx: &RenderContext<'_>) -> Result<Vec<Document>, OdmError> {
        self.children.iter().map(|c| c.render(ctx)).collect()
    }

    /// Renders the container as a whole filter. An AND container is written
    /// flat while its children touch distinct fields (or combinable operator
    /// documents), and as `$and: [...]` otherwise.
    ///
    /// # Errors
    /// Returns the first error raised by a child, or `EmptyCriteriaGroup`
    /// for an empty OR/NOR container.
    pub fn render_root(&self, ctx: &RenderContext<'_>) -> Result<Document, OdmError> {
        if self.join != CriteriaJoin::And {
            let mut out = Document::new();
            self.add_to(&mut out, ctx)?;
            return Ok(out);
        }
        let parts: Vec<Document> = self.render_children(ctx)?.into_iter().filter(|d| !d.is_empty()).collect();
        Ok(match flatten(&parts) {
            Some(flat) => flat,
            None => doc! { "$and": parts.into_iter().map(Bson::Document).collect::<Vec<_>>() },
        })
    }

    /// Writes `{$and|$or|$nor: [child, ...]}` into `target`; an empty AND
    /// container writes nothing.
    ///
    /// # Errors
    /// Returns `EmptyCriteriaGroup` for an empty OR/NOR container.
    pub fn add_to(&self, target: &mut Document, ctx: &RenderContext<'_>) -> Result<(), OdmError> {
        if self.children.is_empty() {
            return match self.join {
                CriteriaJoin::And => Ok(()),
                join => Err(OdmError::EmptyCriteriaGroup(join.token())),
            };
        }
        let parts = self.render_children(ctx)?;
        target.insert(self.join.token(), parts.into_iter().map(Bson::Document).collect::<Vec<_>>());
        Ok(())
    }
}

/// Merges rendered siblings into one document, or `None` when two of them
/// constrain the same field in ways a single document cannot hold.
fn flatten(parts: &[Document]) -> Option<Document> {
    let mut acc = Document::new();
    for part in parts {
        for (k, v) in part {
            if !acc.contains_key(k) {
                acc.insert(k.clone(), v.clone());
                continue;
            }
            match (acc.get_mut(k), v) {
                (Some(Bson::Document(have)), Bson::Document(add))
                    if is_operator_doc(have)
                        && is_operator_doc(add)
                        && add.keys().all(|op| !have.contains_key(op)) =>
                {
                    for (op, val) in add {
                        have.insert(op.clone(), val.clone());
                    }
                }
                _ => return None,
            }
        }
    }
    Some(acc)
}

/// A node of the filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    Field(FieldCriteria),
    Geo(GeoFieldCriteria),
    LegacyGeo(LegacyGeoCriteria),
    Group(CriteriaContainer),
    Text { search: String, language: Option<String> },
    Where(String),
}

impl Criteria {
    #[must_use]
    pub fn and(children: impl IntoIterator<Item = Self>) -> Self {
        Self::group(CriteriaJoin::And, children)
    }

    /// # Errors
    /// Returns `EmptyCriteriaGroup` when `children` is empty.
    pub fn or(children: impl IntoIterator<Item = Self>) -> Result<Self, OdmError> {
        Self::non_empty(CriteriaJoin::Or, children)
    }

    /// # Errors
    /// Returns `EmptyCriteriaGroup` when `children` is empty.
    pub fn nor(children: impl IntoIterator<Item = Self>) -> Result<Self, OdmError> {
        Self::non_empty(CriteriaJoin::Nor, children)
    }

    fn non_empty(join: CriteriaJoin, children: impl IntoIterator<Item = Self>) -> Result<Self, OdmError> {
        let group = Self::group(join, children);
        match &group {
            Self::Group(c) if c.is_empty() => Err(OdmError::EmptyCriteriaGroup(join.token())),
            _ => Ok(group),
        }
    }

    fn group(join: CriteriaJoin, children: impl IntoIterator<Item = Self>) -> Self {
        let mut container = CriteriaContainer::new(join);
        for c in children {
            container.add(c);
        }
        Self::Group(container)
    }

    /// # Errors
    /// Propagates path resolution and geometry encoding errors.
    pub fn add_to(&self, target: &mut Document, ctx: &RenderContext<'_>) -> Result<(), OdmError> {
        match self {
            Self::Field(c) => c.add_to(target, ctx),
            Self::Geo(c) => c.add_to(target, ctx),
            Self::LegacyGeo(c) => c.add_to(target, ctx),
            Self::Group(c) => c.add_to(target, ctx),
            Self::Text { search, language } => {
                let mut text = doc! { "$search": search.clone() };
                if let Some(lang) = language {
                    text.insert("$language", lang.clone());
                }
                target.insert("$text", text);
                Ok(())
            }
            Self::Where(js) => {
                target.insert("$where", Bson::JavaScriptCode(js.clone()));
                Ok(())
            }
        }
    }

    /// Renders this node on its own.
    ///
    /// # Errors
    /// See [`Criteria::add_to`].
    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<Document, OdmError> {
        let mut out = Document::new();
        self.add_to(&mut out, ctx)?;
        Ok(out)
    }
}

impl From<FieldCriteria> for Criteria {
    fn from(c: FieldCriteria) -> Self {
        Self::Field(c)
    }
}
