use bson::{Bson, Document};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::criteria::{Criteria, CriteriaContainer, CriteriaJoin, FieldCriteria, RenderContext};
use super::field_end::{CriteriaSink, Detached, FieldEnd};
use super::geo_criteria::condition_criteria;
use super::operator::parse_condition;
use super::options::{Sort, parse_order, render_projection, render_sort};
use crate::collection::{Collation, Collection, CountOptions, Cursor, FindOptions};
use crate::datastore::Datastore;
use crate::errors::OdmError;
use crate::logger::QUERY_TARGET;
use crate::mapping::{Entity, EntityModel, Key};

/// A filter over the entities of type `T`, plus sort, projection and paging.
///
/// Fluent calls consume and return the query; rendering and execution take
/// `&self` and never change it, so a query can be run any number of times.
/// Errors from fluent calls are recorded and reported by the next render.
pub struct Query<T> {
    datastore: Datastore,
    model: Arc<EntityModel>,
    root: CriteriaContainer,
    deferred: Option<OdmError>,
    projection: Vec<(String, bool)>,
    sort: Vec<Sort>,
    skip: Option<u64>,
    limit: Option<u64>,
    batch_size: Option<u32>,
    max_time_ms: Option<u64>,
    collation: Option<Collation>,
    validate: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            datastore: self.datastore.clone(),
            model: Arc::clone(&self.model),
            root: self.root.clone(),
            deferred: self.deferred.clone(),
            projection: self.projection.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
            batch_size: self.batch_size,
            max_time_ms: self.max_time_ms,
            collation: self.collation.clone(),
            validate: self.validate,
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> Query<T> {
    #[must_use]
    pub fn new(datastore: &Datastore) -> Self {
        Self {
            datastore: datastore.clone(),
            model: datastore.mapper().model::<T>(),
            root: CriteriaContainer::new(CriteriaJoin::And),
            deferred: None,
            projection: Vec::new(),
            sort: Vec::new(),
            skip: None,
            limit: None,
            batch_size: None,
            max_time_ms: datastore.options().default_max_time_ms,
            collation: None,
            validate: datastore.options().validate_queries,
            _marker: PhantomData,
        }
    }

    fn defer(&mut self, e: OdmError) {
        log::debug!(target: QUERY_TARGET, "{}: deferred query error: {e}", self.model.name);
        if self.deferred.is_none() {
            self.deferred = Some(e);
        }
    }

    /// Paths addressing inside a reference field are recorded as errors
    /// here, before any operator is attached.
    pub fn field(mut self, path: &str) -> FieldEnd<Self> {
        let checked = self.datastore.mapper().check_reference_path(&self.model, path);
        if let Err(e) = checked {
            self.defer(e);
        }
        FieldEnd::new(self, path)
    }

    /// A criteria for `and`/`or`/`nor`, not yet attached to this query.
    #[must_use]
    pub fn criteria(&self, path: &str) -> FieldEnd<Detached> {
        FieldEnd::new(Detached, path)
    }

    /// Legacy condition strings: `"age >"`, `"age>="`, `"tags in"`, `"name"`.
    /// Geo words (`"loc near"`, `"loc geoWithin"`) take an `[x, y]` pair or
    /// a GeoJSON document.
    #[must_use]
    pub fn filter(mut self, condition: &str, value: impl Into<Bson>) -> Self {
        let built = parse_condition(condition).and_then(|(path, op)| {
            self.datastore.mapper().check_reference_path(&self.model, &path)?;
            let value = value.into();
            if op.is_geo() {
                condition_criteria(path, op, value)
            } else {
                FieldCriteria::new(path, op, value).map(Criteria::Field)
            }
        });
        match built {
            Ok(c) => self.root.add(c),
            Err(e) => self.defer(e),
        }
        self
    }

    #[must_use]
    pub fn add(mut self, criteria: Criteria) -> Self {
        self.root.add(criteria);
        self
    }

    #[must_use]
    pub fn and(self, criteria: impl IntoIterator<Item = Criteria>) -> Self {
        self.add(Criteria::and(criteria))
    }

    /// An empty group is recorded as `EmptyCriteriaGroup`.
    #[must_use]
    pub fn or(mut self, criteria: impl IntoIterator<Item = Criteria>) -> Self {
        match Criteria::or(criteria) {
            Ok(c) => self.root.add(c),
            Err(e) => self.defer(e),
        }
        self
    }

    /// An empty group is recorded as `EmptyCriteriaGroup`.
    #[must_use]
    pub fn nor(mut self, criteria: impl IntoIterator<Item = Criteria>) -> Self {
        match Criteria::nor(criteria) {
            Ok(c) => self.root.add(c),
            Err(e) => self.defer(e),
        }
        self
    }

    /// `$text` search.
    #[must_use]
    pub fn search(self, text: &str) -> Self {
        self.add(Criteria::Text { search: text.to_string(), language: None })
    }

    #[must_use]
    pub fn search_with_language(self, text: &str, language: &str) -> Self {
        self.add(Criteria::Text { search: text.to_string(), language: Some(language.to_string()) })
    }

    #[must_use]
    pub fn where_js(self, js: &str) -> Self {
        self.add(Criteria::Where(js.to_string()))
    }

    /// `"-age, name"`: comma separated, `-` for descending. Replaces any
    /// previous sort.
    #[must_use]
    pub fn order(mut self, order: &str) -> Self {
        match parse_order(order) {
            Ok(s) => self.sort = s,
            Err(e) => self.defer(e),
        }
        self
    }

    /// Appends a sort key.
    #[must_use]
    pub fn order_by(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    #[must_use]
    pub fn project(mut self, path: &str, include: bool) -> Self {
        self.projection.push((path.to_string(), include));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub const fn offset(self, offset: u64) -> Self {
        self.skip(offset)
    }

    #[must_use]
    pub const fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = Some(size);
        self
    }

    #[must_use]
    pub const fn max_time_ms(mut self, ms: u64) -> Self {
        self.max_time_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn collation(mut self, collation: Collation) -> Self {
        self.collation = Some(collation);
        self
    }

    /// Field paths that do not exist on `T` pass through unchecked.
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
    pub const fn is_validating(&self) -> bool {
        self.validate
    }

    #[must_use]
    pub fn model(&self) -> &EntityModel {
        &self.model
    }

    fn context(&self) -> RenderContext<'_> {
        RenderContext { mapper: self.datastore.mapper(), model: &self.model, validate: self.validate }
    }

    /// Renders the filter document.
    ///
    /// # Errors
    /// Returns the first error recorded by a fluent call, or any path or
    /// encoding error raised while rendering.
    pub fn to_filter(&self) -> Result<Document, OdmError> {
        if let Some(e) = &self.deferred {
            return Err(e.clone());
        }
        let filter = self.root.render_root(&self.context())?;
        log::debug!(target: QUERY_TARGET, "{} filter {filter}", self.model.name);
        Ok(filter)
    }

    /// # Errors
    /// Returns `InvalidFieldPath` when a sort path does not resolve.
    pub fn to_sort(&self) -> Result<Option<Document>, OdmError> {
        render_sort(&self.sort, &self.context())
    }

    /// # Errors
    /// Returns an error for an invalid or mixed projection.
    pub fn to_projection(&self) -> Result<Option<Document>, OdmError> {
        render_projection(&self.projection, &self.context())
    }

    /// # Errors
    /// See [`Query::to_sort`] and [`Query::to_projection`].
    pub fn find_options(&self) -> Result<FindOptions, OdmError> {
        Ok(FindOptions {
            projection: self.to_projection()?,
            sort: self.to_sort()?,
            skip: self.skip,
            limit: self.limit,
            batch_size: self.batch_size,
            collation: self.collation.clone(),
            max_time_ms: self.max_time_ms,
        })
    }

    pub(crate) fn collection(&self) -> Arc<dyn Collection> {
        self.datastore.storage().collection(&self.model.collection)
    }

    fn cursor(&self, options: &FindOptions) -> Result<Cursor, OdmError> {
        let filter = self.to_filter()?;
        Ok(self.collection().find(&filter, options)?)
    }

    /// First match, honoring sort and skip.
    ///
    /// # Errors
    /// Returns render, storage or decoding errors.
    pub fn get(&self) -> Result<Option<T>, OdmError> {
        let options = FindOptions { limit: Some(1), ..self.find_options()? };
        self.cursor(&options)?
            .next()
            .map(|d| self.datastore.mapper().to_entity::<T>(d))
            .transpose()
    }

    /// # Errors
    /// Returns render, storage or decoding errors.
    pub fn as_list(&self) -> Result<Vec<T>, OdmError> {
        self.iter()?.collect()
    }

    /// Streams decoded entities.
    ///
    /// # Errors
    /// Returns render or storage errors; decoding errors surface per item.
    pub fn iter(&self) -> Result<EntityIter<T>, OdmError> {
        let cursor = self.cursor(&self.find_options()?)?;
        Ok(EntityIter { cursor, datastore: self.datastore.clone(), _marker: PhantomData })
    }

    /// Keys of the matching entities, fetching only their ids.
    ///
    /// # Errors
    /// Returns render or storage errors.
    pub fn as_key_list(&self) -> Result<Vec<Key<T>>, OdmError> {
        let options = FindOptions { projection: Some(bson::doc! { "_id": 1 }), ..self.find_options()? };
        let collection = self.model.collection.clone();
        Ok(self
            .cursor(&options)?
            .filter_map(|d| d.get("_id").cloned())
            .map(|id| Key::new(collection.clone(), id))
            .collect())
    }

    /// Counts every match; this query's own limit and skip are ignored.
    ///
    /// # Errors
    /// Returns render or storage errors.
    pub fn count(&self) -> Result<u64, OdmError> {
        self.count_with(&CountOptions {
            max_time_ms: self.max_time_ms,
            collation: self.collation.clone(),
            ..CountOptions::default()
        })
    }

    /// # Errors
    /// Returns render or storage errors.
    pub fn count_with(&self, options: &CountOptions) -> Result<u64, OdmError> {
        let filter = self.to_filter()?;
        Ok(self.collection().count(&filter, options)?)
    }

    /// # Errors
    /// Returns render or storage errors.
    pub fn exists(&self) -> Result<bool, OdmError> {
        Ok(self.count_with(&CountOptions::default().limit(1))? > 0)
    }
}

impl<T: Entity> CriteriaSink for Query<T> {
    type Output = Self;

    fn attach(mut self, criteria: Result<Criteria, OdmError>) -> Self {
        match criteria {
            Ok(c) => self.root.add(c),
            Err(e) => self.defer(e),
        }
        self
    }
}

impl<T: Entity> fmt::Display for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_filter() {
            Ok(d) => write!(f, "{}", Bson::Document(d).into_relaxed_extjson()),
            Err(e) => write!(f, "<invalid query: {e}>"),
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("type", &self.model.name)
            .field("criteria", &self.root)
            .field("sort", &self.sort)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .field("validate", &self.validate)
            .finish_non_exhaustive()
    }
}

/// Decodes documents from a cursor into entities.
pub struct EntityIter<T> {
    cursor: Cursor,
    datastore: Datastore,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Iterator for EntityIter<T> {
    type Item = Result<T, OdmError>;

    fn next(&mut self) -> Option<Self::Item> {
        let d = self.cursor.next()?;
        Some(self.datastore.mapper().to_entity::<T>(d))
    }
}
