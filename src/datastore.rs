//! The datastore: entity lifecycle on top of the query and update builders.
//!
//! Every operation renders its documents first and only then talks to the
//! collection, so a rendering error never leaves a write half done. Storage
//! failures come back as `OdmError::Storage`, untouched.

use bson::{Bson, Document, doc};
use std::fmt;
use std::sync::Arc;

use crate::collection::{
    Collection, DeleteOptions, DeleteResult, FindAndModifyOptions, InsertOptions, Modification, Storage,
    UpdateOptions, UpdateResult, WriteConcern,
};
use crate::config::DatastoreOptions;
use crate::errors::OdmError;
use crate::mapping::{Entity, Key, Mapper};
use crate::memory::MemoryStorage;
use crate::query::{Criteria, FieldCriteria, FilterOperator, Query};
use crate::update::UpdateOperations;

struct Inner {
    storage: Arc<dyn Storage>,
    mapper: Arc<Mapper>,
    options: DatastoreOptions,
}

/// Cheap to clone; clones share storage, mapper and options.
#[derive(Clone)]
pub struct Datastore {
    inner: Arc<Inner>,
}

impl fmt::Debug for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datastore")
            .field("mapper", &self.inner.mapper)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl Datastore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, options: DatastoreOptions) -> Self {
        let mapper = Arc::new(Mapper::new(&options));
        Self { inner: Arc::new(Inner { storage, mapper, options }) }
    }

    /// A datastore over a fresh [`MemoryStorage`] with default options.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::in_memory_with(DatastoreOptions::default())
    }

    #[must_use]
    pub fn in_memory_with(options: DatastoreOptions) -> Self {
        Self::new(Arc::new(MemoryStorage::new()), options)
    }

    #[must_use]
    pub fn mapper(&self) -> &Mapper {
        &self.inner.mapper
    }

    pub(crate) fn mapper_handle(&self) -> Arc<Mapper> {
        Arc::clone(&self.inner.mapper)
    }

    #[must_use]
    pub fn options(&self) -> &DatastoreOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    #[must_use]
    pub fn collection_for<T: Entity>(&self) -> Arc<dyn Collection> {
        self.inner.storage.collection(&self.mapper().model::<T>().collection)
    }

    fn key_collection<T>(&self, key: &Key<T>) -> Arc<dyn Collection> {
        self.inner.storage.collection(key.collection())
    }

    fn write_concern(&self, explicit: Option<&WriteConcern>) -> Option<WriteConcern> {
        Some(explicit.cloned().unwrap_or_else(|| self.inner.options.default_write_concern.clone()))
    }

    #[must_use]
    pub fn create_query<T: Entity>(&self) -> Query<T> {
        Query::new(self)
    }

    #[must_use]
    pub fn find<T: Entity>(&self) -> Query<T> {
        self.create_query()
    }

    #[must_use]
    pub fn create_update_operations<T: Entity>(&self) -> UpdateOperations<T> {
        UpdateOperations::new(self.mapper_handle(), self.inner.options.validate_updates)
    }

    /// Query on `_id` alone; the id path is checked by the storage, not the
    /// descriptor table.
    fn by_id<T: Entity>(&self, operator: FilterOperator, value: Bson) -> Result<Query<T>, OdmError> {
        let criteria = FieldCriteria::new("_id", operator, value)?;
        Ok(self.find::<T>().disable_validation().add(Criteria::Field(criteria)))
    }

    // ---- save ----

    /// Inserts or replaces `entity`, assigning an `ObjectId` when it has no id.
    ///
    /// # Errors
    /// Returns encoding errors and storage failures.
    pub fn save<T: Entity>(&self, entity: &mut T) -> Result<Key<T>, OdmError> {
        self.save_with(entity, &InsertOptions::default())
    }

    /// # Errors
    /// See [`Datastore::save`].
    pub fn save_with<T: Entity>(&self, entity: &mut T, options: &InsertOptions) -> Result<Key<T>, OdmError> {
        let id = self.mapper().generate_id(entity);
        let document = self.mapper().to_document(entity)?;
        match document.get("_id") {
            Some(stored) if *stored == id => {}
            _ => {
                return Err(OdmError::Mapping(format!(
                    "{} must serialize its id as `_id`",
                    self.mapper().model::<T>().name
                )));
            }
        }
        let update = UpdateOptions {
            upsert: true,
            multi: false,
            collation: None,
            write_concern: self.write_concern(options.write_concern.as_ref()),
            bypass_document_validation: options.bypass_document_validation,
        };
        self.collection_for::<T>().replace(&doc! { "_id": id }, document, &update)?;
        self.mapper().key_of(entity)
    }

    /// # Errors
    /// Stops at the first entity that fails; earlier ones stay saved.
    pub fn save_all<T: Entity>(&self, entities: &mut [T]) -> Result<Vec<Key<T>>, OdmError> {
        entities.iter_mut().map(|e| self.save(e)).collect()
    }

    /// Sets every top-level field of `entity` on the stored document with the
    /// same id, leaving fields the entity does not carry alone.
    ///
    /// # Errors
    /// Returns `NotFound` when nothing is stored under the entity's id.
    pub fn merge<T: Entity>(&self, entity: &T) -> Result<Key<T>, OdmError> {
        let key = self.mapper().key_of(entity)?;
        let mut fields = self.mapper().to_document(entity)?;
        fields.remove("_id");
        let options = UpdateOptions { write_concern: self.write_concern(None), ..UpdateOptions::default() };
        let result = self.key_collection(&key).update(&doc! { "_id": key.id().clone() }, &doc! { "$set": fields }, &options)?;
        if result.matched_count == 0 {
            return Err(OdmError::NotFound(format!("{}:{}", key.collection(), key.id())));
        }
        Ok(key)
    }

    // ---- reads ----

    /// # Errors
    /// Returns storage or decoding errors.
    pub fn get<T: Entity>(&self, id: impl Into<Bson>) -> Result<Option<T>, OdmError> {
        self.by_id::<T>(FilterOperator::Equal, id.into())?.get()
    }

    /// Reloads `entity` by its id.
    ///
    /// # Errors
    /// Returns `IllegalArgument` when the entity has no id.
    pub fn get_entity<T: Entity>(&self, entity: &T) -> Result<Option<T>, OdmError> {
        self.get_by_key(&self.mapper().key_of(entity)?)
    }

    /// A query for every entity whose id is in `ids`.
    ///
    /// # Errors
    /// Returns an error when an id cannot be encoded.
    pub fn get_by_ids<T: Entity, I: Into<Bson>>(&self, ids: impl IntoIterator<Item = I>) -> Result<Query<T>, OdmError> {
        let ids: Vec<Bson> = ids.into_iter().map(Into::into).collect();
        self.by_id(FilterOperator::In, Bson::Array(ids))
    }

    /// # Errors
    /// Returns storage or decoding errors.
    pub fn get_by_key<T: Entity>(&self, key: &Key<T>) -> Result<Option<T>, OdmError> {
        let found = self
            .key_collection(key)
            .find(&doc! { "_id": key.id().clone() }, &crate::collection::FindOptions { limit: Some(1), ..Default::default() })?
            .next();
        found.map(|d| self.mapper().to_entity::<T>(d)).transpose()
    }

    /// Entities for the keys that resolve, in key order.
    ///
    /// # Errors
    /// Returns storage or decoding errors.
    pub fn get_by_keys<T: Entity>(&self, keys: &[Key<T>]) -> Result<Vec<T>, OdmError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(e) = self.get_by_key(key)? {
                out.push(e);
            }
        }
        Ok(out)
    }

    /// # Errors
    /// Returns `IllegalArgument` when the entity has no id.
    pub fn get_key<T: Entity>(&self, entity: &T) -> Result<Key<T>, OdmError> {
        self.mapper().key_of(entity)
    }

    /// True when a document with the entity's id is stored.
    ///
    /// # Errors
    /// Returns `IllegalArgument` when the entity has no id, or storage errors.
    pub fn exists<T: Entity>(&self, entity: &T) -> Result<bool, OdmError> {
        let key = self.mapper().key_of(entity)?;
        let options = crate::collection::CountOptions::default().limit(1);
        Ok(self.key_collection(&key).count(&doc! { "_id": key.id().clone() }, &options)? > 0)
    }

    /// # Errors
    /// Returns storage errors.
    pub fn get_count<T: Entity>(&self) -> Result<u64, OdmError> {
        self.find::<T>().count()
    }

    /// # Errors
    /// Returns render or storage errors.
    pub fn get_count_query<T: Entity>(&self, query: &Query<T>) -> Result<u64, OdmError> {
        query.count()
    }

    /// Equality criteria for every non-null top-level field of `example`.
    ///
    /// # Errors
    /// Returns an error when the example cannot be encoded.
    pub fn query_by_example<T: Entity>(&self, example: &T) -> Result<Query<T>, OdmError> {
        let mut document = self.mapper().to_document(example)?;
        document.remove(self.mapper().class_name_key());
        let mut query = self.find::<T>();
        for (path, value) in document {
            if matches!(value, Bson::Null) {
                continue;
            }
            query = query.add(Criteria::Field(FieldCriteria::new(path, FilterOperator::Equal, value)?));
        }
        Ok(query)
    }

    // ---- updates ----

    fn render_update<T: Entity>(ops: &UpdateOperations<T>) -> Result<Document, OdmError> {
        if ops.is_empty() {
            return Err(OdmError::IllegalArgument("no update operations to apply".into()));
        }
        ops.to_document()
    }

    /// Applies `ops` to the matches of `query`: every match unless
    /// `multi_update_by_default` is off.
    ///
    /// # Errors
    /// Returns render errors before anything is sent, then storage failures.
    pub fn update<T: Entity>(&self, query: &Query<T>, ops: &UpdateOperations<T>) -> Result<UpdateResult, OdmError> {
        let options = UpdateOptions::default().multi(self.inner.options.multi_update_by_default);
        self.update_with(query, ops, &options)
    }

    /// # Errors
    /// See [`Datastore::update`].
    pub fn update_with<T: Entity>(
        &self,
        query: &Query<T>,
        ops: &UpdateOperations<T>,
        options: &UpdateOptions,
    ) -> Result<UpdateResult, OdmError> {
        let filter = query.to_filter()?;
        let update = Self::render_update(ops)?;
        let options = UpdateOptions { write_concern: self.write_concern(options.write_concern.as_ref()), ..options.clone() };
        log::debug!("update {} {filter} -> {update}", query.model().collection);
        Ok(query.collection().update(&filter, &update, &options)?)
    }

    /// Updates the first match, inserting when nothing matches and
    /// `create_if_missing` is set.
    ///
    /// # Errors
    /// See [`Datastore::update`].
    pub fn update_first<T: Entity>(
        &self,
        query: &Query<T>,
        ops: &UpdateOperations<T>,
        create_if_missing: bool,
    ) -> Result<UpdateResult, OdmError> {
        self.update_with(query, ops, &UpdateOptions::default().multi(false).upsert(create_if_missing))
    }

    /// # Errors
    /// Returns `IllegalArgument` when the entity has no id, then see
    /// [`Datastore::update`].
    pub fn update_entity<T: Entity>(&self, entity: &T, ops: &UpdateOperations<T>) -> Result<UpdateResult, OdmError> {
        self.update_key(&self.mapper().key_of(entity)?, ops)
    }

    /// # Errors
    /// See [`Datastore::update`].
    pub fn update_key<T: Entity>(&self, key: &Key<T>, ops: &UpdateOperations<T>) -> Result<UpdateResult, OdmError> {
        let update = Self::render_update(ops)?;
        let options = UpdateOptions { write_concern: self.write_concern(None), ..UpdateOptions::default() };
        Ok(self.key_collection(key).update(&doc! { "_id": key.id().clone() }, &update, &options)?)
    }

    /// Updates the first match atomically and returns it as it is after the
    /// update.
    ///
    /// # Errors
    /// See [`Datastore::update`].
    pub fn find_and_modify<T: Entity>(&self, query: &Query<T>, ops: &UpdateOperations<T>) -> Result<Option<T>, OdmError> {
        self.find_and_modify_with(query, ops, &FindAndModifyOptions::default().return_new(true))
    }

    /// Sort and projection default to the query's own.
    ///
    /// # Errors
    /// See [`Datastore::update`].
    pub fn find_and_modify_with<T: Entity>(
        &self,
        query: &Query<T>,
        ops: &UpdateOperations<T>,
        options: &FindAndModifyOptions,
    ) -> Result<Option<T>, OdmError> {
        let update = Self::render_update(ops)?;
        self.modify_one(query, &Modification::Update(update), options)
    }

    /// Removes the first match and returns it.
    ///
    /// # Errors
    /// Returns render, storage or decoding errors.
    pub fn find_and_delete<T: Entity>(&self, query: &Query<T>) -> Result<Option<T>, OdmError> {
        self.find_and_delete_with(query, &FindAndModifyOptions::default())
    }

    /// [`Datastore::find_and_delete`] with explicit sort, projection and
    /// write concern. `upsert` and `return_new` have no meaning for a removal
    /// and are ignored.
    ///
    /// # Errors
    /// Returns render, storage or decoding errors.
    pub fn find_and_delete_with<T: Entity>(
        &self,
        query: &Query<T>,
        options: &FindAndModifyOptions,
    ) -> Result<Option<T>, OdmError> {
        let options = FindAndModifyOptions { upsert: false, return_new: false, ..options.clone() };
        self.modify_one(query, &Modification::Remove, &options)
    }

    fn modify_one<T: Entity>(
        &self,
        query: &Query<T>,
        modification: &Modification,
        options: &FindAndModifyOptions,
    ) -> Result<Option<T>, OdmError> {
        let filter = query.to_filter()?;
        let options = FindAndModifyOptions {
            sort: match &options.sort {
                Some(s) => Some(s.clone()),
                None => query.to_sort()?,
            },
            projection: match &options.projection {
                Some(p) => Some(p.clone()),
                None => query.to_projection()?,
            },
            write_concern: self.write_concern(options.write_concern.as_ref()),
            ..options.clone()
        };
        query
            .collection()
            .find_and_modify(&filter, modification, &options)?
            .map(|d| self.mapper().to_entity::<T>(d))
            .transpose()
    }

    // ---- deletes ----

    /// Deletes every match of `query`.
    ///
    /// # Errors
    /// Returns render errors or storage failures.
    pub fn delete<T: Entity>(&self, query: &Query<T>) -> Result<DeleteResult, OdmError> {
        self.delete_with(query, &DeleteOptions::default())
    }

    /// # Errors
    /// See [`Datastore::delete`].
    pub fn delete_with<T: Entity>(&self, query: &Query<T>, options: &DeleteOptions) -> Result<DeleteResult, OdmError> {
        let filter = query.to_filter()?;
        let options = DeleteOptions { write_concern: self.write_concern(options.write_concern.as_ref()), ..options.clone() };
        Ok(query.collection().delete(&filter, &options)?)
    }

    /// # Errors
    /// See [`Datastore::delete`].
    pub fn delete_by_id<T: Entity>(&self, id: impl Into<Bson>) -> Result<DeleteResult, OdmError> {
        let query = self.by_id::<T>(FilterOperator::Equal, id.into())?;
        self.delete_with(&query, &DeleteOptions::default().multi(false))
    }

    /// # Errors
    /// See [`Datastore::delete`].
    pub fn delete_by_ids<T: Entity, I: Into<Bson>>(&self, ids: impl IntoIterator<Item = I>) -> Result<DeleteResult, OdmError> {
        let query = self.get_by_ids::<T, I>(ids)?;
        self.delete(&query)
    }

    /// # Errors
    /// Returns `IllegalArgument` when the entity has no id, or storage errors.
    pub fn delete_entity<T: Entity>(&self, entity: &T) -> Result<DeleteResult, OdmError> {
        let key = self.mapper().key_of(entity)?;
        let options = DeleteOptions { write_concern: self.write_concern(None), ..DeleteOptions::default().multi(false) };
        Ok(self.key_collection(&key).delete(&doc! { "_id": key.id().clone() }, &options)?)
    }
}
