//! The collection capability: the storage seam the datastore dispatches
//! rendered documents to.
//!
//! Implementations own connection handling, write concerns and timeouts.
//! Every failure they report is a [`StorageFailure`].

mod cursor;
mod options;
mod result;

use bson::{Bson, Document};
use std::sync::Arc;

use crate::errors::StorageFailure;

pub use cursor::Cursor;
pub use options::{
    Acknowledgment, Collation, CountOptions, DeleteOptions, FindAndModifyOptions, FindOptions,
    InsertOptions, Modification, UpdateOptions, WriteConcern,
};
pub use result::{DeleteResult, UpdateResult};

pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    /// Returns a storage failure when the filter cannot be executed.
    fn find(&self, filter: &Document, options: &FindOptions) -> Result<Cursor, StorageFailure>;

    /// # Errors
    /// Returns a storage failure when the filter cannot be executed.
    fn count(&self, filter: &Document, options: &CountOptions) -> Result<u64, StorageFailure>;

    /// Inserts a document carrying an `_id` and returns that id.
    ///
    /// # Errors
    /// Returns `StorageFailure::DuplicateKey` when the id is taken.
    fn insert(&self, document: Document, options: &InsertOptions) -> Result<Bson, StorageFailure>;

    /// Replaces the first match, inserting when `options.upsert` is set.
    ///
    /// # Errors
    /// Returns a storage failure when the write is rejected.
    fn replace(
        &self,
        filter: &Document,
        document: Document,
        options: &UpdateOptions,
    ) -> Result<UpdateResult, StorageFailure>;

    /// # Errors
    /// Returns a storage failure when the update cannot be applied.
    fn update(
        &self,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> Result<UpdateResult, StorageFailure>;

    /// # Errors
    /// Returns a storage failure when the filter cannot be executed.
    fn delete(&self, filter: &Document, options: &DeleteOptions) -> Result<DeleteResult, StorageFailure>;

    /// Atomically modifies one document, returning it before or after the
    /// change according to `options.return_new`.
    ///
    /// # Errors
    /// Returns a storage failure when the modification is rejected.
    fn find_and_modify(
        &self,
        filter: &Document,
        modification: &Modification,
        options: &FindAndModifyOptions,
    ) -> Result<Option<Document>, StorageFailure>;
}

/// Hands out collections by name.
pub trait Storage: Send + Sync {
    fn collection(&self, name: &str) -> Arc<dyn Collection>;
}
