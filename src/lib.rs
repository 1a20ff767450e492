//! odmlite: an object-document mapper. Typed query and update builders
//! compile to BSON filter and update documents, and a [`Datastore`] runs them
//! against a pluggable collection capability.

pub mod collection;
pub mod config;
pub mod datastore;
pub mod errors;
pub mod geo;
pub mod logger;
pub mod mapping;
pub mod memory;
pub mod query;
pub mod update;

pub use config::DatastoreOptions;
pub use datastore::Datastore;
pub use errors::{OdmError, StorageFailure};
pub use mapping::{Entity, EntityModel, FieldKind, Key, Mapped, Mapper};
pub use query::{Criteria, FilterOperator, Query, Sort};
pub use update::{PushOptions, UpdateOperations};

/// Sets up logging from `ODMLITE_LOG_*` and loads options the usual way
/// (see [`DatastoreOptions::load`]).
///
/// # Errors
/// Returns configuration or logger setup errors.
pub fn init() -> Result<DatastoreOptions, OdmError> {
    let options = DatastoreOptions::load(None)?;
    if options.log_dir.is_some() || options.log_level.is_some() {
        logger::configure_from_options(&options)?;
    } else {
        logger::configure_from_env()?;
    }
    Ok(options)
}
