//! Type-descriptor tables and the mapper built on them.
//!
//! Every mapped type publishes an [`EntityModel`] (field name, stored name,
//! nesting); the query and update builders only ever see mapped types
//! through [`Mapper`].

pub mod codec;
mod key;
mod mapper;
mod model;
mod path;

pub use key::Key;
pub use mapper::{EncodedValue, Mapper, short_type_name};
pub use model::{Entity, EntityModel, EntityModelBuilder, FieldKind, FieldModel, Mapped, ModelRef};
pub use path::{ResolvedPath, is_positional};
