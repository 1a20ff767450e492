use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::codec;
use super::key::Key;
use super::model::{Entity, EntityModel, Mapped, ModelRef};
use super::path::ResolvedPath;
use crate::config::DatastoreOptions;
use crate::errors::OdmError;

/// A value encoded for the wire, remembering which Rust type produced it so
/// the class-name discriminator can be added once the target field is known.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedValue {
    pub value: Bson,
    pub type_name: &'static str,
}

/// Entity <-> document conversion and field-path resolution, driven by the
/// per-type descriptor tables.
pub struct Mapper {
    models: RwLock<HashMap<&'static str, Arc<EntityModel>>>,
    class_name_key: String,
    store_class_name: bool,
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("models", &self.models.read().len())
            .field("class_name_key", &self.class_name_key)
            .finish()
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new(&DatastoreOptions::default())
    }
}

impl Mapper {
    #[must_use]
    pub fn new(options: &DatastoreOptions) -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
            class_name_key: options.class_name_key.clone(),
            store_class_name: options.store_class_name,
        }
    }

    #[must_use]
    pub fn class_name_key(&self) -> &str {
        &self.class_name_key
    }

    #[must_use]
    pub fn model<M: Mapped>(&self) -> Arc<EntityModel> {
        self.model_ref(&ModelRef::of::<M>())
    }

    /// Descriptor for `r`, built on first use and cached afterwards.
    #[must_use]
    pub fn model_ref(&self, r: &ModelRef) -> Arc<EntityModel> {
        if let Some(m) = self.models.read().get(r.type_name) {
            return Arc::clone(m);
        }
        let built = Arc::new(r.build());
        log::debug!("mapped {} -> collection {}", built.type_name, built.collection);
        Arc::clone(self.models.write().entry(r.type_name).or_insert(built))
    }

    #[must_use]
    pub fn is_mapped(&self, type_name: &str) -> bool {
        self.models.read().contains_key(type_name)
    }

    /// # Errors
    /// Returns an error when the entity fails to encode.
    pub fn to_document<T: Entity>(&self, entity: &T) -> Result<Document, OdmError> {
        let model = self.model::<T>();
        let mut document = entity.to_document()?;
        if self.store_class_name && model.store_class_name {
            document.insert(self.class_name_key.clone(), model.name.clone());
        }
        Ok(document)
    }

    /// # Errors
    /// Returns an error when the document does not decode into `T`.
    pub fn to_entity<T: Entity>(&self, mut document: Document) -> Result<T, OdmError> {
        document.remove(&self.class_name_key);
        T::from_document(document)
    }

    /// Returns the entity's id, assigning a fresh `ObjectId` when it has none.
    pub fn generate_id<T: Entity>(&self, entity: &mut T) -> Bson {
        if let Some(id) = entity.id() {
            return id;
        }
        let id = Bson::ObjectId(ObjectId::new());
        entity.set_id(id.clone());
        id
    }

    /// # Errors
    /// Returns `IllegalArgument` when the entity has not been assigned an id.
    pub fn key_of<T: Entity>(&self, entity: &T) -> Result<Key<T>, OdmError> {
        let model = self.model::<T>();
        let id = entity.id().ok_or_else(|| {
            OdmError::IllegalArgument(format!("{} has no id; save it first", model.name))
        })?;
        Ok(Key::new(model.collection.clone(), id))
    }

    /// # Errors
    /// Returns an error when the value cannot be represented as BSON.
    pub fn encode_value<V: Serialize + ?Sized>(&self, value: &V) -> Result<EncodedValue, OdmError> {
        Ok(EncodedValue { value: codec::to_bson(value)?, type_name: std::any::type_name::<V>() })
    }

    /// Finishes an encoded value for the field it is written to. Embedded
    /// documents whose type cannot be established from the target field get
    /// the class-name discriminator so they can be decoded later.
    #[must_use]
    pub fn annotate(&self, encoded: &EncodedValue, target: &ResolvedPath) -> Bson {
        let Bson::Document(d) = &encoded.value else {
            return encoded.value.clone();
        };
        if !self.store_class_name || is_raw_bson(encoded.type_name) {
            return encoded.value.clone();
        }
        if d.keys().next().is_some_and(|k| k.starts_with('$')) {
            return encoded.value.clone();
        }
        let declared = target.field.as_ref().map(|f| &f.kind);
        let known = match declared {
            Some(kind) if kind.is_reference() => true,
            Some(kind) => kind.nested().is_some_and(|m| m.type_name == encoded.type_name.trim_start_matches('&')),
            None => false,
        };
        if known {
            return encoded.value.clone();
        }
        let mut out = d.clone();
        out.insert(self.class_name_key.clone(), short_type_name(encoded.type_name));
        Bson::Document(out)
    }
}

fn is_raw_bson(type_name: &str) -> bool {
    let base = type_name.trim_start_matches('&');
    base.starts_with("bson::") || base.starts_with("serde_json::") || base.starts_with("std::collections::")
}

/// `my_app::model::Child<u8>` -> `Child`.
#[must_use]
pub fn short_type_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base).trim_start_matches('&').to_string()
}
