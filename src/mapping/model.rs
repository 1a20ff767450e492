use bson::{Bson, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::OdmError;

/// Points at the descriptor of a nested (embedded or referenced) type without
/// building it eagerly. Recursive types stay finite this way.
#[derive(Clone, Copy)]
pub struct ModelRef {
    pub type_name: &'static str,
    build: fn() -> EntityModel,
}

impl ModelRef {
    #[must_use]
    pub fn of<M: Mapped>() -> Self {
        Self { type_name: std::any::type_name::<M>(), build: M::model }
    }

    #[must_use]
    pub fn build(&self) -> EntityModel {
        (self.build)()
    }
}

impl std::fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ModelRef").field(&self.type_name).finish()
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Scalar value; nothing below it can be addressed.
    Value,
    /// Array of scalars; a positional or numeric segment may follow.
    ValueList,
    Embedded(ModelRef),
    EmbeddedList(ModelRef),
    /// Map keyed by arbitrary strings; the next segment is a key.
    Map(Option<ModelRef>),
    Reference(ModelRef),
    ReferenceList(ModelRef),
    Geometry,
    /// Free-form document; any sub-path is accepted.
    Document,
}

impl FieldKind {
    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::ValueList | Self::EmbeddedList(_) | Self::ReferenceList(_))
    }

    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_) | Self::ReferenceList(_))
    }

    /// Model of the element type when the field nests a mapped type.
    #[must_use]
    pub const fn nested(&self) -> Option<&ModelRef> {
        match self {
            Self::Embedded(m) | Self::EmbeddedList(m) | Self::Map(Some(m)) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldModel {
    /// Name used in code and in query/update paths.
    pub name: String,
    /// Name the field is stored under in documents.
    pub stored_name: String,
    pub kind: FieldKind,
}

impl FieldModel {
    #[must_use]
    pub fn matches(&self, segment: &str) -> bool {
        self.name == segment || self.stored_name == segment
    }
}

/// Statically built descriptor of a mapped type: logical field names, their
/// stored names and how each one nests.
#[derive(Debug, Clone)]
pub struct EntityModel {
    pub type_name: &'static str,
    /// Short name, written as the class-name discriminator.
    pub name: String,
    pub collection: String,
    pub fields: Vec<FieldModel>,
    pub store_class_name: bool,
}

impl EntityModel {
    #[must_use]
    pub fn builder<M: 'static>(name: &str) -> EntityModelBuilder {
        EntityModelBuilder {
            model: Self {
                type_name: std::any::type_name::<M>(),
                name: name.to_string(),
                collection: name.to_string(),
                fields: Vec::new(),
                store_class_name: true,
            },
        }
    }

    #[must_use]
    pub fn field(&self, segment: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.matches(segment))
    }

    #[must_use]
    pub fn id_field(&self) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.stored_name == "_id")
    }
}

pub struct EntityModelBuilder {
    model: EntityModel,
}

impl EntityModelBuilder {
    #[must_use]
    pub fn collection(mut self, name: &str) -> Self {
        self.model.collection = name.to_string();
        self
    }

    /// The id field, stored as `_id`.
    #[must_use]
    pub fn id(self, name: &str) -> Self {
        self.stored(name, "_id", FieldKind::Value)
    }

    #[must_use]
    pub fn field(self, name: &str) -> Self {
        self.stored(name, name, FieldKind::Value)
    }

    #[must_use]
    pub fn list(self, name: &str) -> Self {
        self.stored(name, name, FieldKind::ValueList)
    }

    #[must_use]
    pub fn embedded<E: Mapped>(self, name: &str) -> Self {
        self.stored(name, name, FieldKind::Embedded(ModelRef::of::<E>()))
    }

    #[must_use]
    pub fn embedded_list<E: Mapped>(self, name: &str) -> Self {
        self.stored(name, name, FieldKind::EmbeddedList(ModelRef::of::<E>()))
    }

    #[must_use]
    pub fn map(self, name: &str) -> Self {
        self.stored(name, name, FieldKind::Map(None))
    }

    #[must_use]
    pub fn map_of<E: Mapped>(self, name: &str) -> Self {
        self.stored(name, name, FieldKind::Map(Some(ModelRef::of::<E>())))
    }

    #[must_use]
    pub fn reference<E: Mapped>(self, name: &str) -> Self {
        self.stored(name, name, FieldKind::Reference(ModelRef::of::<E>()))
    }

    #[must_use]
    pub fn reference_list<E: Mapped>(self, name: &str) -> Self {
        self.stored(name, name, FieldKind::ReferenceList(ModelRef::of::<E>()))
    }

    #[must_use]
    pub fn geometry(self, name: &str) -> Self {
        self.stored(name, name, FieldKind::Geometry)
    }

    #[must_use]
    pub fn document(self, name: &str) -> Self {
        self.stored(name, name, FieldKind::Document)
    }

    #[must_use]
    pub fn stored(mut self, name: &str, stored_name: &str, kind: FieldKind) -> Self {
        self.model.fields.push(FieldModel {
            name: name.to_string(),
            stored_name: stored_name.to_string(),
            kind,
        });
        self
    }

    #[must_use]
    pub const fn no_class_name(mut self) -> Self {
        self.model.store_class_name = false;
        self
    }

    #[must_use]
    pub fn build(self) -> EntityModel {
        self.model
    }
}

/// A type with a descriptor table. Embedded values implement only this.
pub trait Mapped: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn model() -> EntityModel;
}

/// A top-level document type living in its own collection.
pub trait Entity: Mapped {
    fn id(&self) -> Option<Bson>;

    fn set_id(&mut self, id: Bson);

    /// Encodes the entity. Override for hand-written codecs.
    ///
    /// # Errors
    /// Returns an error when the entity does not serialize to a document.
    fn to_document(&self) -> Result<Document, OdmError> {
        super::codec::to_document(self)
    }

    /// # Errors
    /// Returns an error when the document does not match the entity's shape.
    fn from_document(document: Document) -> Result<Self, OdmError> {
        super::codec::from_document(document)
    }
}
