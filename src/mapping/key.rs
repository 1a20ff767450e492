use bson::{Bson, Document, doc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A lightweight reference to a stored entity: its collection and id.
///
/// Equality ignores the in-memory identity of whatever object the key was
/// taken from. Serialized as a DBRef-shaped document.
pub struct Key<T> {
    collection: String,
    id: Bson,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    #[must_use]
    pub fn new(collection: impl Into<String>, id: impl Into<Bson>) -> Self {
        Self { collection: collection.into(), id: id.into(), _marker: PhantomData }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub const fn id(&self) -> &Bson {
        &self.id
    }

    #[must_use]
    pub fn to_document(&self) -> Document {
        doc! { "$ref": self.collection.clone(), "$id": self.id.clone() }
    }

    /// Reads a key back from its DBRef-shaped document.
    #[must_use]
    pub fn from_document(document: &Document) -> Option<Self> {
        let collection = document.get("$ref")?.as_str()?;
        let id = document.get("$id")?.clone();
        Some(Self::new(collection, id))
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self::new(self.collection.clone(), self.id.clone())
    }
}

impl<T> std::fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key").field("collection", &self.collection).field("id", &self.id).finish()
    }
}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection && self.id == other.id
    }
}

impl<T> Eq for Key<T> {}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.collection.hash(state);
        // Bson has no Hash impl; its canonical extended-JSON text is stable.
        self.id.clone().into_relaxed_extjson().to_string().hash(state);
    }
}

impl<T> From<Key<T>> for Bson {
    fn from(key: Key<T>) -> Self {
        Self::Document(key.to_document())
    }
}

#[derive(Serialize, Deserialize)]
struct DbRef {
    #[serde(rename = "$ref")]
    collection: String,
    #[serde(rename = "$id")]
    id: Bson,
}

impl<T> Serialize for Key<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DbRef { collection: self.collection.clone(), id: self.id.clone() }.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Key<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let r = DbRef::deserialize(deserializer)?;
        Ok(Self::new(r.collection, r.id))
    }
}
