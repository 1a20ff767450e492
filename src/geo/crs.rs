use bson::{Document, doc};

/// A named coordinate reference system, attached to `$geometry` as `crs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs {
    name: String,
}

impl Crs {
    /// Strict-winding EPSG:4326, needed for polygons larger than a hemisphere.
    pub const STRICT_WINDING_EPSG_4326: &'static str = "urn:x-mongodb:crs:strictwinding:EPSG:4326";
    pub const EPSG_4326: &'static str = "EPSG:4326";

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn big_polygon() -> Self {
        Self::named(Self::STRICT_WINDING_EPSG_4326)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn to_document(&self) -> Document {
        doc! { "type": "name", "properties": { "name": self.name.clone() } }
    }
}
