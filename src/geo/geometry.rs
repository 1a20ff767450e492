use bson::Document;
use serde::{Deserialize, Serialize};

use crate::mapping::codec;
use crate::errors::OdmError;

/// A GeoJSON position, `[longitude, latitude]`.
pub type Position = [f64; 2];

/// GeoJSON geometries as stored in documents and used by spherical queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    LineString { coordinates: Vec<Position> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPoint { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    #[must_use]
    pub const fn point(longitude: f64, latitude: f64) -> Self {
        Self::Point { coordinates: [longitude, latitude] }
    }

    #[must_use]
    pub fn line_string(points: impl IntoIterator<Item = Position>) -> Self {
        Self::LineString { coordinates: points.into_iter().collect() }
    }

    /// A polygon from its exterior ring followed by any holes.
    ///
    /// # Errors
    /// Returns `IllegalArgument` when a ring has fewer than four positions or
    /// is not closed.
    pub fn polygon(rings: Vec<Vec<Position>>) -> Result<Self, OdmError> {
        if rings.is_empty() {
            return Err(OdmError::IllegalArgument("polygon needs an exterior ring".into()));
        }
        for ring in &rings {
            if ring.len() < 4 || ring.first() != ring.last() {
                return Err(OdmError::IllegalArgument(
                    "polygon rings must be closed and hold at least four positions".into(),
                ));
            }
        }
        Ok(Self::Polygon { coordinates: rings })
    }

    #[must_use]
    pub fn multi_point(points: impl IntoIterator<Item = Position>) -> Self {
        Self::MultiPoint { coordinates: points.into_iter().collect() }
    }

    #[must_use]
    pub const fn multi_line_string(lines: Vec<Vec<Position>>) -> Self {
        Self::MultiLineString { coordinates: lines }
    }

    #[must_use]
    pub const fn multi_polygon(polygons: Vec<Vec<Vec<Position>>>) -> Self {
        Self::MultiPolygon { coordinates: polygons }
    }

    #[must_use]
    pub const fn collection(geometries: Vec<Self>) -> Self {
        Self::GeometryCollection { geometries }
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Point { .. } => "Point",
            Self::LineString { .. } => "LineString",
            Self::Polygon { .. } => "Polygon",
            Self::MultiPoint { .. } => "MultiPoint",
            Self::MultiLineString { .. } => "MultiLineString",
            Self::MultiPolygon { .. } => "MultiPolygon",
            Self::GeometryCollection { .. } => "GeometryCollection",
        }
    }

    /// `{type, coordinates}` (or `{type, geometries}`).
    ///
    /// # Errors
    /// Returns an error when a coordinate cannot be encoded.
    pub fn to_document(&self) -> Result<Document, OdmError> {
        codec::to_document(self)
    }
}
