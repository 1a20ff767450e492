use bson::{Bson, Document, doc};

/// A flat-plane coordinate pair for legacy 2d indexes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyPoint {
    pub x: f64,
    pub y: f64,
}

impl LegacyPoint {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn to_bson(self) -> Bson {
        Bson::Array(vec![Bson::Double(self.x), Bson::Double(self.y)])
    }
}

/// Legacy `$geoWithin` shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Box { bottom_left: LegacyPoint, upper_right: LegacyPoint },
    Center { center: LegacyPoint, radius: f64 },
    /// Radius in radians.
    CenterSphere { center: LegacyPoint, radius: f64 },
    Polygon(Vec<LegacyPoint>),
}

impl Shape {
    #[must_use]
    pub const fn operator(&self) -> &'static str {
        match self {
            Self::Box { .. } => "$box",
            Self::Center { .. } => "$center",
            Self::CenterSphere { .. } => "$centerSphere",
            Self::Polygon(_) => "$polygon",
        }
    }

    /// `{$box: [[x, y], [x, y]]}`, `{$center: [[x, y], r]}` and so on.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let value = match self {
            Self::Box { bottom_left, upper_right } => {
                Bson::Array(vec![bottom_left.to_bson(), upper_right.to_bson()])
            }
            Self::Center { center, radius } | Self::CenterSphere { center, radius } => {
                Bson::Array(vec![center.to_bson(), Bson::Double(*radius)])
            }
            Self::Polygon(points) => Bson::Array(points.iter().map(|p| p.to_bson()).collect()),
        };
        doc! { self.operator(): value }
    }
}
