use bson::{Bson, Document, doc};

use super::criteria::{Criteria, RenderContext, put_operator};
use super::operator::FilterOperator;
use crate::errors::OdmError;
use crate::geo::{Crs, Geometry, LegacyPoint, Shape};
use crate::mapping::codec;

fn check_distance(max_distance: Option<f64>) -> Result<(), OdmError> {
    match max_distance {
        Some(d) if !d.is_finite() || d < 0.0 => {
            Err(OdmError::IllegalArgument(format!("max distance must be a non-negative number, got {d}")))
        }
        _ => Ok(()),
    }
}

/// Encodes a GeoJSON operator fragment:
/// - `$near`: `{$near: {$geometry: g, $maxDistance: m}}`
/// - `$geoWithin` / `$geoIntersects`: `{op: {$geometry: g}}`, with `crs`
///   added inside `$geometry` when given.
///
/// # Errors
/// Returns `UnsupportedGeoOperator` for any other operator, and an encoding
/// error when the geometry cannot be written.
pub fn geo_fragment(
    operator: FilterOperator,
    geometry: &Geometry,
    max_distance: Option<f64>,
    crs: Option<&Crs>,
) -> Result<Document, OdmError> {
    let mut geometry_doc = geometry.to_document()?;
    let inner = match operator {
        FilterOperator::Near => {
            let mut inner = doc! { "$geometry": geometry_doc };
            if let Some(d) = max_distance {
                inner.insert("$maxDistance", d);
            }
            inner
        }
        FilterOperator::GeoWithin | FilterOperator::Intersects => {
            if let Some(crs) = crs {
                geometry_doc.insert("crs", crs.to_document());
            }
            doc! { "$geometry": geometry_doc }
        }
        other => return Err(OdmError::UnsupportedGeoOperator(other.token().to_string())),
    };
    Ok(doc! { operator.token(): inner })
}

/// Geo conditions written as filter strings (`"loc near"`): an `[x, y]`
/// pair gives a legacy 2d criteria, a GeoJSON document a spherical one.
///
/// # Errors
/// Returns `OperatorValueMismatch` when the value is neither, or when the
/// operator cannot take it.
pub(crate) fn condition_criteria(path: String, operator: FilterOperator, value: Bson) -> Result<Criteria, OdmError> {
    use FilterOperator as Op;
    let mismatch = || OdmError::OperatorValueMismatch {
        operator: operator.token().to_string(),
        expected: "an [x, y] pair or a GeoJSON geometry",
    };
    match (operator, value) {
        (Op::Near | Op::NearSphere, Bson::Array(pair)) => {
            let point = legacy_point(&pair).ok_or_else(mismatch)?;
            LegacyGeoCriteria::near(path, point, None, operator == Op::NearSphere).map(Criteria::LegacyGeo)
        }
        (Op::Near | Op::GeoWithin | Op::Intersects, Bson::Document(d)) => {
            let geometry: Geometry = codec::from_document(d).map_err(|_| mismatch())?;
            GeoFieldCriteria::new(path, operator, geometry, None, None).map(Criteria::Geo)
        }
        _ => Err(mismatch()),
    }
}

#[allow(clippy::cast_precision_loss)]
fn legacy_point(pair: &[Bson]) -> Option<LegacyPoint> {
    let number = |b: &Bson| match b {
        Bson::Double(f) => Some(*f),
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        _ => None,
    };
    match pair {
        [x, y] => Some(LegacyPoint::new(number(x)?, number(y)?)),
        _ => None,
    }
}

/// A spherical (GeoJSON) condition on a field.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFieldCriteria {
    path: String,
    operator: FilterOperator,
    geometry: Geometry,
    max_distance: Option<f64>,
    crs: Option<Crs>,
}

impl GeoFieldCriteria {
    /// # Errors
    /// Returns `UnsupportedGeoOperator` unless `operator` is `NEAR`,
    /// `GEO_WITHIN` or `INTERSECTS`, and `IllegalArgument` for a negative
    /// max distance.
    pub fn new(
        path: impl Into<String>,
        operator: FilterOperator,
        geometry: Geometry,
        max_distance: Option<f64>,
        crs: Option<Crs>,
    ) -> Result<Self, OdmError> {
        if !matches!(operator, FilterOperator::Near | FilterOperator::GeoWithin | FilterOperator::Intersects) {
            return Err(OdmError::UnsupportedGeoOperator(operator.token().to_string()));
        }
        check_distance(max_distance)?;
        Ok(Self { path: path.into(), operator, geometry, max_distance, crs })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn operator(&self) -> FilterOperator {
        self.operator
    }

    #[must_use]
    pub const fn max_distance(&self) -> Option<f64> {
        self.max_distance
    }

    /// # Errors
    /// Propagates path resolution and geometry encoding errors.
    pub fn add_to(&self, target: &mut Document, ctx: &RenderContext<'_>) -> Result<(), OdmError> {
        let path = ctx.resolve(&self.path)?;
        let fragment = geo_fragment(self.operator, &self.geometry, self.max_distance, self.crs.as_ref())?;
        put_operator(target, &path, fragment);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LegacyGeo {
    Near { point: LegacyPoint, max_distance: Option<f64>, spherical: bool },
    Within(Shape),
}

/// A flat-plane condition for legacy 2d indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyGeoCriteria {
    path: String,
    kind: LegacyGeo,
}

impl LegacyGeoCriteria {
    /// `$near` (or `$nearSphere`) over `[x, y]`.
    ///
    /// # Errors
    /// Returns `IllegalArgument` for a negative max distance.
    pub fn near(
        path: impl Into<String>,
        point: LegacyPoint,
        max_distance: Option<f64>,
        spherical: bool,
    ) -> Result<Self, OdmError> {
        check_distance(max_distance)?;
        Ok(Self { path: path.into(), kind: LegacyGeo::Near { point, max_distance, spherical } })
    }

    #[must_use]
    pub fn within(path: impl Into<String>, shape: Shape) -> Self {
        Self { path: path.into(), kind: LegacyGeo::Within(shape) }
    }

    fn fragment(&self) -> Document {
        match &self.kind {
            LegacyGeo::Near { point, max_distance, spherical } => {
                let op = if *spherical { FilterOperator::NearSphere } else { FilterOperator::Near };
                let mut d = doc! { op.token(): point.to_bson() };
                if let Some(m) = max_distance {
                    d.insert("$maxDistance", Bson::Double(*m));
                }
                d
            }
            LegacyGeo::Within(shape) => doc! { FilterOperator::GeoWithin.token(): shape.to_document() },
        }
    }

    /// # Errors
    /// Returns `InvalidFieldPath` when the path does not resolve.
    pub fn add_to(&self, target: &mut Document, ctx: &RenderContext<'_>) -> Result<(), OdmError> {
        let path = ctx.resolve(&self.path)?;
        put_operator(target, &path, self.fragment());
        Ok(())
    }
}
