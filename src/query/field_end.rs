use bson::{Bson, doc};

use super::criteria::{Criteria, FieldCriteria};
use super::geo_criteria::{GeoFieldCriteria, LegacyGeoCriteria};
use super::operator::FilterOperator;
use crate::errors::OdmError;
use crate::geo::{Crs, Geometry, LegacyPoint, Shape};

/// Receives the criteria built by a [`FieldEnd`].
pub trait CriteriaSink: Sized {
    type Output;

    fn attach(self, criteria: Result<Criteria, OdmError>) -> Self::Output;
}

/// Sink for criteria built outside a query, for use in `and`/`or`/`nor`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl CriteriaSink for Detached {
    type Output = Result<Criteria, OdmError>;

    fn attach(self, criteria: Result<Criteria, OdmError>) -> Self::Output {
        criteria
    }
}

/// Starts a criteria on `path` that is not attached to any query.
#[must_use]
pub fn criteria(path: &str) -> FieldEnd<Detached> {
    FieldEnd::new(Detached, path)
}

/// Escapes regex metacharacters so `text` matches literally.
#[must_use]
pub fn quote_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// The second half of `field("x").<operator>(value)`.
#[must_use]
pub struct FieldEnd<S> {
    sink: S,
    path: String,
    not: bool,
}

impl<S: CriteriaSink> FieldEnd<S> {
    pub(crate) fn new(sink: S, path: &str) -> Self {
        Self { sink, path: path.to_string(), not: false }
    }

    /// Negates the operator that follows.
    pub fn not(mut self) -> Self {
        self.not = !self.not;
        self
    }

    fn op(self, operator: FilterOperator, value: Bson) -> S::Output {
        let not = self.not;
        let built = FieldCriteria::new(self.path, operator, value)
            .map(|c| if not { c.negated() } else { c })
            .map(Criteria::Field);
        self.sink.attach(built)
    }

    fn geo(self, built: Result<Criteria, OdmError>) -> S::Output {
        if self.not {
            let path = self.path;
            return self.sink.attach(Err(OdmError::IllegalArgument(format!("geo criteria on '{path}' cannot be negated"))));
        }
        self.sink.attach(built)
    }

    fn list<V: Into<Bson>>(values: impl IntoIterator<Item = V>) -> Bson {
        Bson::Array(values.into_iter().map(Into::into).collect())
    }

    fn regex(self, pattern: String, ignore_case: bool) -> S::Output {
        let mut value = doc! { "$regex": pattern };
        if ignore_case {
            value.insert("$options", "i");
        }
        self.op(FilterOperator::Regex, Bson::Document(value))
    }

    pub fn equal(self, value: impl Into<Bson>) -> S::Output {
        self.op(FilterOperator::Equal, value.into())
    }

    pub fn not_equal(self, value: impl Into<Bson>) -> S::Output {
        self.op(FilterOperator::NotEqual, value.into())
    }

    pub fn greater_than(self, value: impl Into<Bson>) -> S::Output {
        self.op(FilterOperator::GreaterThan, value.into())
    }

    pub fn greater_than_or_eq(self, value: impl Into<Bson>) -> S::Output {
        self.op(FilterOperator::GreaterThanOrEqual, value.into())
    }

    pub fn less_than(self, value: impl Into<Bson>) -> S::Output {
        self.op(FilterOperator::LessThan, value.into())
    }

    pub fn less_than_or_eq(self, value: impl Into<Bson>) -> S::Output {
        self.op(FilterOperator::LessThanOrEqual, value.into())
    }

    pub fn exists(self) -> S::Output {
        self.op(FilterOperator::Exists, Bson::Boolean(true))
    }

    pub fn does_not_exist(self) -> S::Output {
        self.op(FilterOperator::Exists, Bson::Boolean(false))
    }

    /// Array field contains `value` (plain equality against an array).
    pub fn has_this(self, value: impl Into<Bson>) -> S::Output {
        self.op(FilterOperator::Equal, value.into())
    }

    pub fn has_none_of<V: Into<Bson>>(self, values: impl IntoIterator<Item = V>) -> S::Output {
        self.op(FilterOperator::NotIn, Self::list(values))
    }

    pub fn has_any_of<V: Into<Bson>>(self, values: impl IntoIterator<Item = V>) -> S::Output {
        self.op(FilterOperator::In, Self::list(values))
    }

    pub fn has_all_of<V: Into<Bson>>(self, values: impl IntoIterator<Item = V>) -> S::Output {
        self.op(FilterOperator::All, Self::list(values))
    }

    pub fn in_values<V: Into<Bson>>(self, values: impl IntoIterator<Item = V>) -> S::Output {
        self.op(FilterOperator::In, Self::list(values))
    }

    pub fn not_in<V: Into<Bson>>(self, values: impl IntoIterator<Item = V>) -> S::Output {
        self.op(FilterOperator::NotIn, Self::list(values))
    }

    pub fn size_eq(self, size: i32) -> S::Output {
        self.op(FilterOperator::Size, Bson::Int32(size))
    }

    pub fn mod_op(self, divisor: i64, remainder: i64) -> S::Output {
        self.op(FilterOperator::Mod, Bson::Array(vec![Bson::Int64(divisor), Bson::Int64(remainder)]))
    }

    /// `$elemMatch`; `value` must be a document of conditions.
    pub fn has_this_element(self, value: impl Into<Bson>) -> S::Output {
        self.op(FilterOperator::ElementMatch, value.into())
    }

    /// `$type` by BSON type number or alias (`"string"`, `"int"`, ...).
    pub fn type_of(self, bson_type: impl Into<Bson>) -> S::Output {
        self.op(FilterOperator::Type, bson_type.into())
    }

    pub fn starts_with(self, prefix: &str) -> S::Output {
        self.regex(format!("^{}", quote_pattern(prefix)), false)
    }

    pub fn starts_with_ignore_case(self, prefix: &str) -> S::Output {
        self.regex(format!("^{}", quote_pattern(prefix)), true)
    }

    pub fn ends_with(self, suffix: &str) -> S::Output {
        self.regex(format!("{}$", quote_pattern(suffix)), false)
    }

    pub fn ends_with_ignore_case(self, suffix: &str) -> S::Output {
        self.regex(format!("{}$", quote_pattern(suffix)), true)
    }

    pub fn contains(self, text: &str) -> S::Output {
        self.regex(quote_pattern(text), false)
    }

    pub fn contains_ignore_case(self, text: &str) -> S::Output {
        self.regex(quote_pattern(text), true)
    }

    pub fn equal_ignore_case(self, text: &str) -> S::Output {
        self.regex(format!("^{}$", quote_pattern(text)), true)
    }

    pub fn near(self, point: Geometry) -> S::Output {
        let c = GeoFieldCriteria::new(self.path.clone(), FilterOperator::Near, point, None, None);
        self.geo(c.map(Criteria::Geo))
    }

    /// `$near` limited to `max_distance` meters.
    pub fn near_within(self, point: Geometry, max_distance: f64) -> S::Output {
        let c = GeoFieldCriteria::new(self.path.clone(), FilterOperator::Near, point, Some(max_distance), None);
        self.geo(c.map(Criteria::Geo))
    }

    pub fn within(self, geometry: Geometry) -> S::Output {
        let c = GeoFieldCriteria::new(self.path.clone(), FilterOperator::GeoWithin, geometry, None, None);
        self.geo(c.map(Criteria::Geo))
    }

    pub fn within_crs(self, geometry: Geometry, crs: Crs) -> S::Output {
        let c = GeoFieldCriteria::new(self.path.clone(), FilterOperator::GeoWithin, geometry, None, Some(crs));
        self.geo(c.map(Criteria::Geo))
    }

    pub fn intersects(self, geometry: Geometry) -> S::Output {
        let c = GeoFieldCriteria::new(self.path.clone(), FilterOperator::Intersects, geometry, None, None);
        self.geo(c.map(Criteria::Geo))
    }

    pub fn intersects_crs(self, geometry: Geometry, crs: Crs) -> S::Output {
        let c = GeoFieldCriteria::new(self.path.clone(), FilterOperator::Intersects, geometry, None, Some(crs));
        self.geo(c.map(Criteria::Geo))
    }

    /// Legacy 2d `$near: [x, y]`.
    pub fn near_legacy(self, x: f64, y: f64, max_distance: Option<f64>) -> S::Output {
        let c = LegacyGeoCriteria::near(self.path.clone(), LegacyPoint::new(x, y), max_distance, false);
        self.geo(c.map(Criteria::LegacyGeo))
    }

    /// Legacy 2d `$nearSphere: [x, y]`, distance in radians.
    pub fn near_sphere(self, x: f64, y: f64, max_distance: Option<f64>) -> S::Output {
        let c = LegacyGeoCriteria::near(self.path.clone(), LegacyPoint::new(x, y), max_distance, true);
        self.geo(c.map(Criteria::LegacyGeo))
    }

    pub fn within_shape(self, shape: Shape) -> S::Output {
        let c = LegacyGeoCriteria::within(self.path.clone(), shape);
        self.geo(Ok(Criteria::LegacyGeo(c)))
    }
}
