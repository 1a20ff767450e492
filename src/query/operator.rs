use std::fmt;

use crate::errors::OdmError;

/// What kind of value an operator works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    Comparison,
    Array,
    Geo,
    Existence,
    Text,
    Evaluation,
}

/// The closed set of filter operators and their wire tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Exists,
    Type,
    Not,
    Mod,
    Size,
    In,
    NotIn,
    All,
    ElementMatch,
    Regex,
    Where,
    Near,
    NearSphere,
    GeoWithin,
    Intersects,
    WithinBox,
    WithinCircle,
    WithinCircleSphere,
    Polygon,
}

impl FilterOperator {
    pub const ALL: [Self; 25] = [
        Self::Equal,
        Self::NotEqual,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::Exists,
        Self::Type,
        Self::Not,
        Self::Mod,
        Self::Size,
        Self::In,
        Self::NotIn,
        Self::All,
        Self::ElementMatch,
        Self::Regex,
        Self::Where,
        Self::Near,
        Self::NearSphere,
        Self::GeoWithin,
        Self::Intersects,
        Self::WithinBox,
        Self::WithinCircle,
        Self::WithinCircleSphere,
        Self::Polygon,
    ];

    /// Symbolic upper-snake name, e.g. `GREATER_THAN`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::GreaterThan => "GREATER_THAN",
            Self::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            Self::LessThan => "LESS_THAN",
            Self::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            Self::Exists => "EXISTS",
            Self::Type => "TYPE",
            Self::Not => "NOT",
            Self::Mod => "MOD",
            Self::Size => "SIZE",
            Self::In => "IN",
            Self::NotIn => "NOT_IN",
            Self::All => "ALL",
            Self::ElementMatch => "ELEMENT_MATCH",
            Self::Regex => "REGEX",
            Self::Where => "WHERE",
            Self::Near => "NEAR",
            Self::NearSphere => "NEAR_SPHERE",
            Self::GeoWithin => "GEO_WITHIN",
            Self::Intersects => "INTERSECTS",
            Self::WithinBox => "WITHIN_BOX",
            Self::WithinCircle => "WITHIN_CIRCLE",
            Self::WithinCircleSphere => "WITHIN_CIRCLE_SPHERE",
            Self::Polygon => "POLYGON",
        }
    }

    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Equal => "$eq",
            Self::NotEqual => "$ne",
            Self::GreaterThan => "$gt",
            Self::GreaterThanOrEqual => "$gte",
            Self::LessThan => "$lt",
            Self::LessThanOrEqual => "$lte",
            Self::Exists => "$exists",
            Self::Type => "$type",
            Self::Not => "$not",
            Self::Mod => "$mod",
            Self::Size => "$size",
            Self::In => "$in",
            Self::NotIn => "$nin",
            Self::All => "$all",
            Self::ElementMatch => "$elemMatch",
            Self::Regex => "$regex",
            Self::Where => "$where",
            Self::Near => "$near",
            Self::NearSphere => "$nearSphere",
            Self::GeoWithin => "$geoWithin",
            Self::Intersects => "$geoIntersects",
            Self::WithinBox => "$box",
            Self::WithinCircle => "$center",
            Self::WithinCircleSphere => "$centerSphere",
            Self::Polygon => "$polygon",
        }
    }

    /// Spellings accepted in legacy condition strings besides the token.
    const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Equal => &["=", "=="],
            Self::NotEqual => &["!=", "<>"],
            Self::GreaterThan => &[">", "gt"],
            Self::GreaterThanOrEqual => &[">=", "gte"],
            Self::LessThan => &["<", "lt"],
            Self::LessThanOrEqual => &["<=", "lte"],
            Self::Exists => &["exists"],
            Self::Type => &["type"],
            Self::Mod => &["mod"],
            Self::Size => &["size"],
            Self::In => &["in"],
            Self::NotIn => &["nin"],
            Self::All => &["all"],
            Self::ElementMatch => &["elem", "elemMatch"],
            Self::Near => &["near"],
            Self::NearSphere => &["nearSphere"],
            Self::GeoWithin => &["geoWithin"],
            Self::Intersects => &["geoIntersects"],
            _ => &[],
        }
    }

    #[must_use]
    pub const fn class(self) -> OperatorClass {
        match self {
            Self::Equal
            | Self::NotEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual
            | Self::In
            | Self::NotIn
            | Self::Not => OperatorClass::Comparison,
            Self::Size | Self::All | Self::ElementMatch => OperatorClass::Array,
            Self::Exists | Self::Type => OperatorClass::Existence,
            Self::Regex => OperatorClass::Text,
            Self::Mod | Self::Where => OperatorClass::Evaluation,
            Self::Near
            | Self::NearSphere
            | Self::GeoWithin
            | Self::Intersects
            | Self::WithinBox
            | Self::WithinCircle
            | Self::WithinCircleSphere
            | Self::Polygon => OperatorClass::Geo,
        }
    }

    #[must_use]
    pub const fn is_geo(self) -> bool {
        matches!(self.class(), OperatorClass::Geo)
    }

    /// Looks an operator up by wire token or legacy alias.
    ///
    /// # Errors
    /// Returns `UnrecognizedOperator` for anything else.
    pub fn from_string(token: &str) -> Result<Self, OdmError> {
        let t = token.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.token() == t || op.aliases().contains(&t))
            .ok_or_else(|| OdmError::UnrecognizedOperator(token.to_string()))
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Symbolic suffixes that may be glued to the field name, longest first.
const SYMBOL_SUFFIXES: [&str; 8] = ["!=", "<>", ">=", "<=", "==", ">", "<", "="];

/// Splits a legacy condition such as `"age >="`, `"age>="`, `"tags in"` or
/// `"name"` into its field path and operator. No suffix means equality.
///
/// # Errors
/// Returns `UnrecognizedOperator` for an unknown suffix or extra words, and
/// `IllegalArgument` when no field name is present.
pub fn parse_condition(condition: &str) -> Result<(String, FilterOperator), OdmError> {
    let trimmed = condition.trim();
    let mut parts = trimmed.split_whitespace();
    let Some(head) = parts.next() else {
        return Err(OdmError::IllegalArgument("condition has no field name".into()));
    };
    let (field, op) = match (parts.next(), parts.next()) {
        (Some(op), None) => (head, FilterOperator::from_string(op)?),
        (Some(_), Some(_)) => return Err(OdmError::UnrecognizedOperator(trimmed.to_string())),
        (None, _) => match SYMBOL_SUFFIXES.iter().find(|s| head.ends_with(*s)) {
            Some(suffix) => {
                (&head[..head.len() - suffix.len()], FilterOperator::from_string(suffix)?)
            }
            None => (head, FilterOperator::Equal),
        },
    };
    if field.is_empty() {
        return Err(OdmError::IllegalArgument(format!("condition '{trimmed}' has no field name")));
    }
    Ok((field.to_string(), op))
}
