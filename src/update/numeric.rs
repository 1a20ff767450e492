//! Operand checks for `$inc`, `$max` and `$min`.

use bson::Bson;

use crate::errors::OdmError;

/// Accepts 32/64-bit integers and doubles; anything else, including
/// documents produced by wrapper types, is rejected.
pub(crate) fn numeric_operand(operator: &str, value: Bson) -> Result<Bson, OdmError> {
    match value {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Ok(value),
        other => Err(OdmError::IllegalArgument(format!(
            "{operator} needs an Int32, Int64 or Double value, got {:?}",
            other.element_type()
        ))),
    }
}

/// Negates an operand for `dec`. `i32::MIN` widens to `Int64`.
pub(crate) fn negate(value: Bson) -> Result<Bson, OdmError> {
    match value {
        Bson::Int32(i) => Ok(i.checked_neg().map_or(Bson::Int64(-i64::from(i)), Bson::Int32)),
        Bson::Int64(i) => i
            .checked_neg()
            .map(Bson::Int64)
            .ok_or_else(|| OdmError::IllegalArgument(format!("cannot decrement by {i}"))),
        Bson::Double(d) => Ok(Bson::Double(-d)),
        other => numeric_operand("$inc", other),
    }
}
