//! Human-facing sequence numbers.
//!
//! A sequence value is derived from the highest value a field currently holds in a
//! collection. The computation is a read followed by arithmetic, not an atomic increment:
//! two callers that read before either writes get the same number. Callers that need uniqueness
//! must back the field with a unique index or serialize the calls themselves.

use bson::{Bson, Document};

use crate::document::get_path;

/// Step used when the caller does not supply one.
pub const DEFAULT_STEP: i64 = 1;

/// Computes the value following `highest`, the document holding the largest `field` value.
///
/// An empty collection (`highest` is `None`) yields `step`. A document without the field
/// counts as zero. A missing or zero step means [`DEFAULT_STEP`].
pub fn next_value(highest: Option<&Document>, field: &str, step: Option<i64>) -> i64 {
    let step = step.filter(|step| *step != 0).unwrap_or(DEFAULT_STEP);

    match highest {
        None => step,
        Some(document) => coerce_integer(get_path(document, field)).saturating_add(step),
    }
}

/// Coerces a stored value to an integer.
///
/// Integers are taken as-is, doubles are truncated, booleans count as 0 or 1 and numeric
/// strings are parsed. Missing, null and any other value count as zero.
pub fn coerce_integer(value: Option<&Bson>) -> i64 {
    match value {
        Some(Bson::Int32(value)) => i64::from(*value),
        Some(Bson::Int64(value)) => *value,
        Some(Bson::Double(value)) if value.is_finite() => value.trunc() as i64,
        Some(Bson::Boolean(value)) => i64::from(*value),
        Some(Bson::String(value)) => {
            let value = value.trim();
            value
                .parse::<i64>()
                .ok()
                .or_else(|| value.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}
