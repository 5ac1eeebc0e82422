// =============================================================================
// Numeric coercion — single ingest-boundary helper for number-or-string JSON
// =============================================================================
//
// Upstream payloads mix numbers and numeric strings in the same field across
// different endpoints (and sometimes across different entries of the same
// endpoint). Every ingest site goes through `as_finite_number` so there is
// exactly one place that defines what "a usable number" means: finite,
// parseable, and never retained in its raw `Value` form beyond this call
// (Design Note "Dynamic number coercion").

use serde_json::Value;

/// Coerce a JSON value that may be a number or a numeric string into a finite
/// `f64`. Returns `None` for anything else, including `NaN`/`Infinity`.
pub fn as_finite_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() {
        Some(n)
    } else {
        None
    }
}

/// Same as [`as_finite_number`] but falls back to `default` instead of
/// `None`.
pub fn as_finite_number_or(value: &Value, default: f64) -> f64 {
    as_finite_number(value).unwrap_or(default)
}

/// Coerce to a non-negative integer, clamping negative or non-finite values
/// to zero and truncating fractional values.
pub fn as_non_negative_u64(value: &Value) -> u64 {
    as_finite_number(value)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64)
        .unwrap_or(0)
}

/// Clamp a win-rate-like value into `[0, 1]`, defaulting to `0.0` when the
/// value cannot be coerced at all.
pub fn as_unit_fraction(value: &Value) -> f64 {
    as_finite_number(value).unwrap_or(0.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        assert_eq!(as_finite_number(&json!(1.5)), Some(1.5));
        assert_eq!(as_finite_number(&json!("1.5")), Some(1.5));
        assert_eq!(as_finite_number(&json!("  2 ")), Some(2.0));
    }

    #[test]
    fn rejects_non_finite_and_garbage() {
        assert_eq!(as_finite_number(&json!("not-a-number")), None);
        assert_eq!(as_finite_number(&json!(null)), None);
        assert_eq!(as_finite_number(&json!(true)), None);
    }

    #[test]
    fn unit_fraction_clamps() {
        assert_eq!(as_unit_fraction(&json!(1.5)), 1.0);
        assert_eq!(as_unit_fraction(&json!(-0.3)), 0.0);
        assert_eq!(as_unit_fraction(&json!("bogus")), 0.0);
    }

    #[test]
    fn non_negative_u64_floors_negatives() {
        assert_eq!(as_non_negative_u64(&json!(-5)), 0);
        assert_eq!(as_non_negative_u64(&json!(42)), 42);
        assert_eq!(as_non_negative_u64(&json!("17")), 17);
    }
}
