//! Helpers for type-erased JSON values handed over by the host

use serde_json::Value;

/// Truthiness as the host's expression language defines it: `false`,
/// `null`, `0`, `NaN` and `""` are false, everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A value counts as missing when absent, `null` or an empty string
pub fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        for falsy in [json!(false), json!(null), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&falsy), "{} should be falsy", falsy);
        }
        for truthy in [json!(true), json!(1), json!(-0.5), json!("false"), json!([]), json!({})] {
            assert!(is_truthy(&truthy), "{} should be truthy", truthy);
        }
    }

    #[test]
    fn test_missing() {
        assert!(is_missing(None));
        assert!(is_missing(Some(&json!(null))));
        assert!(is_missing(Some(&json!(""))));
        assert!(!is_missing(Some(&json!(0))));
        assert!(!is_missing(Some(&json!(false))));
        assert!(!is_missing(Some(&json!([]))));
    }
}
