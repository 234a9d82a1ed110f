use serde_json::Value;

/// Trim whitespace and strip one pair of outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Numeric reading, or `None` for null/missing/non-numeric/non-finite input.
pub fn coerce_value(raw: Option<&Value>) -> Option<f64> {
    let v = match raw? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => clean_str(s).parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Text form of a date cell; empty strings count as missing.
pub fn date_text(raw: Option<&Value>) -> Option<String> {
    let text = match raw? {
        Value::String(s) => clean_str(s).to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_numeric_strings() {
        assert_eq!(coerce_value(Some(&json!(-210.5))), Some(-210.5));
        assert_eq!(coerce_value(Some(&json!(" -210.25 "))), Some(-210.25));
        assert_eq!(coerce_value(Some(&json!("\"-209\""))), Some(-209.0));
    }

    #[test]
    fn junk_is_unparseable() {
        assert_eq!(coerce_value(None), None);
        assert_eq!(coerce_value(Some(&Value::Null)), None);
        assert_eq!(coerce_value(Some(&json!("n/a"))), None);
        assert_eq!(coerce_value(Some(&json!(""))), None);
        assert_eq!(coerce_value(Some(&json!("NaN"))), None);
        assert_eq!(coerce_value(Some(&json!("inf"))), None);
        assert_eq!(coerce_value(Some(&json!(true))), None);
        assert_eq!(coerce_value(Some(&json!([1.0]))), None);
    }

    #[test]
    fn date_text_forms() {
        assert_eq!(date_text(Some(&json!(" 01/02/2020 "))), Some("01/02/2020".into()));
        assert_eq!(date_text(Some(&json!(20200102))), Some("20200102".into()));
        assert_eq!(date_text(Some(&json!("   "))), None);
        assert_eq!(date_text(Some(&Value::Null)), None);
    }
}
