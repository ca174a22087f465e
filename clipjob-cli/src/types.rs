//! Common types used across CLI modules

use anyhow::Result;
use serde_json::{Number, Value};

/// Parse a single `key=value` job parameter
///
/// Values are typed the way a provider expects them: `true`/`false` become
/// booleans, integers and decimals become numbers, `null` becomes null and
/// everything else stays a string. Quote a value (`key='"42"'`) to force a
/// string.
pub fn parse_param(s: &str) -> Result<(String, Value)> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;

    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("invalid KEY=value: empty key in `{}`", s);
    }

    Ok((key.to_string(), parse_value(raw)))
}

fn parse_value(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Some(quoted) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return Value::String(quoted.to_string());
    }

    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }

    if let Some(number) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }

    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_param_types_values() {
        assert_eq!(parse_param("prompt=a cat").unwrap(), ("prompt".into(), json!("a cat")));
        assert_eq!(parse_param("num_frames=81").unwrap(), ("num_frames".into(), json!(81)));
        assert_eq!(parse_param("guidance=3.5").unwrap(), ("guidance".into(), json!(3.5)));
        assert_eq!(parse_param("go_fast=true").unwrap(), ("go_fast".into(), json!(true)));
        assert_eq!(parse_param("seed=null").unwrap(), ("seed".into(), Value::Null));
    }

    #[test]
    fn test_parse_param_keeps_equals_in_value() {
        assert_eq!(
            parse_param("prompt=x=y").unwrap(),
            ("prompt".into(), json!("x=y"))
        );
    }

    #[test]
    fn test_quoted_values_stay_strings() {
        assert_eq!(parse_param("seed=\"42\"").unwrap(), ("seed".into(), json!("42")));
    }

    #[test]
    fn test_parse_param_rejects_malformed() {
        assert!(parse_param("prompt").is_err());
        assert!(parse_param("=value").is_err());
    }

    #[test]
    fn test_non_finite_numbers_stay_strings() {
        assert_eq!(parse_param("x=NaN").unwrap(), ("x".into(), json!("NaN")));
        assert_eq!(parse_param("x=inf").unwrap(), ("x".into(), json!("inf")));
    }
}
