//! # Canonical JSON (JCS-like)
//!
//! Deterministic serialization used as the preimage for event hashes and
//! signatures. Any deviation between two implementations produces different
//! hashes and therefore invalid signatures, so the rules are strict:
//!
//! - Object keys sorted lexicographically at every nesting level.
//! - No insignificant whitespace.
//! - Numbers must be integers, emitted without exponent or fraction.
//!   Floats anywhere in the value are a [`CryptoError::Canonicalize`] error.
//! - Strings are UTF-8 with standard JSON escaping.
//!
//! `serde_json` is built with `arbitrary_precision`, so integer tokens above
//! 2^64 pass through losslessly; token amounts never degrade to floats.

use crate::errors::CryptoError;
use serde_json::Value;

/// Serialize a JSON value into its canonical byte form.
///
/// # Errors
///
/// Returns [`CryptoError::Canonicalize`] if the value contains a float or an
/// exponent-form number.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, CryptoError> {
    let mut out = Vec::with_capacity(256);
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), CryptoError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            let token = n.to_string();
            if token.contains(['.', 'e', 'E']) {
                return Err(CryptoError::Canonicalize {
                    reason: format!("non-integer number {token}"),
                });
            }
            out.extend_from_slice(token.as_bytes());
        }
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            // serde_json's default map is sorted, but the ordering is
            // re-established here so canonical output never depends on the
            // map implementation behind the Value.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_json_string(key, out);
                out.push(b':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

/// Standard JSON string escaping: the two mandatory escapes plus `\u00XX`
/// for remaining control characters. Everything else is raw UTF-8.
fn write_json_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\u{0C}' => out.extend_from_slice(b"\\f"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                let escaped = format!("\\u{:04x}", c as u32);
                out.extend_from_slice(escaped.as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_at_every_level() {
        let value = json!({
            "zeta": {"b": 1, "a": 2},
            "alpha": [{"y": true, "x": false}]
        });
        let bytes = canonicalize(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"alpha":[{"x":false,"y":true}],"zeta":{"a":2,"b":1}}"#
        );
    }

    #[test]
    fn test_no_whitespace() {
        let value = json!({"a": [1, 2, 3], "b": "c d"});
        let bytes = canonicalize(&value).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":[1,2,3],"b":"c d"}"#);
    }

    #[test]
    fn test_float_rejected() {
        let value = json!({"amount": 1.5});
        let result = canonicalize(&value);
        assert!(matches!(result, Err(CryptoError::Canonicalize { .. })));
    }

    #[test]
    fn test_big_integer_preserved() {
        // 2^80, beyond u64
        let value: Value =
            serde_json::from_str(r#"{"amount":1208925819614629174706176}"#).unwrap();
        let bytes = canonicalize(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"amount":1208925819614629174706176}"#
        );
    }

    #[test]
    fn test_string_escapes() {
        let value = json!({"s": "line\nbreak \"quote\" \u{01}"});
        let bytes = canonicalize(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\"s\":\"line\\nbreak \\\"quote\\\" \\u0001\"}"
        );
    }

    #[test]
    fn test_roundtrip_is_fixed_point() {
        let value = json!({"b": {"d": [1, "two", null], "c": true}, "a": 7});
        let once = canonicalize(&value).unwrap();
        let reparsed: Value = serde_json::from_slice(&once).unwrap();
        let twice = canonicalize(&reparsed).unwrap();
        assert_eq!(once, twice);
    }
}
