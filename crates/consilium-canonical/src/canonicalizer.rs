use canonical_json::to_string;
use serde_json::Value;

use std::fmt;

/// Default nesting limit for canonicalized values.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Error returned when canonicalization fails.
#[derive(thiserror::Error, Debug)]
pub enum CanonicalizationError {
    /// Provided JSON could not be canonicalized.
    #[error("invalid JSON structure: {0}")]
    InvalidStructure(String),
    /// A floating-point number reached the hash input.
    ///
    /// Amounts must be converted to their fixed-point text before hashing;
    /// float formatting is not stable enough to feed a digest.
    #[error("floating-point number not allowed at {0}")]
    FloatNotAllowed(String),
    /// Non-finite number (NaN/Infinity) detected.
    #[error("non-finite number detected at {0}")]
    NonFiniteNumber(String),
    /// Value nests deeper than the configured limit.
    #[error("nesting deeper than {max} at {path}")]
    TooDeep {
        /// Location of the offending value.
        path: String,
        /// Configured limit.
        max: usize,
    },
    /// Generic failure.
    #[error("other error: {0}")]
    Other(String),
}

/// Helper for building JSON paths during validation.
#[derive(Debug, Clone)]
struct Path {
    segments: Vec<String>,
}

impl Path {
    fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    fn push_field(&self, field: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(field.to_string());
        Self { segments }
    }

    fn push_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(format!("[{}]", index));
        Self { segments }
    }

    fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "root")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

/// Canonicalizer that emits deterministic bytes.
///
/// Output follows RFC 8785: object keys sorted by code point, no
/// insignificant whitespace. Inputs are restricted to strings, integers,
/// booleans, null, arrays and objects.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    max_depth: usize,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Canonicalizer {
    /// Creates a canonicalizer with the default nesting limit.
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Creates a canonicalizer with an explicit nesting limit.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Produces the canonical bytes for `value`.
    pub fn canonicalize(&self, value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
        self.validate(value, Path::root())?;

        // RFC 8785 encoding
        let canonical =
            to_string(value).map_err(|err| CanonicalizationError::Other(err.to_string()))?;
        Ok(canonical.into_bytes())
    }

    /// Produces the canonical form as a UTF-8 string.
    pub fn canonicalize_to_string(&self, value: &Value) -> Result<String, CanonicalizationError> {
        let bytes = self.canonicalize(value)?;
        String::from_utf8(bytes).map_err(|err| CanonicalizationError::Other(err.to_string()))
    }

    fn validate(&self, value: &Value, path: Path) -> Result<(), CanonicalizationError> {
        if path.depth() > self.max_depth {
            return Err(CanonicalizationError::TooDeep {
                path: path.to_string(),
                max: self.max_depth,
            });
        }
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    self.validate(child, path.push_field(key))?;
                }
                Ok(())
            }
            Value::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    self.validate(item, path.push_index(idx))?;
                }
                Ok(())
            }
            Value::Number(num) => {
                if num.is_u64() || num.is_i64() {
                    return Ok(());
                }
                match num.as_f64() {
                    Some(f) if !f.is_finite() => {
                        Err(CanonicalizationError::NonFiniteNumber(path.to_string()))
                    }
                    _ => Err(CanonicalizationError::FloatNotAllowed(path.to_string())),
                }
            }
            Value::String(s) => {
                if s.chars().any(|c| c == '\u{0}') {
                    return Err(CanonicalizationError::InvalidStructure(format!(
                        "{}: NUL character in string",
                        path
                    )));
                }
                Ok(())
            }
            Value::Bool(_) | Value::Null => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_and_strips_whitespace() {
        let value = json!({ "b": "2", "a": { "z": 1, "m": "x" } });
        let out = Canonicalizer::new().canonicalize_to_string(&value).unwrap();
        assert_eq!(out, r#"{"a":{"m":"x","z":1},"b":"2"}"#);
    }

    #[test]
    fn identical_values_give_identical_bytes() {
        let a = json!({ "x": "1", "y": [1, 2, 3] });
        let b = json!({ "y": [1, 2, 3], "x": "1" });
        let c = Canonicalizer::new();
        assert_eq!(c.canonicalize(&a).unwrap(), c.canonicalize(&b).unwrap());
    }

    #[test]
    fn rejects_floats() {
        let value = json!({ "amount": 50.5 });
        let err = Canonicalizer::new().canonicalize(&value).unwrap_err();
        assert!(matches!(err, CanonicalizationError::FloatNotAllowed(p) if p == "amount"));
    }

    #[test]
    fn rejects_excessive_nesting() {
        let value = json!({ "a": { "b": { "c": "d" } } });
        let err = Canonicalizer::with_max_depth(2).canonicalize(&value).unwrap_err();
        assert!(matches!(err, CanonicalizationError::TooDeep { max: 2, .. }));
    }
}
