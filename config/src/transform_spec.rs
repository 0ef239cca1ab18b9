//! # Transform Specifications
//!
//! Field transforms are declared per target field either in compact form
//! (`"urlSafe"`, `"replaceSpaces:_"`) or as an object
//! (`{"type": "replace", "pattern": "\\d+", "replaceWith": "#"}`). A field may
//! also carry an ordered list of either form.
//!
//! Parsing never rejects an unrecognized transform name: it becomes
//! [`TransformSpec::Unknown`] so the value passes through unchanged at
//! mapping time. Only malformed shapes are errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const DEFAULT_SEPARATOR: &str = "-";

/// A single named transform with its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum TransformSpec {
    ReplaceSpaces {
        with: String,
    },
    UrlSafe {
        separator: String,
    },
    Lowercase,
    Uppercase,
    RemoveSpaces,
    Replace {
        pattern: String,
        replace_with: String,
        flags: String,
    },
    /// Unrecognized transform; applied as identity.
    Unknown {
        name: String,
    },
}

/// Shape errors raised while parsing a transform declaration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformSpecError {
    #[error("transform must be a string or an object, got {found}")]
    InvalidShape { found: &'static str },

    #[error("transform object requires a string `type`")]
    MissingType,

    #[error("`replace` transform requires a string `pattern`")]
    MissingPattern,

    #[error("transform option `{option}` must be a string")]
    InvalidOption { option: String },
}

impl TransformSpec {
    /// Parses one transform declaration (string or object).
    pub fn parse(value: &Value) -> Result<Self, TransformSpecError> {
        match value {
            Value::String(compact) => Ok(Self::from_compact(compact)),
            Value::Object(options) => Self::from_object(options),
            other => Err(TransformSpecError::InvalidShape {
                found: json_kind(other),
            }),
        }
    }

    /// Parses the compact `name` / `name:param` form. The parameter is
    /// everything after the first colon, so it may itself contain colons.
    pub fn from_compact(compact: &str) -> Self {
        let (name, param) = match compact.split_once(':') {
            Some((name, param)) => (name.trim(), Some(param)),
            None => (compact.trim(), None),
        };
        let param = param.map(str::to_string);

        match name {
            "replaceSpaces" => Self::ReplaceSpaces {
                with: param.unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            },
            "urlSafe" => Self::UrlSafe {
                separator: param.unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            },
            "lowercase" => Self::Lowercase,
            "uppercase" => Self::Uppercase,
            "removeSpaces" => Self::RemoveSpaces,
            // `replace` needs a pattern, which only the object form carries.
            other => Self::Unknown {
                name: other.to_string(),
            },
        }
    }

    fn from_object(options: &Map<String, Value>) -> Result<Self, TransformSpecError> {
        let kind = options
            .get("type")
            .and_then(Value::as_str)
            .ok_or(TransformSpecError::MissingType)?;

        let spec = match kind {
            "replaceSpaces" => Self::ReplaceSpaces {
                with: string_option(options, &["with", "replaceWith"])?
                    .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            },
            "urlSafe" => Self::UrlSafe {
                separator: string_option(options, &["with", "separator"])?
                    .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            },
            "lowercase" => Self::Lowercase,
            "uppercase" => Self::Uppercase,
            "removeSpaces" => Self::RemoveSpaces,
            "replace" => Self::Replace {
                pattern: string_option(options, &["pattern"])?
                    .ok_or(TransformSpecError::MissingPattern)?,
                replace_with: string_option(options, &["replaceWith"])?.unwrap_or_default(),
                flags: string_option(options, &["flags"])?.unwrap_or_else(|| "g".to_string()),
            },
            other => Self::Unknown {
                name: other.to_string(),
            },
        };

        Ok(spec)
    }

    /// Configuration name of this transform.
    pub fn name(&self) -> &str {
        match self {
            Self::ReplaceSpaces { .. } => "replaceSpaces",
            Self::UrlSafe { .. } => "urlSafe",
            Self::Lowercase => "lowercase",
            Self::Uppercase => "uppercase",
            Self::RemoveSpaces => "removeSpaces",
            Self::Replace { .. } => "replace",
            Self::Unknown { name } => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }
}

impl TryFrom<Value> for TransformSpec {
    type Error = TransformSpecError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TransformSpec> for Value {
    fn from(spec: TransformSpec) -> Self {
        match spec {
            TransformSpec::ReplaceSpaces { with } => {
                serde_json::json!({ "type": "replaceSpaces", "with": with })
            }
            TransformSpec::UrlSafe { separator } => {
                serde_json::json!({ "type": "urlSafe", "separator": separator })
            }
            TransformSpec::Replace {
                pattern,
                replace_with,
                flags,
            } => serde_json::json!({
                "type": "replace",
                "pattern": pattern,
                "replaceWith": replace_with,
                "flags": flags,
            }),
            TransformSpec::Lowercase
            | TransformSpec::Uppercase
            | TransformSpec::RemoveSpaces => Value::String(spec.name().to_string()),
            TransformSpec::Unknown { name } => Value::String(name),
        }
    }
}

/// Ordered transforms for one target field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct TransformChain(pub Vec<TransformSpec>);

impl TransformChain {
    /// Parses a single declaration or a list of declarations.
    pub fn parse(value: &Value) -> Result<Self, TransformSpecError> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(TransformSpec::parse)
                .collect::<Result<Vec<_>, _>>()
                .map(Self),
            single => TransformSpec::parse(single).map(|spec| Self(vec![spec])),
        }
    }

    pub fn specs(&self) -> &[TransformSpec] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Value> for TransformChain {
    type Error = TransformSpecError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TransformChain> for Value {
    fn from(chain: TransformChain) -> Self {
        Value::Array(chain.0.into_iter().map(Value::from).collect())
    }
}

fn string_option(
    options: &Map<String, Value>,
    keys: &[&str],
) -> Result<Option<String>, TransformSpecError> {
    for key in keys {
        match options.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => return Ok(Some(s.clone())),
            Some(_) => {
                return Err(TransformSpecError::InvalidOption {
                    option: (*key).to_string(),
                });
            }
        }
    }
    Ok(None)
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
