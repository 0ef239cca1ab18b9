//! Field value transforms.
//!
//! Transforms operate on strings. Falsy values (null, `false`, `0`, empty
//! string) are returned untouched without running the transform, other
//! non-string values are coerced to strings first. A failing transform never
//! fails the record: the value it was given is kept and a warning is logged.

use config::TransformSpec;
use regex::{NoExpand, Regex};
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error
    },

    #[error("unsupported regex flag `{0}`")]
    UnsupportedFlag(char)
}

/// Applies one transform to a field value.
pub fn apply_transform(value: &Value, spec: &TransformSpec, field: &str) -> Value {
    if is_falsy(value) {
        return value.clone();
    }

    let text = match value {
        Value::String(s) => s.clone(),
        other => {
            debug!(field, kind = ?other, "Coercing non-string value before transform");
            coerce_to_string(other)
        }
    };

    match transform_str(&text, spec) {
        Ok(transformed) => Value::String(transformed),
        Err(e) => {
            warn!(field, transform = spec.name(), error = %e, "Transform failed, keeping original value");
            value.clone()
        }
    }
}

/// Folds a value through an ordered list of transforms, left to right.
pub fn apply_multiple_transforms(value: &Value, specs: &[TransformSpec], field: &str) -> Value {
    specs
        .iter()
        .fold(value.clone(), |current, spec| apply_transform(&current, spec, field))
}

/// String-level transform dispatch.
pub fn transform_str(value: &str, spec: &TransformSpec) -> Result<String, TransformError> {
    let transformed = match spec {
        TransformSpec::ReplaceSpaces { with } => {
            WHITESPACE.replace_all(value, NoExpand(with)).into_owned()
        }
        TransformSpec::UrlSafe { separator } => url_safe(value, separator)?,
        TransformSpec::Lowercase => value.to_lowercase(),
        TransformSpec::Uppercase => value.to_uppercase(),
        TransformSpec::RemoveSpaces => WHITESPACE.replace_all(value, "").into_owned(),
        TransformSpec::Replace {
            pattern,
            replace_with,
            flags
        } => regex_replace(value, pattern, replace_with, flags)?,
        TransformSpec::Unknown { name } => {
            debug!(transform = %name, "Unknown transform, value passed through");
            value.to_string()
        }
    };
    Ok(transformed)
}

fn url_safe(value: &str, separator: &str) -> Result<String, TransformError> {
    let lowered = value.to_lowercase();
    let separated = WHITESPACE.replace_all(&lowered, NoExpand(separator));

    let kept: String = separated
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || separator.contains(*c))
        .collect();

    if separator.is_empty() {
        return Ok(kept);
    }

    let escaped = regex::escape(separator);
    let repeated = compile(&format!("(?:{escaped}){{2,}}"))?;
    let collapsed = repeated.replace_all(&kept, NoExpand(separator));

    let mut trimmed = collapsed.as_ref();
    while let Some(rest) = trimmed.strip_prefix(separator) {
        trimmed = rest;
    }
    while let Some(rest) = trimmed.strip_suffix(separator) {
        trimmed = rest;
    }

    Ok(trimmed.to_string())
}

fn regex_replace(
    value: &str,
    pattern: &str,
    replace_with: &str,
    flags: &str
) -> Result<String, TransformError> {
    let mut global = false;
    let mut inline = String::new();

    for flag in flags.chars() {
        match flag {
            'g' => global = true,
            'i' | 'm' | 's' => inline.push(flag),
            // Unicode is always on.
            'u' => {}
            other => return Err(TransformError::UnsupportedFlag(other))
        }
    }

    let full_pattern = if inline.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{inline}){pattern}")
    };
    let regex = compile(&full_pattern)?;

    let replaced = if global {
        regex.replace_all(value, replace_with)
    } else {
        regex.replace(value, replace_with)
    };
    Ok(replaced.into_owned())
}

fn compile(pattern: &str) -> Result<Regex, TransformError> {
    Regex::new(pattern).map_err(|source| TransformError::InvalidPattern {
        pattern: pattern.to_string(),
        source
    })
}

pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false
    }
}

pub(crate) fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string()
    }
}
