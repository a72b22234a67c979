//! Typed placeholder converters
//!
//! Each placeholder in a route pattern carries one of a closed set of converters.
//! A converter both matches a path segment and coerces it into a typed [`Value`].

use std::fmt;

use thiserror::Error;

/// Converter attached to a route placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// Any non-empty segment without a slash (default)
    String,
    /// Non-negative integer, `^[0-9]+$`
    Int,
    /// Non-negative decimal with a fractional part, `^[0-9]+\.[0-9]+$`
    Float,
    /// One or more segments, slashes included
    Path,
}

/// Value extracted from a path segment
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(u64),
    Float(f64),
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("empty segment")]
    Empty,
    #[error("'{0}' contains a slash")]
    Slash(String),
    #[error("'{0}' is not a non-negative integer")]
    NotAnInteger(String),
    #[error("'{0}' is not a non-negative decimal")]
    NotAFloat(String),
}

impl Converter {
    /// Look up a converter by the name used inside `<name:var>`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "path" => Some(Self::Path),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Path => "path",
        }
    }

    /// Coerce a decoded segment (or, for `path`, the joined tail) into a value
    pub fn convert(self, raw: &str) -> Result<Value, ConversionError> {
        if raw.is_empty() {
            return Err(ConversionError::Empty);
        }
        match self {
            Self::String => {
                if raw.contains('/') {
                    return Err(ConversionError::Slash(raw.to_string()));
                }
                Ok(Value::Str(raw.to_string()))
            }
            Self::Int => {
                if !is_digits(raw) {
                    return Err(ConversionError::NotAnInteger(raw.to_string()));
                }
                raw.parse::<u64>()
                    .map(Value::Int)
                    .map_err(|_| ConversionError::NotAnInteger(raw.to_string()))
            }
            Self::Float => {
                let valid = raw
                    .split_once('.')
                    .is_some_and(|(whole, frac)| is_digits(whole) && is_digits(frac));
                if !valid {
                    return Err(ConversionError::NotAFloat(raw.to_string()));
                }
                raw.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| ConversionError::NotAFloat(raw.to_string()))
            }
            Self::Path => Ok(Value::Path(raw.to_string())),
        }
    }
}

impl fmt::Display for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Path(s) => Some(s),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Render the value the way it appears in a URL, before percent-encoding.
    ///
    /// Floats always keep a fractional part so that they convert back.
    pub fn to_url_text(&self) -> String {
        match self {
            Self::Str(s) | Self::Path(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Float(n) => {
                let text = n.to_string();
                if text.contains('.') {
                    text
                } else {
                    format!("{text}.0")
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
