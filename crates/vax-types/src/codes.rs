//! Whitespace-free identifiers for diseases, vaccine products, and priority groups.
//!
//! All three share the same lexical rules: 1 to 64 ASCII characters from `[A-Za-z0-9._-]`.
//! Case is preserved; identifiers compare exactly.

use std::fmt;

/// Errors returned when constructing an identifier.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodeError {
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },
    #[error("{kind} exceeds maximum length of {max} characters")]
    TooLong { kind: &'static str, max: usize },
    #[error("{kind} contains invalid characters (allowed: alphanumeric, '.', '-', '_'): '{value}'")]
    InvalidCharacters { kind: &'static str, value: String },
}

const MAX_CODE_LEN: usize = 64;

fn validate_code(kind: &'static str, input: &str) -> Result<String, CodeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CodeError::Empty { kind });
    }
    if trimmed.len() > MAX_CODE_LEN {
        return Err(CodeError::TooLong {
            kind,
            max: MAX_CODE_LEN,
        });
    }
    let ok = trimmed
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));
    if !ok {
        return Err(CodeError::InvalidCharacters {
            kind,
            value: trimmed.to_owned(),
        });
    }
    Ok(trimmed.to_owned())
}

macro_rules! code_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps an identifier.
            ///
            /// # Errors
            ///
            /// Returns [`CodeError`] if the trimmed input is empty, too long, or contains
            /// characters outside `[A-Za-z0-9._-]`.
            pub fn new(input: impl AsRef<str>) -> Result<Self, CodeError> {
                validate_code($kind, input.as_ref()).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = CodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

code_type!(
    /// Identifier of a disease programme (for example `covid-19` or `tbe`).
    DiseaseId,
    "disease id"
);

code_type!(
    /// Identifier of a vaccine product as listed in the dose-requirement catalog.
    ProductId,
    "product id"
);

code_type!(
    /// Code of a priority group a person belongs to (for example `P1`).
    PriorityCode,
    "priority code"
);
