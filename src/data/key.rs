//! Canonical row and column identifiers.
//!
//! Callers name rows and columns with either strings or integers. Both forms
//! are rendered to one canonical string as soon as they enter the store, so
//! `"0"` and `0` are the same column and nothing downstream ever needs to know
//! which form was used.

use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Borrow;
use std::sync::Arc;

use super::dataset::DatasetError;
use super::value::json_type_name;

/// An identifier as supplied by a caller, before canonicalization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum KeyInput {
    Int(i64),
    Str(String),
}

impl KeyInput {
    /// Canonical string form: integers in decimal, strings unchanged
    pub fn canonical(&self) -> String {
        match self {
            KeyInput::Int(i) => i.to_string(),
            KeyInput::Str(s) => s.clone(),
        }
    }
}

impl From<i64> for KeyInput {
    fn from(v: i64) -> Self {
        KeyInput::Int(v)
    }
}

impl From<i32> for KeyInput {
    fn from(v: i32) -> Self {
        KeyInput::Int(v as i64)
    }
}

impl From<u32> for KeyInput {
    fn from(v: u32) -> Self {
        KeyInput::Int(v as i64)
    }
}

impl From<&str> for KeyInput {
    fn from(v: &str) -> Self {
        KeyInput::Str(v.to_string())
    }
}

impl From<String> for KeyInput {
    fn from(v: String) -> Self {
        KeyInput::Str(v)
    }
}

/// Render a JSON key (string or integer) to its canonical form.
fn canonical_json(json: &serde_json::Value) -> Option<String> {
    match json {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_u64().map(|u| u.to_string())),
        _ => None,
    }
}

macro_rules! canonical_key {
    (@from $name:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for $name {
                fn from(input: $ty) -> Self {
                    Self::from(KeyInput::from(input))
                }
            }
        )*
    };
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<KeyInput> for $name {
            fn from(input: KeyInput) -> Self {
                Self(Arc::from(input.canonical()))
            }
        }

        canonical_key!(@from $name: i64, i32, u32, &str, String);

        impl From<$name> for KeyInput {
            fn from(key: $name) -> Self {
                KeyInput::Str(key.as_str().to_string())
            }
        }

        impl From<&$name> for KeyInput {
            fn from(key: &$name) -> Self {
                KeyInput::Str(key.as_str().to_string())
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }
    };
}

canonical_key!(
    /// Canonical column identity
    ColumnKey
);

canonical_key!(
    /// Canonical row identity, shown as `_rowName` in query output
    RowName
);

impl ColumnKey {
    pub fn from_json(json: &serde_json::Value) -> Result<Self, DatasetError> {
        canonical_json(json)
            .map(|s| Self(Arc::from(s)))
            .ok_or_else(|| DatasetError::InvalidColumnKey(json_type_name(json).to_string()))
    }
}

impl RowName {
    pub fn from_json(json: &serde_json::Value) -> Result<Self, DatasetError> {
        canonical_json(json)
            .map(|s| Self(Arc::from(s)))
            .ok_or_else(|| DatasetError::InvalidRowName(json_type_name(json).to_string()))
    }
}

/// Canonicalize a column identifier
pub fn canonicalize(key: impl Into<KeyInput>) -> ColumnKey {
    ColumnKey::from(key.into())
}
