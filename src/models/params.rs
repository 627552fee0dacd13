//! Parameter bags passed through to adapters untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single bind parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl ParamValue {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for the types projection.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// An ordered or named bag of bind parameters.
///
/// The pipeline forwards the whole bag to the adapter; only the `values` and
/// `types` projections are exposed, no coercion happens here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    Positional(Vec<ParamValue>),
    Named(BTreeMap<String, ParamValue>),
}

impl Params {
    /// An empty positional bag.
    pub fn none() -> Self {
        Self::Positional(Vec::new())
    }

    /// Build a positional bag.
    pub fn positional(values: impl IntoIterator<Item = ParamValue>) -> Self {
        Self::Positional(values.into_iter().collect())
    }

    /// Build a named bag.
    pub fn named(values: impl IntoIterator<Item = (String, ParamValue)>) -> Self {
        Self::Named(values.into_iter().collect())
    }

    /// The values projection, in bag order.
    pub fn values(&self) -> Vec<&ParamValue> {
        match self {
            Self::Positional(values) => values.iter().collect(),
            Self::Named(values) => values.values().collect(),
        }
    }

    /// The types projection, in bag order.
    pub fn types(&self) -> Vec<&'static str> {
        self.values().iter().map(|v| v.type_name()).collect()
    }

    /// Number of parameters in the bag.
    pub fn len(&self) -> usize {
        match self {
            Self::Positional(values) => values.len(),
            Self::Named(values) => values.len(),
        }
    }

    /// Check if the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::none()
    }
}
