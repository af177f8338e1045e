//! Deterministic cache keys.
//!
//! A key is the SHA-256 of a canonical JSON document built from the raw input
//! and its parameters:
//! - runs of whitespace collapse to one space, leading/trailing whitespace is dropped
//! - parameters are sorted by name (and nested objects by field)
//! - string parameter values get the same whitespace treatment as the input

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hash identifying one cacheable request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: String,
}

impl CacheKey {
    /// Key for an input with no parameters.
    pub fn from_input(input: &str) -> Self {
        Self::builder(input).build()
    }

    pub fn builder(input: impl Into<String>) -> CacheKeyBuilder {
        CacheKeyBuilder {
            input: input.into(),
            params: BTreeMap::new(),
        }
    }

    /// Hex-encoded SHA-256 digest.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Collects the input and parameters for a [`CacheKey`].
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    input: String,
    params: BTreeMap<String, Value>,
}

impl CacheKeyBuilder {
    /// Add a parameter that changes the result (top-k, model name, filters...).
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> CacheKey {
        let params: serde_json::Map<String, Value> = self
            .params
            .into_iter()
            .map(|(name, value)| (name, normalize_value(value)))
            .collect();

        let canonical = serde_json::json!({
            "input": normalize_whitespace(&self.input),
            "params": params,
        });

        let digest = Sha256::digest(canonical.to_string().as_bytes());
        CacheKey {
            hash: hex::encode(digest),
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(normalize_whitespace(&s)),
        other => other,
    }
}
