//! Nested key-value archive used to persist component state.
//!
//! Serializes as a plain JSON object: strings, integers, booleans and nested
//! objects. Keys are kept sorted so written files are stable across saves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single archive value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BundleValue {
    Bool(bool),
    Int(i64),
    String(String),
    Bundle(Bundle),
}

/// Ordered string-keyed archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bundle {
    entries: BTreeMap<String, BundleValue>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .insert(key.into(), BundleValue::String(value.into()));
    }

    pub fn put_int(&mut self, key: impl Into<String>, value: i64) {
        self.entries.insert(key.into(), BundleValue::Int(value));
    }

    pub fn put_bool(&mut self, key: impl Into<String>, value: bool) {
        self.entries.insert(key.into(), BundleValue::Bool(value));
    }

    pub fn put_bundle(&mut self, key: impl Into<String>, value: Bundle) {
        self.entries.insert(key.into(), BundleValue::Bundle(value));
    }

    pub fn get(&self, key: &str) -> Option<&BundleValue> {
        self.entries.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            BundleValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.entries.get(key)? {
            BundleValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key)? {
            BundleValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_bundle(&self, key: &str) -> Option<&Bundle> {
        match self.entries.get(key)? {
            BundleValue::Bundle(value) => Some(value),
            _ => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<BundleValue> {
        self.entries.remove(key)
    }
}
