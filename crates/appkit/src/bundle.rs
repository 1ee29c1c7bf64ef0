//! Typed parameter bundles passed to applications on start.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single bundle value.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleValue {
    Bool(bool),
    Int32(i32),
    String(String),
}

/// Key to typed-value map. Cloning copies every entry.
///
/// # Example
///
/// ```
/// use appkit::Bundle;
///
/// let mut bundle = Bundle::new();
/// bundle.put_string("ssid", "home");
/// bundle.put_int32("retries", 3);
/// assert_eq!(bundle.get_string("ssid"), Some("home"));
/// assert_eq!(bundle.get_bool("retries"), None);
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    entries: BTreeMap<String, BundleValue>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_bool(&mut self, key: impl Into<String>, value: bool) {
        self.entries.insert(key.into(), BundleValue::Bool(value));
    }

    pub fn put_int32(&mut self, key: impl Into<String>, value: i32) {
        self.entries.insert(key.into(), BundleValue::Int32(value));
    }

    pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .insert(key.into(), BundleValue::String(value.into()));
    }

    /// Returns the value for `key` if it is a bool.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key) {
            Some(BundleValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value for `key` if it is an int32.
    pub fn get_int32(&self, key: &str) -> Option<i32> {
        match self.entries.get(key) {
            Some(BundleValue::Int32(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value for `key` if it is a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(BundleValue::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn has_bool(&self, key: &str) -> bool {
        self.get_bool(key).is_some()
    }

    pub fn has_int32(&self, key: &str) -> bool {
        self.get_int32(key).is_some()
    }

    pub fn has_string(&self, key: &str) -> bool {
        self.get_string(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&BundleValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<BundleValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BundleValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}
