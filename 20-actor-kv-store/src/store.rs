//! In-memory key-value storage owned by the store task.
//!
//! `Store` has no synchronization of its own. It is only ever touched by the
//! single task spawned in [`crate::owner`], which applies commands one at a
//! time, so every method here runs to completion before the next one starts.

use std::collections::HashMap;

use thiserror::Error;

/// Errors produced by store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The stored value cannot be interpreted as a signed 64-bit integer, or
    /// incrementing it would overflow.
    #[error("value is not an integer or out of range")]
    NotAnInteger,
}

/// Key-value map holding opaque string values.
///
/// A missing key and a key holding an empty string are different states:
/// [`Store::get`] returns `None` for the former and `Some("")` for the latter.
#[derive(Debug, Default)]
pub struct Store {
    data: HashMap<String, String>,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Returns the current value for a key, or `None` if it was never set or
    /// has been deleted.
    pub fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    /// Stores a value, overwriting any previous one.
    pub fn set(&mut self, key: String, value: String) {
        self.data.insert(key, value);
    }

    /// Removes a key and returns how many keys were removed (0 or 1).
    pub fn del(&mut self, key: &str) -> u8 {
        match self.data.remove(key) {
            Some(_) => 1,
            None => 0,
        }
    }

    /// Increments the integer stored at `key` and returns the new value.
    ///
    /// A missing key starts from zero, so the first call yields `"1"`. If the
    /// current value is not a base-10 `i64`, the store is left untouched.
    pub fn incr(&mut self, key: &str) -> Result<String, StoreError> {
        let next = match self.data.get(key) {
            Some(current) => current
                .parse::<i64>()
                .ok()
                .and_then(|value| value.checked_add(1))
                .ok_or(StoreError::NotAnInteger)?,
            None => 1,
        };

        let rendered = next.to_string();
        self.data.insert(key.to_string(), rendered.clone());
        Ok(rendered)
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
