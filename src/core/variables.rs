/// Variable store: the integer fields Setter nodes write and Switch nodes read.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
}

/// Field name → value, restricted to the fields declared by the story.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariableStore {
    values: BTreeMap<String, i64>,
}

impl VariableStore {
    /// A store with every declared field set to 0.
    pub fn from_schema<S: AsRef<str>>(fields: &[S]) -> Self {
        let mut store = Self::default();
        store.seed(fields);
        store
    }

    /// Restore from a snapshot, keeping only declared fields and defaulting
    /// the missing ones to 0.
    pub fn restore<S: AsRef<str>>(fields: &[S], snapshot: &BTreeMap<String, i64>) -> Self {
        let mut values = BTreeMap::new();
        for (name, value) in snapshot {
            if fields.iter().any(|f| f.as_ref() == name) {
                values.insert(name.clone(), *value);
            } else {
                tracing::warn!(field = %name, "dropping saved value for undeclared field");
            }
        }
        let mut store = Self { values };
        store.seed(fields);
        store
    }

    /// Declare fields that are not present yet, with value 0. Existing values
    /// are left alone.
    pub fn seed<S: AsRef<str>>(&mut self, fields: &[S]) {
        for field in fields {
            self.values.entry(field.as_ref().to_string()).or_insert(0);
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<i64> {
        self.values.get(field).copied()
    }

    pub fn set(&mut self, field: &str, value: i64) -> Result<(), VariableError> {
        let slot = self
            .values
            .get_mut(field)
            .ok_or_else(|| VariableError::UnknownField(field.to_string()))?;
        *slot = value;
        Ok(())
    }

    /// Add `delta` to a field, saturating at the `i64` bounds.
    pub fn add(&mut self, field: &str, delta: i64) -> Result<(), VariableError> {
        let slot = self
            .values
            .get_mut(field)
            .ok_or_else(|| VariableError::UnknownField(field.to_string()))?;
        *slot = slot.saturating_add(delta);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A copy of the current values, suitable for a session snapshot.
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.values.clone()
    }
}
