// SPDX-License-Identifier: GPL-3.0-only

//! Typed values extracted from diagnostic tool output

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field name → typed value, ordered by name.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single extracted value.
///
/// Numeric values are always fully decoded; a field that could not be
/// parsed is absent from its [`FieldMap`] rather than stored as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(u64),
    Flag(bool),
    Text(String),
    /// Repeated group (firmware slots, error-log entries, LBA formats, ...)
    Group(Vec<FieldMap>),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&[FieldMap]> {
        match self {
            Self::Group(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<FieldMap>> for FieldValue {
    fn from(entries: Vec<FieldMap>) -> Self {
        Self::Group(entries)
    }
}

/// Typed lookups on a [`FieldMap`].
pub trait FieldMapExt {
    fn int(&self, name: &str) -> Option<u64>;
    fn flag(&self, name: &str) -> Option<bool>;
    fn text(&self, name: &str) -> Option<&str>;
    fn group(&self, name: &str) -> Option<&[FieldMap]>;
}

impl FieldMapExt for FieldMap {
    fn int(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(FieldValue::as_int)
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(FieldValue::as_flag)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    fn group(&self, name: &str) -> Option<&[FieldMap]> {
        self.get(name).and_then(FieldValue::as_group)
    }
}
