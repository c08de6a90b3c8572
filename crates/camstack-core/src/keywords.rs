//! Stream keywords: camera state read back after a start and recorded as
//! metadata of the acquisition stream.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KeywordValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for KeywordValue {
    fn from(v: bool) -> Self {
        KeywordValue::Bool(v)
    }
}

impl From<i64> for KeywordValue {
    fn from(v: i64) -> Self {
        KeywordValue::Int(v)
    }
}

impl From<u32> for KeywordValue {
    fn from(v: u32) -> Self {
        KeywordValue::Int(i64::from(v))
    }
}

impl From<f64> for KeywordValue {
    fn from(v: f64) -> Self {
        KeywordValue::Float(v)
    }
}

impl From<&str> for KeywordValue {
    fn from(v: &str) -> Self {
        KeywordValue::Text(v.to_string())
    }
}

impl From<String> for KeywordValue {
    fn from(v: String) -> Self {
        KeywordValue::Text(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamKeywords {
    stream: String,
    values: BTreeMap<String, KeywordValue>,
    updated_at: Option<DateTime<Utc>>,
}

impl StreamKeywords {
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            values: BTreeMap::new(),
            updated_at: None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<KeywordValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&KeywordValue> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &KeywordValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop every value, e.g. before a fresh read-back.
    pub fn clear(&mut self) {
        self.values.clear();
        self.updated_at = None;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}
