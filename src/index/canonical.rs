//! Canonical key encoding
//!
//! Index keys are strings whose code-point lexicographic order matches
//! the semantic order of the values they encode:
//!
//! - `str` / non-numeric `auto`: the value's string form
//! - `num`: integer shifted by 10^12 and zero-padded to 20 digits, so
//!   negative values sort below positive ones
//! - `date`: ISO-8601 normalized to UTC
//! - `null`: the empty string
//!
//! Composite keys join per-field components with U+241E, a code point
//! that does not occur in ordinary field data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{IndexError, IndexResult};

/// Separator between components of a composite key
pub const COMPONENT_SEPARATOR: char = '\u{241E}';

/// Upper sentinel for open-ended composite range scans
pub const RANGE_SCAN_MAX: char = '\u{FFFF}';

/// Largest magnitude accepted by the numeric encoding
pub const NUM_KEY_BOUND: i64 = 1_000_000_000_000;

/// Per-field key encoding tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// String form of the value
    Str,
    /// Order-preserving integer encoding, ±10^12
    Num,
    /// ISO-8601 UTC string
    Date,
    /// Numbers use the num encoding, everything else the string form
    Auto,
}

/// Definition of one secondary or composite index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Indexed field names, in key order
    pub fields: Vec<String>,
    /// Encoding tag per field
    pub key_types: Vec<KeyType>,
    /// Whether the planner may serve ordered range queries from it
    pub ordered: bool,
}

impl IndexMeta {
    /// Single-field index definition
    pub fn single(field: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            fields: vec![field.into()],
            key_types: vec![key_type],
            ordered: true,
        }
    }

    /// Composite index definition over two or more fields
    pub fn composite<S, I>(fields: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, KeyType)>,
    {
        let (fields, key_types): (Vec<String>, Vec<KeyType>) = fields
            .into_iter()
            .map(|(field, key_type)| (field.into(), key_type))
            .unzip();
        Self {
            fields,
            key_types,
            ordered: true,
        }
    }

    /// Marks the index ineligible for ordered range planning
    pub fn unordered(mut self) -> Self {
        self.ordered = false;
        self
    }

    /// Index name: fields joined by `__`
    pub fn name(&self) -> String {
        self.fields.join("__")
    }

    /// Returns whether this index spans multiple fields
    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }

    /// On-disk file name for the index artifact
    pub fn file_name(&self) -> String {
        if self.is_composite() {
            format!("composite_{}.idx.json", self.fields.join("__"))
        } else {
            format!("secondary_{}.idx.json", self.fields[0])
        }
    }

    /// Key type declared for a field of this index
    pub fn key_type_for(&self, field: &str) -> Option<KeyType> {
        self.fields
            .iter()
            .position(|f| f == field)
            .map(|i| self.key_types[i])
    }
}

/// Encodes one value under a key type.
pub fn canonical_value(value: &Value, key_type: KeyType) -> IndexResult<String> {
    match (key_type, value) {
        (_, Value::Null) => Ok(String::new()),
        (KeyType::Num, Value::Number(n)) => canonical_num(value, n),
        (KeyType::Auto, Value::Number(n)) => canonical_num(value, n),
        (KeyType::Date, Value::String(s)) => Ok(canonical_date(s)),
        _ => Ok(string_form(value)),
    }
}

fn canonical_num(value: &Value, n: &serde_json::Number) -> IndexResult<String> {
    let i = n.as_i64().ok_or_else(|| IndexError::out_of_range(value))?;
    if i < -NUM_KEY_BOUND || i > NUM_KEY_BOUND {
        return Err(IndexError::out_of_range(value));
    }
    Ok(format!("{:020}", i + NUM_KEY_BOUND))
}

/// RFC 3339 timestamps are normalized to UTC; anything else indexes
/// under its raw string form.
fn canonical_date(s: &str) -> String {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.with_timezone(&Utc).to_rfc3339(),
        Err(_) => s.to_string(),
    }
}

fn string_form(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Joins composite key components with the record separator.
pub fn composite_key<S: AsRef<str>>(components: &[S]) -> String {
    let mut key = String::new();
    for (i, component) in components.iter().enumerate() {
        if i > 0 {
            key.push(COMPONENT_SEPARATOR);
        }
        key.push_str(component.as_ref());
    }
    key
}

/// Builds the canonical key a document contributes to an index.
///
/// Single-field indexes only link documents that carry the field.
/// Composite indexes always produce a key, substituting the empty string
/// for each missing field.
pub fn key_for_document(doc: &Map<String, Value>, meta: &IndexMeta) -> IndexResult<Option<String>> {
    if !meta.is_composite() {
        let field = &meta.fields[0];
        return match doc.get(field) {
            Some(value) => Ok(Some(canonical_value(value, meta.key_types[0])?)),
            None => Ok(None),
        };
    }

    let mut components = Vec::with_capacity(meta.fields.len());
    for (field, key_type) in meta.fields.iter().zip(meta.key_types.iter()) {
        let component = match doc.get(field) {
            Some(value) => canonical_value(value, *key_type)?,
            None => String::new(),
        };
        components.push(component);
    }
    Ok(Some(composite_key(&components)))
}
