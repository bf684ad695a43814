//! Folding fetched records into a summary.
//!
//! The summary maps each field name to the distinct canonical strings seen for
//! it. Both the field order and each field's value order follow first
//! occurrence across the input, so the same input always produces the same
//! summary.

use std::collections::{HashMap, HashSet};

use serde::ser::{Serialize, SerializeMap, Serializer};

use recap_proto as proto;

use crate::record::Record;

/// Distinct values observed for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    /// Field name as defined by the record schema.
    pub field: String,
    /// Distinct canonical strings in first-occurrence order.
    pub values: Vec<String>,
}

/// Field name → distinct canonical values, insertion ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    entries: Vec<SummaryEntry>,
    /// Field name → position in `entries`.
    index: HashMap<String, usize>,
    /// (entry position, value) pairs already recorded.
    seen: HashSet<(usize, String)>,
}

impl Summary {
    /// Create an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` for `field` unless that exact string is already present.
    ///
    /// Returns `true` if the value was added.
    pub fn insert(&mut self, field: &str, value: String) -> bool {
        let position = match self.index.get(field) {
            Some(&position) => position,
            None => {
                let position = self.entries.len();
                self.entries.push(SummaryEntry {
                    field: field.to_string(),
                    values: Vec::new(),
                });
                self.index.insert(field.to_string(), position);
                position
            }
        };
        if !self.seen.insert((position, value.clone())) {
            return false;
        }
        self.entries[position].values.push(value);
        true
    }

    /// Values recorded for `field`, if the field was ever present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.index
            .get(field)
            .map(|&position| self.entries[position].values.as_slice())
    }

    /// All entries in first-occurrence order.
    #[must_use]
    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    /// Field names in first-occurrence order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.field.as_str())
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no field was ever present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.field, &entry.values)?;
        }
        map.end()
    }
}

impl From<&Summary> for proto::SaveSummaryRequest {
    fn from(summary: &Summary) -> Self {
        Self {
            entries: summary
                .entries
                .iter()
                .map(|entry| proto::SummaryEntry {
                    field: entry.field.clone(),
                    values: entry.values.clone(),
                })
                .collect(),
        }
    }
}

/// Fold `records` into a summary.
///
/// Absent values are skipped; scalars use their default string form and
/// sequences are joined with `,`. Deduplication is by exact string equality.
#[must_use]
pub fn aggregate(records: &[Record]) -> Summary {
    let mut summary = Summary::new();
    for record in records {
        for (field, value) in record.fields() {
            let Some(value) = value else { continue };
            let canonical = value.canonical();
            if summary.insert(field, canonical) {
                tracing::trace!(field, kind = %record.kind(), "new summary value");
            }
        }
    }
    tracing::debug!(
        records = records.len(),
        fields = summary.len(),
        "formed summary"
    );
    summary
}
