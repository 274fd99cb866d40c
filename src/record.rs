//! Structured records and the per-row assembler.

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    error::{CsvRecordsError, Result},
    schema::Schema,
    value::{TypedValue, convert_field},
};

/// Field name to typed value (or null), in schema order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredRecord {
    entries: Vec<(String, Option<TypedValue>)>,
}

impl StructuredRecord {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Option<TypedValue>) {
        self.entries.push((name.into(), value));
    }

    /// `None` when the field is unknown, `Some(None)` when it is null.
    pub fn get(&self, name: &str) -> Option<Option<&TypedValue>> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&TypedValue>)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for StructuredRecord {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Builds [`StructuredRecord`]s for one file.
///
/// Each schema field is bound once to a raw column: an exact name match wins,
/// otherwise the first case-insensitive match. Without a header, fields bind
/// by position.
#[derive(Debug, Clone)]
pub struct RecordAssembler<'a> {
    schema: &'a Schema,
    column_map: Vec<Option<usize>>,
    provenance: Option<(String, String)>,
}

impl<'a> RecordAssembler<'a> {
    pub fn new(schema: &'a Schema, columns: Option<&[String]>) -> Self {
        let column_map = match columns {
            Some(columns) => schema
                .fields
                .iter()
                .map(|field| match_column(&field.name, columns))
                .collect(),
            None => (0..schema.fields.len()).map(Some).collect(),
        };
        Self {
            schema,
            column_map,
            provenance: None,
        }
    }

    /// Appends `field = value` as the last entry of every record.
    pub fn with_provenance(mut self, field: &str, value: impl Into<String>) -> Result<Self> {
        if self.schema.contains(field) {
            return Err(CsvRecordsError::configuration(format!(
                "Provenance field \"{field}\" overrides another field"
            )));
        }
        self.provenance = Some((field.to_string(), value.into()));
        Ok(self)
    }

    /// Schema fields that found no raw column and will always be null.
    pub fn unmatched_fields(&self) -> Vec<&str> {
        self.schema
            .fields
            .iter()
            .zip(&self.column_map)
            .filter(|(_, column)| column.is_none())
            .map(|(field, _)| field.name.as_str())
            .collect()
    }

    pub fn assemble(&self, row: &[String]) -> Result<StructuredRecord> {
        let mut record = StructuredRecord::with_capacity(self.schema.len() + 1);
        for (field, column) in self.schema.fields.iter().zip(&self.column_map) {
            let raw = column.and_then(|idx| row.get(idx)).map(String::as_str);
            let value = convert_field(raw, field)?;
            record.push(field.name.as_str(), value);
        }
        if let Some((name, value)) = &self.provenance {
            record.push(name.as_str(), Some(TypedValue::String(value.clone())));
        }
        Ok(record)
    }
}

fn match_column(name: &str, columns: &[String]) -> Option<usize> {
    columns.iter().position(|c| c == name).or_else(|| {
        let lowered = name.to_lowercase();
        columns.iter().position(|c| c.to_lowercase() == lowered)
    })
}
