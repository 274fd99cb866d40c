//! Preload-and-replay: materialize a whole file once, then emit one record per
//! external trigger.

use std::{io::Read, path::Path};

use log::{debug, info};

use crate::{
    config::ReplaySettings,
    error::{CsvRecordsError, Result},
    io_utils::Dialect,
    reader::RecordStream,
    record::{RecordAssembler, StructuredRecord},
    schema::{FieldDefinition, Schema},
    sink::RecordSink,
};

#[derive(Debug, Clone, Default)]
pub struct ReplayCursor {
    records: Vec<StructuredRecord>,
    attributes: Vec<FieldDefinition>,
    /// Count of triggers received; trigger `n` emits record `n - 1`.
    cursor: usize,
}

impl ReplayCursor {
    pub fn load(settings: &ReplaySettings) -> Result<Self> {
        settings.validate()?;
        let path = settings
            .input
            .as_deref()
            .ok_or_else(|| CsvRecordsError::configuration("CSV file not selected"))?;
        let stream = RecordStream::open(path, &settings.dialect)?;
        let cursor = Self::load_stream(stream, &settings.schema)?;
        info!("Preloaded {} record(s) from {path:?}", cursor.len());
        Ok(cursor)
    }

    /// Loads from already-available content, such as an uploaded file body.
    pub fn load_from_reader<R: Read>(
        reader: R,
        source: &Path,
        schema: &Schema,
        dialect: &Dialect,
    ) -> Result<Self> {
        Self::load_stream(RecordStream::from_reader(reader, source, dialect), schema)
    }

    fn load_stream<R: Read>(mut stream: RecordStream<R>, stored: &Schema) -> Result<Self> {
        let columns = stream.header()?.map(<[String]>::to_vec);
        if columns.is_none() && stream.state().is_terminated() {
            return Ok(Self::from_records(Vec::new(), stored.fields.clone()));
        }
        let schema = effective_schema(stored, columns.as_deref())?;
        let assembler = RecordAssembler::new(&schema, columns.as_deref());

        let mut records = Vec::new();
        while let Some(row) = stream.next() {
            let row = row?;
            let record = assembler
                .assemble(&row)
                .map_err(|err| err.with_row(stream.row_number()).with_path(stream.source()))?;
            records.push(record);
        }
        Ok(Self::from_records(records, schema.fields))
    }

    pub fn from_records(records: Vec<StructuredRecord>, attributes: Vec<FieldDefinition>) -> Self {
        Self {
            records,
            attributes,
            cursor: 0,
        }
    }

    /// Advances by one and publishes that record. Once past the end this is a
    /// no-op that returns `false`.
    pub fn trigger(&mut self, sink: &mut dyn RecordSink) -> Result<bool> {
        self.cursor = self.cursor.saturating_add(1);
        match self.records.get(self.cursor - 1) {
            Some(record) => {
                sink.publish(vec![record.clone()])?;
                Ok(true)
            }
            None => {
                debug!(
                    "Trigger {} ignored; only {} record(s) loaded",
                    self.cursor,
                    self.records.len()
                );
                Ok(false)
            }
        }
    }

    /// Shape of every emitted record.
    pub fn output_attributes(&self) -> &[FieldDefinition] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.records.len().saturating_sub(self.cursor)
    }
}

/// A stored schema wins; an empty one falls back to the header typed as text.
fn effective_schema(stored: &Schema, columns: Option<&[String]>) -> Result<Schema> {
    if !stored.is_empty() {
        return Ok(stored.clone());
    }
    match columns {
        Some(columns) => Schema::infer_from_header(columns),
        None => Err(CsvRecordsError::configuration(
            "A schema is required when the file has no header row",
        )),
    }
}
