//! Receive-and-convert: parse whole files and publish each as one batch.

use std::path::Path;

use log::{debug, info};

use crate::{
    config::ConvertSettings,
    error::Result,
    io_utils::Dialect,
    reader::RecordStream,
    record::{RecordAssembler, StructuredRecord},
    schema::Schema,
    sink::RecordSink,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub files: usize,
    pub records: usize,
}

/// Converts every data row of `path`. The provenance field, when given,
/// records the path as passed in.
pub fn convert_file(
    path: &Path,
    schema: &Schema,
    provenance: Option<&str>,
    dialect: &Dialect,
) -> Result<Vec<StructuredRecord>> {
    let mut stream = RecordStream::open(path, dialect)?;
    let columns = stream.header()?.map(<[String]>::to_vec);
    if dialect.has_headers && columns.is_none() {
        debug!("{path:?} has no header row; nothing to convert");
        return Ok(Vec::new());
    }

    let mut assembler = RecordAssembler::new(schema, columns.as_deref());
    if let Some(field) = provenance {
        assembler = assembler.with_provenance(field, path.display().to_string())?;
    }
    let unmatched = assembler.unmatched_fields();
    if !unmatched.is_empty() {
        debug!("Fields without a matching column in {path:?}: {unmatched:?}");
    }

    let mut records = Vec::new();
    while let Some(row) = stream.next() {
        let row = row?;
        let record = assembler
            .assemble(&row)
            .map_err(|err| err.with_row(stream.row_number()).with_path(path))?;
        records.push(record);
    }
    Ok(records)
}

/// Validates `settings`, then converts and publishes each input in order.
/// The first failing file stops the run; batches already published stay
/// published.
pub fn convert_files(settings: &ConvertSettings, sink: &mut dyn RecordSink) -> Result<ConvertSummary> {
    settings.validate()?;
    let mut summary = ConvertSummary::default();
    for input in &settings.inputs {
        let records = convert_file(
            input,
            &settings.schema,
            settings.provenance(),
            &settings.dialect_for(input),
        )?;
        let count = records.len();
        sink.publish(records)?;
        info!("Converted {count} record(s) from {input:?}");
        summary.files += 1;
        summary.records += count;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::CsvRecordsError,
        schema::{FieldDefinition, FieldType},
        sink::MemorySink,
        value::TypedValue,
    };
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDefinition::new("id", FieldType::Long),
            FieldDefinition::new("reading", FieldType::Double),
        ])
        .unwrap()
    }

    #[test]
    fn convert_file_types_rows_and_stops_at_sentinel() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("in.csv");
        std::fs::write(&path, "ID,reading,extra\n1,2.5,x\n2,,y\n\0\n3,9,z\n").unwrap();

        let records = convert_file(&path, &schema(), Some("File"), &Dialect::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id"), Some(Some(&TypedValue::Long(1))));
        assert_eq!(records[1].get("reading"), Some(None));
        assert_eq!(records[0].get("extra"), None);
        assert_eq!(
            records[0].get("File"),
            Some(Some(&TypedValue::String(path.display().to_string())))
        );
    }

    #[test]
    fn convert_file_reports_row_and_path_on_bad_value() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "id,reading\n1,2\n2,warm\n").unwrap();

        let err = convert_file(&path, &schema(), None, &Dialect::default()).unwrap_err();
        match err {
            CsvRecordsError::Conversion {
                field,
                raw_value,
                row,
                path: err_path,
                ..
            } => {
                assert_eq!(field, "reading");
                assert_eq!(raw_value, "warm");
                assert_eq!(row, Some(3));
                assert_eq!(err_path, Some(path));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn convert_files_publishes_one_batch_per_file() {
        let dir = tempdir().expect("temp dir");
        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.csv");
        std::fs::write(&first, "id,reading\n1,1\n2,2\n").unwrap();
        std::fs::write(&second, "id,reading\n3,3\n").unwrap();

        let settings = ConvertSettings {
            inputs: vec![first, second],
            schema: schema(),
            provenance_field: None,
            dialect: Dialect::default(),
            delimiter: None,
        };
        let mut sink = MemorySink::new();
        let summary = convert_files(&settings, &mut sink).unwrap();
        assert_eq!(summary, ConvertSummary { files: 2, records: 3 });
        assert_eq!(sink.batches.len(), 2);
        assert_eq!(sink.batches[1].len(), 1);
    }

    #[test]
    fn convert_files_validates_before_reading() {
        let settings = ConvertSettings {
            inputs: vec![PathBuf::from("does-not-exist.csv")],
            schema: Schema::default(),
            provenance_field: None,
            dialect: Dialect::default(),
            delimiter: None,
        };
        let mut sink = MemorySink::new();
        assert!(matches!(
            convert_files(&settings, &mut sink),
            Err(CsvRecordsError::Configuration { .. })
        ));
        assert!(sink.batches.is_empty());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = convert_file(
            Path::new("does-not-exist.csv"),
            &schema(),
            None,
            &Dialect::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CsvRecordsError::Io { .. }));
    }
}
