//! Settings for each conversion shape, validated before any row is read.

use std::path::{Path, PathBuf};

use crate::{
    error::{CsvRecordsError, Result},
    io_utils::{self, Dialect},
    schema::Schema,
};

#[derive(Debug, Clone)]
pub struct ConvertSettings {
    pub inputs: Vec<PathBuf>,
    pub schema: Schema,
    pub provenance_field: Option<String>,
    pub dialect: Dialect,
    /// Explicit delimiter for every input. When unset, each input's extension
    /// picks its own.
    pub delimiter: Option<u8>,
}

impl ConvertSettings {
    /// Dialect for one input file.
    pub fn dialect_for(&self, input: &Path) -> Dialect {
        self.dialect
            .with_delimiter(io_utils::resolve_input_delimiter(input, self.delimiter))
    }

    /// Provenance field name, ignoring blank values.
    pub fn provenance(&self) -> Option<&str> {
        self.provenance_field
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Collects every problem, then fails once with all of them.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.inputs.is_empty() {
            problems.push("CSV file not selected".to_string());
        }
        if self.schema.is_empty() {
            problems.push("Record fields should be defined".to_string());
        }
        for (idx, field) in self.schema.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                problems.push(format!(
                    "Name not defined for field at position {}",
                    idx + 1
                ));
            }
            if self.provenance() == Some(field.name.as_str()) {
                problems.push(format!(
                    "Provenance field \"{}\" overrides another field",
                    field.name
                ));
            }
        }
        if problems.is_empty() {
            self.schema.validate()
        } else {
            Err(CsvRecordsError::Configuration { problems })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplaySettings {
    pub input: Option<PathBuf>,
    pub schema: Schema,
    pub dialect: Dialect,
}

impl ReplaySettings {
    pub fn validate(&self) -> Result<()> {
        if self.input.is_none() {
            return Err(CsvRecordsError::configuration("CSV file not selected"));
        }
        self.schema.validate()
    }
}

#[derive(Debug, Clone)]
pub struct RewriteSettings {
    pub output_directory: Option<PathBuf>,
    /// Appended to the input file stem; include the leading dot.
    pub extension: String,
    pub dialect: Dialect,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self {
            output_directory: None,
            extension: ".csv".to_string(),
            dialect: Dialect::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, FieldType};

    fn settings(inputs: Vec<PathBuf>, schema: Schema, provenance: Option<&str>) -> ConvertSettings {
        ConvertSettings {
            inputs,
            schema,
            provenance_field: provenance.map(str::to_string),
            dialect: Dialect::default(),
            delimiter: None,
        }
    }

    #[test]
    fn dialect_follows_each_input_unless_delimiter_is_explicit() {
        let mut mixed = settings(Vec::new(), Schema::default(), None);
        assert_eq!(mixed.dialect_for(Path::new("a.csv")).delimiter, b',');
        assert_eq!(mixed.dialect_for(Path::new("b.tsv")).delimiter, b'\t');

        mixed.delimiter = Some(b'|');
        assert_eq!(mixed.dialect_for(Path::new("b.tsv")).delimiter, b'|');
    }

    #[test]
    fn validate_reports_every_problem() {
        let err = settings(Vec::new(), Schema::default(), None)
            .validate()
            .unwrap_err();
        match err {
            CsvRecordsError::Configuration { problems } => assert_eq!(problems.len(), 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_provenance_collision() {
        let schema = Schema::new(vec![FieldDefinition::new("Path", FieldType::String)]).unwrap();
        let err = settings(vec![PathBuf::from("a.csv")], schema, Some("Path"))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("\"Path\" overrides another field"));
    }

    #[test]
    fn blank_provenance_is_ignored() {
        let schema = Schema::new(vec![FieldDefinition::string("a")]).unwrap();
        let valid = settings(vec![PathBuf::from("a.csv")], schema, Some("  "));
        assert_eq!(valid.provenance(), None);
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn replay_requires_an_input() {
        let settings = ReplaySettings {
            input: None,
            schema: Schema::default(),
            dialect: Dialect::default(),
        };
        assert!(matches!(
            settings.validate(),
            Err(CsvRecordsError::Configuration { .. })
        ));
    }
}
