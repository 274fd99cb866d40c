//! Schema model, header inference, non-destructive merge, and persistence.
//!
//! A [`Schema`] is an ordered list of [`FieldDefinition`]s. Order is significant:
//! it is the output order of every assembled record and the order new header
//! columns are slotted into during [`Schema::merge`].
//!
//! Schemas persist as YAML (`fields: [{name, type}]`) unless the path ends in
//! `.json`. Loading also accepts a bare list of `{Name, Type}` pairs, which is how
//! grid-style definitions are usually exported.

use std::{
    collections::HashSet,
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    str::FromStr,
};

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{CsvRecordsError, Result};

/// Declared semantic type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldType {
    #[default]
    String,
    Int,
    Long,
    Double,
    Boolean,
    DateTime,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Int => "Int",
            FieldType::Long => "Long",
            FieldType::Double => "Double",
            FieldType::Boolean => "Boolean",
            FieldType::DateTime => "DateTime",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["String", "Int", "Long", "Double", "Boolean", "DateTime"]
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = CsvRecordsError;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "text" => Ok(FieldType::String),
            "int" | "integer" | "int32" => Ok(FieldType::Int),
            "long" | "int64" => Ok(FieldType::Long),
            "double" | "float" => Ok(FieldType::Double),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "datetime" | "date-time" | "timestamp" => Ok(FieldType::DateTime),
            _ => Err(CsvRecordsError::Schema(format!(
                "Unknown field type '{value}'. Supported types: {}",
                FieldType::variants().join(", ")
            ))),
        }
    }
}

impl Serialize for FieldType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        FieldType::from_str(&token).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(rename = "type", alias = "Type")]
    pub field_type: FieldType,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// What a merge did to each column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub kept: Vec<String>,
    pub added: Vec<String>,
    pub dropped: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaDocument {
    Document(Schema),
    Pairs(Vec<FieldDefinition>),
}

impl Schema {
    /// Builds a schema, rejecting blank or duplicate field names.
    pub fn new(fields: Vec<FieldDefinition>) -> Result<Self> {
        let schema = Schema { fields };
        schema.validate()?;
        Ok(schema)
    }

    /// One `String` field per header name, in header order.
    pub fn infer_from_header(headers: &[String]) -> Result<Self> {
        ensure_unique_headers(headers)?;
        Schema::new(headers.iter().map(FieldDefinition::string).collect())
    }

    /// Reconciles this schema with a (new) header row.
    ///
    /// Retained fields keep their declared type and relative order. Header names
    /// the schema does not know are inserted as `String` at
    /// `min(header_index, merged_len)`. Fields missing from the header are
    /// dropped, so an empty header clears the schema. Names compare
    /// case-sensitively.
    pub fn merge(&self, headers: &[String]) -> Result<Self> {
        self.merge_with_report(headers).map(|(schema, _)| schema)
    }

    pub fn merge_with_report(&self, headers: &[String]) -> Result<(Self, MergeReport)> {
        ensure_unique_headers(headers)?;
        let header_set: HashSet<&str> = headers.iter().map(String::as_str).collect();
        let mut report = MergeReport::default();

        let mut merged = Vec::with_capacity(headers.len());
        for field in &self.fields {
            if header_set.contains(field.name.as_str()) {
                report.kept.push(field.name.clone());
                merged.push(field.clone());
            } else {
                report.dropped.push(field.name.clone());
            }
        }

        for (idx, name) in headers.iter().enumerate() {
            if merged.iter().any(|field: &FieldDefinition| &field.name == name) {
                continue;
            }
            let position = idx.min(merged.len());
            debug!("Inserting new field '{name}' at position {position}");
            merged.insert(position, FieldDefinition::string(name));
            report.added.push(name.clone());
        }

        let schema = Schema::new(merged)?;
        Ok((schema, report))
    }

    /// Infers when there is no prior schema, merges otherwise. An inference
    /// reports every header name as added.
    pub fn infer_or_merge(
        existing: Option<&Schema>,
        headers: &[String],
    ) -> Result<(Self, MergeReport)> {
        match existing {
            Some(schema) => schema.merge_with_report(headers),
            None => {
                let schema = Schema::infer_from_header(headers)?;
                let report = MergeReport {
                    added: headers.to_vec(),
                    ..MergeReport::default()
                };
                Ok((schema, report))
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.fields.len());
        for (idx, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(CsvRecordsError::Schema(format!(
                    "Field at position {} has an empty name",
                    idx + 1
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CsvRecordsError::Schema(format!(
                    "Duplicate field name '{}'",
                    field.name
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Field shape of every emitted record: schema fields, then the provenance
    /// field typed `String`.
    pub fn output_attributes(&self, provenance: Option<&str>) -> Vec<FieldDefinition> {
        let mut attributes = self.fields.clone();
        if let Some(name) = provenance.map(str::trim).filter(|n| !n.is_empty()) {
            attributes.push(FieldDefinition::string(name));
        }
        attributes
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| CsvRecordsError::io(path, err))?;
        let reader = BufReader::new(file);
        let document: SchemaDocument = if is_json_path(path) {
            serde_json::from_reader(reader).map_err(|err| {
                CsvRecordsError::Schema(format!("Parsing schema JSON {path:?}: {err}"))
            })?
        } else {
            serde_yaml::from_reader(reader).map_err(|err| {
                CsvRecordsError::Schema(format!("Parsing schema YAML {path:?}: {err}"))
            })?
        };
        let schema = match document {
            SchemaDocument::Document(schema) => schema,
            SchemaDocument::Pairs(fields) => Schema { fields },
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let file = File::create(path).map_err(|err| CsvRecordsError::io(path, err))?;
        let mut writer = BufWriter::new(file);
        if is_json_path(path) {
            serde_json::to_writer_pretty(&mut writer, self).map_err(|err| {
                CsvRecordsError::Schema(format!("Writing schema JSON {path:?}: {err}"))
            })?;
        } else {
            serde_yaml::to_writer(&mut writer, self).map_err(|err| {
                CsvRecordsError::Schema(format!("Writing schema YAML {path:?}: {err}"))
            })?;
        }
        writer.flush().map_err(|err| CsvRecordsError::io(path, err))
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn ensure_unique_headers(headers: &[String]) -> Result<()> {
    let duplicates = headers.iter().duplicates().collect_vec();
    if duplicates.is_empty() {
        return Ok(());
    }
    Err(CsvRecordsError::Schema(format!(
        "Header contains duplicate column name(s): {}",
        duplicates.iter().map(|name| format!("'{name}'")).join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn schema(fields: &[(&str, FieldType)]) -> Schema {
        Schema::new(
            fields
                .iter()
                .map(|(name, ty)| FieldDefinition::new(*name, *ty))
                .collect(),
        )
        .expect("valid schema")
    }

    #[test]
    fn infer_from_header_declares_strings() {
        let inferred = Schema::infer_from_header(&headers(&["a", "b"])).unwrap();
        assert_eq!(
            inferred.fields,
            vec![FieldDefinition::string("a"), FieldDefinition::string("b")]
        );
    }

    #[test]
    fn merge_keeps_retained_order_and_types() {
        let existing = schema(&[("B", FieldType::Int), ("A", FieldType::String)]);
        let merged = existing.merge(&headers(&["A", "B", "C"])).unwrap();
        assert_eq!(
            merged,
            schema(&[
                ("B", FieldType::Int),
                ("A", FieldType::String),
                ("C", FieldType::String)
            ])
        );
    }

    #[test]
    fn merge_inserts_new_columns_at_header_position() {
        let existing = schema(&[("a", FieldType::Long), ("c", FieldType::Double)]);
        let (merged, report) = existing
            .merge_with_report(&headers(&["x", "a", "c", "d"]))
            .unwrap();
        assert_eq!(merged.names(), headers(&["x", "a", "c", "d"]));
        assert_eq!(merged.fields[1].field_type, FieldType::Long);
        assert_eq!(report.added, headers(&["x", "d"]));
        assert_eq!(report.kept, headers(&["a", "c"]));
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn merge_drops_fields_missing_from_header() {
        let existing = schema(&[("a", FieldType::Int), ("gone", FieldType::Boolean)]);
        let (merged, report) = existing.merge_with_report(&headers(&["a"])).unwrap();
        assert_eq!(merged, schema(&[("a", FieldType::Int)]));
        assert_eq!(report.dropped, headers(&["gone"]));
    }

    #[test]
    fn merge_against_empty_header_clears_schema() {
        let existing = schema(&[("a", FieldType::Int)]);
        assert!(existing.merge(&[]).unwrap().is_empty());
    }

    #[test]
    fn infer_or_merge_infers_without_prior_schema() {
        let (schema, report) = Schema::infer_or_merge(None, &headers(&["a", "b"])).unwrap();
        assert_eq!(
            schema.fields,
            vec![FieldDefinition::string("a"), FieldDefinition::string("b")]
        );
        assert_eq!(report.added, headers(&["a", "b"]));
        assert!(report.kept.is_empty() && report.dropped.is_empty());
    }

    #[test]
    fn infer_or_merge_keeps_declared_types_of_prior_schema() {
        let existing = schema(&[("a", FieldType::Int), ("old", FieldType::Double)]);
        let (merged, report) =
            Schema::infer_or_merge(Some(&existing), &headers(&["a", "b"])).unwrap();
        assert_eq!(
            merged,
            schema(&[("a", FieldType::Int), ("b", FieldType::String)])
        );
        assert_eq!(report.kept, headers(&["a"]));
        assert_eq!(report.added, headers(&["b"]));
        assert_eq!(report.dropped, headers(&["old"]));
    }

    #[test]
    fn merge_matches_names_case_sensitively() {
        let existing = schema(&[("Temp", FieldType::Double)]);
        let merged = existing.merge(&headers(&["temp"])).unwrap();
        assert_eq!(merged, schema(&[("temp", FieldType::String)]));
    }

    #[test]
    fn duplicate_header_names_are_schema_errors() {
        let dup = headers(&["a", "a"]);
        assert!(matches!(
            Schema::infer_from_header(&dup),
            Err(CsvRecordsError::Schema(_))
        ));
        assert!(matches!(
            Schema::default().merge(&dup),
            Err(CsvRecordsError::Schema(_))
        ));
    }

    #[test]
    fn new_rejects_blank_names() {
        let result = Schema::new(vec![FieldDefinition::string("  ")]);
        assert!(matches!(result, Err(CsvRecordsError::Schema(_))));
    }

    #[test]
    fn field_type_parses_aliases_case_insensitively() {
        assert_eq!(FieldType::from_str("integer").unwrap(), FieldType::Int);
        assert_eq!(FieldType::from_str("INT64").unwrap(), FieldType::Long);
        assert_eq!(FieldType::from_str("float").unwrap(), FieldType::Double);
        assert_eq!(FieldType::from_str("Bool").unwrap(), FieldType::Boolean);
        assert_eq!(FieldType::from_str("timestamp").unwrap(), FieldType::DateTime);
        assert!(FieldType::from_str("guid").is_err());
    }

    #[test]
    fn output_attributes_append_provenance_as_string() {
        let base = schema(&[("a", FieldType::Int)]);
        let attributes = base.output_attributes(Some("Source"));
        assert_eq!(
            attributes,
            vec![
                FieldDefinition::new("a", FieldType::Int),
                FieldDefinition::string("Source")
            ]
        );
        assert_eq!(base.output_attributes(Some("  ")).len(), 1);
    }

    #[test]
    fn yaml_and_json_round_trip_through_files() {
        let dir = tempdir().expect("temp dir");
        let original = schema(&[("id", FieldType::Long), ("when", FieldType::DateTime)]);

        let yaml_path = dir.path().join("schema.yml");
        original.save(&yaml_path).unwrap();
        assert_eq!(Schema::load(&yaml_path).unwrap(), original);

        let json_path = dir.path().join("schema.json");
        original.save(&json_path).unwrap();
        assert_eq!(Schema::load(&json_path).unwrap(), original);
    }

    #[test]
    fn load_accepts_bare_name_type_pairs() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("grid.json");
        std::fs::write(
            &path,
            r#"[{"Name":"Temp","Type":"Double"},{"Name":"Ok","Type":"Boolean"}]"#,
        )
        .unwrap();
        let loaded = Schema::load(&path).unwrap();
        assert_eq!(
            loaded,
            schema(&[("Temp", FieldType::Double), ("Ok", FieldType::Boolean)])
        );
    }
}
