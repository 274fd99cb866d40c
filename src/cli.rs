use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::{
    error::Result,
    io_utils::{self, DEFAULT_QUOTE, Dialect, QuotePolicy},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Convert CSV files into schema-typed records", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rewrite CSV files with anonymous `*` flag columns named after their neighbour
    Rewrite(RewriteArgs),
    /// Infer, merge, or list schema definitions
    Schema(SchemaArgs),
    /// Convert whole CSV files into typed JSON records, one batch per file
    Convert(ConvertArgs),
    /// Preload a CSV file and emit one typed record per trigger
    Replay(ReplayArgs),
}

#[derive(Debug, Clone, Args)]
pub struct DialectArgs {
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Quote character (defaults to '"')
    #[arg(long, value_parser = parse_quote)]
    pub quote: Option<u8>,
    /// Character encoding of the files (defaults to utf-8)
    #[arg(long)]
    pub encoding: Option<String>,
    /// Treat the first row as data rather than a header
    #[arg(long = "no-header")]
    pub no_header: bool,
}

impl DialectArgs {
    pub fn resolve(&self, path: &Path) -> Result<Dialect> {
        Ok(Dialect {
            delimiter: io_utils::resolve_input_delimiter(path, self.delimiter),
            quote: self.quote.unwrap_or(DEFAULT_QUOTE),
            encoding: io_utils::resolve_encoding(self.encoding.as_deref())?,
            has_headers: !self.no_header,
            quote_policy: QuotePolicy::default(),
        })
    }
}

#[derive(Debug, Args)]
pub struct RewriteArgs {
    /// One or more CSV files to rewrite
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Directory for rewritten files (defaults to each input's directory)
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Extension appended to the input file stem, including the dot
    #[arg(long, default_value = ".csv")]
    pub extension: String,
    /// Quote every output field
    #[arg(long = "quote-all")]
    pub quote_all: bool,
    /// Never quote output fields. Fields holding the delimiter, the quote
    /// character or a line break are then written as-is and will not read back
    /// intact
    #[arg(long = "quote-none")]
    pub quote_none: bool,
    #[command(flatten)]
    pub dialect: DialectArgs,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommands,
}

#[derive(Debug, Subcommand)]
pub enum SchemaCommands {
    /// Infer a schema from a file header, merging with an existing schema if given
    Infer(SchemaInferArgs),
    /// List the record fields a schema produces
    Columns(SchemaColumnsArgs),
}

#[derive(Debug, Args)]
pub struct SchemaInferArgs {
    /// CSV file whose header drives the schema
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination schema file (.yml/.yaml or .json)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Previously saved schema whose field types should be kept
    #[arg(long)]
    pub existing: Option<PathBuf>,
    /// Name `*` flag columns before inferring
    #[arg(long = "normalize-header")]
    pub normalize_header: bool,
    #[command(flatten)]
    pub dialect: DialectArgs,
}

#[derive(Debug, Args)]
pub struct SchemaColumnsArgs {
    /// Schema file to list
    #[arg(short = 'm', long = "schema")]
    pub schema: PathBuf,
    /// Provenance field appended to every record
    #[arg(long = "provenance-field")]
    pub provenance_field: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Schema describing the record fields and their types
    #[arg(short = 'm', long = "schema")]
    pub schema: PathBuf,
    /// One or more CSV files to convert
    #[arg(short = 'i', long = "input", action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Field that records each record's source file path
    #[arg(long = "provenance-field")]
    pub provenance_field: Option<String>,
    /// Output JSON-lines file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub dialect: DialectArgs,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// CSV file to preload
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Schema describing record fields (defaults to the header, all text)
    #[arg(short = 'm', long = "schema")]
    pub schema: Option<PathBuf>,
    /// Fire this many triggers instead of one per line read from stdin
    #[arg(long)]
    pub triggers: Option<usize>,
    /// Output JSON-lines file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub dialect: DialectArgs,
}

pub fn parse_delimiter(value: &str) -> std::result::Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => parse_single_ascii(other, "Delimiter"),
    }
}

pub fn parse_quote(value: &str) -> std::result::Result<u8, String> {
    if value.is_empty() {
        return Ok(DEFAULT_QUOTE);
    }
    parse_single_ascii(value, "Quote")
}

fn parse_single_ascii(value: &str, what: &str) -> std::result::Result<u8, String> {
    let mut chars = value.chars();
    let first = chars
        .next()
        .ok_or_else(|| format!("{what} cannot be empty"))?;
    if chars.next().is_some() {
        return Err(format!("{what} must be a single character"));
    }
    if !first.is_ascii() {
        return Err(format!("{what} must be ASCII"));
    }
    Ok(first as u8)
}
