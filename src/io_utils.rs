//! I/O utilities: dialect handling, encoding, reader/writer construction, and
//! atomic output files.
//!
//! Every file read or written by csv-records goes through this module:
//!
//! - **Dialect**: delimiter, quote character, encoding, header presence, and the
//!   output quoting policy travel together as a [`Dialect`].
//! - **Encoding**: fields are decoded per record through `encoding_rs`; output is
//!   transcoded when the dialect encoding is not UTF-8.
//! - **Atomic output**: [`write_atomically`] writes into a sibling temporary file
//!   and renames it over the destination only after a successful flush.
//! - **stdin**: the `-` path reads from standard input.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use tempfile::NamedTempFile;

use crate::error::{CsvRecordsError, Result};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
pub const DEFAULT_QUOTE: u8 = b'"';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotePolicy {
    #[default]
    Necessary,
    Always,
    Never,
}

impl QuotePolicy {
    pub fn from_flags(quote_all: bool, quote_none: bool) -> Result<Self> {
        match (quote_all, quote_none) {
            (true, true) => Err(CsvRecordsError::configuration(
                "Quoting all fields and quoting no fields cannot both be enabled",
            )),
            (true, false) => Ok(QuotePolicy::Always),
            (false, true) => Ok(QuotePolicy::Never),
            (false, false) => Ok(QuotePolicy::Necessary),
        }
    }

    fn quote_style(self) -> QuoteStyle {
        match self {
            QuotePolicy::Necessary => QuoteStyle::Necessary,
            QuotePolicy::Always => QuoteStyle::Always,
            QuotePolicy::Never => QuoteStyle::Never,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
    pub encoding: &'static Encoding,
    pub has_headers: bool,
    pub quote_policy: QuotePolicy,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_CSV_DELIMITER,
            quote: DEFAULT_QUOTE,
            encoding: UTF_8,
            has_headers: true,
            quote_policy: QuotePolicy::default(),
        }
    }
}

impl Dialect {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

/// Resolves a WHATWG encoding label. Only ASCII-compatible encodings are
/// accepted because records are tokenized before fields are decoded.
pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    let Some(value) = label else {
        return Ok(UTF_8);
    };
    let encoding = Encoding::for_label(value.trim().as_bytes())
        .ok_or_else(|| CsvRecordsError::configuration(format!("Unknown encoding '{value}'")))?;
    if !encoding.is_ascii_compatible() {
        return Err(CsvRecordsError::configuration(format!(
            "Encoding '{}' is not ASCII-compatible and cannot be used for delimited text",
            encoding.name()
        )));
    }
    Ok(encoding)
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Builds a codec reader. Header handling and the end-of-data sentinel are the
/// caller's job, so the codec always sees the header as an ordinary record, and
/// records may vary in length.
pub fn open_csv_reader<R>(reader: R, dialect: &Dialect) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(dialect.delimiter)
        .quote(dialect.quote)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    dialect: &Dialect,
) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).map_err(|err| CsvRecordsError::io(path, err))?,
        ))
    };
    Ok(open_csv_reader(reader, dialect))
}

pub fn open_csv_writer<'a, W>(inner: W, dialect: &Dialect) -> csv::Writer<Box<dyn Write + 'a>>
where
    W: Write + 'a,
{
    let writer: Box<dyn Write + 'a> = if dialect.encoding == UTF_8 {
        Box::new(inner)
    } else {
        Box::new(TranscodingWriter::new(inner, dialect.encoding))
    };

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(dialect.delimiter)
        .quote(dialect.quote)
        .quote_style(dialect.quote_policy.quote_style())
        .double_quote(true)
        .flexible(true);
    builder.from_writer(writer)
}

/// Writes `destination` through a temporary sibling file that replaces it only
/// once `write` succeeds and the output is flushed. On any failure the temporary
/// file is removed and an existing destination is left untouched.
pub fn write_atomically<F>(destination: &Path, dialect: &Dialect, write: F) -> Result<()>
where
    F: for<'w> FnOnce(&mut csv::Writer<Box<dyn Write + 'w>>) -> Result<()>,
{
    let parent = destination
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(parent).map_err(|err| CsvRecordsError::io(parent, err))?;
    {
        let mut writer = open_csv_writer(BufWriter::new(temp.as_file_mut()), dialect);
        write(&mut writer)?;
        writer
            .flush()
            .map_err(|err| CsvRecordsError::io(destination, err))?;
    }
    temp.persist(destination)
        .map_err(|err| CsvRecordsError::io(destination, err.error))?;
    Ok(())
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> io::Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to decode text with encoding {}", encoding.name()),
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> io::Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    buffer: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            buffer: Vec::new(),
        }
    }

    /// Encodes every complete UTF-8 sequence buffered so far. A trailing partial
    /// sequence stays buffered unless `force` is set, in which case it is an error.
    fn flush_buffer(&mut self, force: bool) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let valid_up_to = match std::str::from_utf8(&self.buffer) {
            Ok(_) => self.buffer.len(),
            Err(err) => {
                if let Some(error_len) = err.error_len() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Invalid UTF-8 sequence in output stream ({error_len} bytes)"),
                    ));
                }
                err.valid_up_to()
            }
        };
        if valid_up_to > 0 {
            let pending: Vec<u8> = self.buffer.drain(..valid_up_to).collect();
            let text = std::str::from_utf8(&pending)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.encode_and_write(text)?;
        }
        if force && !self.buffer.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Incomplete UTF-8 sequence at end of output stream",
            ));
        }
        Ok(())
    }

    fn encode_and_write(&mut self, text: &str) -> io::Result<()> {
        let (encoded, _output_encoding, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to encode text using {}", self.encoding.name()),
            ));
        }
        self.inner.write_all(encoded.as_ref())
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.flush_buffer(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer(true)?;
        self.inner.flush()
    }
}
