//! Forward-only record stream over a delimited file.
//!
//! [`RecordStream`] moves through `Unopened → HeaderConsumed → Streaming` and
//! ends in either `Exhausted` (end of input) or `SentinelTerminated` (a row made
//! of a single NUL field). The sentinel row is never yielded. Once terminated the
//! underlying reader is dropped and every further read yields nothing.

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use csv::ByteRecord;
use encoding_rs::Encoding;
use log::debug;

use crate::{
    error::{CsvRecordsError, Result},
    io_utils::{self, Dialect},
};

/// Ordered raw fields of one input record.
pub type RawRow = Vec<String>;

/// Value of the single field of an end-of-data row.
pub const END_OF_DATA: &str = "\0";

pub fn is_end_of_data(row: &[String]) -> bool {
    row.len() == 1 && row[0] == END_OF_DATA
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Unopened,
    HeaderConsumed,
    Streaming,
    Exhausted,
    SentinelTerminated,
}

impl StreamState {
    pub fn is_terminated(self) -> bool {
        matches!(self, StreamState::Exhausted | StreamState::SentinelTerminated)
    }
}

pub struct RecordStream<R: Read> {
    reader: Option<csv::Reader<R>>,
    source: PathBuf,
    encoding: &'static Encoding,
    has_headers: bool,
    state: StreamState,
    header: Option<RawRow>,
    record: ByteRecord,
    line: usize,
}

impl RecordStream<Box<dyn Read>> {
    pub fn open(path: &Path, dialect: &Dialect) -> Result<Self> {
        let reader = io_utils::open_csv_reader_from_path(path, dialect)?;
        Ok(Self::from_csv_reader(reader, path, dialect))
    }
}

impl<R: Read> RecordStream<R> {
    /// Streams from an in-memory or already-open source. `source` labels errors.
    pub fn from_reader(reader: R, source: impl AsRef<Path>, dialect: &Dialect) -> Self {
        Self::from_csv_reader(io_utils::open_csv_reader(reader, dialect), source, dialect)
    }

    fn from_csv_reader(reader: csv::Reader<R>, source: impl AsRef<Path>, dialect: &Dialect) -> Self {
        Self {
            reader: Some(reader),
            source: source.as_ref().to_path_buf(),
            encoding: dialect.encoding,
            has_headers: dialect.has_headers,
            state: StreamState::Unopened,
            header: None,
            record: ByteRecord::new(),
            line: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// 1-based physical line on which the most recently read record starts,
    /// header included. Quoted line breaks count as lines.
    pub fn row_number(&self) -> usize {
        self.line
    }

    /// Consumes the header row if the dialect declares one. Returns `None` when
    /// the dialect has no header or the input ended before one was found.
    pub fn header(&mut self) -> Result<Option<&[String]>> {
        if self.has_headers && self.state == StreamState::Unopened {
            self.header = self.read_raw()?;
            if self.header.is_some() {
                self.state = StreamState::HeaderConsumed;
            }
        }
        Ok(self.header.as_deref())
    }

    fn read_raw(&mut self) -> Result<Option<RawRow>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let has_record = match reader.read_byte_record(&mut self.record) {
            Ok(has_record) => has_record,
            Err(err) => {
                self.terminate(StreamState::Exhausted);
                return Err(CsvRecordsError::csv(&self.source, err));
            }
        };
        if !has_record {
            debug!("Reached end of {:?}", self.source);
            self.terminate(StreamState::Exhausted);
            return Ok(None);
        }
        self.line = self
            .record
            .position()
            .map_or(self.line + 1, |pos| usize::try_from(pos.line()).unwrap_or(usize::MAX));
        let row = match io_utils::decode_record(&self.record, self.encoding) {
            Ok(row) => row,
            Err(err) => {
                self.terminate(StreamState::Exhausted);
                return Err(CsvRecordsError::io(&self.source, err));
            }
        };
        if is_end_of_data(&row) {
            debug!(
                "End-of-data row at line {} of {:?}",
                self.line, self.source
            );
            self.terminate(StreamState::SentinelTerminated);
            return Ok(None);
        }
        Ok(Some(row))
    }

    fn terminate(&mut self, state: StreamState) {
        self.reader = None;
        self.state = state;
    }
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state.is_terminated() {
            return None;
        }
        if let Err(err) = self.header() {
            return Some(Err(err));
        }
        match self.read_raw() {
            Ok(Some(row)) => {
                self.state = StreamState::Streaming;
                Some(Ok(row))
            }
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Reads only the first row of `path` and releases the file. An empty input, or
/// one that starts with the end-of-data row, has an empty header.
pub fn read_header(path: &Path, dialect: &Dialect) -> Result<Vec<String>> {
    let stream = RecordStream::open(path, &dialect.with_headers(true))?;
    first_row(stream)
}

pub fn read_header_from_reader<R: Read>(reader: R, dialect: &Dialect) -> Result<Vec<String>> {
    let stream = RecordStream::from_reader(reader, "<memory>", &dialect.with_headers(true));
    first_row(stream)
}

fn first_row<R: Read>(mut stream: RecordStream<R>) -> Result<Vec<String>> {
    Ok(stream.header()?.map(<[String]>::to_vec).unwrap_or_default())
}
