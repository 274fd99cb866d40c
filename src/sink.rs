//! Output sinks: the synchronous collaborator that receives assembled records.

use std::io::Write;

use serde::Serialize;

use crate::{
    error::{CsvRecordsError, Result},
    record::StructuredRecord,
};

pub trait RecordSink {
    /// Hands over one batch. The core keeps nothing after this returns.
    fn publish(&mut self, records: Vec<StructuredRecord>) -> Result<()>;
}

/// Writes every batch as a single JSON array line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    batches: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, batches: 0 }
    }

    pub fn batches_written(&self) -> usize {
        self.batches
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn publish(&mut self, records: Vec<StructuredRecord>) -> Result<()> {
        write_json_line(&mut self.writer, &records)?;
        self.batches += 1;
        Ok(())
    }
}

/// Keeps every published batch, in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub batches: Vec<Vec<StructuredRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> impl Iterator<Item = &StructuredRecord> {
        self.batches.iter().flatten()
    }
}

impl RecordSink for MemorySink {
    fn publish(&mut self, records: Vec<StructuredRecord>) -> Result<()> {
        self.batches.push(records);
        Ok(())
    }
}

pub fn write_json_line<W: Write, T: Serialize + ?Sized>(writer: &mut W, payload: &T) -> Result<()> {
    let to_io = |err: std::io::Error| CsvRecordsError::io("<output>", err);
    serde_json::to_writer(&mut *writer, payload).map_err(|err| to_io(err.into()))?;
    writer.write_all(b"\n").map_err(to_io)?;
    writer.flush().map_err(to_io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;

    fn record(value: i32) -> StructuredRecord {
        let mut record = StructuredRecord::default();
        record.push("n", Some(TypedValue::Int(value)));
        record
    }

    #[test]
    fn json_lines_sink_writes_one_array_per_batch() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish(vec![record(1), record(2)]).unwrap();
        sink.publish(vec![record(3)]).unwrap();
        assert_eq!(sink.batches_written(), 2);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "[{\"n\":1},{\"n\":2}]\n[{\"n\":3}]\n");
    }

    #[test]
    fn memory_sink_flattens_batches_in_order() {
        let mut sink = MemorySink::new();
        sink.publish(vec![record(1)]).unwrap();
        sink.publish(vec![record(2), record(3)]).unwrap();
        let values: Vec<_> = sink
            .records()
            .map(|r| r.get("n").flatten().cloned())
            .collect();
        assert_eq!(
            values,
            vec![
                Some(TypedValue::Int(1)),
                Some(TypedValue::Int(2)),
                Some(TypedValue::Int(3))
            ]
        );
    }
}
