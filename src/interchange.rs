//! JSONL readers and writers shared by the pipeline binaries.
//!
//! Readers never abort on a bad line: undecodable lines are logged, counted and skipped so the
//! rest of the file still flows through the pipeline.

use std::io::{BufRead, Write};
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::InterchangeError;
use crate::extractor::decode_lossy;

/// Streaming iterator over the records of a JSONL file.
///
/// Yields only I/O failures as errors; malformed lines are skipped and tallied in
/// [`malformed`](Self::malformed).
pub struct JsonlRecords<R, T> {
    reader: R,
    buf: Vec<u8>,
    line_no: usize,
    malformed: usize,
    _record: PhantomData<fn() -> T>,
}

impl<R: BufRead, T: DeserializeOwned> JsonlRecords<R, T> {
    /// Wraps a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
            malformed: 0,
            _record: PhantomData,
        }
    }

    /// Lines skipped so far because they failed to decode.
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// Lines consumed so far, blank and malformed lines included.
    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead, T: DeserializeOwned> Iterator for JsonlRecords<R, T> {
    type Item = Result<T, InterchangeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            let read = match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(read) => read,
                Err(source) => {
                    return Some(Err(InterchangeError::Io {
                        line: self.line_no + 1,
                        source,
                    }))
                }
            };
            if read == 0 {
                return None;
            }
            self.line_no += 1;

            let line = decode_lossy(&self.buf);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(line) {
                Ok(record) => return Some(Ok(record)),
                Err(source) => {
                    let err = InterchangeError::Malformed {
                        line: self.line_no,
                        source,
                    };
                    warn!("skipping {err}");
                    self.malformed += 1;
                }
            }
        }
    }
}

/// Records collected from a whole JSONL stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadReport<T> {
    /// Successfully decoded records, in file order.
    pub records: Vec<T>,
    /// Number of lines skipped because they failed to decode.
    pub malformed: usize,
}

/// Reads every decodable record from `reader`.
pub fn read_jsonl<T, R>(reader: R) -> Result<ReadReport<T>, InterchangeError>
where
    T: DeserializeOwned,
    R: BufRead,
{
    let mut iter = JsonlRecords::<R, T>::new(reader);
    let mut records = Vec::new();
    for record in iter.by_ref() {
        records.push(record?);
    }
    Ok(ReadReport {
        records,
        malformed: iter.malformed(),
    })
}

/// Appends one record as a JSON line.
pub fn write_jsonl<W, T>(writer: &mut W, record: &T) -> Result<(), InterchangeError>
where
    W: Write,
    T: Serialize,
{
    serde_json::to_writer(&mut *writer, record).map_err(InterchangeError::Encode)?;
    writer
        .write_all(b"\n")
        .map_err(|source| InterchangeError::Io { line: 0, source })
}
