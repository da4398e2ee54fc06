//! 📄 Row source: streaming CSV out of the bucket, one row per pull.
//!
//! COLD OPEN. EXT. BUCKET. 3:47 AM.
//!
//! The orchestrator asks for a row. The `RowSource` asks the parser for a
//! record. The parser asks the `BufReader` for bytes. The `BufReader` asks the
//! object body. Nobody reads ahead. Nobody buffers the whole object. It's pull
//! all the way down.
//!
//! 🧠 Knowledge graph:
//! - `open` issues exactly one `get`. No body at all → `PipelineError::Read`.
//! - Transport: `ObjectBody` (boxed `AsyncRead`) → `BufReader` → `fill_buf()` /
//!   `consume()`, chunk by chunk.
//! - Framing AND field splitting: `csv_core::Reader`, the incremental parser
//!   underneath the `csv` crate. One state machine decides where a record ends
//!   and where a field ends, so a stray `5" wheel` or a CR-only file frames the
//!   same way `csv::Reader` would.
//! - First record is the header. The parser strips a UTF-8 BOM; a BOM that
//!   arrives split across chunks is shaved off the first header cell instead.
//! - Blank lines between records are skipped by the parser.
//! - An object that ends inside a quoted field (the parser completes the record
//!   only at end of input, right after a line break) is a `Read` error, same as
//!   invalid UTF-8 or a broken transport. The source is done after that.

use anyhow::{Context, anyhow};
use csv_core::ReadRecordResult;
use futures::Stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, trace};

use crate::backends::{ObjectBody, ObjectStore};
use crate::common::Row;
use crate::error::PipelineError;
use crate::zones::ObjectLocation;

const UTF8_BOM: char = '\u{feff}';
const INITIAL_FIELD_BYTES: usize = 4 * 1024;
const INITIAL_FIELD_ENDS: usize = 64;

/// 📄 A lazy, single-use sequence of rows over one object.
pub struct RowSource {
    buf_reader: BufReader<ObjectBody>,
    parser: csv_core::Reader,
    // 🧺 scratch space the parser writes unescaped field bytes and field end offsets into
    field_bytes: Vec<u8>,
    field_ends: Vec<usize>,
    last_byte: Option<u8>,
    location: ObjectLocation,
    header: Option<Vec<String>>,
    rows_read: usize,
    finished: bool,
}

// 🐛 Debug skips the reader and the parser; trait-object readers don't impl Debug and nobody wants to see a DFA.
impl std::fmt::Debug for RowSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowSource")
            .field("location", &self.location)
            .field("header", &self.header)
            .field("rows_read", &self.rows_read)
            .field("finished", &self.finished)
            .finish()
    }
}

impl RowSource {
    /// 🚀 Ask the store for the object and get ready to stream it.
    ///
    /// No decoding happens here. The first byte of CSV is read when the first
    /// row is requested.
    pub async fn open<S>(store: &S, location: &ObjectLocation) -> Result<Self, PipelineError>
    where
        S: ObjectStore + ?Sized,
    {
        info!("📥 opening {} for row streaming", location);

        let the_answer = store.get(location).await.map_err(|source| PipelineError::Read {
            location: location.clone(),
            source,
        })?;

        let Some(the_body) = the_answer else {
            return Err(PipelineError::Read {
                location: location.clone(),
                source: anyhow!("💀 No body found in response for file: {}", location.key),
            });
        };

        Ok(Self::from_body(location.clone(), the_body))
    }

    /// 🔌 Stream rows out of a body you already have.
    pub fn from_body(location: ObjectLocation, body: ObjectBody) -> Self {
        Self {
            buf_reader: BufReader::new(body),
            parser: csv_core::Reader::new(),
            field_bytes: vec![0; INITIAL_FIELD_BYTES],
            field_ends: vec![0; INITIAL_FIELD_ENDS],
            last_byte: None,
            location,
            header: None,
            rows_read: 0,
            finished: false,
        }
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// 📄 Pull the next row. `Ok(None)` at end of object.
    ///
    /// After an error or end of object, every later call returns `Ok(None)`.
    pub async fn next_row(&mut self) -> Result<Option<Row>, PipelineError> {
        if self.finished {
            return Ok(None);
        }
        match self.next_row_inner().await {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.finished = true;
                debug!("🏁 {} exhausted after {} rows", self.location, self.rows_read);
                Ok(None)
            }
            Err(source) => {
                self.finished = true;
                Err(PipelineError::Read {
                    location: self.location.clone(),
                    source: source.context(format!("💀 CSV stream broke after {} rows", self.rows_read)),
                })
            }
        }
    }

    async fn next_row_inner(&mut self) -> anyhow::Result<Option<Row>> {
        if self.header.is_none() {
            let Some(mut the_header) = self.next_record().await? else {
                // 🕳️ no header, no rows. An empty object is not an error.
                return Ok(None);
            };
            if let Some(first) = the_header.first_mut() {
                if let Some(stripped) = first.strip_prefix(UTF8_BOM) {
                    *first = stripped.to_string();
                }
            }
            trace!("🏷️ header for {}: {:?}", self.location, the_header);
            self.header = Some(the_header);
        }

        let Some(the_fields) = self.next_record().await? else {
            return Ok(None);
        };
        self.rows_read += 1;
        Ok(Some(self.shape_row(the_fields)))
    }

    /// 🧩 Zip a record against the header. Extra fields become `_<index>`;
    /// missing trailing fields are simply absent.
    fn shape_row(&self, fields: Vec<String>) -> Row {
        let the_header = self.header.as_deref().unwrap_or_default();
        let mut the_row = Row::new();
        for (index, value) in fields.into_iter().enumerate() {
            match the_header.get(index) {
                Some(column) => the_row.insert(column.as_str(), value),
                None => the_row.insert(format!("_{index}"), value),
            }
        }
        the_row
    }

    /// 🧵 Feed the parser chunks until it hands back one whole record.
    /// `Ok(None)` at a clean end of object.
    async fn next_record(&mut self) -> anyhow::Result<Option<Vec<String>>> {
        let mut the_bytes_len = 0usize;
        let mut the_ends_len = 0usize;

        loop {
            let the_input = self
                .buf_reader
                .fill_buf()
                .await
                .context("💀 reading the object body failed mid-stream")?;
            let at_eof = the_input.is_empty();

            let (the_result, nin, nout, nend) = self.parser.read_record(
                the_input,
                &mut self.field_bytes[the_bytes_len..],
                &mut self.field_ends[the_ends_len..],
            );
            if nin > 0 {
                self.last_byte = Some(the_input[nin - 1]);
            }
            self.buf_reader.consume(nin);
            the_bytes_len += nout;
            the_ends_len += nend;

            match the_result {
                ReadRecordResult::InputEmpty if at_eof => {
                    return Err(anyhow!("💀 the CSV parser wanted more input after the object ended"));
                }
                ReadRecordResult::InputEmpty => {}
                ReadRecordResult::OutputFull => {
                    let the_len = self.field_bytes.len();
                    self.field_bytes.resize(the_len * 2, 0);
                }
                ReadRecordResult::OutputEndsFull => {
                    let the_len = self.field_ends.len();
                    self.field_ends.resize(the_len * 2, 0);
                }
                ReadRecordResult::Record => {
                    // 🪤 a record that only ends at end of input, right after a line
                    // break, means that line break sat inside an open quote
                    if at_eof && matches!(self.last_byte, Some(b'\n' | b'\r')) {
                        return Err(anyhow!(
                            "💀 object ended inside a quoted field; the closing quote never showed up"
                        ));
                    }
                    return self.decode_fields(the_bytes_len, the_ends_len).map(Some);
                }
                ReadRecordResult::End => return Ok(None),
            }
        }
    }

    /// 🔬 Parser scratch space → owned UTF-8 fields.
    fn decode_fields(&self, bytes_len: usize, ends_len: usize) -> anyhow::Result<Vec<String>> {
        let the_bytes = &self.field_bytes[..bytes_len];
        let mut the_fields = Vec::with_capacity(ends_len);
        let mut the_start = 0usize;
        for (index, &end) in self.field_ends[..ends_len].iter().enumerate() {
            let the_field = std::str::from_utf8(&the_bytes[the_start..end])
                .context(format!("💀 field {} is not valid UTF-8", index))?;
            the_fields.push(the_field.to_string());
            the_start = end;
        }
        Ok(the_fields)
    }

    /// 🌊 The same pull-based sequence as a `futures::Stream`.
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row, PipelineError>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut the_source = state?;
            match the_source.next_row().await {
                Ok(Some(row)) => Some((Ok(row), Some(the_source))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}
