//! Reader session: structure inference plus batch or incremental decoding.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::{RecordDecoder, TextPool, is_valid_date_format};
use crate::dialect::{Dialect, Format, FormatOverrides};
use crate::error::{ConvertError, Result};
use crate::infer::names::parse_custom_header;
use crate::infer::ranges::{ColumnRange, LabelSpec};
use crate::infer::{InferenceOptions, infer_schema};
use crate::sample::SampleSize;
use crate::schema::{Dataset, MissingValue, Row, Schema};
use crate::tokenizer::{RawRecord, RecordSource};

/// How rows have been requested from a session so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retrieval {
    /// Nothing requested yet.
    #[default]
    None,
    /// Whole data set at once.
    Batch,
    /// One row per call.
    Incremental,
}

/// Reads a CSV source into a typed [`Dataset`].
///
/// One reader serves one source at a time. The schema is built on the first
/// structure request and stays fixed until a new source is set or the
/// reader is reset.
///
/// # Example
///
/// ```no_run
/// use csv_tabular::{CsvReader, Dialect};
///
/// let mut reader = CsvReader::new();
/// reader
///     .dialect(Dialect::Tdf)
///     .missing_value("?")
///     .nominal_range("2,5".parse().unwrap());
///
/// let data = reader.read_path("iris.tsv").unwrap();
/// println!("{} rows, {} columns", data.num_rows(), data.num_columns());
/// ```
pub struct CsvReader {
    dialect: Dialect,
    overrides: FormatOverrides,
    options: InferenceOptions,
    missing_value: String,
    sample_size: SampleSize,
    /// File to reopen on [`CsvReader::reset`].
    source_path: Option<PathBuf>,
    /// Source set but not yet tokenized.
    pending: Option<Box<dyn Read>>,
    records: Option<RecordSource>,
    schema: Option<Schema>,
    missing: MissingValue,
    /// Sample rows read ahead of decoding.
    buffer: VecDeque<RawRecord>,
    /// Text shared across rows of the current source.
    pool: TextPool,
    rows_decoded: usize,
    retrieval: Retrieval,
}

impl std::fmt::Debug for CsvReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvReader")
            .field("dialect", &self.dialect)
            .field("overrides", &self.overrides)
            .field("options", &self.options)
            .field("sample_size", &self.sample_size)
            .field("source_path", &self.source_path)
            .field("schema", &self.schema)
            .field("buffered", &self.buffer.len())
            .field("retrieval", &self.retrieval)
            .finish_non_exhaustive()
    }
}

impl Default for CsvReader {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvReader {
    /// Create a reader with default settings.
    pub fn new() -> Self {
        Self {
            dialect: Dialect::Default,
            overrides: FormatOverrides::default(),
            options: InferenceOptions::default(),
            missing_value: String::new(),
            sample_size: SampleSize::All,
            source_path: None,
            pending: None,
            records: None,
            schema: None,
            missing: MissingValue::default(),
            buffer: VecDeque::new(),
            pool: TextPool::new(),
            rows_decoded: 0,
            retrieval: Retrieval::None,
        }
    }

    /// Set the dialect.
    pub fn dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.dialect = dialect;
        self
    }

    /// Override the dialect's field separator (single character).
    pub fn custom_field_separator(&mut self, value: &str) -> &mut Self {
        self.overrides.set_delimiter(value);
        self
    }

    /// Override the dialect's quote character (single character or `none`).
    pub fn custom_quote(&mut self, value: &str) -> &mut Self {
        self.overrides.set_quote(value);
        self
    }

    /// Override the dialect's escape character (single character).
    pub fn custom_escape(&mut self, value: &str) -> &mut Self {
        self.overrides.set_escape(value);
        self
    }

    /// Treat the first record as data instead of column names.
    pub fn no_header(&mut self, no_header: bool) -> &mut Self {
        self.options.no_header = no_header;
        self
    }

    /// Comma-separated names for the leading columns.
    pub fn custom_header(&mut self, names: &str) -> &mut Self {
        self.options.custom_header = parse_custom_header(names);
        self
    }

    /// Columns to treat as categorical.
    pub fn nominal_range(&mut self, range: ColumnRange) -> &mut Self {
        self.options.nominal_range = range;
        self
    }

    /// Columns to treat as text.
    pub fn string_range(&mut self, range: ColumnRange) -> &mut Self {
        self.options.string_range = range;
        self
    }

    /// Columns to treat as dates.
    pub fn date_range(&mut self, range: ColumnRange) -> &mut Self {
        self.options.date_range = range;
        self
    }

    /// Add a label spec. When specs overlap, the one added last wins.
    pub fn label_spec(&mut self, spec: LabelSpec) -> &mut Self {
        self.options.label_specs.push(spec);
        self
    }

    /// Set the chrono strftime pattern for date columns.
    ///
    /// An invalid pattern is reported and the current one kept.
    pub fn date_format(&mut self, format: &str) -> &mut Self {
        if is_valid_date_format(format) {
            self.options.date_format = format.to_string();
        } else {
            warn!(
                "invalid date format {:?}, keeping {:?}",
                format, self.options.date_format
            );
        }
        self
    }

    /// The token that marks a missing value (empty by default).
    pub fn missing_value(&mut self, token: &str) -> &mut Self {
        self.missing_value = token.to_string();
        self
    }

    /// How many data rows to read ahead for type detection.
    pub fn sample_size(&mut self, sample_size: SampleSize) -> &mut Self {
        self.sample_size = sample_size;
        self
    }

    /// The resolved tokenizer settings.
    pub fn format(&self) -> Format {
        self.overrides.apply(self.dialect)
    }

    pub fn retrieval(&self) -> Retrieval {
        self.retrieval
    }

    /// Use `reader` as the source, discarding any previous state.
    pub fn set_source<R: Read + 'static>(&mut self, reader: R) -> &mut Self {
        self.clear();
        self.source_path = None;
        self.pending = Some(Box::new(reader));
        self
    }

    /// Use in-memory bytes as the source.
    pub fn set_source_bytes(&mut self, data: impl Into<Vec<u8>>) -> &mut Self {
        self.set_source(Cursor::new(data.into()))
    }

    /// Use the file at `path` as the source.
    pub fn set_source_path<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        self.set_source(file);
        self.source_path = Some(path.to_path_buf());
        Ok(self)
    }

    /// Forget the schema and buffered rows. A file source is reopened, any
    /// other source has to be set again.
    pub fn reset(&mut self) -> Result<()> {
        self.clear();
        if let Some(path) = self.source_path.clone() {
            self.pending = Some(Box::new(File::open(path)?));
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.pending = None;
        self.records = None;
        self.schema = None;
        self.buffer.clear();
        self.pool.clear();
        self.rows_decoded = 0;
        self.retrieval = Retrieval::None;
    }

    fn has_source(&self) -> bool {
        self.schema.is_some() || self.records.is_some() || self.pending.is_some()
    }

    /// Determine the structure of the data, reading the sample window if
    /// that has not happened yet.
    pub fn structure(&mut self) -> Result<&Schema> {
        if self.schema.is_none() {
            let schema = self.build_structure()?;
            self.schema = Some(schema);
        }
        self.schema
            .as_ref()
            .ok_or_else(|| ConvertError::InvalidState("structure unavailable".to_string()))
    }

    fn build_structure(&mut self) -> Result<Schema> {
        let format = self.format();

        if self.records.is_none() {
            let source = self.pending.take().ok_or(ConvertError::NoSource)?;
            self.records = Some(RecordSource::new(source, &format)?);
        }
        let records = self.records.as_mut().ok_or(ConvertError::NoSource)?;

        let header = if self.options.no_header {
            None
        } else {
            records.read_record()?
        };

        while self.sample_size.admits(self.buffer.len()) {
            match records.read_record()? {
                Some(record) => self.buffer.push_back(record),
                None => break,
            }
        }

        self.missing = MissingValue::new(self.missing_value.as_str())
            .with_null_string(format.null_string);
        let mut options = self.options.clone();
        options.missing = self.missing.clone();

        let schema = infer_schema(header.as_ref(), self.buffer.make_contiguous(), &options)?;
        debug!(
            "structure ready: {} columns, {} rows buffered",
            schema.len(),
            self.buffer.len()
        );
        Ok(schema)
    }

    /// Read and decode the whole data set.
    ///
    /// Any row that fails to decode fails the call. Afterwards the source is
    /// exhausted until [`CsvReader::reset`] or a new source.
    pub fn dataset(&mut self) -> Result<Dataset> {
        if self.retrieval == Retrieval::Incremental {
            return Err(ConvertError::ModeMix);
        }
        if !self.has_source() {
            return Err(ConvertError::NoSource);
        }
        if self.retrieval == Retrieval::Batch {
            return Err(ConvertError::InvalidState(
                "data set already read, reset the reader to read it again".to_string(),
            ));
        }
        // A failed structure request leaves the mode open.
        self.structure()?;
        self.retrieval = Retrieval::Batch;

        let schema = self.schema.as_ref().ok_or(ConvertError::NoSource)?;
        let decoder = RecordDecoder::new(schema, &self.missing);
        let mut data = Dataset::with_capacity(schema.clone(), self.buffer.len());

        while let Some(record) = self.buffer.pop_front() {
            self.rows_decoded += 1;
            data.push(decoder.decode_pooled(&record, self.rows_decoded, &mut self.pool)?)?;
        }
        if let Some(records) = self.records.as_mut() {
            while let Some(record) = records.read_record()? {
                self.rows_decoded += 1;
                data.push(decoder.decode_pooled(&record, self.rows_decoded, &mut self.pool)?)?;
            }
            debug!(
                "read {} records as {}",
                records.records_read(),
                records.encoding().name()
            );
        }
        self.records = None;

        debug!("decoded {} rows", data.num_rows());
        Ok(data)
    }

    /// Decode the next row, or `None` once the source is exhausted.
    ///
    /// A row that fails to decode fails only this call; the next call moves
    /// on to the following row.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.retrieval == Retrieval::Batch {
            return Err(ConvertError::ModeMix);
        }
        if !self.has_source() {
            return Err(ConvertError::NoSource);
        }
        self.structure()?;
        self.retrieval = Retrieval::Incremental;

        let record = match self.buffer.pop_front() {
            Some(record) => Some(record),
            None => match self.records.as_mut() {
                Some(records) => records.read_record()?,
                None => None,
            },
        };
        let Some(record) = record else {
            self.records = None;
            return Ok(None);
        };

        self.rows_decoded += 1;
        let schema = self.schema.as_ref().ok_or(ConvertError::NoSource)?;
        RecordDecoder::new(schema, &self.missing)
            .decode_pooled(&record, self.rows_decoded, &mut self.pool)
            .map(Some)
    }

    /// Read a data set from a file.
    pub fn read_path<P: AsRef<Path>>(&mut self, path: P) -> Result<Dataset> {
        self.set_source_path(path)?;
        self.dataset()
    }

    /// Read a data set from any reader.
    pub fn read_reader<R: Read + 'static>(&mut self, reader: R) -> Result<Dataset> {
        self.set_source(reader);
        self.dataset()
    }

    /// Read a data set from bytes.
    pub fn read_bytes(&mut self, data: &[u8]) -> Result<Dataset> {
        self.set_source_bytes(data);
        self.dataset()
    }
}
