//! Writer session: batch or incremental output of typed rows.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::codec::RecordEncoder;
use crate::dialect::{Dialect, Format, FormatOverrides, QuoteMode};
use crate::error::{ConvertError, Result};
use crate::reader::Retrieval;
use crate::schema::{Dataset, Row, Schema};
use crate::tokenizer::writer_builder;

/// Where an incremental write currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteState {
    /// No structure yet.
    #[default]
    Idle,
    /// Structure known, nothing written.
    StructureReady,
    /// Header flushed, accepting rows.
    Writing,
    /// All rows written and the sink flushed.
    Done,
    /// Abandoned by the caller.
    Cancelled,
}

/// Writes typed rows to a sink in a chosen dialect.
///
/// # Example
///
/// ```no_run
/// use csv_tabular::{CsvReader, CsvWriter, Dialect};
///
/// let data = CsvReader::new().read_path("in.csv").unwrap();
///
/// let mut writer = CsvWriter::from_writer(Vec::new());
/// writer.dialect(Dialect::Tdf);
/// writer.write_batch(&data).unwrap();
/// let tsv = writer.into_inner().unwrap();
/// ```
#[derive(Debug)]
pub struct CsvWriter<W: Write> {
    dialect: Dialect,
    overrides: FormatOverrides,
    write_header: bool,
    /// Sink before the first write.
    raw: Option<W>,
    writer: Option<csv::Writer<W>>,
    schema: Option<Schema>,
    state: WriteState,
    retrieval: Retrieval,
    rows_written: usize,
}

impl CsvWriter<BufWriter<File>> {
    /// Create a writer for a new file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_writer(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> CsvWriter<W> {
    /// Create a writer around `sink` with default settings.
    pub fn from_writer(sink: W) -> Self {
        Self {
            dialect: Dialect::Default,
            overrides: FormatOverrides::default(),
            write_header: true,
            raw: Some(sink),
            writer: None,
            schema: None,
            state: WriteState::Idle,
            retrieval: Retrieval::None,
            rows_written: 0,
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

    /// Override the dialect's quoting policy.
    pub fn quote_mode(&mut self, mode: QuoteMode) -> &mut Self {
        self.overrides.quote_mode = Some(mode);
        self
    }

    /// Suppress the header row.
    pub fn no_header(&mut self, no_header: bool) -> &mut Self {
        self.write_header = !no_header;
        self
    }

    /// The resolved printer settings.
    pub fn format(&self) -> Format {
        self.overrides.apply(self.dialect)
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Write a complete data set and flush the sink.
    pub fn write_batch(&mut self, data: &Dataset) -> Result<()> {
        if self.retrieval == Retrieval::Incremental {
            return Err(ConvertError::ModeMix);
        }
        self.check_open()?;
        self.retrieval = Retrieval::Batch;

        let format = self.open()?;
        let encoder = RecordEncoder::for_format(data.schema(), &format);
        let writer = self.writer.as_mut().ok_or(ConvertError::NoSource)?;

        if self.write_header {
            writer.write_record(encoder.header().iter().map(|f| f.as_bytes()))?;
        }
        for row in data.rows() {
            let fields = encoder.encode(row)?;
            writer.write_record(fields.iter().map(|f| f.as_bytes()))?;
            self.rows_written += 1;
        }
        writer.flush()?;

        self.schema = Some(data.schema().clone());
        self.state = WriteState::Done;
        debug!("wrote {} rows", self.rows_written);
        Ok(())
    }

    /// Establish the structure for incremental writing.
    pub fn set_structure(&mut self, schema: Schema) -> Result<()> {
        if self.retrieval == Retrieval::Batch {
            return Err(ConvertError::ModeMix);
        }
        match self.state {
            WriteState::Idle => {
                self.retrieval = Retrieval::Incremental;
                self.schema = Some(schema);
                self.state = WriteState::StructureReady;
                Ok(())
            }
            WriteState::Done | WriteState::Cancelled => Err(closed()),
            WriteState::StructureReady | WriteState::Writing => Err(ConvertError::InvalidState(
                "structure has already been established".to_string(),
            )),
        }
    }

    /// Write one row, or finish the output with `None`.
    ///
    /// The header goes out with the first row. Finishing flushes the sink;
    /// finishing before any row writes just the header.
    pub fn write_row(&mut self, row: Option<&Row>) -> Result<()> {
        if self.retrieval == Retrieval::Batch {
            return Err(ConvertError::ModeMix);
        }

        match self.state {
            WriteState::Idle => Err(ConvertError::InvalidState(
                "structure must be established first".to_string(),
            )),
            WriteState::Done | WriteState::Cancelled => Err(closed()),
            WriteState::StructureReady => {
                self.open()?;
                self.write_header_row()?;
                self.state = WriteState::Writing;
                self.write_row(row)
            }
            WriteState::Writing => match row {
                Some(row) => {
                    let schema = self.schema.as_ref().ok_or(ConvertError::NoSource)?;
                    let fields = RecordEncoder::for_format(schema, &self.format()).encode(row)?;
                    let writer = self.writer.as_mut().ok_or(ConvertError::NoSource)?;
                    writer.write_record(fields.iter().map(|f| f.as_bytes()))?;
                    self.rows_written += 1;
                    Ok(())
                }
                None => {
                    if let Some(writer) = self.writer.as_mut() {
                        writer.flush()?;
                    }
                    self.state = WriteState::Done;
                    debug!("wrote {} rows", self.rows_written);
                    Ok(())
                }
            },
        }
    }

    /// Abandon the output. Nothing else can be written afterwards.
    pub fn cancel(&mut self) {
        self.state = WriteState::Cancelled;
    }

    /// Flush and return the underlying sink.
    pub fn into_inner(self) -> Result<W> {
        match (self.writer, self.raw) {
            (Some(writer), _) => writer
                .into_inner()
                .map_err(|e| ConvertError::Io(e.into_error())),
            (None, Some(raw)) => Ok(raw),
            (None, None) => Err(ConvertError::NoSource),
        }
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            WriteState::Done | WriteState::Cancelled => Err(closed()),
            _ => Ok(()),
        }
    }

    fn open(&mut self) -> Result<Format> {
        let format = self.format();
        if self.writer.is_none() {
            let raw = self.raw.take().ok_or(ConvertError::NoSource)?;
            self.writer = Some(writer_builder(&format).from_writer(raw));
        }
        Ok(format)
    }

    fn write_header_row(&mut self) -> Result<()> {
        if !self.write_header {
            return Ok(());
        }
        let format = self.format();
        let schema = self.schema.as_ref().ok_or(ConvertError::NoSource)?;
        let writer = self.writer.as_mut().ok_or(ConvertError::NoSource)?;
        let header = RecordEncoder::for_format(schema, &format).header();
        writer.write_record(header.iter().map(|f| f.as_bytes()))?;
        Ok(())
    }
}

fn closed() -> ConvertError {
    ConvertError::InvalidState("writer is closed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Value};

    fn schema() -> Schema {
        Schema::new(vec![
            Column::numeric("n"),
            Column::categorical("c", vec!["a".into(), "b".into()]).unwrap(),
        ])
        .unwrap()
    }

    fn output(writer: CsvWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_incremental_states() {
        let mut writer = CsvWriter::from_writer(Vec::new());
        writer.dialect(Dialect::InformixUnloadCsv);
        assert_eq!(writer.state(), WriteState::Idle);

        writer.set_structure(schema()).unwrap();
        assert_eq!(writer.state(), WriteState::StructureReady);

        let row = Row::new(vec![Value::Numeric(1.0), Value::Category(1)]);
        writer.write_row(Some(&row)).unwrap();
        assert_eq!(writer.state(), WriteState::Writing);

        let row = Row::new(vec![Value::Missing, Value::Category(0)]);
        writer.write_row(Some(&row)).unwrap();
        writer.write_row(None).unwrap();
        assert_eq!(writer.state(), WriteState::Done);
        assert_eq!(writer.rows_written(), 2);

        assert!(writer.write_row(None).is_err());
        assert_eq!(output(writer), "n,c\n1,b\n,a\n");
    }

    #[test]
    fn test_write_before_structure() {
        let mut writer = CsvWriter::from_writer(Vec::new());
        let err = writer.write_row(None).unwrap_err();
        assert!(err.to_string().contains("structure must be established first"));
    }

    #[test]
    fn test_finish_without_rows_writes_header() {
        let mut writer = CsvWriter::from_writer(Vec::new());
        writer.dialect(Dialect::Rfc4180);
        writer.set_structure(schema()).unwrap();
        writer.write_row(None).unwrap();
        assert_eq!(output(writer), "n,c\r\n");
    }

    #[test]
    fn test_mode_mixing() {
        let mut writer = CsvWriter::from_writer(Vec::new());
        writer.set_structure(schema()).unwrap();
        let data = Dataset::new(schema());
        assert!(matches!(
            writer.write_batch(&data),
            Err(ConvertError::ModeMix)
        ));

        let mut writer = CsvWriter::from_writer(Vec::new());
        writer.write_batch(&data).unwrap();
        assert!(matches!(
            writer.set_structure(schema()),
            Err(ConvertError::ModeMix)
        ));
        assert!(matches!(writer.write_row(None), Err(ConvertError::ModeMix)));
    }

    #[test]
    fn test_cancel_from_any_state() {
        let mut writer = CsvWriter::from_writer(Vec::new());
        writer.cancel();
        assert_eq!(writer.state(), WriteState::Cancelled);
        assert!(writer.set_structure(schema()).is_err());

        let mut writer = CsvWriter::from_writer(Vec::new());
        writer.set_structure(schema()).unwrap();
        writer
            .write_row(Some(&Row::new(vec![Value::Numeric(2.0), Value::Missing])))
            .unwrap();
        writer.cancel();
        assert!(writer.write_row(None).is_err());
    }

    #[test]
    fn test_batch_without_header() {
        let mut data = Dataset::new(schema());
        data.push(Row::new(vec![Value::Numeric(0.5), Value::Category(0)]))
            .unwrap();

        let mut writer = CsvWriter::from_writer(Vec::new());
        writer
            .dialect(Dialect::Tdf)
            .no_header(true)
            .quote_mode(QuoteMode::NonNumeric);
        writer.write_batch(&data).unwrap();
        assert_eq!(writer.state(), WriteState::Done);
        assert_eq!(output(writer), "0.5\t\"a\"\r\n");
    }

    #[test]
    fn test_single_column_missing_cell_survives() {
        let mut data = Dataset::new(Schema::new(vec![Column::numeric("v")]).unwrap());
        data.push(Row::new(vec![Value::Numeric(1.0)])).unwrap();
        data.push(Row::new(vec![Value::Missing])).unwrap();

        let mut writer = CsvWriter::from_writer(Vec::new());
        writer.dialect(Dialect::MySql);
        writer.write_batch(&data).unwrap();
        assert_eq!(output(writer), "v\n1\n\\N\n");

        let mut writer = CsvWriter::from_writer(Vec::new());
        writer.write_batch(&data).unwrap();
        assert_eq!(output(writer), "v\r\n1\r\n\"\"\r\n");
    }

    #[test]
    fn test_escapes_text_for_quoteless_dialect() {
        let schema = Schema::new(vec![Column::text("t"), Column::numeric("n")]).unwrap();
        let mut writer = CsvWriter::from_writer(Vec::new());
        writer.dialect(Dialect::PostgreSqlText);
        writer.set_structure(schema).unwrap();
        writer
            .write_row(Some(&Row::new(vec![Value::text("a\tb\nc"), Value::Missing])))
            .unwrap();
        writer.write_row(None).unwrap();
        assert_eq!(output(writer), "t\tn\na\\\tb\\nc\t\\N\n");
    }
}
