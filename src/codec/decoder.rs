use std::sync::Arc;

use foldhash::HashSet;

use super::parse_date;
use crate::error::{ConvertError, Result};
use crate::infer::types::parse_numeric;
use crate::schema::{ColumnKind, MissingValue, Row, Schema, Value};
use crate::tokenizer::RawRecord;

/// Shares repeated text cells so equal strings in a column point to a
/// single allocation.
#[derive(Debug, Default)]
pub struct TextPool {
    columns: Vec<HashSet<Arc<str>>>,
}

impl TextPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared handle for `text` in column `column`.
    pub fn intern(&mut self, column: usize, text: &str) -> Arc<str> {
        if self.columns.len() <= column {
            self.columns.resize_with(column + 1, HashSet::default);
        }
        let set = &mut self.columns[column];
        if let Some(existing) = set.get(text) {
            return Arc::clone(existing);
        }
        let handle: Arc<str> = Arc::from(text);
        set.insert(Arc::clone(&handle));
        handle
    }

    /// Number of distinct strings held for `column`.
    pub fn distinct(&self, column: usize) -> usize {
        self.columns.get(column).map_or(0, HashSet::len)
    }

    pub fn clear(&mut self) {
        self.columns.clear();
    }
}

/// Decodes raw records into typed rows against a fixed schema.
///
/// Holds no state besides its borrowed schema, so the same decoder serves
/// whole-file and row-at-a-time reading. Callers that keep a [`TextPool`]
/// across records get repeated text shared.
#[derive(Debug, Clone, Copy)]
pub struct RecordDecoder<'a> {
    schema: &'a Schema,
    missing: &'a MissingValue,
}

impl<'a> RecordDecoder<'a> {
    pub fn new(schema: &'a Schema, missing: &'a MissingValue) -> Self {
        Self { schema, missing }
    }

    /// Decode one record. `row` is the 1-based data row number used in errors.
    ///
    /// Cells past the end of a short record are missing; cells past the last
    /// column are ignored.
    pub fn decode(&self, record: &RawRecord, row: usize) -> Result<Row> {
        self.decode_with(record, row, None)
    }

    /// Like [`RecordDecoder::decode`], taking text cells from `pool`.
    pub fn decode_pooled(&self, record: &RawRecord, row: usize, pool: &mut TextPool) -> Result<Row> {
        self.decode_with(record, row, Some(pool))
    }

    fn decode_with(
        &self,
        record: &RawRecord,
        row: usize,
        mut pool: Option<&mut TextPool>,
    ) -> Result<Row> {
        let values = self
            .schema
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let Some(cell) = record.get(idx) else {
                    return Ok(Value::Missing);
                };
                if self.missing.is_missing(cell) {
                    return Ok(Value::Missing);
                }

                match column.kind() {
                    ColumnKind::Numeric => parse_numeric(cell).map(Value::Numeric).ok_or_else(|| {
                        ConvertError::InvalidNumber {
                            row,
                            column: idx + 1,
                            value: cell.clone(),
                        }
                    }),
                    ColumnKind::Categorical { .. } => column
                        .category_index(cell)
                        .map(Value::Category)
                        .ok_or_else(|| ConvertError::UnknownCategory {
                            row,
                            column: idx + 1,
                            value: cell.clone(),
                        }),
                    ColumnKind::Text => Ok(Value::Text(match pool.as_deref_mut() {
                        Some(pool) => pool.intern(idx, cell),
                        None => Arc::from(cell.as_str()),
                    })),
                    ColumnKind::Date { format } => parse_date(cell, format)
                        .map(Value::Date)
                        .ok_or_else(|| ConvertError::InvalidDate {
                            row,
                            column: idx + 1,
                            value: cell.clone(),
                            format: format.clone(),
                        }),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Row::new(values))
    }
}
