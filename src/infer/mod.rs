//! Schema inference: names, column types and category sets.

pub mod names;
pub mod ranges;
pub mod types;

use tracing::debug;

use crate::codec::DEFAULT_DATE_FORMAT;
use crate::error::{ConvertError, Result};
use crate::schema::{Column, ColumnKind, MissingValue, Schema};
use crate::tokenizer::RawRecord;
use ranges::{ColumnRange, LabelSpec};

/// Settings that drive schema inference.
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    /// The first record holds data, not names.
    pub no_header: bool,
    /// Names for the leading columns, overriding the header record.
    pub custom_header: Vec<String>,
    pub nominal_range: ColumnRange,
    pub string_range: ColumnRange,
    pub date_range: ColumnRange,
    /// Explicit label lists; later specs win on overlap.
    pub label_specs: Vec<LabelSpec>,
    /// Format given to date columns.
    pub date_format: String,
    pub missing: MissingValue,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            no_header: false,
            custom_header: Vec::new(),
            nominal_range: ColumnRange::empty(),
            string_range: ColumnRange::empty(),
            date_range: ColumnRange::empty(),
            label_specs: Vec::new(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            missing: MissingValue::default(),
        }
    }
}

/// Build the schema from the header record (if any) and the sample window.
///
/// The column count comes from the first record: the header when there is
/// one, otherwise the first data row, otherwise the custom header. With no
/// records and no custom header there is nothing to build from.
pub fn infer_schema(
    header: Option<&RawRecord>,
    sample: &[RawRecord],
    options: &InferenceOptions,
) -> Result<Schema> {
    let num_columns = match (header, sample.first()) {
        (Some(record), _) => record.len(),
        (None, Some(record)) => record.len(),
        (None, None) if !options.custom_header.is_empty() => options.custom_header.len(),
        (None, None) => return Err(ConvertError::NoRows),
    };

    let names = names::resolve_names(
        header.map(Vec::as_slice),
        &options.custom_header,
        num_columns,
    );
    let kinds = types::detect_kinds(&names, sample, options);

    let columns = names
        .into_iter()
        .zip(kinds)
        .map(|(name, kind)| match kind {
            ColumnKind::Numeric => Ok(Column::numeric(name)),
            ColumnKind::Text => Ok(Column::text(name)),
            ColumnKind::Categorical { categories } => Column::categorical(name, categories),
            ColumnKind::Date { format } => Column::date(name, format),
        })
        .collect::<Result<Vec<_>>>()?;

    let schema = Schema::new(columns)?;
    debug!(
        "inferred schema with {} columns from {} sample rows",
        schema.len(),
        sample.len()
    );
    Ok(schema)
}
