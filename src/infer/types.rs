//! Column type detection over the sample window.

use foldhash::{HashSet, HashSetExt};
use tracing::{debug, warn};

use super::InferenceOptions;
use crate::column_type::ColumnType;
use crate::schema::{ColumnKind, MissingValue};
use crate::tokenizer::RawRecord;

/// Parse a cell as a floating point literal, ignoring surrounding whitespace.
#[inline]
pub fn parse_numeric(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok()
}

/// Returns true if the cell is a floating point literal.
#[inline]
pub fn is_numeric(cell: &str) -> bool {
    parse_numeric(cell).is_some()
}

/// Resolve the label list forced onto each column by the label specs.
///
/// Specs are applied in declaration order, so when two specs target the
/// same column the later one wins.
pub fn label_overrides<'a>(
    names: &[String],
    options: &'a InferenceOptions,
) -> Vec<Option<&'a [String]>> {
    let mut overrides: Vec<Option<&'a [String]>> = vec![None; names.len()];

    for (spec_idx, spec) in options.label_specs.iter().enumerate() {
        for idx in spec.selector().resolve(names) {
            if overrides[idx].is_some() {
                warn!(
                    "label spec #{} overrides an earlier label spec for column '{}'",
                    spec_idx + 1,
                    names[idx]
                );
            }
            overrides[idx] = Some(spec.labels());
        }
    }

    overrides
}

/// Declared type of each column before looking at any data.
///
/// Label specs force categorical. Otherwise the ranges are checked in
/// priority order nominal, string, date; anything left starts as numeric.
pub fn initial_types(
    num_columns: usize,
    overrides: &[Option<&[String]>],
    options: &InferenceOptions,
) -> Vec<ColumnType> {
    let mut types = vec![ColumnType::Numeric; num_columns];

    // Lowest priority first so higher priority ranges overwrite.
    for idx in options.date_range.resolve(num_columns) {
        types[idx] = ColumnType::Date;
    }
    for idx in options.string_range.resolve(num_columns) {
        types[idx] = ColumnType::Text;
    }
    for idx in options.nominal_range.resolve(num_columns) {
        types[idx] = ColumnType::Categorical;
    }
    for (idx, labels) in overrides.iter().enumerate() {
        if labels.is_some() {
            types[idx] = ColumnType::Categorical;
        }
    }

    types
}

/// Demote numeric columns holding a non-numeric, non-missing cell to text.
///
/// A demoted column never returns to numeric. Scanning stops as soon as no
/// numeric candidates remain.
pub fn demote_non_numeric(types: &mut [ColumnType], sample: &[RawRecord], missing: &MissingValue) {
    let mut candidates = types.iter().filter(|t| **t == ColumnType::Numeric).count();

    for (row_idx, row) in sample.iter().enumerate() {
        if candidates == 0 {
            break;
        }
        for (col_idx, cell) in row.iter().enumerate().take(types.len()) {
            if types[col_idx] != ColumnType::Numeric || missing.is_missing(cell) {
                continue;
            }
            if !is_numeric(cell) {
                debug!(
                    "column {} demoted to text by {:?} in data row {}",
                    col_idx + 1,
                    cell,
                    row_idx + 1
                );
                types[col_idx] = ColumnType::Text;
                candidates -= 1;
            }
        }
    }
}

/// Distinct non-missing values of each categorical column, sorted.
///
/// Columns that are not categorical, or whose labels come from a label
/// spec, get `None`.
pub fn collect_categories(
    types: &[ColumnType],
    overrides: &[Option<&[String]>],
    sample: &[RawRecord],
    missing: &MissingValue,
) -> Vec<Option<Vec<String>>> {
    let mut sets: Vec<Option<HashSet<&str>>> = types
        .iter()
        .zip(overrides)
        .map(|(t, o)| (*t == ColumnType::Categorical && o.is_none()).then(|| HashSet::with_capacity(16)))
        .collect();

    if sets.iter().all(Option::is_none) {
        return vec![None; types.len()];
    }

    for row in sample {
        for (col_idx, cell) in row.iter().enumerate().take(types.len()) {
            if let Some(set) = sets[col_idx].as_mut()
                && !missing.is_missing(cell)
            {
                set.insert(cell.as_str());
            }
        }
    }

    sets.into_iter()
        .map(|set| {
            set.map(|s| {
                let mut labels: Vec<String> = s.into_iter().map(str::to_string).collect();
                labels.sort();
                labels
            })
        })
        .collect()
}

/// Decide the final kind of every column.
///
/// With an empty sample no data is inspected: declared types still apply,
/// but range-declared categorical columns have no labels and become text.
pub fn detect_kinds(
    names: &[String],
    sample: &[RawRecord],
    options: &InferenceOptions,
) -> Vec<ColumnKind> {
    let overrides = label_overrides(names, options);
    let mut types = initial_types(names.len(), &overrides, options);

    let categories = if sample.is_empty() {
        vec![None; types.len()]
    } else {
        demote_non_numeric(&mut types, sample, &options.missing);
        collect_categories(&types, &overrides, sample, &options.missing)
    };

    types
        .into_iter()
        .zip(overrides)
        .zip(categories)
        .enumerate()
        .map(|(idx, ((column_type, labels), observed))| match column_type {
            ColumnType::Numeric => ColumnKind::Numeric,
            ColumnType::Text => ColumnKind::Text,
            ColumnType::Date => ColumnKind::Date {
                format: options.date_format.clone(),
            },
            ColumnType::Categorical => {
                let categories = match labels {
                    Some(declared) => declared.to_vec(),
                    None => observed.unwrap_or_default(),
                };
                if categories.is_empty() {
                    warn!(
                        "nominal column '{}' has no observed values, treating it as text",
                        names[idx]
                    );
                    ColumnKind::Text
                } else {
                    ColumnKind::Categorical { categories }
                }
            }
        })
        .collect()
}
