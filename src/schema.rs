//! Column schema, typed values and the in-memory dataset.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use foldhash::{HashMap, HashMapExt, HashSet, HashSetExt};

use crate::column_type::ColumnType;
use crate::error::{ConvertError, Result};

/// Type-specific payload of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    Numeric,
    /// Ordered labels; a value's index into this list is its stored form.
    Categorical { categories: Vec<String> },
    Text,
    /// chrono strftime pattern used to parse cells.
    Date { format: String },
}

impl ColumnKind {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnKind::Numeric => ColumnType::Numeric,
            ColumnKind::Categorical { .. } => ColumnType::Categorical,
            ColumnKind::Text => ColumnType::Text,
            ColumnKind::Date { .. } => ColumnType::Date,
        }
    }
}

/// A single column of a [`Schema`].
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    /// Label -> index lookup, only populated for categorical columns.
    label_index: HashMap<String, usize>,
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind
    }
}

impl Column {
    /// Create a numeric column.
    pub fn numeric(name: impl Into<String>) -> Self {
        Self::plain(name.into(), ColumnKind::Numeric)
    }

    /// Create a text column.
    pub fn text(name: impl Into<String>) -> Self {
        Self::plain(name.into(), ColumnKind::Text)
    }

    /// Create a categorical column with the given label order.
    ///
    /// Fails if the label list is empty or contains duplicates.
    pub fn categorical(name: impl Into<String>, categories: Vec<String>) -> Result<Self> {
        let name = name.into();
        if categories.is_empty() {
            return Err(ConvertError::InvalidSchema(format!(
                "categorical column '{name}' has no labels"
            )));
        }

        let mut label_index = HashMap::with_capacity(categories.len());
        for (idx, label) in categories.iter().enumerate() {
            if label_index.insert(label.clone(), idx).is_some() {
                return Err(ConvertError::InvalidSchema(format!(
                    "categorical column '{name}' repeats label '{label}'"
                )));
            }
        }

        Ok(Self {
            name,
            kind: ColumnKind::Categorical { categories },
            label_index,
        })
    }

    /// Create a date column parsed with the given format.
    pub fn date(name: impl Into<String>, format: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let format = format.into();
        if format.is_empty() {
            return Err(ConvertError::InvalidSchema(format!(
                "date column '{name}' has an empty format"
            )));
        }
        Ok(Self::plain(name, ColumnKind::Date { format }))
    }

    fn plain(name: String, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            label_index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn column_type(&self) -> ColumnType {
        self.kind.column_type()
    }

    /// Labels of a categorical column.
    pub fn categories(&self) -> Option<&[String]> {
        match &self.kind {
            ColumnKind::Categorical { categories } => Some(categories),
            _ => None,
        }
    }

    /// Date format of a date column.
    pub fn date_format(&self) -> Option<&str> {
        match &self.kind {
            ColumnKind::Date { format } => Some(format),
            _ => None,
        }
    }

    /// Index of `label` within a categorical column.
    #[inline]
    pub fn category_index(&self, label: &str) -> Option<usize> {
        self.label_index.get(label).copied()
    }

    /// Label stored at `index` within a categorical column.
    pub fn category(&self, index: usize) -> Option<&str> {
        self.categories()
            .and_then(|c| c.get(index))
            .map(String::as_str)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ColumnKind::Categorical { categories } => {
                write!(f, "{}: categorical {{{}}}", self.name, categories.join(","))
            }
            ColumnKind::Date { format } => write!(f, "{}: date \"{}\"", self.name, format),
            kind => write!(f, "{}: {}", self.name, kind.column_type()),
        }
    }
}

/// Ordered, name-unique list of columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Create a schema, rejecting empty or duplicate column names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.name.is_empty() {
                return Err(ConvertError::InvalidSchema(
                    "column names must not be empty".to_string(),
                ));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(ConvertError::InvalidSchema(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Column names in on-disk order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Position of the column called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Tokens that stand for "no value" in raw input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MissingValue {
    /// User configured missing-value token, empty by default.
    token: String,
    /// The dialect's own null string, if it has one.
    null_string: Option<&'static str>,
}

impl MissingValue {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            null_string: None,
        }
    }

    /// Also treat the dialect's null string as missing.
    pub fn with_null_string(mut self, null_string: Option<&'static str>) -> Self {
        self.null_string = null_string;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    #[inline]
    pub fn is_missing(&self, cell: &str) -> bool {
        cell == self.token || self.null_string == Some(cell)
    }
}

/// A single decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value.
    Missing,
    Numeric(f64),
    /// Index into the column's categories.
    Category(usize),
    Text(Arc<str>),
    /// Milliseconds since the Unix epoch.
    Date(f64),
}

impl Value {
    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Shorthand for building text values.
    pub fn text(s: &str) -> Self {
        Value::Text(Arc::from(s))
    }
}

/// Typed row aligned to a schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl Deref for Row {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.0
    }
}

/// A schema plus its typed rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    schema: Schema,
    rows: Vec<Row>,
}

impl Dataset {
    /// Create an empty dataset for `schema`.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Create an empty dataset with room for `capacity` rows.
    pub fn with_capacity(schema: Schema, capacity: usize) -> Self {
        Self {
            schema,
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Append a row after checking it against the schema.
    pub fn push(&mut self, row: Row) -> Result<()> {
        check_row(&self.schema, &row)?;
        self.rows.push(row);
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.schema.len()
    }

    /// The string form of a categorical or text cell.
    pub fn string_value(&self, row: usize, column: usize) -> Option<&str> {
        let value = self.rows.get(row)?.get(column)?;
        match value {
            Value::Category(idx) => self.schema.column(column)?.category(*idx),
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_parts(self) -> (Schema, Vec<Row>) {
        (self.schema, self.rows)
    }
}

/// Check that `row` has one value per column and that every value fits its column.
pub(crate) fn check_row(schema: &Schema, row: &Row) -> Result<()> {
    if row.len() != schema.len() {
        return Err(ConvertError::InvalidSchema(format!(
            "row has {} values but schema has {} columns",
            row.len(),
            schema.len()
        )));
    }

    for (column, value) in schema.columns().iter().zip(row.iter()) {
        let fits = match (column.kind(), value) {
            (_, Value::Missing) => true,
            (ColumnKind::Numeric, Value::Numeric(_)) => true,
            (ColumnKind::Categorical { categories }, Value::Category(idx)) => {
                *idx < categories.len()
            }
            (ColumnKind::Text, Value::Text(_)) => true,
            (ColumnKind::Date { .. }, Value::Date(_)) => true,
            _ => false,
        };
        if !fits {
            return Err(ConvertError::InvalidSchema(format!(
                "value {value:?} does not fit column '{}' ({})",
                column.name(),
                column.column_type()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_rejects_duplicates() {
        let result = Schema::new(vec![Column::numeric("a"), Column::text("a")]);
        assert!(matches!(result, Err(ConvertError::InvalidSchema(_))));
    }

    #[test]
    fn test_schema_rejects_empty_name() {
        assert!(Schema::new(vec![Column::numeric("")]).is_err());
    }

    #[test]
    fn test_categorical_invariants() {
        assert!(Column::categorical("c", vec![]).is_err());
        assert!(Column::categorical("c", vec!["x".into(), "x".into()]).is_err());

        let col = Column::categorical("c", vec!["z".into(), "a".into()]).unwrap();
        assert_eq!(col.column_type(), ColumnType::Categorical);
        assert_eq!(col.category_index("a"), Some(1));
        assert_eq!(col.category(0), Some("z"));
        assert_eq!(col.category_index("b"), None);
        assert!(col.date_format().is_none());
    }

    #[test]
    fn test_date_requires_format() {
        assert!(Column::date("d", "").is_err());
        let col = Column::date("d", "%Y-%m-%d").unwrap();
        assert_eq!(col.date_format(), Some("%Y-%m-%d"));
        assert!(col.categories().is_none());
    }

    #[test]
    fn test_dataset_push_checks_row() {
        let schema = Schema::new(vec![
            Column::numeric("n"),
            Column::categorical("c", vec!["x".into()]).unwrap(),
        ])
        .unwrap();
        let mut data = Dataset::new(schema);

        assert!(data.push(Row::new(vec![Value::Numeric(1.0)])).is_err());
        assert!(
            data.push(Row::new(vec![Value::Numeric(1.0), Value::Category(3)]))
                .is_err()
        );
        assert!(
            data.push(Row::new(vec![Value::text("x"), Value::Category(0)]))
                .is_err()
        );
        data.push(Row::new(vec![Value::Missing, Value::Category(0)]))
            .unwrap();

        assert_eq!(data.num_rows(), 1);
        assert_eq!(data.string_value(0, 1), Some("x"));
        assert_eq!(data.string_value(0, 0), None);
    }

    #[test]
    fn test_index_of() {
        let schema = Schema::new(vec![Column::numeric("a"), Column::text("b")]).unwrap();
        assert_eq!(schema.index_of("b"), Some(1));
        assert_eq!(schema.index_of("c"), None);
        assert_eq!(schema.names(), vec!["a", "b"]);
    }
}
