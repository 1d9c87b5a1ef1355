use std::fmt;

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColumnType {
    /// Floating point values.
    #[default]
    Numeric,
    /// Values drawn from a closed, ordered set of labels.
    Categorical,
    /// Free text.
    Text,
    /// Dates, stored as milliseconds since the Unix epoch.
    Date,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Numeric => write!(f, "numeric"),
            ColumnType::Categorical => write!(f, "categorical"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Date => write!(f, "date"),
        }
    }
}

impl ColumnType {
    /// Returns true if values of this type are written as numbers, which
    /// matters for non-numeric quoting.
    #[inline]
    pub fn is_numeric_like(&self) -> bool {
        matches!(self, ColumnType::Numeric | ColumnType::Date)
    }
}
