use std::borrow::Cow;

use super::format_number;
use crate::dialect::Format;
use crate::error::{ConvertError, Result};
use crate::schema::{Row, Schema, Value, check_row};
use crate::tokenizer::{FieldKind, FieldPrinter};

/// Turns typed rows back into raw string fields.
#[derive(Debug, Clone)]
pub struct RecordEncoder<'a> {
    schema: &'a Schema,
    missing: &'a str,
    printer: Option<FieldPrinter>,
}

impl<'a> RecordEncoder<'a> {
    /// An encoder producing plain field text, missing values as empty fields.
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            missing: "",
            printer: None,
        }
    }

    /// An encoder producing fields ready to be written in `format`: quoted
    /// or escaped as the format requires, missing values as its null string.
    pub fn for_format(schema: &'a Schema, format: &Format) -> Self {
        Self {
            schema,
            missing: format.null_string.unwrap_or(""),
            printer: Some(FieldPrinter::new(format)),
        }
    }

    /// The header record: column names in schema order.
    pub fn header(&self) -> Vec<Cow<'a, str>> {
        let sole = self.schema.len() == 1;
        self.schema
            .names()
            .into_iter()
            .map(|name| self.print(Cow::Borrowed(name), FieldKind::Text, sole))
            .collect()
    }

    /// Encode one row.
    ///
    /// Missing values become the missing token whatever the column type.
    /// Numbers and dates are written as their stored numeric value;
    /// categorical and text cells as their string.
    pub fn encode<'r>(&self, row: &'r Row) -> Result<Vec<Cow<'r, str>>>
    where
        'a: 'r,
    {
        check_row(self.schema, row)?;
        let sole = row.len() == 1;

        self.schema
            .columns()
            .iter()
            .zip(row.iter())
            .map(|(column, value)| {
                let field = match value {
                    Value::Missing => Cow::Borrowed(self.missing),
                    Value::Numeric(v) | Value::Date(v) => Cow::Owned(format_number(*v)),
                    Value::Category(idx) => {
                        Cow::Borrowed(column.category(*idx).ok_or_else(|| {
                            ConvertError::InvalidSchema(format!(
                                "label index {idx} out of range for column '{}'",
                                column.name()
                            ))
                        })?)
                    }
                    Value::Text(s) => Cow::Borrowed(&**s),
                };
                let kind = if value.is_missing() {
                    FieldKind::Missing
                } else if column.column_type().is_numeric_like() {
                    FieldKind::Number
                } else {
                    FieldKind::Text
                };
                Ok(self.print(field, kind, sole))
            })
            .collect()
    }

    fn print<'f>(&self, field: Cow<'f, str>, kind: FieldKind, sole: bool) -> Cow<'f, str> {
        match &self.printer {
            Some(printer) => printer.print(field, kind, sole),
            None => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::numeric("n"),
            Column::categorical("c", vec!["blue".into(), "red".into()]).unwrap(),
            Column::text("t"),
            Column::date("d", "%Y-%m-%d").unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_encode_all_types() {
        let schema = schema();
        let encoder = RecordEncoder::new(&schema);
        let row = Row::new(vec![
            Value::Numeric(2.5),
            Value::Category(0),
            Value::text("a, b"),
            Value::Date(86_400_000.0),
        ]);

        let fields = encoder.encode(&row).unwrap();
        assert_eq!(fields, vec!["2.5", "blue", "a, b", "86400000"]);
        assert_eq!(encoder.header(), vec!["n", "c", "t", "d"]);
    }

    #[test]
    fn test_missing_is_empty_for_every_type() {
        let schema = schema();
        let encoder = RecordEncoder::new(&schema);
        let row = Row::new(vec![Value::Missing; 4]);

        let fields = encoder.encode(&row).unwrap();
        assert!(fields.iter().all(|f| f.is_empty()));
    }

    #[test]
    fn test_rejects_misaligned_rows() {
        let schema = schema();
        let encoder = RecordEncoder::new(&schema);

        assert!(encoder.encode(&Row::new(vec![Value::Missing])).is_err());
        let wrong_type = Row::new(vec![
            Value::text("x"),
            Value::Missing,
            Value::Missing,
            Value::Missing,
        ]);
        assert!(encoder.encode(&wrong_type).is_err());
    }

    #[test]
    fn test_missing_uses_dialect_null_string() {
        let schema = schema();
        let format = crate::dialect::Dialect::MySql.format();
        let encoder = RecordEncoder::for_format(&schema, &format);
        let row = Row::new(vec![Value::Missing; 4]);

        let fields = encoder.encode(&row).unwrap();
        assert!(fields.iter().all(|f| f == "\\N"));
    }

    #[test]
    fn test_for_format_prints_fields() {
        let schema = Schema::new(vec![Column::numeric("n"), Column::text("t")]).unwrap();
        let format = Format {
            quote_mode: crate::dialect::QuoteMode::NonNumeric,
            ..Format::default()
        };
        let encoder = RecordEncoder::for_format(&schema, &format);
        assert_eq!(encoder.header(), vec!["\"n\"", "\"t\""]);

        let row = Row::new(vec![Value::Numeric(3.0), Value::text("say \"hi\"")]);
        let fields = encoder.encode(&row).unwrap();
        assert_eq!(fields, vec!["3", "\"say \"\"hi\"\"\""]);
    }
}
