//! Glue between a [`Format`] and the tokenizer and printer underneath.
//!
//! Fields are split by `csv-core`, which reports where each field ends but
//! not whether it was quoted; the source watches the first byte of every
//! field so that trimming and unescaping only touch unquoted text. Writing
//! goes through the `csv` writer with quoting switched off, after
//! [`FieldPrinter`] has quoted or escaped each field itself.

use std::borrow::Cow;
use std::io::{BufRead, BufReader, Read};

use csv_core::ReadFieldResult;
use encoding_rs::Encoding;

use crate::dialect::{Format, Quote, QuoteMode};
use crate::encoding::{decode_field, detect_encoding, has_utf16_bom};
use crate::error::{ConvertError, Result};

/// A record as produced by the tokenizer: one string per field.
pub type RawRecord = Vec<String>;

/// Bytes peeked at the start of a source for encoding detection.
const PEEK_CAPACITY: usize = 64 * 1024;

/// Scratch space `csv-core` unescapes field bytes into.
const FIELD_CHUNK: usize = 8 * 1024;

/// Build a `csv-core` reader configured for `format`.
///
/// Field counts are not checked; names and ragged rows are dealt with by
/// the caller.
pub fn core_reader(format: &Format) -> csv_core::Reader {
    let mut builder = csv_core::ReaderBuilder::new();
    builder.delimiter(format.delimiter);

    match format.quote {
        Quote::None => {
            builder.quoting(false);
        }
        Quote::Some(q) => {
            builder.quoting(true).quote(q);
        }
    }

    if let Some(escape) = format.escape {
        builder.escape(Some(escape)).double_quote(false);
    }

    builder.build()
}

/// Build a `csv` writer configured for `format`.
///
/// The writer never quotes on its own; fields arrive already rendered by a
/// [`FieldPrinter`].
pub fn writer_builder(format: &Format) -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(format.delimiter)
        .flexible(true)
        .terminator(format.terminator.csv_terminator())
        .quote_style(csv::QuoteStyle::Never);

    if let Quote::Some(q) = format.quote {
        builder.quote(q);
    }

    builder
}

/// What a field to be printed holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A missing value, already rendered as the dialect's null token.
    Missing,
    /// A value from a numeric or date column.
    Number,
    /// A label, free text or a column name.
    Text,
}

/// Renders fields so that reading them back with the same [`Format`]
/// yields the original text.
///
/// With a quote character, fields are quoted according to the quote mode
/// and whenever their content would otherwise be misread. Inside quotes the
/// escape character (or a doubled quote) protects quotes and escapes.
/// Without a quote character, special characters are escaped in place.
#[derive(Debug, Clone)]
pub struct FieldPrinter {
    format: Format,
}

impl FieldPrinter {
    pub fn new(format: &Format) -> Self {
        Self {
            format: format.clone(),
        }
    }

    /// Render one field. `sole` marks the only field of its record, which
    /// must not come out empty or the record would read as a blank line.
    pub fn print<'f>(&self, field: Cow<'f, str>, kind: FieldKind, sole: bool) -> Cow<'f, str> {
        let Quote::Some(quote) = self.format.quote else {
            if kind == FieldKind::Missing {
                return field;
            }
            return match self.escape_unquoted(&field, None) {
                Some(escaped) => Cow::Owned(escaped),
                None => field,
            };
        };

        let blank = sole && field.is_empty();
        let quote_it = match (self.format.quote_mode, kind) {
            (QuoteMode::All, _) => true,
            (_, FieldKind::Missing) => blank,
            (QuoteMode::AllNonNull, _) => true,
            (QuoteMode::NonNumeric, FieldKind::Number) | (QuoteMode::Minimal, _) => {
                blank || self.needs_quotes(&field, quote)
            }
            (QuoteMode::NonNumeric, FieldKind::Text) => true,
            (QuoteMode::None, _) => {
                if self.format.escape.is_some() && !blank {
                    return match self.escape_unquoted(&field, Some(quote)) {
                        Some(escaped) => Cow::Owned(escaped),
                        None => field,
                    };
                }
                blank || self.needs_quotes(&field, quote)
            }
        };

        if quote_it {
            Cow::Owned(self.quoted(&field, quote))
        } else {
            field
        }
    }

    fn needs_quotes(&self, field: &str, quote: u8) -> bool {
        let bytes = field.as_bytes();
        let padded = self.format.trim
            && (bytes.first().is_some_and(u8::is_ascii_whitespace)
                || bytes.last().is_some_and(u8::is_ascii_whitespace));

        padded
            || bytes.iter().any(|&b| {
                b == self.format.delimiter
                    || b == quote
                    || Some(b) == self.format.escape
                    || b == b'\n'
                    || b == b'\r'
            })
    }

    fn quoted(&self, field: &str, quote: u8) -> String {
        let quote = char::from(quote);
        let escape = self.format.escape.map(char::from);
        let mut out = String::with_capacity(field.len() + 2);

        out.push(quote);
        for c in field.chars() {
            if c == quote || Some(c) == escape {
                out.push(escape.unwrap_or(quote));
            }
            out.push(c);
        }
        out.push(quote);
        out
    }

    /// Escape delimiters, line breaks and escapes outside quotes, or `None`
    /// when nothing needs escaping.
    fn escape_unquoted(&self, field: &str, quote: Option<u8>) -> Option<String> {
        let escape = self.format.escape?;
        let special = |b: u8| {
            b == self.format.delimiter || b == escape || Some(b) == quote || b == b'\n' || b == b'\r'
        };
        if !field.bytes().any(|b| special(b)) {
            return None;
        }

        let escape = char::from(escape);
        let mut out = String::with_capacity(field.len() + 4);
        for c in field.chars() {
            match c {
                '\n' => {
                    out.push(escape);
                    out.push('n');
                }
                '\r' => {
                    out.push(escape);
                    out.push('r');
                }
                c if c.is_ascii() && special(c as u8) => {
                    out.push(escape);
                    out.push(c);
                }
                c => out.push(c),
            }
        }
        Some(out)
    }
}

/// One field as split by `csv-core`.
#[derive(Debug)]
struct Token {
    bytes: Vec<u8>,
    quoted: bool,
}

/// Pulls raw records out of a byte source, transcoding fields to UTF-8.
pub struct RecordSource {
    input: BufReader<Box<dyn Read>>,
    core: csv_core::Reader,
    format: Format,
    encoding: &'static Encoding,
    scratch: Vec<u8>,
    records_read: usize,
}

impl std::fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSource")
            .field("encoding", &self.encoding.name())
            .field("records_read", &self.records_read)
            .finish_non_exhaustive()
    }
}

impl RecordSource {
    /// Wrap `source`, sniffing its encoding from the first buffered chunk.
    pub fn new(source: Box<dyn Read>, format: &Format) -> Result<Self> {
        let mut buffered = BufReader::with_capacity(PEEK_CAPACITY, source);
        let prefix = buffered.fill_buf()?;

        if has_utf16_bom(prefix) {
            return Err(ConvertError::InvalidConfig(
                "UTF-16 input is not supported, transcode to UTF-8 first".to_string(),
            ));
        }

        let info = detect_encoding(prefix, prefix.is_empty());
        if info.has_bom {
            buffered.consume(3);
        }
        if !info.is_utf8() {
            tracing::debug!("decoding input as {}", info.encoding.name());
        }

        Ok(Self {
            input: buffered,
            core: core_reader(format),
            format: format.clone(),
            encoding: info.encoding,
            scratch: vec![0; FIELD_CHUNK],
            records_read: 0,
        })
    }

    /// Read the next record, or `None` at end of input.
    ///
    /// Unquoted fields are trimmed when the format asks for it and have
    /// their escape sequences resolved; quoted fields are taken as
    /// `csv-core` unescaped them.
    pub fn read_record(&mut self) -> Result<Option<RawRecord>> {
        let Some(tokens) = self.read_tokens()? else {
            return Ok(None);
        };
        self.records_read += 1;

        let tokens = match self.format.escape {
            Some(escape) => rejoin_escaped_delimiters(tokens, escape, self.format.delimiter),
            None => tokens,
        };

        let encoding = self.encoding;
        Ok(Some(
            tokens
                .iter()
                .map(|token| {
                    let bytes = clean_token(token, &self.format);
                    decode_field(&bytes, encoding).into_owned()
                })
                .collect(),
        ))
    }

    fn read_tokens(&mut self) -> Result<Option<Vec<Token>>> {
        let quote = self.format.quote.char();
        let mut tokens = Vec::new();
        let mut bytes = Vec::new();
        let mut quoted = None;

        loop {
            let input = self.input.fill_buf()?;
            let at_eof = input.is_empty();

            if quoted.is_none() {
                // Terminators left over from the previous record come first.
                let skip = if tokens.is_empty() && bytes.is_empty() {
                    input.iter().take_while(|&&b| b == b'\r' || b == b'\n').count()
                } else {
                    0
                };
                if let Some(&first) = input.get(skip) {
                    quoted = Some(quote == Some(first));
                }
            }

            let (result, nin, nout) = self.core.read_field(input, &mut self.scratch);
            bytes.extend_from_slice(&self.scratch[..nout]);
            self.input.consume(nin);

            match result {
                ReadFieldResult::InputEmpty | ReadFieldResult::OutputFull => {
                    if at_eof && nin == 0 && nout == 0 {
                        break;
                    }
                }
                ReadFieldResult::Field { record_end } => {
                    tokens.push(Token {
                        bytes: std::mem::take(&mut bytes),
                        quoted: quoted.take().unwrap_or(false),
                    });
                    if record_end {
                        return Ok(Some(tokens));
                    }
                }
                ReadFieldResult::End => break,
            }
        }

        Ok((!tokens.is_empty()).then_some(tokens))
    }

    /// Number of records handed out so far.
    #[inline]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// The encoding fields are decoded with.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }
}

/// Glue back unquoted fields that `csv-core` split at an escaped delimiter.
///
/// A field ending in an odd run of escape characters ended on an escaped
/// delimiter, not a real one.
fn rejoin_escaped_delimiters(tokens: Vec<Token>, escape: u8, delimiter: u8) -> Vec<Token> {
    let mut joined: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut open = false;

    for token in tokens {
        if open && let Some(last) = joined.last_mut() {
            last.bytes.push(delimiter);
            last.bytes.extend_from_slice(&token.bytes);
        } else {
            joined.push(token);
        }
        open = joined
            .last()
            .is_some_and(|last| !last.quoted && ends_in_open_escape(&last.bytes, escape));
    }
    joined
}

fn ends_in_open_escape(bytes: &[u8], escape: u8) -> bool {
    bytes.iter().rev().take_while(|&&b| b == escape).count() % 2 == 1
}

fn clean_token<'t>(token: &'t Token, format: &Format) -> Cow<'t, [u8]> {
    if token.quoted {
        return Cow::Borrowed(&token.bytes);
    }
    let bytes = if format.trim {
        token.bytes.trim_ascii()
    } else {
        &token.bytes[..]
    };
    match format.escape {
        Some(escape) => unescape(bytes, escape, format),
        None => Cow::Borrowed(bytes),
    }
}

/// Resolve escape sequences in unquoted text.
///
/// `\t \n \r \b \f` map to their control characters and an escaped
/// delimiter, quote, escape or control character stands for itself. Any
/// other pair is kept as written, so tokens such as `\N` survive.
fn unescape<'b>(bytes: &'b [u8], escape: u8, format: &Format) -> Cow<'b, [u8]> {
    if !bytes.contains(&escape) {
        return Cow::Borrowed(bytes);
    }

    let literal = |b: u8| {
        b == format.delimiter
            || b == escape
            || Some(b) == format.quote.char()
            || matches!(b, b'\r' | b'\n' | b'\t' | 0x08 | 0x0C)
    };

    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(b) = iter.next() {
        if b != escape {
            out.push(b);
            continue;
        }
        match iter.next() {
            Some(b'r') => out.push(b'\r'),
            Some(b'n') => out.push(b'\n'),
            Some(b't') => out.push(b'\t'),
            Some(b'b') => out.push(0x08),
            Some(b'f') => out.push(0x0C),
            Some(c) if literal(c) => out.push(c),
            Some(c) => out.extend_from_slice(&[escape, c]),
            None => out.push(escape),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use std::io::Cursor;

    fn read_all(data: &[u8], format: &Format) -> Vec<RawRecord> {
        let mut source = RecordSource::new(Box::new(Cursor::new(data.to_vec())), format).unwrap();
        let mut rows = Vec::new();
        while let Some(row) = source.read_record().unwrap() {
            rows.push(row);
        }
        rows
    }

    fn print_record(format: &Format, fields: &[(&str, FieldKind)]) -> Vec<u8> {
        let printer = FieldPrinter::new(format);
        let sole = fields.len() == 1;
        let mut writer = writer_builder(format).from_writer(Vec::new());
        let printed: Vec<Cow<'_, str>> = fields
            .iter()
            .map(|(f, kind)| printer.print(Cow::Borrowed(*f), *kind, sole))
            .collect();
        writer
            .write_record(printed.iter().map(|f| f.as_bytes()))
            .unwrap();
        writer.into_inner().unwrap()
    }

    #[test]
    fn test_parse_simple_csv() {
        let rows = read_all(b"a,b,c\n1,2,3\n4,5,6\n", &Format::default());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_quoted_csv() {
        let rows = read_all(b"\"a,b\",c,d\r\n1,\"2\"\"x\",3\r\n", &Format::default());
        assert_eq!(rows[0], vec!["a,b", "c", "d"]);
        assert_eq!(rows[1], vec!["1", "2\"x", "3"]);
    }

    #[test]
    fn test_blank_lines_and_missing_final_terminator() {
        let rows = read_all(b"a,b\r\n\r\n\n1,2", &Format::default());
        assert_eq!(rows, vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn test_ragged_rows_survive() {
        let rows = read_all(b"a,b,c\n1\n1,2,3,4\n", &Format::default());
        assert_eq!(rows[1].len(), 1);
        assert_eq!(rows[2].len(), 4);
    }

    #[test]
    fn test_tdf_trims() {
        let rows = read_all(b"a\t b \n1\t2\n", &Dialect::Tdf.format());
        assert_eq!(rows[0], vec!["a", "b"]);
    }

    #[test]
    fn test_trim_keeps_spaces_inside_quotes() {
        let rows = read_all(b"\" padded \"\t plain \n", &Dialect::Tdf.format());
        assert_eq!(rows[0], vec![" padded ", "plain"]);

        let rows = read_all(b"\" x\", y \n", &Dialect::Oracle.format());
        assert_eq!(rows[0], vec![" x", "y"]);
    }

    #[test]
    fn test_mysql_no_quoting() {
        let rows = read_all(b"\"a\"\tb\n", &Dialect::MySql.format());
        assert_eq!(rows[0], vec!["\"a\"", "b"]);
    }

    #[test]
    fn test_mysql_escapes_resolved() {
        let rows = read_all(
            b"a\\\tb\tline\\nbreak\tback\\\\\t\\N\n",
            &Dialect::MySql.format(),
        );
        assert_eq!(rows[0], vec!["a\tb", "line\nbreak", "back\\", "\\N"]);
    }

    #[test]
    fn test_even_escape_run_ends_field() {
        let rows = read_all(b"x\\\\\ty\n", &Dialect::PostgreSqlText.format());
        assert_eq!(rows[0], vec!["x\\", "y"]);
    }

    #[test]
    fn test_informix_escape_inside_quotes() {
        let rows = read_all(b"\"a\\\"b\"|\"c\\\\d\"|e\n", &Dialect::InformixUnload.format());
        assert_eq!(rows[0], vec!["a\"b", "c\\d", "e"]);
    }

    #[test]
    fn test_bom_is_skipped() {
        let rows = read_all(b"\xEF\xBB\xBFname,v\nx,1\n", &Format::default());
        assert_eq!(rows[0][0], "name");
    }

    #[test]
    fn test_latin1_fields_are_transcoded() {
        // "café" in windows-1252
        let rows = read_all(b"name\ncaf\xE9\ncaf\xE9\n", &Format::default());
        assert_eq!(rows[1][0], "café");
    }

    #[test]
    fn test_long_field_spans_chunks() {
        let long = "x".repeat(FIELD_CHUNK * 3 + 17);
        let data = format!("\"{long}\",1\n");
        let rows = read_all(data.as_bytes(), &Format::default());
        assert_eq!(rows[0][0].len(), long.len());
        assert_eq!(rows[0][1], "1");
    }

    #[test]
    fn test_utf16_rejected() {
        let data: &[u8] = &[0xFF, 0xFE, b'a', 0x00];
        let result = RecordSource::new(Box::new(Cursor::new(data.to_vec())), &Format::default());
        assert!(matches!(result, Err(ConvertError::InvalidConfig(_))));
    }

    #[test]
    fn test_printer_quote_modes() {
        let mut format = Format {
            quote_mode: QuoteMode::All,
            ..Format::default()
        };
        let fields = [("a", FieldKind::Text), ("1", FieldKind::Number), ("", FieldKind::Missing)];
        assert_eq!(print_record(&format, &fields), b"\"a\",\"1\",\"\"\r\n");

        format.quote_mode = QuoteMode::AllNonNull;
        assert_eq!(print_record(&format, &fields), b"\"a\",\"1\",\r\n");

        format.quote_mode = QuoteMode::NonNumeric;
        assert_eq!(print_record(&format, &fields), b"\"a\",1,\r\n");

        format.quote_mode = QuoteMode::Minimal;
        assert_eq!(print_record(&format, &fields), b"a,1,\r\n");
    }

    #[test]
    fn test_printer_minimal_quotes_specials() {
        let format = Format::default();
        let out = print_record(&format, &[("a,b", FieldKind::Text), ("say \"hi\"", FieldKind::Text)]);
        assert_eq!(out, b"\"a,b\",\"say \"\"hi\"\"\"\r\n");
    }

    #[test]
    fn test_printer_sole_empty_field_is_quoted() {
        let out = print_record(&Dialect::InformixUnloadCsv.format(), &[("", FieldKind::Missing)]);
        assert_eq!(out, b"\"\"\n");
    }

    #[test]
    fn test_printer_escapes_unquoted() {
        let out = print_record(
            &Dialect::MySql.format(),
            &[
                ("a\tb", FieldKind::Text),
                ("line\nbreak", FieldKind::Text),
                ("c:\\dir", FieldKind::Text),
                ("\\N", FieldKind::Missing),
            ],
        );
        assert_eq!(out, b"a\\\tb\tline\\nbreak\tc:\\\\dir\t\\N\n");
    }

    #[test]
    fn test_printer_uses_escape_inside_quotes() {
        let out = print_record(
            &Dialect::InformixUnload.format(),
            &[("a\\b", FieldKind::Text), ("q\"t", FieldKind::Text), ("x|y", FieldKind::Text)],
        );
        assert_eq!(out, b"\"a\\\\b\"|\"q\\\"t\"|\"x|y\"\n");
    }

    #[test]
    fn test_printer_quotes_padding_when_trimming() {
        let out = print_record(&Dialect::Tdf.format(), &[(" padded", FieldKind::Text), ("x", FieldKind::Text)]);
        assert_eq!(out, b"\" padded\"\tx\r\n");

        let out = print_record(&Dialect::Default.format(), &[(" padded", FieldKind::Text)]);
        assert_eq!(out, b" padded\r\n");
    }

    #[test]
    fn test_printed_fields_read_back() {
        let hostile = ["a,b", "tab\there", "pipe|bar", "q\"t", "back\\slash", "two\nlines", " pad ", "cr\rlf"];
        for dialect in Dialect::ALL {
            let format = dialect.format();
            let fields: Vec<(&str, FieldKind)> =
                hostile.iter().map(|f| (*f, FieldKind::Text)).collect();
            let out = print_record(&format, &fields);
            let rows = read_all(&out, &format);
            assert_eq!(rows, vec![hostile.to_vec()], "dialect {dialect}");
        }
    }
}
