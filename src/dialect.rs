//! Named CSV dialects and the concrete format they resolve to.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::ConvertError;

/// Default field separator substituted for malformed custom values.
pub const DEFAULT_FIELD_SEPARATOR: u8 = b',';
/// Default quote character substituted for malformed custom values.
pub const DEFAULT_QUOTE: u8 = b'"';
/// Default escape character substituted for malformed custom values.
pub const DEFAULT_ESCAPE: u8 = b'\\';

/// The fixed table of supported dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// RFC-4180-like, blank lines allowed.
    #[default]
    Default,
    Excel,
    InformixUnload,
    /// Informix unload CSV, no escaping.
    InformixUnloadCsv,
    MySql,
    Oracle,
    PostgreSqlCsv,
    PostgreSqlText,
    Rfc4180,
    /// Tab-delimited.
    Tdf,
}

impl Dialect {
    pub const ALL: [Dialect; 10] = [
        Dialect::Default,
        Dialect::Excel,
        Dialect::InformixUnload,
        Dialect::InformixUnloadCsv,
        Dialect::MySql,
        Dialect::Oracle,
        Dialect::PostgreSqlCsv,
        Dialect::PostgreSqlText,
        Dialect::Rfc4180,
        Dialect::Tdf,
    ];

    /// Short tag used on command lines.
    pub const fn tag(&self) -> &'static str {
        match self {
            Dialect::Default => "DEFAULT",
            Dialect::Excel => "EXCEL",
            Dialect::InformixUnload => "INFORMIX",
            Dialect::InformixUnloadCsv => "INFORMIXCSV",
            Dialect::MySql => "MYSQL",
            Dialect::Oracle => "ORACLE",
            Dialect::PostgreSqlCsv => "POSTGRESQLCSV",
            Dialect::PostgreSqlText => "POSTGRESQLTXT",
            Dialect::Rfc4180 => "RFC4180",
            Dialect::Tdf => "TDF",
        }
    }

    /// Human readable name.
    pub const fn description(&self) -> &'static str {
        match self {
            Dialect::Default => "Default",
            Dialect::Excel => "Excel",
            Dialect::InformixUnload => "Informix (unload)",
            Dialect::InformixUnloadCsv => "Informix (unload CSV)",
            Dialect::MySql => "MySQL",
            Dialect::Oracle => "Oracle",
            Dialect::PostgreSqlCsv => "PostgreSQL (CSV)",
            Dialect::PostgreSqlText => "PostgreSQL (Text)",
            Dialect::Rfc4180 => "RFC-4180",
            Dialect::Tdf => "TDF (tab-delimited)",
        }
    }

    /// The delimiter/quote/escape defaults of this dialect.
    pub const fn format(&self) -> Format {
        match self {
            Dialect::Default | Dialect::Excel | Dialect::Rfc4180 => Format {
                delimiter: b',',
                quote: Quote::Some(b'"'),
                escape: None,
                null_string: None,
                quote_mode: QuoteMode::Minimal,
                terminator: Terminator::Crlf,
                trim: false,
            },
            Dialect::InformixUnload => Format {
                delimiter: b'|',
                quote: Quote::Some(b'"'),
                escape: Some(b'\\'),
                null_string: None,
                quote_mode: QuoteMode::Minimal,
                terminator: Terminator::Lf,
                trim: false,
            },
            Dialect::InformixUnloadCsv => Format {
                delimiter: b',',
                quote: Quote::Some(b'"'),
                escape: None,
                null_string: None,
                quote_mode: QuoteMode::Minimal,
                terminator: Terminator::Lf,
                trim: false,
            },
            Dialect::MySql | Dialect::PostgreSqlText => Format {
                delimiter: b'\t',
                quote: Quote::None,
                escape: Some(b'\\'),
                null_string: Some("\\N"),
                quote_mode: QuoteMode::AllNonNull,
                terminator: Terminator::Lf,
                trim: false,
            },
            Dialect::Oracle => Format {
                delimiter: b',',
                quote: Quote::Some(b'"'),
                escape: Some(b'\\'),
                null_string: Some("\\N"),
                quote_mode: QuoteMode::Minimal,
                terminator: Terminator::Lf,
                trim: true,
            },
            Dialect::PostgreSqlCsv => Format {
                delimiter: b',',
                quote: Quote::Some(b'"'),
                escape: None,
                null_string: None,
                quote_mode: QuoteMode::AllNonNull,
                terminator: Terminator::Lf,
                trim: false,
            },
            Dialect::Tdf => Format {
                delimiter: b'\t',
                quote: Quote::Some(b'"'),
                escape: None,
                null_string: None,
                quote_mode: QuoteMode::Minimal,
                terminator: Terminator::Crlf,
                trim: true,
            },
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Dialect {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::ALL
            .into_iter()
            .find(|d| d.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConvertError::InvalidConfig(format!("unknown dialect: {s}")))
    }
}

/// Quote character configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quote {
    /// No quoting.
    None,
    /// Quote with the specified character.
    Some(u8),
}

impl Default for Quote {
    fn default() -> Self {
        Quote::Some(DEFAULT_QUOTE)
    }
}

impl Quote {
    /// Returns the quote character if set.
    pub fn char(&self) -> Option<u8> {
        match self {
            Quote::None => None,
            Quote::Some(c) => Some(*c),
        }
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quote::None => write!(f, "none"),
            Quote::Some(c) => write!(f, "{}", *c as char),
        }
    }
}

/// Write-side quoting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuoteMode {
    /// Quote every field.
    All,
    /// Quote every field that holds a value.
    AllNonNull,
    /// Quote only when a field contains special characters.
    #[default]
    Minimal,
    /// Quote every field outside numeric and date columns.
    NonNumeric,
    /// Escape special characters instead of quoting. Without an escape
    /// character, fields that cannot be written bare are still quoted.
    None,
}

impl QuoteMode {
    pub const ALL: [QuoteMode; 5] = [
        QuoteMode::All,
        QuoteMode::AllNonNull,
        QuoteMode::Minimal,
        QuoteMode::NonNumeric,
        QuoteMode::None,
    ];

    pub const fn tag(&self) -> &'static str {
        match self {
            QuoteMode::All => "ALL",
            QuoteMode::AllNonNull => "ALL_NON_NULL",
            QuoteMode::Minimal => "MINIMAL",
            QuoteMode::NonNumeric => "NON_NUMERIC",
            QuoteMode::None => "NONE",
        }
    }
}

impl fmt::Display for QuoteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for QuoteMode {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        QuoteMode::ALL
            .into_iter()
            .find(|m| m.tag().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ConvertError::InvalidConfig(format!("unknown quote mode: {s}")))
    }
}

/// Record terminator written after each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminator {
    /// `\r\n`
    Crlf,
    /// `\n`
    Lf,
}

impl Terminator {
    pub fn csv_terminator(&self) -> csv::Terminator {
        match self {
            Terminator::Crlf => csv::Terminator::CRLF,
            Terminator::Lf => csv::Terminator::Any(b'\n'),
        }
    }
}

/// Concrete tokenizer/printer settings resolved from a dialect and overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Field delimiter character.
    pub delimiter: u8,
    /// Quote character configuration.
    pub quote: Quote,
    /// Escape character; `None` means quotes are escaped by doubling.
    pub escape: Option<u8>,
    /// Token the dialect uses for null fields, treated as missing on read.
    pub null_string: Option<&'static str>,
    /// Quoting policy when writing.
    pub quote_mode: QuoteMode,
    /// Record terminator when writing.
    pub terminator: Terminator,
    /// Whether surrounding whitespace is trimmed from fields on read.
    pub trim: bool,
}

impl Default for Format {
    fn default() -> Self {
        Dialect::Default.format()
    }
}

impl From<Dialect> for Format {
    fn from(dialect: Dialect) -> Self {
        dialect.format()
    }
}

/// Custom single-character overrides layered on top of a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatOverrides {
    pub delimiter: Option<u8>,
    pub quote: Option<Quote>,
    pub escape: Option<u8>,
    pub quote_mode: Option<QuoteMode>,
}

impl FormatOverrides {
    /// Resolve `dialect` with these overrides applied.
    pub fn apply(&self, dialect: Dialect) -> Format {
        let mut format = dialect.format();
        if let Some(delimiter) = self.delimiter {
            format.delimiter = delimiter;
        }
        if let Some(quote) = self.quote {
            format.quote = quote;
        }
        if let Some(escape) = self.escape {
            format.escape = Some(escape);
        }
        if let Some(quote_mode) = self.quote_mode {
            format.quote_mode = quote_mode;
        }
        format
    }

    /// Set the delimiter from a user supplied string.
    pub fn set_delimiter(&mut self, value: &str) {
        self.delimiter = Some(single_char_option(
            "field separator",
            value,
            DEFAULT_FIELD_SEPARATOR,
        ));
    }

    /// Set the quote from a user supplied string; `none` disables quoting.
    pub fn set_quote(&mut self, value: &str) {
        self.quote = if value.eq_ignore_ascii_case("none") {
            Some(Quote::None)
        } else {
            Some(Quote::Some(single_char_option(
                "quote character",
                value,
                DEFAULT_QUOTE,
            )))
        };
    }

    /// Set the escape from a user supplied string.
    pub fn set_escape(&mut self, value: &str) {
        self.escape = Some(single_char_option(
            "escape character",
            value,
            DEFAULT_ESCAPE,
        ));
    }
}

/// Interpret `value` as a single ASCII character, falling back to `default`.
pub fn single_char_option(option: &str, value: &str, default: u8) -> u8 {
    match value.as_bytes() {
        [b] if b.is_ascii() => *b,
        _ if value == "\\t" => b'\t',
        _ => {
            warn!(
                "{} must be a single ASCII character, got {:?}; using {:?}",
                option, value, default as char
            );
            default
        }
    }
}
