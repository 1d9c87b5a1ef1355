//! csv-tabular: typed CSV reading and writing across database dialects
//!
//! Reads delimited text into a typed, column-oriented data set and writes it
//! back out, in any of the common CSV dialects (Excel, RFC-4180, MySQL,
//! PostgreSQL, Oracle, Informix, tab-delimited).
//!
//! # Quick Start
//!
//! ```no_run
//! use csv_tabular::{CsvReader, SampleSize};
//!
//! let mut reader = CsvReader::new();
//! reader.sample_size(SampleSize::Records(100));
//!
//! let data = reader.read_path("data.csv").unwrap();
//!
//! for column in data.schema().columns() {
//!     println!("{}: {}", column.name(), column.column_type());
//! }
//! ```
//!
//! # Converting between dialects
//!
//! ```no_run
//! use csv_tabular::{CsvReader, CsvWriter, Dialect, QuoteMode};
//!
//! let mut reader = CsvReader::new();
//! reader
//!     .dialect(Dialect::MySql)
//!     .nominal_range("last".parse().unwrap());
//! let data = reader.read_path("dump.txt").unwrap();
//!
//! let mut writer = CsvWriter::from_path("out.csv").unwrap();
//! writer.dialect(Dialect::Rfc4180).quote_mode(QuoteMode::NonNumeric);
//! writer.write_batch(&data).unwrap();
//! ```
//!
//! # Schema inference
//!
//! Column names come from the header record, a custom header, or generated
//! `att-<n>` placeholders, and are made unique. Types are declared through
//! column ranges (nominal, string, date) or explicit label lists; all other
//! columns start numeric and fall back to text when a sampled cell does not
//! parse as a number.

pub mod codec;
mod column_type;
mod dialect;
mod encoding;
mod error;
pub mod infer;
mod reader;
mod sample;
mod schema;
mod tokenizer;
mod writer;

pub use column_type::ColumnType;
pub use dialect::{Dialect, Format, FormatOverrides, Quote, QuoteMode, Terminator};
pub use error::{ConvertError, Result};
pub use infer::InferenceOptions;
pub use infer::ranges::{ColumnRange, ColumnSelector, LabelSpec};
pub use reader::{CsvReader, Retrieval};
pub use sample::SampleSize;
pub use schema::{Column, ColumnKind, Dataset, MissingValue, Row, Schema, Value};
pub use tokenizer::RawRecord;
pub use writer::{CsvWriter, WriteState};

// Re-export for advanced usage
pub use codec::{RecordDecoder, RecordEncoder, TextPool};
pub use encoding::{EncodingInfo, detect_encoding, is_utf8};
