//! csv-tabular CLI - typed CSV inspection and dialect conversion

use clap::{Args, Parser, Subcommand};
use csv_tabular::{ColumnRange, CsvReader, CsvWriter, Dialect, LabelSpec, QuoteMode, SampleSize};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

/// Typed CSV reader and writer for common database dialects.
///
/// Infers column names and types (numeric, categorical, text, date) and
/// converts files between dialects.
#[derive(Parser, Debug)]
#[command(name = "csv-tabular")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the inferred structure of a file
    Inspect {
        /// Input file
        file: PathBuf,

        #[command(flatten)]
        read: ReadArgs,

        /// Also print the decoded rows
        #[arg(long)]
        rows: bool,
    },
    /// Rewrite a file in another dialect
    Convert {
        /// Input file
        input: PathBuf,

        /// Output file
        output: PathBuf,

        #[command(flatten)]
        read: ReadArgs,

        /// Output dialect (default: the input dialect)
        #[arg(short = 'T', long)]
        to_dialect: Option<Dialect>,

        /// Output quoting policy: all, all-non-null, minimal, non-numeric, none
        #[arg(long)]
        quote_mode: Option<QuoteMode>,

        /// Do not write a header row
        #[arg(long)]
        no_output_header: bool,
    },
}

#[derive(Args, Debug)]
struct ReadArgs {
    /// Input dialect: default, excel, informix, informixcsv, mysql, oracle,
    /// postgresqlcsv, postgresqltxt, rfc4180, tdf
    #[arg(short = 'D', long, default_value = "default")]
    dialect: Dialect,

    /// Field separator (single character, overrides the dialect)
    #[arg(short = 'F', long)]
    field_separator: Option<String>,

    /// Quote character (single character, or 'none')
    #[arg(short = 'q', long)]
    quote: Option<String>,

    /// Escape character (single character)
    #[arg(short = 'e', long)]
    escape: Option<String>,

    /// The first record is data, not column names
    #[arg(long)]
    no_header: bool,

    /// Comma-separated names for the leading columns
    #[arg(long)]
    header: Option<String>,

    /// Columns to read as categorical, e.g. "1,3-5,last"
    #[arg(short = 'N', long)]
    nominal: Option<ColumnRange>,

    /// Columns to read as free text
    #[arg(short = 'S', long)]
    string: Option<ColumnRange>,

    /// Columns to read as dates
    #[arg(long)]
    date_range: Option<ColumnRange>,

    /// Explicit labels, "<range-or-names>:<label,...>" (repeatable)
    #[arg(short = 'L', long = "labels")]
    labels: Vec<LabelSpec>,

    /// chrono strftime pattern for date columns
    #[arg(long)]
    date_format: Option<String>,

    /// Missing value token
    #[arg(short = 'M', long, default_value = "")]
    missing: String,

    /// Number of rows used for type inference (default: all)
    #[arg(short = 'n', long)]
    sample_records: Option<usize>,
}

fn main() -> ExitCode {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Inspect { file, read, rows } => inspect(file, read, *rows),
        Command::Convert {
            input,
            output,
            read,
            to_dialect,
            quote_mode,
            no_output_header,
        } => convert(
            input,
            output,
            read,
            to_dialect.unwrap_or(read.dialect),
            *quote_mode,
            *no_output_header,
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn build_reader(args: &ReadArgs) -> CsvReader {
    let mut reader = CsvReader::new();
    reader
        .dialect(args.dialect)
        .no_header(args.no_header)
        .missing_value(&args.missing);

    if let Some(ref sep) = args.field_separator {
        reader.custom_field_separator(sep);
    }
    if let Some(ref quote) = args.quote {
        reader.custom_quote(quote);
    }
    if let Some(ref escape) = args.escape {
        reader.custom_escape(escape);
    }
    if let Some(ref header) = args.header {
        reader.custom_header(header);
    }
    if let Some(ref range) = args.nominal {
        reader.nominal_range(range.clone());
    }
    if let Some(ref range) = args.string {
        reader.string_range(range.clone());
    }
    if let Some(ref range) = args.date_range {
        reader.date_range(range.clone());
    }
    for spec in &args.labels {
        reader.label_spec(spec.clone());
    }
    if let Some(ref format) = args.date_format {
        reader.date_format(format);
    }
    if let Some(n) = args.sample_records {
        reader.sample_size(SampleSize::Records(n));
    }

    reader
}

fn inspect(path: &Path, args: &ReadArgs, show_rows: bool) -> csv_tabular::Result<()> {
    let mut reader = build_reader(args);
    reader.set_source_path(path)?;
    let schema = reader.structure()?.clone();

    println!("File: {}", path.display());
    println!("  Dialect: {}", args.dialect.description());
    println!("  Columns: {}", schema.len());
    for (i, column) in schema.columns().iter().enumerate() {
        println!("    {}: {}", i + 1, column);
    }

    if !show_rows {
        let data = reader.dataset()?;
        println!("  Rows: {}", data.num_rows());
        return Ok(());
    }

    println!();
    let mut writer = CsvWriter::from_writer(io::stdout().lock());
    writer.dialect(args.dialect);
    writer.set_structure(schema)?;
    while let Some(row) = reader.next_row()? {
        writer.write_row(Some(&row))?;
    }
    writer.write_row(None)?;
    Ok(())
}

fn convert(
    input: &Path,
    output: &Path,
    args: &ReadArgs,
    to_dialect: Dialect,
    quote_mode: Option<QuoteMode>,
    no_output_header: bool,
) -> csv_tabular::Result<()> {
    let data = build_reader(args).read_path(input)?;

    let mut writer = CsvWriter::from_path(output)?;
    writer.dialect(to_dialect).no_header(no_output_header);
    if let Some(mode) = quote_mode {
        writer.quote_mode(mode);
    }
    writer.write_batch(&data)?;
    writer.into_inner()?;

    eprintln!(
        "Wrote {} rows ({} columns) to {}",
        data.num_rows(),
        data.num_columns(),
        output.display()
    );
    Ok(())
}
