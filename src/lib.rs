pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod header;
pub mod io_utils;
pub mod reader;
pub mod record;
pub mod replay;
pub mod rewrite;
pub mod schema;
pub mod sink;
pub mod table;
pub mod value;

use std::{
    env,
    fs::File,
    io::{self, BufRead, BufWriter, Write},
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, SchemaCommands},
    config::{ConvertSettings, ReplaySettings, RewriteSettings},
    io_utils::QuotePolicy,
    replay::ReplayCursor,
    schema::Schema,
    sink::{JsonLinesSink, RecordSink},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_records", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Rewrite(args) => handle_rewrite(&args),
        Commands::Schema(args) => match args.command {
            SchemaCommands::Infer(args) => handle_schema_infer(&args),
            SchemaCommands::Columns(args) => handle_schema_columns(&args),
        },
        Commands::Convert(args) => handle_convert(&args),
        Commands::Replay(args) => handle_replay(&args),
    }
}

fn handle_rewrite(args: &cli::RewriteArgs) -> Result<()> {
    let quote_policy = QuotePolicy::from_flags(args.quote_all, args.quote_none)?;
    let mut outcomes = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        let mut dialect = args.dialect.resolve(input)?;
        dialect.quote_policy = quote_policy;
        info!(
            "Rewriting '{}' with delimiter '{}'",
            input.display(),
            printable_delimiter(dialect.delimiter)
        );
        let settings = RewriteSettings {
            output_directory: args.output_dir.clone(),
            extension: args.extension.clone(),
            dialect,
        };
        let outcome = rewrite::rewrite_file(input, &settings)
            .with_context(|| format!("Rewriting {input:?}"))?;
        outcomes.push(outcome);
    }
    sink::write_json_line(&mut io::stdout().lock(), &outcomes)
        .context("Publishing rewritten file paths")?;
    Ok(())
}

fn handle_schema_infer(args: &cli::SchemaInferArgs) -> Result<()> {
    let dialect = args.dialect.resolve(&args.input)?.with_headers(true);
    let mut headers = reader::read_header(&args.input, &dialect)
        .with_context(|| format!("Reading header from {:?}", args.input))?;
    if args.normalize_header {
        headers = header::normalize_header(&headers);
    }

    let existing = match &args.existing {
        Some(path) => Some(
            Schema::load(path).with_context(|| format!("Loading schema from {path:?}"))?,
        ),
        None => None,
    };
    let (schema, report) = Schema::infer_or_merge(existing.as_ref(), &headers)
        .with_context(|| format!("Deriving schema from header of {:?}", args.input))?;
    if existing.is_some() {
        info!(
            "Schema merge kept {} field(s), added {:?}, dropped {:?}",
            report.kept.len(),
            report.added,
            report.dropped
        );
    }

    schema
        .save(&args.output)
        .with_context(|| format!("Writing schema to {:?}", args.output))?;
    info!(
        "Schema with {} field(s) written to {:?}",
        schema.len(),
        args.output
    );
    Ok(())
}

fn handle_schema_columns(args: &cli::SchemaColumnsArgs) -> Result<()> {
    let schema = Schema::load(&args.schema)
        .with_context(|| format!("Loading schema from {:?}", args.schema))?;
    let attributes = schema.output_attributes(args.provenance_field.as_deref());
    print!("{}", table::render_attributes(&attributes));
    Ok(())
}

fn handle_convert(args: &cli::ConvertArgs) -> Result<()> {
    let schema = Schema::load(&args.schema)
        .with_context(|| format!("Loading schema from {:?}", args.schema))?;
    let settings = ConvertSettings {
        inputs: args.inputs.clone(),
        schema,
        provenance_field: args.provenance_field.clone(),
        dialect: args.dialect.resolve(Path::new("-"))?,
        delimiter: args.dialect.delimiter,
    };
    for input in &settings.inputs {
        debug!(
            "Converting '{}' with delimiter '{}'",
            input.display(),
            printable_delimiter(settings.dialect_for(input).delimiter)
        );
    }

    let mut sink = JsonLinesSink::new(open_output(args.output.as_deref())?);
    let summary = convert::convert_files(&settings, &mut sink).context("Converting CSV files")?;
    info!(
        "Converted {} record(s) from {} file(s)",
        summary.records, summary.files
    );
    Ok(())
}

fn handle_replay(args: &cli::ReplayArgs) -> Result<()> {
    let schema = match &args.schema {
        Some(path) => {
            Schema::load(path).with_context(|| format!("Loading schema from {path:?}"))?
        }
        None => Schema::default(),
    };
    let dialect = match &args.input {
        Some(path) => args.dialect.resolve(path)?,
        None => args.dialect.resolve(Path::new("-"))?,
    };
    let reads_stdin = args.input.as_deref().is_some_and(io_utils::is_dash);
    if reads_stdin && args.triggers.is_none() {
        bail!("Replaying from stdin requires --triggers");
    }

    let settings = ReplaySettings {
        input: args.input.clone(),
        schema,
        dialect,
    };
    let mut cursor = ReplayCursor::load(&settings).context("Preloading replay file")?;
    let mut sink = JsonLinesSink::new(open_output(args.output.as_deref())?);

    match args.triggers {
        Some(count) => {
            for _ in 0..count {
                fire(&mut cursor, &mut sink)?;
            }
        }
        None => {
            for line in io::stdin().lock().lines() {
                line.context("Reading trigger from stdin")?;
                fire(&mut cursor, &mut sink)?;
            }
        }
    }
    info!(
        "Replay emitted {} record(s); {} remaining",
        sink.batches_written(),
        cursor.remaining()
    );
    Ok(())
}

fn fire(cursor: &mut ReplayCursor, sink: &mut dyn RecordSink) -> Result<()> {
    if !cursor.trigger(sink).context("Publishing replayed record")? {
        debug!("Replay cursor is past the last record");
    }
    Ok(())
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) if !io_utils::is_dash(path) => {
            let file =
                File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(io::stdout())),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
