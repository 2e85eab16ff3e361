//! Purpose: `scanspeed` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, prints reports.
//! Invariants: Human-readable output is the default; `--json` switches the
//! stdout payload to stable JSON.
//! Invariants: Errors go to stderr; the exit code derives from `to_exit_code`.
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod report;

use scanspeed::core::engine::{self, EngineOptions, ScanSpec};
use scanspeed::core::error::{Error, ErrorKind, to_exit_code};
use scanspeed::store::field::{ColumnData, FieldType};
use scanspeed::store::source::SourceHandle;
use scanspeed::store::writer::{CollectionOptions, DEFAULT_ROWS_PER_CLUSTER, SourceWriter};

const GEN_BATCH_ROWS: u64 = 64 * 1024;

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(exit_code) => exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(exit_code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Validation).with_message(err.to_string()));
            }
        },
    };

    let result = match cli.command {
        Command::Run {
            collections,
            sources,
            columns,
            columns_regex,
            all_columns,
            threads,
            tasks_per_worker,
            json,
        } => run_throughput(
            collections,
            sources,
            columns,
            columns_regex,
            all_columns,
            threads,
            tasks_per_worker,
            json,
        ),
        Command::Gen {
            path,
            collection,
            columns,
            rows,
            rows_per_cluster,
            json,
        } => run_gen(path, collection, columns, rows, rows_per_cluster, json),
        Command::Info { path, json } => run_info(path, json),
        Command::Completion { shell } => {
            clap_complete::aot::generate(
                shell,
                &mut Cli::command(),
                "scanspeed",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    result
        .map(|()| 0)
        .map_err(add_source_hint)
        .map_err(add_lookup_hint)
}

#[derive(Parser)]
#[command(
    name = "scanspeed",
    version,
    about = "Measure sustained read throughput of columnar source files",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Reads every selected column of one or more source files, sequentially or
across a worker pool, and reports decoded/raw byte throughput.

Mental model:
  - `gen` writes a synthetic dataset (write)
  - `run` reads it back and measures throughput (read)
  - `info` shows what a source contains
"#,
    after_help = r#"EXAMPLES
  $ scanspeed gen events.scol --columns x:i32 energy:f64 --rows 10000000
  $ scanspeed info events.scol
  $ scanspeed run --collections events --sources events.scol --columns x
  $ scanspeed run --collections events --sources a.scol b.scol --all-columns --threads 8 --json

LEARN MORE
  $ scanspeed <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Read sources and report throughput",
        long_about = r#"Read every row of the selected columns from each source and report
timings, byte totals, and MiB/s figures.

With `--threads 0` (the default) sources are read whole, one after another,
on the calling thread. With `--threads N` each source is split at its
natural cluster boundaries, clusters are merged down to a bounded number of
tasks per source, and tasks run on an N-worker pool."#,
        after_help = r#"EXAMPLES
  $ scanspeed run --collections events --sources events.scol --columns x y
  $ scanspeed run --collections events --sources a.scol b.scol --columns-regex '(x|y)_.*' --threads 4
  $ scanspeed run --collections ev2023 ev2024 --sources y23.scol y24.scol --all-columns --json

NOTES
  - One collection name is shared by all sources; N names map positionally.
  - `--columns-regex` patterns are anchored; every pattern must match.
  - `--tasks-per-worker` tunes scheduling granularity, not what is read."#
    )]
    Run {
        #[arg(
            long = "collections",
            value_name = "NAME",
            num_args = 1..,
            required = true,
            help = "Collection name shared by all sources, or one name per source"
        )]
        collections: Vec<String>,
        #[arg(
            long = "sources",
            value_name = "PATH",
            num_args = 1..,
            required = true,
            value_hint = ValueHint::FilePath,
            help = "Source files to read"
        )]
        sources: Vec<PathBuf>,
        #[arg(
            long = "columns",
            value_name = "NAME",
            num_args = 1..,
            help = "Exact column names to read"
        )]
        columns: Vec<String>,
        #[arg(
            long = "columns-regex",
            value_name = "PATTERN",
            num_args = 1..,
            conflicts_with = "columns",
            help = "Anchored regex patterns selecting columns"
        )]
        columns_regex: Vec<String>,
        #[arg(
            long = "all-columns",
            conflicts_with_all = ["columns", "columns_regex"],
            help = "Read every column of each collection"
        )]
        all_columns: bool,
        #[arg(
            long,
            default_value_t = 0,
            help = "Worker pool size (0 = sequential, no pool)"
        )]
        threads: usize,
        #[arg(
            long = "tasks-per-worker",
            default_value_t = engine::DEFAULT_TASKS_PER_WORKER,
            help = "Scheduling hint: aim for this many read tasks per worker"
        )]
        tasks_per_worker: u32,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Generate a synthetic source file",
        long_about = r#"Write a source file with one collection of deterministic values, for
trying the tool and producing benchmark inputs."#,
        after_help = r#"EXAMPLES
  $ scanspeed gen events.scol --columns x:i32
  $ scanspeed gen events.scol --collection ev --columns x:i32 energy:f64 --rows 10000000
  $ scanspeed gen small.scol --columns x:i32 --rows 1000 --rows-per-cluster 100

NOTES
  - Column types: i32, i64, f32, f64.
  - `--rows-per-cluster` sets the flush granularity that later becomes the
    natural split points for parallel reads."#
    )]
    Gen {
        #[arg(help = "Output path for the generated source", value_hint = ValueHint::FilePath)]
        path: PathBuf,
        #[arg(long, default_value = "events", help = "Collection name")]
        collection: String,
        #[arg(
            long = "columns",
            value_name = "NAME:TYPE",
            num_args = 1..,
            required = true,
            help = "Column schema entries, e.g. x:i32 energy:f64"
        )]
        columns: Vec<String>,
        #[arg(long, default_value_t = 1_000_000, help = "Rows to generate")]
        rows: u64,
        #[arg(
            long = "rows-per-cluster",
            default_value_t = DEFAULT_ROWS_PER_CLUSTER,
            help = "Rows per flushed cluster"
        )]
        rows_per_cluster: u64,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Show a source's collections, rows, clusters, and columns",
        after_help = r#"EXAMPLES
  $ scanspeed info events.scol
  $ scanspeed info events.scol --json"#
    )]
    Info {
        #[arg(help = "Source path", value_hint = ValueHint::FilePath)]
        path: PathBuf,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ scanspeed completion bash > ~/.local/share/bash-completion/completions/scanspeed
  $ scanspeed completion zsh > ~/.zfunc/_scanspeed"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[allow(clippy::too_many_arguments)]
fn run_throughput(
    collections: Vec<String>,
    sources: Vec<PathBuf>,
    columns: Vec<String>,
    columns_regex: Vec<String>,
    all_columns: bool,
    threads: usize,
    tasks_per_worker: u32,
    json: bool,
) -> Result<(), Error> {
    let (columns, use_patterns) = if all_columns {
        (vec![".*".to_string()], true)
    } else if !columns_regex.is_empty() {
        (columns_regex, true)
    } else {
        (columns, false)
    };

    let spec = ScanSpec {
        collections,
        sources,
        columns,
        use_patterns,
    };
    let options = EngineOptions {
        threads,
        tasks_per_worker,
    };
    let result = engine::eval_throughput(&spec, &options)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report::json_report(&result, env!("CARGO_PKG_VERSION")))
                .unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        print!("{}", report::human_report(&result));
    }
    Ok(())
}

fn run_gen(
    path: PathBuf,
    collection: String,
    columns: Vec<String>,
    rows: u64,
    rows_per_cluster: u64,
    json: bool,
) -> Result<(), Error> {
    let schema = parse_schema(&columns)?;

    let mut writer = SourceWriter::create(&path)?;
    let mut target = writer.collection(
        &collection,
        &schema,
        CollectionOptions::new(rows_per_cluster),
    )?;
    let mut written = 0u64;
    while written < rows {
        let batch_rows = GEN_BATCH_ROWS.min(rows - written);
        let batch: Vec<ColumnData> = schema
            .iter()
            .map(|(_, field)| synthesize(*field, written, batch_rows))
            .collect();
        target.append(&batch)?;
        written += batch_rows;
    }
    target.finish()?;
    writer.finish()?;

    let clusters = rows.div_ceil(rows_per_cluster.max(1));
    if json {
        let value = json!({
            "path": path.display().to_string(),
            "collection": collection,
            "rows": rows,
            "clusters": clusters,
            "columns": schema
                .iter()
                .map(|(name, field)| json!({"name": name, "type": field.to_string()}))
                .collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        println!(
            "wrote {rows} rows ({clusters} clusters, {} columns) to {}",
            schema.len(),
            path.display()
        );
    }
    Ok(())
}

fn run_info(path: PathBuf, json: bool) -> Result<(), Error> {
    let handle = SourceHandle::open(&path)?;

    if json {
        let collections: Vec<_> = handle
            .collections()
            .iter()
            .map(|meta| {
                json!({
                    "name": meta.name,
                    "rows": meta.total_rows,
                    "clusters": meta.clusters.len(),
                    "columns": meta
                        .columns
                        .iter()
                        .map(|column| json!({"name": column.name, "type": column.field.to_string()}))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        let value = json!({
            "path": path.display().to_string(),
            "collections": collections,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
        );
        return Ok(());
    }

    println!("{}", path.display());
    for meta in handle.collections() {
        println!(
            "  collection {}: {} rows, {} clusters",
            meta.name,
            meta.total_rows,
            meta.clusters.len()
        );
        for column in &meta.columns {
            println!("    {}: {}", column.name, column.field);
        }
    }
    Ok(())
}

fn parse_schema(entries: &[String]) -> Result<Vec<(String, FieldType)>, Error> {
    let mut schema = Vec::with_capacity(entries.len());
    for entry in entries {
        let (name, type_name) = entry.split_once(':').ok_or_else(|| {
            Error::new(ErrorKind::Validation)
                .with_message(format!("invalid column entry '{entry}' (use NAME:TYPE)"))
        })?;
        if name.is_empty() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message(format!("invalid column entry '{entry}' (empty name)")));
        }
        schema.push((name.to_string(), FieldType::parse(type_name)?));
    }
    Ok(schema)
}

fn synthesize(field: FieldType, start_row: u64, rows: u64) -> ColumnData {
    let range = start_row..start_row + rows;
    match field {
        FieldType::I32 => ColumnData::I32(range.map(|row| row as i32).collect()),
        FieldType::I64 => ColumnData::I64(range.map(|row| row as i64).collect()),
        FieldType::F32 => ColumnData::F32(range.map(|row| row as f32).collect()),
        FieldType::F64 => ColumnData::F64(range.map(|row| row as f64).collect()),
    }
}

fn add_source_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::SourceOpen || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Check the source path, or create a dataset first: scanspeed gen <path> --columns x:i32",
    )
}

fn add_lookup_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    let path = err.path().map(|path| path.display().to_string());
    match err.kind() {
        ErrorKind::CollectionNotFound | ErrorKind::ColumnNotFound | ErrorKind::NoMatch => {
            match path {
                Some(path) => {
                    err.with_hint(format!("List what the source contains: scanspeed info {path}"))
                }
                None => err,
            }
        }
        _ => err,
    }
}

fn emit_error(err: &Error) {
    eprintln!("error: {err}");
    if let Some(hint) = err.hint() {
        eprintln!("hint: {hint}");
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
