//! # cityblock CLI Entry Point
//!
//! Indexes a dataset and opens an interactive query shell over it.
//!
//! ## Usage
//!
//! ```bash
//! # Index and query with defaults
//! cityblock datasets/images.csv
//!
//! # Partitions elsewhere, smaller sort chunks, k-way merge
//! cityblock -w /tmp/parts -c 500 --kway datasets/images.csv
//!
//! # Verbose indexing logs
//! RUST_LOG=cityblock=debug cityblock datasets/images.csv
//! ```

use cityblock::cli::Repl;
use cityblock::config::{DEFAULT_CHUNK_CAPACITY, MATCH_SINK_FILE_NAME};
use cityblock::{FileSink, IndexError, MergeStrategy, Session};
use eyre::{bail, Result, WrapErr};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

struct Options {
    dataset: PathBuf,
    workspace: Option<PathBuf>,
    output: Option<PathBuf>,
    chunk_capacity: usize,
    strategy: MergeStrategy,
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let Some(options) = parse_args(&args[1..])? else {
        return Ok(());
    };

    init_tracing();

    let mut builder = Session::builder()
        .chunk_capacity(options.chunk_capacity)
        .merge_strategy(options.strategy);
    if let Some(workspace) = &options.workspace {
        builder = builder.workspace(workspace);
    }

    let session = builder
        .index_file(&options.dataset)
        .wrap_err_with(|| format!("failed to index dataset {:?}", options.dataset))?;

    if session.is_empty() {
        session.close()?;
        return Err(IndexError::EmptyDataset)
            .wrap_err_with(|| format!("nothing to query in {:?}", options.dataset));
    }

    let sink_path = options
        .output
        .unwrap_or_else(|| session.workspace().join(MATCH_SINK_FILE_NAME));

    let mut repl = Repl::new(session, FileSink::new(sink_path))?;
    let outcome = repl.run();
    repl.into_session().close()?;

    outcome
}

/// Returns `None` when the invocation was fully handled (help, version).
fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut dataset: Option<PathBuf> = None;
    let mut workspace = None;
    let mut output = None;
    let mut chunk_capacity = DEFAULT_CHUNK_CAPACITY;
    let mut strategy = MergeStrategy::Pairwise;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "--version" | "-v" => {
                println!("cityblock {}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            "--workspace" | "-w" => {
                workspace = Some(PathBuf::from(option_value(args, &mut i)?));
            }
            "--output" | "-o" => {
                output = Some(PathBuf::from(option_value(args, &mut i)?));
            }
            "--chunk-size" | "-c" => {
                let value = option_value(args, &mut i)?;
                chunk_capacity = value
                    .parse()
                    .wrap_err_with(|| format!("invalid chunk size: {:?}", value))?;
            }
            "--kway" | "-k" => {
                strategy = MergeStrategy::KWay;
            }
            arg if arg.starts_with('-') => {
                bail!("Unknown option: {}", arg);
            }
            path => {
                if dataset.is_some() {
                    bail!("Multiple dataset paths specified");
                }
                dataset = Some(PathBuf::from(path));
            }
        }
        i += 1;
    }

    let Some(dataset) = dataset else {
        print_usage();
        return Ok(None);
    };

    Ok(Some(Options {
        dataset,
        workspace,
        output,
        chunk_capacity,
        strategy,
    }))
}

fn option_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str> {
    let flag = &args[*i];
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(value.as_str()),
        None => bail!("Missing value for {}", flag),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage() {
    println!("cityblock - Range search over integer vectors by city-block distance");
    println!();
    println!("USAGE:");
    println!("    cityblock [OPTIONS] <DATASET>");
    println!();
    println!("ARGS:");
    println!("    <DATASET>                 Comma-separated integer vectors, one per line");
    println!();
    println!("OPTIONS:");
    println!("    -w, --workspace <DIR>     Parent of the partition directory (default: dataset's directory)");
    println!("    -o, --output <FILE>       Match file (default: <DIR>/{})", MATCH_SINK_FILE_NAME);
    println!("    -c, --chunk-size <N>      Records sorted in memory at once (default: {})", DEFAULT_CHUNK_CAPACITY);
    println!("    -k, --kway                Merge sorted chunks with a bounded k-way merge");
    println!("    -h, --help                Print help information");
    println!("    -v, --version             Print version information");
    println!();
    println!("EXAMPLES:");
    println!("    cityblock datasets/images.csv");
    println!("    cityblock -c 500 --kway datasets/images.csv");
}
