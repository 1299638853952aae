//! Timber CLI: search, extract and browse the logging archive.
//!
//! Commands:
//! - `search`: list variable names matching a `%`/`_` pattern
//! - `get`: fetch variables independently, each on its own timestamps
//! - `aligned`: fetch variables aligned to the first (master) variable
//! - `tree`: walk the variable hierarchy by cleaned node names

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use timber_core::{
    clean_name, parse_instant, ArchiveClient, HttpArchive, MemoryArchive, TimeWindow,
    VariableSpec,
};
use timber_runner::export::format_instant;
use timber_runner::{
    export_json, export_long_csv, export_wide_csv, init_logging, AcquisitionRequest,
    AcquisitionResult, Acquirer, LogFormat, TimberConfig, VariableEntry,
};

#[derive(Parser)]
#[command(
    name = "timber",
    about = "Timber CLI: extract and align data from the logging archive"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to <config dir>/timber/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serve requests from a JSON archive snapshot instead of the gateway.
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    /// Only log warnings and errors.
    #[arg(long, short, global = true, default_value_t = false)]
    quiet: bool,

    /// Log format: pretty, compact or json. Overrides the config file.
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List variable names matching a pattern (`%` any run, `_` one character).
    Search {
        pattern: String,
    },
    /// Fetch variables over a window, each on its own timestamps.
    Get(FetchArgs),
    /// Fetch variables aligned to the timestamps of the first one.
    Aligned(FetchArgs),
    /// List hierarchy children and attached variables under a path.
    Tree {
        /// Cleaned node names from the top, e.g. `LHC Beam_Instrumentation`.
        path: Vec<String>,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Variable names. The first one is the master for `aligned`.
    #[arg(required_unless_present = "pattern")]
    names: Vec<String>,

    /// Variable name pattern instead of explicit names.
    #[arg(long, conflicts_with = "names")]
    pattern: Option<String>,

    /// Window start (`YYYY-MM-DD HH:MM:SS[.fff]`, RFC 3339, or epoch seconds).
    #[arg(long)]
    start: String,

    /// Window end. Without it, the last value at or before `--start` is returned.
    #[arg(long)]
    end: Option<String>,

    /// Only keep samples coincident with fundamentals matching this pattern.
    #[arg(long)]
    fundamental: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Write to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = TimberConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if cli.quiet {
        config.logging.filter = "warn".into();
    }
    init_logging(&config.logging);

    let archive = open_archive(cli.fixture.as_deref(), &config)?;
    tracing::debug!(archive = archive.name(), "archive opened");
    let acquirer = Acquirer::new(archive, &config.pools)?;

    match cli.command {
        Commands::Search { pattern } => run_search(&acquirer, &pattern),
        Commands::Get(args) => run_fetch(&acquirer, args, false),
        Commands::Aligned(args) => run_fetch(&acquirer, args, true),
        Commands::Tree { path } => run_tree(&acquirer, &path),
    }
}

fn open_archive(fixture: Option<&Path>, config: &TimberConfig) -> Result<Arc<dyn ArchiveClient>> {
    if let Some(path) = fixture {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture: {}", path.display()))?;
        let archive = MemoryArchive::from_json(&json)
            .with_context(|| format!("invalid archive snapshot: {}", path.display()))?;
        return Ok(Arc::new(archive));
    }
    let archive = HttpArchive::new(config.http_options())?;
    Ok(Arc::new(archive))
}

fn run_search(acquirer: &Acquirer, pattern: &str) -> Result<()> {
    for id in acquirer.search(pattern)? {
        println!("{id}");
    }
    Ok(())
}

fn run_fetch(acquirer: &Acquirer, args: FetchArgs, aligned: bool) -> Result<()> {
    let spec = match args.pattern {
        Some(pattern) => VariableSpec::Pattern(pattern),
        None if args.names.is_empty() => bail!("give variable names or --pattern"),
        None => VariableSpec::Names(args.names),
    };

    let start = parse_instant(&args.start).context("invalid --start")?;
    let window = match args.end.as_deref() {
        Some(end) => TimeWindow::between(start, parse_instant(end).context("invalid --end")?)?,
        None => TimeWindow::at(start),
    };

    let mut request = AcquisitionRequest::new(spec, window);
    if let Some(pattern) = args.fundamental {
        request = request.with_fundamental(pattern);
    }

    let result = if aligned {
        acquirer.acquire(&request)?
    } else {
        acquirer.get(&request)?
    };
    for (id, failure) in result.failures() {
        eprintln!("Failed {id} ({:?}): {}", failure.stage, failure.reason);
    }

    let rendered = match args.format {
        OutputFormat::Table => render_table(&result),
        OutputFormat::Json => export_json(&result)?,
        OutputFormat::Csv if aligned => export_wide_csv(&result)?,
        OutputFormat::Csv => export_long_csv(&result)?,
    };
    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Saved to: {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn render_table(result: &AcquisitionResult) -> String {
    if result.is_empty() {
        return "No data.\n".into();
    }

    let mut out = String::new();
    if let Some(master) = &result.master {
        let span = match (result.timestamps.first(), result.timestamps.last()) {
            (Some(first), Some(last)) => format!("{} .. {}", format_instant(first), format_instant(last)),
            _ => String::from("-"),
        };
        out.push_str(&format!(
            "Master: {master} ({} samples, {span})\n\n",
            result.timestamps.len()
        ));
    }

    let width = result.variables().map(|id| id.as_str().len()).max().unwrap_or(8).max(8);
    out.push_str(&format!("{:<width$}  {:<9}  {:>8}  {:<14}  {}\n", "Variable", "Status", "Samples", "Type", "Detail"));
    out.push_str(&format!("{}\n", "-".repeat(width + 48)));
    for (id, entry) in result.entries() {
        let status = format!("{:?}", entry.status()).to_lowercase();
        let (samples, kind, detail) = match entry {
            VariableEntry::Decoded(series) => {
                let last = series
                    .points()
                    .last()
                    .map(|(ts, value)| format!("last {} = {}", format_instant(ts), value.to_json()))
                    .unwrap_or_default();
                (series.len().to_string(), series.kind.to_string(), last)
            }
            VariableEntry::Failed(f) => ("-".into(), "-".into(), f.reason.clone()),
        };
        out.push_str(&format!("{:<width$}  {status:<9}  {samples:>8}  {kind:<14}  {detail}\n", id.as_str()));
    }
    out
}

fn run_tree(acquirer: &Acquirer, path: &[String]) -> Result<()> {
    let listing = acquirer.hierarchy().list(path)?;
    match &listing.node {
        Some(node) if node.description.is_empty() => println!("{}", clean_name(&node.name)),
        Some(node) => println!("{}  ({})", clean_name(&node.name), node.description),
        None => println!("/"),
    }
    for name in listing.children.keys() {
        println!("  {name}/");
    }
    for id in &listing.variables {
        println!("  {id}");
    }
    Ok(())
}
