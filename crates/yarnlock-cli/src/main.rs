mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "yarnlock")]
#[command(about = "Inspect, deduplicate and diff yarn lockfiles", long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Command,

  /// Log what the engine does (RUST_LOG takes precedence)
  #[arg(short, long, global = true)]
  verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print every package, its ranges and their versions as JSON
  Dump {
    /// Path to a lockfile to parse
    #[arg(value_name = "LOCKFILE", default_value = "yarn.lock")]
    lockfile: PathBuf,
  },

  /// Find ranges that can share a version, and optionally apply the changes
  Dedupe {
    #[arg(value_name = "LOCKFILE", default_value = "yarn.lock")]
    lockfile: PathBuf,

    /// A workspace package.json, for packages locked as `0.0.0-use.local`
    /// (can be specified multiple times)
    #[arg(short, long = "local", value_name = "PACKAGE_JSON")]
    local: Vec<PathBuf>,

    /// Only analyze these packages (can be specified multiple times)
    #[arg(short, long, value_name = "NAME")]
    filter: Vec<String>,

    /// Apply the changes and write the lockfile back
    #[arg(short, long)]
    write: bool,
  },

  /// Compare a lockfile against a baseline
  Diff {
    /// The lockfile to report on
    #[arg(value_name = "LOCKFILE")]
    lockfile: PathBuf,

    /// The lockfile to compare against
    #[arg(value_name = "BASELINE")]
    baseline: PathBuf,
  },

  /// Print the name-level dependency graph as JSON
  Graph {
    #[arg(value_name = "LOCKFILE", default_value = "yarn.lock")]
    lockfile: PathBuf,
  },
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match cli.command {
    Command::Dump { lockfile } => commands::dump(&lockfile).await,
    Command::Dedupe {
      lockfile,
      local,
      filter,
      write,
    } => commands::dedupe(&lockfile, &local, filter, write).await,
    Command::Diff { lockfile, baseline } => commands::diff(&lockfile, &baseline).await,
    Command::Graph { lockfile } => commands::graph(&lockfile).await,
  }
}
