use clap::{Args, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use lakesurvey::{logging, BatchOptions, CachedSurveyClient, Config, SurveyBatch};

#[derive(Parser, Debug)]
#[command(name = "lakesurvey")]
#[command(about = "Fetch and cache Minnesota DNR fish survey data for lakes")]
#[command(version)]
struct Cli {
  /// Path to config file (default: ./lakesurvey.yaml or $XDG_CONFIG_HOME/lakesurvey/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Log debug output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Also write logs to this file
  #[arg(long, global = true)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch survey summaries for lakes and print them as JSON
  Fetch(FetchArgs),
  /// Inspect or clear the survey cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Args, Debug)]
struct FetchArgs {
  /// Lake ids (8-digit DOWLKNUM)
  keys: Vec<String>,

  /// Read additional lake ids from a file, one per line
  #[arg(long)]
  keys_file: Option<PathBuf>,

  /// Worker pool size (1 = sequential)
  #[arg(long)]
  concurrency: Option<usize>,

  /// Delay between requests in milliseconds
  #[arg(long)]
  delay_ms: Option<u64>,

  /// Ignore and don't update the cache
  #[arg(long)]
  no_cache: bool,

  /// Write JSON here instead of stdout
  #[arg(short, long)]
  output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Show how many entries are fresh or expired
  Stats,
  /// Delete every cached survey
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let cli = Cli::parse();
  let _guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

  let config = Config::load(cli.config.as_deref())?;
  let client = CachedSurveyClient::new(&config)?;

  match cli.command {
    Command::Fetch(args) => fetch(&config, client, args).await,
    Command::Cache { action } => match action {
      CacheAction::Stats => {
        let stats = client.cache_stats();
        println!(
          "{} cached surveys in {}: {} fresh, {} expired",
          stats.total,
          config.cache_dir.display(),
          stats.fresh,
          stats.expired
        );
        Ok(())
      }
      CacheAction::Clear => {
        let removed = client.clear_cache()?;
        println!("Cleared {} cached fish survey files", removed);
        Ok(())
      }
    },
  }
}

async fn fetch(config: &Config, client: CachedSurveyClient, args: FetchArgs) -> Result<()> {
  let mut raw_keys = args.keys;
  if let Some(path) = &args.keys_file {
    raw_keys.extend(read_keys_file(path)?);
  }

  let keys: Vec<String> = raw_keys
    .into_iter()
    .filter(|key| {
      let valid = is_lake_id(key);
      if !valid {
        warn!(key = key.as_str(), "Skipping malformed lake id");
      }
      valid
    })
    .collect();

  if keys.is_empty() {
    return Err(eyre!("No valid lake ids given"));
  }

  let mut options = BatchOptions::from_config(config);
  if let Some(concurrency) = args.concurrency {
    options.concurrency = concurrency;
  }
  if let Some(delay_ms) = args.delay_ms {
    options.request_delay = Duration::from_millis(delay_ms);
  }
  options.use_cache = !args.no_cache;

  let result = SurveyBatch::new(client).fetch_many(&keys, &options).await;

  let json = serde_json::to_string_pretty(&result.surveys)
    .map_err(|e| eyre!("Failed to serialize results: {}", e))?;

  match &args.output {
    Some(path) => std::fs::write(path, json)
      .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?,
    None => println!("{}", json),
  }

  Ok(())
}

fn read_keys_file(path: &Path) -> Result<Vec<String>> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read keys file {}: {}", path.display(), e))?;

  Ok(
    contents
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty() && !line.starts_with('#'))
      .map(String::from)
      .collect(),
  )
}

/// DNR lake ids are exactly eight ASCII digits.
fn is_lake_id(key: &str) -> bool {
  key.len() == 8 && key.bytes().all(|b| b.is_ascii_digit())
}
