use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use puzzlescout::{
    config::CliOverrides, CancelToken, EncodingMode, EngineConfig, QueryFilter, ShardIndex,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::{num::NonZeroUsize, path::PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EngineArgs {
    /// Directory holding the rating-sorted shard files
    #[arg(short = 'd', long = "dir", global = true)]
    shard_dir: Option<PathBuf>,

    /// Glob selecting shard files inside the directory
    #[arg(long, global = true)]
    pattern: Option<String>,

    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short = 'j', long, global = true)]
    threads: Option<NonZeroUsize>,

    /// How to handle invalid UTF-8 sequences
    #[arg(long, global = true, value_enum)]
    encoding: Option<EncodingArg>,

    /// Scan every shard instead of consulting the rating index
    #[arg(long, global = true)]
    no_index: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EncodingArg {
    /// Fail the query on the first invalid sequence
    Failfast,
    /// Replace invalid sequences and keep scanning
    Lossy,
}

impl From<EncodingArg> for EncodingMode {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Failfast => EncodingMode::FailFast,
            EncodingArg::Lossy => EncodingMode::Lossy,
        }
    }
}

#[derive(Args, Clone)]
struct FilterArgs {
    /// Lowest rating, inclusive
    #[arg(long = "min")]
    rating_min: Option<i32>,

    /// Highest rating, inclusive
    #[arg(long = "max")]
    rating_max: Option<i32>,

    /// Substring that must appear in the opening tags
    #[arg(short, long, default_value = "")]
    opening: String,

    /// Required theme substring (repeatable, or a comma/space separated list)
    #[arg(short, long = "theme")]
    themes: Vec<String>,

    /// Puzzle id to skip (repeatable)
    #[arg(short = 'x', long)]
    exclude: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the shard rating index
    Index {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Count puzzles matching a filter
    Count(FilterArgs),

    /// Print one uniformly random puzzle matching a filter
    Random {
        #[command(flatten)]
        filter: FilterArgs,

        /// Seed for a reproducible pick
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Count matching puzzles per opening tag
    Openings(FilterArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.engine)?;
    config.init_tracing();
    debug!("Effective config: {:?}", config);

    let engine = puzzlescout::init(config).context("failed to build the shard index")?;

    match cli.command {
        Commands::Index { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(engine.index())?);
            } else {
                print_index(engine.index());
            }
        }
        Commands::Count(args) => {
            let filter = build_filter(&args, engine.config());
            let count = engine.count(&filter)?;
            println!("{}", serde_json::json!({ "count": count }));
        }
        Commands::Random { filter, seed } => {
            let filter = build_filter(&filter, engine.config());
            let picked = match seed {
                Some(seed) => engine.select_random_with(
                    &filter,
                    &mut StdRng::seed_from_u64(seed),
                    &CancelToken::new(),
                )?,
                None => engine.select_random(&filter)?,
            };
            println!("{}", serde_json::to_string_pretty(&picked)?);
        }
        Commands::Openings(args) => {
            let filter = build_filter(&args, engine.config());
            let openings = engine.list_openings(&filter)?;
            println!("{}", serde_json::to_string_pretty(&openings)?);
        }
    }

    engine.metrics().log_stats();
    Ok(())
}

fn load_config(args: &EngineArgs) -> Result<EngineConfig> {
    let overrides = CliOverrides {
        shard_dir: args.shard_dir.clone(),
        shard_pattern: args.pattern.clone(),
        thread_count: args.threads,
        log_level: args.log_level.clone(),
        encoding_mode: args.encoding.map(EncodingMode::from),
        no_index: args.no_index,
    };

    let config = EngineConfig::load_from(args.config.as_deref())
        .context("failed to load configuration")?
        .merge_with_cli(overrides);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_filter(args: &FilterArgs, config: &EngineConfig) -> QueryFilter {
    let mut filter = QueryFilter::new()
        .rating(
            args.rating_min.unwrap_or(config.default_rating_min),
            args.rating_max.unwrap_or(config.default_rating_max),
        )
        .opening(args.opening.clone());

    filter.themes = split_themes(&args.themes);
    filter.exclude = args
        .exclude
        .iter()
        .filter(|id| !id.is_empty())
        .cloned()
        .collect();
    filter
}

/// Accepts `--theme fork --theme pin` as well as `--theme "fork,pin"`
fn split_themes(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|t| t.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn print_index(index: &ShardIndex) {
    if index.is_empty() {
        println!("{}", "No shards indexed".yellow());
        return;
    }

    for entry in index.entries() {
        println!(
            "{:>5} - {:<5} {:>10} bytes  {}",
            entry.min_rating.to_string().cyan(),
            entry.max_rating.to_string().cyan(),
            entry.size_bytes,
            entry.path.display()
        );
    }

    if let Some((min, max)) = index.rating_bounds() {
        println!(
            "\n{} {} shards, ratings {}..={}, {} bytes, built in {}",
            "Summary:".green().bold(),
            index.len(),
            min,
            max,
            index.total_bytes(),
            humantime::format_duration(index.build_time())
        );
    }
}
