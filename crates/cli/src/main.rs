use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use theme_coordinator::{PolicyConfig, StrategyTier};

mod commands;
mod report;

#[derive(Parser)]
#[command(name = "themectl")]
#[command(about = "Structural index, search and context assembly for storefront themes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Print JSON instead of text (stdout is reserved for the JSON body)
    #[arg(long, global = true)]
    json: bool,

    /// Policy threshold overrides (JSON or TOML)
    #[arg(long, global = true, env = "THEME_POLICY_CONFIG")]
    policy_config: Option<PathBuf>,

    /// Strategy tier: default|aggressive
    #[arg(long, global = true, env = "THEME_POLICY_TIER")]
    tier: Option<StrategyTier>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the theme map of a theme directory and persist it
    Index(IndexArgs),

    /// Find the files and features a request is about
    Lookup(LookupArgs),

    /// Split one file into structural chunks
    Chunk(ChunkArgs),

    /// Keyword + vector search over a theme
    Search(SearchArgs),

    /// Assemble a token-bounded context bundle for a request
    Context(ContextArgs),

    /// Show the effective coordination thresholds
    Policy,
}

#[derive(Args)]
struct IndexArgs {
    /// Theme directory (defaults to current directory)
    #[arg(default_value = ".")]
    root: PathBuf,
}

#[derive(Args)]
struct LookupArgs {
    root: PathBuf,

    query: String,

    /// Maximum number of targets
    #[arg(long, default_value_t = 5)]
    top_n: usize,

    /// File currently open in the editor
    #[arg(long)]
    active: Option<String>,
}

#[derive(Args)]
struct ChunkArgs {
    file: PathBuf,
}

#[derive(Args)]
struct SearchArgs {
    root: PathBuf,

    query: String,

    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Skip the vector index
    #[arg(long)]
    keyword_only: bool,
}

#[derive(Args)]
struct ContextArgs {
    root: PathBuf,

    query: String,

    /// Token budget of the bundle
    #[arg(long, default_value_t = 8_000)]
    budget: usize,

    /// File currently open in the editor
    #[arg(long)]
    active: Option<String>,

    /// Fuzzy matches considered
    #[arg(long, default_value_t = theme_context::DEFAULT_TOP_N)]
    top_n: usize,
}

impl Cli {
    fn policy(&self) -> Result<PolicyConfig> {
        let mut config = match &self.policy_config {
            Some(path) => {
                let bytes = fs::read(path)
                    .with_context(|| format!("Failed to read policy config {}", path.display()))?;
                PolicyConfig::from_bytes(&bytes)
                    .with_context(|| format!("Invalid policy config {}", path.display()))?
            }
            None => PolicyConfig::default(),
        };
        if let Some(tier) = self.tier {
            config = config.with_tier(tier);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet || cli.json {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let json = cli.json;
    match &cli.command {
        Commands::Index(args) => {
            let summary = commands::index(&args.root).await?;
            report::emit(json, &summary, report::index)
        }
        Commands::Lookup(args) => {
            let result =
                commands::lookup(&args.root, &args.query, args.top_n, args.active.clone()).await?;
            report::emit(json, &result, report::lookup)
        }
        Commands::Chunk(args) => {
            let chunks = commands::chunk(&args.file)?;
            report::emit(json, &chunks, |chunks| report::chunks(chunks))
        }
        Commands::Search(args) => {
            let hits =
                commands::search(&args.root, &args.query, args.limit, args.keyword_only).await?;
            report::emit(json, &hits, |hits| report::hits(hits))
        }
        Commands::Context(args) => {
            let bundle = commands::context(
                &args.root,
                &args.query,
                args.budget,
                args.active.clone(),
                args.top_n,
            )
            .await?;
            report::emit(json, &bundle, report::bundle)
        }
        Commands::Policy => {
            let policy = commands::policy(&cli.policy()?);
            report::emit(json, &policy, report::policy)
        }
    }
}
