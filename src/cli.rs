//! Command line interface: `analyze` and `fetch-recipes`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use regex::Regex;
use tracing::warn;

use crate::calculator::{self, Evaluator, RankOptions};
use crate::config::{self, BAZAAR_URL, DEFAULT_TIMEOUT_SECS, FetchConfig};
use crate::fetch::{self, HttpSource, JsonSource, RecipeClient};
use crate::models::{EvaluationResult, SortKey};
use crate::prices::PriceSnapshot;
use crate::repository::RecipeRepository;

#[derive(Parser)]
#[command(name = "bazaar-calculator")]
#[command(about = "Crafting profit calculator for the Hypixel SkyBlock bazaar")]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank recipes by crafting profitability
    Analyze(AnalyzeArgs),

    /// Download recipes from the Hypixel API and save them in the canonical format
    FetchRecipes(FetchRecipesArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Path to the recipes JSON file
    recipes: PathBuf,

    /// Number of results to show
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Show every qualifying result
    #[arg(long, conflicts_with = "top")]
    all: bool,

    /// Only include crafts with at least this much profit
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    min_profit: f64,

    /// Only include crafts with at least this popularity score
    #[arg(long, default_value_t = 0)]
    min_popularity: u64,

    /// Sort criterion
    #[arg(long, value_enum, default_value_t = SortKey::Profit)]
    sort_by: SortKey,

    /// Cached bazaar snapshot (JSON file, or a directory of snapshots to average)
    #[arg(long)]
    bazaar_cache: Option<PathBuf>,

    /// Dump the ranked flips to this JSON file
    #[arg(long)]
    dump_results: Option<PathBuf>,

    /// Only rank items whose id matches this regular expression
    #[arg(long = "match", value_name = "REGEX")]
    product_match: Option<Regex>,

    #[command(flatten)]
    http: HttpArgs,
}

#[derive(Args)]
struct FetchRecipesArgs {
    /// Where to save the recipes JSON file
    #[arg(long)]
    output: PathBuf,

    /// Cached bazaar snapshot (JSON file, or a directory of snapshots to average)
    #[arg(long)]
    bazaar_cache: Option<PathBuf>,

    /// Include all recipes even if the product is not sold on the bazaar
    #[arg(long)]
    include_all: bool,

    /// Override the primary recipes API endpoint
    #[arg(long)]
    recipes_api_url: Option<String>,

    /// Fallback endpoint tried when the previous ones fail (repeatable)
    #[arg(long)]
    recipes_fallback_url: Vec<String>,

    #[command(flatten)]
    http: HttpArgs,
}

#[derive(Args)]
struct HttpArgs {
    /// Hypixel API key for authorised requests
    #[arg(long, env = "HYPIXEL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, env = "BAZAAR_HTTP_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
}

impl HttpArgs {
    fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

/// Execute a parsed command line and return the process exit code
pub fn run(cli: Cli) -> Result<ExitCode> {
    crate::logging::init(cli.verbose);

    match cli.command {
        Commands::Analyze(args) => {
            let source = HttpSource::new(&args.http.fetch_config())?;
            let results = analyze(&args, &source)?;
            print!("{}", calculator::format_ranking(&results));
            Ok(ExitCode::SUCCESS)
        }

        Commands::FetchRecipes(args) => {
            let source = HttpSource::new(&args.http.fetch_config())?;
            Ok(ExitCode::from(fetch_recipes(&args, &source)?))
        }
    }
}

/// Cached prices when a cache path is given, otherwise the live bazaar
fn load_prices<S: JsonSource>(cache: Option<&Path>, source: &S) -> Result<PriceSnapshot> {
    let prices = match cache {
        Some(path) => PriceSnapshot::load(path)?,
        None => fetch::fetch_bazaar(source, BAZAAR_URL)?,
    };
    if prices.is_empty() {
        warn!("Price source contains no products");
    }
    Ok(prices)
}

fn analyze<S: JsonSource>(args: &AnalyzeArgs, source: &S) -> Result<Vec<EvaluationResult>> {
    let recipes = RecipeRepository::load(&args.recipes)?;
    let prices = load_prices(args.bazaar_cache.as_deref(), source)?;

    let options = RankOptions {
        min_profit: args.min_profit,
        min_popularity: args.min_popularity,
        limit: (!args.all).then_some(args.top),
        sort_by: args.sort_by,
        product_filter: args.product_match.clone(),
    };
    let results = Evaluator::new(&prices).rank(&recipes, &options);

    if let Some(path) = &args.dump_results {
        let json = serde_json::to_string_pretty(&results)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(results)
}

/// Returns the process exit code: 1 when no recipe endpoint could be reached.
fn fetch_recipes<S: JsonSource>(args: &FetchRecipesArgs, source: &S) -> Result<u8> {
    let endpoints = config::recipe_endpoints(
        args.recipes_api_url.clone(),
        args.recipes_fallback_url.clone(),
    );
    let mut repository = match RecipeClient::new(source, endpoints).fetch_repository() {
        Ok(repository) => repository,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(1);
        }
    };

    if !args.include_all {
        let prices = load_prices(args.bazaar_cache.as_deref(), source)?;
        repository.retain_priced(&prices);
    }
    if repository.is_empty() {
        warn!("No recipes to save");
    }

    repository.save(&args.output)?;
    println!("Saved {} recipes to {}", repository.len(), args.output.display());
    Ok(0)
}
