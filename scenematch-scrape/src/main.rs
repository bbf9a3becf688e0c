//! scenematch-scrape - catalog scene matcher
//!
//! Offline batch job: selects scenes from the catalog, matches each one
//! against a remote metadata provider and writes the accepted record back.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scenematch_common::config::{load_toml_or_default, resolve_config_path};
use scenematch_scrape::catalog::StashClient;
use scenematch_scrape::config::{CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use scenematch_scrape::providers::{build_adapter, ProviderHttp, ProviderKind};
use scenematch_scrape::services::{CandidateFetcher, ImageNormalizer, NonInteractiveOperator, Operator, TerminalOperator};
use scenematch_scrape::workflow::{BatchRunner, RunMode, RunOptions, RunStatistics};
use scenematch_scrape::ScrapeConfig;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for scenematch-scrape
#[derive(Parser, Debug)]
#[command(name = "scenematch-scrape")]
#[command(about = "Match catalog scenes against a remote metadata provider")]
#[command(version)]
struct Args {
    /// Catalog text query selecting scenes
    query: Option<String>,

    /// Remote provider
    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// Config file (overrides SCENEMATCH_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging with full error chains
    #[arg(long)]
    debug: bool,

    /// Include scenes already scraped
    #[arg(long, group = "mode")]
    rescrape: bool,

    /// Only scenes tagged as unmatched
    #[arg(long, group = "mode")]
    retry_unmatched: bool,

    /// Only scenes tagged as ambiguous (implies --man-disambiguate)
    #[arg(long, group = "mode")]
    disambiguate_only: bool,

    /// Only scenes tagged with an unconfirmed alias
    #[arg(long, group = "mode")]
    verify_aliases_only: bool,

    /// Stop after this many scenes
    #[arg(long)]
    max_scenes: Option<usize>,

    /// Only scenes whose path contains this substring
    #[arg(long)]
    path_include: Option<String>,

    /// Required tag names
    #[arg(long, num_args = 1..)]
    tags: Vec<String>,

    /// Excluded tag names
    #[arg(long, num_args = 1..)]
    not_tags: Vec<String>,

    /// Ask which candidate to use when several remain
    #[arg(long)]
    man_disambiguate: bool,

    /// Take the provider's first result when several remain
    #[arg(long)]
    auto_disambiguate: bool,

    /// Retry searches with date tokens stripped from the path
    #[arg(long)]
    fail_no_date: bool,

    /// Remove the --tags tags from scenes that match
    #[arg(long)]
    remove_search_tag: bool,
}

impl Args {
    fn mode(&self) -> RunMode {
        if self.rescrape {
            RunMode::Rescrape
        } else if self.retry_unmatched {
            RunMode::RetryUnmatched
        } else if self.disambiguate_only {
            RunMode::DisambiguateOnly
        } else if self.verify_aliases_only {
            RunMode::VerifyAliasesOnly
        } else {
            RunMode::Default
        }
    }

    /// Flags override the config file
    fn apply_to(&self, config: &mut ScrapeConfig) {
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        config.manual_disambiguate |= self.man_disambiguate;
        config.auto_disambiguate |= self.auto_disambiguate;
        config.fail_no_date |= self.fail_no_date;
        self.mode().adjust_config(config);
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            mode: self.mode(),
            query: self.query.clone(),
            tags: self.tags.clone(),
            not_tags: self.not_tags.clone(),
            path_include: self.path_include.clone(),
            max_scenes: self.max_scenes,
            remove_search_tag: self.remove_search_tag,
        }
    }
}

fn init_tracing(config: &ScrapeConfig, debug: bool) {
    // RUST_LOG wins unless --debug was given
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) if !debug => filter,
        _ => EnvFilter::new(config.logging.filter_directive(debug)),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(config: &ScrapeConfig, args: &Args, stats: &mut RunStatistics) -> Result<()> {
    let adapter = build_adapter(config)
        .await
        .context("Failed to initialize provider")?;
    let fetcher = CandidateFetcher::new(adapter);
    info!(provider = %fetcher.provider_name(), "Provider ready");

    let catalog = StashClient::new(
        &config.resolve_catalog_url(),
        config.resolve_catalog_api_key().as_deref(),
        Duration::from_millis(config.catalog.idle_poll_ms),
    )
    .context("Failed to initialize catalog client")?;

    let image_http = ProviderHttp::new(0, config.connect_timeout_secs, config.read_timeout_secs)
        .context("Failed to initialize image client")?;
    let images = ImageNormalizer::new(image_http);

    let mut operator: Box<dyn Operator> = if config.manual_disambiguate || config.confirm_questionable_aliases {
        Box::new(TerminalOperator::stdio())
    } else {
        Box::new(NonInteractiveOperator)
    };

    let runner = BatchRunner {
        config,
        catalog: &catalog,
        fetcher: &fetcher,
        images: Some(&images),
    };
    runner.run(operator.as_mut(), &args.run_options(), stats).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR, CONFIG_FILE_NAME)
        .context("Failed to locate configuration")?;
    let mut config: ScrapeConfig =
        load_toml_or_default(config_path.as_deref()).context("Failed to load configuration")?;
    args.apply_to(&mut config);

    init_tracing(&config, args.debug);

    info!(
        "Starting scenematch-scrape v{} (build {} {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let mut stats = RunStatistics::default();
    let outcome = run(&config, &args, &mut stats).await;
    println!("Scenes considered: {}", stats.considered);
    println!("{}", stats.display_string());

    match outcome {
        Ok(()) => {
            println!("SUCCESS");
            Ok(())
        }
        Err(e) => {
            if args.debug {
                error!("Run failed: {:?}", e);
            } else {
                error!("Run failed: {:#}", e);
            }
            println!("FAILED");
            std::process::exit(1);
        }
    }
}
