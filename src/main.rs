use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use dpofinder::batch::{export_batch, parse_domain_file, resolve_batch};
use dpofinder::cache_commands;
use dpofinder::cli::{CacheCommands, Cli, Commands};
use dpofinder::config::{self, AppConfig, CONFIG_PATH};
use dpofinder::logger::{init_tracing, BatchProgress, ProgressSlot, VerbosityLevel};
use dpofinder::{ContactResolver, FileContactStore, HttpFetcher, ResolveOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let progress_slot = ProgressSlot::new();
    init_tracing(VerbosityLevel::from_verbose_count(cli.verbose), progress_slot.clone())?;

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_PATH));

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config_at(&config_path) {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run dpofinder again.");
                return Ok(());
            }
            Err(e) => bail!("Failed to create configuration file: {}", e),
        }
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let app_config = load_config(&config_path)?;

    match command {
        Commands::Cache { action } => run_cache_command(&app_config, action).await,
        Commands::Resolve { domain, force, allow_downgrade, json } => {
            let options = ResolveOptions { force, allow_downgrade };
            run_resolve(&app_config, &domain, options, json).await
        }
        Commands::Batch { file, parallel_jobs, force, allow_downgrade, output_dir } => {
            let options = ResolveOptions { force, allow_downgrade };
            let concurrency = parallel_jobs.unwrap_or(app_config.batch.concurrency);
            run_batch(&app_config, &file, concurrency, options, &output_dir, &progress_slot).await
        }
    }
}

/// Load the config file; a missing file prompts in a terminal and otherwise
/// falls back to the built-in defaults.
fn load_config(path: &Path) -> Result<AppConfig> {
    match AppConfig::load_from_path(path) {
        Ok(cfg) => Ok(cfg),
        Err(config::ConfigError::FileNotFound(missing)) => match AppConfig::prompt_create_config(&missing) {
            Ok(Some(created)) => {
                println!("✅ Created default configuration file at: {}", created.display());
                AppConfig::load_from_path(&created).context("Failed to load the new configuration file")
            }
            Ok(None) => {
                warn!("Configuration file not found at {}; using built-in defaults", missing.display());
                Ok(AppConfig::default())
            }
            Err(e) => bail!("Failed to create configuration file: {}", e),
        },
        Err(e) => bail!("Configuration error: {}", e),
    }
}

async fn build_resolver(app_config: &AppConfig) -> Result<ContactResolver> {
    let fetcher = Arc::new(HttpFetcher::new(&app_config.http).context("Failed to build HTTP client")?);
    let store = Arc::new(
        FileContactStore::open(&app_config.cache.store_dir)
            .await
            .context("Failed to open contact store")?,
    );
    ContactResolver::from_config(app_config, fetcher, store).context("Invalid crawl configuration")
}

async fn run_cache_command(app_config: &AppConfig, action: CacheCommands) -> Result<()> {
    let store = FileContactStore::new(&app_config.cache.store_dir);

    match action {
        CacheCommands::List => cache_commands::list_cached_domains(&store).await,
        CacheCommands::Show { domain } => cache_commands::show_cache_entry(&store, &domain).await,
        CacheCommands::Clear { domain, all } => {
            if all {
                cache_commands::clear_all_cache(&store).await
            } else if let Some(d) = domain {
                cache_commands::clear_domain_cache(&store, &d).await
            } else {
                bail!(
                    "Either specify a domain or use --all to clear all stored records.\n\
                     Usage: dpofinder cache clear <domain>\n       dpofinder cache clear --all"
                )
            }
        }
    }
}

async fn run_resolve(app_config: &AppConfig, domain: &str, options: ResolveOptions, json: bool) -> Result<()> {
    let resolver = build_resolver(app_config).await?;
    let record = resolver.resolve_contact(domain, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        cache_commands::print_record(&record);
    }
    Ok(())
}

async fn run_batch(
    app_config: &AppConfig,
    file: &Path,
    concurrency: usize,
    options: ResolveOptions,
    output_dir: &Path,
    progress_slot: &ProgressSlot,
) -> Result<()> {
    let entries = parse_domain_file(file)?;
    if entries.is_empty() {
        bail!("No valid domains found in {}", file.display());
    }

    let resolver = build_resolver(app_config).await?;
    info!("Loaded {} domains from {}", entries.len(), file.display());

    let progress = BatchProgress::start(progress_slot, entries.len() as u64);
    let summary = resolve_batch(&resolver, entries, concurrency, options, Some(&progress)).await;
    progress.finish();

    let (summary_path, contacts_path) = export_batch(&summary, output_dir)?;

    println!(
        "Resolved {} domains in {:.1}s: {} succeeded ({} with a contact), {} failed",
        summary.total_domains, summary.total_duration_secs, summary.successful, summary.contacts_found, summary.failed
    );
    println!("Summary:  {}", summary_path.display());
    println!("Contacts: {}", contacts_path.display());

    Ok(())
}
