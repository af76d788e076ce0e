// src/main.rs
// =============================================================================
// This is the entry point of vcd.
//
// What happens here:
// 1. Parse command-line arguments and load the config file
// 2. Start file logging
// 3. Log in to the portal and list the subjects on the dashboard
// 4. Crawl every subject with the worker pool
// 5. Save the dedup cache and alias table, print the summary
// 6. Exit with proper code (0 = success, 1 = failed items, 2 = error)
// =============================================================================

mod cli;
mod config;
mod crawl;
mod error;
mod http;
mod logging;
mod portal;
mod store;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::Config;
use crawl::{CrawlContext, CrawlSettings, CrawlSummary, PoolExit};
use http::{HttpClient, ReqwestClient};
use std::sync::Arc;
use store::{AliasRegistry, DedupCache, DownloadsLog};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            tracing::error!(error = %message, "run failed");
            eprintln!("Error: {}", message);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = everything crawled
//   Ok(1) = some items failed fatally, or the crawl was abandoned
//   Err   = config, login or state files failed (exit code 2)
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let config_found = cli.config.exists();
    let mut config = Config::load(&cli.config)?;
    cli.apply(&mut config);

    if let Err(e) = logging::init(&config.log_dir) {
        eprintln!("⚠️  File logging unavailable ({e:#}), logging to stderr");
        logging::init_stderr();
    }
    if !config_found {
        tracing::info!(path = %cli.config.display(), "no config file, using defaults");
    }

    let credentials = config.credentials()?;
    let settings = CrawlSettings::from_config(&config);
    let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new(settings.request_timeout)?);

    println!("🔐 Logging in to {}", config.portal.base_url);
    let dashboard = portal::login(
        client.as_ref(),
        &config.portal,
        &credentials,
        settings.request_timeout,
    )
    .await?;

    let subjects = portal::find_subjects(&dashboard, &config.portal);
    if subjects.is_empty() {
        println!("⚠️  No subjects found on the dashboard");
        return Ok(0);
    }
    println!("📚 Found {} subject(s)", subjects.len());
    for subject in &subjects {
        println!("   {}", subject.name);
    }

    let state_dir = config.state_dir();
    let cache = DedupCache::load(state_dir.join("cache.json"))?;
    let aliases = AliasRegistry::load(state_dir.join("aliases.json"), config.max_path_len)?;
    let downloads = DownloadsLog::open(config.root_folder.join("downloads.log"))?;

    println!("\n⬇️  Crawling with {} worker(s)...\n", settings.workers);
    let ctx = Arc::new(CrawlContext::new(client, settings, cache, aliases, downloads));
    let summary = crawl::crawl(Arc::clone(&ctx), subjects).await;

    ctx.cache.persist()?;
    ctx.aliases.persist()?;

    print_summary(&summary, cli.json)?;
    Ok(summary.exit_code())
}

fn print_summary(summary: &CrawlSummary, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(summary)?;
        println!("{}", json_output);
    } else {
        print_table(summary);
    }
    Ok(())
}

fn print_table(summary: &CrawlSummary) {
    let stats = &summary.stats;
    let rows = [
        ("🆕 New files", stats.new_files),
        ("🔄 Updated files", stats.updated_files),
        ("✅ Unchanged files", stats.unchanged_files),
        ("🔒 Permission denied", stats.skipped_files),
        ("⚠️  Dropped items", stats.dropped),
        ("❌ Failed items", stats.fatal),
        ("📋 Items processed", stats.processed),
    ];

    println!();
    println!("📊 Summary ({} subject(s), {:.1}s):", summary.subjects, summary.elapsed_secs);
    for (label, count) in rows {
        println!("   {:<24} {}", label, count);
    }

    if summary.exit == PoolExit::Abandoned {
        println!("\n⏱️  Crawl abandoned: no progress within the idle timeout");
    }
}
