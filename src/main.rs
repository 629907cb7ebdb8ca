use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dedupe_lib::db::PgContactRepository;
use dedupe_lib::models::core::{ContactId, UserId};
use dedupe_lib::models::merging::parse_resolutions;
use dedupe_lib::models::stats_models::AutoMergeSummary;
use dedupe_lib::utils::config::DedupConfig;
use dedupe_lib::utils::db_connect::{connect, get_pool_status};
use dedupe_lib::utils::env::{load_env, load_env_from_file};
use dedupe_lib::DedupEngine;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde::Serialize;
use serde_json::json;

#[derive(Parser)]
#[command(name = "dedupe", about = "Find and merge duplicate contacts", version)]
struct Cli {
    /// Env file to load instead of the nearest .env
    #[arg(long, global = true)]
    env_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the contacts, interactions and interests tables if missing
    InitSchema,
    /// Scan all of a user's contacts for duplicates
    Scan {
        #[arg(long)]
        user: String,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        include_low_confidence: bool,
    },
    /// Find duplicates of one contact
    Find {
        #[arg(long)]
        user: String,
        #[arg(long)]
        contact: String,
        #[arg(long)]
        include_low_confidence: bool,
    },
    /// Show what a merge would do without writing anything
    Preview {
        #[arg(long)]
        user: String,
        #[arg(long)]
        primary: String,
        #[arg(long)]
        secondary: String,
        /// field=primary|secondary|concatenate, repeatable
        #[arg(long = "resolve", value_parser = parse_key_val)]
        resolve: Vec<(String, String)>,
    },
    /// Merge the secondary contact into the primary
    Merge {
        #[arg(long)]
        user: String,
        #[arg(long)]
        primary: String,
        #[arg(long)]
        secondary: String,
        /// field=primary|secondary|concatenate, repeatable
        #[arg(long = "resolve", value_parser = parse_key_val)]
        resolve: Vec<(String, String)>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Merge every high-confidence duplicate pair
    AutoMerge {
        #[arg(long)]
        user: String,
        #[arg(long)]
        max_merges: Option<usize>,
    },
    /// Manual-review candidates with merge previews
    Suggestions {
        #[arg(long)]
        user: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Duplicate rate and data quality for a user
    Stats {
        #[arg(long)]
        user: String,
    },
    /// Delete interests orphaned by merge collisions
    Cleanup {
        #[arg(long)]
        user: String,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{}'", s))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid spinner template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(message.to_string());
    Ok(pb)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let cli = Cli::parse();
    match cli.env_file.as_deref() {
        Some(path) => load_env_from_file(path),
        None => load_env(),
    }

    let config = DedupConfig::from_env();
    config.log_config();

    let pool = connect().await.context("Failed to connect to database")?;
    let (connections, idle) = get_pool_status(&pool);
    info!("DB pool ready: {} connections ({} idle)", connections, idle);

    let repo = Arc::new(PgContactRepository::new(pool));
    let engine = DedupEngine::new(repo.clone(), config);
    let defaults = engine.config().clone();

    match cli.command {
        Command::InitSchema => {
            repo.ensure_schema().await?;
        }
        Command::Scan {
            user,
            batch_size,
            include_low_confidence,
        } => {
            let pb = spinner("Scanning contacts for duplicates...")?;
            let report = engine
                .scanner()
                .scan_report(
                    &UserId::new(user),
                    batch_size.unwrap_or(defaults.default_batch_size),
                    include_low_confidence,
                )
                .await?;
            pb.finish_with_message(format!(
                "{} duplicates among {} contacts",
                report.duplicates_found, report.total_contacts_scanned
            ));
            print_json(&report)?;
        }
        Command::Find {
            user,
            contact,
            include_low_confidence,
        } => {
            let matches = engine
                .scanner()
                .find_duplicates_for_contact(
                    &UserId::new(user),
                    &ContactId::new(contact),
                    include_low_confidence,
                )
                .await?;
            print_json(&matches)?;
        }
        Command::Preview {
            user,
            primary,
            secondary,
            resolve,
        } => {
            let resolutions = parse_resolutions(&resolve.into_iter().collect::<HashMap<_, _>>())?;
            let preview = engine
                .executor()
                .preview_merge(
                    &UserId::new(user),
                    &ContactId::new(primary),
                    &ContactId::new(secondary),
                    &resolutions,
                )
                .await?;
            print_json(&preview)?;
        }
        Command::Merge {
            user,
            primary,
            secondary,
            resolve,
            dry_run,
        } => {
            let resolutions = parse_resolutions(&resolve.into_iter().collect::<HashMap<_, _>>())?;
            let result = engine
                .executor()
                .merge_contacts(
                    &UserId::new(user),
                    &ContactId::new(primary),
                    &ContactId::new(secondary),
                    &resolutions,
                    dry_run,
                )
                .await?;
            print_json(&result)?;
        }
        Command::AutoMerge { user, max_merges } => {
            let pb = spinner("Merging high-confidence duplicates...")?;
            let results = engine
                .auto_merger()
                .auto_merge_high_confidence(
                    &UserId::new(user),
                    max_merges.unwrap_or(defaults.default_max_merges),
                )
                .await;
            let summary = AutoMergeSummary::from_results(&results);
            pb.finish_with_message(format!(
                "{} of {} merges succeeded",
                summary.successful, summary.attempted
            ));
            print_json(&json!({ "summary": summary, "results": results }))?;
        }
        Command::Suggestions { user, limit } => {
            let suggestions = engine
                .auto_merger()
                .get_merge_suggestions(
                    &UserId::new(user),
                    limit.unwrap_or(defaults.default_suggestion_limit),
                )
                .await?;
            print_json(&suggestions)?;
        }
        Command::Stats { user } => {
            let stats = engine
                .scanner()
                .get_deduplication_stats(&UserId::new(user))
                .await?;
            print_json(&stats)?;
        }
        Command::Cleanup { user } => {
            let removed = engine
                .executor()
                .cleanup_orphaned_interests(&UserId::new(user))
                .await?;
            print_json(&json!({ "orphaned_interests_removed": removed }))?;
        }
    }

    Ok(())
}
