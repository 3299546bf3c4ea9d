//! CLI administration tool for broadcast-dispatch.
//!
//! Operator commands that act on the same tables as the running service,
//! without going through the scheduler.
//!
//! # Usage
//!
//! ```bash
//! # List campaigns, optionally by status
//! cargo run --bin admin -- campaign list --status queued
//!
//! # Per-status job counts for one campaign
//! cargo run --bin admin -- campaign stats 42
//!
//! # Put a stuck or failed campaign back to `scheduled`
//! cargo run --bin admin -- campaign reschedule 42
//!
//! # Record a bounce for a sent message
//! cargo run --bin admin -- bounce "<1712345678.00ab12cd34ef5678@example.com>"
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (required): PostgreSQL connection string

use broadcast_dispatch::application::services::{
    BounceKind, BounceService, BounceSignal, NoopBounceSource,
};
use broadcast_dispatch::domain::entities::{CampaignStatus, JobStatus};
use broadcast_dispatch::domain::repositories::{CampaignRepository, JobRepository};
use broadcast_dispatch::infrastructure::persistence::{PgCampaignRepository, PgJobRepository};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for operating broadcast-dispatch.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Inspect and repair campaigns
    Campaign {
        #[command(subcommand)]
        action: CampaignAction,
    },

    /// Mark a sent message as bounced (or rejected)
    Bounce {
        /// Message id as returned by the transport, brackets optional
        message_id: String,

        /// Record a rejection instead of a bounce
        #[arg(long)]
        rejected: bool,

        /// Reason stored on the job
        #[arg(short, long, default_value = "Marked by operator")]
        reason: String,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Campaign subcommands.
#[derive(Subcommand)]
enum CampaignAction {
    /// List campaigns
    List {
        /// Only campaigns in this status (e.g. "queued", "error")
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show per-status job counts for a campaign
    Stats {
        id: i64,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move a processing or error campaign back to scheduled
    Reschedule {
        id: i64,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Campaign { action } => handle_campaign_action(action, &pool).await?,
        Commands::Bounce {
            message_id,
            rejected,
            reason,
        } => handle_bounce(&pool, message_id, rejected, reason).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

/// Dispatches campaign commands.
async fn handle_campaign_action(action: CampaignAction, pool: &PgPool) -> Result<()> {
    let pool = Arc::new(pool.clone());
    let campaigns = PgCampaignRepository::new(pool.clone());

    match action {
        CampaignAction::List { status } => list_campaigns(&campaigns, status).await?,
        CampaignAction::Stats { id, json } => {
            let jobs = PgJobRepository::new(pool);
            campaign_stats(&campaigns, &jobs, id, json).await?;
        }
        CampaignAction::Reschedule { id, yes } => {
            reschedule_campaign(&campaigns, id, yes).await?;
        }
    }

    Ok(())
}

/// Lists campaigns, oldest first.
///
/// # Output Format
///
/// ```text
/// 📋 Campaigns
///
///   ID    Name                           Status       Scheduled        Message
///   ──────────────────────────────────────────────────────────────────────────────────────────
///   1     Spring newsletter              completed    2026-03-01 09:00 Completed: 120 sent, 2 failed
/// ```
async fn list_campaigns(repo: &PgCampaignRepository, status: Option<String>) -> Result<()> {
    let statuses = match status {
        Some(s) => vec![s.parse::<CampaignStatus>().map_err(anyhow::Error::msg)?],
        None => CampaignStatus::ALL.to_vec(),
    };

    println!("{}", "📋 Campaigns".bright_blue().bold());
    println!();

    let campaigns = repo
        .find_by_status(&statuses)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list campaigns: {}", e.reason()))?;

    if campaigns.is_empty() {
        println!("{}", "  No campaigns found".yellow());
        return Ok(());
    }

    println!(
        "  {:<5} {:<30} {:<12} {:<16} {}",
        "ID".bright_white().bold(),
        "Name".bright_white().bold(),
        "Status".bright_white().bold(),
        "Scheduled".bright_white().bold(),
        "Message".bright_white().bold()
    );
    println!("  {}", "─".repeat(90).bright_black());

    for campaign in &campaigns {
        let scheduled = campaign
            .scheduled_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  {:<5} {:<30} {:<12} {:<16} {}",
            campaign.id.to_string().bright_black(),
            campaign.name.cyan(),
            colored_status(campaign.status),
            scheduled.bright_black(),
            campaign.status_message.bright_black()
        );
    }

    println!();
    println!(
        "  Total: {}",
        campaigns.len().to_string().bright_white().bold()
    );
    println!();

    Ok(())
}

/// Prints the campaign's status and its job counts.
async fn campaign_stats(
    campaigns: &PgCampaignRepository,
    jobs: &PgJobRepository,
    id: i64,
    as_json: bool,
) -> Result<()> {
    let campaign = campaigns
        .find_by_id(id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load campaign: {}", e.reason()))?
        .context("Campaign not found")?;

    let counts = jobs
        .count_by_status(id, &[])
        .await
        .map_err(|e| anyhow::anyhow!("Failed to count jobs: {}", e.reason()))?;

    if as_json {
        let by_status: serde_json::Map<String, serde_json::Value> = JobStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), json!(counts.get(*status))))
            .collect();

        let output = json!({
            "id": campaign.id,
            "name": campaign.name,
            "status": campaign.status.as_str(),
            "status_message": campaign.status_message,
            "queued_at": campaign.queued_at,
            "completed_at": campaign.completed_at,
            "jobs": by_status,
            "in_pipeline": counts.pipeline_total(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "📊 Campaign Statistics".bright_blue().bold());
    println!();
    println!("  Campaign: {} ({})", campaign.name.cyan(), campaign.id);
    println!("  Status:   {}", colored_status(campaign.status));
    if !campaign.status_message.is_empty() {
        println!("  Message:  {}", campaign.status_message.bright_black());
    }
    println!();

    for status in JobStatus::ALL {
        println!(
            "  {:<10} {}",
            status.as_str(),
            counts.get(status).to_string().bright_green().bold()
        );
    }
    println!();
    println!(
        "  In pipeline: {}",
        counts.pipeline_total().to_string().bright_white().bold()
    );
    println!();

    Ok(())
}

/// Moves a campaign back to `scheduled` after confirmation.
///
/// Only `processing` (e.g. after a crash mid-dispatch) and `error`
/// campaigns can be rescheduled. Jobs already created for the campaign are
/// left untouched; the next dispatch only queues recipients without one.
async fn reschedule_campaign(repo: &PgCampaignRepository, id: i64, skip_confirm: bool) -> Result<()> {
    println!("{}", "🔁 Reschedule Campaign".bright_blue().bold());
    println!();

    let campaign = repo
        .find_by_id(id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load campaign: {}", e.reason()))?
        .context("Campaign not found")?;

    if !matches!(
        campaign.status,
        CampaignStatus::Processing | CampaignStatus::Error
    ) {
        println!(
            "{} {}",
            "⚠️  Only processing or error campaigns can be rescheduled, this one is".yellow(),
            colored_status(campaign.status)
        );
        return Ok(());
    }

    println!("  Campaign: {}", campaign.name.cyan());
    println!("  Status:   {}", colored_status(campaign.status));
    if !campaign.status_message.is_empty() {
        println!("  Message:  {}", campaign.status_message.bright_black());
    }
    println!(
        "{}",
        "ℹ️  Existing jobs are kept; the next dispatch only queues recipients without one."
            .yellow()
    );
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Reschedule this campaign?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let moved = repo
        .reschedule(id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to reschedule campaign: {}", e.reason()))?;

    println!();
    if moved {
        println!("{}", "✅ Campaign rescheduled".green().bold());
    } else {
        println!(
            "{}",
            "⚠️  Campaign changed status meanwhile, nothing done".yellow()
        );
    }
    println!();

    Ok(())
}

/// Applies one bounce signal through the same path as the bounce tick.
async fn handle_bounce(
    pool: &PgPool,
    message_id: String,
    rejected: bool,
    reason: String,
) -> Result<()> {
    let jobs = Arc::new(PgJobRepository::new(Arc::new(pool.clone())));
    let service = BounceService::new(jobs, Arc::new(NoopBounceSource));

    let signal = BounceSignal {
        message_id,
        kind: if rejected {
            BounceKind::Rejected
        } else {
            BounceKind::Bounced
        },
        reason,
    };

    let job = service
        .apply(&signal)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to apply bounce: {}", e.reason()))?;

    match job {
        Some(job) => println!(
            "{} job {} of campaign {} is now {}",
            "✅".green(),
            job.id.to_string().bright_white(),
            job.campaign_id.to_string().bright_white(),
            job.status.as_str().red().bold()
        ),
        None => println!(
            "{}",
            "⚠️  No sent job carries this message id".yellow()
        ),
    }

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            let queued: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM delivery_jobs WHERE status = 'queued'")
                    .fetch_one(pool)
                    .await?;

            println!("  PostgreSQL:  {}", version.bright_white());
            println!("  Queued jobs: {}", queued.to_string().bright_green().bold());
            println!();
        }
    }

    Ok(())
}

fn colored_status(status: CampaignStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        CampaignStatus::Completed => label.green(),
        CampaignStatus::Error => label.red(),
        CampaignStatus::Processing | CampaignStatus::Queued | CampaignStatus::Running => {
            label.yellow()
        }
        _ => label.normal(),
    }
}
