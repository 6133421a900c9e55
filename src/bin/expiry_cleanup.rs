//! Offline expiry cleanup over a JSON snapshot export of the store.
//!
//! Defaults to a dry run: it prints the batches a real run would purge.
//! With `--apply` it runs the purge against the loaded snapshot and writes
//! the pruned tables back to the same file.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use rxstock_api::{
    config::AppConfig,
    events::EventSender,
    logging,
    services::factory,
    store::memory::InMemoryStore,
};

#[derive(Parser)]
#[command(
    name = "expiry-cleanup",
    about = "Purge expired pharmacy batches from a store snapshot",
    version
)]
struct Cli {
    /// Path to a JSON snapshot export of the store tables
    #[arg(long)]
    data: PathBuf,

    /// Restrict the run to one pharmacy
    #[arg(long)]
    pharmacy: Option<Uuid>,

    /// Override the configured retention period
    #[arg(long)]
    retention_years: Option<u32>,

    /// Apply deletions and write the pruned snapshot back (default: dry run)
    #[arg(long, action = ArgAction::SetTrue)]
    apply: bool,

    /// Emit the report as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load().context("failed to load configuration")?;
    logging::init(&config);
    if let Some(years) = cli.retention_years {
        config.retention.years = years;
        config
            .validate()
            .context("invalid retention override")?;
    }

    let raw = fs::read_to_string(&cli.data)
        .with_context(|| format!("failed to read snapshot {}", cli.data.display()))?;
    let snapshot: serde_json::Value =
        serde_json::from_str(&raw).context("snapshot is not valid JSON")?;
    let store = Arc::new(
        InMemoryStore::from_snapshot(&snapshot).context("snapshot has an unexpected shape")?,
    );

    let (event_sender, mut events) = EventSender::channel(64);
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "event");
        }
    });
    let services = factory::build_services(store.clone(), &config, Some(event_sender));

    let dry_run = !cli.apply || config.retention.dry_run;
    if cli.apply && config.retention.dry_run {
        warn!("configuration forces dry-run; ignoring --apply");
    }

    if dry_run {
        let preview = services.expiry_cleanup.preview(cli.pharmacy).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&preview)?);
        } else {
            println!(
                "Dry run: {} batches expired before {}",
                preview.batches.len(),
                preview.cutoff_date
            );
            for batch in &preview.batches {
                println!(
                    "  {}  batch {}  expired {}  qty {}",
                    batch.medicine_name, batch.batch_number, batch.expiry_date, batch.quantity
                );
            }
            println!(
                "Would delete: {} lines, {} snapshot rows, {} ledger rows, {} purchases",
                preview.estimated.purchase_items,
                preview.estimated.current_inventory,
                preview.estimated.stock_transactions,
                preview.estimated.purchases
            );
        }
        return Ok(());
    }

    let report = services.expiry_cleanup.run(cli.pharmacy).await;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.message);
        if let Some(cutoff) = report.cutoff_date {
            println!("Cutoff: {}", cutoff);
        }
        println!(
            "Deleted: {} lines, {} snapshot rows, {} ledger rows, {} purchases",
            report.stats.purchase_items,
            report.stats.current_inventory,
            report.stats.stock_transactions,
            report.stats.purchases
        );
    }

    let pruned = store.snapshot().await;
    fs::write(&cli.data, serde_json::to_string_pretty(&pruned)?)
        .with_context(|| format!("failed to write snapshot {}", cli.data.display()))?;

    if !report.success {
        bail!(
            "cleanup aborted: {}",
            report.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    Ok(())
}
