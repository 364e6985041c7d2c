//! fieldsync command line
//!
//! Inspects and drives the offline store of a field device:
//!   fieldsync --config fieldsync.json status
//!   fieldsync --config fieldsync.json sync
//!
//! The bearer token for the remote service is read from `FIELDSYNC_TOKEN`.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fieldsync_cli::{collect_status, load_config, render_queue, render_status, render_sync};
use fieldsync_storage::OperationQueue;
use fieldsync_sync::{CredentialProvider, FieldSync, NoCredentials, StaticToken};
use fieldsync_types::EntityType;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "fieldsync")]
#[command(about = "Offline store and sync queue inspector")]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print machine-readable JSON instead of tables
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connectivity plus record and queue counts per entity type
    Status,
    /// List queued operations in replay order
    Queue,
    /// List records of one entity type
    Records {
        entity_type: EntityType,
        /// Read the local store only, even when online
        #[arg(long)]
        local: bool,
    },
    /// Probe the remote and report reachability
    Probe,
    /// Replay the queue against the remote, in dependency order
    Sync,
    /// Drop every queued operation without replaying it
    ClearQueue {
        /// Confirm the queue should be dropped
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = load_config(args.config.as_deref())?;
    debug!("Using database {}", config.database_path.display());

    let credentials: Arc<dyn CredentialProvider> = match StaticToken::from_env() {
        Some(token) => Arc::new(token),
        None => {
            info!("FIELDSYNC_TOKEN not set, calling the remote without credentials");
            Arc::new(NoCredentials)
        }
    };
    let sync = FieldSync::open(&config, credentials)
        .await
        .context("Failed to open fieldsync")?;

    match args.command {
        Command::Status => {
            let status = collect_status(&sync).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", render_status(&status));
            }
        }
        Command::Queue => {
            let mut ops = sync.store().list_all().await.context("Failed to read queue")?;
            fieldsync_types::sort_for_replay(&mut ops);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&ops)?);
            } else {
                print!("{}", render_queue(&ops));
            }
        }
        Command::Records { entity_type, local } => {
            let records = if local {
                fieldsync_storage::RecordStore::get_all(sync.store().as_ref(), entity_type)
                    .await
                    .context("Failed to read local store")?
            } else {
                sync.service(entity_type)?
                    .get_all()
                    .await
                    .with_context(|| format!("Failed to list {entity_type} records"))?
            };
            if args.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in &records {
                    println!("{}", serde_json::to_string(record)?);
                }
                eprintln!("{} {} records", records.len(), entity_type);
            }
        }
        Command::Probe => {
            if config.connectivity.probe_url.is_none() {
                bail!("No connectivity.probe_url configured");
            }
            let reachable = sync.monitor().poll_once().await;
            println!("{}", if reachable { "reachable" } else { "unreachable" });
        }
        Command::Sync => {
            if !sync.monitor().is_online() {
                bail!("Remote is unreachable; operations stay queued");
            }
            let report = sync.sync_all().await.context("Sync failed")?;
            print!("{}", render_sync(&report));
            if !report.is_clean() {
                bail!("{} operations failed and remain queued", report.totals().errors);
            }
        }
        Command::ClearQueue { yes } => {
            if !yes {
                bail!("Refusing to drop the queue without --yes");
            }
            let dropped = sync.store().clear().await.context("Failed to clear queue")?;
            println!("Dropped {} queued operations", dropped);
        }
    }

    Ok(())
}
