//! Shared types and report rendering for the fieldsync command line.

use anyhow::{Context, Result};
use fieldsync_storage::{OperationQueue, RecordStore};
use fieldsync_sync::{CoordinatorReport, EntityOutcome, FieldSync, FieldSyncConfig};
use fieldsync_types::{EntityType, PendingOperation};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::Path;

/// Per-entity counts shown by `fieldsync status`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EntityStatus {
    pub entity_type: EntityType,
    pub records: usize,
    pub pending: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusReport {
    pub online: bool,
    pub entities: Vec<EntityStatus>,
}

/// Loads the config file, or defaults plus environment overrides when no
/// file is given.
pub fn load_config(path: Option<&Path>) -> Result<FieldSyncConfig> {
    match path {
        Some(path) => FieldSyncConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let mut config = FieldSyncConfig::default();
            config.apply_env_overrides();
            config.validate().context("Invalid default configuration")?;
            Ok(config)
        }
    }
}

/// Counts local records and queued operations for every served type, in
/// sync order.
pub async fn collect_status(sync: &FieldSync) -> Result<StatusReport> {
    let ops = sync.store().list_all().await.context("Failed to read queue")?;
    let mut entities = Vec::new();
    for entity_type in sync.coordinator().order() {
        let records = sync
            .store()
            .count(entity_type)
            .await
            .with_context(|| format!("Failed to count {entity_type} records"))?;
        let pending = ops
            .iter()
            .filter(|op| op.entity_type() == entity_type)
            .count();
        entities.push(EntityStatus {
            entity_type,
            records,
            pending,
        });
    }
    Ok(StatusReport {
        online: sync.monitor().is_online(),
        entities,
    })
}

pub fn render_status(status: &StatusReport) -> String {
    let mut out = String::new();
    let state = if status.online { "online" } else { "offline" };
    let _ = writeln!(out, "Connectivity: {state}");
    let _ = writeln!(out, "{:<12} {:>8} {:>8}", "ENTITY", "RECORDS", "PENDING");
    for e in &status.entities {
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>8}",
            e.entity_type.table_name(),
            e.records,
            e.pending
        );
    }
    out
}

pub fn render_queue(ops: &[PendingOperation]) -> String {
    if ops.is_empty() {
        return "Queue is empty\n".to_string();
    }
    let mut out = String::new();
    for op in ops {
        let target = op
            .record_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let marker = if op.processing { " (processing)" } else { "" };
        let _ = writeln!(
            out,
            "#{:<5} {:<22} {:<24} {}{}",
            op.id.to_string(),
            op.kind.to_string(),
            target,
            op.timestamp,
            marker
        );
    }
    out
}

pub fn render_sync(report: &CoordinatorReport) -> String {
    let mut out = String::new();
    for (entity_type, outcome) in &report.outcomes {
        let line = match outcome {
            EntityOutcome::Synced(r) => r.to_string(),
            EntityOutcome::Skipped { blocked_by } => format!("skipped (waiting on {blocked_by})"),
            EntityOutcome::Failed(e) => format!("failed: {e}"),
        };
        let _ = writeln!(out, "{:<12} {}", entity_type.table_name(), line);
    }
    let _ = writeln!(out, "Total: {}", report.totals());
    out
}
