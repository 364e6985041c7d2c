//! Sync outcome tallies.

use fieldsync_types::EntityType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate result of one orchestrator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Operations confirmed by the remote and removed from the queue.
    pub synced: usize,
    /// Operations that failed and remain queued.
    pub errors: usize,
    /// Operations considered in this run.
    pub total: usize,
}

impl SyncReport {
    /// Creates an empty report for a run over `total` operations.
    pub fn new(total: usize) -> Self {
        Self {
            synced: 0,
            errors: 0,
            total,
        }
    }

    /// Returns true if every operation in the run was confirmed.
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} synced", self.synced, self.total)?;
        if self.errors > 0 {
            write!(f, ", {} failed", self.errors)?;
        }
        Ok(())
    }
}

/// What happened to one entity type during a coordinated sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityOutcome {
    /// The orchestrator ran.
    Synced(SyncReport),
    /// Not attempted because a dependency did not sync cleanly.
    Skipped { blocked_by: EntityType },
    /// The orchestrator itself failed (storage unreachable, went offline).
    Failed(String),
}

/// Result of a coordinated sync across entity types, in run order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorReport {
    pub outcomes: Vec<(EntityType, EntityOutcome)>,
}

impl CoordinatorReport {
    /// Sums the per-entity reports.
    pub fn totals(&self) -> SyncReport {
        self.outcomes
            .iter()
            .fold(SyncReport::default(), |mut acc, (_, outcome)| {
                if let EntityOutcome::Synced(report) = outcome {
                    acc.synced += report.synced;
                    acc.errors += report.errors;
                    acc.total += report.total;
                }
                acc
            })
    }

    /// Outcome for one entity type, if it was part of the run.
    pub fn outcome(&self, entity_type: EntityType) -> Option<&EntityOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| *t == entity_type)
            .map(|(_, o)| o)
    }

    /// Returns true if every entity type synced without errors.
    pub fn is_clean(&self) -> bool {
        self.outcomes
            .iter()
            .all(|(_, o)| matches!(o, EntityOutcome::Synced(r) if r.is_clean()))
    }
}
