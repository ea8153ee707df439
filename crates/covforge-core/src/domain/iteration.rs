//! Per-iteration records kept by the convergence controller.

use super::coverage::CoverageSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of one Measuring/Analyzing round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IterationRecord {
    /// 1-indexed iteration number.
    pub iteration_index: u32,

    pub snapshot: CoverageSnapshot,

    /// Artifacts newly generated for this round, regenerations included.
    pub artifacts_generated_this_round: usize,

    /// Gap-analysis strategies that shaped this round's artifacts.
    pub strategies_applied: BTreeSet<String>,

    #[serde(default)]
    pub artifacts_compiled: usize,

    #[serde(default)]
    pub artifacts_abandoned: usize,

    pub recorded_at: DateTime<Utc>,
}

/// Append-only ordered sequence of iteration records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IterationHistory {
    records: Vec<IterationRecord>,
}

impl IterationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: IterationRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&IterationRecord> {
        self.records.last()
    }

    /// Coverage percentages in iteration order.
    pub fn percentages(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.snapshot.percentage).collect()
    }

    /// Best percentage reached so far.
    pub fn best_percentage(&self) -> f64 {
        self.percentages().into_iter().fold(0.0, f64::max)
    }
}
