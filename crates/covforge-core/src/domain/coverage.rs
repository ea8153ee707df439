//! Normalized coverage snapshots.

use serde::{Deserialize, Serialize};

/// A source line that was never executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct UncoveredLine {
    pub file: String,
    pub line: u32,
    pub code: String,
}

/// Line and function execution counters for one iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoverageSnapshot {
    pub lines_covered: u64,
    pub lines_total: u64,
    pub functions_covered: u64,
    pub functions_total: u64,

    /// Bounded sample of uncovered lines, ordered by file then line.
    pub uncovered_lines: Vec<UncoveredLine>,

    /// Names of functions never called (bounded sample).
    #[serde(default)]
    pub uncovered_functions: Vec<String>,

    /// Derived from the line counters; see [`CoverageSnapshot::recompute`].
    pub percentage: f64,
}

impl CoverageSnapshot {
    pub fn new(lines_covered: u64, lines_total: u64) -> Self {
        let mut snapshot = Self {
            lines_covered,
            lines_total,
            ..Default::default()
        };
        snapshot.recompute();
        snapshot
    }

    /// All-zero snapshot used when nothing could be measured.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Recompute `percentage` from the raw line counters.
    pub fn recompute(&mut self) {
        self.percentage = if self.lines_total == 0 {
            0.0
        } else {
            100.0 * self.lines_covered as f64 / self.lines_total as f64
        };
    }

    pub fn function_percentage(&self) -> f64 {
        if self.functions_total == 0 {
            0.0
        } else {
            100.0 * self.functions_covered as f64 / self.functions_total as f64
        }
    }

    /// Whether the snapshot carries no measurement at all.
    pub fn is_empty(&self) -> bool {
        self.lines_total == 0 && self.functions_total == 0
    }

    /// Distinct files mentioned in the uncovered sample.
    pub fn uncovered_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self.uncovered_lines.iter().map(|l| l.file.as_str()).collect();
        files.dedup();
        files
    }
}
