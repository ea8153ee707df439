//! Which scenarios to emit, and which gap strategies a refinement round uses.

use crate::config::{CompletionConfig, SynthesisConfig};
use crate::domain::{ScenarioKind, UncoveredLine};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Gap-analysis strategy named in iteration records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum GapStrategy {
    Branch,
    Path,
    Boundary,
    EdgeCase,
    Completion,
}

impl GapStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            GapStrategy::Branch => "branch",
            GapStrategy::Path => "path",
            GapStrategy::Boundary => "boundary",
            GapStrategy::EdgeCase => "edge_case",
            GapStrategy::Completion => "completion",
        }
    }
}

/// Uncovered branch statements in one file beyond which `path` applies.
const PATH_BRANCH_THRESHOLD: usize = 3;

fn is_branch_statement(code: &str) -> bool {
    static_regex!(r"\b(if|else|switch|case|default|try|catch|for|while|do)\b").is_match(code)
        || code.contains('?')
}

fn has_comparison(code: &str) -> bool {
    static_regex!(r"\s(?:<=|>=|==|!=|<|>)\s").is_match(code)
}

/// Strategies suggested by a sample of uncovered lines.
///
/// `edge_case` is always present; `completion` is added by the caller
/// when a completion body was actually used.
pub fn derive_strategies(uncovered: &[UncoveredLine]) -> BTreeSet<GapStrategy> {
    let mut strategies = BTreeSet::from([GapStrategy::EdgeCase]);
    let mut branches_per_file: BTreeMap<&str, usize> = BTreeMap::new();
    for line in uncovered {
        if is_branch_statement(&line.code) {
            strategies.insert(GapStrategy::Branch);
            *branches_per_file.entry(line.file.as_str()).or_default() += 1;
        }
        if has_comparison(&line.code) {
            strategies.insert(GapStrategy::Boundary);
        }
    }
    if branches_per_file.values().any(|n| *n > PATH_BRANCH_THRESHOLD) {
        strategies.insert(GapStrategy::Path);
    }
    strategies
}

/// Generator settings derived from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySet {
    kinds: BTreeSet<ScenarioKind>,
    pub include_free_functions: bool,

    /// Refinement rounds may ask the completion collaborator for bodies.
    pub use_completion: bool,

    /// Constructor scenarios are skipped above this parameter count.
    pub constructor_param_ceiling: usize,
}

impl Default for StrategySet {
    fn default() -> Self {
        Self::from_config(&SynthesisConfig::default(), &CompletionConfig::default())
    }
}

impl StrategySet {
    pub fn from_config(synthesis: &SynthesisConfig, completion: &CompletionConfig) -> Self {
        let kinds = if synthesis.scenario_kinds.is_empty() {
            ScenarioKind::INSTANCE
                .iter()
                .chain(ScenarioKind::CONSTRUCTOR.iter())
                .chain(ScenarioKind::STATIC.iter())
                .copied()
                .collect()
        } else {
            synthesis.scenario_kinds.iter().copied().collect()
        };
        Self {
            kinds,
            include_free_functions: synthesis.include_free_functions,
            use_completion: completion.enabled,
            constructor_param_ceiling: synthesis.constructor_param_ceiling,
        }
    }

    pub fn enables(&self, kind: ScenarioKind) -> bool {
        kind == ScenarioKind::Generated || self.kinds.contains(&kind)
    }

    /// Keep only enabled kinds, preserving order.
    pub fn filter(&self, kinds: Vec<ScenarioKind>) -> Vec<ScenarioKind> {
        kinds.into_iter().filter(|k| self.enables(*k)).collect()
    }
}
