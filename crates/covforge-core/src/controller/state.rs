//! Convergence states, terminal outcomes and stop rules.

use crate::config::ConvergenceConfig;
use crate::domain::IterationHistory;
use serde::{Deserialize, Serialize};

/// Controller phase, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Measuring,
    Analyzing,
    Iterating,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Measuring => "measuring",
            Phase::Analyzing => "analyzing",
            Phase::Iterating => "iterating",
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Outcome {
    Satisfied,
    Plateaued,
    Exhausted,
    Fatal { reason: String },
}

impl Outcome {
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Satisfied => "satisfied",
            Outcome::Plateaued => "plateaued",
            Outcome::Exhausted => "exhausted",
            Outcome::Fatal { .. } => "fatal",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Fatal { .. })
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Fatal { reason } => write!(f, "fatal: {}", reason),
            other => f.write_str(other.name()),
        }
    }
}

/// Population variance; 0 for fewer than two values.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Decides whether the loop stops after an iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct StopPolicy {
    pub target_coverage: f64,
    pub max_iterations: u32,
    pub plateau_window: usize,
    pub plateau_variance: f64,
}

impl From<&ConvergenceConfig> for StopPolicy {
    fn from(config: &ConvergenceConfig) -> Self {
        Self {
            target_coverage: config.target_coverage,
            max_iterations: config.max_iterations,
            plateau_window: config.plateau_window,
            plateau_variance: config.plateau_variance,
        }
    }
}

impl StopPolicy {
    /// Terminal outcome after iteration `iteration` (1-indexed), if any.
    ///
    /// Checked in order: target reached, plateau, iteration budget.
    pub fn evaluate(&self, history: &IterationHistory, iteration: u32) -> Option<Outcome> {
        let percentages = history.percentages();
        let latest = percentages.last().copied()?;
        if latest >= self.target_coverage {
            return Some(Outcome::Satisfied);
        }
        if self.plateau_window >= 2 && percentages.len() >= self.plateau_window {
            let window = &percentages[percentages.len() - self.plateau_window..];
            if population_variance(window) < self.plateau_variance {
                return Some(Outcome::Plateaued);
            }
        }
        if iteration >= self.max_iterations {
            return Some(Outcome::Exhausted);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CoverageSnapshot, IterationRecord};
    use chrono::Utc;

    fn history(percentages: &[f64]) -> IterationHistory {
        let mut history = IterationHistory::new();
        for (i, pct) in percentages.iter().enumerate() {
            let mut snapshot = CoverageSnapshot::new(0, 1000);
            snapshot.percentage = *pct;
            history.push(IterationRecord {
                iteration_index: i as u32 + 1,
                snapshot,
                artifacts_generated_this_round: 0,
                strategies_applied: Default::default(),
                artifacts_compiled: 0,
                artifacts_abandoned: 0,
                recorded_at: Utc::now(),
            });
        }
        history
    }

    fn policy(max_iterations: u32) -> StopPolicy {
        StopPolicy {
            target_coverage: 80.0,
            max_iterations,
            plateau_window: 3,
            plateau_variance: 1.0,
        }
    }

    #[test]
    fn test_population_variance() {
        assert_eq!(population_variance(&[]), 0.0);
        assert_eq!(population_variance(&[5.0]), 0.0);
        let v = population_variance(&[40.0, 41.0, 40.5]);
        assert!((v - 1.0 / 6.0).abs() < 1e-9);
        assert_eq!(population_variance(&[2.0, 4.0]), 1.0);
    }

    #[test]
    fn test_plateau_at_third_iteration() {
        let p = policy(10);
        assert_eq!(p.evaluate(&history(&[40.0]), 1), None);
        assert_eq!(p.evaluate(&history(&[40.0, 41.0]), 2), None);
        assert_eq!(
            p.evaluate(&history(&[40.0, 41.0, 40.5]), 3),
            Some(Outcome::Plateaued)
        );
    }

    #[test]
    fn test_rising_coverage_is_not_a_plateau() {
        let p = policy(10);
        assert_eq!(p.evaluate(&history(&[10.0, 30.0, 50.0]), 3), None);
    }

    #[test]
    fn test_satisfied_wins_over_plateau() {
        let p = policy(10);
        assert_eq!(
            p.evaluate(&history(&[80.0, 80.0, 80.0]), 3),
            Some(Outcome::Satisfied)
        );
    }

    #[test]
    fn test_exhausted_at_budget() {
        let p = policy(2);
        assert_eq!(p.evaluate(&history(&[10.0, 40.0]), 2), Some(Outcome::Exhausted));
        assert_eq!(p.evaluate(&IterationHistory::new(), 1), None);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&Outcome::Fatal {
            reason: "nothing compiled".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"state":"fatal","reason":"nothing compiled"}"#);
        assert_eq!(Outcome::Plateaued.to_string(), "plateaued");
    }
}
