//! Persisted run artifacts: `history.json` with its digest, per-iteration
//! `snapshot.json`, and the `coverage_summary.md` report.

use crate::controller::layout::{IterationLayout, SNAPSHOT_FILE};
use crate::controller::ConvergenceReport;
use crate::domain::{CoverageSnapshot, CovforgeError, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Lowercase sha256 hex of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Persist `history.json` and `history.digest` under the layout root.
pub fn write_history(layout: &IterationLayout, report: &ConvergenceReport) -> Result<PathBuf> {
    std::fs::create_dir_all(layout.root())?;
    let json = serde_json::to_vec_pretty(report)?;
    let path = layout.history_path();
    std::fs::write(&path, &json)?;
    std::fs::write(layout.digest_path(), content_digest(&json))?;
    Ok(path)
}

/// Read `history.json`, verifying it against `history.digest`.
pub fn read_history(layout: &IterationLayout) -> Result<ConvergenceReport> {
    let json = std::fs::read(layout.history_path())?;
    let expected = std::fs::read_to_string(layout.digest_path())?;
    let actual = content_digest(&json);
    if expected.trim() != actual {
        return Err(CovforgeError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}

pub fn write_snapshot(iteration_dir: &Path, snapshot: &CoverageSnapshot) -> Result<PathBuf> {
    std::fs::create_dir_all(iteration_dir)?;
    let path = iteration_dir.join(SNAPSHOT_FILE);
    std::fs::write(&path, serde_json::to_vec_pretty(snapshot)?)?;
    Ok(path)
}

/// Render the markdown summary written next to the history.
pub fn render_coverage_summary_md(report: &ConvergenceReport) -> String {
    let mut out = String::new();
    out.push_str("# Coverage Summary\n\n");
    out.push_str(&format!("- run: `{}`\n", report.run_id));
    out.push_str(&format!("- outcome: **{}**\n", report.outcome));
    out.push_str(&format!("- iterations: {}\n", report.history.len()));
    out.push_str(&format!(
        "- best line coverage: {:.2}%\n\n",
        report.history.best_percentage()
    ));

    if report.history.is_empty() {
        out.push_str("No iteration was measured.\n");
        return out;
    }

    out.push_str("## Iterations\n\n");
    out.push_str("| # | lines | functions | generated | compiled | abandoned | strategies |\n");
    out.push_str("|---|-------|-----------|-----------|----------|-----------|------------|\n");
    for record in report.history.records() {
        let s = &record.snapshot;
        let strategies: Vec<&str> = record.strategies_applied.iter().map(String::as_str).collect();
        out.push_str(&format!(
            "| {} | {:.2}% ({}/{}) | {:.2}% ({}/{}) | {} | {} | {} | {} |\n",
            record.iteration_index,
            s.percentage,
            s.lines_covered,
            s.lines_total,
            s.function_percentage(),
            s.functions_covered,
            s.functions_total,
            record.artifacts_generated_this_round,
            record.artifacts_compiled,
            record.artifacts_abandoned,
            if strategies.is_empty() {
                "-".to_string()
            } else {
                strategies.join(", ")
            }
        ));
    }

    if let Some(last) = report.history.last() {
        if !last.snapshot.uncovered_lines.is_empty() {
            out.push_str("\n## Uncovered Sample\n\n");
            for line in &last.snapshot.uncovered_lines {
                out.push_str(&format!("- `{}:{}` `{}`\n", line.file, line.line, line.code.trim()));
            }
        }
    }
    out
}

pub fn write_summary(layout: &IterationLayout, report: &ConvergenceReport) -> Result<PathBuf> {
    let path = layout.summary_path();
    std::fs::write(&path, render_coverage_summary_md(report))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Outcome;
    use crate::domain::{IterationHistory, IterationRecord, UncoveredLine};
    use chrono::Utc;

    fn report() -> ConvergenceReport {
        let mut history = IterationHistory::new();
        let mut snapshot = CoverageSnapshot::new(412, 1000);
        snapshot.uncovered_lines.push(UncoveredLine {
            file: "/p/src/box.cpp".to_string(),
            line: 17,
            code: "  if (v > 10) {".to_string(),
        });
        history.push(IterationRecord {
            iteration_index: 1,
            snapshot,
            artifacts_generated_this_round: 8,
            strategies_applied: Default::default(),
            artifacts_compiled: 7,
            artifacts_abandoned: 1,
            recorded_at: Utc::now(),
        });
        ConvergenceReport {
            run_id: "run-1".to_string(),
            outcome: Outcome::Exhausted,
            history,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_history_digest_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = IterationLayout::new(tmp.path());
        let report = report();
        write_history(&layout, &report).unwrap();
        let digest = std::fs::read_to_string(layout.digest_path()).unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(read_history(&layout).unwrap(), report);
    }

    #[test]
    fn test_tampered_history_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = IterationLayout::new(tmp.path());
        write_history(&layout, &report()).unwrap();
        let text = std::fs::read_to_string(layout.history_path()).unwrap();
        std::fs::write(layout.history_path(), text.replace("412", "999")).unwrap();
        let err = read_history(&layout).unwrap_err();
        assert!(matches!(err, CovforgeError::DigestMismatch { .. }));
    }

    #[test]
    fn test_summary_markdown() {
        let md = render_coverage_summary_md(&report());
        assert!(md.contains("- outcome: **exhausted**"));
        assert!(md.contains("| 1 | 41.20% (412/1000) |"));
        assert!(md.contains("| 8 | 7 | 1 | - |"));
        assert!(md.contains("- `/p/src/box.cpp:17` `if (v > 10) {`"));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            content_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
