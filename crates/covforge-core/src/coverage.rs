//! Normalizes gcov and lcov output into a [`CoverageSnapshot`].
//!
//! Line-level data from annotated listings and `DA:` records is merged per
//! `(file, line)` keeping the highest hit count, so the per-artifact reports
//! of one iteration never double count a line.

use crate::domain::{CoverageSnapshot, UncoveredLine};
use crate::harness::RawCoverage;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Paths containing any of these are ignored.
pub const DEFAULT_EXCLUDES: [&str; 3] = ["/usr/", "gtest", "googletest"];

/// Builds snapshots from raw coverage output.
#[derive(Debug, Clone)]
pub struct CoverageModelBuilder {
    exclude: Vec<String>,
    sample: usize,
}

impl Default for CoverageModelBuilder {
    fn default() -> Self {
        Self::new(Vec::new(), 20)
    }
}

impl CoverageModelBuilder {
    /// `exclude` extends [`DEFAULT_EXCLUDES`]; `sample` caps the uncovered lists.
    pub fn new(exclude: Vec<String>, sample: usize) -> Self {
        let mut patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        patterns.extend(exclude);
        Self {
            exclude: patterns,
            sample,
        }
    }

    pub fn build(&self, raw: &RawCoverage) -> CoverageSnapshot {
        self.merge(std::iter::once(raw))
    }

    /// Merge several raw reports into one snapshot.
    pub fn merge<'a>(&self, raws: impl IntoIterator<Item = &'a RawCoverage>) -> CoverageSnapshot {
        let mut acc = Accumulator::default();
        for raw in raws {
            self.ingest(&mut acc, raw);
        }
        if !acc.parsed_any {
            warn!(event = "coverage.parse_failure", "no parseable coverage data");
            return CoverageSnapshot::empty();
        }
        self.finish(acc)
    }

    fn excluded(&self, file: &str) -> bool {
        self.exclude.iter().any(|p| !p.is_empty() && file.contains(p.as_str()))
    }

    fn ingest(&self, acc: &mut Accumulator, raw: &RawCoverage) {
        self.ingest_summary(acc, &raw.summary);
        for (name, text) in &raw.annotated {
            self.ingest_annotated(acc, name, text);
        }
        if let Some(lcov) = &raw.lcov {
            self.ingest_lcov(acc, lcov);
        }
    }

    /// `File 'x'` followed by `Lines executed:NN.NN% of M`.
    fn ingest_summary(&self, acc: &mut Accumulator, text: &str) {
        let mut current: Option<String> = None;
        for line in text.lines() {
            let line = line.trim();
            if let Some(caps) = static_regex!(r"^File '(.+)'$").captures(line) {
                current = Some(caps[1].to_string());
                continue;
            }
            let Some(caps) = static_regex!(r"^Lines executed:\s*([0-9.]+)% of (\d+)").captures(line)
            else {
                continue;
            };
            let Some(file) = current.take() else {
                continue;
            };
            if self.excluded(&file) {
                continue;
            }
            let (Ok(pct), Ok(total)) = (caps[1].parse::<f64>(), caps[2].parse::<u64>()) else {
                continue;
            };
            let covered = ((pct / 100.0) * total as f64).round() as u64;
            acc.parsed_any = true;
            keep_best(&mut acc.line_summaries, file, (covered.min(total), total));
        }
    }

    /// gcov `count:line:code` listing.
    fn ingest_annotated(&self, acc: &mut Accumulator, name: &str, text: &str) {
        let mut file = name.trim_end_matches(".gcov").to_string();
        for raw_line in text.lines() {
            if let Some(caps) = static_regex!(r"^function (\S+) called (\d+)").captures(raw_line) {
                if self.excluded(&file) {
                    continue;
                }
                let count: u64 = caps[2].parse().unwrap_or(0);
                acc.parsed_any = true;
                let slot = acc.functions.entry((file.clone(), caps[1].to_string())).or_insert(0);
                *slot = (*slot).max(count);
                continue;
            }
            let mut parts = raw_line.splitn(3, ':');
            let (Some(count), Some(number), Some(code)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let count = count.trim();
            let Ok(number) = number.trim().parse::<u32>() else {
                continue;
            };
            if number == 0 {
                if let Some(path) = code.strip_prefix("Source:") {
                    file = path.trim().to_string();
                }
                continue;
            }
            if count == "-" || self.excluded(&file) {
                continue;
            }
            let hits = if count.starts_with("#####") || count.starts_with("=====") {
                0
            } else {
                match count.trim_end_matches('*').parse::<u64>() {
                    Ok(n) => n,
                    Err(_) => continue,
                }
            };
            acc.parsed_any = true;
            acc.record_line(&file, number, hits, Some(code.trim()));
        }
    }

    /// lcov tracefile records.
    fn ingest_lcov(&self, acc: &mut Accumulator, text: &str) {
        let mut file: Option<String> = None;
        let mut saw_da = false;
        let mut saw_fnda = false;
        let mut lines = (0u64, 0u64);
        let mut functions = (0u64, 0u64);
        for line in text.lines() {
            let line = line.trim();
            let (tag, value) = line.split_once(':').unwrap_or((line, ""));
            let active = file.as_deref().filter(|f| !self.excluded(f)).map(str::to_string);
            match tag {
                "SF" => {
                    file = Some(value.to_string());
                    saw_da = false;
                    saw_fnda = false;
                    lines = (0, 0);
                    functions = (0, 0);
                }
                "DA" => {
                    let Some(f) = active else { continue };
                    let mut fields = value.split(',');
                    let (Some(Ok(number)), Some(Ok(hits))) = (
                        fields.next().map(|v| v.trim().parse::<u32>()),
                        fields.next().map(|v| v.trim().parse::<u64>()),
                    ) else {
                        continue;
                    };
                    saw_da = true;
                    acc.parsed_any = true;
                    acc.record_line(&f, number, hits, None);
                }
                "FNDA" => {
                    let Some(f) = active else { continue };
                    let Some((count, name)) = value.split_once(',') else {
                        continue;
                    };
                    let count: u64 = count.trim().parse().unwrap_or(0);
                    saw_fnda = true;
                    acc.parsed_any = true;
                    let slot = acc.functions.entry((f, name.to_string())).or_insert(0);
                    *slot = (*slot).max(count);
                }
                "LH" => lines.0 = value.trim().parse().unwrap_or(0),
                "LF" => lines.1 = value.trim().parse().unwrap_or(0),
                "FNH" => functions.0 = value.trim().parse().unwrap_or(0),
                "FNF" => functions.1 = value.trim().parse().unwrap_or(0),
                "end_of_record" => {
                    if let Some(f) = active {
                        if !saw_da && lines.1 > 0 {
                            acc.parsed_any = true;
                            keep_best(&mut acc.line_summaries, f.clone(), lines);
                        }
                        if !saw_fnda && functions.1 > 0 {
                            acc.parsed_any = true;
                            keep_best(&mut acc.function_summaries, f, functions);
                        }
                    }
                    file = None;
                }
                _ => {}
            }
        }
    }

    fn finish(&self, acc: Accumulator) -> CoverageSnapshot {
        let mut snapshot = CoverageSnapshot::default();

        // Files with line-level data take precedence over their summaries.
        for lines in acc.lines.values() {
            snapshot.lines_total += lines.len() as u64;
            snapshot.lines_covered += lines.values().filter(|h| h.count > 0).count() as u64;
        }
        for (file, (covered, total)) in &acc.line_summaries {
            if !acc.lines.contains_key(file) {
                snapshot.lines_covered += covered;
                snapshot.lines_total += total;
            }
        }

        let function_files: BTreeSet<&String> =
            acc.functions.keys().map(|(f, _)| f).collect();
        snapshot.functions_total = acc.functions.len() as u64;
        snapshot.functions_covered = acc.functions.values().filter(|c| **c > 0).count() as u64;
        for (file, (covered, total)) in &acc.function_summaries {
            if !function_files.contains(file) {
                snapshot.functions_covered += covered;
                snapshot.functions_total += total;
            }
        }

        snapshot.uncovered_lines = acc
            .lines
            .iter()
            .flat_map(|(file, lines)| {
                lines.iter().filter(|(_, h)| h.count == 0).map(|(n, h)| UncoveredLine {
                    file: file.clone(),
                    line: *n,
                    code: h.code.clone().unwrap_or_default(),
                })
            })
            .take(self.sample)
            .collect();
        snapshot.uncovered_functions = acc
            .functions
            .iter()
            .filter(|(_, c)| **c == 0)
            .map(|((_, name), _)| name.clone())
            .take(self.sample)
            .collect();
        snapshot.recompute();
        debug!(
            covered = snapshot.lines_covered,
            total = snapshot.lines_total,
            percentage = snapshot.percentage,
            "coverage snapshot built"
        );
        snapshot
    }
}

#[derive(Debug, Clone)]
struct LineHit {
    count: u64,
    code: Option<String>,
}

#[derive(Debug, Default)]
struct Accumulator {
    /// file → line → best hit.
    lines: BTreeMap<String, BTreeMap<u32, LineHit>>,

    /// (file, function) → best call count.
    functions: BTreeMap<(String, String), u64>,

    line_summaries: BTreeMap<String, (u64, u64)>,
    function_summaries: BTreeMap<String, (u64, u64)>,
    parsed_any: bool,
}

impl Accumulator {
    fn record_line(&mut self, file: &str, number: u32, hits: u64, code: Option<&str>) {
        let entry = self
            .lines
            .entry(file.to_string())
            .or_default()
            .entry(number)
            .or_insert(LineHit { count: 0, code: None });
        entry.count = entry.count.max(hits);
        if entry.code.is_none() {
            entry.code = code.map(str::to_string);
        }
    }
}

/// Keep the report with the most covered units for a file.
fn keep_best(map: &mut BTreeMap<String, (u64, u64)>, file: String, report: (u64, u64)) {
    let slot = map.entry(file).or_insert(report);
    if report.0 > slot.0 {
        *slot = report;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANNOTATED_A: &str = "        -:    0:Source:/p/src/box.cpp
        -:    1:#include \"box.h\"
function _ZN3Box8getValueEv called 2 returned 100% blocks executed 100%
        2:    3:int Box::getValue() {
        2:    4:    if (value_ > 10) {
    #####:    5:        return 10;
        -:    6:    }
       2*:    7:    return value_;
function _ZN3Box5resetEv called 0 returned 0% blocks executed 0%
    #####:    9:void Box::reset() { value_ = 0; }
";

    const ANNOTATED_B: &str = "        -:    0:Source:/p/src/box.cpp
        1:    3:int Box::getValue() {
        1:    4:    if (value_ > 10) {
        1:    5:        return 10;
    =====:    7:    return value_;
    #####:    9:void Box::reset() { value_ = 0; }
";

    fn annotated(text: &str) -> RawCoverage {
        RawCoverage {
            annotated: vec![("box.cpp.gcov".to_string(), text.to_string())],
            ..Default::default()
        }
    }

    #[test]
    fn test_annotated_listing() {
        let snapshot = CoverageModelBuilder::default().build(&annotated(ANNOTATED_A));
        assert_eq!(snapshot.lines_total, 5);
        assert_eq!(snapshot.lines_covered, 3);
        assert_eq!(snapshot.percentage, 60.0);
        assert_eq!(snapshot.functions_total, 2);
        assert_eq!(snapshot.functions_covered, 1);
        assert_eq!(snapshot.uncovered_functions, vec!["_ZN3Box5resetEv"]);
        assert_eq!(snapshot.uncovered_lines[0].line, 5);
        assert_eq!(snapshot.uncovered_lines[0].code, "return 10;");
        assert_eq!(snapshot.uncovered_lines[0].file, "/p/src/box.cpp");
    }

    #[test]
    fn test_merge_takes_max_per_line() {
        let builder = CoverageModelBuilder::default();
        let snapshot = builder.merge([&annotated(ANNOTATED_A), &annotated(ANNOTATED_B)]);
        assert_eq!(snapshot.lines_total, 5);
        assert_eq!(snapshot.lines_covered, 4);
        assert_eq!(snapshot.uncovered_lines.len(), 1);
        assert_eq!(snapshot.uncovered_lines[0].line, 9);
    }

    #[test]
    fn test_lcov_records() {
        let raw = RawCoverage {
            lcov: Some(
                "TN:\nSF:/p/src/a.cpp\nFNDA:3,foo\nFNDA:0,bar\nDA:1,3\nDA:2,0\nDA:3,1\nLH:2\nLF:3\nend_of_record\nSF:/usr/include/c++/vector\nDA:10,5\nend_of_record\nSF:/p/src/b.cpp\nLH:4\nLF:8\nFNH:1\nFNF:2\nend_of_record\n"
                    .to_string(),
            ),
            ..Default::default()
        };
        let snapshot = CoverageModelBuilder::default().build(&raw);
        assert_eq!(snapshot.lines_total, 3 + 8);
        assert_eq!(snapshot.lines_covered, 2 + 4);
        assert_eq!(snapshot.functions_total, 2 + 2);
        assert_eq!(snapshot.functions_covered, 1 + 1);
        assert_eq!(snapshot.uncovered_lines.len(), 1);
    }

    #[test]
    fn test_summary_only_keeps_best_per_file() {
        let summary = "File '/p/src/a.cpp'\nLines executed:50.00% of 10\nCreating 'a.cpp.gcov'\n\nFile '/usr/include/c++/11/iostream'\nLines executed:100.00% of 1\n\nFile '/p/src/b.cpp'\nLines executed:25.00% of 4\n";
        let better = "File '/p/src/a.cpp'\nLines executed:80.00% of 10\n";
        let builder = CoverageModelBuilder::default();
        let first = RawCoverage {
            summary: summary.to_string(),
            ..Default::default()
        };
        let second = RawCoverage {
            summary: better.to_string(),
            ..Default::default()
        };
        let snapshot = builder.merge([&first, &second]);
        assert_eq!(snapshot.lines_total, 14);
        assert_eq!(snapshot.lines_covered, 8 + 1);
    }

    #[test]
    fn test_exclusions_and_parse_failure() {
        let builder = CoverageModelBuilder::new(vec!["/out/".to_string()], 20);
        let raw = RawCoverage {
            annotated: vec![(
                "t.cpp.gcov".to_string(),
                "        -:    0:Source:/out/iter-001/t.cpp\n        1:    3:TEST(A, B) {\n".to_string(),
            )],
            ..Default::default()
        };
        let snapshot = builder.build(&raw);
        assert_eq!(snapshot, CoverageSnapshot::empty());

        let garbage = RawCoverage {
            summary: "nothing useful here".to_string(),
            ..Default::default()
        };
        assert_eq!(builder.build(&garbage).percentage, 0.0);
    }

    #[test]
    fn test_sample_cap_and_order() {
        let mut text = String::from("        -:    0:Source:/p/z.cpp\n");
        for n in 1..=30 {
            text.push_str(&format!("    #####:{:>5}:x();\n", n));
        }
        let builder = CoverageModelBuilder::new(Vec::new(), 20);
        let snapshot = builder.merge([
            &annotated(&text),
            &annotated("        -:    0:Source:/p/a.cpp\n    #####:    7:y();\n"),
        ]);
        assert_eq!(snapshot.uncovered_lines.len(), 20);
        assert_eq!(snapshot.uncovered_lines[0].file, "/p/a.cpp");
        assert_eq!(snapshot.uncovered_lines[1].line, 1);
        assert_eq!(snapshot.lines_total, 31);
    }
}
