//! Generated test artifacts.

use crate::synth::ParamMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Named kind of test case applied to a method.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    // Instance methods
    BasicUsage,
    MultipleInvocations,
    EdgeCases,
    BoundaryCheck,
    Consistency,
    NoThrow,

    // Constructors
    BasicConstruction,
    MultipleInstances,
    StackAllocation,

    // Static methods and free functions
    ReturnValue,
    ConsistentResults,

    /// Body supplied by the text-completion collaborator.
    Generated,
}

impl ScenarioKind {
    /// Instance-method catalogue in emission order.
    pub const INSTANCE: [ScenarioKind; 6] = [
        ScenarioKind::BasicUsage,
        ScenarioKind::MultipleInvocations,
        ScenarioKind::EdgeCases,
        ScenarioKind::BoundaryCheck,
        ScenarioKind::Consistency,
        ScenarioKind::NoThrow,
    ];

    pub const CONSTRUCTOR: [ScenarioKind; 3] = [
        ScenarioKind::BasicConstruction,
        ScenarioKind::MultipleInstances,
        ScenarioKind::StackAllocation,
    ];

    /// Reduced catalogue for static methods and free functions.
    pub const STATIC: [ScenarioKind; 4] = [
        ScenarioKind::ReturnValue,
        ScenarioKind::NoThrow,
        ScenarioKind::MultipleInvocations,
        ScenarioKind::ConsistentResults,
    ];

    /// CamelCase suffix used in test names.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::BasicUsage => "BasicUsage",
            ScenarioKind::MultipleInvocations => "MultipleInvocations",
            ScenarioKind::EdgeCases => "EdgeCases",
            ScenarioKind::BoundaryCheck => "BoundaryCheck",
            ScenarioKind::Consistency => "Consistency",
            ScenarioKind::NoThrow => "NoThrow",
            ScenarioKind::BasicConstruction => "BasicConstruction",
            ScenarioKind::MultipleInstances => "MultipleInstances",
            ScenarioKind::StackAllocation => "StackAllocation",
            ScenarioKind::ReturnValue => "ReturnValue",
            ScenarioKind::ConsistentResults => "ConsistentResults",
            ScenarioKind::Generated => "Generated",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let all = Self::INSTANCE
            .iter()
            .chain(Self::CONSTRUCTOR.iter())
            .chain(Self::STATIC.iter())
            .chain(std::iter::once(&ScenarioKind::Generated));
        let wanted = name.replace(['_', '-'], "").to_ascii_lowercase();
        all.copied()
            .find(|k| k.name().to_ascii_lowercase() == wanted)
    }
}

impl std::fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single generated test translation unit.
///
/// Artifacts are never edited in place: a failed compile produces a new
/// artifact whose `parent_id` points at the one it replaces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestArtifact {
    /// Unique identifier, also used as the file stem and build directory name.
    pub id: String,

    /// Qualified class name; empty for free functions.
    pub class_name: String,

    pub method_name: String,

    pub scenario_kind: ScenarioKind,

    /// Complete C++ translation unit.
    pub source_text: String,

    /// Where the artifact is (or will be) written.
    pub file_path: PathBuf,

    /// 0 for an original artifact, n for the n-th regeneration.
    #[serde(default)]
    pub generation: u32,

    #[serde(default)]
    pub parent_id: Option<String>,

    /// Iteration that produced the artifact (0 for the initial set).
    #[serde(default)]
    pub iteration: u32,

    /// Stand-in headers the artifact includes, as `(file name, contents)`.
    #[serde(default)]
    pub support_files: Vec<(String, String)>,

    /// How the artifact was produced; drives regeneration.
    #[serde(default)]
    pub recipe: Option<Recipe>,
}

/// Which declaration an artifact exercises.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetRef {
    /// Index into the owning class's `methods` (constructors included).
    Member { index: usize },

    /// Index into the table's free functions.
    FreeFunction { index: usize },
}

/// Inputs needed to rebuild an artifact with different settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub target: TargetRef,
    pub mode: ParamMode,

    /// Reduced to setup plus a single no-throw call.
    #[serde(default)]
    pub minimal: bool,

    /// Id of the first artifact in the regeneration lineage.
    pub origin_id: String,
}

impl TestArtifact {
    /// Target label for logs: `Class::method` or `method`.
    pub fn target(&self) -> String {
        if self.class_name.is_empty() {
            self.method_name.clone()
        } else {
            format!("{}::{}", self.class_name, self.method_name)
        }
    }
}

/// Turn an arbitrary label into a C++/filesystem-safe identifier.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_').to_string();
    if trimmed.is_empty() {
        "anon".to_string()
    } else if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("t_{}", trimmed)
    } else {
        trimmed
    }
}
