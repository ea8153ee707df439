//! Domain types shared by every covforge stage.

pub mod artifact;
pub mod coverage;
pub mod error;
pub mod iteration;
pub mod model;
pub mod source;

pub use artifact::{sanitize_identifier, Recipe, ScenarioKind, TargetRef, TestArtifact};
pub use coverage::{CoverageSnapshot, UncoveredLine};
pub use error::{CovforgeError, ExtractionError, Result};
pub use iteration::{IterationHistory, IterationRecord};
pub use model::{
    AccessLevel, ClassKey, ClassModel, FreeFunction, MethodFlags, MethodModel, ModelTable,
    ParameterSpec,
};
pub use source::{SourceRole, SourceUnit};
