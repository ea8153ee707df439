//! Test scenario generation.
//!
//! One [`ScenarioGenerator`], configured by a [`StrategySet`], turns the
//! model table and its instantiation plans into GoogleTest artifacts. It
//! also replaces artifacts that failed to compile and produces
//! gap-focused variants for refinement rounds.

pub mod render;
pub mod strategy;

pub use strategy::{derive_strategies, GapStrategy, StrategySet};

use crate::domain::{
    sanitize_identifier, AccessLevel, ClassModel, CoverageSnapshot, FreeFunction, MethodModel, ModelTable,
    Recipe, ScenarioKind, TargetRef, TestArtifact,
};
use crate::harness::diagnostic_summary;
use crate::plan::{InstantiationPlan, PlanCache, PlanStrategy};
use crate::synth::{decayed_category, is_comparable, is_numeric, ParamMode, ParameterSynthesizer};
use render::{call_body, construction_body, include_block, TranslationUnit};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Compiler messages no regeneration can work around.
const UNRECOVERABLE: &[&str] = &[
    "abstract type",
    "is abstract",
    "is private within this context",
    "is protected within this context",
    "use of deleted function",
];

/// Artifacts and strategies of one refinement round.
#[derive(Debug, Clone, Default)]
pub struct Refinement {
    pub artifacts: Vec<TestArtifact>,
    pub strategies: BTreeSet<GapStrategy>,

    /// Qualified names of the classes the round concentrated on.
    pub focus: Vec<String>,
}

/// A method offered to the completion collaborator.
#[derive(Debug, Clone)]
pub struct CompletionTarget {
    pub class: ClassModel,
    pub method_index: usize,

    /// Project header, relative to an include root.
    pub header: String,
}

impl CompletionTarget {
    pub fn method(&self) -> Option<&MethodModel> {
        self.class.methods.get(self.method_index)
    }
}

impl std::fmt::Display for CompletionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.method() {
            Some(m) => write!(f, "{}::{}", self.class.qualified_name(), m.name),
            None => write!(f, "{}", self.class.qualified_name()),
        }
    }
}

/// Hands out unique artifact ids, suffixing repeats with `_2`, `_3`, ...
#[derive(Debug, Default)]
struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    fn assign(&mut self, artifact: &mut TestArtifact) {
        if self.used.insert(artifact.id.clone()) {
            return;
        }
        let mut n = 2;
        let id = loop {
            let candidate = format!("{}_{}", artifact.id, n);
            if self.used.insert(candidate.clone()) {
                break candidate;
            }
            n += 1;
        };
        artifact.file_path = PathBuf::from(format!("{}.cpp", id));
        if let Some(recipe) = artifact.recipe.as_mut() {
            recipe.origin_id = id.clone();
        }
        artifact.id = id;
    }
}

/// Everything needed to render one artifact.
#[derive(Debug, Clone)]
struct Request {
    target: TargetRef,
    kind: ScenarioKind,
    mode: ParamMode,
    minimal: bool,
    id: String,
    origin_id: Option<String>,
    generation: u32,
    parent_id: Option<String>,
    iteration: u32,
    notes: Vec<String>,
}

impl Request {
    fn new(target: TargetRef, kind: ScenarioKind, id: String) -> Self {
        Self {
            target,
            kind,
            mode: default_mode(kind),
            minimal: false,
            id,
            origin_id: None,
            generation: 0,
            parent_id: None,
            iteration: 0,
            notes: Vec::new(),
        }
    }
}

fn default_mode(kind: ScenarioKind) -> ParamMode {
    match kind {
        ScenarioKind::EdgeCases => ParamMode::EdgeCase,
        ScenarioKind::BoundaryCheck => ParamMode::Boundary,
        _ => ParamMode::Default,
    }
}

/// Rendered pieces before they become a [`TestArtifact`].
struct Rendered {
    class_name: String,
    method_name: String,
    header: String,
    suite: String,
    body: Vec<String>,
    stand_ins: BTreeSet<String>,
}

/// Object declaration for instance-method scenarios.
struct ObjectSetup {
    declarations: Vec<String>,
    stand_ins: BTreeSet<String>,
}

/// Produces [`TestArtifact`]s for a model table.
#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    table: Arc<ModelTable>,
    plans: Arc<PlanCache>,
    strategies: StrategySet,
    synthesizer: ParameterSynthesizer,
    project_root: PathBuf,
}

impl ScenarioGenerator {
    pub fn new(
        table: Arc<ModelTable>,
        plans: Arc<PlanCache>,
        strategies: StrategySet,
        project_root: &Path,
    ) -> Self {
        let synthesizer = ParameterSynthesizer::new(plans.stand_in_names());
        Self {
            table,
            plans,
            strategies,
            synthesizer,
            project_root: project_root.to_path_buf(),
        }
    }

    pub fn strategies(&self) -> &StrategySet {
        &self.strategies
    }

    fn class_by_qualified_name(&self, name: &str) -> Option<&ClassModel> {
        self.table
            .classes
            .values()
            .find(|c| c.qualified_name() == name)
            .or_else(|| self.table.find_class(name))
    }

    fn stand_in_overrides(&self, plan: &InstantiationPlan, method: &MethodModel) -> bool {
        match &plan.strategy {
            PlanStrategy::Substitute { stand_in } => self
                .plans
                .stand_ins()
                .get(stand_in)
                .is_some_and(|s| s.overridden.contains(&method.name)),
            _ => false,
        }
    }

    fn member_eligible(&self, class: &ClassModel, method: &MethodModel, plan: &InstantiationPlan) -> bool {
        if method.access != AccessLevel::Public
            || method.flags.is_constructor
            || method.flags.is_destructor
            || method.flags.is_variadic
        {
            return false;
        }
        if method.flags.is_static {
            return true;
        }
        if !plan.is_feasible() || self.stand_in_overrides(plan, method) {
            return false;
        }
        let substituted = matches!(plan.strategy, PlanStrategy::Substitute { .. });
        !class.has_non_public_destructor || substituted
    }

    fn constructor_eligible(&self, class: &ClassModel, ctor: &MethodModel) -> bool {
        ctor.flags.is_constructor
            && ctor.access == AccessLevel::Public
            && !ctor.flags.is_variadic
            && !ctor.is_copy_or_move_of(&class.name)
            && !class.is_abstract
            && !class.has_non_public_destructor
            && ctor.parameters.len() <= self.strategies.constructor_param_ceiling
    }

    /// Catalogue for a (non-constructor) member.
    fn member_kinds(&self, method: &MethodModel) -> Vec<ScenarioKind> {
        let returns_value = !method.returns_void();
        let kinds = if method.flags.is_static {
            static_kinds(returns_value)
        } else {
            let mut kinds = vec![ScenarioKind::BasicUsage, ScenarioKind::MultipleInvocations];
            if !method.parameters.is_empty() {
                kinds.push(ScenarioKind::EdgeCases);
            }
            if is_numeric(decayed_category(&method.return_type)) {
                kinds.push(ScenarioKind::BoundaryCheck);
            }
            if returns_value {
                kinds.push(ScenarioKind::Consistency);
            }
            kinds.push(ScenarioKind::NoThrow);
            kinds
        };
        self.strategies.filter(kinds)
    }

    fn member_id(class: &ClassModel, method: &MethodModel, kind: ScenarioKind) -> String {
        sanitize_identifier(&format!(
            "{}_{}_{}",
            class.qualified_name(),
            method.name,
            kind.name()
        ))
    }

    /// Artifacts for one method of `class` under `plan`.
    ///
    /// Constructors are delegated to [`generate_constructor`](Self::generate_constructor).
    pub fn generate(
        &self,
        class: &ClassModel,
        method: &MethodModel,
        plan: &InstantiationPlan,
    ) -> Vec<TestArtifact> {
        let Some(index) = class.methods.iter().position(|m| m == method) else {
            return Vec::new();
        };
        if method.flags.is_constructor {
            return self.generate_constructor(class, method);
        }
        if !self.member_eligible(class, method, plan) {
            return Vec::new();
        }
        self.member_kinds(method)
            .into_iter()
            .filter_map(|kind| {
                let request = Request::new(
                    TargetRef::Member { index },
                    kind,
                    Self::member_id(class, method, kind),
                );
                self.render_member(class, index, Some(plan), request)
            })
            .collect()
    }

    /// Construction scenarios for one constructor.
    pub fn generate_constructor(&self, class: &ClassModel, ctor: &MethodModel) -> Vec<TestArtifact> {
        let Some(index) = class.methods.iter().position(|m| m == ctor) else {
            return Vec::new();
        };
        if !self.constructor_eligible(class, ctor) {
            return Vec::new();
        }
        let mut kinds = vec![ScenarioKind::BasicConstruction];
        if ctor.parameters.is_empty() {
            kinds.push(ScenarioKind::MultipleInstances);
        }
        kinds.push(ScenarioKind::StackAllocation);
        self.strategies
            .filter(kinds)
            .into_iter()
            .filter_map(|kind| {
                let request = Request::new(
                    TargetRef::Member { index },
                    kind,
                    Self::member_id(class, ctor, kind),
                );
                self.render_member(class, index, None, request)
            })
            .collect()
    }

    /// Reduced catalogue for a namespace-scope function.
    pub fn generate_free_function(&self, function: &FreeFunction) -> Vec<TestArtifact> {
        let Some(index) = self.table.free_functions.iter().position(|f| f == function) else {
            return Vec::new();
        };
        if function.method.flags.is_variadic {
            return Vec::new();
        }
        self.strategies
            .filter(static_kinds(!function.method.returns_void()))
            .into_iter()
            .filter_map(|kind| {
                let id = sanitize_identifier(&format!(
                    "{}_{}",
                    function.qualified_name(),
                    kind.name()
                ));
                self.render_function(index, Request::new(TargetRef::FreeFunction { index }, kind, id))
            })
            .collect()
    }

    /// Initial artifact set for the whole table, with unique ids.
    pub fn generate_for_table(&self) -> Vec<TestArtifact> {
        let mut ids = IdAllocator::default();
        let mut out = Vec::new();
        for class in self.table.classes.values() {
            let Some(plan) = self.plans.get(&class.qualified_name()) else {
                continue;
            };
            for method in &class.methods {
                for mut artifact in self.generate(class, method, plan) {
                    ids.assign(&mut artifact);
                    out.push(artifact);
                }
            }
        }
        if self.strategies.include_free_functions {
            for function in &self.table.free_functions {
                for mut artifact in self.generate_free_function(function) {
                    ids.assign(&mut artifact);
                    out.push(artifact);
                }
            }
        }
        debug!(artifacts = out.len(), "initial artifact set generated");
        out
    }

    /// Replacement for an artifact that failed to compile.
    ///
    /// The first replacement switches to zero-initialized arguments, the
    /// next to a minimal no-throw call. Returns `None` when the diagnostics
    /// show the target itself is unusable or the ladder is exhausted.
    pub fn regenerate(
        &self,
        artifact: &TestArtifact,
        diagnostics: &str,
        attempt: u32,
    ) -> Option<TestArtifact> {
        let recipe = artifact.recipe.as_ref()?;
        let lowered = diagnostics.to_ascii_lowercase();
        if UNRECOVERABLE.iter().any(|p| lowered.contains(p)) {
            debug!(artifact = %artifact.id, "diagnostics are not recoverable");
            return None;
        }

        let constructor = self.is_constructor_target(artifact, recipe.target);
        let minimal_kind = if constructor {
            ScenarioKind::BasicConstruction
        } else {
            ScenarioKind::NoThrow
        };
        let (kind, mode, minimal) = if recipe.minimal {
            return None;
        } else if recipe.mode != ParamMode::EdgeCase && artifact.scenario_kind != ScenarioKind::Generated {
            (artifact.scenario_kind, ParamMode::EdgeCase, false)
        } else {
            (minimal_kind, ParamMode::Default, true)
        };

        let mut notes = vec![format!("regenerated (attempt {})", attempt)];
        if let Some(summary) = diagnostic_summary(diagnostics) {
            notes.push(format!("previous error: {}", summary));
        }
        let request = Request {
            target: recipe.target,
            kind,
            mode,
            minimal,
            id: format!("{}_g{}", recipe.origin_id, attempt),
            origin_id: Some(recipe.origin_id.clone()),
            generation: attempt,
            parent_id: Some(artifact.id.clone()),
            iteration: artifact.iteration,
            notes,
        };
        match recipe.target {
            TargetRef::Member { index } => {
                let class = self.class_by_qualified_name(&artifact.class_name)?;
                self.render_member(class, index, None, request)
            }
            TargetRef::FreeFunction { index } => self.render_function(index, request),
        }
    }

    fn is_constructor_target(&self, artifact: &TestArtifact, target: TargetRef) -> bool {
        match target {
            TargetRef::Member { index } => self
                .class_by_qualified_name(&artifact.class_name)
                .and_then(|c| c.methods.get(index))
                .is_some_and(|m| m.flags.is_constructor),
            TargetRef::FreeFunction { .. } => false,
        }
    }

    /// Header stems named by the uncovered sample.
    fn uncovered_stems(snapshot: &CoverageSnapshot) -> BTreeSet<String> {
        snapshot
            .uncovered_lines
            .iter()
            .filter_map(|l| Path::new(&l.file).file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    /// Classes whose header (or same-stem source) appears in the uncovered
    /// sample, or every class when none does.
    pub fn focus_classes(&self, snapshot: &CoverageSnapshot) -> Vec<&ClassModel> {
        let stems = Self::uncovered_stems(snapshot);
        let matched: Vec<&ClassModel> = self
            .table
            .classes
            .values()
            .filter(|c| stems.contains(c.source_header.stem()))
            .collect();
        if matched.is_empty() {
            self.table.classes.values().collect()
        } else {
            matched
        }
    }

    /// Gap-focused variants for refinement round `iteration`.
    pub fn refine(&self, snapshot: &CoverageSnapshot, iteration: u32) -> Refinement {
        let strategies = derive_strategies(&snapshot.uncovered_lines);
        let mut variants = vec![(ScenarioKind::EdgeCases, ParamMode::EdgeCase)];
        if strategies.contains(&GapStrategy::Boundary) {
            variants.push((ScenarioKind::BoundaryCheck, ParamMode::Boundary));
        }
        if strategies.contains(&GapStrategy::Branch) || strategies.contains(&GapStrategy::Path) {
            variants.push((ScenarioKind::MultipleInvocations, ParamMode::Boundary));
        }
        variants.retain(|(kind, _)| self.strategies.enables(*kind));

        let focus = self.focus_classes(snapshot);
        let mut ids = IdAllocator::default();
        let mut artifacts = Vec::new();
        for class in &focus {
            let Some(plan) = self.plans.get(&class.qualified_name()) else {
                continue;
            };
            for (index, method) in class.methods.iter().enumerate() {
                if method.parameters.is_empty() || !self.member_eligible(class, method, plan) {
                    continue;
                }
                for (kind, mode) in &variants {
                    let base = Self::member_id(class, method, *kind);
                    let mut request = Request::new(
                        TargetRef::Member { index },
                        *kind,
                        format!("{}_i{}", base, iteration),
                    );
                    request.mode = *mode;
                    request.iteration = iteration;
                    request.notes.push(format!("refinement round {}", iteration));
                    if let Some(mut artifact) = self.render_member(class, index, Some(plan), request) {
                        ids.assign(&mut artifact);
                        artifacts.push(artifact);
                    }
                }
            }
        }

        if self.strategies.include_free_functions {
            let stems = Self::uncovered_stems(snapshot);
            for (index, function) in self.table.free_functions.iter().enumerate() {
                let focused = stems.is_empty() || stems.contains(function.source_header.stem());
                if !focused || function.method.parameters.is_empty() || function.method.flags.is_variadic {
                    continue;
                }
                for (kind, mode) in &variants {
                    let id = sanitize_identifier(&format!(
                        "{}_{}_i{}",
                        function.qualified_name(),
                        kind.name(),
                        iteration
                    ));
                    let mut request = Request::new(TargetRef::FreeFunction { index }, *kind, id);
                    request.mode = *mode;
                    request.iteration = iteration;
                    if let Some(mut artifact) = self.render_function(index, request) {
                        ids.assign(&mut artifact);
                        artifacts.push(artifact);
                    }
                }
            }
        }

        debug!(
            iteration,
            artifacts = artifacts.len(),
            focus = focus.len(),
            "refinement generated"
        );
        Refinement {
            artifacts,
            strategies,
            focus: focus.iter().map(|c| c.qualified_name()).collect(),
        }
    }

    /// Up to `limit` methods worth asking the completion collaborator about.
    pub fn completion_targets(&self, snapshot: &CoverageSnapshot, limit: usize) -> Vec<CompletionTarget> {
        let mut targets = Vec::new();
        for class in self.focus_classes(snapshot) {
            let Some(plan) = self.plans.get(&class.qualified_name()) else {
                continue;
            };
            for (index, method) in class.methods.iter().enumerate() {
                if targets.len() >= limit {
                    return targets;
                }
                if self.member_eligible(class, method, plan) {
                    targets.push(CompletionTarget {
                        class: class.clone(),
                        method_index: index,
                        header: class.source_header.include_path(&self.project_root),
                    });
                }
            }
        }
        targets
    }

    /// Wrap a completion body as an artifact, adding includes when missing.
    pub fn from_completion(
        &self,
        target: &CompletionTarget,
        body: &str,
        iteration: u32,
    ) -> Option<TestArtifact> {
        let method = target.method()?;
        let id = sanitize_identifier(&format!(
            "{}_{}_{}_i{}",
            target.class.qualified_name(),
            method.name,
            ScenarioKind::Generated.name(),
            iteration
        ));
        let source_text = if body.contains("#include") {
            format!("{}\n", body.trim_end())
        } else {
            format!(
                "// covforge: {} completion\n\n{}\n{}\n",
                target,
                include_block(&target.header, &[]),
                body.trim()
            )
        };
        Some(TestArtifact {
            id: id.clone(),
            class_name: target.class.qualified_name(),
            method_name: method.name.clone(),
            scenario_kind: ScenarioKind::Generated,
            source_text,
            file_path: PathBuf::from(format!("{}.cpp", id)),
            generation: 0,
            parent_id: None,
            iteration,
            support_files: Vec::new(),
            recipe: Some(Recipe {
                target: TargetRef::Member {
                    index: target.method_index,
                },
                mode: ParamMode::Default,
                minimal: false,
                origin_id: id,
            }),
        })
    }

    fn object_setup(&self, class: &ClassModel, plan: &InstantiationPlan, first_slot: usize) -> Option<ObjectSetup> {
        let qualified = class.qualified_name();
        match &plan.strategy {
            PlanStrategy::Default => Some(ObjectSetup {
                declarations: vec![format!("{} obj{{}};", qualified)],
                stand_ins: BTreeSet::new(),
            }),
            PlanStrategy::ParameterizedConstructor { constructor, .. } => {
                let args =
                    self.synthesizer
                        .synthesize_from(&constructor.parameters, ParamMode::Default, first_slot);
                let mut declarations = args.declarations.clone();
                declarations.push(format!("{} obj({});", qualified, args.call_list()));
                Some(ObjectSetup {
                    declarations,
                    stand_ins: args.stand_ins,
                })
            }
            PlanStrategy::Substitute { stand_in } => Some(ObjectSetup {
                declarations: vec![format!("{} obj;", stand_in)],
                stand_ins: BTreeSet::from([stand_in.clone()]),
            }),
            PlanStrategy::Infeasible { .. } => None,
        }
    }

    /// Render a class member. `plan` defaults to the cached plan.
    fn render_member(
        &self,
        class: &ClassModel,
        index: usize,
        plan: Option<&InstantiationPlan>,
        request: Request,
    ) -> Option<TestArtifact> {
        let method = class.methods.get(index)?;
        let qualified = class.qualified_name();
        let header = class.source_header.include_path(&self.project_root);
        let args = self.synthesizer.synthesize(&method.parameters, request.mode);
        let mut stand_ins = args.stand_ins.clone();
        let mut body = Vec::new();

        if method.flags.is_constructor {
            body.extend(args.declarations.iter().cloned());
            body.extend(construction_body(request.kind, &qualified, &args.call_list()));
        } else {
            let expression = if method.flags.is_static {
                format!("{}::{}({})", qualified, method.name, args.call_list())
            } else {
                let plan = match plan {
                    Some(plan) => plan,
                    None => self.plans.get(&qualified)?,
                };
                let setup = self.object_setup(class, plan, method.parameters.len())?;
                body.extend(setup.declarations);
                stand_ins.extend(setup.stand_ins);
                format!("obj.{}({})", method.name, args.call_list())
            };
            body.extend(args.declarations.iter().cloned());
            let category = decayed_category(&method.return_type);
            let comparable = is_comparable(category) && (method.flags.is_const || method.flags.is_static);
            body.extend(call_body(request.kind, &expression, category, comparable));
        }

        let rendered = Rendered {
            class_name: qualified.clone(),
            method_name: method.name.clone(),
            header,
            suite: sanitize_identifier(&qualified),
            body,
            stand_ins,
        };
        Some(self.finish(rendered, request))
    }

    fn render_function(&self, index: usize, request: Request) -> Option<TestArtifact> {
        let function = self.table.free_functions.get(index)?;
        let args = self.synthesizer.synthesize(&function.method.parameters, request.mode);
        let expression = format!("{}({})", function.qualified_name(), args.call_list());
        let category = decayed_category(&function.method.return_type);
        let mut body = args.declarations.clone();
        body.extend(call_body(request.kind, &expression, category, is_comparable(category)));

        let suite = if function.namespace.is_empty() {
            "FreeFunctions".to_string()
        } else {
            sanitize_identifier(&function.namespace)
        };
        let rendered = Rendered {
            class_name: String::new(),
            method_name: function.qualified_name(),
            header: function.source_header.include_path(&self.project_root),
            suite,
            body,
            stand_ins: args.stand_ins,
        };
        Some(self.finish(rendered, request))
    }

    fn finish(&self, rendered: Rendered, request: Request) -> TestArtifact {
        let support_files: Vec<(String, String)> = rendered
            .stand_ins
            .iter()
            .filter_map(|name| self.plans.stand_ins().get(name))
            .map(|s| (s.header_file.clone(), s.header_text.clone()))
            .collect();
        let target = if rendered.class_name.is_empty() {
            rendered.method_name.clone()
        } else {
            format!("{}::{}", rendered.class_name, rendered.method_name)
        };
        let mut notes = vec![format!("covforge: {} {}", target, request.kind)];
        notes.extend(request.notes);
        let unit = TranslationUnit {
            header: rendered.header,
            stand_in_headers: support_files.iter().map(|(file, _)| file.clone()).collect(),
            notes,
            suite: rendered.suite,
            name: sanitize_identifier(&format!(
                "{}_{}",
                crate::synth::unqualified(&rendered.method_name),
                request.kind
            )),
            body: rendered.body,
        };

        let id = request.id;
        TestArtifact {
            file_path: PathBuf::from(format!("{}.cpp", id)),
            class_name: rendered.class_name,
            method_name: rendered.method_name,
            scenario_kind: request.kind,
            source_text: unit.render(),
            generation: request.generation,
            parent_id: request.parent_id,
            iteration: request.iteration,
            support_files,
            recipe: Some(Recipe {
                target: request.target,
                mode: request.mode,
                minimal: request.minimal,
                origin_id: request.origin_id.unwrap_or_else(|| id.clone()),
            }),
            id,
        }
    }
}

fn static_kinds(returns_value: bool) -> Vec<ScenarioKind> {
    let mut kinds = Vec::new();
    if returns_value {
        kinds.push(ScenarioKind::ReturnValue);
    }
    kinds.push(ScenarioKind::NoThrow);
    kinds.push(ScenarioKind::MultipleInvocations);
    if returns_value {
        kinds.push(ScenarioKind::ConsistentResults);
    }
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthesisConfig;
    use crate::domain::{SourceUnit, UncoveredLine};
    use crate::extract::StructuralModelExtractor;
    use crate::plan::InstantiationPlanner;

    fn generator_with(text: &str, config: SynthesisConfig) -> ScenarioGenerator {
        let table = StructuralModelExtractor::default()
            .extract_text(&SourceUnit::header("/p/src/box.h"), text);
        let plans = InstantiationPlanner::new(&table, &config, Path::new("/p")).plan_all();
        let strategies = StrategySet::from_config(&config, &Default::default());
        ScenarioGenerator::new(Arc::new(table), Arc::new(plans), strategies, Path::new("/p"))
    }

    fn generator(text: &str) -> ScenarioGenerator {
        generator_with(text, SynthesisConfig::default())
    }

    fn ids(artifacts: &[TestArtifact]) -> Vec<&str> {
        artifacts.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_box_scenarios() {
        let g = generator("class Box { public: Box(); int getValue(); };");
        let artifacts = g.generate_for_table();
        let get_value: Vec<&TestArtifact> =
            artifacts.iter().filter(|a| a.method_name == "getValue").collect();
        let kinds: Vec<ScenarioKind> = get_value.iter().map(|a| a.scenario_kind).collect();
        assert_eq!(
            kinds,
            vec![
                ScenarioKind::BasicUsage,
                ScenarioKind::MultipleInvocations,
                ScenarioKind::BoundaryCheck,
                ScenarioKind::Consistency,
                ScenarioKind::NoThrow,
            ]
        );
        assert_eq!(get_value[0].id, "Box_getValue_BasicUsage");
        assert_eq!(get_value[0].file_path, PathBuf::from("Box_getValue_BasicUsage.cpp"));

        let text = &get_value[0].source_text;
        assert!(text.contains("#include \"src/box.h\""));
        assert!(text.contains("TEST(Box, getValue_BasicUsage) {"));
        assert!(text.contains("    Box obj{};\n    auto result = obj.getValue();"));

        let ctor: Vec<&str> = artifacts
            .iter()
            .filter(|a| a.method_name == "Box")
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(
            ctor,
            vec![
                "Box_Box_BasicConstruction",
                "Box_Box_MultipleInstances",
                "Box_Box_StackAllocation"
            ]
        );
    }

    #[test]
    fn test_consistency_uses_eq_only_for_const_methods() {
        let g = generator("class Counter { public: int peek() const; int next(); };");
        let artifacts = g.generate_for_table();
        let find = |id: &str| artifacts.iter().find(|a| a.id == id).unwrap();
        assert!(find("Counter_peek_Consistency").source_text.contains("EXPECT_EQ(first, second);"));
        assert!(find("Counter_next_Consistency").source_text.contains("(void)obj.next();"));
    }

    #[test]
    fn test_edge_cases_only_with_parameters() {
        let g = generator("class Gate { public: void open(int width, bool force); };");
        let artifacts = g.generate_for_table();
        assert_eq!(
            ids(&artifacts),
            vec!["Gate_open_BasicUsage", "Gate_open_MultipleInvocations", "Gate_open_EdgeCases", "Gate_open_NoThrow"]
        );
        let edge = &artifacts[2];
        assert!(edge.source_text.contains("obj.open(0, false);"));
        assert!(edge.source_text.contains("catch (const std::exception& e)"));
        assert_eq!(edge.recipe.as_ref().unwrap().mode, ParamMode::EdgeCase);
    }

    #[test]
    fn test_abstract_class_keeps_static_methods() {
        let g = generator(
            "class Shape { public: virtual ~Shape(); virtual double area() const = 0; static Shape* make(int sides); };",
        );
        let artifacts = g.generate_for_table();
        assert_eq!(
            ids(&artifacts),
            vec![
                "Shape_make_ReturnValue",
                "Shape_make_NoThrow",
                "Shape_make_MultipleInvocations",
                "Shape_make_ConsistentResults"
            ]
        );
        assert!(artifacts[0].source_text.contains("auto result = Shape::make(0);"));
        assert!(artifacts[0].source_text.contains("EXPECT_NE(result, nullptr);"));
    }

    #[test]
    fn test_parameterized_setup_and_overloads() {
        let g = generator(
            "namespace geo { class Rect { public: Rect(int side); int area() const; void scale(int f); void scale(double f); }; }",
        );
        let artifacts = g.generate_for_table();
        let area = artifacts.iter().find(|a| a.id == "geo_Rect_area_BasicUsage").unwrap();
        assert!(area.source_text.contains("geo::Rect obj(0);"));
        assert!(artifacts.iter().any(|a| a.id == "geo_Rect_scale_NoThrow"));
        assert!(artifacts.iter().any(|a| a.id == "geo_Rect_scale_NoThrow_2"));
        let unique: HashSet<&str> = ids(&artifacts).into_iter().collect();
        assert_eq!(unique.len(), artifacts.len());
    }

    #[test]
    fn test_stand_in_support_files_and_overrides() {
        let mut config = SynthesisConfig::default();
        config.substitution_classes = vec!["Store".to_string()];
        let g = generator_with(
            "class Store { public: Store(int cap); virtual int size() const; int capacity() const; };\nclass Cache { public: Cache(Store& store); int hits() const; };",
            config,
        );
        let artifacts = g.generate_for_table();
        let hits = artifacts.iter().find(|a| a.id == "Cache_hits_BasicUsage").unwrap();
        assert!(hits.source_text.contains("StubStore arg0;"));
        assert!(hits.source_text.contains("Cache obj(arg0);"));
        assert!(hits.source_text.contains("#include \"stub_Store.h\""));
        assert_eq!(hits.support_files[0].0, "stub_Store.h");
    }

    #[test]
    fn test_free_functions() {
        let g = generator("namespace math { int add(int a, int b); }\nvoid reset();");
        let artifacts = g.generate_for_table();
        assert!(ids(&artifacts).contains(&"math_add_ReturnValue"));
        assert!(ids(&artifacts).contains(&"reset_NoThrow"));
        let add = artifacts.iter().find(|a| a.id == "math_add_ReturnValue").unwrap();
        assert!(add.source_text.contains("TEST(math, add_ReturnValue)"));
        assert!(add.source_text.contains("auto result = math::add(0, 0);"));
        assert!(add.class_name.is_empty());
    }

    #[test]
    fn test_regeneration_ladder() {
        let g = generator("class Box { public: Box(); int getValue(); };");
        let original = g
            .generate_for_table()
            .into_iter()
            .find(|a| a.id == "Box_getValue_BasicUsage")
            .unwrap();

        let diag = "box_test.cpp:9:5: error: 'foo' was not declared in this scope\n";
        let first = g.regenerate(&original, diag, 1).unwrap();
        assert_eq!(first.id, "Box_getValue_BasicUsage_g1");
        assert_eq!(first.parent_id.as_deref(), Some("Box_getValue_BasicUsage"));
        assert_eq!(first.generation, 1);
        assert_eq!(first.recipe.as_ref().unwrap().mode, ParamMode::EdgeCase);
        assert!(first.source_text.contains("// previous error: box_test.cpp:9:5: error:"));

        let second = g.regenerate(&first, diag, 2).unwrap();
        assert_eq!(second.id, "Box_getValue_BasicUsage_g2");
        assert_eq!(second.scenario_kind, ScenarioKind::NoThrow);
        assert!(second.source_text.contains("EXPECT_NO_THROW(obj.getValue());"));

        assert!(g.regenerate(&second, diag, 3).is_none());
        assert!(g
            .regenerate(&original, "error: 'Box::Box()' is private within this context", 1)
            .is_none());
    }

    #[test]
    fn test_refine_focuses_on_uncovered_headers() {
        let mut table_text = String::from("class Gate { public: void open(int width); int state() const; };");
        table_text.push_str("\nclass Other { public: void poke(int x); };");
        let g = generator(&table_text);
        let mut snapshot = CoverageSnapshot::new(10, 40);
        snapshot.uncovered_lines = vec![UncoveredLine {
            file: "/p/src/box.cpp".to_string(),
            line: 12,
            code: "if (width > limit_) {".to_string(),
        }];
        let round = g.refine(&snapshot, 2);
        assert!(round.strategies.contains(&GapStrategy::Branch));
        assert!(round.strategies.contains(&GapStrategy::Boundary));
        assert!(round.strategies.contains(&GapStrategy::EdgeCase));
        let round_ids = ids(&round.artifacts);
        assert!(round_ids.contains(&"Gate_open_EdgeCases_i2"));
        assert!(round_ids.contains(&"Gate_open_BoundaryCheck_i2"));
        assert!(round_ids.contains(&"Gate_open_MultipleInvocations_i2"));
        // Both classes live in box.h, so both are in focus.
        assert!(round_ids.contains(&"Other_poke_EdgeCases_i2"));
        assert!(round.artifacts.iter().all(|a| a.iteration == 2));
        let boundary = round
            .artifacts
            .iter()
            .find(|a| a.id == "Gate_open_BoundaryCheck_i2")
            .unwrap();
        assert!(boundary.source_text.contains("std::numeric_limits<int>::max()"));
    }

    #[test]
    fn test_completion_artifact_wrapping() {
        let g = generator("class Box { public: Box(); int getValue(); };");
        let snapshot = CoverageSnapshot::new(1, 2);
        let targets = g.completion_targets(&snapshot, 3);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].to_string(), "Box::getValue");
        let artifact = g
            .from_completion(&targets[0], "TEST(Box, Smoke) { Box b; b.getValue(); }", 1)
            .unwrap();
        assert_eq!(artifact.id, "Box_getValue_Generated_i1");
        assert!(artifact.source_text.contains("#include <gtest/gtest.h>"));
        assert!(artifact.source_text.contains("TEST(Box, Smoke)"));
    }
}
