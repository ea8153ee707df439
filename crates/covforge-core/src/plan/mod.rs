//! Instantiation planning: how (and whether) a test can obtain an instance.

pub mod substitute;

pub use substitute::{StandIn, SubstituteFactory};

use crate::config::SynthesisConfig;
use crate::domain::{ClassModel, MethodModel, ModelTable};
use crate::synth::{bare_type, classify, TypeCategory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Why a class cannot be instantiated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InfeasibleReason {
    Abstract,
    NoPublicConstructor,
    TooManyParameters { count: usize, ceiling: usize },
    SelfReferential,
    UnresolvableDependency { type_name: String },
}

impl std::fmt::Display for InfeasibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfeasibleReason::Abstract => write!(f, "abstract class"),
            InfeasibleReason::NoPublicConstructor => write!(f, "no public constructor"),
            InfeasibleReason::TooManyParameters { count, ceiling } => {
                write!(f, "constructor takes {} parameters (ceiling {})", count, ceiling)
            }
            InfeasibleReason::SelfReferential => write!(f, "only copy/move constructors"),
            InfeasibleReason::UnresolvableDependency { type_name } => {
                write!(f, "dependency {} cannot be constructed", type_name)
            }
        }
    }
}

/// A constructor parameter satisfied by a stand-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamSubstitution {
    pub index: usize,
    pub dependency: String,
    pub stand_in: String,
}

/// Chosen way of producing an instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStrategy {
    Default,
    ParameterizedConstructor {
        constructor: MethodModel,
        substitutions: Vec<ParamSubstitution>,
    },
    Substitute {
        stand_in: String,
    },
    Infeasible {
        reason: InfeasibleReason,
    },
}

/// Planner output for one class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstantiationPlan {
    pub class: ClassModel,
    pub strategy: PlanStrategy,
}

impl InstantiationPlan {
    pub fn is_feasible(&self) -> bool {
        !matches!(self.strategy, PlanStrategy::Infeasible { .. })
    }

    pub fn label(&self) -> &'static str {
        match self.strategy {
            PlanStrategy::Default => "default",
            PlanStrategy::ParameterizedConstructor { .. } => "parameterized_constructor",
            PlanStrategy::Substitute { .. } => "substitute",
            PlanStrategy::Infeasible { .. } => "infeasible",
        }
    }
}

/// Plans for every class of a table plus the stand-ins they rely on.
#[derive(Debug, Clone, Default)]
pub struct PlanCache {
    plans: BTreeMap<String, InstantiationPlan>,
    stand_ins: BTreeMap<String, StandIn>,
}

impl PlanCache {
    pub fn get(&self, qualified_class: &str) -> Option<&InstantiationPlan> {
        self.plans.get(qualified_class)
    }

    pub fn plans(&self) -> impl Iterator<Item = &InstantiationPlan> {
        self.plans.values()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Stand-in definitions keyed by stand-in type name.
    pub fn stand_ins(&self) -> &BTreeMap<String, StandIn> {
        &self.stand_ins
    }

    /// Substituted class (qualified and bare) → stand-in type name.
    pub fn stand_in_names(&self) -> BTreeMap<String, String> {
        let mut names = BTreeMap::new();
        for stand_in in self.stand_ins.values() {
            names.insert(stand_in.base.clone(), stand_in.name.clone());
            let bare = crate::synth::unqualified(&stand_in.base).to_string();
            names.entry(bare).or_insert_with(|| stand_in.name.clone());
        }
        names
    }

    pub fn feasible_count(&self) -> usize {
        self.plans.values().filter(|p| p.is_feasible()).count()
    }
}

/// Decides how each class can be instantiated.
#[derive(Debug)]
pub struct InstantiationPlanner<'a> {
    table: &'a ModelTable,
    ceiling: usize,
    substitution_set: BTreeSet<String>,
    factory: SubstituteFactory,
    project_root: PathBuf,
}

impl<'a> InstantiationPlanner<'a> {
    pub fn new(table: &'a ModelTable, config: &SynthesisConfig, project_root: &Path) -> Self {
        Self {
            table,
            ceiling: config.constructor_param_ceiling,
            substitution_set: config.substitution_classes.iter().cloned().collect(),
            factory: SubstituteFactory::new(config.max_substitute_overrides),
            project_root: project_root.to_path_buf(),
        }
    }

    fn in_substitution_set(&self, class: &ClassModel) -> bool {
        self.substitution_set.contains(&class.name)
            || self.substitution_set.contains(&class.qualified_name())
    }

    /// A class that cannot simply be default-constructed by a test.
    fn needs_stand_in(class: &ClassModel) -> bool {
        class.is_abstract || !class.has_public_default_constructor()
    }

    fn stand_in_for(&self, class: &ClassModel) -> Option<StandIn> {
        if !self.in_substitution_set(class) {
            return None;
        }
        let include = class.source_header.include_path(&self.project_root);
        self.factory.build(class, &include)
    }

    /// Plan one class.
    pub fn plan(&self, class: &ClassModel) -> InstantiationPlan {
        let (strategy, _) = self.plan_with_stand_ins(class);
        InstantiationPlan {
            class: class.clone(),
            strategy,
        }
    }

    fn plan_with_stand_ins(&self, class: &ClassModel) -> (PlanStrategy, Vec<StandIn>) {
        if class.is_abstract {
            return (
                PlanStrategy::Infeasible {
                    reason: InfeasibleReason::Abstract,
                },
                Vec::new(),
            );
        }
        if class.has_public_default_constructor() {
            return (PlanStrategy::Default, Vec::new());
        }

        match self.plan_constructor(class) {
            Ok(result) => result,
            Err(reason) => match self.stand_in_for(class) {
                Some(stand_in) => (
                    PlanStrategy::Substitute {
                        stand_in: stand_in.name.clone(),
                    },
                    vec![stand_in],
                ),
                None => (PlanStrategy::Infeasible { reason }, Vec::new()),
            },
        }
    }

    fn plan_constructor(
        &self,
        class: &ClassModel,
    ) -> Result<(PlanStrategy, Vec<StandIn>), InfeasibleReason> {
        let public: Vec<&MethodModel> = class.public_constructors().collect();
        if public.is_empty() {
            return Err(InfeasibleReason::NoPublicConstructor);
        }
        let candidates: Vec<&MethodModel> = public
            .iter()
            .copied()
            .filter(|c| !c.is_copy_or_move_of(&class.name))
            .collect();
        let Some(ctor) = candidates
            .into_iter()
            .min_by_key(|c| c.parameters.len())
        else {
            return Err(InfeasibleReason::SelfReferential);
        };
        if ctor.parameters.len() > self.ceiling {
            return Err(InfeasibleReason::TooManyParameters {
                count: ctor.parameters.len(),
                ceiling: self.ceiling,
            });
        }

        let mut substitutions = Vec::new();
        let mut stand_ins = Vec::new();
        for (index, param) in ctor.parameters.iter().enumerate() {
            let base = bare_type(&param.declared_type);
            if base == class.name || base == class.qualified_name() {
                return Err(InfeasibleReason::SelfReferential);
            }
            let Some(dependency) = self.table.find_class(&base) else {
                continue;
            };
            if !Self::needs_stand_in(dependency) {
                continue;
            }
            match self.stand_in_for(dependency) {
                Some(stand_in) => {
                    substitutions.push(ParamSubstitution {
                        index,
                        dependency: dependency.qualified_name(),
                        stand_in: stand_in.name.clone(),
                    });
                    stand_ins.push(stand_in);
                }
                None if classify(&param.declared_type) == TypeCategory::Pointer => {
                    debug!(class = %class.name, dependency = %base, "dependency passed as null");
                }
                None => {
                    return Err(InfeasibleReason::UnresolvableDependency { type_name: base });
                }
            }
        }

        Ok((
            PlanStrategy::ParameterizedConstructor {
                constructor: ctor.clone(),
                substitutions,
            },
            stand_ins,
        ))
    }

    /// Plan every class in the table.
    ///
    /// Stand-ins for every substitution-set class that needs one are
    /// registered as well, so methods taking such dependencies can use them.
    pub fn plan_all(&self) -> PlanCache {
        let mut cache = PlanCache::default();
        for class in self.table.classes.values() {
            let (strategy, stand_ins) = self.plan_with_stand_ins(class);
            for stand_in in stand_ins {
                cache.stand_ins.insert(stand_in.name.clone(), stand_in);
            }
            debug!(
                class = %class.qualified_name(),
                strategy = ?strategy,
                "instantiation planned"
            );
            cache.plans.insert(
                class.qualified_name(),
                InstantiationPlan {
                    class: class.clone(),
                    strategy,
                },
            );
        }
        for class in self.table.classes.values() {
            if Self::needs_stand_in(class) {
                if let Some(stand_in) = self.stand_in_for(class) {
                    cache.stand_ins.entry(stand_in.name.clone()).or_insert(stand_in);
                }
            }
        }
        cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceUnit;
    use crate::extract::StructuralModelExtractor;

    fn table(text: &str) -> ModelTable {
        StructuralModelExtractor::default().extract_text(&SourceUnit::header("/p/src/x.h"), text)
    }

    fn plan_for(table: &ModelTable, config: &SynthesisConfig, name: &str) -> InstantiationPlan {
        let planner = InstantiationPlanner::new(table, config, Path::new("/p"));
        planner.plan(table.find_class(name).unwrap())
    }

    #[test]
    fn test_default_strategy() {
        let t = table("class Box { public: Box(); int getValue(); };\nstruct Pod { int x; };");
        let config = SynthesisConfig::default();
        assert_eq!(plan_for(&t, &config, "Box").strategy, PlanStrategy::Default);
        assert_eq!(plan_for(&t, &config, "Pod").strategy, PlanStrategy::Default);
    }

    #[test]
    fn test_fewest_parameter_constructor() {
        let t = table(
            "class Rect { public: Rect(int w, int h, int d); Rect(int side); Rect(const Rect& o); int area(); };",
        );
        let plan = plan_for(&t, &SynthesisConfig::default(), "Rect");
        match plan.strategy {
            PlanStrategy::ParameterizedConstructor { constructor, substitutions } => {
                assert_eq!(constructor.parameters.len(), 1);
                assert!(substitutions.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_ceiling_and_self_reference() {
        let t = table(
            "class Wide { public: Wide(int a, int b, int c, int d, int e, int f); };\nclass Copy { public: Copy(const Copy& o); };\nclass Hidden { Hidden(); public: void f(); };",
        );
        let config = SynthesisConfig::default();
        assert_eq!(
            plan_for(&t, &config, "Wide").strategy,
            PlanStrategy::Infeasible {
                reason: InfeasibleReason::TooManyParameters { count: 6, ceiling: 5 }
            }
        );
        assert_eq!(
            plan_for(&t, &config, "Copy").strategy,
            PlanStrategy::Infeasible {
                reason: InfeasibleReason::SelfReferential
            }
        );
        assert_eq!(
            plan_for(&t, &config, "Hidden").strategy,
            PlanStrategy::Infeasible {
                reason: InfeasibleReason::NoPublicConstructor
            }
        );

        let mut relaxed = SynthesisConfig::default();
        relaxed.constructor_param_ceiling = 6;
        assert!(plan_for(&t, &relaxed, "Wide").is_feasible());
    }

    #[test]
    fn test_abstract_is_infeasible() {
        let t = table("class Shape { public: virtual double area() const = 0; static Shape* make(); };");
        assert_eq!(
            plan_for(&t, &SynthesisConfig::default(), "Shape").strategy,
            PlanStrategy::Infeasible {
                reason: InfeasibleReason::Abstract
            }
        );
    }

    const DEPENDENT: &str = "class State { public: State(int jobs); virtual bool dirty() const; };\nclass Builder { public: Builder(State& state); void run(); };\nclass Cleaner { public: Cleaner(State* state); void clean(); };";

    #[test]
    fn test_unresolvable_dependency_without_substitution() {
        let t = table(DEPENDENT);
        let config = SynthesisConfig::default();
        assert_eq!(
            plan_for(&t, &config, "Builder").strategy,
            PlanStrategy::Infeasible {
                reason: InfeasibleReason::UnresolvableDependency {
                    type_name: "State".to_string()
                }
            }
        );
        // Pointer dependencies fall back to null.
        assert!(plan_for(&t, &config, "Cleaner").is_feasible());
    }

    #[test]
    fn test_substitution_unblocks_dependents() {
        let t = table(DEPENDENT);
        let mut config = SynthesisConfig::default();
        config.substitution_classes = vec!["State".to_string()];
        let planner = InstantiationPlanner::new(&t, &config, Path::new("/p"));
        let cache = planner.plan_all();

        match &cache.get("Builder").unwrap().strategy {
            PlanStrategy::ParameterizedConstructor { substitutions, .. } => {
                assert_eq!(substitutions.len(), 1);
                assert_eq!(substitutions[0].stand_in, "StubState");
            }
            other => panic!("unexpected {other:?}"),
        }
        // The substituted class itself is planned through its own stand-in
        // only when its constructor is otherwise unusable; here it is usable.
        assert!(matches!(
            cache.get("State").unwrap().strategy,
            PlanStrategy::ParameterizedConstructor { .. }
        ));
        let stand_in = cache.stand_ins().get("StubState").unwrap();
        assert!(stand_in.header_text.contains("#include \"src/x.h\""));
        assert_eq!(cache.stand_in_names().get("State").map(String::as_str), Some("StubState"));
    }

    #[test]
    fn test_self_substitute_when_constructor_unusable() {
        let t = table("class Engine { public: Engine(int a, int b, int c, int d, int e, int f); int rpm() const; };");
        let mut config = SynthesisConfig::default();
        config.substitution_classes = vec!["Engine".to_string()];
        assert_eq!(
            plan_for(&t, &config, "Engine").strategy,
            PlanStrategy::Substitute {
                stand_in: "StubEngine".to_string()
            }
        );
    }
}
