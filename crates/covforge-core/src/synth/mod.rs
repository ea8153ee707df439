//! Type-driven argument synthesis.
//!
//! Given a parameter list and a [`ParamMode`], produce the declaration
//! statements and argument expressions a generated test needs to make the
//! call. Parameters that must be materialized as locals get index-derived
//! names (`argN` for mutable references, `paramN` for const references and
//! stand-in objects) so repeated base types never collide.

pub mod category;

pub use category::{
    bare_type, classify, decayed_category, is_comparable, is_numeric, unqualified,
    value_category, TypeCategory,
};

use crate::domain::ParameterSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Value flavour for synthesized arguments.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ParamMode {
    #[default]
    Default,
    EdgeCase,
    Boundary,
}

impl ParamMode {
    pub fn name(&self) -> &'static str {
        match self {
            ParamMode::Default => "default",
            ParamMode::EdgeCase => "edge_case",
            ParamMode::Boundary => "boundary",
        }
    }
}

/// Output of [`ParameterSynthesizer::synthesize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesizedArguments {
    /// Statements that must precede the call.
    pub declarations: Vec<String>,

    /// One expression per parameter, in order.
    pub arguments: Vec<String>,

    /// Stand-in types referenced by the declarations.
    pub stand_ins: BTreeSet<String>,
}

impl SynthesizedArguments {
    /// Comma-joined argument list.
    pub fn call_list(&self) -> String {
        self.arguments.join(", ")
    }
}

/// Length of the boundary text literal.
pub const LONG_TEXT_LEN: usize = 256;

/// Produces argument expressions from declared parameter types.
#[derive(Debug, Clone, Default)]
pub struct ParameterSynthesizer {
    /// Bare dependency type → stand-in type name.
    stand_ins: BTreeMap<String, String>,
}

impl ParameterSynthesizer {
    pub fn new(stand_ins: BTreeMap<String, String>) -> Self {
        Self { stand_ins }
    }

    fn stand_in_for(&self, base: &str) -> Option<&String> {
        self.stand_ins
            .get(base)
            .or_else(|| self.stand_ins.get(unqualified(base)))
    }

    /// Synthesize declarations and arguments for `parameters`.
    pub fn synthesize(&self, parameters: &[ParameterSpec], mode: ParamMode) -> SynthesizedArguments {
        self.synthesize_from(parameters, mode, 0)
    }

    /// Like [`synthesize`](Self::synthesize), numbering locals from
    /// `first_slot` so two parameter lists can share one scope.
    pub fn synthesize_from(
        &self,
        parameters: &[ParameterSpec],
        mode: ParamMode,
        first_slot: usize,
    ) -> SynthesizedArguments {
        let mut out = SynthesizedArguments::default();
        for (index, param) in parameters.iter().enumerate() {
            let slot = first_slot + index;
            let declared = param.declared_type.trim();
            let base = bare_type(declared);
            let category = classify(declared);
            let arg = match category {
                TypeCategory::Pointer => match self.stand_in_for(&base) {
                    Some(stub) => {
                        let local = format!("param{}", slot);
                        out.declarations.push(format!("{} {};", stub, local));
                        out.stand_ins.insert(stub.clone());
                        format!("&{}", local)
                    }
                    None => "nullptr".to_string(),
                },
                TypeCategory::NonConstReference => {
                    let local = format!("arg{}", slot);
                    let decl = match self.stand_in_for(&base) {
                        Some(stub) => {
                            out.stand_ins.insert(stub.clone());
                            format!("{} {};", stub, local)
                        }
                        None => self.local_declaration(&base, &local, mode, index, false),
                    };
                    out.declarations.push(decl);
                    local
                }
                TypeCategory::ConstReference => {
                    let local = format!("param{}", slot);
                    let decl = match self.stand_in_for(&base) {
                        Some(stub) => {
                            out.stand_ins.insert(stub.clone());
                            format!("{} {};", stub, local)
                        }
                        None => self.local_declaration(&base, &local, mode, index, true),
                    };
                    out.declarations.push(decl);
                    local
                }
                TypeCategory::RvalueReference => match self.stand_in_for(&base) {
                    Some(stub) => {
                        out.stand_ins.insert(stub.clone());
                        format!("{}()", stub)
                    }
                    None => self.value_expression(&base, value_category(&base), mode, index),
                },
                TypeCategory::Text if declared.contains('*') => text_literal(mode),
                _ => match self.stand_in_for(&base) {
                    Some(stub) if category == TypeCategory::Custom => {
                        out.stand_ins.insert(stub.clone());
                        format!("{}()", stub)
                    }
                    _ => self.value_expression(&base, category, mode, index),
                },
            };
            out.arguments.push(arg);
        }
        out
    }

    /// Declaration of a local of `base` type initialised for `mode`.
    fn local_declaration(
        &self,
        base: &str,
        local: &str,
        mode: ParamMode,
        index: usize,
        is_const: bool,
    ) -> String {
        let qualifier = if is_const { "const " } else { "" };
        let category = value_category(base);
        match (category, mode) {
            (TypeCategory::Custom, ParamMode::Default) if !is_const => {
                format!("{} {};", base, local)
            }
            (TypeCategory::Custom, _) | (TypeCategory::Void, _) => {
                format!("{}{} {}{{}};", qualifier, base, local)
            }
            // Non-const locals are zero-initialized regardless of flavour.
            (_, ParamMode::EdgeCase | ParamMode::Boundary) if !is_const => {
                format!("{} {}{{}};", base, local)
            }
            _ => format!(
                "{}{} {} = {};",
                qualifier,
                base,
                local,
                self.value_expression(base, category, mode, index)
            ),
        }
    }

    /// Inline value expression for a by-value parameter.
    fn value_expression(
        &self,
        base: &str,
        category: TypeCategory,
        mode: ParamMode,
        index: usize,
    ) -> String {
        let even = index % 2 == 0;
        match category {
            TypeCategory::Integer => match mode {
                ParamMode::Default | ParamMode::EdgeCase => "0".to_string(),
                ParamMode::Boundary if even => format!("std::numeric_limits<{}>::max()", base),
                ParamMode::Boundary => format!("std::numeric_limits<{}>::min()", base),
            },
            TypeCategory::Floating => {
                let suffix = if base == "float" { "f" } else { "" };
                match mode {
                    ParamMode::Default | ParamMode::EdgeCase => format!("0.0{}", suffix),
                    ParamMode::Boundary if base == "float" => {
                        if even { "1.0e30f" } else { "1.0e-30f" }.to_string()
                    }
                    ParamMode::Boundary if even => "1.0e300".to_string(),
                    ParamMode::Boundary => "1.0e-300".to_string(),
                }
            }
            TypeCategory::Boolean => match mode {
                ParamMode::EdgeCase => "false".to_string(),
                ParamMode::Default | ParamMode::Boundary => "true".to_string(),
            },
            TypeCategory::Text => text_literal(mode),
            TypeCategory::Pointer => "nullptr".to_string(),
            _ => format!("{}()", base),
        }
    }
}

fn text_literal(mode: ParamMode) -> String {
    match mode {
        ParamMode::Boundary => format!("\"{}\"", "x".repeat(LONG_TEXT_LEN)),
        ParamMode::Default | ParamMode::EdgeCase => "\"\"".to_string(),
    }
}
