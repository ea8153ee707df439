//! Stand-in subtypes that unblock instantiation of dependent classes.
//!
//! A stand-in for `X` is `class StubX : public X` with a default
//! constructor forwarding zero values to X's smallest accessible
//! constructor, plus no-op overrides of up to N public virtual methods
//! (pure ones first, so an abstract dependency becomes concrete). It is
//! not a mock; its only job is to exist.

use crate::domain::{sanitize_identifier, AccessLevel, ClassModel, MethodModel};
use crate::synth::{bare_type, classify, value_category, TypeCategory};
use serde::{Deserialize, Serialize};

/// A synthesized stand-in type and its header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandIn {
    /// Stand-in type name, e.g. `StubState`.
    pub name: String,

    /// Qualified name of the substituted class.
    pub base: String,

    /// Header file name, e.g. `stub_State.h`.
    pub header_file: String,

    /// Full header contents.
    pub header_text: String,

    /// Names of the overridden methods.
    pub overridden: Vec<String>,
}

/// Builds [`StandIn`] definitions.
#[derive(Debug, Clone)]
pub struct SubstituteFactory {
    max_overrides: usize,
}

impl SubstituteFactory {
    pub fn new(max_overrides: usize) -> Self {
        Self { max_overrides }
    }

    /// Stand-in name for a class.
    pub fn stand_in_name(class: &ClassModel) -> String {
        format!("Stub{}", sanitize_identifier(&class.qualified_name()))
    }

    /// Build a stand-in for `class`, or `None` when it cannot be made
    /// constructible (no accessible constructor, or more pure virtual
    /// methods than the override budget).
    pub fn build(&self, class: &ClassModel, header_include: &str) -> Option<StandIn> {
        let pure: Vec<&MethodModel> = class
            .methods
            .iter()
            .filter(|m| m.flags.is_pure_virtual)
            .collect();
        if pure.len() > self.max_overrides {
            return None;
        }
        if pure.iter().any(|m| m.flags.is_variadic) {
            return None;
        }

        let base_ctor = if class.declared_constructor_count == 0 {
            None
        } else {
            let ctor = class
                .constructors()
                .filter(|c| c.access != AccessLevel::Private)
                .filter(|c| !c.is_copy_or_move_of(&class.name))
                .min_by_key(|c| c.parameters.iter().filter(|p| !p.has_default).count())?;
            Some(ctor)
        };

        let mut overrides: Vec<&MethodModel> = pure.clone();
        for method in class.methods.iter().filter(|m| {
            m.flags.is_virtual
                && !m.flags.is_pure_virtual
                && !m.flags.is_destructor
                && !m.flags.is_variadic
                && m.access == AccessLevel::Public
        }) {
            if overrides.len() >= self.max_overrides {
                break;
            }
            overrides.push(method);
        }

        let name = Self::stand_in_name(class);
        let base = class.qualified_name();
        let guard = format!("COVFORGE_{}_H", name.to_ascii_uppercase());

        let mut text = String::new();
        text.push_str(&format!("#ifndef {}\n#define {}\n\n", guard, guard));
        text.push_str("#include <string>\n");
        text.push_str(&format!("#include \"{}\"\n\n", header_include));
        text.push_str(&format!("class {} : public {} {{\npublic:\n", name, base));
        match base_ctor {
            Some(ctor) => {
                let args: Vec<String> = ctor
                    .parameters
                    .iter()
                    .filter(|p| !p.has_default)
                    .map(|p| zero_value(&p.declared_type))
                    .collect();
                text.push_str(&format!(
                    "    {}() : {}({}) {{}}\n",
                    name,
                    base,
                    args.join(", ")
                ));
            }
            None => text.push_str(&format!("    {}() = default;\n", name)),
        }
        for method in &overrides {
            text.push_str(&format!("    {}\n", override_definition(method)));
        }
        text.push_str("};\n\n");
        text.push_str(&format!("#endif  // {}\n", guard));

        Some(StandIn {
            header_file: format!("stub_{}.h", sanitize_identifier(&class.qualified_name())),
            name,
            base,
            header_text: text,
            overridden: overrides.iter().map(|m| m.name.clone()).collect(),
        })
    }
}

/// Zero value forwarded to the substituted constructor.
pub fn zero_value(declared: &str) -> String {
    let base = bare_type(declared);
    match classify(declared) {
        TypeCategory::Pointer => "nullptr".to_string(),
        TypeCategory::Text if declared.contains('*') => "\"\"".to_string(),
        TypeCategory::NonConstReference => {
            // A mutable reference needs an lvalue that outlives the call.
            format!("*new {}{{}}", base)
        }
        _ => match value_category(&base) {
            TypeCategory::Integer => "0".to_string(),
            TypeCategory::Floating => "0.0".to_string(),
            TypeCategory::Boolean => "false".to_string(),
            TypeCategory::Text => "\"\"".to_string(),
            _ => format!("{}()", base),
        },
    }
}

fn override_definition(method: &MethodModel) -> String {
    let params: Vec<String> = method
        .parameters
        .iter()
        .map(|p| p.declared_type.clone())
        .collect();
    let constness = if method.flags.is_const { " const" } else { "" };
    let ret = method.return_type.trim();
    format!(
        "{} {}({}){} override {{ {} }}",
        ret,
        method.name,
        params.join(", "),
        constness,
        zero_return(ret)
    )
}

fn zero_return(ret: &str) -> String {
    let category = classify(ret);
    match category {
        TypeCategory::Void => String::new(),
        TypeCategory::Pointer => "return nullptr;".to_string(),
        TypeCategory::NonConstReference
        | TypeCategory::ConstReference
        | TypeCategory::RvalueReference => {
            format!(
                "static {} value{{}}; return value;",
                bare_type(ret)
            )
        }
        TypeCategory::Boolean => "return false;".to_string(),
        TypeCategory::Integer | TypeCategory::Floating => "return 0;".to_string(),
        _ => "return {};".to_string(),
    }
}
