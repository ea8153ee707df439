//! GoogleTest translation units.
//!
//! Declarations always precede assertion macros; only a call expression
//! (whose commas sit inside its own parentheses) is ever passed to a macro.

use crate::domain::ScenarioKind;
use crate::synth::TypeCategory;

/// Standard headers every artifact includes, in order.
pub const PRELUDE: [&str; 4] = ["<gtest/gtest.h>", "<limits>", "<stdexcept>", "<string>"];

/// Number of calls made by the repetition scenarios.
const REPEAT: usize = 3;

/// One `TEST(...)` file.
#[derive(Debug, Clone, Default)]
pub struct TranslationUnit {
    /// Project header, relative to an include root.
    pub header: String,
    pub stand_in_headers: Vec<String>,

    /// Leading `//` comment lines.
    pub notes: Vec<String>,
    pub suite: String,
    pub name: String,
    pub body: Vec<String>,
}

impl TranslationUnit {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for note in &self.notes {
            out.push_str(&format!("// {}\n", note));
        }
        if !self.notes.is_empty() {
            out.push('\n');
        }
        out.push_str(&include_block(&self.header, &self.stand_in_headers));
        out.push_str(&format!("\nTEST({}, {}) {{\n", self.suite, self.name));
        for line in &self.body {
            if line.is_empty() {
                out.push('\n');
            } else {
                out.push_str(&format!("    {}\n", line));
            }
        }
        out.push_str("}\n");
        out
    }
}

/// `#include` lines for the prelude, the project header and stand-ins.
pub fn include_block(header: &str, stand_in_headers: &[String]) -> String {
    let mut out = String::new();
    for system in PRELUDE {
        out.push_str(&format!("#include {}\n", system));
    }
    out.push_str(&format!("#include \"{}\"\n", header));
    for stub in stand_in_headers {
        out.push_str(&format!("#include \"{}\"\n", stub));
    }
    out
}

/// Call, then assert on the result according to its category.
///
/// Inside a `try` block (`guarded`) a void call is made bare so that an
/// exception reaches the handler instead of failing `EXPECT_NO_THROW`.
pub fn checked_call(expression: &str, category: TypeCategory, guarded: bool) -> Vec<String> {
    match category {
        TypeCategory::Void if guarded => vec![format!("{};", expression)],
        TypeCategory::Void => vec![format!("EXPECT_NO_THROW({});", expression)],
        TypeCategory::Pointer => vec![
            format!("auto result = {};", expression),
            "if (result != nullptr) {".to_string(),
            "    EXPECT_NE(result, nullptr);".to_string(),
            "} else {".to_string(),
            "    EXPECT_EQ(result, nullptr);".to_string(),
            "}".to_string(),
        ],
        TypeCategory::Integer | TypeCategory::Floating => vec![
            format!("auto result = {};", expression),
            "EXPECT_GE(result, std::numeric_limits<decltype(result)>::lowest());".to_string(),
            "EXPECT_LE(result, std::numeric_limits<decltype(result)>::max());".to_string(),
        ],
        TypeCategory::Boolean => vec![
            format!("bool result = {};", expression),
            "(void)result;".to_string(),
            "SUCCEED();".to_string(),
        ],
        _ => vec![
            format!("auto&& result = {};", expression),
            "(void)result;".to_string(),
            "SUCCEED();".to_string(),
        ],
    }
}

/// Wrap statements in `try { ... } catch (const std::exception&)`.
pub fn guarded(lines: Vec<String>) -> Vec<String> {
    let mut out = vec!["try {".to_string()];
    out.extend(lines.into_iter().map(|l| format!("    {}", l)));
    out.push("} catch (const std::exception& e) {".to_string());
    out.push("    SUCCEED() << e.what();".to_string());
    out.push("}".to_string());
    out
}

fn repeated(expression: &str) -> Vec<String> {
    vec![
        format!("for (int i = 0; i < {}; ++i) {{", REPEAT),
        format!("    EXPECT_NO_THROW({});", expression),
        "}".to_string(),
    ]
}

fn twice(expression: &str, comparable: bool) -> Vec<String> {
    if comparable {
        vec![
            format!("auto first = {};", expression),
            format!("auto second = {};", expression),
            "EXPECT_EQ(first, second);".to_string(),
        ]
    } else {
        vec![
            format!("(void){};", expression),
            format!("(void){};", expression),
            "SUCCEED();".to_string(),
        ]
    }
}

/// Statements following the setup for a method or function call.
///
/// `comparable` allows the consistency scenarios to compare two results.
pub fn call_body(
    kind: ScenarioKind,
    expression: &str,
    category: TypeCategory,
    comparable: bool,
) -> Vec<String> {
    match kind {
        ScenarioKind::BasicUsage | ScenarioKind::ReturnValue => {
            checked_call(expression, category, false)
        }
        ScenarioKind::MultipleInvocations => repeated(expression),
        ScenarioKind::EdgeCases | ScenarioKind::BoundaryCheck => {
            guarded(checked_call(expression, category, true))
        }
        ScenarioKind::Consistency | ScenarioKind::ConsistentResults => twice(expression, comparable),
        _ => vec![format!("EXPECT_NO_THROW({});", expression)],
    }
}

/// Statements following the argument declarations for a constructor.
pub fn construction_body(kind: ScenarioKind, type_name: &str, arguments: &str) -> Vec<String> {
    let local = |name: &str| {
        if arguments.is_empty() {
            format!("{} {}{{}};", type_name, name)
        } else {
            format!("{} {}({});", type_name, name, arguments)
        }
    };
    match kind {
        ScenarioKind::MultipleInstances => vec![
            local("first"),
            local("second"),
            "(void)first;".to_string(),
            "(void)second;".to_string(),
            "SUCCEED();".to_string(),
        ],
        ScenarioKind::StackAllocation => vec![
            local("instance"),
            "(void)instance;".to_string(),
            "SUCCEED();".to_string(),
        ],
        // The cast keeps `T(x)` from parsing as a declaration of `x`.
        _ => vec![format!("EXPECT_NO_THROW((void){}({}));", type_name, arguments)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_shape() {
        let unit = TranslationUnit {
            header: "src/box.h".to_string(),
            stand_in_headers: vec!["stub_State.h".to_string()],
            notes: vec!["covforge: Box::getValue".to_string()],
            suite: "Box".to_string(),
            name: "getValue_BasicUsage".to_string(),
            body: vec!["Box obj{};".to_string(), "EXPECT_NO_THROW(obj.getValue());".to_string()],
        };
        let text = unit.render();
        assert!(text.starts_with("// covforge: Box::getValue\n\n#include <gtest/gtest.h>\n"));
        assert!(text.contains("#include \"src/box.h\"\n#include \"stub_State.h\"\n"));
        assert!(text.contains("TEST(Box, getValue_BasicUsage) {\n    Box obj{};\n"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_numeric_range_check() {
        let lines = checked_call("obj.size()", TypeCategory::Integer, false);
        assert_eq!(lines[0], "auto result = obj.size();");
        assert!(lines[1].starts_with("EXPECT_GE(result, std::numeric_limits<decltype(result)>::lowest"));
    }

    #[test]
    fn test_guarded_void_call_is_bare() {
        let lines = call_body(ScenarioKind::EdgeCases, "obj.reset(0)", TypeCategory::Void, false);
        assert_eq!(lines[0], "try {");
        assert_eq!(lines[1], "    obj.reset(0);");
        assert_eq!(lines[2], "} catch (const std::exception& e) {");
    }

    #[test]
    fn test_consistency_forms() {
        let eq = call_body(ScenarioKind::Consistency, "obj.id()", TypeCategory::Integer, true);
        assert_eq!(eq.last().map(String::as_str), Some("EXPECT_EQ(first, second);"));
        let plain = call_body(ScenarioKind::Consistency, "obj.next()", TypeCategory::Custom, false);
        assert_eq!(plain[0], "(void)obj.next();");
    }

    #[test]
    fn test_construction_forms() {
        assert_eq!(
            construction_body(ScenarioKind::BasicConstruction, "geo::Box", "param0"),
            vec!["EXPECT_NO_THROW((void)geo::Box(param0));"]
        );
        assert_eq!(
            construction_body(ScenarioKind::StackAllocation, "Box", "")[0],
            "Box instance{};"
        );
    }
}
