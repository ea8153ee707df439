//! Optional generative text-completion collaborator.
//!
//! Completion only ever adds candidate test bodies during refinement; a
//! missing or misbehaving collaborator falls back to template synthesis.

pub mod ollama;
pub mod stream;

pub use ollama::OllamaClient;
pub use stream::{extract_test_body, StreamDecoder};

use crate::domain::{MethodModel, Result, UncoveredLine};
use crate::scenario::CompletionTarget;
use async_trait::async_trait;

#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Complete `prompt`, returning the concatenated response text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// C++-looking declaration of a method, for prompts.
pub fn signature(method: &MethodModel) -> String {
    let params: Vec<String> = method
        .parameters
        .iter()
        .map(|p| {
            if p.name.is_empty() {
                p.declared_type.clone()
            } else {
                format!("{} {}", p.declared_type, p.name)
            }
        })
        .collect();
    let mut text = String::new();
    if method.flags.is_static {
        text.push_str("static ");
    }
    if !method.return_type.is_empty() {
        text.push_str(&method.return_type);
        text.push(' ');
    }
    text.push_str(&format!("{}({})", method.name, params.join(", ")));
    if method.flags.is_const {
        text.push_str(" const");
    }
    text
}

/// Prompt asking for one GoogleTest case that reaches uncovered code.
pub fn test_prompt(target: &CompletionTarget, uncovered: &[UncoveredLine]) -> String {
    let mut prompt = String::new();
    prompt.push_str("Write one GoogleTest test case in C++.\n");
    prompt.push_str(&format!(
        "The class {} is declared in \"{}\".\n",
        target.class.qualified_name(),
        target.header
    ));
    if let Some(method) = target.method() {
        prompt.push_str(&format!("Exercise this method: {}\n", signature(method)));
    }
    let public: Vec<String> = target.class.public_methods().map(signature).collect();
    if !public.is_empty() {
        prompt.push_str("Public methods:\n");
        for line in public {
            prompt.push_str(&format!("  {};\n", line));
        }
    }
    if !uncovered.is_empty() {
        prompt.push_str("These lines are not yet executed by any test:\n");
        for line in uncovered {
            prompt.push_str(&format!("  {}:{}: {}\n", line.file, line.line, line.code));
        }
    }
    prompt.push_str("Reply with only the code: a single TEST(...) { ... } block, no main().\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParameterSpec, SourceUnit};
    use crate::extract::StructuralModelExtractor;

    #[test]
    fn test_signature_rendering() {
        let mut method = MethodModel {
            name: "clamp".to_string(),
            return_type: "int".to_string(),
            parameters: vec![ParameterSpec::new("int", "v"), ParameterSpec::new("const Range&", "")],
            flags: Default::default(),
            access: crate::domain::AccessLevel::Public,
        };
        method.flags.is_const = true;
        assert_eq!(signature(&method), "int clamp(int v, const Range&) const");
    }

    #[test]
    fn test_prompt_mentions_target_and_gaps() {
        let table = StructuralModelExtractor::default().extract_text(
            &SourceUnit::header("/p/src/box.h"),
            "class Box { public: int getValue() const; void reset(); };",
        );
        let class = table.find_class("Box").unwrap().clone();
        let target = CompletionTarget {
            class,
            method_index: 0,
            header: "src/box.h".to_string(),
        };
        let prompt = test_prompt(
            &target,
            &[UncoveredLine {
                file: "src/box.cpp".to_string(),
                line: 4,
                code: "return 10;".to_string(),
            }],
        );
        assert!(prompt.contains("declared in \"src/box.h\""));
        assert!(prompt.contains("Exercise this method: int getValue() const"));
        assert!(prompt.contains("src/box.cpp:4: return 10;"));
    }
}
