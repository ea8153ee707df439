//! Structural model extraction from raw header text.
//!
//! Extraction runs in two layers. A scope scanner walks a sanitized header,
//! bounding every `{...}` region by brace matching and classifying the text
//! in front of it (namespace, `extern "C"`, class/struct head, function
//! head). Class bodies are then cut into access sections and individual
//! declarations, which [`signature::parse_declaration`] classifies.

pub mod lexer;
pub mod signature;

use crate::config::SynthesisConfig;
use crate::domain::{
    AccessLevel, ClassModel, ExtractionError, FreeFunction, ModelTable, SourceUnit,
};
use signature::Declaration;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Tunables for extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Free functions kept per header.
    pub max_free_functions: usize,

    pub include_free_functions: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_free_functions: 20,
            include_free_functions: true,
        }
    }
}

impl From<&SynthesisConfig> for ExtractOptions {
    fn from(config: &SynthesisConfig) -> Self {
        Self {
            max_free_functions: config.max_free_functions_per_header,
            include_free_functions: config.include_free_functions,
        }
    }
}

/// Turns headers into a [`ModelTable`].
#[derive(Debug, Clone, Default)]
pub struct StructuralModelExtractor {
    options: ExtractOptions,
}

impl StructuralModelExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Extract every header in `units`. Unreadable headers are skipped.
    pub fn extract(&self, units: &[SourceUnit]) -> ModelTable {
        let mut table = ModelTable::default();
        for unit in units.iter().filter(|u| u.is_header()) {
            match self.extract_file(unit) {
                Ok(found) => table.absorb(found),
                Err(e) => warn!(event = "extract.unit_skipped", error = %e),
            }
        }
        table
    }

    /// Extract headers on the blocking pool, one task per header.
    ///
    /// Results are merged in input order so the table is identical to
    /// [`StructuralModelExtractor::extract`].
    pub async fn extract_concurrent(&self, units: &[SourceUnit]) -> ModelTable {
        let mut tasks = Vec::new();
        for unit in units.iter().filter(|u| u.is_header()).cloned() {
            let extractor = self.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                extractor.extract_file(&unit)
            }));
        }

        let mut table = ModelTable::default();
        for task in tasks {
            match task.await {
                Ok(Ok(found)) => table.absorb(found),
                Ok(Err(e)) => warn!(event = "extract.unit_skipped", error = %e),
                Err(e) => warn!(event = "extract.task_failed", error = %e),
            }
        }
        table
    }

    /// Read and extract one header.
    pub fn extract_file(&self, unit: &SourceUnit) -> Result<ModelTable, ExtractionError> {
        let bytes = std::fs::read(&unit.path).map_err(|source| ExtractionError::Unreadable {
            path: unit.path.clone(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(self.extract_text(unit, &text))
    }

    /// Extract from in-memory text attributed to `unit`.
    pub fn extract_text(&self, unit: &SourceUnit, text: &str) -> ModelTable {
        let clean = lexer::sanitize(text);
        let mut scan = HeaderScan {
            text: &clean,
            unit,
            options: &self.options,
            table: ModelTable::default(),
            free_functions: 0,
        };
        scan.scope(0, clean.len(), "");
        debug!(
            header = %unit.path.display(),
            classes = scan.table.class_count(),
            free_functions = scan.table.free_functions.len(),
            "extracted header"
        );
        scan.table
    }
}

struct HeaderScan<'a> {
    text: &'a str,
    unit: &'a SourceUnit,
    options: &'a ExtractOptions,
    table: ModelTable,
    free_functions: usize,
}

struct ClassHead {
    is_struct: bool,
    name: String,
    bases: BTreeSet<String>,
}

impl HeaderScan<'_> {
    /// Scan `[start, end)` as namespace-level code inside `namespace`.
    fn scope(&mut self, start: usize, end: usize, namespace: &str) {
        let bytes = self.text.as_bytes();
        let mut i = start;
        let mut stmt_start = start;
        while i < end {
            match bytes[i] {
                b';' => {
                    let stmt = &self.text[stmt_start..i];
                    self.statement(stmt, namespace, false);
                    i += 1;
                    stmt_start = i;
                }
                b'{' => {
                    let head = self.text[stmt_start..i].trim();
                    match lexer::matching_brace(self.text, i).filter(|&c| c < end) {
                        Some(close) => {
                            self.block(head, i, close, namespace);
                            i = close + 1;
                            stmt_start = i;
                        }
                        None => {
                            self.unbalanced(head, i);
                            return;
                        }
                    }
                }
                b'}' => {
                    i += 1;
                    stmt_start = i;
                }
                _ => i += 1,
            }
        }
    }

    fn block(&mut self, head: &str, open: usize, close: usize, namespace: &str) {
        if let Some(inner) = namespace_head(head) {
            let nested = join_namespace(namespace, &inner);
            self.scope(open + 1, close, &nested);
        } else if is_extern_block(head) {
            self.scope(open + 1, close, namespace);
        } else if let Some(class_head) = class_head(head) {
            let body = &self.text[open + 1..close];
            if body.trim().is_empty() {
                debug!(class = %class_head.name, "empty body treated as forward declaration");
                return;
            }
            let class = build_class(class_head, body, namespace, self.unit);
            self.table.insert(class);
        } else if head.ends_with(')') || head.contains(") ") {
            // Inline free function definition.
            self.statement(head, namespace, true);
        }
    }

    fn statement(&mut self, stmt: &str, namespace: &str, has_body: bool) {
        if !self.options.include_free_functions
            || self.free_functions >= self.options.max_free_functions
        {
            return;
        }
        let trimmed = stmt.trim();
        if trimmed.is_empty() || !trimmed.contains('(') {
            return;
        }
        let Declaration::Method(method) =
            signature::parse_declaration(trimmed, None, AccessLevel::Public)
        else {
            return;
        };
        if method.name == "main" || is_macro_like(&method.name) {
            return;
        }
        let func = FreeFunction {
            namespace: namespace.to_string(),
            method,
            source_header: self.unit.clone(),
        };
        debug!(function = %func.qualified_name(), inline = has_body, "free function");
        self.table.free_functions.push(func);
        self.free_functions += 1;
    }

    fn unbalanced(&self, head: &str, open: usize) {
        let name = class_head(head)
            .map(|h| h.name)
            .unwrap_or_else(|| format!("<block at line {}>", lexer::line_of(self.text, open)));
        let err = ExtractionError::UnbalancedBraces {
            path: self.unit.path.clone(),
            class_name: name,
        };
        warn!(event = "extract.unbalanced", error = %err);
    }
}

fn namespace_head(head: &str) -> Option<String> {
    let caps = static_regex!(r"^(?:inline\s+)?namespace(?:\s+([A-Za-z_][\w:]*))?\s*$")
        .captures(head)?;
    Some(
        caps.get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
    )
}

fn is_extern_block(head: &str) -> bool {
    static_regex!(r#"^extern\s*"[^"]*"$"#).is_match(head)
}

fn join_namespace(outer: &str, inner: &str) -> String {
    match (outer.is_empty(), inner.is_empty()) {
        (_, true) => outer.to_string(),
        (true, false) => inner.to_string(),
        (false, false) => format!("{}::{}", outer, inner),
    }
}

fn class_head(head: &str) -> Option<ClassHead> {
    if head.starts_with("template") {
        // Class templates cannot be instantiated without arguments.
        return None;
    }
    let caps = static_regex!(
        r"(?s)^(class|struct)\s+(?:(?:[A-Z][A-Z0-9_]*(?:_API|EXPORT|_DLL)|alignas\s*\([^)]*\))\s+)*([A-Za-z_]\w*)\s*(?:final\b)?\s*(?::\s*(.*))?$"
    )
    .captures(head)?;
    let is_struct = &caps[1] == "struct";
    let name = caps[2].to_string();
    let mut bases = BTreeSet::new();
    if let Some(list) = caps.get(3) {
        for base in lexer::split_top_level(list.as_str(), b',') {
            let cleaned: Vec<&str> = base
                .split_whitespace()
                .filter(|w| !matches!(*w, "public" | "protected" | "private" | "virtual"))
                .collect();
            let joined = signature::tidy_type(&cleaned.join(" "));
            if !joined.is_empty() {
                bases.insert(joined);
            }
        }
    }
    Some(ClassHead {
        is_struct,
        name,
        bases,
    })
}

fn is_macro_like(name: &str) -> bool {
    name.len() > 1
        && name.chars().any(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Build a class model from its body text (between the braces).
fn build_class(head: ClassHead, body: &str, namespace: &str, unit: &SourceUnit) -> ClassModel {
    let default_access = if head.is_struct {
        AccessLevel::Public
    } else {
        AccessLevel::Private
    };
    let stripped = lexer::strip_bodies(body);

    let mut class = ClassModel {
        name: head.name.clone(),
        namespace: namespace.to_string(),
        base_class_names: head.bases,
        methods: Vec::new(),
        member_variables: Vec::new(),
        has_default_constructor: false,
        is_abstract: false,
        source_header: unit.clone(),
        is_struct_kind: head.is_struct,
        has_non_public_destructor: false,
        declared_constructor_count: 0,
    };

    for (access, section) in access_sections(&stripped, default_access) {
        for decl in section.split(';') {
            match signature::parse_declaration(decl, Some(&head.name), access) {
                Declaration::Method(method) => {
                    if method.flags.is_constructor {
                        class.declared_constructor_count += 1;
                    }
                    if method.flags.is_destructor && access != AccessLevel::Public {
                        class.has_non_public_destructor = true;
                    }
                    if method.flags.is_pure_virtual {
                        class.is_abstract = true;
                    }
                    class.methods.push(method);
                }
                Declaration::Deleted { is_constructor } => {
                    if is_constructor {
                        class.declared_constructor_count += 1;
                    }
                }
                Declaration::Variable {
                    declared_type,
                    name,
                } => class.member_variables.push((declared_type, name)),
                Declaration::Skip => {}
            }
        }
    }

    class.has_default_constructor = class.declared_constructor_count == 0
        || class
            .constructors()
            .any(|c| c.callable_without_arguments());
    class
}

/// Cut a stripped class body into `(access, text)` sections.
fn access_sections(body: &str, default_access: AccessLevel) -> Vec<(AccessLevel, &str)> {
    let label = static_regex!(r"\b(public|protected|private)\s*:(:?)");
    let mut sections = Vec::new();
    let mut current = default_access;
    let mut start = 0;
    for caps in label.captures_iter(body) {
        if !caps[2].is_empty() {
            // `public::` is a qualified name, not a label.
            continue;
        }
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        sections.push((current, &body[start..whole.0]));
        current = AccessLevel::parse(&caps[1]).unwrap_or(current);
        start = whole.1;
    }
    sections.push((current, &body[start..]));
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> ModelTable {
        StructuralModelExtractor::default().extract_text(&SourceUnit::header("box.h"), text)
    }

    fn only_class(table: &ModelTable) -> &ClassModel {
        assert_eq!(table.class_count(), 1, "{:#?}", table.classes.keys());
        table.classes.values().next().unwrap()
    }

    #[test]
    fn test_box_example() {
        let table = extract("class Box { public: Box(); int getValue(); };\n");
        let class = only_class(&table);
        assert_eq!(class.name, "Box");
        assert!(class.has_default_constructor);
        let methods: Vec<_> = class.public_methods().collect();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "getValue");
        assert_eq!(methods[0].return_type, "int");
    }

    #[test]
    fn test_default_access_by_kind() {
        let table = extract("class A { int hidden(); };\nstruct B { int shown(); };");
        let a = table.find_class("A").unwrap();
        let b = table.find_class("B").unwrap();
        assert_eq!(a.methods[0].access, AccessLevel::Private);
        assert_eq!(b.methods[0].access, AccessLevel::Public);
        assert!(b.is_struct_kind);
    }

    #[test]
    fn test_nested_namespaces() {
        let table = extract(
            "namespace outer {\nnamespace inner { class Deep { public: void f(); }; }\nclass Shallow { public: void g(); };\n}\nnamespace { class Anon { public: void h(); }; }",
        );
        assert_eq!(table.find_class("Deep").unwrap().namespace, "outer::inner");
        assert_eq!(table.find_class("Shallow").unwrap().namespace, "outer");
        assert_eq!(table.find_class("Anon").unwrap().namespace, "");
        assert!(table.find_class("outer::inner::Deep").is_some());
    }

    #[test]
    fn test_inline_bodies_do_not_leak() {
        let table = extract(
            r#"class Counter {
            public:
                int next() { if (n > 0) { helper(n); } int fake(int x); return n++; }
                void reset() noexcept { n = 0; }
            private:
                int n = 0;
            };"#,
        );
        let class = only_class(&table);
        let names: Vec<&str> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["next", "reset"]);
        assert_eq!(class.member_variables, vec![("int".to_string(), "n".to_string())]);
    }

    #[test]
    fn test_comment_invisibility() {
        let table = extract(
            "// class Ghost { public: void boo(); };\n/* class Phantom { public: void f(); }; */\nclass Real { public: /* void hidden(); */ void shown(); // void trailing();\n};",
        );
        let class = only_class(&table);
        assert_eq!(class.name, "Real");
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.methods[0].name, "shown");
    }

    #[test]
    fn test_forward_declarations_rejected() {
        let table = extract("class Fwd;\nstruct Empty {};\nclass Blank {   \n };\n");
        assert_eq!(table.class_count(), 0);
    }

    #[test]
    fn test_unbalanced_class_dropped() {
        let table = extract("class Good { public: void ok(); };\nclass Broken { public: void f() { ;\n");
        assert_eq!(table.class_count(), 1);
        assert!(table.find_class("Good").is_some());
    }

    #[test]
    fn test_abstract_and_inheritance() {
        let table = extract(
            "class Shape { public: virtual ~Shape() = default; virtual double area() const = 0; };\nclass Circle final : public Shape, private detail::Tracked<Circle> { public: double area() const override; };",
        );
        let shape = table.find_class("Shape").unwrap();
        assert!(shape.is_abstract);
        let circle = table.find_class("Circle").unwrap();
        assert!(!circle.is_abstract);
        assert!(circle.base_class_names.contains("Shape"));
        assert!(circle.base_class_names.contains("detail::Tracked<Circle>"));
    }

    #[test]
    fn test_constructor_accounting() {
        let table = extract(
            "class NoDefault { public: NoDefault(int a); };\nclass Deleted { public: Deleted() = delete; void f(); };\nclass Defaulted { public: Defaulted(int a = 1); };\nclass Implicit { public: void f(); };",
        );
        assert!(!table.find_class("NoDefault").unwrap().has_default_constructor);
        let deleted = table.find_class("Deleted").unwrap();
        assert!(!deleted.has_default_constructor);
        assert_eq!(deleted.declared_constructor_count, 1);
        assert!(table.find_class("Defaulted").unwrap().has_default_constructor);
        assert!(table.find_class("Implicit").unwrap().has_default_constructor);
    }

    #[test]
    fn test_non_public_destructor() {
        let table = extract("class Singleton { public: static Singleton& get(); private: ~Singleton(); };");
        let class = only_class(&table);
        assert!(class.has_non_public_destructor);
        assert!(class.methods[0].flags.is_static);
    }

    #[test]
    fn test_free_functions() {
        let table = extract(
            "namespace math {\nint add(int a, int b);\ninline double half(double x) { return x / 2; }\nDECLARE_THING(foo);\nint Box::width() const { return 1; }\n}\nint main(int argc, char** argv);\nextern \"C\" { void c_api(void); }\n",
        );
        let names: Vec<String> = table.free_functions.iter().map(|f| f.qualified_name()).collect();
        assert_eq!(names, vec!["math::add", "math::half", "c_api"]);
    }

    #[test]
    fn test_class_templates_skipped() {
        let table = extract("template <typename T> class Holder { public: T get(); };");
        assert_eq!(table.class_count(), 0);
    }

    #[test]
    fn test_idempotent() {
        let text = "namespace a { class X { public: X(int); int f(const std::string& s) const; }; }";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn test_non_ascii_declarations_keep_other_classes() {
        let table = extract(
            "class Good { public: int ok(); };\nclass Bad { public: void f(int é); int café(); };",
        );
        let good = table.find_class("Good").unwrap();
        assert_eq!(good.methods[0].name, "ok");
        let bad = table.find_class("Bad").unwrap();
        let names: Vec<&str> = bad.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["f"]);
    }

    #[tokio::test]
    async fn test_concurrent_latin1_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.h");
        let mut bytes = b"class Good { public: int ok(); };\nclass Legacy { public: int caf".to_vec();
        bytes.extend_from_slice(&[0xE9]);
        bytes.extend_from_slice(b"(); int size(); };\n");
        std::fs::write(&path, bytes).unwrap();

        let table = StructuralModelExtractor::default()
            .extract_concurrent(&[SourceUnit::header(&path)])
            .await;
        assert_eq!(table.class_count(), 2);
        let legacy = table.find_class("Legacy").unwrap();
        let names: Vec<&str> = legacy.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["size"]);
    }

    #[test]
    fn test_export_macro_and_nested_type() {
        let table = extract(
            "class MYLIB_API Widget { public: struct Options { int depth; }; enum class Mode { A, B }; Widget(); void apply(const Options& o); };",
        );
        let class = only_class(&table);
        assert_eq!(class.name, "Widget");
        let names: Vec<&str> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Widget", "apply"]);
    }
}
