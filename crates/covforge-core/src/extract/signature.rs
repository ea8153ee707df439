//! Declaration and parameter-list parsing inside bounded regions.

use super::lexer::{find_top_level_paren, is_identifier, matching_paren, normalize_ws, split_top_level};
use crate::domain::{AccessLevel, MethodFlags, MethodModel, ParameterSpec};

/// Words that never name a parameter.
const TYPE_WORDS: &[&str] = &[
    "int", "char", "bool", "float", "double", "long", "short", "unsigned", "signed", "void",
    "auto", "const", "volatile", "wchar_t", "char16_t", "char32_t", "char8_t", "size_t",
    "struct", "class", "enum", "typename", "restrict",
];

/// Leading words that make a declaration irrelevant for modelling.
const SKIP_PREFIXES: &[&str] = &[
    "friend", "using", "typedef", "template", "static_assert", "class", "struct", "enum",
    "union", "namespace", "return", "public", "protected", "private",
];

const MODIFIERS: &[&str] = &[
    "virtual", "static", "inline", "explicit", "constexpr", "consteval", "extern", "mutable",
];

/// A single classified declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Method(MethodModel),

    /// `= delete` function; constructors still count as declared.
    Deleted { is_constructor: bool },

    Variable { declared_type: String, name: String },

    Skip,
}

/// Parse one declaration. `owner` is the enclosing class name, `None` at
/// namespace scope.
pub fn parse_declaration(raw: &str, owner: Option<&str>, access: AccessLevel) -> Declaration {
    let text = strip_attributes(&normalize_ws(raw));
    let text = text.trim().trim_start_matches([',', ':']).trim();
    if text.is_empty() {
        return Declaration::Skip;
    }
    let first_word = text
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();
    if SKIP_PREFIXES.contains(&first_word) {
        return Declaration::Skip;
    }

    let Some(open) = find_top_level_paren(text) else {
        return parse_variable(text);
    };
    if text[..open]
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|w| w == "operator")
    {
        return Declaration::Skip;
    }
    if has_top_level_assign(&text[..open]) {
        return parse_variable(text);
    }
    let Some(close) = matching_paren(text, open) else {
        return Declaration::Skip;
    };

    let before = text[..open].trim_end();
    let name_start =
        end_of_last(before, |c| !(c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '~'));
    let qualified_name = &before[name_start..];
    if qualified_name.is_empty() {
        return Declaration::Skip;
    }
    let params_text = &text[open + 1..close];
    if params_text.trim_start().starts_with(['*', '&', '^']) {
        // Function pointer or reference declarator.
        return Declaration::Skip;
    }

    let mut name = qualified_name.to_string();
    if let Some(pos) = qualified_name.rfind("::") {
        match owner {
            Some(_) => name = qualified_name[pos + 2..].to_string(),
            // Out-of-line member definition, not a free function.
            None => return Declaration::Skip,
        }
    }
    let bare = name.trim_start_matches('~');
    if !is_identifier(bare) {
        return Declaration::Skip;
    }

    let mut flags = MethodFlags::default();
    let mut prefix_tokens = Vec::new();
    for token in before[..name_start].split_whitespace() {
        match token {
            "virtual" => flags.is_virtual = true,
            "static" => flags.is_static = true,
            t if MODIFIERS.contains(&t) => {}
            t if is_export_macro(t) => {}
            t => prefix_tokens.push(t),
        }
    }
    let mut return_type = tidy_type(&prefix_tokens.join(" "));

    let suffix = parse_suffix(&text[close + 1..]);
    if suffix.deleted {
        return Declaration::Deleted {
            is_constructor: owner == Some(name.as_str()),
        };
    }
    flags.is_const = suffix.is_const;
    flags.is_pure_virtual = suffix.pure;
    if suffix.is_override || suffix.pure {
        flags.is_virtual = true;
    }
    if let Some(trailing) = suffix.trailing_return {
        if return_type == "auto" || return_type.is_empty() {
            return_type = trailing;
        }
    }

    match owner {
        Some(class) if name == class => {
            if !return_type.is_empty() {
                return Declaration::Skip;
            }
            flags.is_constructor = true;
        }
        Some(class) if name.starts_with('~') => {
            if &name[1..] != class {
                return Declaration::Skip;
            }
            flags.is_destructor = true;
        }
        _ => {
            if return_type.is_empty() || name.starts_with('~') {
                // Macro invocation or stray call expression.
                return Declaration::Skip;
            }
        }
    }

    let Some((parameters, variadic)) = parse_parameters(params_text) else {
        return Declaration::Skip;
    };
    flags.is_variadic = variadic;

    Declaration::Method(MethodModel {
        name,
        return_type,
        parameters,
        flags,
        access,
    })
}

/// Parse a parameter list into specs plus a variadic marker.
///
/// Returns `None` when an entry cannot be a parameter declaration
/// (e.g. `10` in `std::vector<int> v(10)`).
pub fn parse_parameters(text: &str) -> Option<(Vec<ParameterSpec>, bool)> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "void" {
        return Some((Vec::new(), false));
    }
    let mut params = Vec::new();
    let mut variadic = false;
    for raw in split_top_level(trimmed, b',') {
        let mut piece = normalize_ws(raw);
        if piece.is_empty() {
            continue;
        }
        if piece.contains("...") {
            variadic = true;
            continue;
        }
        let mut has_default = false;
        if let Some(eq) = top_level_assign_pos(&piece) {
            has_default = true;
            piece = piece[..eq].trim().to_string();
        }
        let first = piece.chars().next()?;
        if !(first.is_ascii_alphabetic() || first == '_' || first == ':') {
            return None;
        }
        let mut spec = split_type_and_name(&piece);
        spec.has_default = has_default;
        params.push(spec);
    }
    Some((params, variadic))
}

/// Byte offset just past the last char matching `pred`, or 0.
fn end_of_last(text: &str, pred: impl Fn(char) -> bool) -> usize {
    text.char_indices()
        .rev()
        .find(|&(_, c)| pred(c))
        .map_or(0, |(i, c)| i + c.len_utf8())
}

/// Split `const std::string& label` into type and name.
///
/// The final identifier is the name unless it looks like part of a type:
/// a builtin type word, the tail of a qualified name, or the only token.
pub fn split_type_and_name(param: &str) -> ParameterSpec {
    let mut text = param.trim().to_string();
    let mut array = false;
    while text.ends_with(']') {
        match text.rfind('[') {
            Some(open) => {
                text.truncate(open);
                text = text.trim_end().to_string();
                array = true;
            }
            None => break,
        }
    }
    let name_start = end_of_last(&text, |c| !(c.is_ascii_alphanumeric() || c == '_'));
    let candidate = &text[name_start..];
    let rest = text[..name_start].trim_end();
    let looks_like_type = candidate.is_empty()
        || !is_identifier(candidate)
        || rest.is_empty()
        || TYPE_WORDS.contains(&candidate)
        || rest.ends_with("::")
        || rest.ends_with('<')
        || rest.ends_with(',');

    if looks_like_type {
        let mut declared = tidy_type(&text);
        if array {
            declared.push('*');
        }
        return ParameterSpec::new(declared, "");
    }
    let mut declared = tidy_type(rest);
    if array {
        declared.push('*');
    }
    ParameterSpec::new(declared, candidate)
}

/// Whitespace-normalize a type and attach `*`/`&` to the preceding token.
pub fn tidy_type(raw: &str) -> String {
    let collapsed = normalize_ws(raw);
    let mut out = String::with_capacity(collapsed.len());
    for ch in collapsed.chars() {
        if matches!(ch, '*' | '&') && out.ends_with(' ') {
            out.pop();
        }
        out.push(ch);
    }
    out.replace(" >", ">").replace("< ", "<")
}

#[derive(Debug, Default)]
struct Suffix {
    is_const: bool,
    is_override: bool,
    pure: bool,
    deleted: bool,
    trailing_return: Option<String>,
}

fn parse_suffix(raw: &str) -> Suffix {
    let mut text = raw.trim().to_string();
    // Constructor initializer list.
    if let Some(pos) = single_colon_pos(&text) {
        text.truncate(pos);
    }
    let mut suffix = Suffix::default();
    if let Some(eq) = text.rfind('=') {
        let value = text[eq + 1..].trim();
        match value {
            "0" => suffix.pure = true,
            "delete" => suffix.deleted = true,
            _ => {}
        }
        text.truncate(eq);
    }
    if let Some(arrow) = text.find("->") {
        let tail = &text[arrow + 2..];
        let ret: Vec<&str> = tail
            .split_whitespace()
            .take_while(|t| !matches!(*t, "override" | "final" | "noexcept"))
            .collect();
        suffix.trailing_return = Some(tidy_type(&ret.join(" ")));
        suffix.is_override = tail.split_whitespace().any(|t| t == "override");
        text.truncate(arrow);
    }
    for token in text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_')) {
        match token {
            "const" => suffix.is_const = true,
            "override" => suffix.is_override = true,
            _ => {}
        }
    }
    suffix
}

fn parse_variable(text: &str) -> Declaration {
    let mut decl = text.to_string();
    if let Some(eq) = top_level_assign_pos(&decl) {
        decl.truncate(eq);
    }
    // Bit-field width.
    if let Some(colon) = single_colon_pos(&decl) {
        decl.truncate(colon);
    }
    let first = split_top_level(&decl, b',').into_iter().next().unwrap_or_default();
    let tokens: Vec<&str> = first
        .split_whitespace()
        .filter(|t| !MODIFIERS.contains(t) && !is_export_macro(t))
        .collect();
    if tokens.len() < 2 && !first.contains(['*', '&']) {
        return Declaration::Skip;
    }
    let spec = split_type_and_name(&tokens.join(" "));
    if spec.name.is_empty() || spec.declared_type.is_empty() {
        return Declaration::Skip;
    }
    Declaration::Variable {
        declared_type: spec.declared_type,
        name: spec.name,
    }
}

fn strip_attributes(text: &str) -> String {
    let mut out = text.to_string();
    while let Some(start) = out.find("[[") {
        match out[start..].find("]]") {
            Some(end) => out.replace_range(start..start + end + 2, " "),
            None => break,
        }
    }
    out
}

fn is_export_macro(token: &str) -> bool {
    token.len() > 3
        && token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        && (token.ends_with("_API") || token.ends_with("EXPORT") || token.ends_with("_DLL"))
}

fn has_top_level_assign(text: &str) -> bool {
    top_level_assign_pos(text).is_some()
}

/// Position of a top-level `=` that is not part of `==`, `<=`, `>=`, `!=`.
fn top_level_assign_pos(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' | b'>' => depth = (depth - 1).max(0),
            b'=' if depth == 0 => {
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                if !matches!(prev, b'=' | b'!' | b'<' | b'>') && next != b'=' {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Position of a `:` that is not part of `::`.
fn single_colon_pos(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    (0..bytes.len()).find(|&i| {
        bytes[i] == b':'
            && bytes.get(i + 1) != Some(&b':')
            && (i == 0 || bytes[i - 1] != b':')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(decl: &str, owner: Option<&str>) -> MethodModel {
        match parse_declaration(decl, owner, AccessLevel::Public) {
            Declaration::Method(m) => m,
            other => panic!("expected method for {decl:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_method() {
        let m = method("int getValue() const", Some("Box"));
        assert_eq!(m.name, "getValue");
        assert_eq!(m.return_type, "int");
        assert!(m.flags.is_const);
        assert!(m.parameters.is_empty());
    }

    #[test]
    fn test_modifiers() {
        let m = method("static inline std::size_t count(void)", Some("Box"));
        assert!(m.flags.is_static);
        assert_eq!(m.return_type, "std::size_t");

        let m = method("virtual void draw(Canvas& c) = 0", Some("Shape"));
        assert!(m.flags.is_virtual);
        assert!(m.flags.is_pure_virtual);

        let m = method("void draw(Canvas& c) override", Some("Circle"));
        assert!(m.flags.is_virtual);
        assert!(!m.flags.is_pure_virtual);
    }

    #[test]
    fn test_constructor_and_destructor() {
        let ctor = method("explicit Box(int w, int h = 3)", Some("Box"));
        assert!(ctor.flags.is_constructor);
        assert_eq!(ctor.parameters.len(), 2);
        assert!(!ctor.parameters[0].has_default);
        assert!(ctor.parameters[1].has_default);

        let ctor = method("Box() : width_(0), height_{0}", Some("Box"));
        assert!(ctor.flags.is_constructor);
        assert!(ctor.parameters.is_empty());

        let dtor = method("virtual ~Box()", Some("Box"));
        assert!(dtor.flags.is_destructor);
        assert!(dtor.flags.is_virtual);
    }

    #[test]
    fn test_deleted_and_operator() {
        assert_eq!(
            parse_declaration("Box() = delete", Some("Box"), AccessLevel::Public),
            Declaration::Deleted { is_constructor: true }
        );
        assert_eq!(
            parse_declaration("Box& operator=(const Box&)", Some("Box"), AccessLevel::Public),
            Declaration::Skip
        );
    }

    #[test]
    fn test_trailing_return() {
        let m = method("auto area() const -> double", Some("Box"));
        assert_eq!(m.return_type, "double");
        assert!(m.flags.is_const);
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            parse_declaration("int width_ = 4", Some("Box"), AccessLevel::Private),
            Declaration::Variable {
                declared_type: "int".to_string(),
                name: "width_".to_string()
            }
        );
        assert_eq!(
            parse_declaration("std::vector<int> items", Some("Box"), AccessLevel::Private),
            Declaration::Variable {
                declared_type: "std::vector<int>".to_string(),
                name: "items".to_string()
            }
        );
        assert_eq!(
            parse_declaration("unsigned flags : 3", Some("Box"), AccessLevel::Private),
            Declaration::Variable {
                declared_type: "unsigned".to_string(),
                name: "flags".to_string()
            }
        );
    }

    #[test]
    fn test_skips() {
        for decl in [
            "friend class Helper",
            "using Base::Base",
            "typedef int Id",
            "DISALLOW_COPY(Box)",
            "void (*callback)(int)",
            "Q_OBJECT",
        ] {
            assert_eq!(
                parse_declaration(decl, Some("Box"), AccessLevel::Public),
                Declaration::Skip,
                "{decl}"
            );
        }
    }

    #[test]
    fn test_free_function_rules() {
        let f = method("int add(int a, int b)", None);
        assert_eq!(f.name, "add");
        assert_eq!(
            parse_declaration("int Box::width() const", None, AccessLevel::Public),
            Declaration::Skip
        );
        assert_eq!(
            parse_declaration("std::vector<int> v(10)", None, AccessLevel::Public),
            Declaration::Skip
        );
    }

    #[test]
    fn test_parameter_names() {
        let (params, variadic) =
            parse_parameters("const std::string &label, std::map<int, int> m, int, unsigned long, char buf[16]")
                .unwrap();
        assert!(!variadic);
        assert_eq!(params[0], ParameterSpec::new("const std::string&", "label"));
        assert_eq!(params[1], ParameterSpec::new("std::map<int, int>", "m"));
        assert_eq!(params[2], ParameterSpec::new("int", ""));
        assert_eq!(params[3], ParameterSpec::new("unsigned long", ""));
        assert_eq!(params[4], ParameterSpec::new("char*", "buf"));
    }

    #[test]
    fn test_unnamed_type_constructs() {
        let (params, _) = parse_parameters("Widget*, const Widget&, std::string, Widget&&").unwrap();
        assert!(params.iter().all(|p| p.name.is_empty()));
        assert_eq!(params[1].declared_type, "const Widget&");
        assert_eq!(params[3].declared_type, "Widget&&");
    }

    #[test]
    fn test_multibyte_before_name() {
        assert_eq!(
            parse_declaration("int café()", Some("A"), AccessLevel::Public),
            Declaration::Skip
        );
        assert_eq!(
            parse_declaration("int caf\u{FFFD}()", Some("A"), AccessLevel::Public),
            Declaration::Skip
        );
        let m = method("void f(int é)", Some("A"));
        assert_eq!(m.name, "f");
        assert!(m.parameters[0].name.is_empty());
    }

    #[test]
    fn test_variadic() {
        let (params, variadic) = parse_parameters("const char* fmt, ...").unwrap();
        assert!(variadic);
        assert_eq!(params.len(), 1);
    }
}
