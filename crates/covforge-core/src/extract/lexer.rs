//! Minimal lexical helpers for recovering structure from C/C++ text.
//!
//! Nothing here understands the grammar. The helpers only find balanced
//! regions and top-level separators so that narrower pattern matching can
//! run inside well-bounded spans.

/// Remove comments, mask literal contents and blank preprocessor lines.
///
/// Line structure is preserved (every newline survives) so offsets map back
/// to source lines. String and character literals keep their quotes but their
/// contents become spaces, so braces or comment markers inside literals never
/// influence scanning.
pub fn sanitize(src: &str) -> String {
    blank_preprocessor(&strip_comments(src))
}

#[derive(Clone, Copy, PartialEq)]
enum LexState {
    Code,
    LineComment,
    BlockComment,
    Str,
    Char,
}

/// Replace `//` and `/* */` comments with spaces, keeping newlines.
pub fn strip_comments(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut state = LexState::Code;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match state {
            LexState::Code => match (c, next) {
                ('/', Some('/')) => {
                    state = LexState::LineComment;
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                ('/', Some('*')) => {
                    state = LexState::BlockComment;
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                ('"', _) => {
                    state = LexState::Str;
                    out.push('"');
                }
                ('\'', _) => {
                    // Digit separators (1'000'000) are not character literals.
                    let prev_digit = i > 0 && chars[i - 1].is_ascii_alphanumeric();
                    if prev_digit && next.map(|n| n.is_ascii_alphanumeric()).unwrap_or(false) {
                        out.push(c);
                    } else {
                        state = LexState::Char;
                        out.push('\'');
                    }
                }
                _ => out.push(c),
            },
            LexState::LineComment => {
                if c == '\n' {
                    state = LexState::Code;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            LexState::BlockComment => {
                if c == '*' && next == Some('/') {
                    state = LexState::Code;
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                out.push(if c == '\n' { '\n' } else { ' ' });
            }
            LexState::Str | LexState::Char => {
                let quote = if state == LexState::Str { '"' } else { '\'' };
                if c == '\\' {
                    out.push(' ');
                    if let Some(n) = next {
                        out.push(if n == '\n' { '\n' } else { ' ' });
                    }
                    i += 2;
                    continue;
                }
                if c == quote {
                    state = LexState::Code;
                    out.push(quote);
                } else if c == '\n' {
                    // Unterminated literal: recover at end of line.
                    state = LexState::Code;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
        }
        i += 1;
    }
    out
}

/// Blank out preprocessor directives, honouring line continuations.
pub fn blank_preprocessor(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut continuing = false;
    for line in src.split_inclusive('\n') {
        let directive = continuing || line.trim_start().starts_with('#');
        if directive {
            let body = line.trim_end_matches(['\n', '\r']);
            continuing = body.trim_end().ends_with('\\');
            out.extend(std::iter::repeat(' ').take(body.chars().count()));
            out.push_str(&line[body.len()..]);
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Index of the `}` matching the `{` at `open`, if any.
pub fn matching_brace(text: &str, open: usize) -> Option<usize> {
    matching_close(text, open, b'{', b'}')
}

/// Index of the `)` matching the `(` at `open`, if any.
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    matching_close(text, open, b'(', b')')
}

fn matching_close(text: &str, open: usize, open_ch: u8, close_ch: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&open_ch) {
        return None;
    }
    let mut depth = 0usize;
    for (offset, &b) in bytes[open..].iter().enumerate() {
        if b == open_ch {
            depth += 1;
        } else if b == close_ch {
            depth -= 1;
            if depth == 0 {
                return Some(open + offset);
            }
        }
    }
    None
}

/// Whether every `{` in `text` has a matching `}`.
pub fn braces_balanced(text: &str) -> bool {
    let mut depth = 0i64;
    for b in text.bytes() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Split on `sep` where no `()`, `[]`, `{}` or `<>` group is open.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut angle = 0i32;
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'<' => angle += 1,
            // `->` is not a closing angle bracket.
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' => angle = (angle - 1).max(0),
            _ if b == sep && depth == 0 && angle == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Position of the first `(` that is not inside template brackets.
pub fn find_top_level_paren(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut angle = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'<' => angle += 1,
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' => angle = (angle - 1).max(0),
            b'(' if angle == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Replace every top-level `{...}` group with `;` so inline bodies and
/// nested type bodies disappear before signature matching.
///
/// Brace groups followed by `,` or `{` are brace-initializers inside a
/// constructor initializer list and are removed without a terminator.
/// Nesting of any depth is handled because each group is bounded by
/// [`matching_brace`]. An unbalanced group truncates the output.
pub fn strip_bodies(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut copied_from = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            out.push_str(&text[copied_from..i]);
            let Some(close) = matching_brace(text, i) else {
                return out;
            };
            let follow = text[close + 1..].trim_start().bytes().next();
            if !matches!(follow, Some(b',') | Some(b'{')) {
                out.push(';');
            }
            i = close + 1;
            copied_from = i;
            continue;
        }
        i += 1;
    }
    out.push_str(&text[copied_from..]);
    out
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// 1-based line number of a byte offset.
pub fn line_of(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments_keeps_lines() {
        let src = "int a; // trailing {\n/* block\n class X { */ int b;\n";
        let out = strip_comments(src);
        assert_eq!(out.lines().count(), src.lines().count());
        assert!(!out.contains('{'));
        assert!(!out.contains("class"));
        assert!(out.contains("int a;"));
        assert!(out.contains("int b;"));
    }

    #[test]
    fn test_literals_are_masked() {
        let out = strip_comments(r#"const char* s = "{ // not a comment"; char c = '{';"#);
        assert!(!out.contains('{'));
        assert!(out.contains("char c = ' ';"));
        assert!(out.contains("const char* s = \""));
    }

    #[test]
    fn test_digit_separator_is_not_char_literal() {
        let out = strip_comments("int big = 1'000'000; class A {};");
        assert!(out.contains("class A {}"));
    }

    #[test]
    fn test_blank_preprocessor_with_continuation() {
        let src = "#define WRAP(x) \\\n  { x }\nint a;\n";
        let out = blank_preprocessor(src);
        assert!(!out.contains('{'));
        assert!(out.contains("int a;"));
        assert_eq!(out.len(), src.len());
    }

    #[test]
    fn test_matching_brace_nested() {
        let text = "{ a { b } { c { d } } }";
        assert_eq!(matching_brace(text, 0), Some(text.len() - 1));
        assert_eq!(matching_brace(text, 4), Some(8));
        assert_eq!(matching_brace("{ {", 0), None);
        assert_eq!(matching_brace("x", 0), None);
    }

    #[test]
    fn test_split_top_level_respects_groups() {
        let parts = split_top_level("std::map<int, int> m, int (*f)(int, int), int x", b',');
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].trim(), "std::map<int, int> m");
        assert_eq!(parts[1].trim(), "int (*f)(int, int)");
    }

    #[test]
    fn test_split_ignores_arrow() {
        let parts = split_top_level("auto f() -> int, b", b',');
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_strip_bodies() {
        let body = "int get() const { if (x) { return 1; } return 2; }\n Foo() : a{1}, b(2) {}\n int x{3};";
        let out = strip_bodies(body);
        assert!(!out.contains('{'));
        assert!(!out.contains("return"));
        assert!(out.contains("int get() const ;"));
        assert!(out.contains("Foo() : a, b(2) ;"));
    }

    #[test]
    fn test_braces_balanced() {
        assert!(braces_balanced("{ { } }"));
        assert!(!braces_balanced("{ {"));
        assert!(!braces_balanced("} {"));
    }
}
