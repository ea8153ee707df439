//! Type-string classification.

use serde::{Deserialize, Serialize};

/// Parameter/return type category driving value synthesis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Void,
    Pointer,
    NonConstReference,
    ConstReference,
    RvalueReference,
    Integer,
    Floating,
    Boolean,
    Text,
    Custom,
}

const QUALIFIERS: &[&str] = &["const", "volatile", "struct", "class", "enum", "typename", "mutable"];

const INTEGER_WORDS: &[&str] = &["int", "long", "short", "unsigned", "signed", "char", "wchar_t"];

const INTEGER_ALIASES: &[&str] = &[
    "size_t", "ssize_t", "ptrdiff_t", "intptr_t", "uintptr_t", "intmax_t", "uintmax_t",
    "char8_t", "char16_t", "char32_t", "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t",
    "uint16_t", "uint32_t", "uint64_t", "byte",
];

const TEXT_TYPES: &[&str] = &[
    "std::string", "string", "std::string_view", "string_view", "std::wstring", "wstring",
    "std::u16string", "std::u32string",
];

/// Strip qualifiers, pointers and references: `const ns::Foo* const&` → `ns::Foo`.
pub fn bare_type(declared: &str) -> String {
    let cleaned = declared.replace(['*', '&'], " ");
    cleaned
        .split_whitespace()
        .filter(|w| !QUALIFIERS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Last component of a qualified name: `ns::Foo` → `Foo`.
pub fn unqualified(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

/// Whether the declared type is a `const char*`-style C string.
fn is_c_string(declared: &str) -> bool {
    let compact: String = declared.split_whitespace().collect();
    matches!(
        compact.as_str(),
        "constchar*" | "charconst*" | "constwchar_t*" | "constchar*const"
    )
}

/// Category of a value (non-pointer, non-reference) base type.
pub fn value_category(base: &str) -> TypeCategory {
    let base = base.trim();
    if base.is_empty() || base == "void" {
        return TypeCategory::Void;
    }
    if base == "bool" {
        return TypeCategory::Boolean;
    }
    if matches!(base, "float" | "double" | "long double") {
        return TypeCategory::Floating;
    }
    if TEXT_TYPES.contains(&base) {
        return TypeCategory::Text;
    }
    let last = unqualified(base);
    if INTEGER_ALIASES.contains(&last) && (base == last || base.starts_with("std::")) {
        return TypeCategory::Integer;
    }
    if base.split_whitespace().all(|w| INTEGER_WORDS.contains(&w)) {
        return TypeCategory::Integer;
    }
    TypeCategory::Custom
}

/// Category of a declared parameter or return type.
pub fn classify(declared: &str) -> TypeCategory {
    let text = declared.trim();
    if is_c_string(text) {
        return TypeCategory::Text;
    }
    if text.ends_with("&&") {
        return TypeCategory::RvalueReference;
    }
    if text.ends_with('&') {
        let is_const = text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .any(|w| w == "const");
        return if is_const {
            TypeCategory::ConstReference
        } else {
            TypeCategory::NonConstReference
        };
    }
    if text.contains('*') {
        return TypeCategory::Pointer;
    }
    value_category(&bare_type(text))
}

/// Whether values of this category can be compared with `EXPECT_EQ`.
pub fn is_comparable(category: TypeCategory) -> bool {
    matches!(
        category,
        TypeCategory::Integer
            | TypeCategory::Floating
            | TypeCategory::Boolean
            | TypeCategory::Text
            | TypeCategory::Pointer
    )
}

/// Category seen through references: `const int&` behaves like `int`.
pub fn decayed_category(declared: &str) -> TypeCategory {
    match classify(declared) {
        TypeCategory::ConstReference
        | TypeCategory::NonConstReference
        | TypeCategory::RvalueReference => {
            let inner = declared.trim().trim_end_matches('&');
            if inner.contains('*') {
                TypeCategory::Pointer
            } else {
                value_category(&bare_type(inner))
            }
        }
        other => other,
    }
}

pub fn is_numeric(category: TypeCategory) -> bool {
    matches!(category, TypeCategory::Integer | TypeCategory::Floating)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_type() {
        assert_eq!(bare_type("const std::string&"), "std::string");
        assert_eq!(bare_type("ns::Foo* const"), "ns::Foo");
        assert_eq!(bare_type("unsigned long"), "unsigned long");
        assert_eq!(bare_type("struct stat*"), "stat");
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("int*"), TypeCategory::Pointer);
        assert_eq!(classify("const char*"), TypeCategory::Text);
        assert_eq!(classify("char*"), TypeCategory::Pointer);
        assert_eq!(classify("Widget&"), TypeCategory::NonConstReference);
        assert_eq!(classify("const Widget&"), TypeCategory::ConstReference);
        assert_eq!(classify("Widget&&"), TypeCategory::RvalueReference);
        assert_eq!(classify("unsigned long long"), TypeCategory::Integer);
        assert_eq!(classify("std::uint32_t"), TypeCategory::Integer);
        assert_eq!(classify("size_t"), TypeCategory::Integer);
        assert_eq!(classify("double"), TypeCategory::Floating);
        assert_eq!(classify("bool"), TypeCategory::Boolean);
        assert_eq!(classify("std::string"), TypeCategory::Text);
        assert_eq!(classify("std::vector<int>"), TypeCategory::Custom);
        assert_eq!(classify("void"), TypeCategory::Void);
        assert_eq!(classify("const constant_t"), TypeCategory::Custom);
    }

    #[test]
    fn test_decayed_category() {
        assert_eq!(decayed_category("const int&"), TypeCategory::Integer);
        assert_eq!(decayed_category("const std::string&"), TypeCategory::Text);
        assert_eq!(decayed_category("Node*&"), TypeCategory::Pointer);
    }
}
