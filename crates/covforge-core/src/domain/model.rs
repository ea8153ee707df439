//! Structural model of C/C++ types recovered from header text.

use super::source::SourceUnit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Member access level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Public,
    Protected,
    Private,
}

impl AccessLevel {
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "public" => Some(AccessLevel::Public),
            "protected" => Some(AccessLevel::Protected),
            "private" => Some(AccessLevel::Private),
            _ => None,
        }
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ParameterSpec {
    /// Declared type text, whitespace-normalized (e.g. `const std::string &`).
    pub declared_type: String,

    /// Parameter name; empty for unnamed parameters.
    pub name: String,

    /// Whether the declaration carries a default argument.
    #[serde(default)]
    pub has_default: bool,
}

impl ParameterSpec {
    pub fn new(declared_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            declared_type: declared_type.into(),
            name: name.into(),
            has_default: false,
        }
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// Boolean properties of a method declaration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MethodFlags {
    pub is_const: bool,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_pure_virtual: bool,
    pub is_constructor: bool,
    pub is_destructor: bool,
    pub is_variadic: bool,
}

/// A method, constructor, destructor or free function signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MethodModel {
    pub name: String,

    /// Return type text; empty for constructors and destructors.
    pub return_type: String,

    pub parameters: Vec<ParameterSpec>,

    pub flags: MethodFlags,

    pub access: AccessLevel,
}

impl MethodModel {
    /// Whether the method can be called with no arguments.
    pub fn callable_without_arguments(&self) -> bool {
        self.parameters.iter().all(|p| p.has_default)
    }

    pub fn returns_void(&self) -> bool {
        let ret = self.return_type.trim();
        ret.is_empty() || ret == "void"
    }

    /// Copy or move constructor form: a single parameter referring to the owning class.
    pub fn is_copy_or_move_of(&self, class_name: &str) -> bool {
        if !self.flags.is_constructor || self.parameters.is_empty() {
            return false;
        }
        let required = self.parameters.iter().filter(|p| !p.has_default).count();
        required <= 1
            && self.parameters[0].declared_type.contains('&')
            && crate::synth::bare_type(&self.parameters[0].declared_type) == class_name
    }
}

/// Extracted model of a class or struct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassModel {
    pub name: String,

    /// Enclosing namespace path joined with `::`; empty for the global namespace.
    pub namespace: String,

    pub base_class_names: BTreeSet<String>,

    /// Declared methods in source order, including constructors and destructors.
    pub methods: Vec<MethodModel>,

    /// Member variables as `(type, name)` pairs.
    pub member_variables: Vec<(String, String)>,

    pub has_default_constructor: bool,

    /// True iff the class body contains a pure-virtual declaration.
    pub is_abstract: bool,

    pub source_header: SourceUnit,

    /// `struct` rather than `class`; members default to public.
    pub is_struct_kind: bool,

    /// Destructor declared protected or private.
    #[serde(default)]
    pub has_non_public_destructor: bool,

    /// Constructors declared in the body, deleted ones included.
    #[serde(default)]
    pub declared_constructor_count: usize,
}

impl ClassModel {
    /// Namespace-qualified name, e.g. `geo::Box`.
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace, self.name)
        }
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MethodModel> {
        self.methods.iter().filter(|m| m.flags.is_constructor)
    }

    pub fn public_constructors(&self) -> impl Iterator<Item = &MethodModel> {
        self.constructors()
            .filter(|m| m.access == AccessLevel::Public)
    }

    /// Public, non-special methods.
    pub fn public_methods(&self) -> impl Iterator<Item = &MethodModel> {
        self.methods.iter().filter(|m| {
            m.access == AccessLevel::Public && !m.flags.is_constructor && !m.flags.is_destructor
        })
    }

    /// Whether a public (or implicit) default constructor exists.
    pub fn has_public_default_constructor(&self) -> bool {
        if self.declared_constructor_count == 0 {
            return true;
        }
        self.public_constructors()
            .any(|c| c.callable_without_arguments())
    }

    /// Fold another definition of the same class into this one.
    pub fn merge(&mut self, other: ClassModel) {
        self.base_class_names.extend(other.base_class_names);
        self.methods.extend(other.methods);
        self.member_variables.extend(other.member_variables);
        self.has_default_constructor |= other.has_default_constructor;
        self.is_abstract |= other.is_abstract;
        self.is_struct_kind |= other.is_struct_kind;
        self.has_non_public_destructor |= other.has_non_public_destructor;
        self.declared_constructor_count += other.declared_constructor_count;
    }
}

/// A function declared at namespace scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreeFunction {
    pub namespace: String,
    pub method: MethodModel,
    pub source_header: SourceUnit,
}

impl FreeFunction {
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.method.name.clone()
        } else {
            format!("{}::{}", self.namespace, self.method.name)
        }
    }
}

/// Key of the class table: defining header plus qualified class name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassKey {
    pub header: SourceUnit,
    pub class_name: String,
}

/// Output of extraction: all classes and free functions of a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelTable {
    pub classes: BTreeMap<ClassKey, ClassModel>,
    pub free_functions: Vec<FreeFunction>,
}

impl ModelTable {
    /// Insert a class, merging it into an existing entry with the same qualified name.
    ///
    /// The first header that defined the class stays its key.
    pub fn insert(&mut self, class: ClassModel) {
        let qualified = class.qualified_name();
        if let Some(existing) = self
            .classes
            .values_mut()
            .find(|c| c.qualified_name() == qualified)
        {
            existing.merge(class);
            return;
        }
        let key = ClassKey {
            header: class.source_header.clone(),
            class_name: qualified,
        };
        self.classes.insert(key, class);
    }

    /// Merge another table into this one.
    pub fn absorb(&mut self, other: ModelTable) {
        for (_, class) in other.classes {
            self.insert(class);
        }
        for func in other.free_functions {
            let duplicate = self.free_functions.iter().any(|f| {
                f.qualified_name() == func.qualified_name()
                    && f.method.parameters == func.method.parameters
            });
            if !duplicate {
                self.free_functions.push(func);
            }
        }
    }

    pub fn find_class(&self, name: &str) -> Option<&ClassModel> {
        self.classes
            .values()
            .find(|c| c.name == name || c.qualified_name() == name)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn method_count(&self) -> usize {
        self.classes.values().map(|c| c.methods.len()).sum()
    }
}
