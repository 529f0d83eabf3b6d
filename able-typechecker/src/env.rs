//! Scope-chained declaration table
//!
//! Populated by the declaration collector and read by every later stage.
//! A child scope shares its parent through `Rc`, so a parent is frozen once
//! a child has been created from it.

use crate::types::{FunctionType, GenericParamSpec, Type, WhereConstraintSpec};
use able_ast::{Span, TypeExpression};
use indexmap::IndexMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub type_params: Vec<GenericParamSpec>,
    pub fields: IndexMap<String, Type>,
    pub where_clause: Vec<WhereConstraintSpec>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionDecl {
    pub name: String,
    pub type_params: Vec<GenericParamSpec>,
    pub variants: Vec<Type>,
    pub span: Option<Span>,
}

/// An interface method signature; `has_default` marks a default body
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub function: FunctionType,
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub type_params: Vec<GenericParamSpec>,
    /// Shape implementing targets must have; `None` accepts any concrete type
    pub self_pattern: Option<TypeExpression>,
    pub methods: IndexMap<String, MethodSignature>,
    pub where_clause: Vec<WhereConstraintSpec>,
    pub span: Option<Span>,
}

impl InterfaceDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_params: Vec::new(),
            self_pattern: None,
            methods: IndexMap::new(),
            where_clause: Vec::new(),
            span: None,
        }
    }

    pub fn type_param_names(&self) -> Vec<String> {
        self.type_params.iter().map(|p| p.name.clone()).collect()
    }

    /// The interface as a type, without arguments
    pub fn as_type(&self) -> Type {
        Type::Interface {
            name: self.name.clone(),
            type_params: self.type_param_names(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasDecl {
    pub name: String,
    pub type_params: Vec<GenericParamSpec>,
    pub target: Type,
    pub span: Option<Span>,
}

/// Everything a name can be bound to
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Struct(StructDecl),
    Union(UnionDecl),
    Interface(InterfaceDecl),
    Alias(AliasDecl),
    /// A function or overload set (`Type::Function` / `Type::Overload`)
    Function(Type),
}

impl Declaration {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Declaration::Struct(_) => "struct",
            Declaration::Union(_) => "union",
            Declaration::Interface(_) => "interface",
            Declaration::Alias(_) => "type alias",
            Declaration::Function(_) => "function",
        }
    }

    /// Number of type parameters the declared type constructor expects
    pub fn type_param_count(&self) -> usize {
        match self {
            Declaration::Struct(decl) => decl.type_params.len(),
            Declaration::Union(decl) => decl.type_params.len(),
            Declaration::Interface(decl) => decl.type_params.len(),
            Declaration::Alias(decl) => decl.type_params.len(),
            Declaration::Function(_) => 0,
        }
    }

    /// Type used when the name appears bare in a type position
    pub fn as_type(&self) -> Type {
        let names = |params: &[GenericParamSpec]| -> Vec<String> {
            params.iter().map(|p| p.name.clone()).collect()
        };
        match self {
            Declaration::Struct(decl) => Type::Struct {
                name: decl.name.clone(),
                type_params: names(&decl.type_params),
            },
            Declaration::Union(decl) => Type::Union {
                name: decl.name.clone(),
                type_params: names(&decl.type_params),
            },
            Declaration::Interface(decl) => decl.as_type(),
            Declaration::Alias(decl) => Type::Alias {
                name: decl.name.clone(),
                target: Box::new(decl.target.clone()),
            },
            Declaration::Function(function) => function.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    parent: Option<Rc<Environment>>,
    declarations: IndexMap<String, Declaration>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a nested scope whose lookups fall back to `parent`
    pub fn child(parent: Rc<Environment>) -> Self {
        Self {
            parent: Some(parent),
            declarations: IndexMap::new(),
        }
    }

    /// Bind `name` in this scope, returning the binding it replaced
    pub fn define(&mut self, name: impl Into<String>, declaration: Declaration) -> Option<Declaration> {
        self.declarations.insert(name.into(), declaration)
    }

    pub fn lookup(&self, name: &str) -> Option<&Declaration> {
        match self.declarations.get(name) {
            Some(declaration) => Some(declaration),
            None => self.parent.as_ref().and_then(|parent| parent.lookup(name)),
        }
    }

    pub fn lookup_local(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    pub fn lookup_interface(&self, name: &str) -> Option<&InterfaceDecl> {
        match self.lookup(name)? {
            Declaration::Interface(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn lookup_union(&self, name: &str) -> Option<&UnionDecl> {
        match self.lookup(name)? {
            Declaration::Union(decl) => Some(decl),
            _ => None,
        }
    }
}
