// Able AST Definitions
// Declaration-level nodes with source spans

use std::fmt;

/// Source position information for AST nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub start_line_col: Option<(usize, usize)>,
    pub end_line_col: Option<(usize, usize)>,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            start_line_col: None,
            end_line_col: None,
        }
    }

    pub fn with_line_col(
        start: usize,
        end: usize,
        start_line_col: (usize, usize),
        end_line_col: (usize, usize),
    ) -> Self {
        Self {
            start,
            end,
            start_line_col: Some(start_line_col),
            end_line_col: Some(end_line_col),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Type expressions as written in source: `i32`, `Array T`, `T?`, `A | B`, `_`
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpression {
    Simple {
        name: String,
        span: Span,
    },
    /// Constructor application: `Map K V` is base `Map` with args `[K, V]`
    Generic {
        base: Box<TypeExpression>,
        args: Vec<TypeExpression>,
        span: Span,
    },
    Nullable {
        inner: Box<TypeExpression>,
        span: Span,
    },
    Result {
        inner: Box<TypeExpression>,
        span: Span,
    },
    Function {
        params: Vec<TypeExpression>,
        return_type: Box<TypeExpression>,
        span: Span,
    },
    Union {
        members: Vec<TypeExpression>,
        span: Span,
    },
    Wildcard {
        span: Span,
    },
}

impl TypeExpression {
    pub fn simple(name: impl Into<String>) -> Self {
        Self::Simple {
            name: name.into(),
            span: Span::default(),
        }
    }

    /// Generic application with a named base: `generic("Array", [simple("T")])`
    pub fn generic(base: impl Into<String>, args: Vec<TypeExpression>) -> Self {
        Self::Generic {
            base: Box::new(Self::simple(base)),
            args,
            span: Span::default(),
        }
    }

    pub fn nullable(inner: TypeExpression) -> Self {
        Self::Nullable {
            inner: Box::new(inner),
            span: Span::default(),
        }
    }

    pub fn result(inner: TypeExpression) -> Self {
        Self::Result {
            inner: Box::new(inner),
            span: Span::default(),
        }
    }

    pub fn function(params: Vec<TypeExpression>, return_type: TypeExpression) -> Self {
        Self::Function {
            params,
            return_type: Box::new(return_type),
            span: Span::default(),
        }
    }

    pub fn union(members: Vec<TypeExpression>) -> Self {
        Self::Union {
            members,
            span: Span::default(),
        }
    }

    pub fn wildcard() -> Self {
        Self::Wildcard {
            span: Span::default(),
        }
    }

    /// Replace the span of this node (children keep theirs)
    pub fn with_span(mut self, new_span: Span) -> Self {
        match &mut self {
            Self::Simple { span, .. }
            | Self::Generic { span, .. }
            | Self::Nullable { span, .. }
            | Self::Result { span, .. }
            | Self::Function { span, .. }
            | Self::Union { span, .. }
            | Self::Wildcard { span } => *span = new_span,
        }
        self
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Simple { span, .. }
            | Self::Generic { span, .. }
            | Self::Nullable { span, .. }
            | Self::Result { span, .. }
            | Self::Function { span, .. }
            | Self::Union { span, .. }
            | Self::Wildcard { span } => *span,
        }
    }

    /// `_` may be written either as a dedicated wildcard node or as a simple name
    pub fn is_wildcard(&self) -> bool {
        match self {
            Self::Wildcard { .. } => true,
            Self::Simple { name, .. } => name == "_",
            _ => false,
        }
    }

    /// Name of the head constructor for simple and generic expressions
    pub fn base_name(&self) -> Option<&str> {
        match self {
            Self::Simple { name, .. } => Some(name.as_str()),
            Self::Generic { base, .. } => base.base_name(),
            _ => None,
        }
    }

    pub fn simple_name(&self) -> Option<&str> {
        match self {
            Self::Simple { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple { name, .. } => {
                if name.is_empty() {
                    write!(f, "unknown")
                } else {
                    write!(f, "{name}")
                }
            }
            Self::Generic { base, args, .. } => {
                write!(f, "{base}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            Self::Nullable { inner, .. } => write!(f, "{inner}?"),
            Self::Result { inner, .. } => write!(f, "Result {inner}"),
            Self::Function {
                params,
                return_type,
                ..
            } => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "fn({}) -> {}", params.join(", "), return_type)
            }
            Self::Union { members, .. } => {
                if members.is_empty() {
                    return write!(f, "Union");
                }
                let members: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "{}", members.join(" | "))
            }
            Self::Wildcard { .. } => write!(f, "_"),
        }
    }
}

/// Generic parameter with inline constraints: `T: Display + Clone`
#[derive(Debug, Clone, PartialEq)]
pub struct GenericParameter {
    pub name: String,
    pub constraints: Vec<TypeExpression>,
    pub span: Span,
}

impl GenericParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn constrained(name: impl Into<String>, constraints: Vec<TypeExpression>) -> Self {
        Self {
            name: name.into(),
            constraints,
            span: Span::default(),
        }
    }
}

/// A single `where` entry: `where T: Display`
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub subject: TypeExpression,
    pub constraints: Vec<TypeExpression>,
    pub span: Span,
}

impl WhereClause {
    pub fn new(type_param: impl Into<String>, constraints: Vec<TypeExpression>) -> Self {
        Self {
            subject: TypeExpression::simple(type_param),
            constraints,
            span: Span::default(),
        }
    }
}

/// Function parameter; the annotation is optional for `self`
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_annotation: Option<TypeExpression>,
    pub span: Span,
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_annotation: TypeExpression) -> Self {
        Self {
            name: name.into(),
            type_annotation: Some(type_annotation),
            span: Span::default(),
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_annotation: None,
            span: Span::default(),
        }
    }
}

/// Function definition or interface method signature.
///
/// Bodies are not represented; `has_body` records whether one was written,
/// which for interface signatures means a default implementation exists.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub generic_params: Vec<GenericParameter>,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeExpression>,
    pub where_clause: Vec<WhereClause>,
    pub has_body: bool,
    pub span: Span,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            params: Vec::new(),
            return_type: None,
            where_clause: Vec::new(),
            has_body: true,
            span: Span::default(),
        }
    }

    /// Interface signature without a default body
    pub fn signature(name: impl Into<String>) -> Self {
        Self {
            has_body: false,
            ..Self::new(name)
        }
    }

    pub fn with_param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_return(mut self, return_type: TypeExpression) -> Self {
        self.return_type = Some(return_type);
        self
    }

    pub fn with_generic_param(mut self, param: GenericParameter) -> Self {
        self.generic_params.push(param);
        self
    }

    pub fn with_where(mut self, clause: WhereClause) -> Self {
        self.where_clause.push(clause);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Struct field definition
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub type_annotation: TypeExpression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDefinition {
    pub name: String,
    pub generic_params: Vec<GenericParameter>,
    pub fields: Vec<StructField>,
    pub where_clause: Vec<WhereClause>,
    pub span: Span,
}

impl StructDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            fields: Vec::new(),
            where_clause: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn with_generic_param(mut self, param: GenericParameter) -> Self {
        self.generic_params.push(param);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, type_annotation: TypeExpression) -> Self {
        self.fields.push(StructField {
            name: name.into(),
            type_annotation,
            span: Span::default(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionDefinition {
    pub name: String,
    pub generic_params: Vec<GenericParameter>,
    pub variants: Vec<TypeExpression>,
    pub span: Span,
}

impl UnionDefinition {
    pub fn new(name: impl Into<String>, variants: Vec<TypeExpression>) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            variants,
            span: Span::default(),
        }
    }

    pub fn with_generic_param(mut self, param: GenericParameter) -> Self {
        self.generic_params.push(param);
        self
    }
}

/// Interface definition: `interface Show for Self { fn show(self) -> String }`
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDefinition {
    pub name: String,
    pub generic_params: Vec<GenericParameter>,
    /// The `for <pattern>` clause, absent when the interface accepts any `Self`
    pub self_type_pattern: Option<TypeExpression>,
    pub signatures: Vec<FunctionDefinition>,
    pub where_clause: Vec<WhereClause>,
    pub span: Span,
}

impl InterfaceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            self_type_pattern: None,
            signatures: Vec::new(),
            where_clause: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn with_generic_param(mut self, param: GenericParameter) -> Self {
        self.generic_params.push(param);
        self
    }

    pub fn with_self_pattern(mut self, pattern: TypeExpression) -> Self {
        self.self_type_pattern = Some(pattern);
        self
    }

    pub fn with_signature(mut self, signature: FunctionDefinition) -> Self {
        self.signatures.push(signature);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDefinition {
    pub name: String,
    pub generic_params: Vec<GenericParameter>,
    pub target: TypeExpression,
    pub where_clause: Vec<WhereClause>,
    pub span: Span,
}

impl TypeAliasDefinition {
    pub fn new(name: impl Into<String>, target: TypeExpression) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            target,
            where_clause: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn with_generic_param(mut self, param: GenericParameter) -> Self {
        self.generic_params.push(param);
        self
    }
}

/// `impl<T> Show for Wrapper T where T: Display { ... }`
///
/// A named impl (`Fancy = impl Show for i32`) is only reachable explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplementationDefinition {
    pub impl_name: Option<String>,
    pub interface_name: String,
    pub interface_args: Vec<TypeExpression>,
    pub generic_params: Vec<GenericParameter>,
    pub target: TypeExpression,
    pub where_clause: Vec<WhereClause>,
    pub definitions: Vec<FunctionDefinition>,
    pub span: Span,
}

impl ImplementationDefinition {
    pub fn new(interface_name: impl Into<String>, target: TypeExpression) -> Self {
        Self {
            impl_name: None,
            interface_name: interface_name.into(),
            interface_args: Vec::new(),
            generic_params: Vec::new(),
            target,
            where_clause: Vec::new(),
            definitions: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn named(mut self, impl_name: impl Into<String>) -> Self {
        self.impl_name = Some(impl_name.into());
        self
    }

    pub fn with_interface_arg(mut self, arg: TypeExpression) -> Self {
        self.interface_args.push(arg);
        self
    }

    pub fn with_generic_param(mut self, param: GenericParameter) -> Self {
        self.generic_params.push(param);
        self
    }

    pub fn with_where(mut self, clause: WhereClause) -> Self {
        self.where_clause.push(clause);
        self
    }

    pub fn with_definition(mut self, definition: FunctionDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Top-level declarations
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Struct(StructDefinition),
    Union(UnionDefinition),
    Interface(InterfaceDefinition),
    TypeAlias(TypeAliasDefinition),
    Function(FunctionDefinition),
    Implementation(ImplementationDefinition),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub kind: ItemKind,
    pub span: Span,
}

macro_rules! impl_item_from {
    ($def:ty, $variant:ident) => {
        impl From<$def> for Item {
            fn from(def: $def) -> Self {
                let span = def.span;
                Item {
                    kind: ItemKind::$variant(def),
                    span,
                }
            }
        }
    };
}

impl_item_from!(StructDefinition, Struct);
impl_item_from!(UnionDefinition, Union);
impl_item_from!(InterfaceDefinition, Interface);
impl_item_from!(TypeAliasDefinition, TypeAlias);
impl_item_from!(FunctionDefinition, Function);
impl_item_from!(ImplementationDefinition, Implementation);

/// A module's declarations, in source order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub items: Vec<Item>,
    pub source_file: Option<String>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: impl Into<Item>) -> Self {
        self.items.push(item.into());
        self
    }

    pub fn push(&mut self, item: impl Into<Item>) {
        self.items.push(item.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_expression_display() {
        let expr = TypeExpression::generic(
            "Map",
            vec![
                TypeExpression::simple("String"),
                TypeExpression::nullable(TypeExpression::simple("i32")),
            ],
        );
        assert_eq!(expr.to_string(), "Map String i32?");

        let func = TypeExpression::function(
            vec![TypeExpression::simple("T"), TypeExpression::wildcard()],
            TypeExpression::simple("bool"),
        );
        assert_eq!(func.to_string(), "fn(T, _) -> bool");

        let union = TypeExpression::union(vec![
            TypeExpression::simple("A"),
            TypeExpression::simple("B"),
        ]);
        assert_eq!(union.to_string(), "A | B");
    }

    #[test]
    fn test_wildcard_forms() {
        assert!(TypeExpression::wildcard().is_wildcard());
        assert!(TypeExpression::simple("_").is_wildcard());
        assert!(!TypeExpression::simple("T").is_wildcard());
    }

    #[test]
    fn test_base_name_of_nested_generic() {
        let expr = TypeExpression::generic("Array", vec![TypeExpression::simple("T")]);
        assert_eq!(expr.base_name(), Some("Array"));
        assert_eq!(TypeExpression::nullable(expr).base_name(), None);
    }

    #[test]
    fn test_item_conversion_keeps_span() {
        let def = ImplementationDefinition::new("Show", TypeExpression::simple("i32"))
            .with_span(Span::new(4, 20));
        let item: Item = def.into();
        assert_eq!(item.span, Span::new(4, 20));
        assert!(matches!(item.kind, ItemKind::Implementation(_)));
    }
}
