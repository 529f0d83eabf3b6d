//! Type representations for the Able typechecker
//!
//! `Type` is a closed set of variants. Values are immutable: substitution
//! builds new values and never mutates the registry or environment copies
//! they came from.

use indexmap::IndexMap;
use std::fmt;

/// Type-variable substitution produced by matching.
///
/// Insertion-ordered so labels and diagnostics built from it are reproducible.
pub type Substitution = IndexMap<String, Type>;

/// Non-numeric built-in types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Char,
    String,
    Nil,
    Void,
    IoHandle,
    ProcHandle,
}

impl PrimitiveKind {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::String => "String",
            PrimitiveKind::Nil => "nil",
            PrimitiveKind::Void => "void",
            PrimitiveKind::IoHandle => "IoHandle",
            PrimitiveKind::ProcHandle => "ProcHandle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(PrimitiveKind::Bool),
            "char" => Some(PrimitiveKind::Char),
            "String" | "string" => Some(PrimitiveKind::String),
            "nil" => Some(PrimitiveKind::Nil),
            "void" => Some(PrimitiveKind::Void),
            "IoHandle" => Some(PrimitiveKind::IoHandle),
            "ProcHandle" => Some(PrimitiveKind::ProcHandle),
            _ => None,
        }
    }
}

/// Sized integer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntegerKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
}

impl IntegerKind {
    pub const ALL: [IntegerKind; 10] = [
        IntegerKind::I8,
        IntegerKind::I16,
        IntegerKind::I32,
        IntegerKind::I64,
        IntegerKind::I128,
        IntegerKind::U8,
        IntegerKind::U16,
        IntegerKind::U32,
        IntegerKind::U64,
        IntegerKind::U128,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IntegerKind::I8 => "i8",
            IntegerKind::I16 => "i16",
            IntegerKind::I32 => "i32",
            IntegerKind::I64 => "i64",
            IntegerKind::I128 => "i128",
            IntegerKind::U8 => "u8",
            IntegerKind::U16 => "u16",
            IntegerKind::U32 => "u32",
            IntegerKind::U64 => "u64",
            IntegerKind::U128 => "u128",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    pub fn name(&self) -> &'static str {
        match self {
            FloatKind::F32 => "f32",
            FloatKind::F64 => "f64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "f32" => Some(FloatKind::F32),
            "f64" => Some(FloatKind::F64),
            _ => None,
        }
    }
}

/// A declared generic parameter and its interface bounds
#[derive(Debug, Clone, PartialEq)]
pub struct GenericParamSpec {
    pub name: String,
    pub constraints: Vec<Type>,
}

impl GenericParamSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Type) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// A `where T: I` entry attached to a function, struct or impl
#[derive(Debug, Clone, PartialEq)]
pub struct WhereConstraintSpec {
    pub type_param: String,
    pub subject: Type,
    pub constraints: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub type_params: Vec<GenericParamSpec>,
    pub params: Vec<Type>,
    pub return_type: Box<Type>,
    pub where_clause: Vec<WhereConstraintSpec>,
}

impl FunctionType {
    pub fn new(params: Vec<Type>, return_type: Type) -> Self {
        Self {
            type_params: Vec::new(),
            params,
            return_type: Box::new(return_type),
            where_clause: Vec::new(),
        }
    }

    pub fn with_type_param(mut self, param: GenericParamSpec) -> Self {
        self.type_params.push(param);
        self
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn substitute(&self, subst: &Substitution) -> FunctionType {
        FunctionType {
            type_params: self
                .type_params
                .iter()
                .map(|param| GenericParamSpec {
                    name: param.name.clone(),
                    constraints: param.constraints.iter().map(|c| c.substitute(subst)).collect(),
                })
                .collect(),
            params: self.params.iter().map(|p| p.substitute(subst)).collect(),
            return_type: Box::new(self.return_type.substitute(subst)),
            where_clause: self
                .where_clause
                .iter()
                .map(|clause| WhereConstraintSpec {
                    type_param: clause.type_param.clone(),
                    subject: clause.subject.substitute(subst),
                    constraints: clause.constraints.iter().map(|c| c.substitute(subst)).collect(),
                })
                .collect(),
        }
    }
}

/// Same-named function declarations folded together
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionOverloadType {
    pub overloads: Vec<FunctionType>,
}

/// Closed set of type representations
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Missing or unresolvable information; a wildcard during matching
    Unknown,
    Primitive(PrimitiveKind),
    Integer(IntegerKind),
    Float(FloatKind),
    TypeParameter(String),
    /// A declared struct referenced by name (no arguments applied)
    Struct {
        name: String,
        type_params: Vec<String>,
    },
    /// A struct value type with concrete arguments
    StructInstance {
        name: String,
        args: Vec<Type>,
    },
    Interface {
        name: String,
        type_params: Vec<String>,
    },
    Union {
        name: String,
        type_params: Vec<String>,
    },
    /// Anonymous `A | B` union
    UnionLiteral(Vec<Type>),
    Alias {
        name: String,
        target: Box<Type>,
    },
    /// Application of a declared constructor (or a type parameter) to arguments
    Applied {
        base: Box<Type>,
        args: Vec<Type>,
    },
    Nullable(Box<Type>),
    Function(FunctionType),
    Overload(FunctionOverloadType),
    Array(Box<Type>),
    Map {
        key: Box<Type>,
        value: Box<Type>,
    },
    Range(Box<Type>),
    Iterator(Box<Type>),
    Future(Box<Type>),
}

/// Which family a nominal head belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NominalKind {
    Struct,
    Union,
    Interface,
    Builtin,
    Nullable,
}

/// Name-plus-arguments view of a nominal type, used by matching
#[derive(Debug, Clone, PartialEq)]
pub struct Nominal<'a> {
    pub name: &'a str,
    pub kind: NominalKind,
    pub args: Vec<&'a Type>,
    /// A declared generic constructor referenced without arguments
    pub bare: bool,
}

impl Type {
    pub fn type_param(name: impl Into<String>) -> Self {
        Type::TypeParameter(name.into())
    }

    pub fn string() -> Self {
        Type::Primitive(PrimitiveKind::String)
    }

    pub fn bool() -> Self {
        Type::Primitive(PrimitiveKind::Bool)
    }

    pub fn nil() -> Self {
        Type::Primitive(PrimitiveKind::Nil)
    }

    pub fn void() -> Self {
        Type::Primitive(PrimitiveKind::Void)
    }

    pub fn i32() -> Self {
        Type::Integer(IntegerKind::I32)
    }

    pub fn f64() -> Self {
        Type::Float(FloatKind::F64)
    }

    pub fn nullable(inner: Type) -> Self {
        Type::Nullable(Box::new(inner))
    }

    pub fn array(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn instance(name: impl Into<String>, args: Vec<Type>) -> Self {
        Type::StructInstance {
            name: name.into(),
            args,
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Type::Interface {
            name: name.into(),
            type_params: Vec::new(),
        }
    }

    pub fn applied(base: Type, args: Vec<Type>) -> Self {
        Type::Applied {
            base: Box::new(base),
            args,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_type_parameter(&self) -> bool {
        matches!(self, Type::TypeParameter(_))
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// Follow alias chains to the aliased type
    pub fn resolve_alias(&self) -> &Type {
        match self {
            Type::Alias { target, .. } => target.resolve_alias(),
            other => other,
        }
    }

    /// Interface name and arguments when this type references an interface
    pub fn as_interface(&self) -> Option<(&str, &[Type])> {
        match self.resolve_alias() {
            Type::Interface { name, .. } => Some((name.as_str(), &[])),
            Type::Applied { base, args } => match base.resolve_alias() {
                Type::Interface { name, .. } => Some((name.as_str(), args.as_slice())),
                _ => None,
            },
            _ => None,
        }
    }

    /// Name-plus-arguments view for nominal types (structs, unions, interfaces,
    /// nullable and built-in constructors)
    pub fn nominal(&self) -> Option<Nominal<'_>> {
        fn builtin<'a>(name: &'static str, args: Vec<&'a Type>) -> Nominal<'a> {
            Nominal {
                name,
                kind: NominalKind::Builtin,
                args,
                bare: false,
            }
        }
        match self {
            Type::Struct { name, type_params } => Some(Nominal {
                name: name.as_str(),
                kind: NominalKind::Struct,
                args: Vec::new(),
                bare: !type_params.is_empty(),
            }),
            Type::StructInstance { name, args } => Some(Nominal {
                name: name.as_str(),
                kind: NominalKind::Struct,
                args: args.iter().collect(),
                bare: false,
            }),
            Type::Union { name, type_params } => Some(Nominal {
                name: name.as_str(),
                kind: NominalKind::Union,
                args: Vec::new(),
                bare: !type_params.is_empty(),
            }),
            Type::Interface { name, type_params } => Some(Nominal {
                name: name.as_str(),
                kind: NominalKind::Interface,
                args: Vec::new(),
                bare: !type_params.is_empty(),
            }),
            Type::Applied { base, args } => {
                let base = base.nominal()?;
                Some(Nominal {
                    name: base.name,
                    kind: base.kind,
                    args: args.iter().collect(),
                    bare: false,
                })
            }
            Type::Alias { target, .. } => target.nominal(),
            Type::Nullable(inner) => Some(Nominal {
                name: "?",
                kind: NominalKind::Nullable,
                args: vec![inner.as_ref()],
                bare: false,
            }),
            Type::Array(element) => Some(builtin("Array", vec![element.as_ref()])),
            Type::Map { key, value } => Some(builtin("Map", vec![key.as_ref(), value.as_ref()])),
            Type::Range(element) => Some(builtin("Range", vec![element.as_ref()])),
            Type::Iterator(element) => Some(builtin("Iterator", vec![element.as_ref()])),
            Type::Future(result) => Some(builtin("Future", vec![result.as_ref()])),
            _ => None,
        }
    }

    /// Apply a substitution, producing a new type
    pub fn substitute(&self, subst: &Substitution) -> Type {
        if subst.is_empty() {
            return self.clone();
        }
        let each = |types: &[Type]| types.iter().map(|t| t.substitute(subst)).collect::<Vec<_>>();
        match self {
            Type::TypeParameter(name) => match subst.get(name) {
                Some(replacement) => replacement.clone(),
                None => self.clone(),
            },
            Type::StructInstance { name, args } => Type::StructInstance {
                name: name.clone(),
                args: each(args),
            },
            Type::UnionLiteral(members) => Type::UnionLiteral(each(members)),
            Type::Alias { name, target } => Type::Alias {
                name: name.clone(),
                target: Box::new(target.substitute(subst)),
            },
            Type::Applied { base, args } => {
                let base = base.substitute(subst);
                let args = each(args);
                match base {
                    // A constructor placeholder bound to a built-in constructor
                    Type::Array(_) if args.len() == 1 => Type::array(args[0].clone()),
                    Type::Range(_) if args.len() == 1 => Type::Range(Box::new(args[0].clone())),
                    Type::Iterator(_) if args.len() == 1 => {
                        Type::Iterator(Box::new(args[0].clone()))
                    }
                    Type::Future(_) if args.len() == 1 => Type::Future(Box::new(args[0].clone())),
                    Type::Map { .. } if args.len() == 2 => {
                        Type::map(args[0].clone(), args[1].clone())
                    }
                    base => Type::applied(base, args),
                }
            }
            Type::Nullable(inner) => Type::nullable(inner.substitute(subst)),
            Type::Function(function) => Type::Function(function.substitute(subst)),
            Type::Overload(overload) => Type::Overload(FunctionOverloadType {
                overloads: overload
                    .overloads
                    .iter()
                    .map(|f| f.substitute(subst))
                    .collect(),
            }),
            Type::Array(element) => Type::array(element.substitute(subst)),
            Type::Map { key, value } => Type::map(key.substitute(subst), value.substitute(subst)),
            Type::Range(element) => Type::Range(Box::new(element.substitute(subst))),
            Type::Iterator(element) => Type::Iterator(Box::new(element.substitute(subst))),
            Type::Future(result) => Type::Future(Box::new(result.substitute(subst))),
            Type::Unknown
            | Type::Primitive(_)
            | Type::Integer(_)
            | Type::Float(_)
            | Type::Struct { .. }
            | Type::Interface { .. }
            | Type::Union { .. } => self.clone(),
        }
    }

    /// Whether the type mentions a type parameter or an unapplied generic constructor
    pub fn uses_type_params(&self) -> bool {
        match self {
            Type::TypeParameter(_) => true,
            Type::Struct { type_params, .. }
            | Type::Interface { type_params, .. }
            | Type::Union { type_params, .. } => !type_params.is_empty(),
            Type::Applied { base, args } => {
                let base_generic = match base.as_ref() {
                    Type::Struct { .. } | Type::Interface { .. } | Type::Union { .. } => false,
                    other => other.uses_type_params(),
                };
                base_generic || args.iter().any(Type::uses_type_params)
            }
            Type::StructInstance { args, .. } => args.iter().any(Type::uses_type_params),
            Type::UnionLiteral(members) => members.iter().any(Type::uses_type_params),
            Type::Alias { target, .. } => target.uses_type_params(),
            Type::Nullable(inner)
            | Type::Array(inner)
            | Type::Range(inner)
            | Type::Iterator(inner)
            | Type::Future(inner) => inner.uses_type_params(),
            Type::Map { key, value } => key.uses_type_params() || value.uses_type_params(),
            Type::Function(function) => {
                function.params.iter().any(Type::uses_type_params)
                    || function.return_type.uses_type_params()
            }
            _ => false,
        }
    }

    /// Whether `Unknown` appears anywhere inside the type
    pub fn contains_unknown(&self) -> bool {
        match self {
            Type::Unknown => true,
            Type::StructInstance { args, .. } => args.iter().any(Type::contains_unknown),
            Type::Applied { base, args } => {
                base.contains_unknown() || args.iter().any(Type::contains_unknown)
            }
            Type::UnionLiteral(members) => members.iter().any(Type::contains_unknown),
            Type::Alias { target, .. } => target.contains_unknown(),
            Type::Nullable(inner)
            | Type::Array(inner)
            | Type::Range(inner)
            | Type::Iterator(inner)
            | Type::Future(inner) => inner.contains_unknown(),
            Type::Map { key, value } => key.contains_unknown() || value.contains_unknown(),
            Type::Function(function) => {
                function.params.iter().any(Type::contains_unknown)
                    || function.return_type.contains_unknown()
            }
            _ => false,
        }
    }

    /// Concreteness weight of a declared type: one point per concrete node
    pub fn specificity_score(&self) -> usize {
        match self {
            Type::Struct { .. }
            | Type::Union { .. }
            | Type::Interface { .. }
            | Type::Primitive(_)
            | Type::Integer(_)
            | Type::Float(_) => 1,
            Type::StructInstance { args, .. } => {
                1 + args.iter().map(Type::specificity_score).sum::<usize>()
            }
            Type::Applied { base, args } => {
                base.specificity_score() + args.iter().map(Type::specificity_score).sum::<usize>()
            }
            Type::Nullable(inner) => inner.specificity_score(),
            Type::UnionLiteral(members) => members.iter().map(Type::specificity_score).sum(),
            Type::Alias { target, .. } => target.specificity_score(),
            Type::Array(inner) | Type::Range(inner) | Type::Iterator(inner) | Type::Future(inner) => {
                1 + inner.specificity_score()
            }
            Type::Map { key, value } => 1 + key.specificity_score() + value.specificity_score(),
            Type::Function(function) => {
                1 + function.params.iter().map(Type::specificity_score).sum::<usize>()
                    + function.return_type.specificity_score()
            }
            _ => 0,
        }
    }
}

/// Structural equivalence used when comparing signatures.
///
/// Any two type parameters are equivalent (names are irrelevant in a
/// signature) and `Unknown` matches anything.
pub fn equivalent_for_signature(a: &Type, b: &Type) -> bool {
    let a = a.resolve_alias();
    let b = b.resolve_alias();
    match (a, b) {
        (Type::Unknown, _) | (_, Type::Unknown) => true,
        (Type::TypeParameter(_), Type::TypeParameter(_)) => true,
        (Type::Nullable(x), Type::Nullable(y)) => equivalent_for_signature(x, y),
        (Type::UnionLiteral(xs), Type::UnionLiteral(ys)) => all_equivalent(xs, ys),
        (Type::Function(f), Type::Function(g)) => {
            all_equivalent(&f.params, &g.params)
                && equivalent_for_signature(&f.return_type, &g.return_type)
        }
        (Type::Overload(f), Type::Overload(g)) => {
            f.overloads.len() == g.overloads.len()
                && f.overloads.iter().zip(&g.overloads).all(|(x, y)| {
                    equivalent_for_signature(&Type::Function(x.clone()), &Type::Function(y.clone()))
                })
        }
        _ => match (a.nominal(), b.nominal()) {
            (Some(x), Some(y)) => {
                x.name == y.name
                    && x.kind == y.kind
                    && (x.bare
                        || y.bare
                        || (x.args.len() == y.args.len()
                            && x.args
                                .iter()
                                .zip(&y.args)
                                .all(|(p, q)| equivalent_for_signature(p, q))))
            }
            _ => a == b,
        },
    }
}

fn all_equivalent(xs: &[Type], ys: &[Type]) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| equivalent_for_signature(x, y))
}

fn join(types: &[Type], separator: &str) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({}) -> {}", join(&self.params, ", "), self.return_type)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unknown => write!(f, "Unknown"),
            Type::Primitive(kind) => write!(f, "{}", kind.name()),
            Type::Integer(kind) => write!(f, "{}", kind.name()),
            Type::Float(kind) => write!(f, "{}", kind.name()),
            Type::TypeParameter(name) => write!(f, "{name}"),
            Type::Struct { name, .. }
            | Type::Interface { name, .. }
            | Type::Union { name, .. }
            | Type::Alias { name, .. } => write!(f, "{name}"),
            Type::StructInstance { name, args } if args.is_empty() => write!(f, "{name}"),
            Type::StructInstance { name, args } => write!(f, "{} {}", name, join(args, " ")),
            Type::Applied { base, args } if args.is_empty() => write!(f, "{base}"),
            Type::Applied { base, args } => write!(f, "{} {}", base, join(args, " ")),
            Type::UnionLiteral(members) => {
                if members.is_empty() {
                    write!(f, "Union")
                } else {
                    write!(f, "{}", join(members, " | "))
                }
            }
            Type::Nullable(inner) => write!(f, "{inner}?"),
            Type::Function(function) => write!(f, "{function}"),
            Type::Overload(overload) => {
                let variants: Vec<String> =
                    overload.overloads.iter().map(|o| o.to_string()).collect();
                write!(f, "overloaded({})", variants.join(" & "))
            }
            Type::Array(element) => write!(f, "Array {element}"),
            Type::Map { key, value } => write!(f, "Map {key} {value}"),
            Type::Range(element) => write!(f, "Range {element}"),
            Type::Iterator(element) => write!(f, "Iterator {element}"),
            Type::Future(result) => write!(f, "Future {result}"),
        }
    }
}
