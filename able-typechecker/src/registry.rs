//! Implementation registry
//!
//! A flat list of `ImplementationSpec` records, one per `impl` block plus the
//! built-in implementations the runtime provides natively. The registry is
//! built once per program check and only read during resolution.

use crate::env::{Environment, InterfaceDecl};
use crate::types::{
    FloatKind, FunctionType, GenericParamSpec, IntegerKind, PrimitiveKind, Substitution, Type,
    WhereConstraintSpec,
};
use able_ast::Span;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use std::collections::BTreeSet;

lazy_static! {
    /// Interfaces the runtime implements natively, with the types covered
    static ref BUILTIN_IMPLEMENTATIONS: Vec<(&'static str, Vec<Type>)> = {
        let mut comparable: Vec<Type> = vec![
            Type::Primitive(PrimitiveKind::String),
            Type::Primitive(PrimitiveKind::Bool),
            Type::Primitive(PrimitiveKind::Char),
        ];
        comparable.extend(IntegerKind::ALL.iter().map(|kind| Type::Integer(*kind)));

        let mut numeric = comparable.clone();
        numeric.push(Type::Float(FloatKind::F32));
        numeric.push(Type::Float(FloatKind::F64));

        vec![
            ("Eq", comparable.clone()),
            ("Ord", comparable.clone()),
            ("Hash", comparable.clone()),
            ("PartialEq", numeric.clone()),
            ("PartialOrd", numeric.clone()),
            ("Clone", numeric.clone()),
            ("Display", numeric),
        ]
    };
}

/// A where-clause constraint instantiated for checking
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintObligation {
    /// Label of the declaration that owns the constraint, e.g. `impl Show for Wrapper T`
    pub owner: String,
    pub type_param: String,
    pub constraint: Type,
    pub subject: Type,
    pub context: String,
    pub node: Option<Span>,
}

impl ConstraintObligation {
    pub fn new(
        owner: impl Into<String>,
        type_param: impl Into<String>,
        constraint: Type,
        subject: Type,
    ) -> Self {
        Self {
            owner: owner.into(),
            type_param: type_param.into(),
            constraint,
            subject,
            context: String::new(),
            node: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_node(mut self, node: Option<Span>) -> Self {
        self.node = node;
        self
    }

    pub fn substitute(&self, subst: &Substitution) -> Self {
        Self {
            constraint: self.constraint.substitute(subst),
            subject: self.subject.substitute(subst),
            ..self.clone()
        }
    }

    /// Key used to compare how constrained two implementations are
    pub fn key(&self) -> String {
        format!("{}->{}", self.type_param, self.constraint)
    }
}

/// Build obligations from generic parameter bounds and where-clauses
pub fn obligations_from_specs(
    owner: &str,
    params: &[GenericParamSpec],
    where_clause: &[WhereConstraintSpec],
    node: Option<Span>,
) -> Vec<ConstraintObligation> {
    let mut obligations = Vec::new();
    for param in params {
        for constraint in &param.constraints {
            obligations.push(
                ConstraintObligation::new(
                    owner,
                    param.name.clone(),
                    constraint.clone(),
                    Type::TypeParameter(param.name.clone()),
                )
                .with_node(node),
            );
        }
    }
    for clause in where_clause {
        for constraint in &clause.constraints {
            obligations.push(
                ConstraintObligation::new(
                    owner,
                    clause.type_param.clone(),
                    constraint.clone(),
                    clause.subject.clone(),
                )
                .with_node(node),
            );
        }
    }
    obligations
}

/// One `impl` block (or built-in implementation)
#[derive(Debug, Clone, PartialEq)]
pub struct ImplementationSpec {
    /// Named impls are only reachable explicitly
    pub impl_name: Option<String>,
    pub interface_name: String,
    pub interface: InterfaceDecl,
    pub type_params: Vec<GenericParamSpec>,
    pub target: Type,
    pub interface_args: Vec<Type>,
    pub methods: IndexMap<String, FunctionType>,
    pub where_clause: Vec<WhereConstraintSpec>,
    pub obligations: Vec<ConstraintObligation>,
    /// Sorted member labels when the target is a union literal
    pub union_variants: Vec<String>,
    pub is_builtin: bool,
    pub span: Option<Span>,
}

impl ImplementationSpec {
    pub fn new(interface: InterfaceDecl, target: Type) -> Self {
        Self {
            impl_name: None,
            interface_name: interface.name.clone(),
            interface,
            type_params: Vec::new(),
            union_variants: union_variant_labels(&target),
            target,
            interface_args: Vec::new(),
            methods: IndexMap::new(),
            where_clause: Vec::new(),
            obligations: Vec::new(),
            is_builtin: false,
            span: None,
        }
    }

    pub fn builtin(interface: InterfaceDecl, target: Type) -> Self {
        Self {
            is_builtin: true,
            ..Self::new(interface, target)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.impl_name = Some(name.into());
        self
    }

    pub fn with_type_param(mut self, param: GenericParamSpec) -> Self {
        self.type_params.push(param);
        self
    }

    pub fn with_interface_args(mut self, args: Vec<Type>) -> Self {
        self.interface_args = args;
        self
    }

    pub fn with_where(mut self, clause: WhereConstraintSpec) -> Self {
        self.where_clause.push(clause);
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, function: FunctionType) -> Self {
        self.methods.insert(name.into(), function);
        self
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }

    /// Rebuild obligations from the generic parameters and where-clauses
    pub fn with_derived_obligations(mut self) -> Self {
        self.obligations = obligations_from_specs(
            &self.owner_label(),
            &self.type_params,
            &self.where_clause,
            self.span,
        );
        self
    }

    /// `impl Show for Wrapper T` as written, used as the obligation owner
    pub fn owner_label(&self) -> String {
        format!("impl {} for {}", self.interface_name, self.target)
    }

    /// Candidate label after substitution: `impl <Interface>[ <args>] for <Target>`
    pub fn candidate_label(&self, subject: &Type, subst: &Substitution, args: &[Type]) -> String {
        if let Some(name) = &self.impl_name {
            return name.clone();
        }
        let mut target = self.target.substitute(subst);
        if target.is_unknown() && !subject.is_unknown() {
            target = subject.clone();
        }
        let rendered: Vec<String> = if !args.is_empty() {
            args.iter().map(|arg| arg.to_string()).collect()
        } else {
            self.interface_args
                .iter()
                .map(|arg| arg.substitute(subst).to_string())
                .collect()
        };
        if rendered.is_empty() {
            format!("impl {} for {}", self.interface_name, target)
        } else {
            format!(
                "impl {} {} for {}",
                self.interface_name,
                rendered.join(" "),
                target
            )
        }
    }

    pub fn constraint_keys(&self) -> BTreeSet<String> {
        self.obligations.iter().map(ConstraintObligation::key).collect()
    }
}

/// Deduplicated, sorted member labels of a union-literal target
pub fn union_variant_labels(target: &Type) -> Vec<String> {
    match target {
        Type::UnionLiteral(members) => members
            .iter()
            .map(|member| member.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImplementationRegistry {
    implementations: Vec<ImplementationSpec>,
}

impl ImplementationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ImplementationSpec) {
        tracing::trace!(
            interface = %spec.interface_name,
            target = %spec.target,
            builtin = spec.is_builtin,
            "registering implementation"
        );
        self.implementations.push(spec);
    }

    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImplementationSpec> {
        self.implementations.iter()
    }

    /// Unnamed implementations of any of `interfaces`, in registration order
    pub fn candidates(&self, interfaces: &[&str]) -> Vec<&ImplementationSpec> {
        self.implementations
            .iter()
            .filter(|spec| {
                spec.impl_name.is_none() && interfaces.contains(&spec.interface_name.as_str())
            })
            .collect()
    }

    pub fn for_interface<'a>(
        &'a self,
        interface: &'a str,
    ) -> impl Iterator<Item = &'a ImplementationSpec> + 'a {
        self.implementations
            .iter()
            .filter(move |spec| spec.interface_name == interface)
    }

    pub fn find_named(&self, name: &str) -> Option<&ImplementationSpec> {
        self.implementations
            .iter()
            .find(|spec| spec.impl_name.as_deref() == Some(name))
    }

    /// Register native implementations for every built-in interface `env` declares
    pub fn register_builtins(&mut self, env: &Environment) -> usize {
        let mut registered = 0;
        for (interface_name, targets) in BUILTIN_IMPLEMENTATIONS.iter() {
            let Some(interface) = env.lookup_interface(interface_name) else {
                continue;
            };
            if !interface.type_params.is_empty() {
                continue;
            }
            for target in targets {
                self.register(ImplementationSpec::builtin(interface.clone(), target.clone()));
                registered += 1;
            }
        }
        registered
    }
}
