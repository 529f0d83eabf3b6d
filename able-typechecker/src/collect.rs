//! Declaration collection
//!
//! Turns a `Program` into the `Environment` and `ImplementationRegistry` the
//! resolver works against. Collection runs in phases so that declarations may
//! refer to each other regardless of source order:
//!
//! 1. Declare a shell for every struct, union, interface and alias.
//! 2. Resolve aliases in dependency order, reporting alias cycles.
//! 3. Resolve struct fields, union variants and interface signatures.
//! 4. Merge top-level functions into overload sets.
//! 5. Register built-in implementations (optional).
//! 6. Collect, validate and register `impl` blocks.

use crate::env::{
    AliasDecl, Declaration, Environment, InterfaceDecl, MethodSignature, StructDecl, UnionDecl,
};
use crate::error::{TypeDiagnostic, TypecheckError};
use crate::overloads::merge_function_declaration;
use crate::registry::{ImplementationRegistry, ImplementationSpec};
use crate::self_pattern::{self, BUILTIN_CONSTRUCTOR_ARITIES, PRIMITIVE_TYPE_NAMES};
use crate::types::{
    equivalent_for_signature, FloatKind, FunctionType, GenericParamSpec, IntegerKind, PrimitiveKind,
    Substitution, Type, WhereConstraintSpec,
};
use able_ast::{
    FunctionDefinition, GenericParameter, ImplementationDefinition, InterfaceDefinition, Item,
    ItemKind, Program, Span, StructDefinition, TypeAliasDefinition, TypeExpression,
    UnionDefinition, WhereClause,
};
use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use petgraph::{algo, Graph};

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorOptions {
    /// Register native implementations for the built-in interfaces a program declares
    pub register_builtins: bool,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            register_builtins: true,
        }
    }
}

/// Everything collection produced
#[derive(Debug, Clone)]
pub struct CollectedProgram {
    pub env: Environment,
    pub registry: ImplementationRegistry,
    pub diagnostics: Vec<TypeDiagnostic>,
}

/// Names in scope while resolving a type expression
#[derive(Debug, Clone)]
struct TypeScope<'e> {
    env: &'e Environment,
    generics: Vec<String>,
    self_type: Option<Type>,
}

impl<'e> TypeScope<'e> {
    fn new(env: &'e Environment) -> Self {
        Self {
            env,
            generics: Vec::new(),
            self_type: None,
        }
    }

    fn with_generics<I>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut scope = self.clone();
        scope.generics.extend(names);
        scope
    }

    fn with_self(mut self, self_type: Type) -> Self {
        self.self_type = Some(self_type);
        self
    }

    fn self_type(&self) -> Type {
        self.self_type
            .clone()
            .unwrap_or_else(|| Type::type_param("Self"))
    }

    fn resolve(&self, expr: &TypeExpression) -> Type {
        match expr {
            TypeExpression::Wildcard { .. } => Type::Unknown,
            TypeExpression::Simple { name, .. } => self.resolve_named(name, Vec::new()),
            TypeExpression::Generic { base, args, .. } => {
                let args: Vec<Type> = args.iter().map(|arg| self.resolve(arg)).collect();
                match base.simple_name() {
                    Some(name) => self.resolve_named(name, args),
                    None => Type::applied(self.resolve(base), args),
                }
            }
            TypeExpression::Nullable { inner, .. } => Type::nullable(self.resolve(inner)),
            TypeExpression::Result { inner, .. } => {
                let error = self
                    .env
                    .lookup("Error")
                    .map(Declaration::as_type)
                    .unwrap_or(Type::Unknown);
                Type::UnionLiteral(vec![self.resolve(inner), error])
            }
            TypeExpression::Function {
                params,
                return_type,
                ..
            } => Type::Function(FunctionType::new(
                params.iter().map(|param| self.resolve(param)).collect(),
                self.resolve(return_type),
            )),
            TypeExpression::Union { members, .. } => {
                Type::UnionLiteral(members.iter().map(|member| self.resolve(member)).collect())
            }
        }
    }

    fn resolve_named(&self, name: &str, args: Vec<Type>) -> Type {
        if name == "_" || name.is_empty() {
            return Type::Unknown;
        }
        if name == "Self" {
            return applied_or_bare(self.self_type(), args);
        }
        if self.generics.iter().any(|generic| generic == name) {
            return applied_or_bare(Type::type_param(name), args);
        }
        if let Some(kind) = PrimitiveKind::from_name(name) {
            return Type::Primitive(kind);
        }
        if let Some(kind) = IntegerKind::from_name(name) {
            return Type::Integer(kind);
        }
        if let Some(kind) = FloatKind::from_name(name) {
            return Type::Float(kind);
        }
        if BUILTIN_CONSTRUCTOR_ARITIES.contains_key(name) {
            let arg = |index: usize| args.get(index).cloned().unwrap_or(Type::Unknown);
            return match name {
                "Array" => Type::array(arg(0)),
                "Map" => Type::map(arg(0), arg(1)),
                "Range" => Type::Range(Box::new(arg(0))),
                "Iterator" => Type::Iterator(Box::new(arg(0))),
                _ => Type::Future(Box::new(arg(0))),
            };
        }
        match self.env.lookup(name) {
            Some(Declaration::Alias(alias)) if !alias.type_params.is_empty() => {
                let mut subst = Substitution::new();
                for (index, param) in alias.type_params.iter().enumerate() {
                    let value = args.get(index).cloned().unwrap_or(Type::Unknown);
                    subst.insert(param.name.clone(), value);
                }
                Type::Alias {
                    name: alias.name.clone(),
                    target: Box::new(alias.target.substitute(&subst)),
                }
            }
            Some(Declaration::Function(_)) | None => Type::Unknown,
            Some(declaration) => applied_or_bare(declaration.as_type(), args),
        }
    }

    fn param_specs(&self, params: &[GenericParameter]) -> Vec<GenericParamSpec> {
        params
            .iter()
            .map(|param| GenericParamSpec {
                name: param.name.clone(),
                constraints: param
                    .constraints
                    .iter()
                    .map(|constraint| self.resolve(constraint))
                    .collect(),
            })
            .collect()
    }

    fn where_specs(&self, clauses: &[WhereClause]) -> Vec<WhereConstraintSpec> {
        clauses
            .iter()
            .map(|clause| WhereConstraintSpec {
                type_param: clause.subject.to_string(),
                subject: self.resolve(&clause.subject),
                constraints: clause
                    .constraints
                    .iter()
                    .map(|constraint| self.resolve(constraint))
                    .collect(),
            })
            .collect()
    }

    /// Function type of a definition; an untyped `self` parameter is `Self`
    fn function_type(&self, def: &FunctionDefinition) -> FunctionType {
        let scope = self.with_generics(def.generic_params.iter().map(|p| p.name.clone()));
        let params = def
            .params
            .iter()
            .map(|param| match &param.type_annotation {
                Some(annotation) => scope.resolve(annotation),
                None if param.name == "self" => scope.self_type(),
                None => Type::Unknown,
            })
            .collect();
        let return_type = def
            .return_type
            .as_ref()
            .map(|ret| scope.resolve(ret))
            .unwrap_or(Type::Unknown);
        FunctionType {
            type_params: scope.param_specs(&def.generic_params),
            params,
            return_type: Box::new(return_type),
            where_clause: scope.where_specs(&def.where_clause),
        }
    }
}

fn applied_or_bare(base: Type, args: Vec<Type>) -> Type {
    if args.is_empty() {
        base
    } else {
        Type::applied(base, args)
    }
}

/// Every identifier used as a type name in `expr`
fn collect_type_names(expr: &TypeExpression, names: &mut Vec<String>) {
    match expr {
        TypeExpression::Simple { name, .. } => names.push(name.clone()),
        TypeExpression::Generic { base, args, .. } => {
            collect_type_names(base, names);
            for arg in args {
                collect_type_names(arg, names);
            }
        }
        TypeExpression::Nullable { inner, .. } | TypeExpression::Result { inner, .. } => {
            collect_type_names(inner, names)
        }
        TypeExpression::Function {
            params,
            return_type,
            ..
        } => {
            for param in params {
                collect_type_names(param, names);
            }
            collect_type_names(return_type, names);
        }
        TypeExpression::Union { members, .. } => {
            for member in members {
                collect_type_names(member, names);
            }
        }
        TypeExpression::Wildcard { .. } => {}
    }
}

fn is_reserved_type_name(name: &str) -> bool {
    name.is_empty()
        || name == "_"
        || name == "Self"
        || name.contains('.')
        || PRIMITIVE_TYPE_NAMES.contains(name)
        || BUILTIN_CONSTRUCTOR_ARITIES.contains_key(name)
}

/// Add generic parameters for undeclared type names and hoist their where-clauses.
///
/// `impl Show for Wrapper T` declares `T` implicitly; a `where T: Display`
/// clause on such a parameter becomes one of its bounds.
fn infer_generic_parameters(
    occurrences: &[String],
    declared: &[GenericParameter],
    where_clause: &[WhereClause],
    known: &[String],
    env: &Environment,
) -> (Vec<GenericParameter>, Vec<WhereClause>) {
    let mut params = declared.to_vec();
    let mut inferred: Vec<String> = Vec::new();
    for name in occurrences {
        let already_known = known.iter().any(|k| k == name)
            || params.iter().any(|param| &param.name == name);
        let declared_type = matches!(
            env.lookup(name),
            Some(declaration) if !matches!(declaration, Declaration::Function(_))
        );
        if already_known || declared_type || is_reserved_type_name(name) {
            continue;
        }
        params.push(GenericParameter::new(name.clone()));
        inferred.push(name.clone());
    }

    let mut kept = Vec::new();
    for clause in where_clause {
        let hoisted = clause
            .subject
            .simple_name()
            .filter(|name| inferred.iter().any(|inferred_name| inferred_name == name));
        match hoisted.and_then(|name| params.iter().position(|param| param.name == name)) {
            Some(index) => params[index]
                .constraints
                .extend(clause.constraints.iter().cloned()),
            None => kept.push(clause.clone()),
        }
    }
    (params, kept)
}

/// A problem with an impl method's signature, as the message tail
fn signature_mismatch(expected: &FunctionType, actual: &FunctionType) -> Option<String> {
    if expected.type_params.len() != actual.type_params.len() {
        return Some(format!(
            "expects {} generic parameter(s), got {}",
            expected.type_params.len(),
            actual.type_params.len()
        ));
    }
    if expected.params.len() != actual.params.len() {
        return Some(format!(
            "expects {} parameter(s), got {}",
            expected.params.len(),
            actual.params.len()
        ));
    }
    for (index, (want, got)) in expected.params.iter().zip(&actual.params).enumerate() {
        if !equivalent_for_signature(want, got) {
            return Some(format!("parameter {} expected {want}, got {got}", index + 1));
        }
    }
    if !equivalent_for_signature(&expected.return_type, &actual.return_type) {
        return Some(format!(
            "return type expected {}, got {}",
            expected.return_type, actual.return_type
        ));
    }
    None
}

fn type_item_name(item: &Item) -> Option<&str> {
    match &item.kind {
        ItemKind::Struct(def) => Some(&def.name),
        ItemKind::Union(def) => Some(&def.name),
        ItemKind::Interface(def) => Some(&def.name),
        ItemKind::TypeAlias(def) => Some(&def.name),
        ItemKind::Function(_) | ItemKind::Implementation(_) => None,
    }
}

fn param_names(params: &[GenericParameter]) -> Vec<String> {
    params.iter().map(|param| param.name.clone()).collect()
}

fn shell_params(params: &[GenericParameter]) -> Vec<GenericParamSpec> {
    params
        .iter()
        .map(|param| GenericParamSpec::new(param.name.clone()))
        .collect()
}

/// Builds the environment and registry for a program
#[derive(Debug, Default)]
pub struct DeclarationCollector {
    options: CollectorOptions,
    env: Environment,
    registry: ImplementationRegistry,
    diagnostics: Vec<TypeDiagnostic>,
}

impl DeclarationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CollectorOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn collect(mut self, program: &Program) -> CollectedProgram {
        let accepted = self.declare_shells(program);
        let items: Vec<&Item> = program
            .items
            .iter()
            .zip(accepted)
            .filter_map(|(item, keep)| keep.then_some(item))
            .collect();

        let aliases: Vec<&TypeAliasDefinition> = items
            .iter()
            .filter_map(|item| match &item.kind {
                ItemKind::TypeAlias(def) => Some(def),
                _ => None,
            })
            .collect();
        self.resolve_aliases(&aliases);

        for item in &items {
            match &item.kind {
                ItemKind::Struct(def) => self.resolve_struct(def),
                ItemKind::Union(def) => self.resolve_union(def),
                ItemKind::Interface(def) => self.resolve_interface(def),
                _ => {}
            }
        }

        for item in &items {
            if let ItemKind::Function(def) = &item.kind {
                self.collect_function(def);
            }
        }

        if self.options.register_builtins {
            let registered = self.registry.register_builtins(&self.env);
            tracing::debug!(registered, "registered built-in implementations");
        }

        for item in &items {
            if let ItemKind::Implementation(def) = &item.kind {
                self.collect_implementation(def);
            }
        }

        tracing::debug!(
            implementations = self.registry.len(),
            diagnostics = self.diagnostics.len(),
            "declaration collection finished"
        );
        CollectedProgram {
            env: self.env,
            registry: self.registry,
            diagnostics: self.diagnostics,
        }
    }

    fn report(&mut self, error: TypecheckError, node: Option<Span>) {
        tracing::debug!(%error, "collection diagnostic");
        self.diagnostics.push(TypeDiagnostic::new(error, node));
    }

    /// Phase 1; returns which items survived (duplicates are dropped)
    fn declare_shells(&mut self, program: &Program) -> Vec<bool> {
        let mut accepted = Vec::with_capacity(program.items.len());
        for item in &program.items {
            let Some(name) = type_item_name(item) else {
                accepted.push(true);
                continue;
            };
            if self.env.lookup_local(name).is_some() {
                self.report(
                    TypecheckError::DuplicateDeclaration {
                        name: name.to_string(),
                        span: None,
                    },
                    Some(item.span),
                );
                accepted.push(false);
                continue;
            }
            let shell = match &item.kind {
                ItemKind::Struct(def) => Declaration::Struct(StructDecl {
                    name: def.name.clone(),
                    type_params: shell_params(&def.generic_params),
                    fields: IndexMap::new(),
                    where_clause: Vec::new(),
                    span: Some(def.span),
                }),
                ItemKind::Union(def) => Declaration::Union(UnionDecl {
                    name: def.name.clone(),
                    type_params: shell_params(&def.generic_params),
                    variants: Vec::new(),
                    span: Some(def.span),
                }),
                ItemKind::Interface(def) => {
                    let mut decl = InterfaceDecl::new(def.name.clone());
                    decl.type_params = shell_params(&def.generic_params);
                    decl.self_pattern = def.self_type_pattern.clone();
                    decl.span = Some(def.span);
                    Declaration::Interface(decl)
                }
                ItemKind::TypeAlias(def) => Declaration::Alias(AliasDecl {
                    name: def.name.clone(),
                    type_params: shell_params(&def.generic_params),
                    target: Type::Unknown,
                    span: Some(def.span),
                }),
                ItemKind::Function(_) | ItemKind::Implementation(_) => continue,
            };
            self.env.define(name, shell);
            accepted.push(true);
        }
        accepted
    }

    /// Phase 2: aliases referencing each other resolve dependencies first
    fn resolve_aliases(&mut self, aliases: &[&TypeAliasDefinition]) {
        let mut graph: Graph<&str, ()> = Graph::new();
        let nodes: IndexMap<&str, NodeIndex> = aliases
            .iter()
            .map(|def| (def.name.as_str(), graph.add_node(def.name.as_str())))
            .collect();
        for def in aliases {
            let Some(&from) = nodes.get(def.name.as_str()) else {
                continue;
            };
            let mut referenced = Vec::new();
            collect_type_names(&def.target, &mut referenced);
            for name in referenced {
                if let Some(&to) = nodes.get(name.as_str()) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        // Components come out dependencies-first
        for component in algo::tarjan_scc(&graph) {
            let Some(&first) = component.first() else {
                continue;
            };
            if component.len() > 1 || graph.contains_edge(first, first) {
                let mut names: Vec<String> =
                    component.iter().map(|index| graph[*index].to_string()).collect();
                names.sort();
                let node = aliases
                    .iter()
                    .find(|def| names.contains(&def.name))
                    .map(|def| def.span);
                if let Some(start) = names.first().cloned() {
                    names.push(start);
                }
                self.report(TypecheckError::AliasCycle { names, span: None }, node);
                continue;
            }
            let name = graph[first];
            if let Some(def) = aliases.iter().find(|def| def.name == name) {
                self.resolve_alias(def);
            }
        }
    }

    fn resolve_alias(&mut self, def: &TypeAliasDefinition) {
        let scope = TypeScope::new(&self.env).with_generics(param_names(&def.generic_params));
        let decl = AliasDecl {
            name: def.name.clone(),
            type_params: scope.param_specs(&def.generic_params),
            target: scope.resolve(&def.target),
            span: Some(def.span),
        };
        self.env.define(def.name.clone(), Declaration::Alias(decl));
    }

    fn resolve_struct(&mut self, def: &StructDefinition) {
        let scope = TypeScope::new(&self.env).with_generics(param_names(&def.generic_params));
        let decl = StructDecl {
            name: def.name.clone(),
            type_params: scope.param_specs(&def.generic_params),
            fields: def
                .fields
                .iter()
                .map(|field| (field.name.clone(), scope.resolve(&field.type_annotation)))
                .collect(),
            where_clause: scope.where_specs(&def.where_clause),
            span: Some(def.span),
        };
        self.env.define(def.name.clone(), Declaration::Struct(decl));
    }

    fn resolve_union(&mut self, def: &UnionDefinition) {
        let scope = TypeScope::new(&self.env).with_generics(param_names(&def.generic_params));
        let decl = UnionDecl {
            name: def.name.clone(),
            type_params: scope.param_specs(&def.generic_params),
            variants: def.variants.iter().map(|variant| scope.resolve(variant)).collect(),
            span: Some(def.span),
        };
        self.env.define(def.name.clone(), Declaration::Union(decl));
    }

    fn resolve_interface(&mut self, def: &InterfaceDefinition) {
        let mut decl = InterfaceDecl::new(def.name.clone());
        decl.type_params = shell_params(&def.generic_params);
        decl.self_pattern = def.self_type_pattern.clone();
        // `M` in `for M _` may appear in signatures as `M A`
        let placeholders = self_pattern::constructor_placeholders(&decl, &self.env);
        let scope = TypeScope::new(&self.env)
            .with_generics(param_names(&def.generic_params))
            .with_generics(placeholders);
        decl.type_params = scope.param_specs(&def.generic_params);
        decl.where_clause = scope.where_specs(&def.where_clause);
        decl.span = Some(def.span);
        for signature in &def.signatures {
            decl.methods.insert(
                signature.name.clone(),
                MethodSignature {
                    function: scope.function_type(signature),
                    has_default: signature.has_body,
                },
            );
        }
        self.env.define(def.name.clone(), Declaration::Interface(decl));
    }

    /// Phase 4: fold each function into the overload set bound to its name
    fn collect_function(&mut self, def: &FunctionDefinition) {
        let mut occurrences = Vec::new();
        for param in &def.params {
            if let Some(annotation) = &param.type_annotation {
                collect_type_names(annotation, &mut occurrences);
            }
        }
        if let Some(ret) = &def.return_type {
            collect_type_names(ret, &mut occurrences);
        }
        for clause in &def.where_clause {
            collect_type_names(&clause.subject, &mut occurrences);
        }
        let (generic_params, where_clause) =
            infer_generic_parameters(&occurrences, &def.generic_params, &def.where_clause, &[], &self.env);
        let def = FunctionDefinition {
            generic_params,
            where_clause,
            ..def.clone()
        };

        let function = TypeScope::new(&self.env).function_type(&def);
        let merged = match self.env.lookup_local(&def.name) {
            None => merge_function_declaration(None, function),
            Some(Declaration::Function(bound)) => merge_function_declaration(Some(bound), function),
            Some(_) => None,
        };
        match merged {
            Some(merged) => {
                self.env.define(def.name.clone(), Declaration::Function(merged));
            }
            None => self.report(
                TypecheckError::DuplicateDeclaration {
                    name: def.name.clone(),
                    span: None,
                },
                Some(def.span),
            ),
        }
    }

    /// Phase 6: build, validate and register one `impl` block
    fn collect_implementation(&mut self, def: &ImplementationDefinition) {
        let node = Some(def.span);
        let mut occurrences = Vec::new();
        collect_type_names(&def.target, &mut occurrences);
        for arg in &def.interface_args {
            collect_type_names(arg, &mut occurrences);
        }
        for clause in &def.where_clause {
            collect_type_names(&clause.subject, &mut occurrences);
        }
        let (generic_params, where_clause) =
            infer_generic_parameters(&occurrences, &def.generic_params, &def.where_clause, &[], &self.env);
        let generic_names = param_names(&generic_params);

        let interface = match self.env.lookup(&def.interface_name) {
            Some(Declaration::Interface(decl)) => decl.clone(),
            Some(_) => {
                self.report(
                    TypecheckError::NotAnInterface {
                        context: "impl".to_string(),
                        found: def.interface_name.clone(),
                        span: None,
                    },
                    node,
                );
                return;
            }
            None => {
                self.report(
                    TypecheckError::UnknownInterface {
                        context: "impl".to_string(),
                        name: def.interface_name.clone(),
                        span: None,
                    },
                    node,
                );
                return;
            }
        };

        let base_scope = TypeScope::new(&self.env).with_generics(generic_names.clone());
        let target = base_scope.resolve(&def.target);
        let scope = base_scope.with_self(target.clone());
        let interface_args: Vec<Type> = def.interface_args.iter().map(|arg| scope.resolve(arg)).collect();

        let mut problems = Vec::new();
        let expected = interface.type_params.len();
        let provided = interface_args.len();
        if expected == 0 && provided > 0 {
            problems.push(TypecheckError::UnexpectedInterfaceArguments {
                interface: interface.name.clone(),
                span: None,
            });
        } else if expected > 0 && provided == 0 {
            problems.push(TypecheckError::Arity {
                message: format!(
                    "impl {} for {} requires {} interface type argument(s)",
                    interface.name, target, expected
                ),
                span: None,
            });
        } else if provided != expected {
            problems.push(TypecheckError::Arity {
                message: format!(
                    "impl {} for {} expected {} interface type argument(s), got {}",
                    interface.name, target, expected, provided
                ),
                span: None,
            });
        }

        if let Err(error) =
            self_pattern::validate_impl_target(&interface, &def.target, &generic_names, &self.env)
        {
            problems.push(error);
            for problem in problems {
                self.report(problem, node);
            }
            return;
        }

        let mut spec = ImplementationSpec::new(interface, target.clone())
            .with_interface_args(interface_args)
            .with_span(node);
        spec.type_params = scope.param_specs(&generic_params);
        spec.where_clause = scope.where_specs(&where_clause);
        for method in &def.definitions {
            if spec.methods.contains_key(&method.name) {
                continue;
            }
            let function = scope.function_type(method);
            spec.methods.insert(method.name.clone(), function);
        }
        let mut spec = spec.with_derived_obligations();
        if let Some(name) = &def.impl_name {
            spec = spec.named(name.clone());
        }

        problems.extend(validate_methods(&spec, &generic_names, &self.env));
        for problem in problems {
            self.report(problem, node);
        }
        self.registry.register(spec);
    }
}

/// Every required interface method is present with a compatible signature
fn validate_methods(
    spec: &ImplementationSpec,
    impl_generics: &[String],
    env: &Environment,
) -> Vec<TypecheckError> {
    let label = spec.owner_label();
    let mut subst = Substitution::new();
    subst.insert("Self".to_string(), spec.target.clone());
    for (index, param) in spec.interface.type_params.iter().enumerate() {
        let value = spec
            .interface_args
            .get(index)
            .cloned()
            .unwrap_or(Type::Unknown);
        subst.insert(param.name.clone(), value);
    }
    self_pattern::apply_constructor_substitution(&mut subst, &spec.interface, &spec.target, env);

    let mut problems = Vec::new();
    for (name, signature) in &spec.interface.methods {
        let Some(actual) = spec.methods.get(name) else {
            if !signature.has_default {
                problems.push(TypecheckError::MissingMethod {
                    implementation: label.clone(),
                    method: name.clone(),
                    span: None,
                });
            }
            continue;
        };
        let expected = signature.function.substitute(&subst);
        let mut actual = actual.clone();
        actual
            .type_params
            .retain(|param| !impl_generics.contains(&param.name));
        if let Some(detail) = signature_mismatch(&expected, &actual) {
            problems.push(TypecheckError::MethodSignatureMismatch {
                implementation: label.clone(),
                method: name.clone(),
                detail,
                span: None,
            });
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use able_ast::{Parameter, TypeExpression as TE};
    use pretty_assertions::assert_eq;

    fn collect(program: Program) -> CollectedProgram {
        DeclarationCollector::new().collect(&program)
    }

    fn messages(collected: &CollectedProgram) -> Vec<String> {
        collected
            .diagnostics
            .iter()
            .map(|diagnostic| diagnostic.message())
            .collect()
    }

    #[test]
    fn test_type_expression_resolution() {
        let program = Program::new()
            .with_item(StructDefinition::new("Point"))
            .with_item(
                StructDefinition::new("Wrapper").with_generic_param(GenericParameter::new("T")),
            );
        let collected = collect(program);
        let scope = TypeScope::new(&collected.env).with_generics(vec!["T".to_string()]);

        assert_eq!(scope.resolve(&TE::simple("i64")), Type::Integer(IntegerKind::I64));
        assert_eq!(scope.resolve(&TE::simple("T")), Type::type_param("T"));
        assert_eq!(scope.resolve(&TE::wildcard()), Type::Unknown);
        assert_eq!(scope.resolve(&TE::simple("Missing")), Type::Unknown);
        assert_eq!(
            scope.resolve(&TE::generic("Array", vec![TE::simple("String")])),
            Type::array(Type::string())
        );
        assert_eq!(
            scope.resolve(&TE::generic("Wrapper", vec![TE::simple("i32")])).to_string(),
            "Wrapper i32"
        );
        assert_eq!(
            scope.resolve(&TE::nullable(TE::simple("Point"))).to_string(),
            "Point?"
        );
        assert_eq!(
            scope.resolve(&TE::result(TE::simple("bool"))),
            Type::UnionLiteral(vec![Type::bool(), Type::Unknown])
        );
    }

    #[test]
    fn test_duplicate_declarations_are_reported() {
        let program = Program::new()
            .with_item(StructDefinition::new("Point"))
            .with_item(UnionDefinition::new("Point", vec![TE::simple("i32")]))
            .with_item(FunctionDefinition::new("Point"));
        let collected = collect(program);
        assert_eq!(
            messages(&collected),
            vec![
                "typechecker: duplicate declaration 'Point'".to_string(),
                "typechecker: duplicate declaration 'Point'".to_string(),
            ]
        );
        assert!(matches!(collected.env.lookup("Point"), Some(Declaration::Struct(_))));
    }

    #[test]
    fn test_alias_cycle_is_reported_and_unknown() {
        let program = Program::new()
            .with_item(TypeAliasDefinition::new("A", TE::simple("B")))
            .with_item(TypeAliasDefinition::new("B", TE::nullable(TE::simple("A"))))
            .with_item(TypeAliasDefinition::new("Id", TE::simple("i32")))
            .with_item(TypeAliasDefinition::new("Ids", TE::generic("Array", vec![TE::simple("Id")])));
        let collected = collect(program);

        assert_eq!(
            messages(&collected),
            vec!["typechecker: type alias cycle detected: A -> B -> A".to_string()]
        );
        match collected.env.lookup("A") {
            Some(Declaration::Alias(alias)) => assert_eq!(alias.target, Type::Unknown),
            other => panic!("expected alias, got {other:?}"),
        }
        match collected.env.lookup("Ids") {
            Some(Declaration::Alias(alias)) => {
                assert_eq!(alias.target.to_string(), "Array Id");
                assert_eq!(
                    alias.target,
                    Type::array(Type::Alias {
                        name: "Id".to_string(),
                        target: Box::new(Type::i32()),
                    })
                );
            }
            other => panic!("expected alias, got {other:?}"),
        }
    }

    #[test]
    fn test_functions_merge_into_overloads() {
        let program = Program::new()
            .with_item(
                FunctionDefinition::new("show").with_param(Parameter::new("x", TE::simple("i32"))),
            )
            .with_item(
                FunctionDefinition::new("show")
                    .with_param(Parameter::new("x", TE::simple("String"))),
            )
            .with_item(
                FunctionDefinition::new("show").with_param(Parameter::new("y", TE::simple("i32"))),
            );
        let collected = collect(program);
        match collected.env.lookup("show") {
            Some(Declaration::Function(Type::Overload(set))) => assert_eq!(set.overloads.len(), 2),
            other => panic!("expected overload set, got {other:?}"),
        }
        assert!(collected.diagnostics.is_empty());
    }

    #[test]
    fn test_implicit_impl_generics_hoist_where_clauses() {
        let program = Program::new()
            .with_item(InterfaceDefinition::new("Display"))
            .with_item(InterfaceDefinition::new("Show"))
            .with_item(
                StructDefinition::new("Wrapper").with_generic_param(GenericParameter::new("T")),
            )
            .with_item(
                ImplementationDefinition::new(
                    "Show",
                    TE::generic("Wrapper", vec![TE::simple("T")]),
                )
                .with_where(WhereClause::new("T", vec![TE::simple("Display")])),
            );
        let collected = collect(program);
        assert!(collected.diagnostics.is_empty());

        let spec = collected
            .registry
            .for_interface("Show")
            .next()
            .expect("impl registered");
        assert_eq!(spec.type_params.len(), 1);
        assert_eq!(spec.type_params[0].name, "T");
        assert_eq!(spec.type_params[0].constraints, vec![Type::interface("Display")]);
        assert_eq!(spec.where_clause, Vec::new());
        assert_eq!(
            spec.constraint_keys().into_iter().collect::<Vec<_>>(),
            vec!["T->Display".to_string()]
        );
    }

    #[test]
    fn test_impl_interface_reference_errors() {
        let program = Program::new()
            .with_item(StructDefinition::new("Point"))
            .with_item(ImplementationDefinition::new("Missing", TE::simple("Point")))
            .with_item(ImplementationDefinition::new("Point", TE::simple("Point")));
        let collected = collect(program);
        assert_eq!(
            messages(&collected),
            vec![
                "typechecker: impl references unknown interface 'Missing'".to_string(),
                "typechecker: impl must reference an interface (got Point)".to_string(),
            ]
        );
        assert!(collected.registry.is_empty());
    }

    #[test]
    fn test_impl_interface_argument_arity() {
        let program = Program::new()
            .with_item(InterfaceDefinition::new("Show"))
            .with_item(
                InterfaceDefinition::new("Into").with_generic_param(GenericParameter::new("T")),
            )
            .with_item(
                ImplementationDefinition::new("Show", TE::simple("i32"))
                    .with_interface_arg(TE::simple("String")),
            )
            .with_item(ImplementationDefinition::new("Into", TE::simple("i32")))
            .with_item(
                ImplementationDefinition::new("Into", TE::simple("bool"))
                    .with_interface_arg(TE::simple("String"))
                    .with_interface_arg(TE::simple("i32")),
            );
        let collected = collect(program);
        assert_eq!(
            messages(&collected),
            vec![
                "typechecker: impl Show does not accept type arguments".to_string(),
                "typechecker: impl Into for i32 requires 1 interface type argument(s)".to_string(),
                "typechecker: impl Into for bool expected 1 interface type argument(s), got 2"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_bare_constructor_target_needs_self_pattern() {
        let program = Program::new()
            .with_item(InterfaceDefinition::new("Show"))
            .with_item(ImplementationDefinition::new("Show", TE::simple("Array")));
        let collected = collect(program);
        assert_eq!(
            messages(&collected),
            vec!["typechecker: impl Show for Array cannot target a type constructor because the interface does not declare a self type (use 'for ...' to enable constructor implementations)".to_string()]
        );
        assert!(collected.registry.is_empty());
    }

    #[test]
    fn test_impl_method_validation() {
        let show = InterfaceDefinition::new("Show")
            .with_signature(
                FunctionDefinition::signature("show")
                    .with_param(Parameter::untyped("self"))
                    .with_return(TE::simple("String")),
            )
            .with_signature(
                FunctionDefinition::new("debug")
                    .with_param(Parameter::untyped("self"))
                    .with_return(TE::simple("String")),
            )
            .with_signature(
                FunctionDefinition::signature("width")
                    .with_param(Parameter::untyped("self"))
                    .with_return(TE::simple("i32")),
            );
        let program = Program::new()
            .with_item(StructDefinition::new("Point"))
            .with_item(show)
            .with_item(
                ImplementationDefinition::new("Show", TE::simple("Point")).with_definition(
                    FunctionDefinition::new("width")
                        .with_param(Parameter::new("self", TE::simple("Self")))
                        .with_return(TE::simple("String")),
                ),
            );
        let collected = collect(program);
        assert_eq!(
            messages(&collected),
            vec![
                "typechecker: impl Show for Point missing method 'show'".to_string(),
                "typechecker: impl Show for Point method 'width' return type expected i32, got String"
                    .to_string(),
            ]
        );
        assert_eq!(collected.registry.len(), 1);
    }

    #[test]
    fn test_builtins_follow_options() {
        let program = Program::new().with_item(InterfaceDefinition::new("Display"));
        let with_builtins = collect(program.clone());
        assert_eq!(with_builtins.registry.len(), 15);

        let without = DeclarationCollector::with_options(CollectorOptions {
            register_builtins: false,
        })
        .collect(&program);
        assert!(without.registry.is_empty());
    }
}
