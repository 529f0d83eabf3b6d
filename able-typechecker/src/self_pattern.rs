//! Self-type pattern matching
//!
//! An interface may restrict the shapes its implementing targets take with a
//! `for <pattern>` clause (`interface Mappable A for M _`). Identifiers in the
//! pattern that are interface generics, or that name no known type, are
//! placeholders: bound on first occurrence and required to match identically
//! on every later occurrence. `_` matches anything and binds nothing.

use crate::env::{Declaration, Environment, InterfaceDecl};
use crate::error::TypecheckError;
use crate::types::{FloatKind, IntegerKind, PrimitiveKind, Substitution, Type};
use able_ast::TypeExpression;
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

lazy_static! {
    /// Names that always denote a primitive or sized numeric type
    pub static ref PRIMITIVE_TYPE_NAMES: HashSet<&'static str> = {
        let mut names: HashSet<&'static str> = [
            PrimitiveKind::Bool,
            PrimitiveKind::Char,
            PrimitiveKind::String,
            PrimitiveKind::Nil,
            PrimitiveKind::Void,
            PrimitiveKind::IoHandle,
            PrimitiveKind::ProcHandle,
        ]
        .iter()
        .map(|kind| kind.name())
        .collect();
        names.insert("string");
        names.extend(IntegerKind::ALL.iter().map(|kind| kind.name()));
        names.insert(FloatKind::F32.name());
        names.insert(FloatKind::F64.name());
        names
    };

    /// Built-in type constructors and the number of arguments they take
    pub static ref BUILTIN_CONSTRUCTOR_ARITIES: HashMap<&'static str, usize> = {
        let mut arities = HashMap::new();
        arities.insert("Array", 1);
        arities.insert("Map", 2);
        arities.insert("Range", 1);
        arities.insert("Iterator", 1);
        arities.insert("Future", 1);
        arities
    };
}

/// Number of type arguments the named constructor expects, if it is known
pub fn expected_type_argument_count(name: &str, env: &Environment) -> Option<usize> {
    if let Some(arity) = BUILTIN_CONSTRUCTOR_ARITIES.get(name) {
        return Some(*arity);
    }
    if PRIMITIVE_TYPE_NAMES.contains(name) {
        return Some(0);
    }
    match env.lookup(name)? {
        Declaration::Function(_) => None,
        declaration => Some(declaration.type_param_count()),
    }
}

/// Whether `name` acts as a placeholder inside a self-type pattern
pub fn is_placeholder_name(name: &str, interface_generics: &[String], env: &Environment) -> bool {
    if name.is_empty() || name == "Self" || name == "_" {
        return false;
    }
    if interface_generics.iter().any(|generic| generic == name) {
        return true;
    }
    if PRIMITIVE_TYPE_NAMES.contains(name) || BUILTIN_CONSTRUCTOR_ARITIES.contains_key(name) {
        return false;
    }
    // Aliases and functions do not pin a pattern position to a name
    !matches!(
        env.lookup(name),
        Some(Declaration::Struct(_) | Declaration::Union(_) | Declaration::Interface(_))
    )
}

/// A pattern of just `Self` places no restriction
pub fn is_trivial(pattern: &TypeExpression) -> bool {
    pattern.simple_name() == Some("Self")
}

/// `Array _` style patterns also accept the bare constructor `Array`
pub fn allows_bare_constructor(pattern: &TypeExpression) -> bool {
    match pattern {
        TypeExpression::Generic { args, .. } => args.iter().any(TypeExpression::is_wildcard),
        _ => false,
    }
}

/// Whether `target` names a generic type constructor without (all of) its arguments
pub fn targets_bare_constructor(
    target: &TypeExpression,
    impl_generics: &[String],
    env: &Environment,
) -> bool {
    match target {
        TypeExpression::Simple { name, .. } => {
            if impl_generics.iter().any(|generic| generic == name) {
                return false;
            }
            matches!(expected_type_argument_count(name, env), Some(expected) if expected > 0)
        }
        TypeExpression::Generic { base, args, .. } => {
            if args.iter().any(TypeExpression::is_wildcard) {
                return true;
            }
            let Some(base_name) = base.base_name() else {
                return false;
            };
            if impl_generics.iter().any(|generic| generic == base_name) {
                return false;
            }
            matches!(expected_type_argument_count(base_name, env), Some(expected) if args.len() < expected)
        }
        _ => false,
    }
}

/// Structural equality of type expressions, ignoring spans
pub fn expressions_equivalent(a: &TypeExpression, b: &TypeExpression) -> bool {
    match (a, b) {
        (TypeExpression::Simple { name: x, .. }, TypeExpression::Simple { name: y, .. }) => x == y,
        (
            TypeExpression::Generic {
                base: xb, args: xa, ..
            },
            TypeExpression::Generic {
                base: yb, args: ya, ..
            },
        ) => expressions_equivalent(xb, yb) && all_equivalent(xa, ya),
        (
            TypeExpression::Function {
                params: xp,
                return_type: xr,
                ..
            },
            TypeExpression::Function {
                params: yp,
                return_type: yr,
                ..
            },
        ) => all_equivalent(xp, yp) && expressions_equivalent(xr, yr),
        (TypeExpression::Nullable { inner: x, .. }, TypeExpression::Nullable { inner: y, .. })
        | (TypeExpression::Result { inner: x, .. }, TypeExpression::Result { inner: y, .. }) => {
            expressions_equivalent(x, y)
        }
        (TypeExpression::Union { members: x, .. }, TypeExpression::Union { members: y, .. }) => {
            all_equivalent(x, y)
        }
        (TypeExpression::Wildcard { .. }, TypeExpression::Wildcard { .. }) => true,
        _ => false,
    }
}

fn all_equivalent(xs: &[TypeExpression], ys: &[TypeExpression]) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| expressions_equivalent(x, y))
}

/// Excess arguments on the longer side must all be wildcards
fn args_compatible(pattern_args: &[TypeExpression], target_args: &[TypeExpression]) -> bool {
    let shorter = pattern_args.len().min(target_args.len());
    pattern_args[shorter..]
        .iter()
        .chain(&target_args[shorter..])
        .all(TypeExpression::is_wildcard)
}

/// Matches a pattern against one target, accumulating placeholder bindings
pub struct SelfPatternMatcher<'a> {
    env: &'a Environment,
    interface_generics: &'a [String],
    impl_generics: &'a [String],
    bindings: HashMap<String, TypeExpression>,
}

impl<'a> SelfPatternMatcher<'a> {
    pub fn new(env: &'a Environment, interface_generics: &'a [String]) -> Self {
        Self {
            env,
            interface_generics,
            impl_generics: &[],
            bindings: HashMap::new(),
        }
    }

    /// Impl generics may stand in for a type constructor
    pub fn with_impl_generics(mut self, impl_generics: &'a [String]) -> Self {
        self.impl_generics = impl_generics;
        self
    }

    pub fn bindings(&self) -> &HashMap<String, TypeExpression> {
        &self.bindings
    }

    fn is_placeholder(&self, name: &str) -> bool {
        is_placeholder_name(name, self.interface_generics, self.env)
    }

    fn is_type_constructor(&self, name: &str) -> bool {
        self.impl_generics.iter().any(|generic| generic == name)
            || matches!(expected_type_argument_count(name, self.env), Some(expected) if expected > 0)
    }

    fn bind(&mut self, name: &str, target: &TypeExpression) -> bool {
        match self.bindings.get(name) {
            Some(existing) => expressions_equivalent(existing, target),
            None => {
                self.bindings.insert(name.to_string(), target.clone());
                true
            }
        }
    }

    pub fn matches(&mut self, pattern: &TypeExpression, target: &TypeExpression) -> bool {
        if pattern.is_wildcard() {
            return true;
        }
        match pattern {
            TypeExpression::Simple { name, .. } => {
                if self.is_placeholder(name) {
                    return self.bind(name, target);
                }
                target.simple_name() == Some(name.as_str())
            }
            TypeExpression::Generic { base, args, .. } => {
                let bare_allowed = allows_bare_constructor(pattern);
                if bare_allowed {
                    if let TypeExpression::Simple { name, .. } = target {
                        return self.is_type_constructor(name) && self.matches(base, target);
                    }
                }
                let TypeExpression::Generic {
                    base: target_base,
                    args: target_args,
                    ..
                } = target
                else {
                    return false;
                };
                let base_matches = match base.simple_name() {
                    // A constructor placeholder binds the whole target
                    Some(name) if bare_allowed && self.is_placeholder(name) => {
                        self.bind(name, target)
                    }
                    _ => self.matches(base, target_base),
                };
                if !base_matches || !args_compatible(args, target_args) {
                    return false;
                }
                args.iter()
                    .zip(target_args)
                    .all(|(expected, actual)| expected.is_wildcard() || self.matches(expected, actual))
            }
            _ => expressions_equivalent(pattern, target),
        }
    }
}

/// Does `target` have the shape `pattern` describes?
pub fn matches(
    pattern: &TypeExpression,
    target: &TypeExpression,
    interface_generics: &[String],
    env: &Environment,
) -> bool {
    SelfPatternMatcher::new(env, interface_generics).matches(pattern, target)
}

/// Check an impl target against the interface's self-type pattern.
///
/// Without a pattern, targeting a bare type constructor is rejected.
pub fn validate_impl_target(
    interface: &InterfaceDecl,
    target: &TypeExpression,
    impl_generics: &[String],
    env: &Environment,
) -> Result<(), TypecheckError> {
    let label = format!("impl {} for {}", interface.name, target);
    match interface.self_pattern.as_ref().filter(|p| !is_trivial(p)) {
        Some(pattern) => {
            let generics = interface.type_param_names();
            let mut matcher = SelfPatternMatcher::new(env, &generics).with_impl_generics(impl_generics);
            if matcher.matches(pattern, target) {
                Ok(())
            } else {
                Err(TypecheckError::Definition {
                    message: format!("{label} must match interface self type '{pattern}'"),
                    span: None,
                })
            }
        }
        None if targets_bare_constructor(target, impl_generics, env) => {
            Err(TypecheckError::Definition {
                message: format!(
                    "{label} cannot target a type constructor because the interface does not declare a self type (use 'for ...' to enable constructor implementations)"
                ),
                span: None,
            })
        }
        None => Ok(()),
    }
}

/// Placeholders that sit in constructor position of the interface's self pattern
pub fn constructor_placeholders(interface: &InterfaceDecl, env: &Environment) -> Vec<String> {
    let Some(pattern) = interface.self_pattern.as_ref() else {
        return Vec::new();
    };
    let generics = interface.type_param_names();
    let mut found = Vec::new();
    collect_constructor_placeholders(pattern, &generics, env, &mut found);
    found
}

fn collect_constructor_placeholders(
    expr: &TypeExpression,
    generics: &[String],
    env: &Environment,
    found: &mut Vec<String>,
) {
    match expr {
        TypeExpression::Generic { base, args, .. } => {
            match base.simple_name() {
                Some(name) => {
                    if is_placeholder_name(name, generics, env) && !found.iter().any(|f| f == name) {
                        found.push(name.to_string());
                    }
                }
                None => collect_constructor_placeholders(base, generics, env, found),
            }
            for arg in args {
                collect_constructor_placeholders(arg, generics, env, found);
            }
        }
        TypeExpression::Function {
            params,
            return_type,
            ..
        } => {
            for param in params {
                collect_constructor_placeholders(param, generics, env, found);
            }
            collect_constructor_placeholders(return_type, generics, env, found);
        }
        TypeExpression::Nullable { inner, .. } | TypeExpression::Result { inner, .. } => {
            collect_constructor_placeholders(inner, generics, env, found)
        }
        TypeExpression::Union { members, .. } => {
            for member in members {
                collect_constructor_placeholders(member, generics, env, found);
            }
        }
        TypeExpression::Simple { .. } | TypeExpression::Wildcard { .. } => {}
    }
}

/// The bare constructor of a subject type: `Array i32` gives `Array`
pub fn self_type_constructor(subject: &Type, env: &Environment) -> Type {
    match subject {
        Type::Unknown => Type::Unknown,
        Type::Alias { target, .. } => self_type_constructor(target, env),
        Type::Applied { base, .. } => self_type_constructor(base, env),
        Type::Array(_) => Type::array(Type::Unknown),
        Type::Map { .. } => Type::map(Type::Unknown, Type::Unknown),
        Type::Range(_) => Type::Range(Box::new(Type::Unknown)),
        Type::Iterator(_) => Type::Iterator(Box::new(Type::Unknown)),
        Type::Future(_) => Type::Future(Box::new(Type::Unknown)),
        Type::StructInstance { name, .. } => match env.lookup(name) {
            Some(declaration @ (Declaration::Struct(_) | Declaration::Union(_))) => {
                declaration.as_type()
            }
            _ => Type::Struct {
                name: name.clone(),
                type_params: Vec::new(),
            },
        },
        other => other.clone(),
    }
}

/// Bind constructor placeholders (`M` in `M _`) to the subject's constructor
pub fn apply_constructor_substitution(
    subst: &mut Substitution,
    interface: &InterfaceDecl,
    subject: &Type,
    env: &Environment,
) {
    let placeholders = constructor_placeholders(interface, env);
    if placeholders.is_empty() {
        return;
    }
    let constructor = self_type_constructor(subject, env);
    if constructor.is_unknown() {
        return;
    }
    for name in placeholders {
        let overridable = match subst.get(&name) {
            None | Some(Type::Unknown) => true,
            Some(Type::TypeParameter(existing)) => existing == &name,
            Some(_) => false,
        };
        if overridable {
            subst.insert(name, constructor.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{AliasDecl, StructDecl};
    use crate::types::GenericParamSpec;
    use able_ast::TypeExpression as TE;
    use indexmap::IndexMap;

    fn env_with_structs(names: &[(&str, usize)]) -> Environment {
        let mut env = Environment::new();
        for (name, arity) in names {
            env.define(
                *name,
                Declaration::Struct(StructDecl {
                    name: name.to_string(),
                    type_params: (0..*arity)
                        .map(|i| GenericParamSpec::new(format!("T{i}")))
                        .collect(),
                    fields: IndexMap::new(),
                    where_clause: Vec::new(),
                    span: None,
                }),
            );
        }
        env
    }

    fn array_wildcard() -> TE {
        TE::generic("Array", vec![TE::wildcard()])
    }

    #[test]
    fn test_wildcard_pattern_accepts_bare_and_applied_constructor() {
        let env = env_with_structs(&[("HashMap", 1)]);
        assert!(matches(&array_wildcard(), &TE::simple("Array"), &[], &env));
        assert!(matches(
            &array_wildcard(),
            &TE::generic("Array", vec![TE::simple("T")]),
            &[],
            &env
        ));
    }

    #[test]
    fn test_wildcard_pattern_rejects_other_shapes() {
        let env = env_with_structs(&[("HashMap", 1)]);
        assert!(!matches(
            &array_wildcard(),
            &TE::generic("HashMap", vec![TE::simple("T")]),
            &[],
            &env
        ));
        assert!(!matches(&array_wildcard(), &TE::simple("i32"), &[], &env));
    }

    #[test]
    fn test_placeholder_binds_consistently() {
        let env = env_with_structs(&[("Pair", 2)]);
        let pattern = TE::generic("Pair", vec![TE::simple("A"), TE::simple("A")]);
        let same = TE::generic("Pair", vec![TE::simple("i32"), TE::simple("i32")]);
        let different = TE::generic("Pair", vec![TE::simple("i32"), TE::simple("String")]);

        assert!(matches(&pattern, &same, &[], &env));
        assert!(!matches(&pattern, &different, &[], &env));
    }

    #[test]
    fn test_constructor_placeholder_binds_target() {
        let env = env_with_structs(&[("Box", 1)]);
        let pattern = TE::generic("M", vec![TE::wildcard()]);
        let generics = vec!["A".to_string()];

        let mut matcher = SelfPatternMatcher::new(&env, &generics);
        assert!(matcher.matches(&pattern, &TE::simple("Box")));
        assert!(matcher.bindings().contains_key("M"));
    }

    #[test]
    fn test_constructor_placeholder_rejects_non_constructors() {
        let env = env_with_structs(&[("Box", 1), ("Point", 0)]);
        let pattern = TE::generic("M", vec![TE::wildcard()]);
        let generics = vec!["A".to_string()];

        assert!(!matches(&pattern, &TE::simple("i32"), &generics, &env));
        assert!(!matches(&pattern, &TE::simple("String"), &generics, &env));
        assert!(!matches(&pattern, &TE::simple("Point"), &generics, &env));
        assert!(matches(&pattern, &TE::simple("Box"), &generics, &env));

        let mut interface = InterfaceDecl::new("Mappable");
        interface.type_params.push(GenericParamSpec::new("A"));
        interface.self_pattern = Some(pattern);
        let error = validate_impl_target(&interface, &TE::simple("i32"), &[], &env)
            .expect_err("i32 takes no type arguments");
        assert_eq!(
            error.to_string(),
            "impl Mappable for i32 must match interface self type 'M _'"
        );
        assert!(validate_impl_target(&interface, &TE::simple("F"), &["F".to_string()], &env).is_ok());
    }

    #[test]
    fn test_alias_names_are_placeholders() {
        let mut env = env_with_structs(&[("Box", 1)]);
        env.define(
            "C",
            Declaration::Alias(AliasDecl {
                name: "C".to_string(),
                type_params: Vec::new(),
                target: Type::i32(),
                span: None,
            }),
        );
        let array_of_t = TE::generic("Array", vec![TE::simple("T")]);

        assert!(matches(&TE::generic("C", vec![TE::wildcard()]), &array_of_t, &[], &env));
        assert!(!matches(&TE::generic("Box", vec![TE::wildcard()]), &array_of_t, &[], &env));
    }

    #[test]
    fn test_excess_arguments_must_be_wildcards() {
        let env = env_with_structs(&[("Pair", 2)]);
        let pattern = TE::generic("Pair", vec![TE::simple("i32"), TE::wildcard()]);
        assert!(matches(
            &pattern,
            &TE::generic("Pair", vec![TE::simple("i32")]),
            &[],
            &env
        ));

        let strict = TE::generic("Pair", vec![TE::simple("i32")]);
        assert!(!matches(
            &strict,
            &TE::generic("Pair", vec![TE::simple("i32"), TE::simple("bool")]),
            &[],
            &env
        ));
    }

    #[test]
    fn test_validate_without_pattern_rejects_bare_constructor() {
        let env = env_with_structs(&[("Box", 1)]);
        let interface = InterfaceDecl::new("Show");

        let error = validate_impl_target(&interface, &TE::simple("Box"), &[], &env)
            .expect_err("bare constructor should be rejected");
        assert!(error
            .to_string()
            .contains("cannot target a type constructor because the interface does not declare a self type"));

        assert!(validate_impl_target(
            &interface,
            &TE::generic("Box", vec![TE::simple("T")]),
            &["T".to_string()],
            &env
        )
        .is_ok());
    }

    #[test]
    fn test_validate_reports_expected_pattern() {
        let env = Environment::new();
        let mut interface = InterfaceDecl::new("Container");
        interface.self_pattern = Some(array_wildcard());

        let error = validate_impl_target(&interface, &TE::simple("i32"), &[], &env)
            .expect_err("i32 does not fit Array _");
        assert_eq!(
            error.to_string(),
            "impl Container for i32 must match interface self type 'Array _'"
        );
    }

    #[test]
    fn test_trivial_self_pattern_is_ignored() {
        let env = env_with_structs(&[("Point", 0)]);
        let mut interface = InterfaceDecl::new("Show");
        interface.self_pattern = Some(TE::simple("Self"));
        assert!(validate_impl_target(&interface, &TE::simple("Point"), &[], &env).is_ok());
    }

    #[test]
    fn test_constructor_substitution_uses_subject_constructor() {
        let env = env_with_structs(&[("Box", 1)]);
        let mut interface = InterfaceDecl::new("Mappable");
        interface.type_params.push(GenericParamSpec::new("A"));
        interface.self_pattern = Some(TE::generic("M", vec![TE::wildcard()]));

        let subject = Type::applied(
            Type::Struct {
                name: "Box".to_string(),
                type_params: vec!["T0".to_string()],
            },
            vec![Type::i32()],
        );
        let mut subst = Substitution::new();
        apply_constructor_substitution(&mut subst, &interface, &subject, &env);

        assert_eq!(
            subst.get("M"),
            Some(&Type::Struct {
                name: "Box".to_string(),
                type_params: vec!["T0".to_string()],
            })
        );
    }
}
