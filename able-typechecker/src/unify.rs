//! Structural matching of a concrete subject against an impl target
//!
//! The target may mention the impl's own generic parameters. Matching binds
//! them in a `Substitution` and scores the match: every concrete node that
//! matches adds one, a bare type parameter adds nothing, so fully concrete
//! targets always outrank partially generic ones.

use crate::types::{
    equivalent_for_signature, GenericParamSpec, NominalKind, PrimitiveKind, Substitution, Type,
};

static UNKNOWN: Type = Type::Unknown;

/// Outcome of a successful match
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub substitution: Substitution,
    pub specificity: usize,
}

/// Match `subject` against `target`; impl parameters left unbound default to `Unknown`
pub fn match_type(subject: &Type, target: &Type, params: &[GenericParamSpec]) -> Option<MatchResult> {
    let mut substitution = Substitution::new();
    let specificity = unify(subject, target, &mut substitution)?;
    Some(finalize(substitution, params, specificity))
}

/// Fill in `Unknown` for every impl parameter the match did not bind
pub fn finalize(mut substitution: Substitution, params: &[GenericParamSpec], specificity: usize) -> MatchResult {
    for param in params {
        substitution
            .entry(param.name.clone())
            .or_insert(Type::Unknown);
    }
    MatchResult {
        substitution,
        specificity,
    }
}

/// Match interface arguments position by position (used for blanket impls)
pub fn match_args(actual: &[Type], targets: &[Type], params: &[GenericParamSpec]) -> Option<MatchResult> {
    if targets.is_empty() {
        return Some(finalize(Substitution::new(), params, 0));
    }
    if actual.len() != targets.len() {
        return None;
    }
    let mut substitution = Substitution::new();
    let mut specificity = 0;
    for (actual, target) in actual.iter().zip(targets) {
        specificity += unify(actual, target, &mut substitution)?;
    }
    Some(finalize(substitution, params, specificity))
}

fn bind(name: &str, actual: &Type, subst: &mut Substitution) -> Option<usize> {
    match subst.get(name) {
        Some(existing) if !existing.is_unknown() => {
            if equivalent_for_signature(existing, actual) {
                Some(0)
            } else {
                None
            }
        }
        _ => {
            subst.insert(name.to_string(), actual.clone());
            Some(0)
        }
    }
}

/// Core structural match. Returns the specificity earned, or `None` on mismatch.
pub fn unify(subject: &Type, target: &Type, subst: &mut Substitution) -> Option<usize> {
    match (subject, target) {
        (_, Type::Unknown) | (Type::Unknown, _) => Some(0),
        (_, Type::TypeParameter(name)) => bind(name, subject, subst),
        (Type::Alias { target: inner, .. }, _) => unify(inner, target, subst),
        (_, Type::Alias { target: inner, .. }) => unify(subject, inner, subst),
        (Type::Primitive(a), Type::Primitive(b)) if a == b => Some(1),
        (Type::Integer(a), Type::Integer(b)) if a == b => Some(1),
        (Type::Float(a), Type::Float(b)) if a == b => Some(1),
        (Type::Nullable(inner), Type::Nullable(expected)) => {
            unify(inner, expected, subst).map(|score| score + 1)
        }
        // Nullable widening: `T?` accepts a plain `T` (and `nil`) but earns nothing
        (_, Type::Nullable(expected)) => {
            if matches!(subject, Type::Primitive(PrimitiveKind::Nil)) {
                return Some(0);
            }
            unify(subject, expected, subst).map(|_| 0)
        }
        (Type::UnionLiteral(members), Type::UnionLiteral(expected)) => {
            unify_union_members(members, expected, subst)
        }
        (_, Type::UnionLiteral(expected)) => expected.iter().find_map(|member| {
            let mut trial = subst.clone();
            let score = unify(subject, member, &mut trial)?;
            *subst = trial;
            Some(score)
        }),
        (Type::Function(actual), Type::Function(expected)) => {
            if actual.params.len() != expected.params.len() {
                return None;
            }
            let mut score = 1;
            for (param, expected) in actual.params.iter().zip(&expected.params) {
                score += unify(param, expected, subst)?;
            }
            Some(score + unify(&actual.return_type, &expected.return_type, subst)?)
        }
        (_, Type::Applied { base, args }) if base.is_type_parameter() => {
            unify_constructor_placeholder(subject, base, args, subst)
        }
        _ => unify_nominal(subject, target, subst),
    }
}

/// Union literals match as sets: identical members pair first, the rest greedily
fn unify_union_members(members: &[Type], expected: &[Type], subst: &mut Substitution) -> Option<usize> {
    if members.len() != expected.len() {
        return None;
    }
    let mut unused: Vec<&Type> = expected.iter().collect();
    let mut remaining = Vec::new();
    let mut score = 0;
    for member in members {
        match unused.iter().position(|candidate| *candidate == member) {
            Some(index) => score += unify(member, unused.remove(index), subst)?,
            None => remaining.push(member),
        }
    }
    for member in remaining {
        let (index, trial, earned) = unused.iter().enumerate().find_map(|(index, candidate)| {
            let mut trial = subst.clone();
            unify(member, candidate, &mut trial).map(|earned| (index, trial, earned))
        })?;
        unused.remove(index);
        *subst = trial;
        score += earned;
    }
    Some(score)
}

/// `M A` against `Box i32`: bind `M` to the constructor and match the arguments
fn unify_constructor_placeholder(
    subject: &Type,
    base: &Type,
    args: &[Type],
    subst: &mut Substitution,
) -> Option<usize> {
    let Type::TypeParameter(name) = base else {
        return None;
    };
    let actual = subject.nominal()?;
    if actual.args.len() != args.len() {
        return None;
    }
    let constructor = match subject.resolve_alias() {
        Type::Applied { base, .. } => base.as_ref().clone(),
        Type::StructInstance { name, .. } => Type::Struct {
            name: name.clone(),
            type_params: Vec::new(),
        },
        Type::Array(_) => Type::array(Type::Unknown),
        Type::Map { .. } => Type::map(Type::Unknown, Type::Unknown),
        Type::Range(_) => Type::Range(Box::new(Type::Unknown)),
        Type::Iterator(_) => Type::Iterator(Box::new(Type::Unknown)),
        Type::Future(_) => Type::Future(Box::new(Type::Unknown)),
        _ => return None,
    };
    bind(name, &constructor, subst)?;
    let mut score = 0;
    for (actual, expected) in actual.args.iter().zip(args) {
        score += unify(actual, expected, subst)?;
    }
    Some(score)
}

fn unify_nominal(subject: &Type, target: &Type, subst: &mut Substitution) -> Option<usize> {
    let actual = subject.nominal()?;
    let expected = target.nominal()?;
    if actual.name != expected.name || actual.kind != expected.kind {
        return None;
    }
    if actual.kind == NominalKind::Nullable {
        return None;
    }
    // An unapplied generic target covers every instantiation
    if expected.bare || actual.bare {
        return Some(1);
    }
    if !expected.args.is_empty() && actual.args.len() > expected.args.len() {
        return None;
    }
    let mut score = 1;
    for (index, expected_arg) in expected.args.iter().enumerate() {
        let actual_arg = actual.args.get(index).copied().unwrap_or(&UNKNOWN);
        score += unify(actual_arg, expected_arg, subst)?;
    }
    Some(score)
}
