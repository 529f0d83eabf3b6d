//! Function overload sets
//!
//! Redeclaring a function either duplicates an existing signature (ignored)
//! or adds an overload. At a call site every overload whose parameters accept
//! the arguments is scored; a unique best overload is selected, otherwise the
//! call is reported as ambiguous or unmatched.

use crate::env::Environment;
use crate::error::TypecheckError;
use crate::registry::obligations_from_specs;
use crate::resolver::ImplementationResolver;
use crate::types::{equivalent_for_signature, FunctionOverloadType, FunctionType, Substitution, Type};
use crate::unify;

/// Parameter and return types agree; parameter names and generic names are ignored
pub fn signatures_identical(a: &FunctionType, b: &FunctionType) -> bool {
    a.params.len() == b.params.len()
        && a.params
            .iter()
            .zip(&b.params)
            .all(|(x, y)| equivalent_for_signature(x, y))
        && equivalent_for_signature(&a.return_type, &b.return_type)
}

/// Fold `incoming` into whatever the name is currently bound to.
///
/// Returns `None` when the existing binding is not a function.
pub fn merge_function_declaration(existing: Option<&Type>, incoming: FunctionType) -> Option<Type> {
    match existing {
        None => Some(Type::Function(incoming)),
        Some(Type::Function(current)) => {
            if signatures_identical(current, &incoming) {
                Some(Type::Function(current.clone()))
            } else {
                Some(Type::Overload(FunctionOverloadType {
                    overloads: vec![current.clone(), incoming],
                }))
            }
        }
        Some(Type::Overload(set)) => {
            let mut set = set.clone();
            if !set
                .overloads
                .iter()
                .any(|overload| signatures_identical(overload, &incoming))
            {
                set.overloads.push(incoming);
            }
            Some(Type::Overload(set))
        }
        Some(_) => None,
    }
}

/// Whether a value of type `actual` can be passed where `expected` is declared
pub fn is_assignable(actual: &Type, expected: &Type, env: &Environment) -> bool {
    let actual = actual.resolve_alias();
    let expected = expected.resolve_alias();
    match (actual, expected) {
        (Type::Unknown, _) | (_, Type::Unknown) => true,
        (Type::Nullable(inner), Type::Nullable(target)) => is_assignable(inner, target, env),
        (_, Type::Nullable(target)) => {
            actual == &Type::nil() || is_assignable(actual, target, env)
        }
        (Type::UnionLiteral(members), Type::UnionLiteral(_)) => members
            .iter()
            .all(|member| is_assignable(member, expected, env)),
        (_, Type::UnionLiteral(members)) => members
            .iter()
            .any(|member| is_assignable(actual, member, env)),
        _ => {
            if equivalent_for_signature(actual, expected) {
                return true;
            }
            match expected.nominal() {
                Some(nominal) => env.lookup_union(nominal.name).is_some_and(|decl| {
                    decl.variants
                        .iter()
                        .any(|variant| equivalent_for_signature(actual, variant))
                }),
                None => false,
            }
        }
    }
}

/// The overload chosen for a call, instantiated with the inferred bindings
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadSelection {
    pub index: usize,
    pub function: FunctionType,
    pub substitution: Substitution,
    pub score: usize,
}

#[derive(Debug, Clone)]
struct OverloadCandidate {
    index: usize,
    score: usize,
    generic: bool,
    specificity: usize,
    substitution: Substitution,
}

impl OverloadCandidate {
    fn rank(&self) -> (usize, bool, usize) {
        (self.score, !self.generic, self.specificity)
    }
}

fn accepts_arity(function: &FunctionType, count: usize) -> bool {
    let total = function.params.len();
    let optional_tail = function.params.last().is_some_and(Type::is_nullable);
    count == total || (optional_tail && count + 1 == total)
}

fn signature_specificity(function: &FunctionType) -> usize {
    function.params.iter().map(Type::specificity_score).sum()
}

impl ImplementationResolver<'_> {
    /// Select the overload of `name` that best accepts `args`
    pub fn resolve_call(
        &self,
        name: &str,
        callee: &Type,
        args: &[Type],
    ) -> Result<OverloadSelection, TypecheckError> {
        let overloads: Vec<&FunctionType> = match callee.resolve_alias() {
            Type::Function(function) => vec![function],
            Type::Overload(set) => set.overloads.iter().collect(),
            Type::Unknown => {
                return Ok(OverloadSelection {
                    index: 0,
                    function: FunctionType::new(args.to_vec(), Type::Unknown),
                    substitution: Substitution::new(),
                    score: 0,
                })
            }
            _ => Vec::new(),
        };

        let mut candidates: Vec<OverloadCandidate> = overloads
            .iter()
            .enumerate()
            .filter_map(|(index, function)| self.score_overload(name, index, function, args))
            .collect();
        candidates.sort_by(|a, b| b.rank().cmp(&a.rank()));

        let Some(best) = candidates.first() else {
            tracing::debug!(function = name, "no overload accepts the arguments");
            return Err(TypecheckError::NoMatchingOverload {
                name: name.to_string(),
                span: None,
            });
        };
        if candidates
            .get(1)
            .is_some_and(|runner_up| runner_up.rank() == best.rank())
        {
            tracing::debug!(function = name, "ambiguous overload");
            return Err(TypecheckError::AmbiguousOverload {
                name: name.to_string(),
                span: None,
            });
        }

        tracing::debug!(function = name, overload = best.index, score = best.score, "overload selected");
        Ok(OverloadSelection {
            index: best.index,
            function: overloads[best.index].substitute(&best.substitution),
            substitution: best.substitution.clone(),
            score: best.score,
        })
    }

    fn score_overload(
        &self,
        name: &str,
        index: usize,
        function: &FunctionType,
        args: &[Type],
    ) -> Option<OverloadCandidate> {
        if !accepts_arity(function, args.len()) {
            tracing::trace!(function = name, overload = index, "arity mismatch");
            return None;
        }

        let mut substitution = Substitution::new();
        let mut score = 0;
        for (param, arg) in function.params.iter().zip(args) {
            if arg.is_unknown() {
                continue;
            }
            if param.uses_type_params() {
                unify::unify(arg, param, &mut substitution)?;
                score += 1;
            } else if is_assignable(arg, param, self.env()) {
                score += if param.is_nullable() { 1 } else { 2 };
            } else if let Some((interface, interface_args)) = param.as_interface() {
                if !self
                    .type_implements_interface(arg, interface, interface_args)
                    .is_resolved()
                {
                    return None;
                }
                score += 1;
            } else {
                tracing::trace!(function = name, overload = index, %param, %arg, "argument rejected");
                return None;
            }
        }

        if function.is_generic() || !function.where_clause.is_empty() {
            let obligations = obligations_from_specs(
                &format!("fn {name}"),
                &function.type_params,
                &function.where_clause,
                None,
            );
            if let Err(failure) = self.obligations_satisfied(&obligations, &substitution) {
                tracing::trace!(function = name, overload = index, detail = %failure.detail, "constraint rejected");
                return None;
            }
        }

        Some(OverloadCandidate {
            index,
            score,
            generic: function.is_generic(),
            specificity: signature_specificity(function),
            substitution,
        })
    }
}
