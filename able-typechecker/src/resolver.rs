//! Implementation resolution
//!
//! Given a subject type and an interface (with optional interface arguments),
//! decide which registered implementation applies:
//!
//! 1. Filter the registry to unnamed implementations of the interface.
//! 2. Match the subject against each target, seeding `Self -> subject` and
//!    binding the interface's own parameters from the impl's arguments.
//! 3. Discard candidates whose instantiated interface arguments conflict
//!    with the caller's.
//! 4. Discard candidates whose where-clause obligations fail (recursively).
//! 5. Pick the most specific survivor, or report ambiguity.
//!
//! Rejection details are kept so the caller can explain a failure. When
//! several candidates are rejected the longest detail wins; that is a
//! heuristic for "most informative", not a guarantee.

use crate::env::Environment;
use crate::error::TypecheckError;
use crate::registry::{ImplementationRegistry, ImplementationSpec};
use crate::self_pattern;
use crate::types::{equivalent_for_signature, GenericParamSpec, Substitution, Type};
use crate::unify::{self, MatchResult};
use able_ast::Span;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Interface pairs where the first name is preferred over the second on a tie
const INTERFACE_PRIORITY_PAIRS: [(&str, &str); 2] = [("Eq", "PartialEq"), ("Ord", "PartialOrd")];

/// Tunables for resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    /// Deepest chain of nested obligations explored before giving up
    pub max_obligation_depth: usize,
    /// User-defined implementations beat built-in ones on otherwise equal footing
    pub prefer_user_implementations: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_obligation_depth: 64,
            prefer_user_implementations: true,
        }
    }
}

/// The implementation chosen for a subject
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub interface_name: String,
    pub label: String,
    /// Bindings for `Self`, the impl's generics and the interface's parameters
    pub substitution: Substitution,
    pub specificity: usize,
    pub is_builtin: bool,
}

impl Resolution {
    /// A subject that satisfies the interface without an implementation
    fn trivial(subject: &Type, interface: &str) -> Self {
        let mut substitution = Substitution::new();
        substitution.insert("Self".to_string(), subject.clone());
        Self {
            interface_name: interface.to_string(),
            label: subject.to_string(),
            substitution,
            specificity: 0,
            is_builtin: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    Resolved(Resolution),
    /// No implementation applies; `detail` is the best rejection reason, possibly empty
    Unsatisfied {
        subject: String,
        interface: String,
        detail: String,
    },
    Ambiguous {
        interface: String,
        subject: String,
        candidates: Vec<String>,
    },
}

impl ResolutionOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionOutcome::Resolved(_))
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        match self {
            ResolutionOutcome::Resolved(resolution) => Some(resolution),
            _ => None,
        }
    }

    /// Rejection detail: empty when resolved or when nothing more specific is known
    pub fn detail(&self) -> String {
        match self {
            ResolutionOutcome::Resolved(_) => String::new(),
            ResolutionOutcome::Unsatisfied { detail, .. } => detail.clone(),
            ResolutionOutcome::Ambiguous { .. } => self.message(),
        }
    }

    /// Full explanation of a failed resolution
    pub fn message(&self) -> String {
        match self {
            ResolutionOutcome::Resolved(resolution) => resolution.label.clone(),
            ResolutionOutcome::Unsatisfied {
                subject,
                interface,
                detail,
            } => {
                if detail.is_empty() {
                    format!("{subject} does not implement {interface}")
                } else {
                    format!("{subject} does not implement {interface}: {detail}")
                }
            }
            ResolutionOutcome::Ambiguous {
                interface,
                subject,
                candidates,
            } => format!(
                "ambiguous implementations of {interface} for {subject}: {}",
                candidates.join(", ")
            ),
        }
    }

    pub fn into_error(self, node: Option<Span>) -> Option<TypecheckError> {
        let error = match self {
            ResolutionOutcome::Resolved(_) => return None,
            unsatisfied @ ResolutionOutcome::Unsatisfied { .. } => {
                TypecheckError::UnsatisfiedConstraint {
                    message: unsatisfied.message(),
                    span: None,
                }
            }
            ResolutionOutcome::Ambiguous {
                interface,
                subject,
                candidates,
            } => TypecheckError::AmbiguousImplementation {
                interface,
                subject,
                candidates,
                span: None,
            },
        };
        Some(error.with_span(node))
    }

    fn has_reason(&self) -> bool {
        match self {
            ResolutionOutcome::Resolved(_) => false,
            ResolutionOutcome::Unsatisfied { detail, .. } => !detail.is_empty(),
            ResolutionOutcome::Ambiguous { .. } => true,
        }
    }
}

/// Goals currently being resolved; re-entering one is a cycle
#[derive(Debug, Default)]
pub(crate) struct GoalStack {
    goals: Vec<String>,
}

impl GoalStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn enter(&mut self, goal: String, max_depth: usize) -> Result<(), String> {
        if self.goals.contains(&goal) {
            return Err(format!("cyclic obligation while checking {goal}"));
        }
        if self.goals.len() >= max_depth {
            return Err(format!(
                "obligation depth limit of {max_depth} exceeded while checking {goal}"
            ));
        }
        self.goals.push(goal);
        Ok(())
    }

    fn leave(&mut self) {
        self.goals.pop();
    }
}

/// A candidate that survived matching; discarded after each resolution call
#[derive(Debug, Clone)]
struct ImplementationMatch<'r> {
    spec: &'r ImplementationSpec,
    substitution: Substitution,
    actual_args: Vec<Type>,
    specificity: usize,
    constraint_keys: BTreeSet<String>,
    is_concrete: bool,
}

/// `Interface arg1 arg2`, as used in messages
pub fn format_interface(interface: &str, args: &[Type]) -> String {
    if args.is_empty() {
        interface.to_string()
    } else {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        format!("{} {}", interface, args.join(" "))
    }
}

/// Type parameters and `Unknown` act as wildcards on either side
pub fn interface_args_compatible(actual: &[Type], expected: &[Type]) -> bool {
    if expected.is_empty() {
        return true;
    }
    if actual.len() != expected.len() {
        return false;
    }
    actual.iter().zip(expected).all(|(a, b)| {
        a.is_unknown()
            || b.is_unknown()
            || a.is_type_parameter()
            || b.is_type_parameter()
            || equivalent_for_signature(a, b)
    })
}

/// Interfaces whose implementations can answer a lookup of `interface`
fn candidate_interfaces(interface: &str) -> Vec<&str> {
    let mut names = vec![interface];
    for (preferred, fallback) in INTERFACE_PRIORITY_PAIRS {
        if interface == fallback {
            names.push(preferred);
        }
    }
    names
}

fn is_strict_superset(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    !a.is_empty() && a.len() > b.len() && b.is_subset(a)
}

fn is_proper_subset(a: &[String], b: &[String]) -> bool {
    !a.is_empty() && a.len() < b.len() && a.iter().all(|value| b.contains(value))
}

fn is_concrete_target(target: &Type) -> bool {
    target.as_interface().is_none() && !target.uses_type_params() && !target.contains_unknown()
}

/// Resolves interface membership against a read-only environment and registry
#[derive(Debug, Clone)]
pub struct ImplementationResolver<'a> {
    env: &'a Environment,
    registry: &'a ImplementationRegistry,
    options: ResolverOptions,
}

impl<'a> ImplementationResolver<'a> {
    pub fn new(env: &'a Environment, registry: &'a ImplementationRegistry) -> Self {
        Self::with_options(env, registry, ResolverOptions::default())
    }

    pub fn with_options(
        env: &'a Environment,
        registry: &'a ImplementationRegistry,
        options: ResolverOptions,
    ) -> Self {
        Self {
            env,
            registry,
            options,
        }
    }

    pub fn env(&self) -> &'a Environment {
        self.env
    }

    pub fn registry(&self) -> &'a ImplementationRegistry {
        self.registry
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve `subject: interface args` against the registry alone
    pub fn resolve(&self, subject: &Type, interface: &str, args: &[Type]) -> ResolutionOutcome {
        self.resolve_in(subject, interface, args, &mut GoalStack::new())
    }

    /// `(provided, rejection detail)` for `subject: interface args`
    pub fn implementation_provides_interface(
        &self,
        subject: &Type,
        interface: &str,
        args: &[Type],
    ) -> (bool, String) {
        let outcome = self.resolve(subject, interface, args);
        (outcome.is_resolved(), outcome.detail())
    }

    /// Like `resolve`, but also accepts nullable and union subjects through
    /// their members and a subject that is the interface itself
    pub fn type_implements_interface(
        &self,
        subject: &Type,
        interface: &str,
        args: &[Type],
    ) -> ResolutionOutcome {
        self.implements_in(subject, interface, args, &mut GoalStack::new())
    }

    /// Match a subject against an impl target expression's type.
    ///
    /// Interface targets (blanket impls) are answered by resolving the
    /// subject against that interface's own implementations.
    pub fn match_implementation_target(
        &self,
        subject: &Type,
        target: &Type,
        params: &[GenericParamSpec],
    ) -> Option<MatchResult> {
        self.match_target_in(subject, target, params, &mut GoalStack::new())
    }

    pub(crate) fn implements_in(
        &self,
        subject: &Type,
        interface: &str,
        args: &[Type],
        goals: &mut GoalStack,
    ) -> ResolutionOutcome {
        match subject {
            Type::Unknown | Type::TypeParameter(_) => {
                ResolutionOutcome::Resolved(Resolution::trivial(subject, interface))
            }
            Type::Nullable(inner) => {
                let direct = self.resolve_in(subject, interface, args, goals);
                if direct.is_resolved() {
                    return direct;
                }
                let through_inner = self.implements_in(inner, interface, args, goals);
                if through_inner.is_resolved() || through_inner.has_reason() || !direct.has_reason() {
                    through_inner
                } else {
                    direct
                }
            }
            Type::UnionLiteral(members) => {
                let direct = self.resolve_in(subject, interface, args, goals);
                if direct.is_resolved() {
                    return direct;
                }
                for member in members {
                    let outcome = self.implements_in(member, interface, args, goals);
                    if outcome.is_resolved() {
                        continue;
                    }
                    if outcome.has_reason() || !direct.has_reason() {
                        return outcome;
                    }
                    return direct;
                }
                ResolutionOutcome::Resolved(Resolution::trivial(subject, interface))
            }
            _ => {
                if let Some((name, subject_args)) = subject.as_interface() {
                    if name == interface
                        && (args.is_empty() || interface_args_compatible(subject_args, args))
                    {
                        return ResolutionOutcome::Resolved(Resolution::trivial(subject, interface));
                    }
                }
                self.resolve_in(subject, interface, args, goals)
            }
        }
    }

    pub(crate) fn resolve_in(
        &self,
        subject: &Type,
        interface: &str,
        args: &[Type],
        goals: &mut GoalStack,
    ) -> ResolutionOutcome {
        let interface_label = format_interface(interface, args);
        let goal = format!("{subject}: {interface_label}");
        if let Err(detail) = goals.enter(goal, self.options.max_obligation_depth) {
            tracing::debug!(%subject, interface = %interface_label, %detail, "resolution cut short");
            return ResolutionOutcome::Unsatisfied {
                subject: subject.to_string(),
                interface: interface_label,
                detail,
            };
        }

        let (matches, best_detail) = self.collect_matches(subject, interface, args, goals);
        let outcome = match matches.len() {
            0 => ResolutionOutcome::Unsatisfied {
                subject: subject.to_string(),
                interface: interface_label.clone(),
                detail: best_detail,
            },
            1 => ResolutionOutcome::Resolved(self.resolution_for(&matches[0], subject, interface)),
            _ => match self.select_most_specific(&matches) {
                Ok(winner) => {
                    ResolutionOutcome::Resolved(self.resolution_for(&matches[winner], subject, interface))
                }
                Err(contenders) => {
                    let candidates: BTreeSet<String> = contenders
                        .iter()
                        .map(|&index| {
                            let m = &matches[index];
                            m.spec.candidate_label(subject, &m.substitution, &m.actual_args)
                        })
                        .collect();
                    ResolutionOutcome::Ambiguous {
                        interface: interface.to_string(),
                        subject: subject.to_string(),
                        candidates: candidates.into_iter().collect(),
                    }
                }
            },
        };
        goals.leave();

        match &outcome {
            ResolutionOutcome::Resolved(resolution) => {
                tracing::debug!(%subject, interface = %interface_label, winner = %resolution.label, "implementation resolved")
            }
            ResolutionOutcome::Unsatisfied { detail, .. } => {
                tracing::debug!(%subject, interface = %interface_label, %detail, "no implementation applies")
            }
            ResolutionOutcome::Ambiguous { candidates, .. } => {
                tracing::debug!(%subject, interface = %interface_label, ?candidates, "ambiguous implementations")
            }
        }
        outcome
    }

    fn resolution_for(&self, m: &ImplementationMatch<'_>, subject: &Type, interface: &str) -> Resolution {
        Resolution {
            interface_name: interface.to_string(),
            label: m.spec.candidate_label(subject, &m.substitution, &m.actual_args),
            substitution: m.substitution.clone(),
            specificity: m.specificity,
            is_builtin: m.spec.is_builtin,
        }
    }

    fn match_target_in(
        &self,
        subject: &Type,
        target: &Type,
        params: &[GenericParamSpec],
        goals: &mut GoalStack,
    ) -> Option<MatchResult> {
        match target.as_interface() {
            Some((interface, target_args)) => {
                self.match_interface_target(subject, interface, target_args, params, goals)
            }
            None => unify::match_type(subject, target, params),
        }
    }

    /// Blanket target `impl Show for Display`: the subject must itself implement `Display`
    fn match_interface_target(
        &self,
        subject: &Type,
        interface: &str,
        target_args: &[Type],
        params: &[GenericParamSpec],
        goals: &mut GoalStack,
    ) -> Option<MatchResult> {
        if subject.is_unknown() {
            return None;
        }
        if let Some((name, subject_args)) = subject.as_interface() {
            if name == interface {
                return unify::match_args(subject_args, target_args, params);
            }
        }

        let goal = format!("{subject}: {interface} (blanket target)");
        if let Err(detail) = goals.enter(goal, self.options.max_obligation_depth) {
            tracing::trace!(%subject, interface, %detail, "blanket target skipped");
            return None;
        }
        let (matches, _) = self.collect_matches(subject, interface, &[], goals);
        goals.leave();

        let candidates: Vec<(usize, MatchResult)> = matches
            .iter()
            .enumerate()
            .filter_map(|(index, m)| {
                unify::match_args(&m.actual_args, target_args, params).map(|result| (index, result))
            })
            .collect();
        match candidates.len() {
            0 => None,
            1 => candidates.into_iter().next().map(|(_, result)| result),
            _ => {
                let surviving: Vec<ImplementationMatch<'_>> = candidates
                    .iter()
                    .map(|(index, _)| matches[*index].clone())
                    .collect();
                let winner = self.select_most_specific(&surviving).ok()?;
                candidates.into_iter().nth(winner).map(|(_, result)| result)
            }
        }
    }

    fn collect_matches(
        &self,
        subject: &Type,
        interface: &str,
        args: &[Type],
        goals: &mut GoalStack,
    ) -> (Vec<ImplementationMatch<'a>>, String) {
        let mut matches = Vec::new();
        let mut best_detail = String::new();
        let names = candidate_interfaces(interface);

        for spec in self.registry.candidates(&names) {
            let Some(matched) = self.match_target_in(subject, &spec.target, &spec.type_params, goals)
            else {
                tracing::trace!(%subject, target = %spec.target, "target does not match");
                continue;
            };

            let mut substitution = matched.substitution;
            substitution.insert("Self".to_string(), subject.clone());
            for (index, param) in spec.interface.type_params.iter().enumerate() {
                let value = spec
                    .interface_args
                    .get(index)
                    .map(|arg| arg.substitute(&substitution))
                    .unwrap_or(Type::Unknown);
                substitution.entry(param.name.clone()).or_insert(value);
            }
            self_pattern::apply_constructor_substitution(
                &mut substitution,
                &spec.interface,
                subject,
                self.env,
            );
            for param in &spec.type_params {
                substitution
                    .entry(param.name.clone())
                    .or_insert(Type::Unknown);
            }

            let actual_args: Vec<Type> = spec
                .interface_args
                .iter()
                .map(|arg| arg.substitute(&substitution))
                .collect();
            let label = spec.candidate_label(subject, &substitution, &actual_args);

            if !interface_args_compatible(&actual_args, args) {
                let expected = if args.is_empty() {
                    "(none)".to_string()
                } else {
                    format_interface(interface, args)
                };
                let detail = format!("{label}: interface arguments do not match expected {expected}");
                tracing::trace!(%detail, "candidate rejected");
                if detail.len() > best_detail.len() {
                    best_detail = detail;
                }
                continue;
            }

            if !spec.obligations.is_empty() {
                let obligations: Vec<_> = spec
                    .obligations
                    .iter()
                    .map(|ob| ob.substitute(&substitution))
                    .collect();
                if let Err(failure) = self.obligation_set_satisfied_in(&obligations, goals) {
                    let detail = if failure.detail.starts_with(&label) {
                        failure.detail
                    } else {
                        format!("{label}: {}", failure.detail)
                    };
                    tracing::trace!(%detail, "candidate rejected");
                    if detail.len() > best_detail.len() {
                        best_detail = detail;
                    }
                    continue;
                }
            }

            tracing::trace!(candidate = %label, specificity = matched.specificity, "candidate matched");
            matches.push(ImplementationMatch {
                spec,
                substitution,
                actual_args,
                specificity: matched.specificity,
                constraint_keys: spec.constraint_keys(),
                is_concrete: is_concrete_target(&spec.target),
            });
        }
        (matches, best_detail)
    }

    /// Winner-tracking scan with tie accumulation; `Err` carries the tied contenders
    fn select_most_specific(&self, matches: &[ImplementationMatch<'_>]) -> Result<usize, Vec<usize>> {
        let mut best = 0;
        let mut contenders = vec![0];
        for index in 1..matches.len() {
            match self.compare(&matches[index], &matches[best]) {
                Ordering::Greater => {
                    best = index;
                    contenders = vec![index];
                }
                Ordering::Less => {}
                Ordering::Equal => match self.compare(&matches[best], &matches[index]) {
                    Ordering::Less => {
                        best = index;
                        contenders = vec![index];
                    }
                    Ordering::Equal => contenders.push(index),
                    Ordering::Greater => {}
                },
            }
        }
        if contenders.len() == 1 {
            return Ok(best);
        }
        for (preferred, fallback) in INTERFACE_PRIORITY_PAIRS {
            if let Some(winner) = pick_priority_pair(matches, &contenders, preferred, fallback) {
                return Ok(winner);
            }
        }
        Err(contenders)
    }

    /// Specificity order between two candidates
    fn compare(&self, a: &ImplementationMatch<'_>, b: &ImplementationMatch<'_>) -> Ordering {
        if a.is_concrete != b.is_concrete {
            return if a.is_concrete {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        if is_strict_superset(&a.constraint_keys, &b.constraint_keys) {
            return Ordering::Greater;
        }
        if is_strict_superset(&b.constraint_keys, &a.constraint_keys) {
            return Ordering::Less;
        }

        let a_union = &a.spec.union_variants;
        let b_union = &b.spec.union_variants;
        match (a_union.is_empty(), b_union.is_empty()) {
            (false, true) => return Ordering::Less,
            (true, false) => return Ordering::Greater,
            (false, false) => {
                if is_proper_subset(a_union, b_union) {
                    return Ordering::Greater;
                }
                if is_proper_subset(b_union, a_union) {
                    return Ordering::Less;
                }
                // Distinct restrictions of the same size are incomparable
                if a_union != b_union {
                    return b_union.len().cmp(&a_union.len());
                }
            }
            (true, true) => {}
        }

        match a.specificity.cmp(&b.specificity) {
            Ordering::Equal => {}
            other => return other,
        }

        if self.options.prefer_user_implementations && a.spec.is_builtin != b.spec.is_builtin {
            return if a.spec.is_builtin {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        Ordering::Equal
    }
}

/// The preferred interface wins only when the tie is exactly one candidate of each name
fn pick_priority_pair(
    matches: &[ImplementationMatch<'_>],
    contenders: &[usize],
    preferred: &str,
    fallback: &str,
) -> Option<usize> {
    let mut preferred_match = None;
    let mut fallback_count = 0;
    for &index in contenders {
        let name = matches[index].spec.interface_name.as_str();
        if name == preferred {
            if preferred_match.is_some() {
                return None;
            }
            preferred_match = Some(index);
        } else if name == fallback {
            fallback_count += 1;
        } else {
            return None;
        }
    }
    if fallback_count == 1 {
        preferred_match
    } else {
        None
    }
}
