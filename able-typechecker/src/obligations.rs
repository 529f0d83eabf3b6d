//! Where-clause obligation checking
//!
//! An obligation says "this subject must implement this interface". It is
//! satisfied when the subject is still generic (`Unknown` or a type
//! parameter) or when resolution finds a unique implementation. Evaluation
//! turns every failure into a `TypeDiagnostic`.

use crate::env::Declaration;
use crate::error::{TypeDiagnostic, TypecheckError};
use crate::registry::ConstraintObligation;
use crate::resolver::{GoalStack, ImplementationResolver, ResolutionOutcome};
use crate::types::{Substitution, Type};

/// The interface a constraint type refers to, with its declared arity
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintInterface {
    pub name: String,
    pub expected_args: usize,
    pub args: Vec<Type>,
}

impl ConstraintInterface {
    fn arity_problem(&self) -> Option<String> {
        if self.expected_args > 0 && self.args.is_empty() {
            return Some(format!(
                "requires {} type argument(s) for interface '{}'",
                self.expected_args, self.name
            ));
        }
        if self.args.len() != self.expected_args {
            return Some(format!(
                "expected {} type argument(s) for interface '{}', got {}",
                self.expected_args,
                self.name,
                self.args.len()
            ));
        }
        None
    }
}

/// Why a constraint could not be checked at all
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintProblem {
    UnknownInterface(String),
    NotAnInterface(String),
    Arity(String),
}

impl ConstraintProblem {
    fn describe(&self) -> String {
        match self {
            ConstraintProblem::UnknownInterface(name) => {
                format!("references unknown interface '{name}'")
            }
            ConstraintProblem::NotAnInterface(found) => {
                format!("must reference an interface (got {found})")
            }
            ConstraintProblem::Arity(message) => message.clone(),
        }
    }
}

/// The first obligation of a set that failed, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct ObligationFailure {
    pub obligation: ConstraintObligation,
    pub detail: String,
}

/// `<owner> constraint on T (context)`, the prefix of every obligation message
fn obligation_place(obligation: &ConstraintObligation) -> String {
    if obligation.context.is_empty() {
        format!(
            "{} constraint on {}",
            obligation.owner, obligation.type_param
        )
    } else {
        format!(
            "{} constraint on {} ({})",
            obligation.owner, obligation.type_param, obligation.context
        )
    }
}

fn with_context(detail: String, context: &str) -> String {
    if context.is_empty() {
        detail
    } else {
        format!("{detail} ({context})")
    }
}

impl ImplementationResolver<'_> {
    /// Resolve a constraint type to the interface it names
    pub fn resolve_constraint_interface(
        &self,
        constraint: &Type,
    ) -> Result<ConstraintInterface, ConstraintProblem> {
        match constraint.resolve_alias() {
            Type::Interface { name, .. } => self.lookup_constraint(name, Vec::new()),
            Type::Applied { base, args } => match base.resolve_alias() {
                Type::Interface { name, .. } | Type::Struct { name, .. } => {
                    self.lookup_constraint(name, args.clone())
                }
                other => Err(ConstraintProblem::NotAnInterface(other.to_string())),
            },
            Type::Struct { name, .. } => self.lookup_constraint(name, Vec::new()),
            Type::StructInstance { name, args } => self.lookup_constraint(name, args.clone()),
            other => Err(ConstraintProblem::NotAnInterface(other.to_string())),
        }
    }

    fn lookup_constraint(
        &self,
        name: &str,
        args: Vec<Type>,
    ) -> Result<ConstraintInterface, ConstraintProblem> {
        match self.env().lookup(name) {
            Some(Declaration::Interface(decl)) => Ok(ConstraintInterface {
                name: decl.name.clone(),
                expected_args: decl.type_params.len(),
                args,
            }),
            Some(_) => Err(ConstraintProblem::NotAnInterface(name.to_string())),
            None => Err(ConstraintProblem::UnknownInterface(name.to_string())),
        }
    }

    /// Check every obligation after applying `subst`; the first failure wins
    pub fn obligations_satisfied(
        &self,
        obligations: &[ConstraintObligation],
        subst: &Substitution,
    ) -> Result<(), ObligationFailure> {
        let instantiated: Vec<ConstraintObligation> =
            obligations.iter().map(|ob| ob.substitute(subst)).collect();
        self.obligation_set_satisfied_in(&instantiated, &mut GoalStack::new())
    }

    pub(crate) fn obligation_set_satisfied_in(
        &self,
        obligations: &[ConstraintObligation],
        goals: &mut GoalStack,
    ) -> Result<(), ObligationFailure> {
        for obligation in obligations {
            if let Err(detail) = self.obligation_satisfied_in(obligation, goals) {
                return Err(ObligationFailure {
                    obligation: obligation.clone(),
                    detail,
                });
            }
        }
        Ok(())
    }

    fn obligation_satisfied_in(
        &self,
        obligation: &ConstraintObligation,
        goals: &mut GoalStack,
    ) -> Result<(), String> {
        let interface = self
            .resolve_constraint_interface(&obligation.constraint)
            .map_err(|problem| with_context(problem.describe(), &obligation.context))?;
        if let Some(problem) = interface.arity_problem() {
            return Err(with_context(problem, &obligation.context));
        }
        if obligation.subject.is_unknown() || obligation.subject.is_type_parameter() {
            return Ok(());
        }
        let outcome = self.implements_in(&obligation.subject, &interface.name, &interface.args, goals);
        if outcome.is_resolved() {
            Ok(())
        } else {
            Err(with_context(outcome.message(), &obligation.context))
        }
    }

    /// Evaluate obligations independently, producing one diagnostic per failure
    pub fn evaluate_obligations(&self, obligations: &[ConstraintObligation]) -> Vec<TypeDiagnostic> {
        obligations
            .iter()
            .filter_map(|obligation| self.evaluate_obligation(obligation))
            .collect()
    }

    fn evaluate_obligation(&self, obligation: &ConstraintObligation) -> Option<TypeDiagnostic> {
        let place = obligation_place(obligation);
        let error = match self.resolve_constraint_interface(&obligation.constraint) {
            Err(ConstraintProblem::UnknownInterface(name)) => TypecheckError::UnknownInterface {
                context: place,
                name,
                span: None,
            },
            Err(ConstraintProblem::NotAnInterface(found)) => TypecheckError::NotAnInterface {
                context: place,
                found,
                span: None,
            },
            Err(ConstraintProblem::Arity(message)) => TypecheckError::Arity {
                message: format!("{place} {message}"),
                span: None,
            },
            Ok(interface) => {
                if let Some(problem) = interface.arity_problem() {
                    TypecheckError::Arity {
                        message: format!("{place} {problem}"),
                        span: None,
                    }
                } else if obligation.subject.is_unknown() || obligation.subject.is_type_parameter() {
                    return None;
                } else {
                    let outcome = self.type_implements_interface(
                        &obligation.subject,
                        &interface.name,
                        &interface.args,
                    );
                    match outcome {
                        ResolutionOutcome::Resolved(_) => return None,
                        ambiguous @ ResolutionOutcome::Ambiguous { .. } => {
                            ambiguous.into_error(None)?
                        }
                        unsatisfied => TypecheckError::UnsatisfiedConstraint {
                            message: format!("{place} is not satisfied: {}", unsatisfied.message()),
                            span: None,
                        },
                    }
                }
            }
        };
        tracing::debug!(owner = %obligation.owner, error = %error, "obligation failed");
        Some(TypeDiagnostic::new(error, obligation.node))
    }
}
