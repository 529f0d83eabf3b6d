//! Able Typechecker: interface implementation resolution
//!
//! Decides whether a type implements an interface, which `impl` block
//! provides it, and whether the where-clause obligations attached to that
//! block hold.
//!
//! ## Architecture
//!
//! - **Collection** (`collect`): declarations become an `Environment` and an
//!   `ImplementationRegistry`, with impl targets validated against interface
//!   self-type patterns
//! - **Resolution** (`resolver`): candidates are matched by unification and
//!   the most specific one wins; ties are reported as ambiguities
//! - **Obligations** (`obligations`): where-clauses are checked by resolving
//!   their constraints again, recursively
//! - **Overloads** (`overloads`) and **numeric promotion** (`numeric`) reuse
//!   the same type model at call sites and binary operators
//!
//! Failures never abort checking. They are accumulated as `TypeDiagnostic`s
//! and the affected expression degrades to `Type::Unknown`.

pub mod collect;
pub mod env;
pub mod error;
pub mod numeric;
pub mod obligations;
pub mod overloads;
pub mod registry;
pub mod resolver;
pub mod self_pattern;
pub mod types;
pub mod unify;

// Re-export public API
pub use collect::{CollectedProgram, CollectorOptions, DeclarationCollector};
pub use env::{Declaration, Environment, InterfaceDecl};
pub use error::{TypeDiagnostic, TypecheckError};
pub use obligations::{ConstraintInterface, ConstraintProblem, ObligationFailure};
pub use overloads::OverloadSelection;
pub use registry::{ConstraintObligation, ImplementationRegistry, ImplementationSpec};
pub use resolver::{ImplementationResolver, Resolution, ResolutionOutcome, ResolverOptions};
pub use types::{FunctionType, GenericParamSpec, Substitution, Type, WhereConstraintSpec};
pub use unify::MatchResult;

use able_ast::{Program, Span};

/// A checked program plus the diagnostics produced while querying it
#[derive(Debug, Clone)]
pub struct Checker {
    collected: CollectedProgram,
    options: ResolverOptions,
    diagnostics: Vec<TypeDiagnostic>,
}

impl Checker {
    pub fn from_program(program: &Program) -> Self {
        Self::with_options(program, CollectorOptions::default(), ResolverOptions::default())
    }

    pub fn with_options(
        program: &Program,
        collector: CollectorOptions,
        resolver: ResolverOptions,
    ) -> Self {
        let mut collected = DeclarationCollector::with_options(collector).collect(program);
        let diagnostics = std::mem::take(&mut collected.diagnostics);
        Self {
            collected,
            options: resolver,
            diagnostics,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.collected.env
    }

    pub fn registry(&self) -> &ImplementationRegistry {
        &self.collected.registry
    }

    pub fn resolver(&self) -> ImplementationResolver<'_> {
        ImplementationResolver::with_options(
            &self.collected.env,
            &self.collected.registry,
            self.options.clone(),
        )
    }

    /// Collection diagnostics followed by everything reported since
    pub fn diagnostics(&self) -> &[TypeDiagnostic] {
        &self.diagnostics
    }

    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(TypeDiagnostic::message).collect()
    }

    pub fn implementation_provides_interface(
        &self,
        subject: &Type,
        interface: &str,
        args: &[Type],
    ) -> (bool, String) {
        self.resolver()
            .implementation_provides_interface(subject, interface, args)
    }

    /// Require `subject: interface args`, reporting at `node` when it does not hold
    pub fn require_interface(
        &mut self,
        subject: &Type,
        interface: &str,
        args: &[Type],
        node: Option<Span>,
    ) -> bool {
        let outcome = self
            .resolver()
            .type_implements_interface(subject, interface, args);
        if outcome.is_resolved() {
            return true;
        }
        if let Some(error) = outcome.into_error(node) {
            self.diagnostics.push(TypeDiagnostic::new(error, node));
        }
        false
    }

    /// Check instantiated obligations; `true` when all of them hold
    pub fn check_obligations(&mut self, obligations: &[ConstraintObligation]) -> bool {
        let found = self.resolver().evaluate_obligations(obligations);
        let satisfied = found.is_empty();
        self.diagnostics.extend(found);
        satisfied
    }

    /// Return type of calling the function bound to `name` with `args`
    pub fn check_call(&mut self, name: &str, args: &[Type], node: Option<Span>) -> Type {
        let result = match self.collected.env.lookup(name) {
            Some(Declaration::Function(callee)) => self.resolver().resolve_call(name, callee, args),
            _ => Err(TypecheckError::NoMatchingOverload {
                name: name.to_string(),
                span: None,
            }),
        };
        match result {
            Ok(selection) => *selection.function.return_type,
            Err(error) => {
                self.diagnostics.push(TypeDiagnostic::new(error, node));
                Type::Unknown
            }
        }
    }

    /// Result type of `left <operator> right` for arithmetic operators
    pub fn check_binary(
        &mut self,
        operator: &str,
        left: &Type,
        right: &Type,
        node: Option<Span>,
    ) -> Type {
        match numeric::binary_result_type(operator, left, right) {
            Ok(result) => result,
            Err(error) => {
                self.diagnostics.push(TypeDiagnostic::new(error, node));
                Type::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests;
