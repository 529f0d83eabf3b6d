//! Scenario tests for the Able typechecker
//!
//! Each test builds a program from declarations, runs it through collection
//! and then asks the resolver questions about it.

mod test_collection;
mod test_resolution;

use crate::{Checker, CollectorOptions, Declaration, ResolutionOutcome, ResolverOptions, Type};
use able_ast::Program;

/// Check without built-in implementations so every impl in play is visible
pub(crate) fn check(program: &Program) -> Checker {
    Checker::with_options(
        program,
        CollectorOptions {
            register_builtins: false,
        },
        ResolverOptions::default(),
    )
}

/// The type a declared name stands for when written bare
pub(crate) fn declared(checker: &Checker, name: &str) -> Type {
    checker
        .env()
        .lookup(name)
        .map(Declaration::as_type)
        .unwrap_or(Type::Unknown)
}

pub(crate) fn applied(checker: &Checker, name: &str, args: Vec<Type>) -> Type {
    Type::applied(declared(checker, name), args)
}

pub(crate) fn resolve(checker: &Checker, subject: &Type, interface: &str) -> ResolutionOutcome {
    checker.resolver().resolve(subject, interface, &[])
}

pub(crate) fn winner(outcome: &ResolutionOutcome) -> String {
    match outcome {
        ResolutionOutcome::Resolved(resolution) => resolution.label.clone(),
        other => panic!("expected a resolution, got: {}", other.message()),
    }
}
