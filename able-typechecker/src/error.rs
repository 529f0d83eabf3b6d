//! Error types for the Able typechecker
//!
//! Every problem the resolution engine can report is a `TypecheckError`
//! variant. Errors are never raised: they are wrapped in a `TypeDiagnostic`
//! together with the offending node's span and appended to a running list.

use able_ast::Span;
use miette::{Diagnostic, SourceSpan};
use std::fmt;
use thiserror::Error;

/// Main typechecker error type, one variant per diagnostic category
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum TypecheckError {
    /// An impl target does not fit the interface's self-type pattern
    #[error("{message}")]
    #[diagnostic(
        code(able::typecheck::definition),
        help("Adjust the impl target so it has the shape the interface declares after 'for'")
    )]
    Definition {
        message: String,
        #[label("invalid implementation target")]
        span: Option<SourceSpan>,
    },

    #[error("{message}")]
    #[diagnostic(
        code(able::typecheck::arity),
        help("Check the number of type arguments supplied to the interface")
    )]
    Arity {
        message: String,
        #[label("wrong number of type arguments")]
        span: Option<SourceSpan>,
    },

    /// No implementation satisfies a constraint; `message` carries the best rejection detail
    #[error("{message}")]
    #[diagnostic(code(able::typecheck::unsatisfied_constraint))]
    UnsatisfiedConstraint {
        message: String,
        #[label("constraint not satisfied")]
        span: Option<SourceSpan>,
    },

    #[error("ambiguous implementations of {interface} for {subject}: {}", .candidates.join(", "))]
    #[diagnostic(
        code(able::typecheck::ambiguous_implementation),
        help("Remove one of the overlapping implementations or make one strictly more specific")
    )]
    AmbiguousImplementation {
        interface: String,
        subject: String,
        candidates: Vec<String>,
        #[label("ambiguous implementation lookup")]
        span: Option<SourceSpan>,
    },

    #[error("ambiguous overload for {name}")]
    #[diagnostic(
        code(able::typecheck::ambiguous_overload),
        help("Annotate the arguments so only one overload applies")
    )]
    AmbiguousOverload {
        name: String,
        #[label("call matches more than one overload")]
        span: Option<SourceSpan>,
    },

    #[error("no overloads of {name} match provided arguments")]
    #[diagnostic(code(able::typecheck::no_matching_overload))]
    NoMatchingOverload {
        name: String,
        #[label("no overload accepts these arguments")]
        span: Option<SourceSpan>,
    },

    #[error("{context} references unknown interface '{name}'")]
    #[diagnostic(code(able::typecheck::unknown_interface))]
    UnknownInterface {
        context: String,
        name: String,
        #[label("unknown interface")]
        span: Option<SourceSpan>,
    },

    #[error("{context} must reference an interface (got {found})")]
    #[diagnostic(code(able::typecheck::not_an_interface))]
    NotAnInterface {
        context: String,
        found: String,
        #[label("not an interface")]
        span: Option<SourceSpan>,
    },

    #[error("impl {interface} does not accept type arguments")]
    #[diagnostic(code(able::typecheck::unexpected_interface_arguments))]
    UnexpectedInterfaceArguments {
        interface: String,
        #[label("interface takes no type arguments")]
        span: Option<SourceSpan>,
    },

    #[error("duplicate declaration '{name}'")]
    #[diagnostic(
        code(able::typecheck::duplicate_declaration),
        help("Each struct, union, interface and alias name may only be declared once per scope")
    )]
    DuplicateDeclaration {
        name: String,
        #[label("redeclared here")]
        span: Option<SourceSpan>,
    },

    #[error("type alias cycle detected: {}", .names.join(" -> "))]
    #[diagnostic(code(able::typecheck::alias_cycle))]
    AliasCycle {
        names: Vec<String>,
        #[label("alias refers back to itself")]
        span: Option<SourceSpan>,
    },

    #[error("{implementation} missing method '{method}'")]
    #[diagnostic(
        code(able::typecheck::missing_method),
        help("Implement every interface method that has no default body")
    )]
    MissingMethod {
        implementation: String,
        method: String,
        #[label("missing '{method}'")]
        span: Option<SourceSpan>,
    },

    #[error("{implementation} method '{method}' {detail}")]
    #[diagnostic(code(able::typecheck::method_signature_mismatch))]
    MethodSignatureMismatch {
        implementation: String,
        method: String,
        detail: String,
        #[label("signature differs from the interface")]
        span: Option<SourceSpan>,
    },

    #[error("'{operator}' requires numeric operands (got {left} and {right})")]
    #[diagnostic(code(able::typecheck::numeric_operands))]
    NumericOperands {
        operator: String,
        left: String,
        right: String,
        #[label("non-numeric operand")]
        span: Option<SourceSpan>,
    },

    #[error("'{operator}' {message}")]
    #[diagnostic(code(able::typecheck::integer_width))]
    IntegerWidth {
        operator: String,
        message: String,
        #[label("no integer type is wide enough")]
        span: Option<SourceSpan>,
    },
}

impl TypecheckError {
    /// Attach a source span to the error's label
    pub fn with_span(mut self, new_span: Option<Span>) -> Self {
        let converted = new_span.map(to_source_span);
        match &mut self {
            TypecheckError::Definition { span, .. }
            | TypecheckError::Arity { span, .. }
            | TypecheckError::UnsatisfiedConstraint { span, .. }
            | TypecheckError::AmbiguousImplementation { span, .. }
            | TypecheckError::AmbiguousOverload { span, .. }
            | TypecheckError::NoMatchingOverload { span, .. }
            | TypecheckError::UnknownInterface { span, .. }
            | TypecheckError::NotAnInterface { span, .. }
            | TypecheckError::UnexpectedInterfaceArguments { span, .. }
            | TypecheckError::DuplicateDeclaration { span, .. }
            | TypecheckError::AliasCycle { span, .. }
            | TypecheckError::MissingMethod { span, .. }
            | TypecheckError::MethodSignatureMismatch { span, .. }
            | TypecheckError::NumericOperands { span, .. }
            | TypecheckError::IntegerWidth { span, .. } => *span = converted,
        }
        self
    }
}

/// Convert an AST span into a miette label span
pub fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::new(span.start.into(), span.len())
}

/// A reported problem: the error plus the node it belongs to, if known
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDiagnostic {
    pub error: TypecheckError,
    pub node: Option<Span>,
}

impl TypeDiagnostic {
    pub fn new(error: TypecheckError, node: Option<Span>) -> Self {
        Self {
            error: error.with_span(node),
            node,
        }
    }

    /// Rendered message in the checker's `typechecker: ...` form
    pub fn message(&self) -> String {
        format!("typechecker: {}", self.error)
    }
}

impl fmt::Display for TypeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}
