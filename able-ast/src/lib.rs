// Able AST
// Declaration and type expression nodes handed to the typechecker

pub mod ast;

pub use ast::*;

// Version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
