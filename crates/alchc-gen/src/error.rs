//! Error types for assembly generation.
//!
//! These are internal errors: a well-formed tree from the parser can not
//! trigger them. They exist so a malformed stage file stops the backend
//! with a code instead of a panic.

use thiserror::Error;

/// Error type for the stack-machine backend
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeGenError {
    /// Call target missing from the function table; the parser should have
    /// rejected this program.
    #[error("call to undeclared function '{0}'")]
    UndeclaredFunction(String),

    /// A declaration node without the `FuncInfo(params, name)` shape
    #[error("malformed function declaration node")]
    MalformedDeclaration,

    /// A call node without the `FuncInfo(args, name)` shape
    #[error("malformed call node")]
    MalformedCall,

    /// An identifier index with no entry in the tree's pool
    #[error("identifier index {0} not present in the pool")]
    UnknownIdent(u32),
}

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, CodeGenError>;
