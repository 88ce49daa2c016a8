//! Error types raised by the executor
//!
//! Three families, handled differently:
//! - thrown values and runtime errors (`TypeError`, ...) are catchable by
//!   sandboxed `try`/`catch`
//! - [`SandboxError`] marks a policy violation and always reaches the host
//! - halts, stalls and illegal `await` stop the execution itself

use serde::{Deserialize, Serialize};

use super::ops::display_value;
use super::types::Value;
use crate::parser::ParseError;

/// Built-in error constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
    EvalError,
    URIError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
        ErrorKind::EvalError,
        ErrorKind::URIError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::URIError => "URIError",
        }
    }
}

/// Security policy violation
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
pub enum SandboxError {
    #[error("Method or property access not permitted: {type_name}.{member}")]
    MemberNotPermitted { type_name: String, member: String },

    #[error("Function invocation is not allowed")]
    FunctionCallsForbidden,

    #[error("Function creation is forbidden")]
    FunctionCreationForbidden,

    #[error("Object construction not allowed: {name}")]
    ConstructionNotAllowed { name: String },

    #[error("Cannot assign to const variable \"{name}\"")]
    AssignConst { name: String },

    #[error("Cannot override global variable \"{name}\"")]
    AssignGlobal { name: String },

    #[error("Cannot modify built-in object: {what}")]
    ProtectedObject { what: String },

    #[error("Execution quota exceeded")]
    QuotaExceeded,

    #[error("Cannot resume execution while the quota is exceeded")]
    ResumeOverQuota,
}

/// Everything an execution can end with besides a value
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    /// A value thrown by sandboxed code and not caught
    #[error("Uncaught {}", display_value(.0))]
    Thrown(Value),

    /// Runtime error raised by the executor; becomes an error object when caught
    #[error("{}: {message}", .kind.name())]
    Runtime { kind: ErrorKind, message: String },

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Illegal use of await outside of an async function")]
    IllegalAwait,

    #[error("Execution halted")]
    Halted,

    #[error("Execution stalled: awaiting a promise that can never settle")]
    Stalled,
}

pub type Exec<T> = Result<T, ExecError>;

impl ExecError {
    pub fn runtime(kind: ErrorKind, message: impl Into<String>) -> Self {
        ExecError::Runtime {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::TypeError, message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::RangeError, message)
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::ReferenceError, message)
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::SyntaxError, message)
    }

    /// Whether sandboxed `try`/`catch` may intercept this error
    pub fn is_catchable(&self) -> bool {
        matches!(self, ExecError::Thrown(_) | ExecError::Runtime { .. })
    }

    pub fn is_sandbox_error(&self) -> bool {
        matches!(self, ExecError::Sandbox(_))
    }
}
