pub mod cli;
pub mod config;
pub mod executor;
pub mod parser;
pub mod sandbox;
pub mod stack;

// Re-export main types
pub use executor::{
    AuditReport, Change, ErrorKind, ExecError, Mode, SandboxError, Subscription, TypeTag, Value,
};
pub use executor::types::Obj;
pub use parser::unraw::{decode_escapes, EscapeError};
pub use parser::{parse, ParseError, ParseErrorCode, Program};
pub use sandbox::{AuditOutcome, Compiled, Execution, Sandbox, SandboxBuilder, SandboxOptions};

// Re-export config API for convenience
pub use config::{ConfigError, SandboxConfig};
