//! # Executor
//!
//! Tree-walking evaluator for parsed programs.
//!
//! ## Core Principles
//!
//! 1. **One evaluator**: a single recursive async walker serves both engines.
//!    The sync driver polls it without an outer waker; the async driver
//!    forwards wakeups to the host task.
//! 2. **Checkpoint per node**: every evaluated node counts a tick and parks
//!    while the sandbox is halted.
//! 3. **Capability gate**: own properties are always readable, inherited
//!    members come from static per-type tables behind the whitelist.
//! 4. **Single thread**: values are `Rc`-based and never leave the thread
//!    that created the sandbox.

pub mod call;
pub mod context;
pub mod errors;
pub mod exec_loop;
pub mod expressions;
pub mod jobs;
pub mod ops;
pub mod property;
pub mod quota;
pub mod scope;
pub mod security;
pub mod statements;
pub mod stdlib;
pub mod subscriptions;
pub mod timers;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use context::{ExecContext, Mode, Realm};
pub use errors::{ErrorKind, Exec, ExecError, SandboxError};
pub use quota::{ExecutionControl, QuotaCallback};
pub use security::{AuditReport, Replacement, SecurityPolicy};
pub use subscriptions::{Change, Subscription};
pub use types::{Obj, TypeTag, Value};
