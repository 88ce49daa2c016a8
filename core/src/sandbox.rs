//! Host-facing API
//!
//! A [`Sandbox`] owns one realm: the global object, the security policy,
//! the quota controller and the job/timer queues every execution shares.
//! Source text compiles into a [`Compiled`] handle that can be bound to
//! seed scopes any number of times; each binding is an [`Execution`].
//!
//! # Example
//!
//! ```rust
//! use sandbox_core::{Obj, Sandbox, Value};
//!
//! let sandbox = Sandbox::new();
//! let compiled = sandbox.compile("return a + 1", false)?;
//! let seed = Obj::with_props([("a", Value::from(41))]);
//! assert_eq!(compiled.bind([seed]).run()?, Value::from(42));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use sha2::{Digest, Sha256};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::executor::context::{ExecContext, Mode, Realm};
use crate::executor::errors::{Exec, ExecError, SandboxError};
use crate::executor::exec_loop::{self, ResultSlot};
use crate::executor::quota::{ExecutionControl, QuotaCallback};
use crate::executor::scope::Scope;
use crate::executor::security::{AuditReport, Replacement, SecurityPolicy};
use crate::executor::stdlib;
use crate::executor::subscriptions::{Change, Subscription};
use crate::executor::types::{Obj, TypeTag, Value};
use crate::parser::{self, ParseError, ParseOptions, Program};

/* ===================== Options ===================== */

/// Programmatic sandbox configuration
#[derive(Clone)]
pub struct SandboxOptions {
    /// Record accessed globals and members instead of enforcing the policy
    pub audit: bool,
    pub forbid_function_calls: bool,
    pub forbid_function_creation: bool,
    /// Halt on a policy violation and raise it once the host resumes
    pub halt_on_sandbox_error: bool,
    /// Type to reachable inherited members; an empty set allows all of them
    pub prototype_whitelist: HashMap<TypeTag, HashSet<String>>,
    pub prototype_replacements: HashMap<TypeTag, Replacement>,
    /// Global names to install; `None` installs the whole default set
    pub globals: Option<BTreeSet<String>>,
    pub execution_quota: Option<u64>,
    pub on_execution_quota_reached: Option<QuotaCallback>,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            audit: false,
            forbid_function_calls: false,
            forbid_function_creation: false,
            halt_on_sandbox_error: false,
            prototype_whitelist: SecurityPolicy::default_whitelist(),
            prototype_replacements: HashMap::new(),
            globals: None,
            execution_quota: None,
            on_execution_quota_reached: None,
        }
    }
}

impl std::fmt::Debug for SandboxOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxOptions")
            .field("audit", &self.audit)
            .field("forbid_function_calls", &self.forbid_function_calls)
            .field("forbid_function_creation", &self.forbid_function_creation)
            .field("halt_on_sandbox_error", &self.halt_on_sandbox_error)
            .field("prototype_whitelist", &self.prototype_whitelist)
            .field("globals", &self.globals)
            .field("execution_quota", &self.execution_quota)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Sandbox`]
#[derive(Default)]
pub struct SandboxBuilder {
    options: SandboxOptions,
}

impl SandboxBuilder {
    /// Create a new builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    pub fn audit(mut self, audit: bool) -> Self {
        self.options.audit = audit;
        self
    }

    pub fn forbid_function_calls(mut self, forbid: bool) -> Self {
        self.options.forbid_function_calls = forbid;
        self
    }

    pub fn forbid_function_creation(mut self, forbid: bool) -> Self {
        self.options.forbid_function_creation = forbid;
        self
    }

    pub fn halt_on_sandbox_error(mut self, halt: bool) -> Self {
        self.options.halt_on_sandbox_error = halt;
        self
    }

    /// Replace the whole whitelist
    pub fn prototype_whitelist(mut self, whitelist: HashMap<TypeTag, HashSet<String>>) -> Self {
        self.options.prototype_whitelist = whitelist;
        self
    }

    /// Restrict one type to the given members
    pub fn allow_members<I, S>(mut self, tag: TypeTag, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .prototype_whitelist
            .insert(tag, members.into_iter().map(Into::into).collect());
        self
    }

    /// Remove a type from the whitelist entirely
    pub fn deny_type(mut self, tag: TypeTag) -> Self {
        self.options.prototype_whitelist.remove(&tag);
        self
    }

    pub fn prototype_replacement(
        mut self,
        tag: TypeTag,
        replacement: impl Fn(&Value, &str) -> Option<Value> + 'static,
    ) -> Self {
        self.options
            .prototype_replacements
            .insert(tag, Rc::new(replacement));
        self
    }

    /// Install only these default globals
    pub fn globals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.globals = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn execution_quota(mut self, quota: u64) -> Self {
        self.options.execution_quota = Some(quota);
        self
    }

    /// Decide at the quota: `true` keeps going, `false` halts
    pub fn on_execution_quota_reached(mut self, callback: impl Fn(u64) -> bool + 'static) -> Self {
        self.options.on_execution_quota_reached = Some(Rc::new(callback));
        self
    }

    pub fn build(self) -> Sandbox {
        Sandbox::with_options(self.options)
    }
}

/* ===================== Sandbox ===================== */

/// Outcome of [`Sandbox::audit`]
#[derive(Debug)]
pub struct AuditOutcome {
    pub result: Exec<Value>,
    pub report: AuditReport,
}

pub struct Sandbox {
    options: SandboxOptions,
    realm: Rc<Realm>,
    cache: RefCell<HashMap<String, Arc<Program>>>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_options(SandboxOptions::default())
    }

    pub fn builder() -> SandboxBuilder {
        SandboxBuilder::new()
    }

    pub fn with_options(options: SandboxOptions) -> Self {
        let policy = SecurityPolicy {
            audit: options.audit,
            forbid_function_calls: options.forbid_function_calls,
            forbid_function_creation: options.forbid_function_creation,
            halt_on_sandbox_error: options.halt_on_sandbox_error,
            whitelist: options.prototype_whitelist.clone(),
            replacements: options.prototype_replacements.clone(),
        };
        let control = ExecutionControl::new(
            options.execution_quota,
            options.on_execution_quota_reached.clone(),
        );
        let realm = Realm::new(policy, options.globals.as_ref(), control);
        Sandbox {
            options,
            realm,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.options
    }

    /// The sandbox-wide global object
    pub fn global(&self) -> Obj {
        self.realm.global.clone()
    }

    /// Names of every global the default set can install
    pub fn default_globals() -> Vec<&'static str> {
        stdlib::default_global_names()
    }

    /* ---------- compilation ---------- */

    pub fn compile(&self, source: &str, optimize: bool) -> Result<Compiled, ParseError> {
        self.compile_with(source, optimize, false, Mode::Sync)
    }

    /// Compile a program whose top level may `await`
    pub fn compile_async(&self, source: &str, optimize: bool) -> Result<Compiled, ParseError> {
        self.compile_with(source, optimize, false, Mode::Async)
    }

    /// Compile only the first statement; its value is the result
    pub fn compile_expression(&self, source: &str, optimize: bool) -> Result<Compiled, ParseError> {
        self.compile_with(source, optimize, true, Mode::Sync)
    }

    pub fn compile_expression_async(
        &self,
        source: &str,
        optimize: bool,
    ) -> Result<Compiled, ParseError> {
        self.compile_with(source, optimize, true, Mode::Async)
    }

    fn compile_with(
        &self,
        source: &str,
        optimize: bool,
        expression: bool,
        mode: Mode,
    ) -> Result<Compiled, ParseError> {
        let key = cache_key(source, optimize, expression);
        let cached = self.cache.borrow().get(&key).cloned();
        let program = match cached {
            Some(program) => {
                debug!(key = %&key[..12], "compile cache hit");
                program
            }
            None => {
                let options = ParseOptions {
                    expression,
                    optimize,
                    ..ParseOptions::default()
                };
                let program = Arc::new(parser::parse_with(source, options)?);
                debug!(key = %&key[..12], statements = program.body.len(), "compiled");
                self.cache.borrow_mut().insert(key, program.clone());
                program
            }
        };
        Ok(Compiled {
            realm: self.realm.clone(),
            program,
            mode,
        })
    }

    /// Run `source` once in audit mode, collecting what it touched
    pub fn audit(&self, source: &str, seeds: impl IntoIterator<Item = Obj>) -> Result<AuditOutcome, ParseError> {
        let auditing = Sandbox::with_options(SandboxOptions {
            audit: true,
            ..self.options.clone()
        });
        let execution = auditing.compile(source, false)?.bind(seeds);
        let result = execution.run();
        let report = execution.audit_report().unwrap_or_default();
        Ok(AuditOutcome { result, report })
    }

    /// Drive timers and queued jobs until none remain
    pub async fn run_event_loop(&self) -> Exec<()> {
        exec_loop::drive_event_loop(&self.realm).await
    }

    /// Pending timers
    pub fn timer_count(&self) -> usize {
        self.realm.timers.len()
    }

    /* ---------- host control ---------- */

    /// Ticks counted since the sandbox was created
    pub fn ticks(&self) -> u64 {
        self.realm.control.ticks()
    }

    pub fn set_execution_quota(&self, quota: Option<u64>) {
        self.realm.control.set_quota(quota);
    }

    pub fn reset_ticks(&self) {
        self.realm.control.reset_ticks();
    }

    /// Suspend every execution and timer of this sandbox
    pub fn halt_execution(&self) {
        self.realm.control.halt();
    }

    pub fn resume_execution(&self) -> Result<(), SandboxError> {
        self.realm.control.resume()
    }

    pub fn is_halted(&self) -> bool {
        self.realm.control.is_halted()
    }

    pub fn subscribe_halt(&self, listener: impl Fn() + 'static) -> Subscription {
        self.realm.control.subscribe_halt(listener)
    }

    pub fn subscribe_resume(&self, listener: impl Fn() + 'static) -> Subscription {
        self.realm.control.subscribe_resume(listener)
    }

    /// Observe sandboxed writes to one global
    pub fn subscribe_set_global(
        &self,
        name: &str,
        callback: impl Fn(&Change) + 'static,
    ) -> Subscription {
        self.realm
            .registry
            .subscribe_changes(&self.realm.global, Some(name), move |_, change| callback(change))
    }

    /// Add or replace a global from the host side
    pub fn set_global(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let old = self.realm.global.borrow_mut().props.insert(name, value.clone());
        let change = match old {
            Some(old) => Change::Replace {
                key: name.to_string(),
                old,
                value,
            },
            None => Change::Create {
                key: name.to_string(),
                value,
            },
        };
        self.realm.registry.notify_change(&self.realm.global, &change);
    }
}

/// SHA-256 over the source and the flags that shape its parse
fn cache_key(source: &str, optimize: bool, expression: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update([u8::from(optimize), u8::from(expression)]);
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/* ===================== Compiled ===================== */

/// Parsed program ready to run against seed scopes
#[derive(Clone)]
pub struct Compiled {
    realm: Rc<Realm>,
    program: Arc<Program>,
    mode: Mode,
}

impl std::fmt::Debug for Compiled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiled")
            .field("mode", &self.mode)
            .field("statements", &self.program.body.len())
            .finish_non_exhaustive()
    }
}

impl Compiled {
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Bind to seed objects, outermost first; their properties become variables
    pub fn bind(&self, seeds: impl IntoIterator<Item = Obj>) -> Execution {
        let mut scope = self.realm.global_scope.clone();
        for seed in seeds {
            scope = Scope::seeded(&scope, seed);
        }
        Execution {
            ctx: RefCell::new(ExecContext::new(
                self.realm.clone(),
                self.program.clone(),
                self.mode,
            )),
            seeds: scope,
            runs: Cell::new(0),
            slot: RefCell::new(None),
            deferred: RefCell::new(None),
        }
    }
}

/* ===================== Execution ===================== */

/// A compiled program bound to its seeds
///
/// Every [`Execution::run`] evaluates the program again in a fresh context
/// over the same seeds. Only a halted run is kept, for
/// [`Execution::resume`] to continue.
pub struct Execution {
    ctx: RefCell<Rc<ExecContext>>,
    seeds: Rc<Scope>,
    runs: Cell<u32>,
    /// Result slot of the run in progress
    slot: RefCell<Option<ResultSlot>>,
    /// Policy violation held back until the host resumes
    deferred: RefCell<Option<ExecError>>,
}

impl Execution {
    /// Id of the latest run
    pub fn id(&self) -> uuid::Uuid {
        self.ctx.borrow().id
    }

    fn ctx(&self) -> Rc<ExecContext> {
        self.ctx.borrow().clone()
    }

    /// Slot of the run in progress, starting a new run when there is none
    fn slot(&self) -> ResultSlot {
        if let Some(slot) = self.slot.borrow().as_ref() {
            return slot.clone();
        }
        if self.runs.get() > 0 {
            let fresh = self.ctx.borrow().rerun();
            *self.ctx.borrow_mut() = fresh;
        }
        self.runs.set(self.runs.get() + 1);
        let ctx = self.ctx();
        let scope = Scope::function(&self.seeds, Some(Value::Undefined), ctx.mode == Mode::Async);
        let slot = exec_loop::start(&ctx, scope);
        *self.slot.borrow_mut() = Some(slot.clone());
        slot
    }

    /// Run to completion without waiting; a halt ends the call with
    /// [`ExecError::Halted`] and [`Execution::resume`] picks it up again
    pub fn run(&self) -> Exec<Value> {
        let slot = self.slot();
        let result = exec_loop::drive_sync(&self.ctx().realm, &slot);
        self.finish(result)
    }

    /// Run on the host's tokio runtime, sleeping on timers and parking
    /// while halted
    pub async fn run_async(&self) -> Exec<Value> {
        let slot = self.slot();
        let realm = self.ctx().realm.clone();
        let result = exec_loop::drive_async(&realm, &slot).await;
        self.finish(result)
    }

    /// Resume the sandbox and continue a halted synchronous run
    pub fn resume(&self) -> Exec<Value> {
        let ctx = self.ctx();
        ctx.realm.control.resume()?;
        if let Some(error) = self.deferred.borrow_mut().take() {
            return Err(error);
        }
        self.run()
    }

    fn finish(&self, result: Exec<Value>) -> Exec<Value> {
        if matches!(result, Err(ExecError::Halted)) {
            return result;
        }
        self.slot.borrow_mut().take();
        let error = match result {
            Err(error) if error.is_sandbox_error() => error,
            other => return other,
        };
        let ctx = self.ctx();
        warn!(id = %ctx.id, error = %error, "sandbox error");
        if !ctx.policy().halt_on_sandbox_error {
            return Err(error);
        }
        ctx.realm.control.halt();
        *self.deferred.borrow_mut() = Some(error);
        Err(ExecError::Halted)
    }

    /// Observe property reads, on one object or (`None`) on all of them
    pub fn subscribe_get(
        &self,
        target: Option<&Obj>,
        callback: impl Fn(&Obj, &str) + 'static,
    ) -> Subscription {
        self.ctx.borrow().registry.subscribe_get(target, callback)
    }

    /// Observe changes of one property (`Some`) or of the whole object,
    /// array mutations included
    pub fn subscribe_set(
        &self,
        target: &Obj,
        property: Option<&str>,
        callback: impl Fn(&Obj, &Change) + 'static,
    ) -> Subscription {
        self.ctx.borrow().registry.subscribe_changes(target, property, callback)
    }

    /// Accesses recorded so far; `None` unless the sandbox audits
    pub fn audit_report(&self) -> Option<AuditReport> {
        self.ctx.borrow().audit_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_depends_on_flags() {
        let plain = cache_key("1 + 1", false, false);
        assert_eq!(plain.len(), 64);
        assert_eq!(plain, cache_key("1 + 1", false, false));
        assert_ne!(plain, cache_key("1 + 1", true, false));
        assert_ne!(plain, cache_key("1 + 1", false, true));
    }

    #[test]
    fn test_compile_reuses_cached_program() {
        let sandbox = Sandbox::new();
        let a = sandbox.compile("return 1", false).unwrap();
        let b = sandbox.compile("return 1", false).unwrap();
        assert!(Arc::ptr_eq(&a.program, &b.program));
        let c = sandbox.compile_async("return 1", false).unwrap();
        assert!(Arc::ptr_eq(&a.program, &c.program));
        assert_eq!(c.mode(), Mode::Async);
    }

    #[test]
    fn test_builder_restricts_globals() {
        let sandbox = Sandbox::builder().globals(["Math"]).build();
        assert!(sandbox.global().get_raw("Math").is_some());
        assert!(sandbox.global().get_raw("Array").is_none());
    }
}
