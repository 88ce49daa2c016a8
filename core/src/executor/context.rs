//! Per-sandbox realm and per-run execution context

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

use super::errors::{Exec, ExecError};
use super::jobs::JobQueue;
use super::quota::ExecutionControl;
use super::scope::Scope;
use super::security::{AuditReport, SecurityPolicy};
use super::stdlib;
use super::subscriptions::{Change, Registry};
use super::timers::Timers;
use super::types::{Obj, TypeTag};
use crate::parser::{Constants, Program};
use crate::stack::{EVAL_STACK_BUDGET, MAX_CALL_DEPTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sync,
    Async,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Sync => "sync",
            Mode::Async => "async",
        }
    }
}

/* ===================== Realm ===================== */

/// State shared by every execution of one sandbox
pub struct Realm {
    pub policy: SecurityPolicy,
    pub global: Obj,
    pub global_scope: Rc<Scope>,
    pub control: Rc<ExecutionControl>,
    /// Sandbox-wide subscriptions (`subscribe_set_global`)
    pub registry: Rc<Registry>,
    pub jobs: JobQueue,
    pub timers: Timers,
    members: RefCell<HashMap<(TypeTag, &'static str), Obj>>,
    rng: Cell<u64>,
    fatal: RefCell<Option<ExecError>>,
    call_depth: Cell<usize>,
}

impl Realm {
    pub fn new(
        policy: SecurityPolicy,
        globals: Option<&BTreeSet<String>>,
        control: Rc<ExecutionControl>,
    ) -> Rc<Self> {
        let global = Obj::plain();
        stdlib::install_globals(&global, globals);
        global.borrow_mut().flags.builtin = true;

        let realm = Rc::new(Realm {
            policy,
            global_scope: Scope::root(global.clone()),
            global,
            control,
            registry: Registry::new(),
            jobs: JobQueue::default(),
            timers: Timers::default(),
            members: RefCell::new(HashMap::new()),
            rng: Cell::new(Uuid::new_v4().as_u128() as u64 | 1),
            fatal: RefCell::new(None),
            call_depth: Cell::new(0),
        });

        let weak = Rc::downgrade(&realm);
        realm.control.subscribe_halt(move || {
            if let Some(realm) = weak.upgrade() {
                realm.timers.pause();
            }
        });
        let weak = Rc::downgrade(&realm);
        realm.control.subscribe_resume(move || {
            if let Some(realm) = weak.upgrade() {
                realm.timers.resume();
                realm.jobs.wake_outer();
            }
        });
        realm
    }

    /// Native function object for an inherited member, one per member so
    /// `a.push === b.push` holds
    pub fn member_function(&self, tag: TypeTag, member: &'static stdlib::Member) -> Obj {
        self.members
            .borrow_mut()
            .entry((tag, member.name))
            .or_insert_with(|| stdlib::member_object(member))
            .clone()
    }

    /// xorshift64* in `[0, 1)`
    pub fn next_random(&self) -> f64 {
        let mut x = self.rng.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng.set(x);
        let bits = x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }

    /// Record an uncatchable error raised inside a job
    pub fn set_fatal(&self, error: ExecError) {
        let mut fatal = self.fatal.borrow_mut();
        if fatal.is_none() {
            *fatal = Some(error);
        }
    }

    pub fn take_fatal(&self) -> Option<ExecError> {
        self.fatal.borrow_mut().take()
    }

    /// Fail once the running drain has spent its stack budget
    pub fn check_stack(&self) -> Exec<()> {
        if self.jobs.stack_used() > EVAL_STACK_BUDGET {
            return Err(stack_exceeded());
        }
        Ok(())
    }

    /// Enter a function body; `counted` bodies add to the call depth until
    /// the guard drops
    pub fn enter_call(&self, counted: bool) -> Exec<CallGuard<'_>> {
        self.check_stack()?;
        if !counted {
            return Ok(CallGuard { depth: None });
        }
        let depth = self.call_depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(stack_exceeded());
        }
        self.call_depth.set(depth + 1);
        Ok(CallGuard {
            depth: Some(&self.call_depth),
        })
    }
}

fn stack_exceeded() -> ExecError {
    ExecError::range_error("Maximum call stack size exceeded")
}

/// Active function body, see [`Realm::enter_call`]
pub struct CallGuard<'a> {
    depth: Option<&'a Cell<usize>>,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if let Some(depth) = self.depth {
            depth.set(depth.get().saturating_sub(1));
        }
    }
}

/* ===================== Execution Context ===================== */

/// One run of a compiled program
pub struct ExecContext {
    pub realm: Rc<Realm>,
    pub program: Arc<Program>,
    /// Subscriptions made on this execution only
    pub registry: Rc<Registry>,
    pub audit: Option<Rc<RefCell<AuditReport>>>,
    pub id: Uuid,
    pub mode: Mode,
}

impl ExecContext {
    pub fn new(realm: Rc<Realm>, program: Arc<Program>, mode: Mode) -> Rc<Self> {
        let audit = realm
            .policy
            .audit
            .then(|| Rc::new(RefCell::new(AuditReport::default())));
        Rc::new(ExecContext {
            realm,
            program,
            registry: Registry::new(),
            audit,
            id: Uuid::new_v4(),
            mode,
        })
    }

    /// Context for another run of the same program; subscriptions and the
    /// audit report carry over
    pub fn rerun(&self) -> Rc<Self> {
        Rc::new(ExecContext {
            realm: self.realm.clone(),
            program: self.program.clone(),
            registry: self.registry.clone(),
            audit: self.audit.clone(),
            id: Uuid::new_v4(),
            mode: self.mode,
        })
    }

    /// Context for code compiled at run time (`Function`, `eval`, string timers)
    pub fn derive(&self, program: Arc<Program>) -> Rc<Self> {
        Rc::new(ExecContext {
            realm: self.realm.clone(),
            program,
            registry: self.registry.clone(),
            audit: self.audit.clone(),
            id: self.id,
            mode: self.mode,
        })
    }

    pub fn constants(&self) -> &Constants {
        &self.program.constants
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.realm.policy
    }

    pub async fn checkpoint(&self) -> Exec<()> {
        self.realm.check_stack()?;
        self.realm.control.checkpoint().await
    }

    pub fn notify_get(&self, obj: &Obj, key: &str) {
        self.registry.notify_get(obj, key);
        self.realm.registry.notify_get(obj, key);
    }

    pub fn notify_change(&self, obj: &Obj, change: &Change) {
        self.registry.notify_change(obj, change);
        self.realm.registry.notify_change(obj, change);
    }

    pub fn record_global(&self, name: &str) {
        if let Some(audit) = &self.audit {
            audit.borrow_mut().record_global(name);
        }
    }

    /// Gate an inherited member read, recording it when auditing
    pub fn check_member(&self, tag: TypeTag, member: &str) -> Exec<()> {
        if let Some(audit) = &self.audit {
            audit.borrow_mut().record_member(tag, member);
        }
        self.realm.policy.check_member(tag, member)
    }

    pub fn audit_report(&self) -> Option<AuditReport> {
        self.audit.as_ref().map(|a| a.borrow().clone())
    }
}
