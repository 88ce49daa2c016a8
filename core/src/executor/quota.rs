//! Tick counting and cooperative halt/resume
//!
//! Every evaluated node passes through [`ExecutionControl::checkpoint`],
//! which counts a tick and parks the evaluation while the sandbox is halted.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};
use tracing::debug;

use super::errors::{Exec, SandboxError};
use super::subscriptions::Subscription;

/// Called with the tick count once the quota is reached; `true` keeps going,
/// `false` halts the sandbox
pub type QuotaCallback = Rc<dyn Fn(u64) -> bool>;

pub type ControlListener = Rc<dyn Fn()>;

#[derive(Default)]
pub struct ExecutionControl {
    ticks: Cell<u64>,
    quota: Cell<Option<u64>>,
    on_quota: RefCell<Option<QuotaCallback>>,
    halted: Cell<bool>,
    waiters: RefCell<Vec<Waker>>,
    halt_listeners: RefCell<Vec<(u64, ControlListener)>>,
    resume_listeners: RefCell<Vec<(u64, ControlListener)>>,
    next_id: Cell<u64>,
}

impl ExecutionControl {
    pub fn new(quota: Option<u64>, on_quota: Option<QuotaCallback>) -> Rc<Self> {
        let control = ExecutionControl::default();
        control.quota.set(quota);
        *control.on_quota.borrow_mut() = on_quota;
        Rc::new(control)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    pub fn reset_ticks(&self) {
        self.ticks.set(0);
    }

    pub fn quota(&self) -> Option<u64> {
        self.quota.get()
    }

    pub fn set_quota(&self, quota: Option<u64>) {
        self.quota.set(quota);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.get()
    }

    fn over_quota(&self) -> bool {
        self.quota.get().is_some_and(|q| self.ticks.get() >= q)
    }

    /// Count one unit of work
    pub fn tick(&self) -> Exec<()> {
        let ticks = self.ticks.get() + 1;
        self.ticks.set(ticks);
        if !self.over_quota() {
            return Ok(());
        }
        let callback = self.on_quota.borrow().clone();
        match callback {
            Some(callback) => {
                if !callback(ticks) {
                    self.halt();
                }
                Ok(())
            }
            None => Err(SandboxError::QuotaExceeded.into()),
        }
    }

    /// Tick, then wait out any halt
    pub async fn checkpoint(&self) -> Exec<()> {
        self.tick()?;
        if self.halted.get() {
            HaltGate { control: self }.await;
        }
        Ok(())
    }

    /// Suspend all evaluation, pending continuations and timers. Idempotent.
    pub fn halt(&self) {
        if self.halted.replace(true) {
            return;
        }
        debug!(ticks = self.ticks.get(), "sandbox halted");
        notify(&self.halt_listeners);
    }

    pub fn resume(&self) -> Result<(), SandboxError> {
        if !self.halted.get() {
            return Ok(());
        }
        if self.over_quota() {
            return Err(SandboxError::ResumeOverQuota);
        }
        self.halted.set(false);
        debug!(ticks = self.ticks.get(), "sandbox resumed");
        for waker in std::mem::take(&mut *self.waiters.borrow_mut()) {
            waker.wake();
        }
        notify(&self.resume_listeners);
        Ok(())
    }

    pub fn subscribe_halt(self: &Rc<Self>, listener: impl Fn() + 'static) -> Subscription {
        self.add_listener(true, Rc::new(listener))
    }

    pub fn subscribe_resume(self: &Rc<Self>, listener: impl Fn() + 'static) -> Subscription {
        self.add_listener(false, Rc::new(listener))
    }

    fn add_listener(self: &Rc<Self>, halt: bool, listener: ControlListener) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners(halt).borrow_mut().push((id, listener));

        let weak: Weak<ExecutionControl> = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(control) = weak.upgrade() {
                control.listeners(halt).borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }

    fn listeners(&self, halt: bool) -> &RefCell<Vec<(u64, ControlListener)>> {
        if halt {
            &self.halt_listeners
        } else {
            &self.resume_listeners
        }
    }
}

fn notify(listeners: &RefCell<Vec<(u64, ControlListener)>>) {
    let snapshot: Vec<ControlListener> = listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
    for listener in snapshot {
        listener();
    }
}

/// Future that stays pending while the sandbox is halted
pub struct HaltGate<'a> {
    control: &'a ExecutionControl,
}

impl Future for HaltGate<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if !self.control.halted.get() {
            return Poll::Ready(());
        }
        let mut waiters = self.control.waiters.borrow_mut();
        if !waiters.iter().any(|w| w.will_wake(cx.waker())) {
            waiters.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_quota_without_callback_errors() {
        let control = ExecutionControl::new(Some(2), None);
        assert!(control.tick().is_ok());
        let err = control.tick().unwrap_err();
        assert!(err.is_sandbox_error());
    }

    #[test]
    fn test_quota_callback_decides() {
        let control = ExecutionControl::new(Some(1), Some(Rc::new(|ticks| ticks < 3)));
        control.tick().unwrap();
        control.tick().unwrap();
        assert!(!control.is_halted());
        control.tick().unwrap();
        assert!(control.is_halted());
        assert_eq!(control.resume(), Err(SandboxError::ResumeOverQuota));

        control.set_quota(Some(100));
        assert!(control.resume().is_ok());
        assert!(!control.is_halted());
    }

    #[test]
    fn test_halt_is_idempotent_and_notifies() {
        let control = ExecutionControl::new(None, None);
        let halts = Rc::new(Cell::new(0));
        let resumes = Rc::new(Cell::new(0));
        let h = halts.clone();
        let r = resumes.clone();
        let _halt_sub = control.subscribe_halt(move || h.set(h.get() + 1));
        let resume_sub = control.subscribe_resume(move || r.set(r.get() + 1));

        control.halt();
        control.halt();
        assert_eq!(halts.get(), 1);
        control.resume().unwrap();
        assert_eq!(resumes.get(), 1);

        resume_sub.unsubscribe();
        control.halt();
        control.resume().unwrap();
        assert_eq!(halts.get(), 2);
        assert_eq!(resumes.get(), 1);
    }
}
