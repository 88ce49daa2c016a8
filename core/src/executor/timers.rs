//! Timer registry behind `setTimeout` / `setInterval`
//!
//! Deadlines use `tokio::time::Instant` so tests can drive them with a
//! paused clock. While the sandbox is halted the registry is paused and
//! every deadline shifts by the time spent halted.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use super::context::ExecContext;
use super::types::Value;

#[derive(Clone)]
pub enum TimerCallback {
    Function { func: Value, args: Vec<Value> },
    /// Source text, compiled into a fresh scope when the timer fires
    Source(Rc<str>),
}

#[derive(Clone)]
pub struct TimerEntry {
    pub id: u64,
    pub ctx: Rc<ExecContext>,
    pub callback: TimerCallback,
    pub interval: Option<Duration>,
}

#[derive(Default)]
pub struct Timers {
    queue: RefCell<BTreeMap<(Instant, u64), TimerEntry>>,
    deadlines: RefCell<HashMap<u64, Instant>>,
    next_id: Cell<u64>,
    paused_at: Cell<Option<Instant>>,
}

impl Timers {
    pub fn add(
        &self,
        ctx: Rc<ExecContext>,
        callback: TimerCallback,
        delay: Duration,
        repeat: bool,
    ) -> u64 {
        // ids start at 1 so they are truthy in sandboxed code
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let base = self.paused_at.get().unwrap_or_else(Instant::now);
        let deadline = base + delay;
        let entry = TimerEntry {
            id,
            ctx,
            callback,
            interval: repeat.then_some(delay),
        };
        trace!(timer = id, delay_ms = delay.as_millis() as u64, repeat, "timer registered");
        self.queue.borrow_mut().insert((deadline, id), entry);
        self.deadlines.borrow_mut().insert(id, deadline);
        id
    }

    pub fn clear(&self, id: u64) -> bool {
        match self.deadlines.borrow_mut().remove(&id) {
            Some(deadline) => self.queue.borrow_mut().remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        if self.paused_at.get().is_some() {
            return None;
        }
        self.queue.borrow().keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove due timers, re-arming intervals
    pub fn take_due(&self, now: Instant) -> Vec<TimerEntry> {
        if self.paused_at.get().is_some() {
            return Vec::new();
        }
        let mut queue = self.queue.borrow_mut();
        let mut deadlines = self.deadlines.borrow_mut();
        let mut due = Vec::new();
        while let Some(entry) = queue.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((deadline, id), timer) = entry.remove_entry();
            match timer.interval {
                Some(interval) => {
                    let next = deadline + interval.max(Duration::from_millis(1));
                    queue.insert((next, id), timer.clone());
                    deadlines.insert(id, next);
                }
                None => {
                    deadlines.remove(&id);
                }
            }
            due.push(timer);
        }
        due
    }

    pub fn pause(&self) {
        if self.paused_at.get().is_none() {
            self.paused_at.set(Some(Instant::now()));
        }
    }

    /// Resume, pushing every deadline back by the paused duration
    pub fn resume(&self) {
        let Some(paused_at) = self.paused_at.take() else {
            return;
        };
        let shift = Instant::now().saturating_duration_since(paused_at);
        if shift.is_zero() {
            return;
        }
        let mut queue = self.queue.borrow_mut();
        let shifted: BTreeMap<(Instant, u64), TimerEntry> = std::mem::take(&mut *queue)
            .into_iter()
            .map(|((deadline, id), entry)| ((deadline + shift, id), entry))
            .collect();
        let mut deadlines = self.deadlines.borrow_mut();
        for (deadline, id) in shifted.keys() {
            deadlines.insert(*id, *deadline);
        }
        *queue = shifted;
    }

    pub fn clear_all(&self) {
        self.queue.borrow_mut().clear();
        self.deadlines.borrow_mut().clear();
    }
}
