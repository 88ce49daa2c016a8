//! Drivers polling the evaluator
//!
//! The main evaluation runs as a job on the realm's queue, next to async
//! function bodies and promise reactions. The drivers differ only in what
//! they do once no job is ready:
//! - [`drive_sync`] never waits: a halt surfaces as [`ExecError::Halted`]
//!   (the job stays queued for [`drive_sync`] to pick up after resume),
//!   anything else as [`ExecError::Stalled`]
//! - [`drive_async`] sleeps on the next timer deadline and parks while the
//!   sandbox is halted

use std::cell::RefCell;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tokio::time::{Instant, Sleep};
use tracing::{debug, info_span, trace, warn, Instrument};

use super::call::call;
use super::context::{ExecContext, Realm};
use super::errors::{Exec, ExecError};
use super::scope::Scope;
use super::statements::run_program;
use super::stdlib::function::run_source;
use super::timers::{TimerCallback, TimerEntry};
use super::types::Value;

pub type ResultSlot = Rc<RefCell<Option<Exec<Value>>>>;

/* ===================== Public API ===================== */

/// Queue the program of `ctx` as the main job of a run
pub fn start(ctx: &Rc<ExecContext>, scope: Rc<Scope>) -> ResultSlot {
    let slot: ResultSlot = Rc::new(RefCell::new(None));
    let out = slot.clone();
    let job_ctx = ctx.clone();
    let span = info_span!("sandbox.run", id = %ctx.id, mode = ctx.mode.as_str());
    ctx.realm.jobs.spawn(
        async move {
            let result = run_program(&job_ctx, &scope).await;
            debug!(
                ticks = job_ctx.realm.control.ticks(),
                ok = result.is_ok(),
                "execution finished"
            );
            *out.borrow_mut() = Some(result);
        }
        .instrument(span),
    );
    slot
}

/// Run ready jobs to completion without ever waiting
pub fn drive_sync(realm: &Realm, slot: &ResultSlot) -> Exec<Value> {
    loop {
        realm.jobs.run_ready(None);
        if let Some(error) = realm.take_fatal() {
            return Err(error);
        }
        if let Some(result) = slot.borrow_mut().take() {
            return result;
        }
        if realm.control.is_halted() {
            return Err(ExecError::Halted);
        }
        if !realm.jobs.has_ready() {
            return Err(ExecError::Stalled);
        }
    }
}

/// Drive the main job, timers and reactions until the main job finishes
pub async fn drive_async(realm: &Realm, slot: &ResultSlot) -> Exec<Value> {
    let mut sleep = None;
    poll_fn(|cx| loop {
        realm.jobs.run_ready(Some(cx.waker()));
        if let Some(error) = realm.take_fatal() {
            return Poll::Ready(Err(error));
        }
        if let Some(result) = slot.borrow_mut().take() {
            return Poll::Ready(result);
        }
        match advance(realm, &mut sleep, cx) {
            Advance::Again => continue,
            Advance::Pending => return Poll::Pending,
            Advance::Idle => return Poll::Ready(Err(ExecError::Stalled)),
        }
    })
    .await
}

/// Drive timers and queued jobs until nothing can make progress
pub async fn drive_event_loop(realm: &Realm) -> Exec<()> {
    let mut sleep = None;
    poll_fn(|cx| loop {
        realm.jobs.run_ready(Some(cx.waker()));
        if let Some(error) = realm.take_fatal() {
            return Poll::Ready(Err(error));
        }
        match advance(realm, &mut sleep, cx) {
            Advance::Again => continue,
            Advance::Pending => return Poll::Pending,
            Advance::Idle => return Poll::Ready(Ok(())),
        }
    })
    .await
}

/* ===================== Scheduling ===================== */

enum Advance {
    Again,
    Pending,
    Idle,
}

fn advance(realm: &Realm, sleep: &mut Option<Pin<Box<Sleep>>>, cx: &mut Context<'_>) -> Advance {
    if realm.control.is_halted() {
        return Advance::Pending;
    }
    if fire_due_timers(realm) || realm.jobs.has_ready() {
        return Advance::Again;
    }
    let Some(deadline) = realm.timers.next_deadline() else {
        return Advance::Idle;
    };
    let timer = sleep.get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
    if timer.deadline() != deadline {
        timer.as_mut().reset(deadline);
    }
    if timer.as_mut().poll(cx).is_ready() {
        Advance::Again
    } else {
        Advance::Pending
    }
}

fn fire_due_timers(realm: &Realm) -> bool {
    let due = realm.timers.take_due(Instant::now());
    let fired = !due.is_empty();
    for timer in due {
        trace!(timer = timer.id, "timer fired");
        realm.jobs.spawn(run_timer(timer));
    }
    fired
}

async fn run_timer(timer: TimerEntry) {
    let ctx = timer.ctx;
    let result = match timer.callback {
        TimerCallback::Function { func, args } => {
            call(ctx.clone(), func, Value::Undefined, args).await
        }
        TimerCallback::Source(source) => run_source(&ctx, &source).await,
    };
    match result {
        Ok(_) => {}
        Err(error) if error.is_catchable() => {
            warn!(timer = timer.id, error = %error, "uncaught error in timer callback")
        }
        Err(error) => ctx.realm.set_fatal(error),
    }
}
