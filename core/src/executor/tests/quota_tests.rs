//! Tests for tick quotas and host-driven halt/resume

use super::helpers::{numbers, seed};
use crate::executor::errors::{ExecError, SandboxError};
use crate::executor::types::{Obj, Value};
use crate::sandbox::Sandbox;
use maplit::hashmap;
use std::cell::Cell;
use std::rc::Rc;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_quota_without_callback_fails() {
    let sandbox = Sandbox::builder().execution_quota(50).build();
    let execution = assert_ok!(sandbox.compile("while (true) {}", false)).bind([]);
    let err = assert_err!(execution.run());
    assert!(matches!(err, ExecError::Sandbox(SandboxError::QuotaExceeded)));
    assert!(sandbox.ticks() >= 50);
}

#[test]
fn test_quota_callback_can_continue() {
    let calls = Rc::new(Cell::new(0u64));
    let seen = calls.clone();
    let sandbox = Sandbox::builder()
        .execution_quota(10)
        .on_execution_quota_reached(move |_| {
            seen.set(seen.get() + 1);
            true
        })
        .build();
    let source = "let n = 0; for (let i = 0; i < 100; i++) n++; return n";
    let result = assert_ok!(assert_ok!(sandbox.compile(source, false)).bind([]).run());
    assert_eq!(result, Value::from(100));
    assert!(calls.get() > 0);
    assert!(!sandbox.is_halted());
}

#[test]
fn test_halt_and_resume_completes_remaining_work_once() {
    let sandbox = Sandbox::builder()
        .execution_quota(20)
        .on_execution_quota_reached(|_| false)
        .build();
    let log = Obj::array(Vec::new());
    let source = "for (let i = 0; i < 50; i++) log.push(i); return log.length";
    let execution = assert_ok!(sandbox.compile(source, false))
        .bind([seed(hashmap! { "log" => log.clone().into() })]);

    assert!(matches!(execution.run(), Err(ExecError::Halted)));
    assert!(sandbox.is_halted());
    let frozen = log.array_items().len();
    assert!(frozen < 50);

    // Still over quota
    assert_eq!(sandbox.resume_execution(), Err(SandboxError::ResumeOverQuota));
    assert!(matches!(execution.run(), Err(ExecError::Halted)));
    assert_eq!(log.array_items().len(), frozen);

    sandbox.set_execution_quota(None);
    assert_eq!(assert_ok!(execution.resume()), Value::from(50));
    let expected: Vec<f64> = (0..50).map(f64::from).collect();
    assert_eq!(numbers(&log.into()), expected);
}

#[test]
fn test_halt_listeners_fire_once_per_transition() {
    let sandbox = Sandbox::new();
    let halts = Rc::new(Cell::new(0));
    let resumes = Rc::new(Cell::new(0));
    let (h, r) = (halts.clone(), resumes.clone());
    let on_halt = sandbox.subscribe_halt(move || h.set(h.get() + 1));
    let _on_resume = sandbox.subscribe_resume(move || r.set(r.get() + 1));

    sandbox.halt_execution();
    sandbox.halt_execution();
    assert_eq!(halts.get(), 1);
    assert_ok!(sandbox.resume_execution());
    assert_ok!(sandbox.resume_execution());
    assert_eq!(resumes.get(), 1);

    on_halt.unsubscribe();
    sandbox.halt_execution();
    assert_eq!(halts.get(), 1);
}

#[test]
fn test_reset_ticks_allows_another_run() {
    let sandbox = Sandbox::builder().execution_quota(10_000).build();
    let source = "let s = 0; for (let i = 0; i < 10; i++) s += i; return s";
    let compiled = assert_ok!(sandbox.compile(source, false));
    assert_eq!(assert_ok!(compiled.bind([]).run()), Value::from(45));
    let used = sandbox.ticks();
    assert!(used > 0);
    sandbox.reset_ticks();
    assert_eq!(sandbox.ticks(), 0);
    assert_eq!(assert_ok!(compiled.bind([]).run()), Value::from(45));
    assert_eq!(sandbox.ticks(), used);
}
