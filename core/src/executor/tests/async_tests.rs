//! Tests for async programs, promises, timers and the event loop

use super::helpers::{numbers, run, run_async, seed};
use crate::executor::errors::ExecError;
use crate::executor::types::{Obj, Value};
use crate::sandbox::Sandbox;
use maplit::hashmap;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_top_level_await_of_plain_value() {
    let result = assert_ok!(run_async("const v = await 41; return v + 1").await);
    assert_eq!(result, Value::from(42));
}

#[test]
fn test_await_outside_async_is_rejected() {
    let err = assert_err!(run("await 1"));
    assert!(matches!(err, ExecError::IllegalAwait));
}

#[tokio::test]
async fn test_reactions_run_after_synchronous_code() {
    let source = r#"
        const log = [];
        Promise.resolve().then(() => log.push('micro'));
        log.push('sync');
        await null;
        return log.join(',')
    "#;
    assert_eq!(assert_ok!(run_async(source).await), Value::string("sync,micro"));
}

#[tokio::test]
async fn test_async_functions_interleave_at_await() {
    let source = r#"
        const log = [];
        async function a() { log.push('a1'); await null; log.push('a2'); return 'A' }
        async function b() { log.push('b1'); await null; log.push('b2'); return 'B' }
        const pa = a();
        const pb = b();
        log.push('main');
        const results = (await pa) + (await pb);
        return log.join(',') + '=' + results
    "#;
    assert_eq!(
        assert_ok!(run_async(source).await),
        Value::string("a1,b1,main,a2,b2=AB")
    );
}

#[tokio::test]
async fn test_rejected_await_is_catchable() {
    let source = r#"
        async function fail() { throw new Error('nope') }
        try {
            await fail();
        } catch (e) {
            return 'caught ' + e.message
        }
    "#;
    assert_eq!(assert_ok!(run_async(source).await), Value::string("caught nope"));
}

#[tokio::test]
async fn test_promise_combinators() {
    let source = r#"
        const all = await Promise.all([1, Promise.resolve(2), new Promise(r => r(3))]);
        const settled = await Promise.allSettled([Promise.reject('x'), 4]);
        const raced = await Promise.race([new Promise(() => {}), Promise.resolve('fast')]);
        const any = await Promise.any([Promise.reject(1), Promise.resolve('ok')]);
        let none;
        try { await Promise.any([Promise.reject(1)]) } catch (e) { none = e.errors.length }
        return [
            all.join(''),
            settled.map(s => s.status).join('/'),
            raced,
            any,
            none
        ].join(' ')
    "#;
    assert_eq!(
        assert_ok!(run_async(source).await),
        Value::string("123 rejected/fulfilled fast ok 1")
    );
}

#[tokio::test]
async fn test_then_chain_and_finally() {
    let source = r#"
        const log = [];
        const v = await Promise.resolve(1)
            .then(x => x + 1)
            .then(x => { throw x * 10 })
            .catch(e => e + 1)
            .finally(() => log.push('fin'));
        return v + ':' + log.join()
    "#;
    assert_eq!(assert_ok!(run_async(source).await), Value::string("21:fin"));
}

#[tokio::test]
async fn test_awaiting_forever_pending_promise_stalls() {
    let err = assert_err!(run_async("await new Promise(() => {})").await);
    assert!(matches!(err, ExecError::Stalled));
}

#[tokio::test(start_paused = true)]
async fn test_await_separated_writes_visible_in_order() {
    let sandbox = Sandbox::new();
    let state = Obj::with_props([("step", Value::from(0))]);
    let source = r#"
        state.step = 1;
        await new Promise(r => setTimeout(r, 50));
        state.step = 2;
        await new Promise(r => setTimeout(r, 50));
        state.step = 3;
        return state.step
    "#;
    let execution = assert_ok!(sandbox.compile_async(source, false))
        .bind([seed(hashmap! { "state" => state.clone().into() })]);

    let observed = state.clone();
    let host = async move {
        let mut seen = Vec::new();
        tokio::time::sleep(Duration::from_millis(25)).await;
        for _ in 0..3 {
            seen.push(observed.get_raw("step"));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        seen
    };
    let (result, seen) = tokio::join!(execution.run_async(), host);

    assert_eq!(assert_ok!(result), Value::from(3));
    assert_eq!(
        seen,
        vec![Some(Value::from(1)), Some(Value::from(2)), Some(Value::from(3))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_event_loop_runs_timers_after_sync_program() {
    let sandbox = Sandbox::new();
    let hits = Obj::array(Vec::new());
    let source = r#"
        let n = 0;
        const id = setInterval(() => {
            n++;
            hits.push(n);
            if (n === 3) clearInterval(id);
        }, 10);
        const cancelled = setTimeout(() => hits.push(99), 5);
        clearTimeout(cancelled);
        setTimeout((a, b) => hits.push(a + b), 100, 40, 2);
        return id
    "#;
    let id = assert_ok!(assert_ok!(sandbox.compile(source, false))
        .bind([seed(hashmap! { "hits" => hits.clone().into() })])
        .run());
    assert!(id.as_number().is_some_and(|n| n >= 1.0));
    assert_eq!(sandbox.timer_count(), 2);

    assert_ok!(sandbox.run_event_loop().await);
    assert_eq!(numbers(&hits.into()), vec![1.0, 2.0, 3.0, 42.0]);
    assert_eq!(sandbox.timer_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_string_timer_runs_in_global_scope() {
    let sandbox = Sandbox::new();
    let hits = Obj::array(Vec::new());
    sandbox.set_global("hits", hits.clone());
    let source = r#"
        let secret = 42;
        setTimeout("hits.push(typeof secret)", 10);
    "#;
    assert_ok!(assert_ok!(sandbox.compile(source, false)).bind([]).run());
    assert_ok!(sandbox.run_event_loop().await);
    assert_eq!(hits.array_items(), vec![Value::string("undefined")]);
}

#[tokio::test(start_paused = true)]
async fn test_halted_sandbox_defers_timers() {
    let sandbox = Sandbox::new();
    let hits = Obj::array(Vec::new());
    let source = "setTimeout(() => hits.push(1), 10)";
    assert_ok!(assert_ok!(sandbox.compile(source, false))
        .bind([seed(hashmap! { "hits" => hits.clone().into() })])
        .run());

    sandbox.halt_execution();
    let blocked = tokio::time::timeout(Duration::from_millis(100), sandbox.run_event_loop()).await;
    assert!(blocked.is_err());
    assert!(hits.array_items().is_empty());

    assert_ok!(sandbox.resume_execution());
    assert_ok!(sandbox.run_event_loop().await);
    assert_eq!(hits.array_items(), vec![Value::from(1)]);
}
