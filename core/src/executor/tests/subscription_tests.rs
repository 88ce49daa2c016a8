//! Tests for read and change subscriptions

use super::helpers::seed;
use crate::executor::subscriptions::Change;
use crate::executor::types::{Obj, Value};
use crate::sandbox::Sandbox;
use maplit::hashmap;
use std::cell::RefCell;
use std::rc::Rc;
use tokio_test::assert_ok;

fn recorder() -> (Rc<RefCell<Vec<Change>>>, impl Fn(&Obj, &Change) + 'static) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    (log, move |_: &Obj, change: &Change| sink.borrow_mut().push(change.clone()))
}

#[test]
fn test_push_reports_one_change_with_elements() {
    let sandbox = Sandbox::new();
    let list = Obj::array(Vec::new());
    let execution = assert_ok!(sandbox.compile("list.push(1, 2); list.push(); return list.length", false))
        .bind([seed(hashmap! { "list" => list.clone().into() })]);
    let (log, callback) = recorder();
    let _sub = execution.subscribe_set(&list, None, callback);

    assert_eq!(assert_ok!(execution.run()), Value::from(2));
    assert_eq!(
        *log.borrow(),
        vec![Change::ArrayMutation {
            method: "push",
            index: 0,
            added: vec![Value::from(1), Value::from(2)],
            removed: vec![],
        }]
    );
}

#[test]
fn test_array_mutations_report_indices() {
    let sandbox = Sandbox::new();
    let list = Obj::array(vec![Value::from(1), Value::from(2), Value::from(3)]);
    let source = "list.splice(1, 1, 'x', 'y'); list.shift(); list.pop()";
    let execution = assert_ok!(sandbox.compile(source, false))
        .bind([seed(hashmap! { "list" => list.clone().into() })]);
    let (log, callback) = recorder();
    let _sub = execution.subscribe_set(&list, None, callback);
    assert_ok!(execution.run());

    let log = log.borrow();
    assert_eq!(log.len(), 3);
    assert_eq!(
        log[0],
        Change::ArrayMutation {
            method: "splice",
            index: 1,
            added: vec![Value::string("x"), Value::string("y")],
            removed: vec![Value::from(2)],
        }
    );
    assert!(matches!(&log[1], Change::ArrayMutation { method: "shift", index: 0, .. }));
    assert!(matches!(
        &log[2],
        Change::ArrayMutation { method: "pop", index: 2, removed, .. } if removed == &vec![Value::from(3)]
    ));
}

#[test]
fn test_property_subscription_filters_by_key() {
    let sandbox = Sandbox::new();
    let target = Obj::with_props([("a", Value::from(1))]);
    let execution = assert_ok!(sandbox.compile("obj.a = 2; obj.b = 3; delete obj.a", false))
        .bind([seed(hashmap! { "obj" => target.clone().into() })]);
    let (only_a, callback) = recorder();
    let _a = execution.subscribe_set(&target, Some("a"), callback);
    let (all, callback) = recorder();
    let _all = execution.subscribe_set(&target, None, callback);
    assert_ok!(execution.run());

    assert_eq!(
        *only_a.borrow(),
        vec![
            Change::Replace {
                key: "a".into(),
                old: Value::from(1),
                value: Value::from(2)
            },
            Change::Delete {
                key: "a".into(),
                old: Value::from(2)
            },
        ]
    );
    assert_eq!(all.borrow().len(), 3);
    assert!(matches!(&all.borrow()[1], Change::Create { key, .. } if key == "b"));
}

#[test]
fn test_unsubscribe_stops_notifications() {
    let sandbox = Sandbox::new();
    let target = Obj::plain();
    let execution = assert_ok!(sandbox.compile("obj.x = 1", false))
        .bind([seed(hashmap! { "obj" => target.clone().into() })]);
    let (log, callback) = recorder();
    let sub = execution.subscribe_set(&target, None, callback);
    sub.unsubscribe();
    assert_ok!(execution.run());
    assert!(log.borrow().is_empty());
}

#[test]
fn test_subscribe_get_observes_reads() {
    let sandbox = Sandbox::new();
    let target = Obj::with_props([("a", Value::from(1)), ("b", Value::from(2))]);
    let execution = assert_ok!(sandbox.compile("return obj.a + obj.b + obj.a", false))
        .bind([seed(hashmap! { "obj" => target.clone().into() })]);
    let reads = Rc::new(RefCell::new(Vec::new()));
    let sink = reads.clone();
    let _sub = execution.subscribe_get(Some(&target), move |_, key| {
        sink.borrow_mut().push(key.to_string())
    });

    assert_eq!(assert_ok!(execution.run()), Value::from(4));
    assert_eq!(*reads.borrow(), vec!["a", "b", "a"]);
}

#[test]
fn test_subscriptions_do_not_keep_targets_alive() {
    let sandbox = Sandbox::new();
    let execution = assert_ok!(sandbox.compile("return 1", false)).bind([]);
    let target = Obj::plain();
    let weak = target.downgrade();
    let (_log, callback) = recorder();
    let _sub = execution.subscribe_set(&target, None, callback);
    drop(target);
    assert!(!weak.is_alive());
}

#[test]
fn test_subscribe_set_global_sees_host_updates() {
    let sandbox = Sandbox::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let _sub = sandbox.subscribe_set_global("limit", move |change| {
        sink.borrow_mut().push(change.clone())
    });
    sandbox.set_global("limit", 5);
    sandbox.set_global("other", 1);
    sandbox.set_global("limit", 6);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(matches!(&seen[1], Change::Replace { old, .. } if *old == Value::from(5)));
    let result = assert_ok!(assert_ok!(sandbox.compile("return limit * 2", false)).bind([]).run());
    assert_eq!(result, Value::from(12));
}
