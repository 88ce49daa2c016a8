//! Test helpers for executor tests
//!
//! Common utilities for compiling programs and building seed scopes

use crate::executor::errors::Exec;
use crate::executor::types::{Obj, Value};
use crate::sandbox::Sandbox;
use std::collections::HashMap;

/// Build a seed object whose properties become variables of the program
pub fn seed(props: HashMap<&str, Value>) -> Obj {
    Obj::with_props(props)
}

/// Compile and run `source` synchronously in a fresh default sandbox
pub fn run(source: &str) -> Exec<Value> {
    run_in(&Sandbox::new(), source, HashMap::new())
}

/// Compile and run `source` synchronously against one seed scope
///
/// # Arguments
/// * `sandbox` - Sandbox providing globals and policy
/// * `source` - Program source; its `return` value is the result
/// * `vars` - Seed variables visible to the program
pub fn run_in(sandbox: &Sandbox, source: &str, vars: HashMap<&str, Value>) -> Exec<Value> {
    let compiled = sandbox.compile(source, false).expect("Compile failed");
    compiled.bind([seed(vars)]).run()
}

/// Compile and run `source` as an async program in a fresh default sandbox
pub async fn run_async(source: &str) -> Exec<Value> {
    let sandbox = Sandbox::new();
    let compiled = sandbox.compile_async(source, false).expect("Compile failed");
    compiled.bind([]).run_async().await
}

/// Items of an array value as plain numbers
pub fn numbers(value: &Value) -> Vec<f64> {
    value
        .as_object()
        .expect("Expected an array")
        .array_items()
        .iter()
        .map(|v| v.as_number().expect("Expected a number"))
        .collect()
}
