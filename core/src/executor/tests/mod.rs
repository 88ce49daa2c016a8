//! Tests for the executor
//!
//! Organized by feature area. Every test goes through the public
//! [`crate::Sandbox`] surface so the parser, scope model and security gate
//! are exercised together.

mod async_tests;
mod builtin_tests;
mod control_flow_tests;
mod helpers;
mod quota_tests;
mod scope_tests;
mod security_tests;
mod subscription_tests;
