//! Tests for the parser pipeline
//!
//! Organized by feature area

mod error_tests;
mod expression_tests;
mod helpers;
mod statement_tests;
