//! Structured logging with query context.
//!
//! Provides logging macros and utilities that include the instance uid,
//! query id and panel refId in every log message for easy correlation.

pub mod structured;

pub use structured::*;
