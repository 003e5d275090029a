//! Output module.
//!
//! Column-oriented frames returned to the host:
//! - Issues table (one row per normalized issue)
//! - Site-health table (site name plus selected metrics)

pub mod frame;

pub use frame::*;
