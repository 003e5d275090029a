//! Configuration module.
//!
//! - `settings` - per-instance settings parsed from the host's JSON + secure map
//! - `endpoints` - vendor endpoint URLs built with the base-URL prefix rule
//! - `options` - process-wide tunables loaded from the environment

pub mod endpoints;
pub mod options;
pub mod settings;

pub use endpoints::*;
pub use options::*;
pub use settings::*;
