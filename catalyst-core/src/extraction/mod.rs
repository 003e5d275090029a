//! Record extraction module.
//!
//! Maps heterogeneous vendor JSON records into fixed row shapes using
//! ordered candidate-key lists per attribute.

pub mod json_path;
pub mod normalize;
pub mod site_health;

pub use json_path::*;
pub use normalize::*;
pub use site_health::*;
