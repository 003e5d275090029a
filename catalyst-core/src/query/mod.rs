//! Query module.
//!
//! - `model` - panel query model decoded from the host's query JSON
//! - `params` - validated, normalized wire parameters for list endpoints

pub mod model;
pub mod params;

pub use model::*;
pub use params::*;
