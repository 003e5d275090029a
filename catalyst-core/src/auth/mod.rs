//! Credential module.
//!
//! - `token` - per-instance token cache with lazy login and invalidation
//! - `expiry` - expiry hints parsed from login response headers and body

pub mod expiry;
pub mod token;

pub use expiry::*;
pub use token::*;
