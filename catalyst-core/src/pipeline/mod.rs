//! Fetch pipeline module.
//!
//! Drives one inbound query against the vendor API:
//! - Request context and cancellation
//! - Credential lookup with refresh-and-retry on 401/403
//! - Sequential page loop bounded by the row cap
//! - Optional site-name enrichment

pub mod context;
pub mod enrichment;
pub mod pagination;

pub use context::*;
pub use enrichment::*;
pub use pagination::*;
