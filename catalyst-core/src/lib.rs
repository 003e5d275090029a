//! Catalyst Core - Assurance issue query engine for Catalyst Center
//!
//! This crate is the backend of a dashboard datasource that reads assurance
//! issues and site health from a Cisco Catalyst Center controller. The
//! implementation prioritizes:
//!
//! 1. **Correctness** - Hard row caps, in-order pagination, one retry on auth failure
//! 2. **Logging** - Every network decision logged with instance/query context
//! 3. **Isolation** - A failing query never affects the others in a request
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `datasource` - Host-facing service (query data, health check, resources)
//! - `auth` - Per-instance token cache and expiry derivation
//! - `pipeline` - Request context, paginated fetcher, site enrichment
//! - `query` - Query model and wire parameter building
//! - `extraction` - JSON coercion and record normalization
//! - `output` - Column-oriented result frames
//! - `config` - Instance settings, endpoint URLs, process options
//! - `transport` - HTTP seam and the reqwest implementation
//! - `logging` - Structured logging with query context

pub mod auth;
pub mod config;
pub mod datasource;
pub mod error;
pub mod extraction;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod transport;

pub use datasource::{
    DataQuery, DataResponse, Datasource, HealthResult, HealthStatus, InstanceContext,
    QueryDataResponse, ResourceResponse,
};
pub use error::{DatasourceError, Result};
pub use pipeline::context::Cancellation;
pub use query::model::TimeRange;

/// Initialize the process logger. Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
