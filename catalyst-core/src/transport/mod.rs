//! HTTP transport seam.
//!
//! The credential cache, paginated fetcher and enrichment resolver talk to
//! the vendor API only through [`HttpTransport`], so the blocking reqwest
//! client can be swapped for a scripted transport in tests.

pub mod client;
pub mod http;
#[cfg(test)]
pub(crate) mod testing;

pub use client::*;
pub use http::*;
