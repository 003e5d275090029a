//! Structured logging utilities.
//!
//! Every line emitted while serving a request carries the datasource
//! instance uid and the per-request query id, plus the panel refId once a
//! single query is being processed.

use std::fmt;

/// Logging context for one inbound request.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub instance_id: String,
    pub query_id: String,
    pub ref_id: Option<String>,
}

impl LogContext {
    pub fn new(instance_id: &str, query_id: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            query_id: query_id.to_string(),
            ref_id: None,
        }
    }

    pub fn with_ref(&self, ref_id: &str) -> Self {
        Self {
            instance_id: self.instance_id.clone(),
            query_id: self.query_id.clone(),
            ref_id: Some(ref_id.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ref_id {
            Some(rid) => write!(
                f,
                "[instance={}] [query={}] [ref={}]",
                self.instance_id, self.query_id, rid
            ),
            None => write!(f, "[instance={}] [query={}]", self.instance_id, self.query_id),
        }
    }
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)*) => {
        log::info!(
            concat!("{} {}", $(" ", stringify!($key), "={}"),*),
            $ctx,
            $event
            $(, $value)*
        )
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)*) => {
        log::warn!(
            concat!("{} {}", $(" ", stringify!($key), "={}"),*),
            $ctx,
            $event
            $(, $value)*
        )
    };
}

/// Log an error message with context.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)*) => {
        log::error!(
            concat!("{} {}", $(" ", stringify!($key), "={}"),*),
            $ctx,
            $event
            $(, $value)*
        )
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)*) => {
        log::debug!(
            concat!("{} {}", $(" ", stringify!($key), "={}"),*),
            $ctx,
            $event
            $(, $value)*
        )
    };
}
