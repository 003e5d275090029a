//! Request context management.
//!
//! Provides the per-request correlation id, the cancellation signal and the
//! credential source used by every call made on behalf of one request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::auth::token::TokenCache;
use crate::config::settings::InstanceSettings;
use crate::error::Result;
use crate::logging::structured::LogContext;
use crate::transport::http::HttpTransport;

/// Caller cancellation: an explicit flag plus an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Cancel every holder of a clone of this signal.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Context for one inbound request (one or more panel queries).
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub instance_id: String,
    pub query_id: String,
    pub cancellation: Cancellation,
}

impl RequestContext {
    pub fn new(instance_id: &str, cancellation: Cancellation) -> Self {
        let query_id = format!("q-{}", &Uuid::new_v4().to_string()[..8]);
        Self {
            instance_id: instance_id.to_string(),
            query_id,
            cancellation,
        }
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.instance_id, &self.query_id)
    }
}

/// Token supplier for one instance: the shared cache plus the settings it
/// needs to log in.
#[derive(Clone, Copy)]
pub struct CredentialSource<'a> {
    pub cache: &'a TokenCache,
    pub instance_id: &'a str,
    pub settings: &'a InstanceSettings,
}

impl<'a> CredentialSource<'a> {
    pub fn new(cache: &'a TokenCache, instance_id: &'a str, settings: &'a InstanceSettings) -> Self {
        Self {
            cache,
            instance_id,
            settings,
        }
    }

    pub fn token(&self, transport: &dyn HttpTransport, ctx: &LogContext) -> Result<String> {
        self.cache
            .get_token(self.instance_id, self.settings, transport, ctx)
    }

    /// Drop the cached login token. The cache is not touched when an
    /// override token is configured.
    pub fn invalidate(&self) {
        if self.settings.override_token().is_some() {
            return;
        }
        self.cache.invalidate(self.instance_id);
    }
}
