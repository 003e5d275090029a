//! Per-instance token cache.
//!
//! One entry per datasource instance uid. The cache is owned by the
//! [`Datasource`](crate::datasource::Datasource) and shared by every query
//! it serves; each read-check and each write is a single critical section.
//! The lock is never held across the login call.

use std::collections::HashMap;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use crate::auth::expiry::{derive_expiry_from_json, parse_expiry_from_headers};
use crate::config::endpoints::token_url;
use crate::config::settings::InstanceSettings;
use crate::error::{DatasourceError, Result};
use crate::logging::structured::LogContext;
use crate::transport::http::{HttpRequest, HttpTransport};

/// Header carrying the token on login responses and on every API request.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// TTL used when the login response carries no expiry hint.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 55 * 60;

/// TTL used when the announced expiry is too close to now.
pub const MIN_TOKEN_TTL_SECS: i64 = 5 * 60;

/// Announced expiries closer than this are replaced by the minimum TTL.
pub const EXPIRY_GUARD_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenEntry {
    /// Usable only while non-empty and strictly before expiry.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.token.trim().is_empty() && now < self.expires_at
    }
}

/// Where the login token was found; body tokens also consult body expiry fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Header,
    Body,
}

#[derive(Debug, Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, TokenEntry>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a usable token for the instance.
    ///
    /// Order of precedence: the override token from settings, a cached
    /// non-expired token, then a fresh login with the configured
    /// username/password.
    pub fn get_token(
        &self,
        instance_id: &str,
        settings: &InstanceSettings,
        transport: &dyn HttpTransport,
        ctx: &LogContext,
    ) -> Result<String> {
        if let Some(token) = settings.override_token() {
            log::debug!("{} TOKEN_OVERRIDE", ctx);
            return Ok(token.to_string());
        }

        let now = Utc::now();
        {
            let entries = self.entries.lock();
            if let Some(entry) = entries.get(instance_id) {
                if entry.is_usable(now) {
                    log::debug!(
                        "{} TOKEN_CACHE_HIT expires_in_secs={}",
                        ctx,
                        (entry.expires_at - now).num_seconds()
                    );
                    return Ok(entry.token.clone());
                }
            }
        }

        if !settings.has_credentials() {
            log::warn!("{} TOKEN_CREDENTIALS_MISSING", ctx);
            return Err(DatasourceError::CredentialsMissing);
        }

        self.login(instance_id, settings, transport, ctx)
    }

    /// Force the next `get_token` for this instance through a fresh login.
    pub fn invalidate(&self, instance_id: &str) {
        let mut entries = self.entries.lock();
        entries.insert(
            instance_id.to_string(),
            TokenEntry {
                token: String::new(),
                expires_at: Utc::now(),
            },
        );
    }

    /// Snapshot of the cached entry for an instance.
    pub fn entry(&self, instance_id: &str) -> Option<TokenEntry> {
        self.entries.lock().get(instance_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn login(
        &self,
        instance_id: &str,
        settings: &InstanceSettings,
        transport: &dyn HttpTransport,
        ctx: &LogContext,
    ) -> Result<String> {
        let url = token_url(&settings.base_url)?;
        let credentials =
            general_purpose::STANDARD.encode(format!("{}:{}", settings.username, settings.password));
        let request = HttpRequest::post(url)
            .header("Authorization", format!("Basic {}", credentials))
            .header("Accept", "application/json");

        log::info!("{} TOKEN_LOGIN_START user={}", ctx, settings.username);

        let resp = transport.execute(&request).map_err(|e| {
            log::warn!("{} TOKEN_LOGIN_FAILED error={}", ctx, e);
            DatasourceError::AuthEndpoint(e.message)
        })?;

        if !resp.is_success() {
            log::warn!("{} TOKEN_LOGIN_REJECTED status={}", ctx, resp.status);
            return Err(DatasourceError::AuthEndpoint(format!(
                "token endpoint returned non-2xx: {}",
                resp.status
            )));
        }

        // Malformed bodies are tolerated as long as the header carries the token.
        let body: Value = serde_json::from_str(&resp.body).unwrap_or(Value::Null);

        let (token, source) = match resp.header(AUTH_TOKEN_HEADER).map(str::trim) {
            Some(t) if !t.is_empty() => (t.to_string(), TokenSource::Header),
            _ => match body_token(&body) {
                Some(t) => (t, TokenSource::Body),
                None => {
                    log::warn!("{} TOKEN_NOT_FOUND status={}", ctx, resp.status);
                    return Err(DatasourceError::TokenNotFound);
                }
            },
        };

        let now = Utc::now();
        let announced = parse_expiry_from_headers(&resp, now).or_else(|| match source {
            TokenSource::Body => derive_expiry_from_json(&body, now),
            TokenSource::Header => None,
        });
        let expires_at = resolve_expiry(announced, now);

        log::info!(
            "{} TOKEN_CACHED source={:?} token_len={} announced_expiry={} ttl_secs={}",
            ctx,
            source,
            token.len(),
            announced.is_some(),
            (expires_at - now).num_seconds()
        );

        self.entries.lock().insert(
            instance_id.to_string(),
            TokenEntry {
                token: token.clone(),
                expires_at,
            },
        );

        Ok(token)
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, instance_id: &str, entry: TokenEntry) {
        self.entries.lock().insert(instance_id.to_string(), entry);
    }
}

/// `Token` wins over `token`; both are trimmed.
fn body_token(body: &Value) -> Option<String> {
    ["Token", "token"].iter().find_map(|key| {
        body.get(*key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

/// Pick the expiry to cache: the announced one if plausible, the minimum
/// TTL if announced but too soon, the default TTL if nothing was announced.
pub fn resolve_expiry(announced: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match announced {
        Some(at) if at > now + Duration::seconds(EXPIRY_GUARD_SECS) => at,
        Some(_) => now + Duration::seconds(MIN_TOKEN_TTL_SECS),
        None => now + Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::transport::http::{HttpResponse, TransportError};

    struct LoginStub {
        calls: AtomicUsize,
        respond: Box<dyn Fn(usize) -> std::result::Result<HttpResponse, TransportError> + Send + Sync>,
    }

    impl LoginStub {
        fn new<F>(respond: F) -> Self
        where
            F: Fn(usize) -> std::result::Result<HttpResponse, TransportError> + Send + Sync + 'static,
        {
            Self {
                calls: AtomicUsize::new(0),
                respond: Box::new(respond),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl HttpTransport for LoginStub {
        fn execute(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            assert!(request.url.ends_with("/dna/system/api/v1/auth/token"));
            assert!(request
                .header_value("authorization")
                .is_some_and(|v| v.starts_with("Basic ")));
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            (self.respond)(n)
        }
    }

    fn settings() -> InstanceSettings {
        InstanceSettings {
            base_url: "https://dnac.local/dna/intent/api/v1".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        }
    }

    fn ctx() -> LogContext {
        LogContext::new("uid-1", "q-test")
    }

    fn secs_until(at: DateTime<Utc>) -> i64 {
        (at - Utc::now()).num_seconds()
    }

    #[test]
    fn test_header_token_with_max_age() {
        let cache = TokenCache::new();
        let stub = LoginStub::new(|_| {
            Ok(HttpResponse::new(200, "")
                .with_header("X-Auth-Token", "abc123")
                .with_header("Cache-Control", "max-age=120"))
        });

        let token = cache.get_token("uid-1", &settings(), &stub, &ctx()).unwrap();
        assert_eq!(token, "abc123");

        let entry = cache.entry("uid-1").unwrap();
        let ttl = secs_until(entry.expires_at);
        assert!((115..=120).contains(&ttl), "ttl={}", ttl);
    }

    #[test]
    fn test_body_token_with_expires_in() {
        let cache = TokenCache::new();
        let stub = LoginStub::new(|_| Ok(HttpResponse::new(200, r#"{"token":"zzz","expiresIn":3600}"#)));

        assert_eq!(cache.get_token("uid-1", &settings(), &stub, &ctx()).unwrap(), "zzz");
        let ttl = secs_until(cache.entry("uid-1").unwrap().expires_at);
        assert!((3595..=3600).contains(&ttl), "ttl={}", ttl);
    }

    #[test]
    fn test_capitalized_body_key_wins() {
        let cache = TokenCache::new();
        let stub = LoginStub::new(|_| Ok(HttpResponse::new(200, r#"{"Token":"upper","token":"lower"}"#)));
        assert_eq!(cache.get_token("uid-1", &settings(), &stub, &ctx()).unwrap(), "upper");
    }

    #[test]
    fn test_default_ttl_without_hints() {
        let cache = TokenCache::new();
        let stub = LoginStub::new(|_| Ok(HttpResponse::new(200, "not json").with_header("X-Auth-Token", "h")));
        assert_eq!(cache.get_token("uid-1", &settings(), &stub, &ctx()).unwrap(), "h");
        let ttl = secs_until(cache.entry("uid-1").unwrap().expires_at);
        assert!((DEFAULT_TOKEN_TTL_SECS - 5..=DEFAULT_TOKEN_TTL_SECS).contains(&ttl));
    }

    #[test]
    fn test_header_token_ignores_body_expiry() {
        let cache = TokenCache::new();
        let stub = LoginStub::new(|_| {
            Ok(HttpResponse::new(200, r#"{"expiresIn":100000}"#).with_header("X-Auth-Token", "h"))
        });
        cache.get_token("uid-1", &settings(), &stub, &ctx()).unwrap();
        let ttl = secs_until(cache.entry("uid-1").unwrap().expires_at);
        assert!(ttl <= DEFAULT_TOKEN_TTL_SECS);
    }

    #[test]
    fn test_implausible_expiry_uses_minimum_ttl() {
        let now = Utc::now();
        let soon = resolve_expiry(Some(now + Duration::seconds(10)), now);
        assert_eq!(soon, now + Duration::seconds(MIN_TOKEN_TTL_SECS));

        let ok = resolve_expiry(Some(now + Duration::seconds(600)), now);
        assert_eq!(ok, now + Duration::seconds(600));

        let none = resolve_expiry(None, now);
        assert_eq!(none, now + Duration::seconds(DEFAULT_TOKEN_TTL_SECS));
    }

    #[test]
    fn test_cached_token_reused() {
        let cache = TokenCache::new();
        let stub = LoginStub::new(|_| Ok(HttpResponse::new(200, "").with_header("X-Auth-Token", "t1")));

        cache.get_token("uid-1", &settings(), &stub, &ctx()).unwrap();
        cache.get_token("uid-1", &settings(), &stub, &ctx()).unwrap();
        assert_eq!(stub.calls(), 1);
    }

    #[test]
    fn test_expired_entry_triggers_single_login() {
        let cache = TokenCache::new();
        cache.insert(
            "uid-1",
            TokenEntry {
                token: "old".to_string(),
                expires_at: Utc::now() - Duration::seconds(1),
            },
        );
        let stub = LoginStub::new(|n| Ok(HttpResponse::new(200, "").with_header("X-Auth-Token", format!("new-{}", n))));

        assert_eq!(cache.get_token("uid-1", &settings(), &stub, &ctx()).unwrap(), "new-0");
        assert_eq!(stub.calls(), 1);
        assert!(cache.entry("uid-1").unwrap().expires_at > Utc::now());
    }

    #[test]
    fn test_instances_are_isolated() {
        let cache = TokenCache::new();
        let stub = LoginStub::new(|n| Ok(HttpResponse::new(200, "").with_header("X-Auth-Token", format!("t{}", n))));

        assert_eq!(cache.get_token("a", &settings(), &stub, &ctx()).unwrap(), "t0");
        assert_eq!(cache.get_token("b", &settings(), &stub, &ctx()).unwrap(), "t1");
        assert_eq!(cache.get_token("a", &settings(), &stub, &ctx()).unwrap(), "t0");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_forces_login() {
        let cache = TokenCache::new();
        let stub = LoginStub::new(|n| Ok(HttpResponse::new(200, "").with_header("X-Auth-Token", format!("t{}", n))));

        cache.get_token("uid-1", &settings(), &stub, &ctx()).unwrap();
        cache.invalidate("uid-1");
        assert!(!cache.entry("uid-1").unwrap().is_usable(Utc::now()));
        assert_eq!(cache.get_token("uid-1", &settings(), &stub, &ctx()).unwrap(), "t1");
        assert_eq!(stub.calls(), 2);
    }

    #[test]
    fn test_concurrent_access_to_one_instance() {
        let cache = TokenCache::new();
        let stub = LoginStub::new(|n| Ok(HttpResponse::new(200, "").with_header("X-Auth-Token", format!("t{}", n))));
        let s = settings();
        let invalidations = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let (cache, stub, s, invalidations) = (&cache, &stub, &s, &invalidations);
                scope.spawn(move || {
                    let c = LogContext::new("uid-1", &format!("q-worker{}", worker));
                    for i in 0..50 {
                        let token = cache.get_token("uid-1", s, stub, &c).unwrap();
                        assert!(token.starts_with('t') && token.len() > 1, "token={:?}", token);
                        if (i + worker) % 7 == 0 {
                            cache.invalidate("uid-1");
                            invalidations.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        let token = cache.get_token("uid-1", &s, &stub, &ctx()).unwrap();
        let entry = cache.entry("uid-1").unwrap();
        assert_eq!(entry.token, token);
        assert!(entry.is_usable(Utc::now()));
        assert_eq!(cache.len(), 1);
        assert!(stub.calls() >= 1);
        assert!(invalidations.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_override_token_bypasses_cache() {
        let cache = TokenCache::new();
        let stub = LoginStub::new(|_| panic!("login must not be called"));
        let s = InstanceSettings {
            api_token: " manual ".to_string(),
            username: String::new(),
            ..settings()
        };

        assert_eq!(cache.get_token("uid-1", &s, &stub, &ctx()).unwrap(), "manual");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_credentials() {
        let cache = TokenCache::new();
        let stub = LoginStub::new(|_| panic!("login must not be called"));
        let s = InstanceSettings {
            password: String::new(),
            ..settings()
        };
        let err = cache.get_token("uid-1", &s, &stub, &ctx()).unwrap_err();
        assert!(matches!(err, DatasourceError::CredentialsMissing));
    }

    #[test]
    fn test_login_failures() {
        let cache = TokenCache::new();

        let refused = LoginStub::new(|_| Err(TransportError::new("connection refused")));
        let err = cache.get_token("uid-1", &settings(), &refused, &ctx()).unwrap_err();
        assert!(matches!(err, DatasourceError::AuthEndpoint(_)));

        let rejected = LoginStub::new(|_| Ok(HttpResponse::new(401, "bad credentials")));
        let err = cache.get_token("uid-1", &settings(), &rejected, &ctx()).unwrap_err();
        assert!(matches!(err, DatasourceError::AuthEndpoint(_)));

        let empty = LoginStub::new(|_| Ok(HttpResponse::new(200, r#"{"token":"  "}"#)));
        let err = cache.get_token("uid-1", &settings(), &empty, &ctx()).unwrap_err();
        assert!(matches!(err, DatasourceError::TokenNotFound));
        assert!(cache.entry("uid-1").is_none());
    }
}
