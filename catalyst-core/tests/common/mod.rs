//! In-memory Catalyst Center used by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};

use catalyst_core::config::options::DatasourceOptions;
use catalyst_core::config::settings::InstanceSettings;
use catalyst_core::transport::http::{
    HttpRequest, HttpResponse, HttpTransport, Method, TransportError, TransportFactory,
};
use catalyst_core::{Cancellation, DataQuery, Datasource, InstanceContext, TimeRange};

pub const BASE_URL: &str = "https://dnac.example.com";

#[derive(Default)]
pub struct FakeCatalyst {
    pub issues: Mutex<Vec<Value>>,
    pub sites: Mutex<Vec<Value>>,
    pub site_health: Mutex<Vec<Value>>,
    pub revoked: Mutex<HashSet<String>>,
    pub fail_site_lookup: Mutex<bool>,
    pub reject_login: Mutex<bool>,
    pub unreachable: Mutex<bool>,
    /// Cancelled right after an issues page is served.
    pub cancel_on_issues_page: Mutex<Option<Cancellation>>,
    logins: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeCatalyst {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Server holding `count` P1 issues on `site-a`.
    pub fn with_issues(count: usize) -> Arc<Self> {
        let server = Self::new();
        *server.issues.lock() = (0..count).map(|i| issue(i, "P1", "site-a")).collect();
        server
    }

    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn requests_to(&self, fragment: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .cloned()
            .collect()
    }

    pub fn revoke(&self, token: &str) {
        self.revoked.lock().insert(token.to_string());
    }

    fn handle(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(req.clone());

        if *self.unreachable.lock() {
            return Err(TransportError::new("connection refused"));
        }

        let url = reqwest::Url::parse(&req.url).map_err(|e| TransportError::new(e.to_string()))?;
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        if url.path().ends_with("/auth/token") {
            return Ok(self.login(req));
        }

        let token = req.header_value("X-Auth-Token").unwrap_or_default().to_string();
        if token.is_empty() || self.revoked.lock().contains(&token) {
            return Ok(HttpResponse::new(401, "token expired"));
        }

        let path = url.path();
        let body = if path.ends_with("/assuranceIssues") {
            if let Some(cancel) = self.cancel_on_issues_page.lock().as_ref() {
                cancel.cancel();
            }
            page(&self.issues.lock(), &params)
        } else if path.ends_with("/site-health") {
            page(&self.site_health.lock(), &params)
        } else if path.ends_with("/site") {
            if *self.fail_site_lookup.lock() {
                return Ok(HttpResponse::new(500, "site service unavailable"));
            }
            let wanted: HashSet<&str> = params
                .get("siteId")
                .map(|ids| ids.split(',').collect())
                .unwrap_or_default();
            let sites: Vec<Value> = self
                .sites
                .lock()
                .iter()
                .filter(|s| s["id"].as_str().is_some_and(|id| wanted.contains(id)))
                .cloned()
                .collect();
            json!({ "response": sites })
        } else {
            return Ok(HttpResponse::new(404, "no such endpoint"));
        };

        Ok(HttpResponse::new(200, body.to_string()))
    }

    fn login(&self, req: &HttpRequest) -> HttpResponse {
        if req.method != Method::Post || *self.reject_login.lock() {
            return HttpResponse::new(401, "bad credentials");
        }
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        HttpResponse::new(200, json!({ "Token": format!("tok-{}", n) }).to_string())
    }
}

/// Slice by 1-based `offset` and `limit`, the way the controller pages.
fn page(all: &[Value], params: &HashMap<String, String>) -> Value {
    let limit: usize = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(25);
    let offset: usize = params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(1);
    let items: Vec<Value> = all
        .iter()
        .skip(offset.saturating_sub(1))
        .take(limit)
        .cloned()
        .collect();
    json!({ "response": items })
}

pub fn issue(i: usize, priority: &str, site_id: &str) -> Value {
    json!({
        "issueId": format!("ISSUE-{:03}", i),
        "name": format!("Issue {}", i),
        "priority": priority,
        "issueStatus": "ACTIVE",
        "category": "Availability",
        "deviceId": format!("dev-{}", i),
        "siteId": site_id,
        "timestamp": 1_772_366_400_000i64 + i as i64,
    })
}

struct SharedTransport(Arc<FakeCatalyst>);

impl HttpTransport for SharedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.0.handle(request)
    }
}

pub struct FakeFactory(pub Arc<FakeCatalyst>);

impl TransportFactory for FakeFactory {
    fn transport_for(
        &self,
        _settings: &InstanceSettings,
    ) -> catalyst_core::Result<Box<dyn HttpTransport>> {
        Ok(Box::new(SharedTransport(Arc::clone(&self.0))))
    }
}

pub fn datasource(server: &Arc<FakeCatalyst>) -> Datasource {
    Datasource::with_factory(
        DatasourceOptions::default(),
        Box::new(FakeFactory(Arc::clone(server))),
    )
}

pub fn instance() -> InstanceContext {
    let secure = [("username", "admin"), ("password", "secret")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    InstanceContext {
        uid: "ds-uid-1".to_string(),
        json_data: json!({ "baseUrl": BASE_URL }),
        secure,
    }
}

pub fn window() -> TimeRange {
    TimeRange::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    )
}

pub fn query(ref_id: &str, model: Value) -> DataQuery {
    DataQuery {
        ref_id: ref_id.to_string(),
        json: model,
        time_range: window(),
    }
}

pub fn param(req: &HttpRequest, key: &str) -> Option<String> {
    reqwest::Url::parse(&req.url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
