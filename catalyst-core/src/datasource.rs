//! Datasource service.
//!
//! Entry points the host calls for one configured instance:
//! - `query_data` - run panel queries (issues table or site health)
//! - `check_health` - token plus a one-record check of the issues endpoint
//! - `call_resource` - raw passthrough used for template variables
//!
//! Instance settings are parsed on every call; the token cache is the only
//! state shared across calls.

use std::collections::HashMap;

use serde_json::Value;

use crate::auth::token::{TokenCache, AUTH_TOKEN_HEADER};
use crate::config::endpoints::{issues_url, site_health_url};
use crate::config::options::DatasourceOptions;
use crate::config::settings::InstanceSettings;
use crate::error::{DatasourceError, Result};
use crate::extraction::json_path::RawRecord;
use crate::extraction::normalize::{collect_site_ids, normalize_issue};
use crate::extraction::site_health::{matches_site_filters, site_health_row};
use crate::logging::structured::LogContext;
use crate::output::frame::{issues_frame, site_health_frame, Frame};
use crate::pipeline::context::{Cancellation, CredentialSource, RequestContext};
use crate::pipeline::enrichment::resolve_site_names;
use crate::pipeline::pagination::{FetchOutcome, ListRequest, PageFetcher};
use crate::query::model::{QueryKind, QueryModel, TimeRange};
use crate::query::params::{
    build_issue_params, build_site_health_params, PriorityFilter, ISSUES_PAGE_BOUNDS,
    SITE_HEALTH_PAGE_BOUNDS,
};
use crate::transport::client::ReqwestTransportFactory;
use crate::transport::http::{HttpRequest, HttpTransport, TransportFactory};
use crate::{log_info, log_warn};

/// Host-supplied identity and raw settings of one datasource instance.
#[derive(Debug, Clone, Default)]
pub struct InstanceContext {
    pub uid: String,
    pub json_data: Value,
    pub secure: HashMap<String, String>,
}

/// One panel query.
#[derive(Debug, Clone)]
pub struct DataQuery {
    pub ref_id: String,
    pub json: Value,
    pub time_range: TimeRange,
}

/// Result slot for one query. A cancelled query carries both the frames
/// built from what was fetched and the `Cancelled` error.
#[derive(Debug, Default)]
pub struct DataResponse {
    pub frames: Vec<Frame>,
    pub error: Option<DatasourceError>,
}

impl DataResponse {
    pub fn from_error(error: DatasourceError) -> Self {
        Self {
            frames: Vec::new(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryDataResponse {
    /// Keyed by refId.
    pub responses: HashMap<String, DataResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthResult {
    pub status: HealthStatus,
    pub message: String,
}

impl HealthResult {
    fn ok(message: &str) -> Self {
        Self {
            status: HealthStatus::Ok,
            message: message.to_string(),
        }
    }

    fn error(message: String) -> Self {
        Self {
            status: HealthStatus::Error,
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ResourceResponse {
    fn plain(status: u16, body: String) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }
}

pub const HEALTH_OK_MESSAGE: &str = "Successfully connected to Catalyst Center (issues)";

pub struct Datasource {
    cache: TokenCache,
    options: DatasourceOptions,
    factory: Box<dyn TransportFactory>,
}

impl Datasource {
    /// Datasource with options from the environment and the reqwest transport.
    pub fn new() -> Self {
        let options = DatasourceOptions::from_env();
        let factory = ReqwestTransportFactory {
            timeout: options.http_timeout,
        };
        Self::with_factory(options, Box::new(factory))
    }

    pub fn with_factory(options: DatasourceOptions, factory: Box<dyn TransportFactory>) -> Self {
        Self {
            cache: TokenCache::new(),
            options,
            factory,
        }
    }

    pub fn options(&self) -> &DatasourceOptions {
        &self.options
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.cache
    }

    fn connect(&self, instance: &InstanceContext, ctx: &LogContext) -> Result<(InstanceSettings, Box<dyn HttpTransport>)> {
        let settings = InstanceSettings::parse(&instance.json_data, &instance.secure).map_err(|e| {
            log_warn!(ctx, "SETTINGS_INVALID", error = e);
            e
        })?;
        let transport = self.factory.transport_for(&settings)?;
        Ok((settings, transport))
    }

    /// Run every query of one request. Settings errors abort the whole
    /// request; any other error is confined to its query's slot.
    pub fn query_data(
        &self,
        instance: &InstanceContext,
        queries: &[DataQuery],
        cancellation: &Cancellation,
    ) -> Result<QueryDataResponse> {
        let request = RequestContext::new(&instance.uid, cancellation.clone());
        let ctx = request.log_context();
        let (settings, transport) = self.connect(instance, &ctx)?;

        log_info!(ctx, "QUERY_DATA_START", queries = queries.len());

        let mut response = QueryDataResponse::default();
        for query in queries {
            let qctx = ctx.with_ref(&query.ref_id);
            let credentials = CredentialSource::new(&self.cache, &instance.uid, &settings);
            let data = self.run_query(&request, credentials, transport.as_ref(), query, &qctx);

            match &data.error {
                Some(e) => log_warn!(qctx, "QUERY_FAILED", error = e, frames = data.frames.len()),
                None => log_info!(qctx, "QUERY_COMPLETE", frames = data.frames.len()),
            }
            response.responses.insert(query.ref_id.clone(), data);
        }

        Ok(response)
    }

    fn run_query(
        &self,
        request: &RequestContext,
        credentials: CredentialSource<'_>,
        transport: &dyn HttpTransport,
        query: &DataQuery,
        ctx: &LogContext,
    ) -> DataResponse {
        let model = match QueryModel::from_json(&query.json) {
            Ok(m) => m,
            Err(e) => return DataResponse::from_error(e),
        };

        let fetcher = PageFetcher::new(transport, credentials, &request.cancellation, ctx);
        match model.query_type {
            QueryKind::Alerts => self.query_issues(&fetcher, credentials, transport, &model, query, ctx),
            QueryKind::SiteHealth => self.query_site_health(&fetcher, credentials, &model, query),
        }
    }

    fn query_issues(
        &self,
        fetcher: &PageFetcher<'_>,
        credentials: CredentialSource<'_>,
        transport: &dyn HttpTransport,
        model: &QueryModel,
        query: &DataQuery,
        ctx: &LogContext,
    ) -> DataResponse {
        let url = match issues_url(&credentials.settings.base_url) {
            Ok(u) => u,
            Err(e) => return DataResponse::from_error(e),
        };

        let start_ms = query.time_range.from_ms();
        let end_ms = query.time_range.to_ms();
        let filter = PriorityFilter::for_query(model);
        if let Some(f) = &filter {
            log_info!(ctx, "PRIORITY_POST_FILTER", allowed = f.allowed().join(","));
        }

        let params = |limit: usize, offset: usize| {
            let mut p = build_issue_params(model, start_ms, end_ms, limit as i64, offset as i64);
            if filter.is_some() {
                p.remove("priority");
            }
            p
        };
        let keep = |r: &RawRecord| filter.as_ref().map_or(true, |f| f.matches(r));

        let outcome = fetcher.fetch_all(&ListRequest {
            endpoint: "issues",
            url: &url,
            page_size: ISSUES_PAGE_BOUNDS.clamp(self.options.issues_page_size as i64),
            hard_cap: model.row_limit(self.options.default_row_limit),
            params: &params,
            keep: &keep,
        });

        with_partial(outcome, |records, complete| {
            // No further upstream calls once the caller has cancelled.
            let site_names = if model.enrich && complete {
                resolve_site_names(&collect_site_ids(records), credentials, transport, ctx)
            } else {
                HashMap::new()
            };
            let rows: Vec<_> = records
                .iter()
                .map(|r| normalize_issue(r, start_ms, &site_names))
                .collect();
            issues_frame(&query.ref_id, &rows)
        })
    }

    fn query_site_health(
        &self,
        fetcher: &PageFetcher<'_>,
        credentials: CredentialSource<'_>,
        model: &QueryModel,
        query: &DataQuery,
    ) -> DataResponse {
        let url = match site_health_url(&credentials.settings.base_url) {
            Ok(u) => u,
            Err(e) => return DataResponse::from_error(e),
        };

        let end_ms = query.time_range.to_ms();
        let parent = model.parent_site_name.trim();
        let site = model.site_name.trim();

        let params =
            |limit: usize, offset: usize| build_site_health_params(model, end_ms, limit as i64, offset as i64);
        let keep = |r: &RawRecord| matches_site_filters(r, parent, site);

        let outcome = fetcher.fetch_all(&ListRequest {
            endpoint: "site-health",
            url: &url,
            page_size: SITE_HEALTH_PAGE_BOUNDS.clamp(self.options.site_health_page_size as i64),
            hard_cap: model.row_limit(self.options.default_row_limit),
            params: &params,
            keep: &keep,
        });

        with_partial(outcome, |records, _| {
            let rows: Vec<_> = records
                .iter()
                .map(|r| site_health_row(r, &model.metrics))
                .collect();
            site_health_frame(&query.ref_id, &model.metrics, &rows)
        })
    }

    /// Report whether the instance can log in and reach the issues endpoint.
    pub fn check_health(&self, instance: &InstanceContext) -> HealthResult {
        let request = RequestContext::new(&instance.uid, Cancellation::new());
        let ctx = request.log_context();

        let (settings, transport) = match self.connect(instance, &ctx) {
            Ok(c) => c,
            Err(e) => return HealthResult::error(format!("instance error: {}", e)),
        };
        let credentials = CredentialSource::new(&self.cache, &instance.uid, &settings);

        let token = match credentials.token(transport.as_ref(), &ctx) {
            Ok(t) => t,
            Err(e) => return HealthResult::error(format!("token: {}", e)),
        };
        let url = match issues_url(&settings.base_url) {
            Ok(u) => u,
            Err(_) => return HealthResult::error("invalid base URL".to_string()),
        };

        let check = HttpRequest::get(format!("{}?limit=1", url)).header(AUTH_TOKEN_HEADER, token);
        let result = match transport.execute(&check) {
            Err(e) => HealthResult::error(format!("issues check failed: {}", e)),
            Ok(resp) if resp.is_success() => HealthResult::ok(HEALTH_OK_MESSAGE),
            Ok(resp) => HealthResult::error(format!("issues check {}: {}", resp.status, resp.body)),
        };

        log_info!(ctx, "HEALTH_CHECK", status = format!("{:?}", result.status));
        result
    }

    /// Raw passthrough for frontend resource calls. Only `issues` is
    /// routed; `raw_query` is forwarded verbatim.
    pub fn call_resource(&self, instance: &InstanceContext, path: &str, raw_query: &str) -> ResourceResponse {
        let request = RequestContext::new(&instance.uid, Cancellation::new());
        let ctx = request.log_context();

        let (settings, transport) = match self.connect(instance, &ctx) {
            Ok(c) => c,
            Err(e) => return ResourceResponse::plain(500, format!("instance error: {}", e)),
        };

        if path.trim_matches('/') != "issues" {
            log_warn!(ctx, "RESOURCE_NOT_FOUND", path = path);
            return ResourceResponse::plain(404, "not found".to_string());
        }

        let url = match issues_url(&settings.base_url) {
            Ok(u) => u,
            Err(_) => return ResourceResponse::plain(400, "bad baseUrl".to_string()),
        };
        let raw_query = raw_query.trim_start_matches('?');
        let target = if raw_query.is_empty() {
            url
        } else {
            format!("{}?{}", url, raw_query)
        };

        let credentials = CredentialSource::new(&self.cache, &instance.uid, &settings);
        let token = match credentials.token(transport.as_ref(), &ctx) {
            Ok(t) => t,
            Err(e) => return ResourceResponse::plain(401, format!("token: {}", e)),
        };

        match transport.execute(&HttpRequest::get(target).header(AUTH_TOKEN_HEADER, token)) {
            Err(e) => {
                log_warn!(ctx, "RESOURCE_REQUEST_FAILED", error = e);
                ResourceResponse::plain(502, format!("request failed: {}", e))
            }
            Ok(resp) => {
                log_info!(ctx, "RESOURCE_PASSTHROUGH", path = path, status = resp.status);
                ResourceResponse {
                    status: resp.status,
                    headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                    body: resp.body,
                }
            }
        }
    }
}

impl Default for Datasource {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the frame from the fetched records unless the fetch failed
/// outright. Cancellation keeps the partial frame next to the error; the
/// builder is told the record set is incomplete and the frame carries no
/// no-data notice.
fn with_partial<F>(outcome: FetchOutcome, build: F) -> DataResponse
where
    F: FnOnce(&[RawRecord], bool) -> Frame,
{
    match outcome.error {
        None => DataResponse {
            frames: vec![build(&outcome.records, true)],
            error: None,
        },
        Some(DatasourceError::Cancelled) => {
            let mut frame = build(&outcome.records, false);
            frame.notices.clear();
            DataResponse {
                frames: vec![frame],
                error: Some(DatasourceError::Cancelled),
            }
        }
        Some(e) => DataResponse::from_error(e),
    }
}
