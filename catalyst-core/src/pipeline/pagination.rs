//! Paginated list fetcher.
//!
//! One fetch walks a list endpoint page by page, strictly in increasing
//! offset order:
//! 1. `Requesting` - get a token, GET the page
//! 2. `Retrying` - on 401/403, invalidate the token and reissue the same
//!    request exactly once
//! 3. `Accumulating` - decode the page and append the kept records
//! 4. `Done` - row cap reached, short page or empty page
//! 5. `Failed` - transport error, non-2xx, or a second 401/403
//!
//! The page size asked for is `min(page_size, hard_cap - accumulated)`, so
//! the final page never overshoots the cap.

use reqwest::Url;
use serde_json::Value;

use crate::auth::token::AUTH_TOKEN_HEADER;
use crate::error::{DatasourceError, Result};
use crate::extraction::json_path::RawRecord;
use crate::logging::structured::LogContext;
use crate::pipeline::context::{Cancellation, CredentialSource};
use crate::query::params::WireParams;
use crate::transport::http::{HttpRequest, HttpResponse, HttpTransport};

/// Envelope key holding the record list.
pub const ENVELOPE_KEY: &str = "response";

/// Describes one paginated fetch.
pub struct ListRequest<'a> {
    /// Short endpoint name for errors and logs, e.g. `issues`.
    pub endpoint: &'a str,
    pub url: &'a str,
    /// Already clamped to the endpoint's bounds.
    pub page_size: usize,
    pub hard_cap: usize,
    /// Builds the wire parameters for `(limit, offset)`.
    pub params: &'a dyn Fn(usize, usize) -> WireParams,
    /// Post-fetch record filter; records it rejects are not accumulated.
    pub keep: &'a dyn Fn(&RawRecord) -> bool,
}

/// Result of one fetch: records gathered plus the error that stopped it.
///
/// On failure the records are discarded; on cancellation the records
/// accumulated before the signal are kept.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    pub pages: usize,
    pub error: Option<DatasourceError>,
}

impl FetchOutcome {
    pub fn into_result(self) -> Result<Vec<RawRecord>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.records),
        }
    }
}

#[derive(Debug)]
enum FetchState {
    Requesting,
    Retrying(HttpRequest),
    Accumulating(HttpResponse),
    Done,
    Failed(DatasourceError),
}

pub struct PageFetcher<'a> {
    transport: &'a dyn HttpTransport,
    credentials: CredentialSource<'a>,
    cancellation: &'a Cancellation,
    ctx: &'a LogContext,
}

impl<'a> PageFetcher<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        credentials: CredentialSource<'a>,
        cancellation: &'a Cancellation,
        ctx: &'a LogContext,
    ) -> Self {
        Self {
            transport,
            credentials,
            cancellation,
            ctx,
        }
    }

    /// Fetch up to `hard_cap` records from a list endpoint.
    pub fn fetch_all(&self, list: &ListRequest<'_>) -> FetchOutcome {
        let ctx = self.ctx;
        let mut records: Vec<RawRecord> = Vec::new();
        let mut offset: usize = 1;
        let mut requested: usize = 0;
        let mut pages: usize = 0;
        let mut state = FetchState::Requesting;

        log::debug!(
            "{} FETCH_START endpoint={} page_size={} hard_cap={}",
            ctx,
            list.endpoint,
            list.page_size,
            list.hard_cap
        );

        let error = loop {
            state = match state {
                FetchState::Requesting => {
                    if records.len() >= list.hard_cap {
                        FetchState::Done
                    } else if self.cancellation.is_cancelled() {
                        log::warn!(
                            "{} FETCH_CANCELLED endpoint={} offset={} accumulated={}",
                            ctx,
                            list.endpoint,
                            offset,
                            records.len()
                        );
                        break Some(DatasourceError::Cancelled);
                    } else {
                        requested = list.page_size.min(list.hard_cap - records.len()).max(1);
                        match page_url(list, requested, offset) {
                            Ok(url) => {
                                log::debug!(
                                    "{} PAGE_REQUEST endpoint={} offset={} limit={}",
                                    ctx,
                                    list.endpoint,
                                    offset,
                                    requested
                                );
                                self.send_page(list.endpoint, HttpRequest::get(url), false)
                            }
                            Err(e) => FetchState::Failed(e),
                        }
                    }
                }
                FetchState::Retrying(request) => {
                    log::warn!(
                        "{} PAGE_UNAUTHORIZED endpoint={} offset={} action=refresh_token_and_retry",
                        ctx,
                        list.endpoint,
                        offset
                    );
                    self.credentials.invalidate();
                    self.send_page(list.endpoint, request, true)
                }
                FetchState::Accumulating(resp) => {
                    pages += 1;
                    let page = decode_page(&resp.body, ctx);
                    let received = page.len();
                    if received == 0 {
                        log::debug!("{} PAGE_EMPTY endpoint={} offset={}", ctx, list.endpoint, offset);
                        FetchState::Done
                    } else {
                        let before = records.len();
                        records.extend(page.into_iter().filter(|r| (list.keep)(r)));
                        log::debug!(
                            "{} PAGE_FETCHED endpoint={} offset={} received={} kept={} accumulated={}",
                            ctx,
                            list.endpoint,
                            offset,
                            received,
                            records.len() - before,
                            records.len()
                        );

                        if records.len() >= list.hard_cap || received < requested {
                            FetchState::Done
                        } else {
                            offset += requested;
                            FetchState::Requesting
                        }
                    }
                }
                FetchState::Done => break None,
                FetchState::Failed(e) => {
                    log::warn!(
                        "{} FETCH_FAILED endpoint={} offset={} error={}",
                        ctx,
                        list.endpoint,
                        offset,
                        e
                    );
                    records.clear();
                    break Some(e);
                }
            };
        };

        records.truncate(list.hard_cap);

        log::info!(
            "{} FETCH_COMPLETE endpoint={} pages={} records={} ok={}",
            ctx,
            list.endpoint,
            pages,
            records.len(),
            error.is_none()
        );

        FetchOutcome {
            records,
            pages,
            error,
        }
    }

    /// Issue one page request with a current token and classify the
    /// response. `is_retry` marks the single post-refresh attempt.
    fn send_page(&self, endpoint: &str, request: HttpRequest, is_retry: bool) -> FetchState {
        let token = match self.credentials.token(self.transport, self.ctx) {
            Ok(t) => t,
            Err(e) => return FetchState::Failed(e),
        };
        let authed = request.clone().header(AUTH_TOKEN_HEADER, token);

        match self.transport.execute(&authed) {
            Err(e) => FetchState::Failed(DatasourceError::UpstreamRequest {
                endpoint: endpoint.to_string(),
                message: e.message,
            }),
            Ok(resp) if resp.is_unauthorized() && !is_retry => FetchState::Retrying(request),
            Ok(resp) if resp.is_success() => FetchState::Accumulating(resp),
            Ok(resp) => FetchState::Failed(DatasourceError::UpstreamStatus {
                endpoint: endpoint.to_string(),
                status: resp.status,
                body: resp.body,
            }),
        }
    }
}

fn page_url(list: &ListRequest<'_>, limit: usize, offset: usize) -> Result<String> {
    let params = (list.params)(limit, offset);
    Url::parse_with_params(list.url, params.iter())
        .map(String::from)
        .map_err(|e| DatasourceError::Configuration(format!("invalid {} url: {}", list.endpoint, e)))
}

/// Decode a page body: the `response` envelope list, or a bare array when
/// the envelope is absent or empty. Non-object items are skipped;
/// undecodable bodies read as an empty page.
pub fn decode_page(body: &str, ctx: &LogContext) -> Vec<RawRecord> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("{} PAGE_DECODE_FAILED error={}", ctx, e);
            return Vec::new();
        }
    };

    let items = match &value {
        Value::Object(obj) => match obj.get(ENVELOPE_KEY) {
            Some(Value::Array(arr)) => arr.as_slice(),
            _ => &[],
        },
        Value::Array(arr) => arr.as_slice(),
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| item.as_object().cloned())
        .collect()
}
