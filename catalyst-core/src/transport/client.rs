//! Blocking reqwest transport.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::settings::InstanceSettings;
use crate::error::{DatasourceError, Result};

use super::http::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError, TransportFactory};

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, insecure_skip_verify: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_skip_verify)
            .build()
            .map_err(|e| {
                DatasourceError::Configuration(format!("failed to build http client: {}", e))
            })?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().map_err(|e| TransportError {
            timeout: e.is_timeout(),
            message: e.to_string(),
        })?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = resp.text().map_err(|e| TransportError {
            timeout: e.is_timeout(),
            message: format!("failed to read response body: {}", e),
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Default factory: one reqwest client per instance settings.
#[derive(Debug, Clone)]
pub struct ReqwestTransportFactory {
    pub timeout: Duration,
}

impl TransportFactory for ReqwestTransportFactory {
    fn transport_for(&self, settings: &InstanceSettings) -> Result<Box<dyn HttpTransport>> {
        Ok(Box::new(ReqwestTransport::new(
            self.timeout,
            settings.insecure_skip_verify,
        )?))
    }
}
