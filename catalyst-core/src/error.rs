//! Error taxonomy for the datasource.
//!
//! Every failure that can abort a query is a [`DatasourceError`]. Errors are
//! attached to the query that produced them; other queries in the same
//! request are unaffected.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatasourceError>;

#[derive(Debug, Error)]
pub enum DatasourceError {
    /// Missing or invalid instance settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No override token and no username/password pair.
    #[error("no username/password provided; cannot obtain token")]
    CredentialsMissing,

    /// Login call failed at the transport level or returned non-2xx.
    #[error("token endpoint error: {0}")]
    AuthEndpoint(String),

    /// Login returned 2xx but carried no token in header or body.
    #[error("token not found in response")]
    TokenNotFound,

    /// List or lookup call failed at the transport level.
    #[error("{endpoint} request failed: {message}")]
    UpstreamRequest { endpoint: String, message: String },

    /// List or lookup call returned a non-2xx status.
    #[error("{endpoint} endpoint returned {status}: {body}")]
    UpstreamStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Site-name lookup failed. Never aborts a query.
    #[error("site enrichment failed: {0}")]
    Enrichment(String),

    /// The panel query JSON could not be decoded.
    #[error("invalid query model: {0}")]
    InvalidQuery(String),

    /// The caller cancelled the request or its deadline passed.
    #[error("query cancelled")]
    Cancelled,
}

impl DatasourceError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DatasourceError::Configuration(_) | DatasourceError::CredentialsMissing
        )
    }

    /// True for the statuses that trigger a credential refresh and retry.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            DatasourceError::UpstreamStatus {
                status: 401 | 403,
                ..
            }
        )
    }
}
