//! Process-wide tunables.
//!
//! Loaded once at startup from environment variables. Invalid values fall
//! back to the defaults with a warning.

use std::time::Duration;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const MAX_HTTP_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_ISSUES_PAGE_SIZE: usize = 25;
pub const DEFAULT_SITE_HEALTH_PAGE_SIZE: usize = 25;
pub const DEFAULT_ROW_LIMIT: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourceOptions {
    pub http_timeout: Duration,
    pub issues_page_size: usize,
    pub site_health_page_size: usize,
    /// Row cap applied when a query carries no positive `limit`.
    pub default_row_limit: usize,
}

impl Default for DatasourceOptions {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            issues_page_size: DEFAULT_ISSUES_PAGE_SIZE,
            site_health_page_size: DEFAULT_SITE_HEALTH_PAGE_SIZE,
            default_row_limit: DEFAULT_ROW_LIMIT,
        }
    }
}

impl DatasourceOptions {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build options from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let timeout_secs = read_bounded(
            &lookup,
            "CATALYST_HTTP_TIMEOUT_SECS",
            1,
            MAX_HTTP_TIMEOUT_SECS,
            DEFAULT_HTTP_TIMEOUT_SECS,
        );

        Self {
            http_timeout: Duration::from_secs(timeout_secs),
            issues_page_size: read_bounded(
                &lookup,
                "CATALYST_ISSUES_PAGE_SIZE",
                1,
                1000,
                defaults.issues_page_size as u64,
            ) as usize,
            site_health_page_size: read_bounded(
                &lookup,
                "CATALYST_SITE_HEALTH_PAGE_SIZE",
                1,
                50,
                defaults.site_health_page_size as u64,
            ) as usize,
            default_row_limit: read_bounded(
                &lookup,
                "CATALYST_DEFAULT_ROW_LIMIT",
                1,
                u32::MAX as u64,
                defaults.default_row_limit as u64,
            ) as usize,
        }
    }
}

fn read_bounded<F>(lookup: &F, key: &str, min: u64, max: u64, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(v) if (min..=max).contains(&v) => v,
        _ => {
            log::warn!(
                "OPTION_INVALID key={} value={:?} default={}",
                key,
                raw,
                default
            );
            default
        }
    }
}
