//! Token expiry detection.
//!
//! The login endpoint may announce the token lifetime in several ways.
//! Headers are checked first, in this order: relative seconds, absolute
//! epoch seconds, `Cache-Control: max-age`, `Expires`. When the token came
//! from the JSON body, conventional body fields are checked afterwards.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::extraction::json_path::{value_to_i64, value_to_string};
use crate::transport::http::HttpResponse;

pub const EXPIRES_IN_HEADERS: &[&str] = &["X-Auth-Token-Expires-In", "X-Token-Expires-In"];
pub const EXPIRY_EPOCH_HEADERS: &[&str] = &["X-Auth-Token-Expiry", "X-Token-Expiry"];

/// Absolute timestamps closer than this to "now" are not trusted.
pub const EXPIRY_PLAUSIBILITY_SECS: i64 = 60;

lazy_static! {
    static ref MAX_AGE_PATTERN: Regex = Regex::new(r"(?i)^max-age\s*=\s*(\d+)$").unwrap();
}

/// Derive an absolute expiry from response headers.
pub fn parse_expiry_from_headers(resp: &HttpResponse, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    for name in EXPIRES_IN_HEADERS {
        if let Some(secs) = resp.header(name).and_then(|v| v.trim().parse::<i64>().ok()) {
            if secs > 0 {
                return Some(now + Duration::seconds(secs));
            }
        }
    }

    for name in EXPIRY_EPOCH_HEADERS {
        if let Some(epoch) = resp.header(name).and_then(|v| v.trim().parse::<i64>().ok()) {
            if epoch > now.timestamp() {
                if let Some(at) = epoch_seconds(epoch) {
                    return Some(at);
                }
            }
        }
    }

    if let Some(secs) = resp.header("Cache-Control").and_then(parse_max_age) {
        if secs > 0 {
            return Some(now + Duration::seconds(secs));
        }
    }

    if let Some(at) = resp.header("Expires").and_then(|v| parse_http_date(v.trim())) {
        if at > now {
            return Some(at);
        }
    }

    None
}

/// Extract `max-age` seconds from a Cache-Control value.
pub fn parse_max_age(cache_control: &str) -> Option<i64> {
    cache_control.split(',').find_map(|directive| {
        MAX_AGE_PATTERN
            .captures(directive.trim())
            .and_then(|c| c[1].parse::<i64>().ok())
    })
}

/// Parse the HTTP-date layouts seen in the wild: RFC 1123 (with zone name
/// or numeric offset), RFC 850 and asctime.
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

fn epoch_seconds(epoch: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(epoch, 0).single()
}

/// Derive an absolute expiry from a decoded login body.
///
/// Relative fields (`expiresIn`, `expires_in`) win over absolute ones
/// (`expiresAt`, `expiry`). `expiration` is ambiguous: values beyond now are
/// treated as epoch seconds, smaller ones as relative seconds.
pub fn derive_expiry_from_json(body: &Value, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let num = |key: &str| body.get(key).map(value_to_i64).unwrap_or(0);
    let floor = now.timestamp() + EXPIRY_PLAUSIBILITY_SECS;

    for key in ["expiresIn", "expires_in"] {
        let secs = num(key);
        if secs > 0 {
            return Some(now + Duration::seconds(secs));
        }
    }

    for key in ["expiresAt", "expiry"] {
        let epoch = num(key);
        if epoch > floor {
            if let Some(at) = epoch_seconds(epoch) {
                return Some(at);
            }
        }
    }

    let expiration = num("expiration");
    if expiration > 0 {
        if expiration > floor {
            return epoch_seconds(expiration);
        }
        return Some(now + Duration::seconds(expiration));
    }

    let expire_time = body.get("expireTime").map(value_to_string).unwrap_or_default();
    let expire_time = expire_time.trim();
    if !expire_time.is_empty() {
        let parsed = DateTime::parse_from_rfc3339(expire_time)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| parse_http_date(expire_time));
        if let Some(at) = parsed {
            if at > now + Duration::seconds(EXPIRY_PLAUSIBILITY_SECS) {
                return Some(at);
            }
        }
    }

    None
}
