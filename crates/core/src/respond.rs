//! Response shaping helpers shared across domain routers: timestamps,
//! list envelopes, and `selfLink` construction (spec.md §4.8, §6).

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Formats an instant as `%Y-%m-%dT%H:%M:%S.%3fZ`, matching spec.md §4.8
/// exactly (millisecond precision, always UTC, always `Z`-suffixed).
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// A `{kind, items}` list envelope, used by every list endpoint.
#[derive(Serialize)]
pub struct ListEnvelope<T: Serialize> {
    pub kind: &'static str,
    pub items: Vec<T>,
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl<T: Serialize> ListEnvelope<T> {
    pub fn new(kind: &'static str, items: Vec<T>) -> Self {
        Self { kind, items, next_page_token: None }
    }

    pub fn with_page_token(mut self, token: Option<String>) -> Self {
        self.next_page_token = token;
        self
    }
}

/// Builds the absolute `selfLink` the real provider would issue, so clients
/// that round-trip `selfLink` keep working.
pub fn self_link(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_timestamp_has_millisecond_precision_and_z_suffix() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(instant), "2026-01-02T03:04:05.000Z");
    }

    #[test]
    fn self_link_joins_without_double_slash() {
        assert_eq!(
            self_link("http://localhost:8080/", "/storage/v1/b/x"),
            "http://localhost:8080/storage/v1/b/x"
        );
    }
}
