//! CORS rule evaluation (SPEC_FULL.md §4.1 supplement). Bucket CORS rules
//! are stored as opaque JSON (spec.md §4.1); since this core terminates
//! real HTTP, this module evaluates them against a request's `Origin` and
//! `Access-Control-Request-Method` and produces the response headers to set.

use crate::kv::CorsRule;

pub struct CorsDecision {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
    pub max_age: Option<u32>,
}

/// Finds the first CORS rule on the bucket matching `origin` and `method`,
/// and produces the headers to attach to the response. Returns `None` when
/// no rule matches (caller should not add CORS headers, not fail the
/// request -- bucket CORS rules only affect the *response shape* of an
/// already-authorized call, never the `storage#` JSON body).
pub fn apply(rules: &[CorsRule], origin: &str, method: &str) -> Option<CorsDecision> {
    let rule = rules.iter().find(|r| {
        let origin_ok = r.origin.iter().any(|o| o == "*" || o == origin);
        let method_ok = r.method.iter().any(|m| m.eq_ignore_ascii_case(method));
        origin_ok && method_ok
    })?;

    Some(CorsDecision {
        allow_origin: origin.to_string(),
        allow_methods: rule.method.join(", "),
        allow_headers: rule.response_header.join(", "),
        max_age: rule.max_age_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> CorsRule {
        CorsRule {
            origin: vec!["https://example.com".to_string()],
            method: vec!["GET".to_string(), "PUT".to_string()],
            response_header: vec!["Content-Type".to_string()],
            max_age_seconds: Some(3600),
        }
    }

    #[test]
    fn matches_origin_and_method() {
        let decision = apply(&[rule()], "https://example.com", "GET").unwrap();
        assert_eq!(decision.allow_origin, "https://example.com");
        assert_eq!(decision.max_age, Some(3600));
    }

    #[test]
    fn wildcard_origin_matches_any() {
        let mut r = rule();
        r.origin = vec!["*".to_string()];
        let decision = apply(&[r], "https://anything.example", "PUT").unwrap();
        assert_eq!(decision.allow_origin, "https://anything.example");
    }

    #[test]
    fn non_matching_method_returns_none() {
        assert!(apply(&[rule()], "https://example.com", "DELETE").is_none());
    }
}
