//! Centralized, pure-function validators (spec.md §4.9). Every validator
//! returns `Result<(), ApiError::Invalid>` (or a parsed value) and never
//! touches the KV store — uniqueness checks live with their owning module.

use crate::error::ApiError;

/// Bucket name: 3-63 chars, lowercase alphanumerics/dashes/dots, must not
/// start or end with `-` or `.`.
pub fn validate_bucket_name(name: &str) -> Result<(), ApiError> {
    let len = name.chars().count();
    if !(3..=63).contains(&len) {
        return Err(ApiError::Invalid(format!(
            "bucket name '{name}' must be 3-63 characters"
        )));
    }
    let ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let edges_ok = !name.starts_with(['-', '.']) && !name.ends_with(['-', '.']);
    if !ok || !edges_ok {
        return Err(ApiError::Invalid(format!(
            "bucket name '{name}' contains invalid characters or edges"
        )));
    }
    Ok(())
}

/// Object name: path-safety plus length <= 1024. `/` is allowed (it is how
/// clients express "directories"); `..`, leading `/`, and backslashes are not.
pub fn validate_object_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.chars().count() > 1024 {
        return Err(ApiError::Invalid("object name length must be 1-1024".into()));
    }
    if name.starts_with('/') || name.contains('\\') || name.split('/').any(|seg| seg == "..") {
        return Err(ApiError::Invalid(format!(
            "object name '{name}' is not path-safe"
        )));
    }
    Ok(())
}

/// Instance/network/firewall resource name: `[a-z]([a-z0-9-]*[a-z0-9])?`, 1-63 chars.
pub fn validate_resource_name(name: &str) -> Result<(), ApiError> {
    let len = name.chars().count();
    if !(1..=63).contains(&len) {
        return Err(ApiError::Invalid(format!(
            "name '{name}' must be 1-63 characters"
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !first.is_ascii_lowercase() {
        return Err(ApiError::Invalid(format!(
            "name '{name}' must start with a lowercase letter"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(ApiError::Invalid(format!(
            "name '{name}' may only contain lowercase letters, digits, and dashes"
        )));
    }
    if name.ends_with('-') {
        return Err(ApiError::Invalid(format!("name '{name}' must not end with '-'")));
    }
    Ok(())
}

/// Zone format `<region>-<letter>`, e.g. `us-central1-a`.
pub fn validate_zone(zone: &str) -> Result<(), ApiError> {
    match zone.rsplit_once('-') {
        Some((region, suffix))
            if !region.is_empty()
                && suffix.len() == 1
                && suffix.chars().all(|c| c.is_ascii_lowercase()) =>
        {
            Ok(())
        }
        _ => Err(ApiError::Invalid(format!("zone '{zone}' is not a valid zone format"))),
    }
}

/// Service-account `accountId`: `[a-z][a-z0-9-]{4,28}[a-z0-9]` (6-30 chars total).
pub fn validate_service_account_id(id: &str) -> Result<(), ApiError> {
    let chars: Vec<char> = id.chars().collect();
    let n = chars.len();
    if !(6..=30).contains(&n) {
        return Err(ApiError::Invalid(format!(
            "accountId '{id}' must be 6-30 characters"
        )));
    }
    if !chars[0].is_ascii_lowercase() {
        return Err(ApiError::Invalid(format!(
            "accountId '{id}' must start with a lowercase letter"
        )));
    }
    if !chars[n - 1].is_ascii_lowercase() && !chars[n - 1].is_ascii_digit() {
        return Err(ApiError::Invalid(format!(
            "accountId '{id}' must end with a lowercase letter or digit"
        )));
    }
    if !chars[1..n - 1]
        .iter()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
    {
        return Err(ApiError::Invalid(format!(
            "accountId '{id}' contains invalid characters"
        )));
    }
    Ok(())
}

/// CIDR validator for subnets: prefix length restricted to `/8..29`.
pub fn validate_subnet_cidr(cidr: &str) -> Result<(), ApiError> {
    validate_cidr(cidr, 8, 29)
}

/// CIDR validator for firewall source/destination ranges: any prefix `/0..32`.
pub fn validate_firewall_cidr(cidr: &str) -> Result<(), ApiError> {
    validate_cidr(cidr, 0, 32)
}

fn validate_cidr(cidr: &str, min_prefix: u8, max_prefix: u8) -> Result<(), ApiError> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| ApiError::Invalid(format!("'{cidr}' is not a CIDR block")))?;
    let octets: Vec<&str> = addr.split('.').collect();
    if octets.len() != 4 || !octets.iter().all(|o| o.parse::<u8>().is_ok()) {
        return Err(ApiError::Invalid(format!("'{cidr}' has an invalid IPv4 address")));
    }
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| ApiError::Invalid(format!("'{cidr}' has a non-numeric prefix length")))?;
    if prefix < min_prefix || prefix > max_prefix {
        return Err(ApiError::Invalid(format!(
            "'{cidr}' prefix length must be between /{min_prefix} and /{max_prefix}"
        )));
    }
    Ok(())
}

/// A precondition integer (`ifGenerationMatch` etc.) must be non-negative.
pub fn validate_precondition_int(raw: &str, field: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|v| *v >= 0)
        .ok_or_else(|| ApiError::Invalid(format!("{field} must be a non-negative integer")))
}

/// Parsed `Content-Range: bytes <start>-<end>/<total|*>` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: Option<u64>,
}

/// Parses a resumable-upload `Content-Range` header, including the
/// empty-body status-query form `bytes */<total>`.
pub fn parse_content_range(raw: &str) -> Result<Option<ContentRange>, ApiError> {
    let rest = raw
        .strip_prefix("bytes ")
        .ok_or_else(|| ApiError::Invalid(format!("'{raw}' is not a valid Content-Range")))?;
    let (range, total_raw) = rest
        .split_once('/')
        .ok_or_else(|| ApiError::Invalid(format!("'{raw}' is missing a total length")))?;
    let total = if total_raw == "*" {
        None
    } else {
        Some(
            total_raw
                .parse::<u64>()
                .map_err(|_| ApiError::Invalid(format!("'{raw}' has a non-numeric total")))?,
        )
    };

    if range == "*" {
        // Status-query form carries no byte range, only the total.
        return Ok(None);
    }

    let (start_raw, end_raw) = range
        .split_once('-')
        .ok_or_else(|| ApiError::Invalid(format!("'{raw}' is missing a byte range")))?;
    let start = start_raw
        .parse::<u64>()
        .map_err(|_| ApiError::Invalid(format!("'{raw}' has a non-numeric range start")))?;
    let end = end_raw
        .parse::<u64>()
        .map_err(|_| ApiError::Invalid(format!("'{raw}' has a non-numeric range end")))?;
    if end < start {
        return Err(ApiError::Invalid(format!("'{raw}' has end before start")));
    }
    Ok(Some(ContentRange { start, end, total }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_names_reject_bad_edges_and_accept_good_ones() {
        assert!(validate_bucket_name("my-bucket.example").is_ok());
        assert!(validate_bucket_name("-bad").is_err());
        assert!(validate_bucket_name("bad-").is_err());
        assert!(validate_bucket_name("ab").is_err());
    }

    #[test]
    fn object_names_allow_slashes_reject_traversal() {
        assert!(validate_object_name("a/b/c.txt").is_ok());
        assert!(validate_object_name("../etc/passwd").is_err());
        assert!(validate_object_name("/abs").is_err());
        assert!(validate_object_name("a\\b").is_err());
    }

    #[test]
    fn zone_format_requires_trailing_letter() {
        assert!(validate_zone("us-central1-a").is_ok());
        assert!(validate_zone("us-central1").is_err());
        assert!(validate_zone("us-central1-ab").is_err());
    }

    #[test]
    fn subnet_cidr_rejects_out_of_range_prefix() {
        assert!(validate_subnet_cidr("10.0.0.0/24").is_ok());
        assert!(validate_subnet_cidr("10.0.0.0/30").is_err());
        assert!(validate_firewall_cidr("0.0.0.0/0").is_ok());
    }

    #[test]
    fn content_range_parses_chunk_and_status_query_forms() {
        let chunk = parse_content_range("bytes 0-4/10").unwrap().unwrap();
        assert_eq!(chunk, ContentRange { start: 0, end: 4, total: Some(10) });

        assert!(parse_content_range("bytes */10").unwrap().is_none());

        let open = parse_content_range("bytes 0-4/*").unwrap().unwrap();
        assert_eq!(open.total, None);
    }
}
