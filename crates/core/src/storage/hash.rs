//! Content hashing: MD5 and CRC32C-Castagnoli (spec.md §8 property 7, §9
//! "CRC32C polynomial" design note -- the source shipped the wrong
//! polynomial once; this is deliberate).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use md5::{Digest, Md5};

/// Hex-encoded MD5 digest, matching the `X-Goog-Hash` convention used by
/// clients that diff against `md5`.
pub fn md5_hex(bytes: &[u8]) -> String {
    let digest = Md5::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// CRC32C (Castagnoli, `0x1EDC6F41`) over `bytes`, big-endian 4-byte value,
/// base64 encoded (padded). CRC32C is a distinct polynomial from plain
/// CRC32 -- the two must never agree on the same input by construction.
pub fn crc32c_base64(bytes: &[u8]) -> String {
    let checksum = crc32c::crc32c(bytes);
    BASE64.encode(checksum.to_be_bytes())
}

/// The `X-Goog-Hash` header value: `crc32c=<b64>,md5=<b64>`. Per spec.md
/// §4.1 "Download" this header carries base64 MD5 too, not hex, even
/// though the stored row keeps MD5 as hex for easy comparison.
pub fn goog_hash_header(md5_hex_digest: &str, crc32c_b64: &str) -> String {
    let md5_bytes = hex_decode(md5_hex_digest);
    let md5_b64 = BASE64.encode(md5_bytes);
    format!("crc32c={crc32c_b64},md5={md5_b64}")
}

fn hex_decode(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32c_and_crc32_disagree_on_the_same_bytes() {
        let bytes = b"helloworld";
        let c32c = crc32c::crc32c(bytes);
        let c32 = crc32fast::hash(bytes);
        assert_ne!(c32c, c32);
    }

    #[test]
    fn canonical_helloworld_hashes_match_spec_scenario_3() {
        // spec.md §8 scenario 3: "helloworld" -> crc32c=9a71bb4c, md5=fc5e038d38a57032085441e7fe7010b0
        let bytes = b"helloworld";
        assert_eq!(md5_hex(bytes), "fc5e038d38a57032085441e7fe7010b0");
        assert_eq!(crc32c_base64(bytes), "mnG7TA==");
    }
}
