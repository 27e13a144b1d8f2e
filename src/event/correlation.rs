//! Deterministic job correlation ids.
//!
//! Any component that knows a job's type, format, quality, asset and video can
//! recompute the id that tagged the request event, so the id doubles as an
//! idempotency key without a lookup table.

use sha1::{Digest, Sha1};

pub const CORRELATION_PREFIX: &str = "job-";

/// Quality label used for the single rendition this pipeline produces.
pub const DEFAULT_QUALITY: &str = "main";

const DELIMITER: &str = ":";
const DIGEST_BYTES: usize = 8;

/// Derive `job-<16 hex chars>` from the first eight bytes of the SHA-1 of
/// `lower(job_type):lower(format):lower(quality):asset_id:video_id`.
///
/// Ids are case-sensitive; the three enum-like inputs are not.
pub fn build_job_correlation_id(
    job_type: &str,
    format: &str,
    quality: &str,
    asset_id: &str,
    video_id: &str,
) -> String {
    let key = [
        job_type.to_lowercase(),
        format.to_lowercase(),
        quality.to_lowercase(),
        asset_id.to_string(),
        video_id.to_string(),
    ]
    .join(DELIMITER);

    let digest = Sha1::digest(key.as_bytes());
    format!("{}{}", CORRELATION_PREFIX, hex::encode(&digest[..DIGEST_BYTES]))
}
