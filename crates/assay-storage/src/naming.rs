//! Stored-name and output-name generation.
//!
//! Upload ids are `<unix-millis>-<random below 1e9>`. The random part keeps
//! ids unique when several uploads land in the same millisecond.

use assay_core::constants::{OUTPUT_SUFFIX, UPLOAD_FIELD_NAME};
use rand::Rng;

/// Longest extension carried over from the client's filename.
const MAX_EXTENSION_LENGTH: usize = 16;

/// Generate a fresh upload id.
pub fn generate_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);
    format!("{}-{}", millis, suffix)
}

/// Reduce a multipart field name to ASCII alphanumerics and `_`.
pub fn sanitize_field_name(field_name: &str) -> String {
    let cleaned: String = field_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(32)
        .collect();
    if cleaned.is_empty() {
        UPLOAD_FIELD_NAME.to_string()
    } else {
        cleaned
    }
}

/// Extension of the client's filename, including the dot, case preserved.
/// Dropped unless short ASCII alphanumeric.
pub fn safe_extension(original_name: &str) -> Option<String> {
    let (stem, ext) = original_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXTENSION_LENGTH {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", ext))
}

/// `<field>-<id><ext>`
pub fn stored_name(field_name: &str, id: &str, original_name: &str) -> String {
    format!(
        "{}-{}{}",
        sanitize_field_name(field_name),
        id,
        safe_extension(original_name).unwrap_or_default()
    )
}

/// Job id for a stored filename: the name without its extension.
pub fn job_id(stored_name: &str) -> &str {
    match stored_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => stored_name,
    }
}

/// `<job_id>-output.<ext>`
pub fn output_name(job_id: &str, extension: &str) -> String {
    format!("{}{}.{}", job_id, OUTPUT_SUFFIX, extension)
}
