//! Object key generation.
//!
//! Keys combine a millisecond timestamp with a random alphanumeric suffix.
//! The random part is mandatory: two generations can complete within the
//! same millisecond.

use rand::Rng;

/// Directory prefix for generated media.
pub const GENERATED_PREFIX: &str = "generated";

/// Directory prefix for generated cover images.
pub const THUMBNAIL_PREFIX: &str = "thumbnails";

/// Length of the random suffix.
const SUFFIX_LEN: usize = 10;

/// File extension for a content type, defaulting to `bin`.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/ogg" => "ogg",
        "audio/flac" => "flac",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        _ => "bin",
    }
}

/// Build a fresh object key, e.g.
/// `generated/music_1767225600000_k3j9x0qa7b.mp3`.
pub fn generate_object_key(prefix: &str, stem: &str, content_type: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!(
        "{prefix}/{stem}_{}_{suffix}.{}",
        chrono::Utc::now().timestamp_millis(),
        extension_for(content_type),
    )
}
