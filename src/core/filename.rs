//! Filename Policy (C6): sanitization, unicode normalization, and
//! size-based dedup renaming.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use deunicode::deunicode;
use unicode_normalization::UnicodeNormalization;

const HOSTILE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\0'];

/// Size tags understood by the provider; the video companion of a live
/// photo uses the same tag with a `Video` suffix (`originalVideo`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeTag {
    Original,
    Medium,
    Thumb,
    Adjusted,
    Alternative,
    OriginalVideo,
    MediumVideo,
}

impl SizeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeTag::Original => "original",
            SizeTag::Medium => "medium",
            SizeTag::Thumb => "thumb",
            SizeTag::Adjusted => "adjusted",
            SizeTag::Alternative => "alternative",
            SizeTag::OriginalVideo => "originalVideo",
            SizeTag::MediumVideo => "mediumVideo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "original" => Some(SizeTag::Original),
            "medium" => Some(SizeTag::Medium),
            "thumb" => Some(SizeTag::Thumb),
            "adjusted" => Some(SizeTag::Adjusted),
            "alternative" => Some(SizeTag::Alternative),
            "originalVideo" => Some(SizeTag::OriginalVideo),
            "mediumVideo" => Some(SizeTag::MediumVideo),
            _ => None,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, SizeTag::OriginalVideo | SizeTag::MediumVideo)
    }
}

/// Options governing how raw provider filenames are turned into local paths.
#[derive(Debug, Clone, Default)]
pub struct FilenamePolicyOptions {
    pub keep_unicode_in_filenames: bool,
}

/// A raw provider filename is base64 transport-encoded when its length is a
/// multiple of 4, it uses only base64-alphabet characters, and it carries
/// no recognizable extension (a real filename with a dot would fail the
/// alphabet check on the `.`).
fn looks_base64_encoded(raw: &str) -> bool {
    if raw.is_empty() || raw.len() % 4 != 0 {
        return false;
    }
    raw.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

fn decode_if_base64(raw: &str) -> String {
    if looks_base64_encoded(raw) {
        if let Ok(decoded) = BASE64_STANDARD.decode(raw) {
            if let Ok(decoded_str) = String::from_utf8(decoded) {
                return decoded_str;
            }
        }
    }
    raw.to_string()
}

/// Strips a trailing `-original` or `-<digits>` suffix a prior run's dedup
/// step may have added, so repeated policy application is idempotent.
fn strip_dedup_suffix(stem: &str) -> String {
    if let Some(base) = stem.strip_suffix("-original") {
        return base.to_string();
    }
    if let Some(dash) = stem.rfind('-') {
        let (base, suffix) = stem.split_at(dash);
        if suffix[1..].chars().all(|c| c.is_ascii_digit()) && suffix.len() > 1 {
            return base.to_string();
        }
    }
    stem.to_string()
}

fn sanitize_component(s: &str) -> String {
    s.chars().map(|c| if HOSTILE_CHARS.contains(&c) { '_' } else { c }).collect()
}

/// Applies the per-size extension convention: the video companion of a
/// live photo is always `.MOV`; DNG raw keeps `.DNG`; everything else keeps
/// its source extension.
pub fn extension_for_size(original_extension: &str, size: SizeTag) -> String {
    if size.is_video() {
        return "MOV".to_string();
    }
    original_extension.to_string()
}

/// Produces the sanitized, normalized filename (without directory) for an
/// asset version. `raw_filename` is the provider-supplied name as received
/// (possibly base64-encoded, possibly non-ASCII); `extension` is the target
/// extension already resolved via [`extension_for_size`].
pub fn policy_filename(raw_filename: &str, extension: &str, options: &FilenamePolicyOptions) -> String {
    let decoded = decode_if_base64(raw_filename);

    let stem = match decoded.rsplit_once('.') {
        Some((stem, _ext)) => stem.to_string(),
        None => decoded.clone(),
    };
    let stem = strip_dedup_suffix(&stem);

    let normalized: String = stem.nfc().collect();
    let normalized = if options.keep_unicode_in_filenames {
        normalized
    } else {
        deunicode(&normalized)
    };

    let sanitized = sanitize_component(&normalized);

    format!("{sanitized}.{extension}")
}

/// Given an existing target path and a new size-bytes value that doesn't
/// match what's on disk, produces the deduplicated sibling path
/// `<stem>-<size>.<ext>`.
pub fn dedup_filename(filename: &str, size_bytes: u64) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{size_bytes}.{ext}"),
        None => format!("{filename}-{size_bytes}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_filename_passes_through() {
        let opts = FilenamePolicyOptions::default();
        assert_eq!(policy_filename("IMG_7409", "JPG", &opts), "IMG_7409.JPG");
    }

    #[test]
    fn hostile_characters_are_replaced() {
        let opts = FilenamePolicyOptions::default();
        assert_eq!(policy_filename("a/b:c", "JPG", &opts), "a_b_c.JPG");
    }

    #[test]
    fn unicode_is_transliterated_by_default() {
        let opts = FilenamePolicyOptions::default();
        let result = policy_filename("café", "JPG", &opts);
        assert!(result.is_ascii());
    }

    #[test]
    fn unicode_is_preserved_when_requested() {
        let opts = FilenamePolicyOptions {
            keep_unicode_in_filenames: true,
        };
        assert_eq!(policy_filename("café", "JPG", &opts), "café.JPG");
    }

    #[test]
    fn dedup_suffix_is_stripped_before_reapplying() {
        let opts = FilenamePolicyOptions::default();
        assert_eq!(policy_filename("IMG_7409-1884695", "JPG", &opts), "IMG_7409.JPG");
    }

    #[test]
    fn dedup_filename_inserts_size() {
        assert_eq!(dedup_filename("IMG_7409.JPG", 1884695), "IMG_7409-1884695.JPG");
    }

    #[test]
    fn video_companion_uses_mov_extension() {
        assert_eq!(extension_for_size("MOV", SizeTag::OriginalVideo), "MOV");
        assert_eq!(extension_for_size("MOV", SizeTag::MediumVideo), "MOV");
    }
}
