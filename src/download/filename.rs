//! Filename sanitization and on-disk layout of a download.
//!
//! A download named `name` in directory `dir` touches three kinds of paths:
//! `dir/name` (final artifact), `dir/name.temp` (merge/stream staging) and
//! `dir/name.part<i>` (one per range).

use std::path::{Component, Path, PathBuf};

use tracing::debug;
use url::Url;

use super::constants::FALLBACK_FILENAME;

/// Replaces filesystem-unsafe characters with `_`.
///
/// Dot-only names (`.`, `..`) are rewritten so the result always stays a
/// single segment under the output directory.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return FALLBACK_FILENAME.to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Derives the output filename from the last path segment of `url`.
///
/// The query string never contributes; percent-encoding is decoded before
/// sanitizing. Falls back to `downloaded_file`.
#[must_use]
pub fn filename_from_url(url: &Url) -> String {
    let Some(last) = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
    else {
        return FALLBACK_FILENAME.to_string();
    };

    let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
        debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
        last.into()
    });
    sanitize_filename(&decoded)
}

/// Path of the final artifact.
#[must_use]
pub fn final_path(dir: &Path, filename: &str) -> PathBuf {
    dir.join(filename)
}

/// Path of the staging file used by merge and single-stream transfers.
#[must_use]
pub fn temp_path(dir: &Path, filename: &str) -> PathBuf {
    dir.join(format!("{filename}.temp"))
}

/// Path of the part file for range `index`.
#[must_use]
pub fn part_path(dir: &Path, filename: &str, index: usize) -> PathBuf {
    dir.join(format!("{filename}.part{index}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_sanitize_filename_removes_invalid_chars() {
        assert_eq!(sanitize_filename("file:name.iso"), "file_name.iso");
        assert_eq!(sanitize_filename("a*b?c\"d<e>f|g"), "a_b_c_d_e_f_g");
        assert_eq!(sanitize_filename("tab\there"), "tab_here");
    }

    #[test]
    fn test_sanitize_filename_rewrites_dot_segments() {
        assert_eq!(sanitize_filename(".."), "__");
        assert_eq!(sanitize_filename("."), "_");
    }

    #[test]
    fn test_sanitize_filename_empty_falls_back() {
        assert_eq!(sanitize_filename(""), FALLBACK_FILENAME);
    }

    #[test]
    fn test_filename_from_url_uses_last_segment_without_query() {
        let name = filename_from_url(&url("https://example.com/isos/debian-12.iso?token=abc"));
        assert_eq!(name, "debian-12.iso");
    }

    #[test]
    fn test_filename_from_url_decodes_and_sanitizes() {
        let name = filename_from_url(&url("https://example.com/a%3Ab%20c.zip"));
        assert_eq!(name, "a_b c.zip");
    }

    #[test]
    fn test_filename_from_url_encoded_slash_stays_one_segment() {
        let name = filename_from_url(&url("https://example.com/dir%2F..%2Fescape.bin"));
        assert!(!name.contains('/'), "Unexpected separator in: {name}");
    }

    #[test]
    fn test_filename_from_url_trailing_slash_falls_back() {
        assert_eq!(
            filename_from_url(&url("https://example.com/downloads/")),
            FALLBACK_FILENAME
        );
        assert_eq!(filename_from_url(&url("https://example.com")), FALLBACK_FILENAME);
    }

    #[test]
    fn test_layout_paths() {
        let dir = Path::new("/data/downloads");
        assert_eq!(final_path(dir, "a.bin"), PathBuf::from("/data/downloads/a.bin"));
        assert_eq!(
            temp_path(dir, "a.bin"),
            PathBuf::from("/data/downloads/a.bin.temp")
        );
        assert_eq!(
            part_path(dir, "a.bin", 3),
            PathBuf::from("/data/downloads/a.bin.part3")
        );
    }
}
