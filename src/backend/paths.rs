//! Canonicalisation of file paths returned by the backend.
//!
//! Stored paths arrive in several shapes depending on which server build and
//! OS wrote them:
//!
//! ```text
//! uploads\\1712-contract.pdf
//! /uploads//signed/1712-contract.pdf
//! C:\\srv\\docsign\\uploads\\1712-contract.pdf
//! 1712-contract.pdf
//! ```
//!
//! [`canonicalize_file_path`] maps all of them to `uploads/…`:
//!
//! * **Pre:** any string.
//! * **Post:** `None` when no file segment remains; otherwise a relative path
//!   using only `/`, with no empty or `.` segments, whose first segment is the
//!   storage root. Anything before the last occurrence of the root segment
//!   (absolute server directories, drive letters) is dropped.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\\/]+").unwrap());

/// Canonicalise a raw server path against `storage_root` (e.g. `uploads`).
pub fn canonicalize_file_path(raw: &str, storage_root: &str) -> Option<String> {
    let segments: Vec<&str> = RE_SEPARATORS
        .split(raw.trim())
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.is_empty() {
        return None;
    }

    let root = storage_root.trim_matches(|c| c == '/' || c == '\\');
    if root.is_empty() {
        return Some(segments.join("/"));
    }

    let tail = match segments.iter().rposition(|s| *s == root) {
        Some(idx) => &segments[idx + 1..],
        None => &segments[..],
    };
    if tail.is_empty() {
        return None;
    }
    Some(format!("{}/{}", root, tail.join("/")))
}

/// Whether the backend already returned an absolute URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Build the viewer URL for a raw server path.
pub fn file_url(file_base_url: &str, raw: &str, storage_root: &str) -> Option<String> {
    let raw = raw.trim();
    if is_url(raw) {
        return Some(raw.to_string());
    }
    let path = canonicalize_file_path(raw, storage_root)?;
    Some(format!("{}/{}", file_base_url.trim_end_matches('/'), path))
}
