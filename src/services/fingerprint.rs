//! Content fingerprints and the trailing marker that embeds them in
//! translated files.
//!
//! A translated target ends with
//!
//! ```text
//! {/* Auto generated, origin file hash:<md5 hex> */}
//! ```
//!
//! The marker is read back on the next run, so its format must not change.

use std::sync::LazyLock;

use md5::{Digest, Md5};
use regex::Regex;

const MARKER_PREFIX: &str = "{/* Auto generated, origin file hash:";
const MARKER_SUFFIX: &str = " */}";

/// Marker must be the last thing in the file; trailing whitespace is tolerated.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{/\* Auto generated, origin file hash:\s*([0-9A-Fa-f]+)\s*\*/\}\s*\z").unwrap()
});

/// Hex MD5 of the raw source bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Append the marker to a translated body, on its own line.
pub fn append_marker(body: &str, hash: &str) -> String {
    let mut out = String::with_capacity(body.len() + MARKER_PREFIX.len() + hash.len() + 8);
    out.push_str(body);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(MARKER_PREFIX);
    out.push_str(hash);
    out.push_str(MARKER_SUFFIX);
    out
}

/// Hash embedded at the tail of `content`, if any. A marker anywhere but the
/// end is ignored.
pub fn extract_marker(content: &str) -> Option<&str> {
    MARKER_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Same as [`extract_marker`] on possibly non-UTF-8 bytes. Only the tail can
/// hold a marker, so a lossy decode is enough.
pub fn extract_marker_bytes(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    extract_marker(&text).map(str::to_lowercase)
}
