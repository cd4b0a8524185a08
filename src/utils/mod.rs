//! Utility functions and helpers.

pub mod http;
pub mod url;

use std::sync::LazyLock;

use ::url::Url;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

/// Lowercase hex SHA-256 of a string.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

// Win32 reserved characters plus ASCII control characters; runs of them,
// and trailing dots, collapse to a single underscore.
static INVALID_PATH_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\x00-\x1f"<>|:*?\\/]*\.+$)|([\x00-\x1f"<>|:*?\\/]+)"#)
        .unwrap_or_else(|e| panic!("invalid path regex: {e}"))
});

/// Make a string safe to use as a file name on every platform.
pub fn to_valid_path(name: &str) -> String {
    INVALID_PATH_CHARS.replace_all(name, "_").into_owned()
}
