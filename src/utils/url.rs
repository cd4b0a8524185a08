// src/utils/url.rs

//! Identifier extraction from XenForo URLs.

use std::sync::LazyLock;

use regex::Regex;

static THREAD_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/threads/(?:[^/]*\.)?(\d+)(?:/|$)")
        .unwrap_or_else(|e| panic!("invalid thread regex: {e}"))
});

static POSTS_PATH_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/posts/(\d+)").unwrap_or_else(|e| panic!("invalid posts regex: {e}"))
});

/// Extract the thread id from a thread URL.
///
/// # Examples
/// ```
/// use threadmark_crawler::utils::url::story_id_from_url;
///
/// assert_eq!(
///     story_id_from_url("https://forums.example.com/threads/my-story.12345/reader/"),
///     Some("12345".to_string())
/// );
/// ```
pub fn story_id_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    THREAD_ID
        .captures(parsed.path())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract a post id from a permalink.
///
/// Accepts both `…#post-123` / `…/post-123` and `/posts/123/` forms.
pub fn post_id_from_permalink(permalink: &str) -> Option<String> {
    if let Some(idx) = permalink.rfind("post-") {
        let digits: String = permalink[idx + "post-".len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            return Some(digits);
        }
    }

    POSTS_PATH_ID
        .captures(permalink)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Compare two URLs, ignoring fragments and a trailing slash.
pub fn same_url(a: &str, b: &str) -> bool {
    fn normalize(u: &str) -> String {
        match url::Url::parse(u) {
            Ok(mut parsed) => {
                parsed.set_fragment(None);
                parsed.to_string().trim_end_matches('/').to_string()
            }
            Err(_) => u.trim_end_matches('/').to_string(),
        }
    }
    normalize(a) == normalize(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_id_from_slug_url() {
        assert_eq!(
            story_id_from_url("https://forums.spacebattles.com/threads/worm-v2.0-story.4567/"),
            Some("4567".to_string())
        );
    }

    #[test]
    fn test_story_id_from_bare_url() {
        assert_eq!(
            story_id_from_url("https://forums.example.com/threads/890"),
            Some("890".to_string())
        );
    }

    #[test]
    fn test_story_id_missing() {
        assert_eq!(story_id_from_url("https://forums.example.com/forums/fiction.18/x"), None);
        assert_eq!(story_id_from_url("garbage"), None);
    }

    #[test]
    fn test_post_id_from_fragment() {
        assert_eq!(
            post_id_from_permalink("https://example.com/threads/a.1/page-3#post-98765"),
            Some("98765".to_string())
        );
    }

    #[test]
    fn test_post_id_from_posts_path() {
        assert_eq!(
            post_id_from_permalink("https://example.com/posts/4242/"),
            Some("4242".to_string())
        );
        assert_eq!(post_id_from_permalink("https://example.com/threads/a.1/"), None);
    }

    #[test]
    fn test_same_url() {
        assert!(same_url(
            "https://example.com/threads/a.1/",
            "https://example.com/threads/a.1"
        ));
        assert!(same_url(
            "https://example.com/threads/a.1/#top",
            "https://example.com/threads/a.1/"
        ));
        assert!(!same_url(
            "https://example.com/threads/a.1/",
            "https://example.com/threads/b.1/"
        ));
    }
}
