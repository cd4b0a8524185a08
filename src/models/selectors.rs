// src/models/selectors.rs

//! CSS selectors for scraping XenForo threadmark pages.

use serde::{Deserialize, Serialize};

/// CSS selectors for the thread page, reader pages and messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ThreadmarkSelectors {
    /// Thread title on the story page
    pub title: String,

    /// Thread starter on the story page
    pub author: String,

    /// Thread-level icon image
    pub thread_icon: String,

    /// Avatar of the thread starter
    pub author_avatar: String,

    /// Links or elements naming a threadmark category
    pub category_link: String,

    /// One message on a reader page
    pub message: String,

    /// Threadmark label inside a message
    pub threadmark_label: String,

    /// Permalink anchor inside a message
    pub permalink: String,

    /// Author name inside a message (fallback for `data-author`)
    pub message_author: String,

    /// Posting time inside a message
    pub posted_at: String,

    /// Last edit time inside a message
    pub updated_at: String,

    /// Message body
    pub body: String,

    /// "Next page" link on a reader page
    pub next_page: String,
}

impl Default for ThreadmarkSelectors {
    fn default() -> Self {
        Self {
            title: "h1.p-title-value".to_string(),
            author: ".p-description .username, .username.u-concealed".to_string(),
            thread_icon: ".p-title .threadIcon img, img.threadIcon".to_string(),
            author_avatar: ".message-avatar img.avatar, .message-avatar img".to_string(),
            category_link: "a[href*=\"threadmark_category\"], [data-threadmark-category]"
                .to_string(),
            message: "article.message".to_string(),
            threadmark_label: ".threadmarkLabel".to_string(),
            permalink: ".message-attribution-main a[href*=\"post-\"], .message-attribution-gadget a[href*=\"post-\"]"
                .to_string(),
            message_author: ".message-name .username, .username".to_string(),
            posted_at: ".message-attribution-main time.u-dt, .message-attribution time".to_string(),
            updated_at: ".message-lastEdit time".to_string(),
            body: ".message-body .bbWrapper, .bbWrapper".to_string(),
            next_page: "a.pageNav-jump--next".to_string(),
        }
    }
}

impl ThreadmarkSelectors {
    /// All selector strings with their field names, for validation.
    pub fn entries(&self) -> [(&'static str, &str); 13] {
        [
            ("title", &self.title),
            ("author", &self.author),
            ("thread_icon", &self.thread_icon),
            ("author_avatar", &self.author_avatar),
            ("category_link", &self.category_link),
            ("message", &self.message),
            ("threadmark_label", &self.threadmark_label),
            ("permalink", &self.permalink),
            ("message_author", &self.message_author),
            ("posted_at", &self.posted_at),
            ("updated_at", &self.updated_at),
            ("body", &self.body),
            ("next_page", &self.next_page),
        ]
    }
}
