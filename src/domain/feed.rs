use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A subscribed content source. Unread/starred counters are denormalized and
/// kept consistent with the item flags on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub folder_id: i64,
    pub url: String,
    pub name: String,
    pub link: String,
    pub favicon_link: Option<String>,
    pub added: DateTime<Utc>,
    pub unread_count: i64,
    pub starred_count: i64,
    pub ordering: i64,
    pub pinned: bool,
    pub update_error_count: i64,
    pub last_update_error: Option<String>,
}

impl Feed {
    /// Update failures at or beyond this count mark the feed as failed.
    pub const FAILED_UPDATE_COUNT: i64 = 50;

    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self {
            id,
            folder_id: 0,
            url: url.into(),
            name: String::new(),
            link: String::new(),
            favicon_link: None,
            added: Utc::now(),
            unread_count: 0,
            starred_count: 0,
            ordering: 0,
            pinned: false,
            update_error_count: 0,
            last_update_error: None,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }

    pub fn is_considered_failed(&self) -> bool {
        self.update_error_count >= Self::FAILED_UPDATE_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title_falls_back_to_url() {
        let mut feed = Feed::new(1, "https://example.com/feed");
        assert_eq!(feed.display_title(), "https://example.com/feed");
        feed.name = "Example".into();
        assert_eq!(feed.display_title(), "Example");
    }

    #[test]
    fn test_considered_failed() {
        let mut feed = Feed::new(1, "https://example.com/feed");
        assert!(!feed.is_considered_failed());
        feed.update_error_count = 50;
        assert!(feed.is_considered_failed());
    }
}
