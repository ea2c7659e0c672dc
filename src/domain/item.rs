use serde::{Deserialize, Serialize};

/// A single article within a feed.
///
/// `unread_changed`/`starred_changed` mirror the outbox: they are set while a
/// local flag mutation is waiting to be uploaded and cleared only once the
/// server has acknowledged the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub guid: String,
    pub guid_hash: String,
    pub url: Option<String>,
    pub title: String,
    pub author: Option<String>,
    /// Publication time, epoch seconds.
    pub pub_date: i64,
    pub updated_at: Option<i64>,
    pub body: String,
    pub enclosure_mime: Option<String>,
    pub enclosure_link: Option<String>,
    pub feed_id: i64,
    pub unread: bool,
    pub unread_changed: bool,
    pub starred: bool,
    pub starred_changed: bool,
    /// Server-side modification time, epoch seconds. Drives delta sync.
    pub last_modified: i64,
    /// Content fingerprint for deduplication across feeds.
    pub fingerprint: Option<String>,
    /// Server content hash, the merge key for reduced payloads.
    pub content_hash: Option<String>,
    /// Whether the item belongs to the current pager snapshot.
    pub active: bool,
}

impl Item {
    pub fn new(id: i64, feed_id: i64) -> Self {
        Self {
            id,
            guid: String::new(),
            guid_hash: String::new(),
            url: None,
            title: String::new(),
            author: None,
            pub_date: 0,
            updated_at: None,
            body: String::new(),
            enclosure_mime: None,
            enclosure_link: None,
            feed_id,
            unread: true,
            unread_changed: false,
            starred: false,
            starred_changed: false,
            last_modified: 0,
            fingerprint: None,
            content_hash: None,
            active: false,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }
}

/// A partial server payload carrying only id, content hash and flags, sent by
/// API v2 to save bandwidth on subsequent syncs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducedItem {
    pub id: i64,
    pub content_hash: Option<String>,
    pub unread: Option<bool>,
    pub starred: Option<bool>,
}

/// The four outbound state changes a client can queue for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkAction {
    MarkRead,
    MarkUnread,
    MarkStarred,
    MarkUnstarred,
}

impl MarkAction {
    pub const ALL: [MarkAction; 4] = [
        MarkAction::MarkRead,
        MarkAction::MarkUnread,
        MarkAction::MarkStarred,
        MarkAction::MarkUnstarred,
    ];

    /// True if this action mutates the starred flag rather than unread.
    pub fn is_star(self) -> bool {
        matches!(self, MarkAction::MarkStarred | MarkAction::MarkUnstarred)
    }

    /// The flag value an affected item ends up with.
    pub fn flag_value(self) -> bool {
        match self {
            MarkAction::MarkRead => false,
            MarkAction::MarkUnread => true,
            MarkAction::MarkStarred => true,
            MarkAction::MarkUnstarred => false,
        }
    }

    /// The action that undoes this one.
    pub fn inverse(self) -> MarkAction {
        match self {
            MarkAction::MarkRead => MarkAction::MarkUnread,
            MarkAction::MarkUnread => MarkAction::MarkRead,
            MarkAction::MarkStarred => MarkAction::MarkUnstarred,
            MarkAction::MarkUnstarred => MarkAction::MarkStarred,
        }
    }

    /// Stable key used for outbox rows.
    pub fn key(self) -> &'static str {
        match self {
            MarkAction::MarkRead => "read",
            MarkAction::MarkUnread => "unread",
            MarkAction::MarkStarred => "star",
            MarkAction::MarkUnstarred => "unstar",
        }
    }

    pub fn from_key(key: &str) -> Option<MarkAction> {
        Self::ALL.into_iter().find(|action| action.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title() {
        let mut item = Item::new(1, 1);
        assert_eq!(item.display_title(), "(Untitled)");
        item.title = "My Article".into();
        assert_eq!(item.display_title(), "My Article");
    }

    #[test]
    fn test_mark_action_keys_roundtrip() {
        for action in MarkAction::ALL {
            assert_eq!(MarkAction::from_key(action.key()), Some(action));
        }
        assert_eq!(MarkAction::from_key("bogus"), None);
    }

    #[test]
    fn test_mark_action_inverse() {
        for action in MarkAction::ALL {
            assert_eq!(action.inverse().inverse(), action);
            assert_ne!(action.inverse().flag_value(), action.flag_value());
            assert_eq!(action.inverse().is_star(), action.is_star());
        }
    }
}
