pub mod sqlite;

use crate::app::Result;
use crate::config::{SortField, SortOrder};
use crate::domain::{Feed, Folder, Item, MarkAction, ReducedItem, TreeNode, User};

pub use sqlite::SqliteStore;

/// Sort specification for item listings, taken from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Id,
            order: SortOrder::Ascending,
        }
    }
}

/// The two temporary-feed snapshots: the list the user is browsing and the
/// pager holding the articles opened from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    List,
    Pager,
}

impl Snapshot {
    pub fn id(self) -> i64 {
        match self {
            Snapshot::List => 0,
            Snapshot::Pager => 1,
        }
    }
}

/// Outbox contents grouped into the four upload batches.
#[derive(Debug, Default)]
pub struct PendingChanges {
    pub read: Vec<Item>,
    pub unread: Vec<Item>,
    pub starred: Vec<Item>,
    pub unstarred: Vec<Item>,
}

impl PendingChanges {
    pub fn for_action(&self, action: MarkAction) -> &[Item] {
        match action {
            MarkAction::MarkRead => &self.read,
            MarkAction::MarkUnread => &self.unread,
            MarkAction::MarkStarred => &self.starred,
            MarkAction::MarkUnstarred => &self.unstarred,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty()
            && self.unread.is_empty()
            && self.starred.is_empty()
            && self.unstarred.is_empty()
    }

    pub fn len(&self) -> usize {
        self.read.len() + self.unread.len() + self.starred.len() + self.unstarred.len()
    }
}

/// Outcome of merging reduced payloads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReducedMerge {
    pub applied: usize,
    pub dropped: usize,
}

pub trait Store {
    // Folder operations
    fn replace_folders(&self, folders: &[Folder]) -> Result<()>;
    fn get_folder(&self, folder_id: i64) -> Result<Option<Folder>>;
    fn get_folders(&self, only_unread: bool) -> Result<Vec<Folder>>;

    // Feed operations
    fn replace_feeds(&self, feeds: &[Feed]) -> Result<()>;
    fn upsert_feed(&self, feed: &Feed) -> Result<()>;
    fn delete_feed(&self, feed_id: i64) -> Result<()>;
    fn move_feed(&self, feed_id: i64, folder_id: i64) -> Result<()>;
    fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>>;
    fn get_feeds(&self, node: &TreeNode, only_unread: bool) -> Result<Vec<Feed>>;

    // Item operations
    fn upsert_items(&self, items: &[Item]) -> Result<usize>;
    fn apply_reduced_items(&self, reduced: &[ReducedItem]) -> Result<ReducedMerge>;
    fn get_item(&self, item_id: i64) -> Result<Option<Item>>;
    fn get_items(&self, node: &TreeNode, only_unread: bool, sort: SortSpec) -> Result<Vec<Item>>;
    fn max_last_modified(&self) -> Result<i64>;

    // Local state changes and the outbox
    fn mark_items(&self, item_ids: &[i64], action: MarkAction) -> Result<usize>;
    fn pending_changes(&self) -> Result<PendingChanges>;
    fn has_pending_changes(&self) -> Result<bool>;
    fn acknowledge(&self, action: MarkAction, item_ids: &[i64]) -> Result<()>;

    // Counters and maintenance
    fn recompute_counts(&self) -> Result<()>;
    fn evict_excess_items(&self, max_items: u64) -> Result<usize>;
    fn reset(&self) -> Result<()>;

    // Temporary-feed snapshots
    fn update_list_snapshot(&self, node: &TreeNode, name: &str, item_ids: &[i64]) -> Result<()>;
    fn promote_list_snapshot(&self) -> Result<()>;
    fn snapshot_items(&self, snapshot: Snapshot) -> Result<Vec<Item>>;

    // User profile
    fn set_user(&self, user: &User) -> Result<()>;
    fn get_user(&self) -> Result<Option<User>>;
}
