use std::fmt;

/// Items younger than this count as "fresh".
pub const MAX_ARTICLE_AGE_SECS: i64 = 24 * 60 * 60;

/// A selectable node in the navigation tree: a folder, a feed, or one of the
/// pseudo-folders that exist only client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeNode {
    AllUnread,
    Starred,
    Fresh,
    Folder(i64),
    Feed(i64),
}

impl TreeNode {
    pub const ALL_UNREAD_ID: i64 = -10;
    pub const STARRED_ID: i64 = -11;
    pub const FRESH_ID: i64 = -12;

    /// Stable id used for temporary-feed bookkeeping.
    pub fn tree_item_id(&self) -> i64 {
        match self {
            TreeNode::AllUnread => Self::ALL_UNREAD_ID,
            TreeNode::Starred => Self::STARRED_ID,
            TreeNode::Fresh => Self::FRESH_ID,
            TreeNode::Folder(id) | TreeNode::Feed(id) => *id,
        }
    }

    /// Parse the CLI notation: `all`, `starred`, `fresh`, `feed:ID`,
    /// `folder:ID`.
    pub fn parse(source: &str) -> Option<TreeNode> {
        match source {
            "all" | "unread" => Some(TreeNode::AllUnread),
            "starred" => Some(TreeNode::Starred),
            "fresh" => Some(TreeNode::Fresh),
            _ => {
                let (kind, id) = source.split_once(':')?;
                let id = id.parse().ok()?;
                match kind {
                    "feed" => Some(TreeNode::Feed(id)),
                    "folder" => Some(TreeNode::Folder(id)),
                    _ => None,
                }
            }
        }
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeNode::AllUnread => write!(f, "Unread"),
            TreeNode::Starred => write!(f, "Starred"),
            TreeNode::Fresh => write!(f, "Fresh"),
            TreeNode::Folder(id) => write!(f, "folder:{}", id),
            TreeNode::Feed(id) => write!(f, "feed:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pseudo_folders() {
        assert_eq!(TreeNode::parse("all"), Some(TreeNode::AllUnread));
        assert_eq!(TreeNode::parse("unread"), Some(TreeNode::AllUnread));
        assert_eq!(TreeNode::parse("starred"), Some(TreeNode::Starred));
        assert_eq!(TreeNode::parse("fresh"), Some(TreeNode::Fresh));
    }

    #[test]
    fn test_parse_feed_and_folder() {
        assert_eq!(TreeNode::parse("feed:12"), Some(TreeNode::Feed(12)));
        assert_eq!(TreeNode::parse("folder:3"), Some(TreeNode::Folder(3)));
        assert_eq!(TreeNode::parse("feed:x"), None);
        assert_eq!(TreeNode::parse("bogus"), None);
        assert_eq!(TreeNode::parse("bogus:1"), None);
    }

    #[test]
    fn test_pseudo_folder_ids_are_distinct() {
        let ids = [
            TreeNode::AllUnread.tree_item_id(),
            TreeNode::Starred.tree_item_id(),
            TreeNode::Fresh.tree_item_id(),
        ];
        assert!(ids.iter().all(|id| *id < 0));
        assert_eq!(ids.len(), {
            let mut unique = ids.to_vec();
            unique.sort();
            unique.dedup();
            unique.len()
        });
    }
}
