//! Sync orchestration.
//!
//! Every sync starts by flushing the outbox: pending read/star changes go up
//! in four batches, and a failed flush aborts the whole run so nothing is
//! fetched over unacknowledged local state. Only then are remote changes
//! pulled and merged into the cache.

use crate::api::json::split_items;
use crate::api::{Level, NewsApi, QueryType, BATCH_SIZE};
use crate::app::{Result, TidingsError};
use crate::domain::{MarkAction, TreeNode};
use crate::store::{ReducedMerge, Store};

/// What kind of sync to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncType {
    /// Flush changes, then fetch folders, feeds and items.
    Full {
        /// Discard incremental state and fetch from scratch.
        initial: bool,
    },
    /// Flush pending local changes only.
    ChangesOnly,
    /// Fetch one more page of (read) items for the given node.
    LoadMore { node: TreeNode, offset: i64 },
}

/// Sync-relevant preferences, resolved by the caller from the config.
#[derive(Debug, Clone, Default)]
pub struct SyncPrefs {
    /// ETag of the previous v2 sync, if any.
    pub etag: Option<String>,
    /// Item cap for post-sync eviction; 0 disables eviction.
    pub max_items: u64,
}

/// What a sync run did, including the ETag state to persist.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub flushed: usize,
    pub merged: usize,
    pub reduced: ReducedMerge,
    pub evicted: usize,
    pub etag: Option<String>,
}

pub async fn sync<S: Store>(
    api: &dyn NewsApi,
    store: &S,
    prefs: &SyncPrefs,
    sync_type: SyncType,
) -> Result<SyncOutcome> {
    match api.level() {
        Level::V12 => sync_v12(api, store, prefs, sync_type).await,
        Level::V2 => sync_v2(api, store, prefs, sync_type).await,
    }
}

/// Upload the outbox in four batches and clear the acknowledged flags.
async fn flush_changes<S: Store>(api: &dyn NewsApi, store: &S) -> Result<usize> {
    let pending = store.pending_changes()?;
    let mut flushed = 0;

    for action in MarkAction::ALL {
        let items = pending.for_action(action);
        if items.is_empty() {
            continue;
        }
        api.mark(action, items).await?;
        let ids: Vec<i64> = items.iter().map(|item| item.id).collect();
        store.acknowledge(action, &ids)?;
        flushed += ids.len();
    }

    Ok(flushed)
}

async fn sync_v12<S: Store>(
    api: &dyn NewsApi,
    store: &S,
    prefs: &SyncPrefs,
    sync_type: SyncType,
) -> Result<SyncOutcome> {
    let flushed = flush_changes(api, store).await?;
    let mut outcome = SyncOutcome {
        flushed,
        etag: prefs.etag.clone(),
        ..SyncOutcome::default()
    };

    match sync_type {
        SyncType::ChangesOnly => Ok(outcome),
        SyncType::Full { .. } => {
            let last_sync = store.max_last_modified()?;

            let (user, folders, feeds) = tokio::join!(api.user(), api.folders(), api.feeds());
            let user = user?;
            let folders = folders?;
            let feeds = feeds?;

            let parsed = if last_sync == 0 {
                // First sync: all starred (including read) plus everything unread
                let (starred, unread) = tokio::join!(
                    api.items(-1, 0, QueryType::Starred, 0, true, false),
                    api.items(-1, 0, QueryType::All, 0, false, false)
                );
                let mut parsed = starred?;
                parsed.extend(unread?);
                parsed
            } else {
                api.updated_items(last_sync, QueryType::All, 0).await?
            };

            if let Some(user) = user {
                store.set_user(&user)?;
            }
            store.replace_folders(&folders)?;
            store.replace_feeds(&feeds)?;

            let (full, reduced) = split_items(parsed);
            outcome.merged = store.upsert_items(&full)?;
            outcome.reduced = store.apply_reduced_items(&reduced)?;

            store.recompute_counts()?;
            if prefs.max_items > 0 {
                outcome.evicted = store.evict_excess_items(prefs.max_items)?;
            }

            Ok(outcome)
        }
        SyncType::LoadMore { node, offset } => {
            let (query, id) = match node {
                TreeNode::Feed(id) => (QueryType::Feed, id),
                TreeNode::Folder(id) => (QueryType::Folder, id),
                TreeNode::Starred => (QueryType::Starred, 0),
                TreeNode::AllUnread | TreeNode::Fresh => {
                    return Err(TidingsError::Unsupported("Load more for this view"))
                }
            };

            let parsed = api.items(BATCH_SIZE, offset, query, id, true, false).await?;
            let (full, reduced) = split_items(parsed);
            outcome.merged = store.upsert_items(&full)?;
            outcome.reduced = store.apply_reduced_items(&reduced)?;
            store.recompute_counts()?;

            Ok(outcome)
        }
    }
}

async fn sync_v2<S: Store>(
    api: &dyn NewsApi,
    store: &S,
    prefs: &SyncPrefs,
    sync_type: SyncType,
) -> Result<SyncOutcome> {
    let initial = match sync_type {
        SyncType::Full { initial } => initial,
        SyncType::ChangesOnly => false,
        SyncType::LoadMore { .. } => return Err(TidingsError::Unsupported("Load more")),
    };

    let etag = if initial { None } else { prefs.etag.clone() };

    let pending = store.pending_changes()?;
    let uploaded = if etag.is_some() { pending.len() } else { 0 };

    let delta = api.sync_delta(etag.as_deref(), &pending).await?;

    let mut outcome = SyncOutcome {
        // A successful POST acknowledged every uploaded change
        flushed: uploaded,
        etag: delta.etag.or(etag),
        ..SyncOutcome::default()
    };
    if uploaded > 0 {
        for action in MarkAction::ALL {
            let ids: Vec<i64> = pending
                .for_action(action)
                .iter()
                .map(|item| item.id)
                .collect();
            if !ids.is_empty() {
                store.acknowledge(action, &ids)?;
            }
        }
    }

    if let Some(folders) = delta.folders {
        store.replace_folders(&folders)?;
    }
    if let Some(feeds) = delta.feeds {
        store.replace_feeds(&feeds)?;
    }

    let (full, reduced) = split_items(delta.items);
    outcome.merged = store.upsert_items(&full)?;
    outcome.reduced = store.apply_reduced_items(&reduced)?;

    store.recompute_counts()?;
    if prefs.max_items > 0 {
        outcome.evicted = store.evict_excess_items(prefs.max_items)?;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::api::json::{ParsedItem, Status, Version};
    use crate::api::DeltaSync;
    use crate::domain::{Feed, Folder, Item, User};
    use crate::store::{PendingChanges, SortSpec, SqliteStore};

    fn feed(id: i64) -> Feed {
        Feed::new(id, format!("https://example.com/feed{}.xml", id))
    }

    fn item(id: i64, feed_id: i64) -> Item {
        let mut item = Item::new(id, feed_id);
        item.title = format!("Item {}", id);
        item.guid_hash = format!("hash-{}", id);
        item.last_modified = id;
        item
    }

    fn full(id: i64, feed_id: i64) -> ParsedItem {
        ParsedItem::Full(item(id, feed_id))
    }

    #[derive(Default)]
    struct MockApi {
        v2: bool,
        folders: Vec<Folder>,
        feeds: Vec<Feed>,
        initial_starred: Vec<ParsedItem>,
        initial_unread: Vec<ParsedItem>,
        updated: Vec<ParsedItem>,
        more: Vec<ParsedItem>,
        fail_mark: bool,
        calls: Mutex<Vec<String>>,
        sync_responses: Mutex<VecDeque<DeltaSync>>,
    }

    impl MockApi {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl NewsApi for MockApi {
        fn level(&self) -> Level {
            if self.v2 {
                Level::V2
            } else {
                Level::V12
            }
        }

        async fn status(&self) -> Result<Status> {
            Ok(Status {
                version: Some(Version::new(9, 0, 0)),
                improperly_configured_cron: false,
                user: None,
            })
        }

        async fn user(&self) -> Result<Option<User>> {
            self.log("user".into());
            Ok(Some(User {
                user_id: "jane".into(),
                display_name: "Jane".into(),
                avatar: None,
                last_login: None,
            }))
        }

        async fn folders(&self) -> Result<Vec<Folder>> {
            self.log("folders".into());
            Ok(self.folders.clone())
        }

        async fn feeds(&self) -> Result<Vec<Feed>> {
            self.log("feeds".into());
            Ok(self.feeds.clone())
        }

        async fn items(
            &self,
            batch_size: i64,
            offset: i64,
            query: QueryType,
            id: i64,
            get_read: bool,
            _oldest_first: bool,
        ) -> Result<Vec<ParsedItem>> {
            self.log(format!(
                "items:batch={},offset={},type={},id={},read={}",
                batch_size,
                offset,
                query.code(),
                id,
                get_read
            ));
            if batch_size == -1 {
                if query == QueryType::Starred {
                    Ok(self.initial_starred.clone())
                } else {
                    Ok(self.initial_unread.clone())
                }
            } else {
                Ok(self.more.clone())
            }
        }

        async fn updated_items(
            &self,
            last_modified: i64,
            query: QueryType,
            id: i64,
        ) -> Result<Vec<ParsedItem>> {
            self.log(format!(
                "updated:since={},type={},id={}",
                last_modified,
                query.code(),
                id
            ));
            Ok(self.updated.clone())
        }

        async fn mark(&self, action: MarkAction, items: &[Item]) -> Result<()> {
            let ids: Vec<i64> = items.iter().map(|item| item.id).collect();
            self.log(format!("mark:{}:{:?}", action.key(), ids));
            if self.fail_mark {
                return Err(TidingsError::Api {
                    status: 500,
                    context: "mark".into(),
                });
            }
            Ok(())
        }

        async fn create_feed(&self, url: &str, _folder_id: i64) -> Result<Feed> {
            Ok(Feed::new(99, url))
        }

        async fn move_feed(&self, _feed_id: i64, _folder_id: i64) -> Result<()> {
            Ok(())
        }

        async fn delete_feed(&self, _feed_id: i64) -> Result<()> {
            Ok(())
        }

        async fn sync_delta(
            &self,
            etag: Option<&str>,
            pending: &PendingChanges,
        ) -> Result<DeltaSync> {
            self.log(format!("sync:etag={:?},uploaded={}", etag, pending.len()));
            Ok(self
                .sync_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }
    }

    fn prefs() -> SyncPrefs {
        SyncPrefs {
            etag: None,
            max_items: 10_000,
        }
    }

    #[tokio::test]
    async fn test_initial_full_sync_v12() {
        let store = SqliteStore::in_memory().unwrap();
        let api = MockApi {
            folders: vec![Folder::new(1, "News")],
            feeds: vec![feed(1), feed(2)],
            initial_starred: vec![{
                let mut starred = item(10, 1);
                starred.starred = true;
                starred.unread = false;
                ParsedItem::Full(starred)
            }],
            initial_unread: vec![full(11, 1), full(12, 2)],
            ..MockApi::default()
        };

        let outcome = sync(&api, &store, &prefs(), SyncType::Full { initial: false })
            .await
            .unwrap();

        assert_eq!(outcome.merged, 3);
        assert_eq!(store.get_folders(false).unwrap().len(), 1);
        let f1 = store.get_feed(1).unwrap().unwrap();
        assert_eq!(f1.unread_count, 1);
        assert_eq!(f1.starred_count, 1);
        assert!(store.get_user().unwrap().is_some());

        let calls = api.calls();
        assert!(calls.iter().any(|c| c.starts_with("items:batch=-1") && c.contains("type=2")));
        assert!(calls.iter().any(|c| c.starts_with("items:batch=-1") && c.contains("type=3")));
        assert!(!calls.iter().any(|c| c.starts_with("updated:")));
    }

    #[tokio::test]
    async fn test_delta_sync_uses_updated_items() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_feed(&feed(1)).unwrap();
        store.upsert_items(&[item(5, 1)]).unwrap();

        let api = MockApi {
            feeds: vec![feed(1)],
            updated: vec![full(6, 1)],
            ..MockApi::default()
        };

        let outcome = sync(&api, &store, &prefs(), SyncType::Full { initial: false })
            .await
            .unwrap();

        assert_eq!(outcome.merged, 1);
        assert!(store.get_item(6).unwrap().is_some());
        assert!(api
            .calls()
            .iter()
            .any(|c| c == "updated:since=5,type=3,id=0"));
    }

    #[tokio::test]
    async fn test_flush_runs_first_and_acknowledges() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_feed(&feed(1)).unwrap();
        store.upsert_items(&[item(1, 1)]).unwrap();
        store.recompute_counts().unwrap();
        store.mark_items(&[1], MarkAction::MarkRead).unwrap();

        let api = MockApi {
            feeds: vec![feed(1)],
            ..MockApi::default()
        };

        let outcome = sync(&api, &store, &prefs(), SyncType::Full { initial: false })
            .await
            .unwrap();

        assert_eq!(outcome.flushed, 1);
        assert!(!store.has_pending_changes().unwrap());
        assert!(!store.get_item(1).unwrap().unwrap().unread_changed);

        let calls = api.calls();
        assert_eq!(calls[0], "mark:read:[1]");
    }

    #[tokio::test]
    async fn test_flush_failure_aborts_sync() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_feed(&feed(1)).unwrap();
        store.upsert_items(&[item(1, 1)]).unwrap();
        store.recompute_counts().unwrap();
        store.mark_items(&[1], MarkAction::MarkRead).unwrap();

        let api = MockApi {
            fail_mark: true,
            feeds: vec![feed(1)],
            ..MockApi::default()
        };

        let result = sync(&api, &store, &prefs(), SyncType::Full { initial: false }).await;

        assert!(result.is_err());
        // The change stays queued for the next attempt
        assert!(store.has_pending_changes().unwrap());
        assert!(store.get_item(1).unwrap().unwrap().unread_changed);
        // Nothing was fetched after the failed flush
        assert!(!api.calls().iter().any(|c| c == "folders"));
    }

    #[tokio::test]
    async fn test_changes_only_skips_fetch() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_feed(&feed(1)).unwrap();
        store.upsert_items(&[item(1, 1)]).unwrap();
        store.mark_items(&[1], MarkAction::MarkStarred).unwrap();

        let api = MockApi::default();
        let outcome = sync(&api, &store, &prefs(), SyncType::ChangesOnly)
            .await
            .unwrap();

        assert_eq!(outcome.flushed, 1);
        assert_eq!(api.calls(), vec!["mark:star:[1]".to_string()]);
    }

    #[tokio::test]
    async fn test_load_more_nodes() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_feed(&feed(1)).unwrap();

        let api = MockApi {
            more: vec![full(20, 1), full(21, 1)],
            ..MockApi::default()
        };

        let outcome = sync(
            &api,
            &store,
            &prefs(),
            SyncType::LoadMore {
                node: TreeNode::Feed(1),
                offset: 40,
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome.merged, 2);
        assert!(api
            .calls()
            .iter()
            .any(|c| c == "items:batch=100,offset=40,type=0,id=1,read=true"));

        sync(
            &api,
            &store,
            &prefs(),
            SyncType::LoadMore {
                node: TreeNode::Starred,
                offset: 0,
            },
        )
        .await
        .unwrap();
        assert!(api
            .calls()
            .iter()
            .any(|c| c == "items:batch=100,offset=0,type=2,id=0,read=true"));

        let unsupported = sync(
            &api,
            &store,
            &prefs(),
            SyncType::LoadMore {
                node: TreeNode::AllUnread,
                offset: 0,
            },
        )
        .await;
        assert!(matches!(unsupported, Err(TidingsError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_v2_initial_get_then_post_with_etag() {
        let store = SqliteStore::in_memory().unwrap();
        let api = MockApi {
            v2: true,
            sync_responses: Mutex::new(VecDeque::from([
                DeltaSync {
                    etag: Some("\"etag-1\"".into()),
                    folders: Some(vec![Folder::new(1, "News")]),
                    feeds: Some(vec![feed(1)]),
                    items: vec![full(1, 1)],
                },
                DeltaSync {
                    etag: Some("\"etag-2\"".into()),
                    folders: None,
                    feeds: None,
                    items: vec![],
                },
            ])),
            ..MockApi::default()
        };

        // First contact: no etag, GET, nothing uploaded
        let outcome = sync(&api, &store, &prefs(), SyncType::Full { initial: false })
            .await
            .unwrap();
        assert_eq!(outcome.etag.as_deref(), Some("\"etag-1\""));
        assert_eq!(outcome.merged, 1);
        assert!(api.calls().iter().any(|c| c == "sync:etag=None,uploaded=0"));

        // Local change, then a delta sync with the remembered etag
        store.mark_items(&[1], MarkAction::MarkRead).unwrap();
        let prefs = SyncPrefs {
            etag: outcome.etag,
            max_items: 10_000,
        };
        let outcome = sync(&api, &store, &prefs, SyncType::Full { initial: false })
            .await
            .unwrap();

        assert_eq!(outcome.flushed, 1);
        assert_eq!(outcome.etag.as_deref(), Some("\"etag-2\""));
        assert!(!store.has_pending_changes().unwrap());
        assert!(api
            .calls()
            .iter()
            .any(|c| c == "sync:etag=Some(\"\\\"etag-1\\\"\"),uploaded=1"));
    }

    #[tokio::test]
    async fn test_v2_initial_sync_discards_etag() {
        let store = SqliteStore::in_memory().unwrap();
        let api = MockApi {
            v2: true,
            ..MockApi::default()
        };

        let prefs = SyncPrefs {
            etag: Some("\"stale\"".into()),
            max_items: 10_000,
        };
        sync(&api, &store, &prefs, SyncType::Full { initial: true })
            .await
            .unwrap();

        assert!(api.calls().iter().any(|c| c == "sync:etag=None,uploaded=0"));
    }

    #[tokio::test]
    async fn test_v2_reduced_items_merge_by_content_hash() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_feed(&feed(1)).unwrap();
        let mut cached = item(1, 1);
        cached.content_hash = Some("cafe".into());
        store.upsert_items(&[cached]).unwrap();
        store.recompute_counts().unwrap();

        let api = MockApi {
            v2: true,
            sync_responses: Mutex::new(VecDeque::from([DeltaSync {
                etag: Some("\"e\"".into()),
                folders: None,
                feeds: None,
                items: vec![
                    ParsedItem::Reduced(crate::domain::ReducedItem {
                        id: 1,
                        content_hash: Some("cafe".into()),
                        unread: Some(false),
                        starred: None,
                    }),
                    // No cached item matches: dropped with a warning
                    ParsedItem::Reduced(crate::domain::ReducedItem {
                        id: 2,
                        content_hash: Some("dead".into()),
                        unread: Some(false),
                        starred: None,
                    }),
                ],
            }])),
            ..MockApi::default()
        };

        let outcome = sync(&api, &store, &prefs(), SyncType::Full { initial: false })
            .await
            .unwrap();

        assert_eq!(outcome.reduced.applied, 1);
        assert_eq!(outcome.reduced.dropped, 1);
        assert!(!store.get_item(1).unwrap().unwrap().unread);
        assert_eq!(store.get_feed(1).unwrap().unwrap().unread_count, 0);
    }

    #[tokio::test]
    async fn test_server_side_deletes_propagate() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .replace_folders(&[Folder::new(1, "News"), Folder::new(2, "Old")])
            .unwrap();
        store.upsert_feed(&feed(1)).unwrap();
        store.upsert_feed(&feed(2)).unwrap();
        store.upsert_items(&[item(1, 1), item(2, 2)]).unwrap();

        // The server only knows folder 1 and feed 1 now
        let api = MockApi {
            folders: vec![Folder::new(1, "News")],
            feeds: vec![feed(1)],
            updated: vec![],
            ..MockApi::default()
        };

        sync(&api, &store, &prefs(), SyncType::Full { initial: false })
            .await
            .unwrap();

        assert!(store.get_folder(2).unwrap().is_none());
        assert!(store.get_feed(2).unwrap().is_none());
        assert!(store.get_item(2).unwrap().is_none());
        assert!(store.get_item(1).unwrap().is_some());
        assert_eq!(
            store
                .get_items(&TreeNode::AllUnread, false, SortSpec::default())
                .unwrap()
                .len(),
            1
        );
    }
}
