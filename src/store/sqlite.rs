use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, TidingsError};
use crate::domain::tree::MAX_ARTICLE_AGE_SECS;
use crate::domain::{Feed, Folder, Item, MarkAction, ReducedItem, TreeNode, User};
use crate::store::{PendingChanges, ReducedMerge, Snapshot, SortSpec, Store};
use crate::util;

const FEED_COLUMNS: &str = "id, folder_id, url, name, link, favicon_link, added, unread_count, \
                            starred_count, ordering, pinned, update_error_count, last_update_error";

const ITEM_COLUMNS: &str = "id, guid, guid_hash, url, title, author, pub_date, updated_at, body, \
                            enclosure_mime, enclosure_link, feed_id, unread, unread_changed, \
                            starred, starred_changed, last_modified, fingerprint, content_hash, \
                            active";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn migrations() -> Migrations<'static> {
        Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))])
    }

    /// Run migrations; an unmigratable database (e.g. one written by an
    /// unsupported older or newer schema) is destructively reset.
    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn()?;

        conn.pragma_update(None, "foreign_keys", "ON")?;

        if let Err(e) = Self::migrations().to_latest(&mut conn) {
            let version: i64 =
                conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
            tracing::warn!(version, error = %e, "unsupported database schema, resetting");

            Self::drop_all_tables(&conn)?;
            conn.pragma_update(None, "user_version", 0)?;
            Self::migrations()
                .to_latest(&mut conn)
                .map_err(|e| TidingsError::Other(format!("Database migration failed: {}", e)))?;
        }

        Ok(())
    }

    fn drop_all_tables(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "foreign_keys", "OFF")?;
        let tables: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            )?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            names
        };
        for table in tables {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS \"{}\"", table))?;
        }
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TidingsError::Other(format!("Database lock poisoned: {}", e)))
    }

    fn parse_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn folder_from_row(row: &Row) -> rusqlite::Result<Folder> {
        Ok(Folder {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }

    fn feed_from_row(row: &Row) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: row.get(0)?,
            folder_id: row.get(1)?,
            url: row.get(2)?,
            name: row.get(3)?,
            link: row.get(4)?,
            favicon_link: row.get(5)?,
            added: Self::parse_datetime(&row.get::<_, String>(6)?),
            unread_count: row.get(7)?,
            starred_count: row.get(8)?,
            ordering: row.get(9)?,
            pinned: row.get(10)?,
            update_error_count: row.get(11)?,
            last_update_error: row.get(12)?,
        })
    }

    fn item_from_row(row: &Row) -> rusqlite::Result<Item> {
        Ok(Item {
            id: row.get(0)?,
            guid: row.get(1)?,
            guid_hash: row.get(2)?,
            url: row.get(3)?,
            title: row.get(4)?,
            author: row.get(5)?,
            pub_date: row.get(6)?,
            updated_at: row.get(7)?,
            body: row.get(8)?,
            enclosure_mime: row.get(9)?,
            enclosure_link: row.get(10)?,
            feed_id: row.get(11)?,
            unread: row.get(12)?,
            unread_changed: row.get(13)?,
            starred: row.get(14)?,
            starred_changed: row.get(15)?,
            last_modified: row.get(16)?,
            fingerprint: row.get(17)?,
            content_hash: row.get(18)?,
            active: row.get(19)?,
        })
    }

    /// Flip an item flag inside `tx`, keeping the feed counter in step.
    fn apply_flag(tx: &Transaction, item_id: i64, feed_id: i64, star: bool, value: bool) -> Result<()> {
        let delta: i64 = if value { 1 } else { -1 };
        if star {
            tx.execute(
                "UPDATE items SET starred = ?1 WHERE id = ?2",
                params![value, item_id],
            )?;
            tx.execute(
                "UPDATE feeds SET starred_count = starred_count + ?1 WHERE id = ?2",
                params![delta, feed_id],
            )?;
        } else {
            tx.execute(
                "UPDATE items SET unread = ?1 WHERE id = ?2",
                params![value, item_id],
            )?;
            tx.execute(
                "UPDATE feeds SET unread_count = unread_count + ?1 WHERE id = ?2",
                params![delta, feed_id],
            )?;
        }
        Ok(())
    }

    fn query_items(
        conn: &Connection,
        condition: &str,
        params: &[i64],
        sort: SortSpec,
    ) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM items WHERE {} ORDER BY {} {}, id {}",
            ITEM_COLUMNS,
            condition,
            sort.field.column(),
            sort.order.sql(),
            sort.order.sql()
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(params.iter()), Self::item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn query_feeds(conn: &Connection, condition: &str, params: &[i64]) -> Result<Vec<Feed>> {
        let sql = format!(
            "SELECT {} FROM feeds WHERE {} ORDER BY name COLLATE NOCASE ASC, url ASC",
            FEED_COLUMNS, condition
        );
        let mut stmt = conn.prepare(&sql)?;
        let feeds = stmt
            .query_map(params_from_iter(params.iter()), Self::feed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(feeds)
    }

    fn insert_feed(tx: &Transaction, feed: &Feed) -> Result<()> {
        tx.execute(
            "INSERT INTO feeds (id, folder_id, url, name, link, favicon_link, added, unread_count, \
                                starred_count, ordering, pinned, update_error_count, last_update_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                 folder_id = excluded.folder_id,
                 url = excluded.url,
                 name = excluded.name,
                 link = excluded.link,
                 favicon_link = excluded.favicon_link,
                 ordering = excluded.ordering,
                 pinned = excluded.pinned,
                 update_error_count = excluded.update_error_count,
                 last_update_error = excluded.last_update_error",
            params![
                feed.id,
                feed.folder_id,
                feed.url,
                feed.name,
                feed.link,
                feed.favicon_link,
                feed.added.to_rfc3339(),
                feed.unread_count,
                feed.starred_count,
                feed.ordering,
                feed.pinned,
                feed.update_error_count,
                feed.last_update_error,
            ],
        )?;
        Ok(())
    }

    fn fresh_cutoff() -> i64 {
        Utc::now().timestamp() - MAX_ARTICLE_AGE_SECS
    }
}

impl Store for SqliteStore {
    fn replace_folders(&self, folders: &[Folder]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM folders")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids
        };

        // Folders gone from the server take their feeds (and items) with them
        for stale in existing
            .iter()
            .filter(|id| !folders.iter().any(|f| f.id == **id))
        {
            tx.execute("DELETE FROM feeds WHERE folder_id = ?1", params![stale])?;
            tx.execute("DELETE FROM folders WHERE id = ?1", params![stale])?;
        }

        for folder in folders {
            tx.execute(
                "INSERT INTO folders (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                params![folder.id, folder.name],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_folder(&self, folder_id: i64) -> Result<Option<Folder>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT id, name FROM folders WHERE id = ?1",
                params![folder_id],
                Self::folder_from_row,
            )
            .optional()?;
        Ok(result)
    }

    fn get_folders(&self, only_unread: bool) -> Result<Vec<Folder>> {
        let conn = self.conn()?;
        let sql = if only_unread {
            "SELECT id, name FROM folders
             WHERE id IN (SELECT folder_id FROM feeds WHERE unread_count > 0)
             ORDER BY name COLLATE NOCASE ASC"
        } else {
            "SELECT id, name FROM folders ORDER BY name COLLATE NOCASE ASC"
        };
        let mut stmt = conn.prepare(sql)?;
        let folders = stmt
            .query_map([], Self::folder_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(folders)
    }

    fn replace_feeds(&self, feeds: &[Feed]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM feeds")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids
        };

        for stale in existing
            .iter()
            .filter(|id| !feeds.iter().any(|f| f.id == **id))
        {
            tx.execute("DELETE FROM feeds WHERE id = ?1", params![stale])?;
        }

        for feed in feeds {
            Self::insert_feed(&tx, feed)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn upsert_feed(&self, feed: &Feed) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        Self::insert_feed(&tx, feed)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_feed(&self, feed_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM feeds WHERE id = ?1", params![feed_id])?;
        if deleted == 0 {
            return Err(TidingsError::FeedNotFound(feed_id));
        }
        Ok(())
    }

    fn move_feed(&self, feed_id: i64, folder_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE feeds SET folder_id = ?1 WHERE id = ?2",
            params![folder_id, feed_id],
        )?;
        if updated == 0 {
            return Err(TidingsError::FeedNotFound(feed_id));
        }
        Ok(())
    }

    fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("SELECT {} FROM feeds WHERE id = ?1", FEED_COLUMNS),
                params![feed_id],
                Self::feed_from_row,
            )
            .optional()?;
        Ok(result)
    }

    fn get_feeds(&self, node: &TreeNode, only_unread: bool) -> Result<Vec<Feed>> {
        let conn = self.conn()?;
        match node {
            TreeNode::AllUnread => {
                if only_unread {
                    Self::query_feeds(&conn, "unread_count > 0", &[])
                } else {
                    Self::query_feeds(&conn, "1 = 1", &[])
                }
            }
            TreeNode::Starred => Self::query_feeds(&conn, "starred_count > 0", &[]),
            TreeNode::Fresh => Self::query_feeds(
                &conn,
                "id IN (SELECT DISTINCT feed_id FROM items WHERE unread = 1 AND pub_date > ?1)",
                &[Self::fresh_cutoff()],
            ),
            TreeNode::Folder(id) => {
                if only_unread {
                    Self::query_feeds(&conn, "folder_id = ?1 AND unread_count > 0", &[*id])
                } else {
                    Self::query_feeds(&conn, "folder_id = ?1", &[*id])
                }
            }
            TreeNode::Feed(id) => Self::query_feeds(&conn, "id = ?1", &[*id]),
        }
    }

    fn upsert_items(&self, items: &[Item]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut count = 0;

        for item in items {
            // Placeholder feed so the foreign key holds until the next feed sync
            tx.execute(
                "INSERT OR IGNORE INTO feeds (id, url, added) VALUES (?1, '', ?2)",
                params![item.feed_id, Utc::now().to_rfc3339()],
            )?;

            let fingerprint = item.fingerprint.clone().unwrap_or_else(|| {
                util::fingerprint(&item.title, item.url.as_deref(), &item.body)
            });

            // Upserts keep local pending flags: while a changed-flag is set
            // the locally chosen value wins until the server acknowledged it.
            tx.execute(
                "INSERT INTO items (id, guid, guid_hash, url, title, author, pub_date, updated_at, \
                                    body, enclosure_mime, enclosure_link, feed_id, unread, \
                                    unread_changed, starred, starred_changed, last_modified, \
                                    fingerprint, content_hash, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0, ?14, 0, ?15, ?16, ?17, 0)
                 ON CONFLICT(id) DO UPDATE SET
                     guid = excluded.guid,
                     guid_hash = excluded.guid_hash,
                     url = excluded.url,
                     title = excluded.title,
                     author = excluded.author,
                     pub_date = excluded.pub_date,
                     updated_at = excluded.updated_at,
                     body = excluded.body,
                     enclosure_mime = excluded.enclosure_mime,
                     enclosure_link = excluded.enclosure_link,
                     feed_id = excluded.feed_id,
                     unread = CASE WHEN items.unread_changed THEN items.unread ELSE excluded.unread END,
                     starred = CASE WHEN items.starred_changed THEN items.starred ELSE excluded.starred END,
                     last_modified = excluded.last_modified,
                     fingerprint = excluded.fingerprint,
                     content_hash = excluded.content_hash",
                params![
                    item.id,
                    item.guid,
                    item.guid_hash,
                    item.url,
                    item.title,
                    item.author,
                    item.pub_date,
                    item.updated_at,
                    item.body,
                    item.enclosure_mime,
                    item.enclosure_link,
                    item.feed_id,
                    item.unread,
                    item.starred,
                    item.last_modified,
                    fingerprint,
                    item.content_hash,
                ],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    fn apply_reduced_items(&self, reduced: &[ReducedItem]) -> Result<ReducedMerge> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut merge = ReducedMerge::default();

        for update in reduced {
            let Some(hash) = update.content_hash.as_deref() else {
                tracing::warn!(item_id = update.id, "reduced item without content hash, dropping");
                merge.dropped += 1;
                continue;
            };

            let full: Option<(i64, i64, bool, bool)> = tx
                .query_row(
                    "SELECT id, feed_id, unread, starred FROM items WHERE content_hash = ?1",
                    params![hash],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            let Some((item_id, feed_id, unread, starred)) = full else {
                tracing::warn!(
                    item_id = update.id,
                    content_hash = hash,
                    "no full item matches reduced payload, dropping update"
                );
                merge.dropped += 1;
                continue;
            };

            if let Some(new_unread) = update.unread {
                if new_unread != unread {
                    Self::apply_flag(&tx, item_id, feed_id, false, new_unread)?;
                }
            }
            if let Some(new_starred) = update.starred {
                if new_starred != starred {
                    Self::apply_flag(&tx, item_id, feed_id, true, new_starred)?;
                }
            }
            merge.applied += 1;
        }

        tx.commit()?;
        Ok(merge)
    }

    fn get_item(&self, item_id: i64) -> Result<Option<Item>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                params![item_id],
                Self::item_from_row,
            )
            .optional()?;
        Ok(result)
    }

    fn get_items(&self, node: &TreeNode, only_unread: bool, sort: SortSpec) -> Result<Vec<Item>> {
        let conn = self.conn()?;
        let (mut condition, params): (String, Vec<i64>) = match node {
            TreeNode::Feed(id) => ("feed_id = ?1".to_string(), vec![*id]),
            TreeNode::Folder(id) => (
                "feed_id IN (SELECT id FROM feeds WHERE folder_id = ?1)".to_string(),
                vec![*id],
            ),
            TreeNode::Starred => ("starred = 1".to_string(), vec![]),
            // Deduplicated across feeds by fingerprint; items without one
            // always show up.
            TreeNode::AllUnread => (
                "id IN (SELECT MIN(id) FROM items GROUP BY COALESCE(fingerprint, 'item:' || id))"
                    .to_string(),
                vec![],
            ),
            TreeNode::Fresh => (
                "unread = 1 AND pub_date > ?1".to_string(),
                vec![Self::fresh_cutoff()],
            ),
        };

        if only_unread && !matches!(node, TreeNode::Fresh) {
            condition.push_str(" AND unread = 1");
        }

        Self::query_items(&conn, &condition, &params, sort)
    }

    fn max_last_modified(&self) -> Result<i64> {
        let conn = self.conn()?;
        let max: i64 = conn.query_row(
            "SELECT COALESCE(MAX(last_modified), 0) FROM items",
            [],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn mark_items(&self, item_ids: &[i64], action: MarkAction) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut changed = 0;

        for &item_id in item_ids {
            let row: Option<(i64, bool, bool)> = tx
                .query_row(
                    "SELECT feed_id, unread, starred FROM items WHERE id = ?1",
                    params![item_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let Some((feed_id, unread, starred)) = row else {
                return Err(TidingsError::ItemNotFound(item_id));
            };

            let current = if action.is_star() { starred } else { unread };
            if current == action.flag_value() {
                continue;
            }

            Self::apply_flag(&tx, item_id, feed_id, action.is_star(), action.flag_value())?;

            let changed_column = if action.is_star() {
                "starred_changed"
            } else {
                "unread_changed"
            };
            tx.execute(
                &format!(
                    "UPDATE items SET {changed} = 1 - {changed} WHERE id = ?1",
                    changed = changed_column
                ),
                params![item_id],
            )?;

            // A pending inverse cancels out instead of queueing a new upload
            let cancelled = tx.execute(
                "DELETE FROM outbox WHERE item_id = ?1 AND action = ?2",
                params![item_id, action.inverse().key()],
            )?;
            if cancelled == 0 {
                tx.execute(
                    "INSERT OR IGNORE INTO outbox (item_id, action, queued_at) VALUES (?1, ?2, ?3)",
                    params![item_id, action.key(), Utc::now().to_rfc3339()],
                )?;
            }

            changed += 1;
        }

        tx.commit()?;
        Ok(changed)
    }

    fn pending_changes(&self) -> Result<PendingChanges> {
        let conn = self.conn()?;
        let mut pending = PendingChanges::default();

        let sql = format!(
            "SELECT {} FROM items JOIN outbox ON outbox.item_id = items.id \
             WHERE outbox.action = ?1 ORDER BY items.id",
            ITEM_COLUMNS
                .split(", ")
                .map(|c| format!("items.{}", c))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;

        for action in MarkAction::ALL {
            let items = stmt
                .query_map(params![action.key()], Self::item_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            match action {
                MarkAction::MarkRead => pending.read = items,
                MarkAction::MarkUnread => pending.unread = items,
                MarkAction::MarkStarred => pending.starred = items,
                MarkAction::MarkUnstarred => pending.unstarred = items,
            }
        }

        Ok(pending)
    }

    fn has_pending_changes(&self) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool =
            conn.query_row("SELECT EXISTS(SELECT 1 FROM outbox)", [], |row| row.get(0))?;
        Ok(exists)
    }

    fn acknowledge(&self, action: MarkAction, item_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed_column = if action.is_star() {
            "starred_changed"
        } else {
            "unread_changed"
        };

        for &item_id in item_ids {
            tx.execute(
                "DELETE FROM outbox WHERE item_id = ?1 AND action = ?2",
                params![item_id, action.key()],
            )?;
            tx.execute(
                &format!("UPDATE items SET {} = 0 WHERE id = ?1", changed_column),
                params![item_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn recompute_counts(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "UPDATE feeds SET
                 unread_count = (SELECT COUNT(*) FROM items
                                 WHERE items.feed_id = feeds.id AND items.unread = 1),
                 starred_count = (SELECT COUNT(*) FROM items
                                  WHERE items.feed_id = feeds.id AND items.starred = 1)",
        )?;
        Ok(())
    }

    fn evict_excess_items(&self, max_items: u64) -> Result<usize> {
        let conn = self.conn()?;
        let total: u64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        if total <= max_items {
            return Ok(0);
        }

        let excess = (total - max_items) as i64;
        let deleted = conn.execute(
            "DELETE FROM items WHERE id IN (
                 SELECT id FROM items
                 WHERE unread = 0 AND starred = 0 AND active = 0
                 ORDER BY last_modified ASC
                 LIMIT ?1)",
            params![excess],
        )?;
        Ok(deleted)
    }

    fn reset(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "DELETE FROM outbox;
             DELETE FROM temporary_feed_items;
             DELETE FROM items;
             DELETE FROM feeds;
             DELETE FROM folders;
             DELETE FROM user;
             UPDATE temporary_feeds SET tree_item_id = 0, name = '';",
        )?;
        Ok(())
    }

    fn update_list_snapshot(&self, node: &TreeNode, name: &str, item_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE temporary_feeds SET tree_item_id = ?1, name = ?2 WHERE id = ?3",
            params![node.tree_item_id(), name, Snapshot::List.id()],
        )?;
        tx.execute(
            "DELETE FROM temporary_feed_items WHERE temporary_feed_id = ?1",
            params![Snapshot::List.id()],
        )?;
        for (position, item_id) in item_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO temporary_feed_items (temporary_feed_id, position, item_id)
                 VALUES (?1, ?2, ?3)",
                params![Snapshot::List.id(), position as i64, item_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn promote_list_snapshot(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("UPDATE items SET active = 0 WHERE active = 1", [])?;
        tx.execute(
            "UPDATE items SET active = 1 WHERE id IN (
                 SELECT item_id FROM temporary_feed_items WHERE temporary_feed_id = ?1)",
            params![Snapshot::List.id()],
        )?;
        tx.execute(
            "DELETE FROM temporary_feed_items WHERE temporary_feed_id = ?1",
            params![Snapshot::Pager.id()],
        )?;
        tx.execute(
            "INSERT INTO temporary_feed_items (temporary_feed_id, position, item_id)
             SELECT ?1, position, item_id FROM temporary_feed_items WHERE temporary_feed_id = ?2",
            params![Snapshot::Pager.id(), Snapshot::List.id()],
        )?;
        tx.execute(
            "UPDATE temporary_feeds SET
                 tree_item_id = (SELECT tree_item_id FROM temporary_feeds WHERE id = ?2),
                 name = (SELECT name FROM temporary_feeds WHERE id = ?2)
             WHERE id = ?1",
            params![Snapshot::Pager.id(), Snapshot::List.id()],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn snapshot_items(&self, snapshot: Snapshot) -> Result<Vec<Item>> {
        let conn = self.conn()?;
        let columns = ITEM_COLUMNS
            .split(", ")
            .map(|c| format!("items.{}", c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items
             JOIN temporary_feed_items t ON t.item_id = items.id
             WHERE t.temporary_feed_id = ?1
             ORDER BY t.position",
            columns
        ))?;
        let items = stmt
            .query_map(params![snapshot.id()], Self::item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn set_user(&self, user: &User) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user (id, user_id, display_name, avatar, last_login)
             VALUES (0, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 user_id = excluded.user_id,
                 display_name = excluded.display_name,
                 avatar = excluded.avatar,
                 last_login = excluded.last_login",
            params![user.user_id, user.display_name, user.avatar, user.last_login],
        )?;
        Ok(())
    }

    fn get_user(&self) -> Result<Option<User>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT user_id, display_name, avatar, last_login FROM user WHERE id = 0",
                [],
                |row| {
                    Ok(User {
                        user_id: row.get(0)?,
                        display_name: row.get(1)?,
                        avatar: row.get(2)?,
                        last_login: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }
}
