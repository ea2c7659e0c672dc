//! Wire types for the News REST API.
//!
//! The server is lenient about optional fields: `null`, missing keys and
//! empty strings all normalize to `None`, and unknown keys are skipped so
//! newer servers don't break older clients.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Feed, Folder, Item, MarkAction, ReducedItem, User};
use crate::store::PendingChanges;
use crate::util::{clean_string, null_if_empty};

/// A `major.minor.patch` server version. Trailing non-digit noise in a
/// component is tolerated, missing components default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(source: &str) -> Option<Version> {
        fn leading_digits(part: &str) -> Option<u64> {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }

        let mut parts = source.trim().split('.');
        let major = leading_digits(parts.next()?)?;
        let minor = parts.next().and_then(leading_digits).unwrap_or(0);
        let patch = parts.next().and_then(leading_digits).unwrap_or(0);
        Some(Version::new(major, minor, patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Response of the capability endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ApiLevels {
    #[serde(default, rename = "apiLevels")]
    pub api_levels: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Warnings {
    #[serde(rename = "improperlyConfiguredCron")]
    improperly_configured_cron: bool,
}

/// Raw status payload; v2 additionally embeds the user.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusResponse {
    version: Option<String>,
    warnings: Warnings,
    user: Option<WireUser>,
}

#[derive(Debug, Clone)]
pub struct Status {
    pub version: Option<Version>,
    pub improperly_configured_cron: bool,
    pub user: Option<User>,
}

impl StatusResponse {
    pub fn into_status(self) -> Status {
        let version = self.version.as_deref().and_then(|v| {
            let parsed = Version::parse(v);
            if parsed.is_none() {
                tracing::error!(version = v, "failed to parse server version");
            }
            parsed
        });
        Status {
            version,
            improperly_configured_cron: self.warnings.improperly_configured_cron,
            user: self.user.map(WireUser::into_user),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireFolder {
    pub id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FoldersResponse {
    #[serde(default)]
    pub folders: Vec<WireFolder>,
}

impl FoldersResponse {
    pub fn into_folders(self) -> Vec<Folder> {
        self.folders
            .into_iter()
            .filter_map(|folder| match folder.name {
                Some(name) => Some(Folder::new(folder.id, name)),
                None => {
                    tracing::warn!(folder_id = folder.id, "folder without name, skipping");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireFeed {
    pub id: i64,
    pub folder_id: Option<i64>,
    pub url: Option<String>,
    #[serde(alias = "title")]
    pub name: Option<String>,
    pub link: Option<String>,
    pub favicon_link: Option<String>,
    /// Epoch seconds.
    pub added: Option<i64>,
    pub ordering: Option<i64>,
    pub pinned: Option<bool>,
    pub update_error_count: Option<i64>,
    pub last_update_error: Option<String>,
    pub error: Option<WireFeedError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireFeedError {
    pub message: Option<String>,
}

impl WireFeed {
    pub fn into_feed(self) -> Feed {
        let added = self
            .added
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);
        Feed {
            id: self.id,
            folder_id: self.folder_id.unwrap_or(0),
            url: self.url.unwrap_or_default(),
            name: self.name.map(|n| clean_string(&n)).unwrap_or_default(),
            link: self.link.unwrap_or_default(),
            favicon_link: self.favicon_link.as_deref().and_then(null_if_empty),
            added,
            // Counters are recomputed from items after every merge
            unread_count: 0,
            starred_count: 0,
            ordering: self.ordering.unwrap_or(0),
            pinned: self.pinned.unwrap_or(false),
            update_error_count: self.update_error_count.unwrap_or(0),
            last_update_error: self
                .error
                .and_then(|e| e.message)
                .or(self.last_update_error),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedsResponse {
    #[serde(default)]
    pub feeds: Vec<WireFeed>,
    #[serde(default, rename = "starredCount")]
    pub starred_count: Option<i64>,
    #[serde(default, rename = "newestItemId")]
    pub newest_item_id: Option<i64>,
}

impl FeedsResponse {
    pub fn into_feeds(self) -> Vec<Feed> {
        self.feeds.into_iter().map(WireFeed::into_feed).collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireEnclosure {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireItem {
    pub id: i64,
    pub guid: Option<String>,
    pub guid_hash: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    /// Epoch seconds (API v1-2).
    pub pub_date: Option<i64>,
    /// ISO-8601 (API v2).
    pub published_at: Option<String>,
    /// Epoch seconds (API v1-2).
    pub updated_date: Option<i64>,
    /// ISO-8601 (API v2).
    pub updated_at: Option<String>,
    pub body: Option<String>,
    pub enclosure_mime: Option<String>,
    pub enclosure_link: Option<String>,
    pub enclosure: Option<WireEnclosure>,
    pub feed_id: Option<i64>,
    #[serde(alias = "isUnread")]
    pub unread: Option<bool>,
    #[serde(alias = "isStarred")]
    pub starred: Option<bool>,
    pub last_modified: Option<i64>,
    pub fingerprint: Option<String>,
    pub content_hash: Option<String>,
}

/// A decoded item payload: either a complete article or a reduced
/// id+hash+flags update.
#[derive(Debug, Clone)]
pub enum ParsedItem {
    Full(Item),
    Reduced(ReducedItem),
}

impl WireItem {
    /// Reduced payloads are recognizable by their missing title.
    pub fn classify(self) -> ParsedItem {
        if self.title.is_none() {
            return ParsedItem::Reduced(ReducedItem {
                id: self.id,
                content_hash: self.content_hash,
                unread: self.unread,
                starred: self.starred,
            });
        }

        let pub_date = self
            .pub_date
            .or_else(|| parse_iso_timestamp(self.published_at.as_deref()))
            .unwrap_or(0);
        let updated_at = self
            .updated_date
            .or_else(|| parse_iso_timestamp(self.updated_at.as_deref()));

        let (enclosure_mime, enclosure_link) = match self.enclosure {
            Some(enclosure) => (enclosure.mime_type, enclosure.url),
            None => (self.enclosure_mime, self.enclosure_link),
        };

        ParsedItem::Full(Item {
            id: self.id,
            guid: self.guid.unwrap_or_default(),
            guid_hash: self.guid_hash.unwrap_or_default(),
            url: self.url.as_deref().and_then(null_if_empty),
            title: clean_string(&self.title.unwrap_or_default()),
            author: self.author.as_deref().and_then(null_if_empty),
            pub_date,
            updated_at,
            body: self.body.unwrap_or_default(),
            enclosure_mime: enclosure_mime.as_deref().and_then(null_if_empty),
            enclosure_link: enclosure_link.as_deref().and_then(null_if_empty),
            feed_id: self.feed_id.unwrap_or(0),
            unread: self.unread.unwrap_or(true),
            unread_changed: false,
            starred: self.starred.unwrap_or(false),
            starred_changed: false,
            last_modified: self.last_modified.unwrap_or(0),
            fingerprint: self.fingerprint.as_deref().and_then(null_if_empty),
            content_hash: self.content_hash.as_deref().and_then(null_if_empty),
            active: false,
        })
    }
}

fn parse_iso_timestamp(source: Option<&str>) -> Option<i64> {
    let source = source?;
    match DateTime::parse_from_rfc3339(source) {
        Ok(dt) => Some(dt.timestamp()),
        Err(e) => {
            tracing::error!(date = source, error = %e, "failed to parse date");
            None
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemsResponse {
    #[serde(default)]
    pub items: Vec<WireItem>,
}

impl ItemsResponse {
    pub fn into_parsed(self) -> Vec<ParsedItem> {
        self.items.into_iter().map(WireItem::classify).collect()
    }
}

/// Split decoded payloads into full items and reduced updates.
pub fn split_items(parsed: Vec<ParsedItem>) -> (Vec<Item>, Vec<ReducedItem>) {
    let mut full = Vec::new();
    let mut reduced = Vec::new();
    for item in parsed {
        match item {
            ParsedItem::Full(item) => full.push(item),
            ParsedItem::Reduced(update) => reduced.push(update),
        }
    }
    (full, reduced)
}

/// Body for the v1-2 read/unread batch endpoints.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemIds {
    pub items: Vec<i64>,
}

impl ItemIds {
    pub fn new(items: &[Item]) -> Self {
        Self {
            items: items.iter().map(|item| item.id).collect(),
        }
    }
}

/// Body for the v1-2 star/unstar batch endpoints, keyed by feed and guid hash.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMap {
    pub items: Vec<MappedItem>,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedItem {
    #[serde(rename = "feedId")]
    pub feed_id: i64,
    #[serde(rename = "guidHash")]
    pub guid_hash: String,
}

impl ItemMap {
    pub fn new(items: &[Item]) -> Self {
        Self {
            items: items
                .iter()
                .map(|item| MappedItem {
                    feed_id: item.feed_id,
                    guid_hash: item.guid_hash.clone(),
                })
                .collect(),
        }
    }
}

/// Reduced upload for the v2 sync endpoint: only id, content hash and the
/// flags that actually changed.
#[derive(Debug, Default, Serialize)]
pub struct SyncUpload {
    pub items: Vec<SyncUploadItem>,
}

#[derive(Debug, Serialize)]
pub struct SyncUploadItem {
    pub id: i64,
    #[serde(rename = "contentHash", skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(rename = "isUnread", skip_serializing_if = "Option::is_none")]
    pub unread: Option<bool>,
    #[serde(rename = "isStarred", skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
}

impl SyncUpload {
    /// One upload entry per dirty item, merging read and star changes.
    pub fn from_pending(pending: &PendingChanges) -> Self {
        let mut merged: BTreeMap<i64, SyncUploadItem> = BTreeMap::new();

        for action in MarkAction::ALL {
            for item in pending.for_action(action) {
                let entry = merged.entry(item.id).or_insert_with(|| SyncUploadItem {
                    id: item.id,
                    content_hash: item.content_hash.clone(),
                    unread: None,
                    starred: None,
                });
                if action.is_star() {
                    entry.starred = Some(action.flag_value());
                } else {
                    entry.unread = Some(action.flag_value());
                }
            }
        }

        Self {
            items: merged.into_values().collect(),
        }
    }
}

/// Response of the v2 combined sync endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncResponse {
    pub folders: Option<Vec<WireFolder>>,
    pub feeds: Option<Vec<WireFeed>>,
    pub items: Option<Vec<WireItem>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireUser {
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub last_login_timestamp: Option<i64>,
    pub avatar: Option<WireAvatar>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireAvatar {
    pub data: Option<String>,
    pub mime: Option<String>,
}

impl WireUser {
    pub fn into_user(self) -> User {
        User {
            user_id: self.user_id.unwrap_or_default(),
            display_name: self.display_name.unwrap_or_default(),
            avatar: self.avatar.and_then(|a| a.data),
            last_login: self.last_login_timestamp,
        }
    }
}
