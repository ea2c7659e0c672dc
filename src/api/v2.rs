//! Client for the News API v2.
//!
//! v2 replaces the per-concern endpoints with one combined `sync` call:
//! dirty items go up as reduced payloads, changes since the supplied ETag
//! come back down.

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::Method;
use serde_json::json;
use url::Url;

use crate::api::http::HttpManager;
use crate::api::json::{
    FeedsResponse, ParsedItem, Status, StatusResponse, SyncResponse, SyncUpload, WireFeed,
    WireFolder, WireItem,
};
use crate::api::{DeltaSync, Level, NewsApi, QueryType, API_ROOT};
use crate::app::{Result, TidingsError};
use crate::domain::{Feed, Folder, Item, MarkAction, User};
use crate::store::PendingChanges;

pub struct ApiV2 {
    http: HttpManager,
    base: Url,
}

impl ApiV2 {
    pub fn new(http: HttpManager) -> Result<Self> {
        let base = http
            .credentials()
            .root_url
            .join(&format!("{}/{}/", API_ROOT, Level::V2.as_str()))?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }
}

#[async_trait]
impl NewsApi for ApiV2 {
    fn level(&self) -> Level {
        Level::V2
    }

    async fn status(&self) -> Result<Status> {
        let response = self.http.get(self.base.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TidingsError::Api {
                status: status.as_u16(),
                context: "status".to_string(),
            });
        }
        let body: StatusResponse = response.json().await?;
        Ok(body.into_status())
    }

    async fn user(&self) -> Result<Option<User>> {
        // v2 has no user endpoint; the profile rides along with the metadata
        Ok(self.status().await?.user)
    }

    async fn folders(&self) -> Result<Vec<Folder>> {
        Err(TidingsError::Unsupported("Folder listing"))
    }

    async fn feeds(&self) -> Result<Vec<Feed>> {
        Err(TidingsError::Unsupported("Feed listing"))
    }

    async fn items(
        &self,
        _batch_size: i64,
        _offset: i64,
        _query: QueryType,
        _id: i64,
        _get_read: bool,
        _oldest_first: bool,
    ) -> Result<Vec<ParsedItem>> {
        Err(TidingsError::Unsupported("Load more"))
    }

    async fn updated_items(
        &self,
        _last_modified: i64,
        _query: QueryType,
        _id: i64,
    ) -> Result<Vec<ParsedItem>> {
        Err(TidingsError::Unsupported("Incremental item fetch"))
    }

    async fn mark(&self, _action: MarkAction, _items: &[Item]) -> Result<()> {
        // State changes travel inside the sync upload instead
        Err(TidingsError::Unsupported("Batch mark endpoints"))
    }

    async fn create_feed(&self, url: &str, folder_id: i64) -> Result<Feed> {
        let request = self
            .http
            .request(Method::POST, self.endpoint("feeds")?)
            .json(&json!({ "url": url, "folderId": folder_id }));
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TidingsError::Api {
                status: status.as_u16(),
                context: "feeds".to_string(),
            });
        }
        let body: FeedsResponse = response.json().await?;
        body.into_feeds()
            .into_iter()
            .next()
            .ok_or_else(|| TidingsError::Other("Server returned no feed".into()))
    }

    async fn move_feed(&self, feed_id: i64, folder_id: i64) -> Result<()> {
        let request = self
            .http
            .request(Method::PATCH, self.endpoint(&format!("feeds/{}", feed_id))?)
            .json(&json!({ "folderId": folder_id }));
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TidingsError::Api {
                status: status.as_u16(),
                context: "feeds/change".to_string(),
            });
        }
        Ok(())
    }

    async fn delete_feed(&self, feed_id: i64) -> Result<()> {
        let request = self
            .http
            .request(Method::DELETE, self.endpoint(&format!("feeds/{}", feed_id))?);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TidingsError::Api {
                status: status.as_u16(),
                context: "feeds/delete".to_string(),
            });
        }
        Ok(())
    }

    async fn sync_delta(&self, etag: Option<&str>, pending: &PendingChanges) -> Result<DeltaSync> {
        let url = self.endpoint("sync")?;
        let request = match etag {
            // First contact: fetch everything, upload nothing
            None => self.http.get(url),
            Some(etag) => self
                .http
                .request(Method::POST, url)
                .header(IF_NONE_MATCH, etag)
                .json(&SyncUpload::from_pending(pending)),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TidingsError::Api {
                status: status.as_u16(),
                context: "sync".to_string(),
            });
        }

        let new_etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        let body: SyncResponse = response.json().await?;
        Ok(DeltaSync {
            etag: new_etag,
            folders: body.folders.map(|folders| {
                folders
                    .into_iter()
                    .filter_map(|f: WireFolder| f.name.map(|name| Folder::new(f.id, name)))
                    .collect()
            }),
            feeds: body
                .feeds
                .map(|feeds| feeds.into_iter().map(WireFeed::into_feed).collect()),
            items: body
                .items
                .map(|items| items.into_iter().map(WireItem::classify).collect())
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_includes_level() {
        let http = HttpManager::new(
            "user",
            "pass",
            Url::parse("https://cloud.example.com/").unwrap(),
        )
        .unwrap();
        let api = ApiV2::new(http).unwrap();
        assert_eq!(
            api.base.as_str(),
            "https://cloud.example.com/index.php/apps/news/api/v2/"
        );
    }

    #[test]
    fn test_unsupported_operations() {
        let http = HttpManager::new(
            "user",
            "pass",
            Url::parse("https://cloud.example.com/").unwrap(),
        )
        .unwrap();
        let api = ApiV2::new(http).unwrap();

        let result = tokio_test::block_on(api.items(100, 0, QueryType::Feed, 1, true, false));
        assert!(matches!(result, Err(TidingsError::Unsupported(_))));

        let result = tokio_test::block_on(api.mark(MarkAction::MarkRead, &[]));
        assert!(matches!(result, Err(TidingsError::Unsupported(_))));
    }
}
