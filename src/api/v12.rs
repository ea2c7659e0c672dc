//! Client for the News API v1-2.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::api::http::HttpManager;
use crate::api::json::{
    FeedsResponse, FoldersResponse, ItemIds, ItemMap, ItemsResponse, ParsedItem, Status,
    StatusResponse, WireUser,
};
use crate::api::{DeltaSync, Level, NewsApi, QueryType, API_ROOT};
use crate::app::{Result, TidingsError};
use crate::domain::{Feed, Folder, Item, MarkAction, User};
use crate::store::PendingChanges;

pub struct ApiV12 {
    http: HttpManager,
    base: Url,
}

impl ApiV12 {
    pub fn new(http: HttpManager) -> Result<Self> {
        let base = http
            .credentials()
            .root_url
            .join(&format!("{}/{}/", API_ROOT, Level::V12.as_str()))?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TidingsError::Api {
                status: status.as_u16(),
                context: context.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    async fn expect_ok(&self, request: RequestBuilder, context: &str) -> Result<()> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TidingsError::Api {
                status: status.as_u16(),
                context: context.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NewsApi for ApiV12 {
    fn level(&self) -> Level {
        Level::V12
    }

    async fn status(&self) -> Result<Status> {
        let response: StatusResponse = self
            .fetch_json(self.http.get(self.endpoint("status")?), "status")
            .await?;
        Ok(response.into_status())
    }

    async fn user(&self) -> Result<Option<User>> {
        let response: WireUser = self
            .fetch_json(self.http.get(self.endpoint("user")?), "user")
            .await?;
        Ok(Some(response.into_user()))
    }

    async fn folders(&self) -> Result<Vec<Folder>> {
        let response: FoldersResponse = self
            .fetch_json(self.http.get(self.endpoint("folders")?), "folders")
            .await?;
        Ok(response.into_folders())
    }

    async fn feeds(&self) -> Result<Vec<Feed>> {
        let response: FeedsResponse = self
            .fetch_json(self.http.get(self.endpoint("feeds")?), "feeds")
            .await?;
        Ok(response.into_feeds())
    }

    async fn items(
        &self,
        batch_size: i64,
        offset: i64,
        query: QueryType,
        id: i64,
        get_read: bool,
        oldest_first: bool,
    ) -> Result<Vec<ParsedItem>> {
        let request = self.http.get(self.endpoint("items")?).query(&[
            ("batchSize", batch_size.to_string()),
            ("offset", offset.to_string()),
            ("type", query.code().to_string()),
            ("id", id.to_string()),
            ("getRead", get_read.to_string()),
            ("oldestFirst", oldest_first.to_string()),
        ]);
        let response: ItemsResponse = self.fetch_json(request, "items").await?;
        Ok(response.into_parsed())
    }

    async fn updated_items(
        &self,
        last_modified: i64,
        query: QueryType,
        id: i64,
    ) -> Result<Vec<ParsedItem>> {
        let request = self.http.get(self.endpoint("items/updated")?).query(&[
            ("lastModified", last_modified.to_string()),
            ("type", query.code().to_string()),
            ("id", id.to_string()),
        ]);
        let response: ItemsResponse = self.fetch_json(request, "items/updated").await?;
        Ok(response.into_parsed())
    }

    async fn mark(&self, action: MarkAction, items: &[Item]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let (path, body) = match action {
            MarkAction::MarkRead => (
                "items/read/multiple",
                serde_json::to_value(ItemIds::new(items))?,
            ),
            MarkAction::MarkUnread => (
                "items/unread/multiple",
                serde_json::to_value(ItemIds::new(items))?,
            ),
            MarkAction::MarkStarred => (
                "items/star/multiple",
                serde_json::to_value(ItemMap::new(items))?,
            ),
            MarkAction::MarkUnstarred => (
                "items/unstar/multiple",
                serde_json::to_value(ItemMap::new(items))?,
            ),
        };

        let request = self
            .http
            .request(Method::PUT, self.endpoint(path)?)
            .json(&body);
        self.expect_ok(request, path).await
    }

    async fn create_feed(&self, url: &str, folder_id: i64) -> Result<Feed> {
        let request = self
            .http
            .request(Method::POST, self.endpoint("feeds")?)
            .json(&json!({ "url": url, "folderId": folder_id }));
        let response: FeedsResponse = self.fetch_json(request, "feeds").await?;
        response
            .into_feeds()
            .into_iter()
            .next()
            .ok_or_else(|| TidingsError::Other("Server returned no feed".into()))
    }

    async fn move_feed(&self, feed_id: i64, folder_id: i64) -> Result<()> {
        let request = self
            .http
            .request(Method::PUT, self.endpoint(&format!("feeds/{}/move", feed_id))?)
            .json(&json!({ "folderId": folder_id }));
        self.expect_ok(request, "feeds/move").await
    }

    async fn delete_feed(&self, feed_id: i64) -> Result<()> {
        let request = self
            .http
            .request(Method::DELETE, self.endpoint(&format!("feeds/{}", feed_id))?);
        self.expect_ok(request, "feeds/delete").await
    }

    async fn sync_delta(&self, _etag: Option<&str>, _pending: &PendingChanges) -> Result<DeltaSync> {
        Err(TidingsError::Unsupported("Combined sync"))
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
        let api = ApiV12::new(http).unwrap();
        assert_eq!(
            api.base.as_str(),
            "https://cloud.example.com/index.php/apps/news/api/v1-2/"
        );
        assert_eq!(
            api.endpoint("items/updated").unwrap().as_str(),
            "https://cloud.example.com/index.php/apps/news/api/v1-2/items/updated"
        );
    }
}
