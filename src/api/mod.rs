//! REST client layer.
//!
//! Two incompatible API versions live behind the [`NewsApi`] trait: the
//! classic v1-2 interface with one endpoint per concern, and v2 with a
//! combined ETag-driven `sync` endpoint. The active version is negotiated at
//! login from the server's capability response and stored in the config.

pub mod http;
pub mod json;
pub mod v12;
pub mod v2;

use async_trait::async_trait;
use url::Url;

use crate::app::{LoginError, LoginSection, Result, TidingsError};
use crate::config::Config;
use crate::domain::{Feed, Folder, Item, MarkAction, User};
use crate::store::PendingChanges;

use http::HttpManager;
use json::{ApiLevels, ParsedItem, Status, Version};

pub use v12::ApiV12;
pub use v2::ApiV2;

/// Path of the News app API below the server root.
pub const API_ROOT: &str = "index.php/apps/news/api";

/// Page size for load-more fetches.
pub const BATCH_SIZE: i64 = 100;

/// Oldest server release the client will talk to.
pub const MIN_SERVER_VERSION: Version = Version::new(8, 8, 2);

/// A supported API level, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    V2,
    V12,
}

impl Level {
    /// Highest-preference first; negotiation walks this in order.
    pub const ALL: [Level; 2] = [Level::V2, Level::V12];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::V2 => "v2",
            Level::V12 => "v1-2",
        }
    }

    pub fn from_str(level: &str) -> Option<Level> {
        Self::ALL.into_iter().find(|l| l.as_str() == level)
    }
}

/// Pick the highest mutually supported level from a capability response.
pub fn highest_supported(levels: &[String]) -> Option<Level> {
    Level::ALL
        .into_iter()
        .find(|level| levels.iter().any(|server| server == level.as_str()))
}

/// Item query scope of the v1-2 `items` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Feed,
    Folder,
    Starred,
    All,
}

impl QueryType {
    pub fn code(self) -> i64 {
        match self {
            QueryType::Feed => 0,
            QueryType::Folder => 1,
            QueryType::Starred => 2,
            QueryType::All => 3,
        }
    }
}

/// Result of a v2 combined sync round-trip.
#[derive(Debug, Default)]
pub struct DeltaSync {
    /// ETag to remember for the next delta request.
    pub etag: Option<String>,
    pub folders: Option<Vec<Folder>>,
    pub feeds: Option<Vec<Feed>>,
    pub items: Vec<ParsedItem>,
}

/// Version-independent view of the News API.
#[async_trait]
pub trait NewsApi: Send + Sync {
    fn level(&self) -> Level;

    async fn status(&self) -> Result<Status>;
    async fn user(&self) -> Result<Option<User>>;

    async fn folders(&self) -> Result<Vec<Folder>>;
    async fn feeds(&self) -> Result<Vec<Feed>>;

    async fn items(
        &self,
        batch_size: i64,
        offset: i64,
        query: QueryType,
        id: i64,
        get_read: bool,
        oldest_first: bool,
    ) -> Result<Vec<ParsedItem>>;

    async fn updated_items(
        &self,
        last_modified: i64,
        query: QueryType,
        id: i64,
    ) -> Result<Vec<ParsedItem>>;

    /// Upload one batch of local state changes.
    async fn mark(&self, action: MarkAction, items: &[Item]) -> Result<()>;

    async fn create_feed(&self, url: &str, folder_id: i64) -> Result<Feed>;
    async fn move_feed(&self, feed_id: i64, folder_id: i64) -> Result<()>;
    async fn delete_feed(&self, feed_id: i64) -> Result<()>;

    /// v2 combined sync: uploads dirty items and fetches changes since
    /// `etag`. v1-2 reports this as unsupported.
    async fn sync_delta(&self, etag: Option<&str>, pending: &PendingChanges) -> Result<DeltaSync>;
}

pub fn build_client(level: Level, http: HttpManager) -> Result<Box<dyn NewsApi>> {
    Ok(match level {
        Level::V12 => Box::new(ApiV12::new(http)?),
        Level::V2 => Box::new(ApiV2::new(http)?),
    })
}

/// Build a client from stored credentials and the API level detected at
/// login.
pub fn client_from_config(config: &Config) -> Result<Box<dyn NewsApi>> {
    let url = config
        .server
        .url
        .as_deref()
        .ok_or_else(|| TidingsError::Config("Not logged in, run `tidings login` first".into()))?;
    let username = config.server.username.as_deref().unwrap_or_default();
    let password = config.server.password.as_deref().unwrap_or_default();
    let level = config
        .state
        .api_level
        .as_deref()
        .and_then(Level::from_str)
        .ok_or_else(|| {
            TidingsError::Config("No detected API level, run `tidings login` again".into())
        })?;

    let http = HttpManager::new(username, password, Url::parse(url)?)?;
    build_client(level, http)
}

/// Successful login: the negotiated level and the server's status.
#[derive(Debug)]
pub struct LoginOutcome {
    pub level: Level,
    pub status: Status,
}

/// Probe the capability endpoint, negotiate an API level, and verify the
/// server version. On success the caller persists the outcome to the config.
pub async fn login(base_url: &str, username: &str, password: &str) -> Result<LoginOutcome> {
    let root = Url::parse(base_url)?;
    let http = HttpManager::new(username, password, root)?;

    let capability_url = http.credentials().root_url.join(API_ROOT)?;
    let response = http
        .get(capability_url)
        .send()
        .await
        .map_err(|e| TidingsError::Login(LoginError::from_network_error(&e)))?;

    let status_code = response.status();
    if !status_code.is_success() {
        return Err(LoginError::from_http_status(status_code.as_u16()).into());
    }

    let levels: ApiLevels = response
        .json()
        .await
        .map_err(|e| TidingsError::Login(LoginError::from_network_error(&e)))?;

    let level = highest_supported(&levels.api_levels).ok_or_else(|| {
        LoginError::new(
            LoginSection::None,
            "Server does not support a compatible API level",
        )
    })?;

    let api = build_client(level, http)?;
    let status = api.status().await.map_err(classify_login_failure)?;

    let version = status.version.ok_or_else(|| {
        LoginError::new(LoginSection::None, "Could not determine the server version")
    })?;
    if version < MIN_SERVER_VERSION {
        return Err(LoginError::new(
            LoginSection::Url,
            format!(
                "Server version {} is too old, {} or later is required",
                version, MIN_SERVER_VERSION
            ),
        )
        .into());
    }

    Ok(LoginOutcome { level, status })
}

fn classify_login_failure(error: TidingsError) -> TidingsError {
    match error {
        TidingsError::Http(e) => TidingsError::Login(LoginError::from_network_error(&e)),
        TidingsError::Api { status, .. } => {
            TidingsError::Login(LoginError::from_http_status(status))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_highest_supported_prefers_v2() {
        assert_eq!(
            highest_supported(&levels(&["v1-2", "v2"])),
            Some(Level::V2)
        );
        assert_eq!(highest_supported(&levels(&["v1-2"])), Some(Level::V12));
        assert_eq!(highest_supported(&levels(&["v3"])), None);
        assert_eq!(highest_supported(&[]), None);
    }

    #[test]
    fn test_level_strings_roundtrip() {
        for level in Level::ALL {
            assert_eq!(Level::from_str(level.as_str()), Some(level));
        }
        assert_eq!(Level::from_str("v9"), None);
    }

    #[test]
    fn test_query_type_codes() {
        assert_eq!(QueryType::Feed.code(), 0);
        assert_eq!(QueryType::Folder.code(), 1);
        assert_eq!(QueryType::Starred.code(), 2);
        assert_eq!(QueryType::All.code(), 3);
    }

    #[test]
    fn test_client_from_config_requires_login() {
        let config = Config::default();
        assert!(matches!(
            client_from_config(&config),
            Err(TidingsError::Config(_))
        ));

        let mut config = Config::default();
        config.server.url = Some("https://cloud.example.com/".into());
        config.server.username = Some("jane".into());
        config.server.password = Some("secret".into());
        assert!(matches!(
            client_from_config(&config),
            Err(TidingsError::Config(_))
        ));

        config.state.api_level = Some("v1-2".into());
        assert!(client_from_config(&config).is_ok());
    }
}
