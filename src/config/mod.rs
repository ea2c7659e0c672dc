//! Configuration and preferences.
//!
//! Read from `~/.config/tidings/config.toml` at startup; a commented default
//! file is created if none exists. Credentials and sync bookkeeping (detected
//! API level, v2 ETag) live in the same file and are written back with
//! [`Config::save`].

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub list: ListConfig,
    pub sync: SyncConfig,
    pub article: ArticleConfig,
    pub state: StateConfig,
}

/// Account credentials and server location.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Item list presentation preferences.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListConfig {
    pub show_only_unread: bool,
    pub sort_field: SortField,
    pub order: SortOrder,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            show_only_unread: false,
            sort_field: SortField::Id,
            order: SortOrder::Ascending,
        }
    }
}

/// Sync cadence and cache limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum cached items before old read ones are evicted.
    pub max_items: u64,
    /// Full sync interval for the daemon, e.g. "1h", "30m".
    pub interval: String,
    /// Retry interval for pending local changes.
    pub flush_interval: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_items: 10_000,
            interval: "1h".to_string(),
            flush_interval: "5m".to_string(),
        }
    }
}

/// Colors and font for the exported article view, as `#AARRGGBB` strings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArticleConfig {
    pub font: String,
    pub text_color: String,
    pub background_color: String,
    pub link_color: String,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            font: "system".to_string(),
            text_color: "#FF333333".to_string(),
            background_color: "#FFFFFFFF".to_string(),
            link_color: "#FF0082C9".to_string(),
        }
    }
}

/// Mutable session state, maintained by login and sync.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StateConfig {
    /// API level detected at login ("v1-2" or "v2").
    pub api_level: Option<String>,
    /// ETag of the last v2 sync response.
    pub etag: Option<String>,
    /// Set after a sync merged new data; cleared when a list is shown.
    pub needs_update_after_sync: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    PubDate,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::PubDate => "pub_date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// What a consumer of the config should do after a key changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// No follow-up needed.
    Nothing,
    /// Presentation must be rebuilt (theme/font changes).
    Recreate,
    /// Item lists must be re-queried (sort changes).
    Update,
}

impl Config {
    /// Action to take after the given dotted key changed.
    pub fn change_action(key: &str) -> ChangeAction {
        match key {
            "list.order" | "list.sort_field" | "list.show_only_unread" => ChangeAction::Update,
            key if key.starts_with("article.") => ChangeAction::Recreate,
            _ => ChangeAction::Nothing,
        }
    }

    /// Set a user-editable preference by its dotted key.
    ///
    /// Credentials and sync state are deliberately not settable here; they
    /// belong to the login flow.
    pub fn set_value(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        match key {
            "list.show_only_unread" => {
                self.list.show_only_unread = value
                    .parse()
                    .map_err(|_| format!("Expected true or false, got '{}'", value))?;
            }
            "list.sort_field" => {
                self.list.sort_field = match value {
                    "id" => SortField::Id,
                    "pub_date" => SortField::PubDate,
                    _ => return Err(format!("Expected id or pub_date, got '{}'", value)),
                };
            }
            "list.order" => {
                self.list.order = match value {
                    "ascending" => SortOrder::Ascending,
                    "descending" => SortOrder::Descending,
                    _ => return Err(format!("Expected ascending or descending, got '{}'", value)),
                };
            }
            "sync.max_items" => {
                self.sync.max_items = value
                    .parse()
                    .map_err(|_| format!("Expected a number, got '{}'", value))?;
            }
            "sync.interval" => self.sync.interval = value.to_string(),
            "sync.flush_interval" => self.sync.flush_interval = value.to_string(),
            "article.font" => self.article.font = value.to_string(),
            "article.text_color" | "article.background_color" | "article.link_color" => {
                if crate::util::parse_color(value).is_none() {
                    return Err(format!("Expected #RRGGBB or #AARRGGBB, got '{}'", value));
                }
                match key {
                    "article.text_color" => self.article.text_color = value.to_string(),
                    "article.background_color" => {
                        self.article.background_color = value.to_string()
                    }
                    _ => self.article.link_color = value.to_string(),
                }
            }
            _ => return Err(format!("Unknown or read-only key: {}", key)),
        }
        Ok(())
    }

    /// Read a preference by its dotted key.
    pub fn get_value(&self, key: &str) -> Option<String> {
        match key {
            "list.show_only_unread" => Some(self.list.show_only_unread.to_string()),
            "list.sort_field" => Some(
                match self.list.sort_field {
                    SortField::Id => "id",
                    SortField::PubDate => "pub_date",
                }
                .to_string(),
            ),
            "list.order" => Some(
                match self.list.order {
                    SortOrder::Ascending => "ascending",
                    SortOrder::Descending => "descending",
                }
                .to_string(),
            ),
            "sync.max_items" => Some(self.sync.max_items.to_string()),
            "sync.interval" => Some(self.sync.interval.clone()),
            "sync.flush_interval" => Some(self.sync.flush_interval.clone()),
            "article.font" => Some(self.article.font.clone()),
            "article.text_color" => Some(self.article.text_color.clone()),
            "article.background_color" => Some(self.article.background_color.clone()),
            "article.link_color" => Some(self.article.link_color.clone()),
            _ => None,
        }
    }

    /// The keys accepted by [`Config::set_value`].
    pub const EDITABLE_KEYS: [&'static str; 10] = [
        "list.show_only_unread",
        "list.sort_field",
        "list.order",
        "sync.max_items",
        "sync.interval",
        "sync.flush_interval",
        "article.font",
        "article.text_color",
        "article.background_color",
        "article.link_color",
    ];

    /// Load configuration from `path`, or the default location.
    ///
    /// A missing file is replaced by a commented default; missing keys in an
    /// existing file fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;

        Ok(config)
    }

    /// Persist the configuration, overwriting the file.
    pub fn save(&self, path: Option<&Path>) -> Result<(), ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(&config_path, content).map_err(|e| ConfigError::Io {
            path: config_path,
            source: e,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.server.url.is_some()
            && self.server.username.is_some()
            && self.state.api_level.is_some()
    }

    /// Get the default config file path: `~/.config/tidings/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("tidings").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Tidings configuration
#
# [server] is filled in by `tidings login`; the password is stored in plain
# text, so keep this file private.

[server]
# url = "https://cloud.example.com/"
# username = "jane"
# password = "secret"

[list]
# Hide read items from listings
show_only_unread = false

# Sort items by "id" or "pub_date"
sort_field = "id"

# "ascending" or "descending"
order = "ascending"

[sync]
# Cached items beyond this are evicted oldest-first (read, unstarred only)
max_items = 10000

# Full sync interval for the daemon, e.g. "30m", "1h", "1d"
interval = "1h"

# How often pending read/star changes are retried while unsynced
flush_interval = "5m"

[article]
# Font family for exported articles; "system" uses the platform default
font = "system"

# Colors are "#AARRGGBB" or "#RRGGBB"
text_color = "#FF333333"
background_color = "#FFFFFFFF"
link_color = "#FF0082C9"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.list.sort_field, SortField::Id);
        assert_eq!(config.list.order, SortOrder::Ascending);
        assert_eq!(config.sync.max_items, 10_000);
        assert_eq!(config.sync.flush_interval, "5m");
        assert!(config.server.url.is_none());
    }

    #[test]
    fn test_partial_config() {
        let content = r#"
[list]
order = "descending"
"#;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.list.order, SortOrder::Descending);
        // Default values
        assert_eq!(config.list.sort_field, SortField::Id);
        assert_eq!(config.sync.interval, "1h");
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert!(!config.has_credentials());
        assert!(!config.state.needs_update_after_sync);
    }

    #[test]
    fn test_roundtrip_preserves_state() {
        let mut config = Config::default();
        config.server.url = Some("https://cloud.example.com/".into());
        config.server.username = Some("jane".into());
        config.state.api_level = Some("v1-2".into());
        config.state.etag = Some("\"abc\"".into());

        let serialized = toml::to_string_pretty(&config).unwrap();
        let reloaded: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(reloaded.server.url.as_deref(), Some("https://cloud.example.com/"));
        assert_eq!(reloaded.state.etag.as_deref(), Some("\"abc\""));
        assert!(reloaded.has_credentials());
    }

    #[test]
    fn test_change_actions() {
        assert_eq!(Config::change_action("list.order"), ChangeAction::Update);
        assert_eq!(Config::change_action("list.sort_field"), ChangeAction::Update);
        assert_eq!(
            Config::change_action("article.text_color"),
            ChangeAction::Recreate
        );
        assert_eq!(Config::change_action("sync.interval"), ChangeAction::Nothing);
    }

    #[test]
    fn test_sort_sql_fragments() {
        assert_eq!(SortField::PubDate.column(), "pub_date");
        assert_eq!(SortOrder::Descending.sql(), "DESC");
    }

    #[test]
    fn test_set_value() {
        let mut config = Config::default();

        config.set_value("list.order", "descending").unwrap();
        assert_eq!(config.list.order, SortOrder::Descending);

        config.set_value("sync.max_items", "500").unwrap();
        assert_eq!(config.sync.max_items, 500);

        config.set_value("article.text_color", "#FF112233").unwrap();
        assert_eq!(config.article.text_color, "#FF112233");

        assert!(config.set_value("list.order", "sideways").is_err());
        assert!(config.set_value("article.text_color", "red").is_err());
        assert!(config.set_value("server.password", "nope").is_err());
        assert!(config.set_value("bogus", "x").is_err());
    }

    #[test]
    fn test_get_value_covers_editable_keys() {
        let config = Config::default();
        for key in Config::EDITABLE_KEYS {
            assert!(config.get_value(key).is_some(), "missing getter for {}", key);
        }
        assert_eq!(config.get_value("server.password"), None);
    }

    #[test]
    fn test_set_get_roundtrip() {
        let mut config = Config::default();
        for key in Config::EDITABLE_KEYS {
            let value = config.get_value(key).unwrap();
            config.set_value(key, &value).unwrap();
            assert_eq!(config.get_value(key).unwrap(), value);
        }
    }
}
