use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use url::Url;

use crate::app::Result;

/// Account credentials plus the server root every API URL is resolved
/// against.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub root_url: Url,
}

/// Authenticated HTTP client shared by the API implementations.
pub struct HttpManager {
    client: Client,
    credentials: Credentials,
}

impl HttpManager {
    pub fn new(username: &str, password: &str, mut root_url: Url) -> Result<Self> {
        // Joining relative API paths requires a trailing slash
        if !root_url.path().ends_with('/') {
            let path = format!("{}/", root_url.path());
            root_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("tidings/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            credentials: Credentials {
                username: username.to_string(),
                password: password.to_string(),
                root_url,
            },
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.request(Method::GET, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_url_gets_trailing_slash() {
        let http = HttpManager::new(
            "user",
            "pass",
            Url::parse("https://cloud.example.com/nextcloud").unwrap(),
        )
        .unwrap();
        assert_eq!(
            http.credentials().root_url.as_str(),
            "https://cloud.example.com/nextcloud/"
        );

        // A relative join now stays under the instance path
        let joined = http
            .credentials()
            .root_url
            .join("index.php/apps/news/api")
            .unwrap();
        assert_eq!(
            joined.as_str(),
            "https://cloud.example.com/nextcloud/index.php/apps/news/api"
        );
    }
}
