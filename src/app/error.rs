use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TidingsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Login(LoginError),

    #[error("Server returned HTTP {status} for {context}")]
    Api { status: u16, context: String },

    #[error("Feed not found: {0}")]
    FeedNotFound(i64),

    #[error("Item not found: {0}")]
    ItemNotFound(i64),

    #[error("{0} is not supported by this API level")]
    Unsupported(&'static str),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TidingsError>;

/// Which login form field a failure points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginSection {
    Url,
    User,
    None,
    Unknown,
}

/// A network or server failure folded into a coarse human-readable message.
#[derive(Debug, Clone)]
pub struct LoginError {
    pub section: LoginSection,
    pub message: String,
}

impl LoginError {
    pub fn new(section: LoginSection, message: impl Into<String>) -> Self {
        Self {
            section,
            message: message.into(),
        }
    }

    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 => Self::new(LoginSection::User, "Access forbidden, check username and password"),
            403 | 404 => Self::new(LoginSection::Url, "News app not found on server, check the URL"),
            405 => Self::new(LoginSection::Url, "Server is too old, please update it"),
            code => Self::new(LoginSection::Unknown, format!("Server error: HTTP {}", code)),
        }
    }

    /// Classify a transport-level failure the way the login screen reports it.
    pub fn from_network_error(error: &reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::from_http_status(status.as_u16());
        }

        let mut chain = Vec::new();
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        let description = chain.join(": ");
        let lowered = description.to_lowercase();

        if lowered.contains("certificate") {
            Self::new(LoginSection::Url, "The server's TLS certificate is not trusted")
        } else if lowered.contains("dns") || lowered.contains("failed to lookup") {
            Self::new(LoginSection::Url, "Unknown host, check the URL")
        } else if error.is_connect() {
            Self::new(LoginSection::Url, "Could not connect to the server")
        } else if error.is_timeout() {
            Self::new(LoginSection::Url, "Connection to the server timed out")
        } else {
            Self::new(LoginSection::Unknown, description)
        }
    }
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<LoginError> for TidingsError {
    fn from(error: LoginError) -> Self {
        TidingsError::Login(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert_eq!(LoginError::from_http_status(401).section, LoginSection::User);
        assert_eq!(LoginError::from_http_status(403).section, LoginSection::Url);
        assert_eq!(LoginError::from_http_status(404).section, LoginSection::Url);
        assert!(LoginError::from_http_status(405)
            .message
            .contains("too old"));
        assert_eq!(
            LoginError::from_http_status(500).section,
            LoginSection::Unknown
        );
    }

    #[test]
    fn test_login_error_displays_message() {
        let error = LoginError::new(LoginSection::None, "something failed");
        assert_eq!(error.to_string(), "something failed");
        let wrapped: TidingsError = error.into();
        assert_eq!(wrapped.to_string(), "something failed");
    }
}
