use serde::{Deserialize, Serialize};

/// Profile data for the logged-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub display_name: String,
    /// Inline avatar image data, if the server sent one.
    pub avatar: Option<String>,
    /// Last login, epoch seconds.
    pub last_login: Option<i64>,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.user_id
        } else {
            &self.display_name
        }
    }
}
