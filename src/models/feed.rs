use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub title: String,
    pub custom_title: String,
    pub url: Url,
    pub tag: String,
    pub notify: bool,
    pub last_sync: DateTime<Utc>,
    pub image_url: Option<Url>,
}

impl Feed {
    /// The title shown to the user: a custom title wins when set.
    pub fn display_title(&self) -> &str {
        if self.custom_title.is_empty() {
            &self.title
        } else {
            &self.custom_title
        }
    }
}
