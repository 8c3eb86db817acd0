use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub title: String,
    pub description: String,
    pub plain_title: String,
    pub plain_snippet: String,
    pub unread: bool,
    pub notified: bool,
    pub author: Option<String>,
    pub enclosure_link: Option<String>,
    pub image_url: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
    pub link: Option<String>,
}
