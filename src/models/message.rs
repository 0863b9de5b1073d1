//! Feed message data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Integer message identifier, strictly increasing within a feed.
pub type MessageId = i64;

/// A message pulled from a feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedMessage {
    /// Message id within the channel
    pub id: MessageId,

    /// Publication time, if the feed exposes one
    pub timestamp: Option<DateTime<Utc>>,

    /// Message text (empty for media-only posts)
    #[serde(default)]
    pub text: String,
}

impl FeedMessage {
    pub fn new(id: MessageId, timestamp: Option<DateTime<Utc>>, text: impl Into<String>) -> Self {
        Self {
            id,
            timestamp,
            text: text.into(),
        }
    }

    /// Text with surrounding whitespace removed.
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}
