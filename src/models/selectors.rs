// src/models/selectors.rs

//! CSS selectors for scraping a channel's public web preview.

use serde::{Deserialize, Serialize};

/// CSS selectors for scraping a channel preview page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewSelectors {
    /// Selector for each message container
    #[serde(default = "defaults::message_selector")]
    pub message_selector: String,

    /// Attribute on the container holding `channel/id`
    #[serde(default = "defaults::post_attr")]
    pub post_attr: String,

    /// Selector for the message's own text element (not a quoted reply)
    #[serde(default = "defaults::text_selector")]
    pub text_selector: String,

    /// Selector for the timestamp element within a message
    #[serde(default = "defaults::time_selector")]
    pub time_selector: String,

    /// Attribute on the timestamp element holding an RFC 3339 date
    #[serde(default = "defaults::time_attr")]
    pub time_attr: String,
}

impl Default for PreviewSelectors {
    fn default() -> Self {
        Self {
            message_selector: defaults::message_selector(),
            post_attr: defaults::post_attr(),
            text_selector: defaults::text_selector(),
            time_selector: defaults::time_selector(),
            time_attr: defaults::time_attr(),
        }
    }
}

mod defaults {
    pub fn message_selector() -> String {
        ".tgme_widget_message[data-post]".into()
    }
    pub fn post_attr() -> String {
        "data-post".into()
    }
    pub fn text_selector() -> String {
        ".tgme_widget_message_text.js-message_text".into()
    }
    pub fn time_selector() -> String {
        "time[datetime]".into()
    }
    pub fn time_attr() -> String {
        "datetime".into()
    }
}
