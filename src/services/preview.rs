// src/services/preview.rs

//! Feed client for a channel's public web preview.
//!
//! The preview lists messages after a given id (`{base}/{channel}?after={id}`),
//! so paging forward only needs the largest id seen so far.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{AppError, Result};
use crate::models::{FeedConfig, FeedMessage, MessageId, PreviewSelectors};
use crate::services::MessageFeed;
use crate::utils::http::{create_async_client, fetch_text_async};
use crate::utils::url::{post_id, preview_page};

/// Compiled selectors for the preview markup.
#[derive(Debug, Clone)]
struct CompiledSelectors {
    message: Selector,
    text: Selector,
    time: Selector,
    link: Selector,
    post_attr: String,
    time_attr: String,
}

impl CompiledSelectors {
    fn compile(selectors: &PreviewSelectors) -> Result<Self> {
        Ok(Self {
            message: parse_selector(&selectors.message_selector)?,
            text: parse_selector(&selectors.text_selector)?,
            time: parse_selector(&selectors.time_selector)?,
            link: parse_selector("a[href]")?,
            post_attr: selectors.post_attr.clone(),
            time_attr: selectors.time_attr.clone(),
        })
    }
}

/// Service reading a public channel through its web preview pages.
pub struct WebPreviewFeed {
    client: reqwest::Client,
    base_url: String,
    delay: Duration,
    selectors: CompiledSelectors,
}

impl WebPreviewFeed {
    /// Create a feed with its own configured HTTP client.
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = create_async_client(config)?;
        Self::with_client(config, client)
    }

    /// Create a feed sharing an existing HTTP client.
    pub fn with_client(config: &FeedConfig, client: reqwest::Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            delay: Duration::from_millis(config.request_delay_ms),
            selectors: CompiledSelectors::compile(&config.selectors)?,
        })
    }

    /// Parse the messages of one preview page, in document order.
    ///
    /// Containers without a usable id are skipped.
    pub fn parse_page(&self, html: &str) -> Vec<FeedMessage> {
        let document = Html::parse_document(html);
        let sel = &self.selectors;
        let mut messages = Vec::new();

        for container in document.select(&sel.message) {
            let Some(id) = container.value().attr(&sel.post_attr).and_then(post_id) else {
                log::debug!("Skipping preview message without a post id");
                continue;
            };

            let text = container
                .select(&sel.text)
                .next()
                .map(|el| self.render_text(el))
                .unwrap_or_default();

            let timestamp = container
                .select(&sel.time)
                .next()
                .and_then(|el| el.value().attr(&sel.time_attr))
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|dt| dt.with_timezone(&Utc));

            messages.push(FeedMessage::new(id, timestamp, text));
        }

        messages
    }

    /// Render message text with `<br>` as newlines.
    ///
    /// Link captions are often shortened, so hrefs missing from the visible
    /// text are appended on their own lines.
    fn render_text(&self, element: ElementRef<'_>) -> String {
        let mut out = String::new();
        for node in element.descendants() {
            match node.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) if el.name() == "br" => out.push('\n'),
                _ => {}
            }
        }

        let hrefs: Vec<&str> = element
            .select(&self.selectors.link)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| href.starts_with("http"))
            .collect();
        for href in hrefs {
            if !out.contains(href) {
                out.push('\n');
                out.push_str(href);
            }
        }

        out.trim().to_string()
    }
}

#[async_trait]
impl MessageFeed for WebPreviewFeed {
    async fn fetch_after(&self, channel: &str, after: MessageId) -> Result<Vec<FeedMessage>> {
        let url = preview_page(&self.base_url, channel, after)?;
        log::debug!("Fetching {}", url);

        let body = fetch_text_async(&self.client, url.as_str())
            .await
            .map_err(|e| AppError::feed(channel, e))?;
        Ok(self.parse_page(&body))
    }

    fn page_delay(&self) -> Duration {
        self.delay
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body><section class="tgme_channel_history">
          <div class="tgme_widget_message_wrap">
            <div class="tgme_widget_message js-widget_message" data-post="chan/101">
              <div class="tgme_widget_message_text js-message_text" dir="auto">
                AZ-104 course<br/>Get it:
                <a href="https://www.udemy.com/course/az-104/?couponCode=FREE1">udemy.com/course/az-1…</a>
              </div>
              <a class="tgme_widget_message_date" href="https://t.me/chan/101">
                <time datetime="2024-05-01T10:00:00+00:00" class="time">10:00</time>
              </a>
            </div>
          </div>
          <div class="tgme_widget_message_wrap">
            <div class="tgme_widget_message js-widget_message" data-post="chan/102">
              <a class="tgme_widget_message_date" href="https://t.me/chan/102">
                <time datetime="2024-05-01T12:30:00+02:00" class="time">12:30</time>
              </a>
            </div>
          </div>
          <div class="tgme_widget_message js-widget_message" data-post="chan/oops"></div>
        </section></body></html>
    "#;

    fn feed() -> WebPreviewFeed {
        WebPreviewFeed::with_client(&FeedConfig::default(), reqwest::Client::new()).unwrap()
    }

    #[test]
    fn test_parse_page_messages() {
        let messages = feed().parse_page(PAGE);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, 101);
        assert_eq!(messages[1].id, 102);
        assert!(messages[1].text.is_empty());
    }

    #[test]
    fn test_parse_page_text_and_links() {
        let messages = feed().parse_page(PAGE);
        let text = &messages[0].text;

        assert!(text.starts_with("AZ-104 course\n"));
        assert!(text.ends_with("\nhttps://www.udemy.com/course/az-104/?couponCode=FREE1"));
    }

    #[test]
    fn test_parse_page_timestamps_in_utc() {
        let messages = feed().parse_page(PAGE);

        assert_eq!(
            messages[0].timestamp.unwrap().to_rfc3339(),
            "2024-05-01T10:00:00+00:00"
        );
        assert_eq!(
            messages[1].timestamp.unwrap().to_rfc3339(),
            "2024-05-01T10:30:00+00:00"
        );
    }

    #[test]
    fn test_reply_quote_not_taken_as_text() {
        let page = r#"
            <div class="tgme_widget_message js-widget_message" data-post="chan/200">
              <a class="tgme_widget_message_reply" href="https://t.me/chan/150">
                <div class="tgme_widget_message_author">chan</div>
                <div class="tgme_widget_message_text js-message_reply_text">Earlier post about cooking</div>
              </a>
              <div class="tgme_widget_message_text js-message_text" dir="auto">
                AZ-104 free course https://www.udemy.com/course/az/?couponCode=REAL
              </div>
            </div>
        "#;
        let messages = feed().parse_page(page);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 200);
        assert!(messages[0].text.starts_with("AZ-104 free course"));
        assert!(messages[0].text.contains("couponCode=REAL"));
        assert!(!messages[0].text.contains("cooking"));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut config = FeedConfig::default();
        config.selectors.message_selector = "[[broken".to_string();
        let result = WebPreviewFeed::with_client(&config, reqwest::Client::new());
        assert!(matches!(result, Err(AppError::Selector { .. })));
    }
}
