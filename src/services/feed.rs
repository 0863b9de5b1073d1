// src/services/feed.rs

//! Feed collaborator seam.
//!
//! A [`MessageFeed`] only knows how to fetch one page of messages after a
//! given id. [`stream_after`] turns that into the lazy, ascending sequence the
//! scan pipeline consumes.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{FeedMessage, MessageId};

/// Source of channel messages, fetched page by page.
#[async_trait]
pub trait MessageFeed: Send + Sync {
    /// Fetch a page of messages with ids strictly greater than `after`.
    ///
    /// An empty page means the feed is exhausted.
    async fn fetch_after(&self, channel: &str, after: MessageId) -> Result<Vec<FeedMessage>>;

    /// Pause between consecutive page requests.
    fn page_delay(&self) -> Duration {
        Duration::ZERO
    }
}

struct PageCursor {
    after: MessageId,
    buffer: VecDeque<FeedMessage>,
    fetched_any: bool,
    exhausted: bool,
}

/// Stream every message after `after` in ascending id order.
///
/// Pages are normalized (filtered to ids past the cursor, sorted, deduplicated)
/// so a sloppy feed cannot move the stream backwards. The stream ends on the
/// first empty page, or after yielding the first error.
pub fn stream_after<'a>(
    feed: &'a dyn MessageFeed,
    channel: &'a str,
    after: MessageId,
) -> BoxStream<'a, Result<FeedMessage>> {
    let state = PageCursor {
        after,
        buffer: VecDeque::new(),
        fetched_any: false,
        exhausted: false,
    };

    stream::try_unfold(state, move |mut state| async move {
        loop {
            if let Some(message) = state.buffer.pop_front() {
                return Ok::<_, AppError>(Some((message, state)));
            }
            if state.exhausted {
                return Ok(None);
            }

            let delay = feed.page_delay();
            if state.fetched_any && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            state.fetched_any = true;

            let mut page = feed.fetch_after(channel, state.after).await?;
            page.retain(|m| m.id > state.after);
            page.sort_by_key(|m| m.id);
            page.dedup_by_key(|m| m.id);

            match page.last() {
                Some(last) => {
                    log::debug!(
                        "Fetched {} message(s) after {} from {}",
                        page.len(),
                        state.after,
                        channel
                    );
                    state.after = last.id;
                    state.buffer.extend(page);
                }
                None => state.exhausted = true,
            }
        }
    })
    .boxed()
}

/// In-memory feed serving a fixed list of messages.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeed {
    messages: Vec<FeedMessage>,
    page_size: usize,
    fail_at: Option<MessageId>,
}

impl MemoryFeed {
    pub fn new(mut messages: Vec<FeedMessage>) -> Self {
        messages.sort_by_key(|m| m.id);
        Self {
            messages,
            page_size: 20,
            fail_at: None,
        }
    }

    /// Serve at most `page_size` messages per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fail once the stream reaches message `id`; earlier messages are served.
    pub fn failing_at(mut self, id: MessageId) -> Self {
        self.fail_at = Some(id);
        self
    }

    /// Append a message, as a channel would after a new post.
    pub fn push(&mut self, message: FeedMessage) {
        self.messages.push(message);
        self.messages.sort_by_key(|m| m.id);
    }
}

#[async_trait]
impl MessageFeed for MemoryFeed {
    async fn fetch_after(&self, channel: &str, after: MessageId) -> Result<Vec<FeedMessage>> {
        let page: Vec<FeedMessage> = self
            .messages
            .iter()
            .filter(|m| m.id > after)
            .take_while(|m| self.fail_at.is_none_or(|fail| m.id < fail))
            .take(self.page_size)
            .cloned()
            .collect();

        if page.is_empty() {
            if let Some(fail) = self.fail_at.filter(|fail| *fail > after) {
                return Err(AppError::feed(
                    channel,
                    format!("simulated failure at message {fail}"),
                ));
            }
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    fn messages(ids: &[MessageId]) -> Vec<FeedMessage> {
        ids.iter()
            .map(|id| FeedMessage::new(*id, None, format!("message {id}")))
            .collect()
    }

    #[tokio::test]
    async fn test_stream_pages_in_order() {
        let feed = MemoryFeed::new(messages(&[5, 1, 3, 2, 4])).with_page_size(2);
        let ids: Vec<MessageId> = stream_after(&feed, "chan", 1)
            .map_ok(|m| m.id)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(ids, vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_stream_empty_after_cursor() {
        let feed = MemoryFeed::new(messages(&[1, 2]));
        let items: Vec<_> = stream_after(&feed, "chan", 2).collect().await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_stream_yields_error_then_ends() {
        let feed = MemoryFeed::new(messages(&[1, 2, 3, 4])).failing_at(3);
        let items: Vec<_> = stream_after(&feed, "chan", 0).collect().await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().id, 1);
        assert_eq!(items[1].as_ref().unwrap().id, 2);
        assert!(items[2].is_err());
    }

    struct SloppyFeed;

    #[async_trait]
    impl MessageFeed for SloppyFeed {
        async fn fetch_after(&self, _channel: &str, after: MessageId) -> Result<Vec<FeedMessage>> {
            // Returns stale and duplicated ids alongside new ones.
            if after >= 12 {
                return Ok(messages(&[10, 12]));
            }
            Ok(messages(&[12, after, 11, 11]))
        }
    }

    #[tokio::test]
    async fn test_stream_normalizes_pages() {
        let ids: Vec<MessageId> = stream_after(&SloppyFeed, "chan", 10)
            .map_ok(|m| m.id)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(ids, vec![11, 12]);
    }
}
