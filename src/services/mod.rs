//! Service layer for the scanner.
//!
//! This module contains the per-message logic and the feed collaborator:
//! - Pattern matching (`PatternMatcher`)
//! - Link and code extraction (`FieldExtractor`)
//! - Feed paging (`MessageFeed`, `stream_after`)
//! - Public web preview client (`WebPreviewFeed`)

mod extractor;
mod feed;
mod matcher;
mod preview;

pub use extractor::{Extraction, FieldExtractor};
pub use feed::{MemoryFeed, MessageFeed, stream_after};
pub use matcher::PatternMatcher;
pub use preview::WebPreviewFeed;
