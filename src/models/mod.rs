// src/models/mod.rs

//! Domain models for the scanner.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod finding;
mod message;
mod selectors;

// Re-export all public types
pub use config::{
    Config, ENV_CHANNEL, ENV_FEED_BASE_URL, ENV_FIRST_RUN_FLOOR, ENV_RECORDS_FILE,
    ENV_STATE_FILE, ExtractConfig, FeedConfig, PathsConfig, PatternRule,
};
pub use finding::{
    COLUMNS, Finding, LABEL_DELIMITER, LEGACY_LABEL_COLUMN, LIST_DELIMITER, StoredRow,
    join_values, split_values,
};
pub use message::{FeedMessage, MessageId};
pub use selectors::PreviewSelectors;
