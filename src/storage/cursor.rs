//! Durable per-feed cursor store.
//!
//! The state file is a single JSON object mapping feed identifiers to the last
//! fully processed message id. Entries for other feeds, and any keys this
//! crate does not understand, are carried through every write untouched.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::MessageId;
use crate::storage::{read_bytes, write_bytes_atomic};

/// Outcome of reading the cursor for one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// A cursor was persisted for the feed
    Stored(MessageId),
    /// No state file, or no entry for the feed
    Absent,
    /// The state file or the entry could not be interpreted
    Corrupt { reason: String },
}

impl CursorState {
    /// The id to resume from, falling back to `floor`.
    pub fn resolve(&self, floor: MessageId) -> MessageId {
        match self {
            Self::Stored(id) => *id,
            Self::Absent | Self::Corrupt { .. } => floor,
        }
    }
}

/// JSON-file backed cursor store.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cursor for `feed_id`. Never fails.
    pub async fn load(&self, feed_id: &str) -> CursorState {
        let map = match self.read_map().await {
            Ok(Some(map)) => map,
            Ok(None) => return CursorState::Absent,
            Err(e) => {
                return CursorState::Corrupt {
                    reason: e.to_string(),
                };
            }
        };

        match map.get(feed_id) {
            None => CursorState::Absent,
            Some(value) => match entry_id(value) {
                Some(id) => CursorState::Stored(id),
                None => CursorState::Corrupt {
                    reason: format!("entry for {feed_id:?} is not an integer: {value}"),
                },
            },
        }
    }

    /// Persist `id` for `feed_id`, keeping every other entry.
    ///
    /// An unreadable existing file is replaced rather than merged.
    pub async fn save(&self, feed_id: &str, id: MessageId) -> Result<()> {
        let mut map = match self.read_map().await {
            Ok(map) => map.unwrap_or_default(),
            Err(e) => {
                log::warn!(
                    "Replacing unreadable state file {}: {}",
                    self.path.display(),
                    e
                );
                Map::new()
            }
        };

        map.insert(feed_id.to_string(), Value::from(id));
        let bytes = serde_json::to_vec_pretty(&Value::Object(map))?;
        write_bytes_atomic(&self.path, &bytes).await
    }

    async fn read_map(&self) -> Result<Option<Map<String, Value>>> {
        let Some(bytes) = read_bytes(&self.path).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Object(map) => Ok(Some(map)),
            other => Err(AppError::store(format!(
                "state file holds {} instead of an object",
                json_kind(&other)
            ))),
        }
    }
}

/// Integer entry, or a string holding one as older state files stored it.
fn entry_id(value: &Value) -> Option<MessageId> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        other => other.as_i64(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
