//! Summary of durable state for one feed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::error::Result;
use crate::models::{Config, MessageId};
use crate::storage::{CursorState, CursorStore, RecordStore};

/// Cursor and record store snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub channel: String,
    pub cursor: CursorState,
    /// Id the next scan would start after
    pub next_start: MessageId,
    pub records_file: PathBuf,
    /// Rows currently in the store, duplicates included
    pub rows: usize,
    /// Distinct message ids in the store
    pub messages: usize,
    /// Rows carrying each label
    pub label_counts: BTreeMap<String, usize>,
}

/// Read the cursor and record store without modifying either.
pub async fn collect_info(config: &Config) -> Result<StoreSummary> {
    let channel = config.feed.channel.clone();
    let cursor = CursorStore::new(&config.paths.state_file)
        .load(&channel)
        .await;
    let records = RecordStore::new(&config.paths.records_file);
    let rows = records.load().await?;

    let mut label_counts = BTreeMap::new();
    let mut ids = BTreeSet::new();
    for row in &rows {
        if let Some(id) = row.parsed_id() {
            ids.insert(id);
        }
        for label in row.labels() {
            *label_counts.entry(label).or_insert(0) += 1;
        }
    }

    Ok(StoreSummary {
        next_start: cursor.resolve(config.feed.first_run_floor),
        channel,
        cursor,
        records_file: records.path().to_path_buf(),
        rows: rows.len(),
        messages: ids.len(),
        label_counts,
    })
}
