//! Consolidation of appended rows into one canonical row per message.
//!
//! Reruns may append the same message more than once. Rows are grouped by
//! `message_id` and each group is folded field by field:
//!
//! - `date_utc`, `url`: first non-empty value
//! - `keywords`: union of `|`-separated labels, sorted
//! - `udemy_urls`, `coupon_codes`: union of `;`-separated values, sorted
//! - `snippet`: longest value, earliest wins ties

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    LABEL_DELIMITER, LIST_DELIMITER, MessageId, StoredRow, join_values, split_values,
};

/// Result of folding a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Consolidated {
    /// One row per message id, ascending
    pub rows: Vec<StoredRow>,
    /// Rows dropped because their `message_id` is not an integer
    pub dropped_invalid: usize,
}

impl Consolidated {
    /// Number of rows merged away as duplicates.
    pub fn merged(&self, input_len: usize) -> usize {
        input_len - self.dropped_invalid - self.rows.len()
    }
}

/// Group rows by message id and fold each group.
pub fn consolidate_rows(rows: &[StoredRow]) -> Consolidated {
    let mut groups: BTreeMap<MessageId, Vec<&StoredRow>> = BTreeMap::new();
    let mut dropped_invalid = 0;

    for row in rows {
        match row.parsed_id() {
            Some(id) => groups.entry(id).or_default().push(row),
            None => dropped_invalid += 1,
        }
    }

    let rows = groups
        .into_iter()
        .map(|(id, group)| merge_group(id, &group))
        .collect();

    Consolidated {
        rows,
        dropped_invalid,
    }
}

/// Fold rows sharing one message id.
fn merge_group(id: MessageId, group: &[&StoredRow]) -> StoredRow {
    StoredRow {
        date_utc: first_non_empty(group.iter().map(|r| r.date_utc.as_str())),
        message_id: id.to_string(),
        url: first_non_empty(group.iter().map(|r| r.url.as_str())),
        keywords: merge_values(group.iter().map(|r| r.keywords.as_str()), LABEL_DELIMITER),
        udemy_urls: merge_values(group.iter().map(|r| r.udemy_urls.as_str()), LIST_DELIMITER),
        coupon_codes: merge_values(group.iter().map(|r| r.coupon_codes.as_str()), LIST_DELIMITER),
        snippet: longest(group.iter().map(|r| r.snippet.as_str())),
    }
}

fn first_non_empty<'a>(mut values: impl Iterator<Item = &'a str>) -> String {
    values
        .find(|v| !v.trim().is_empty())
        .unwrap_or("")
        .to_string()
}

fn merge_values<'a>(values: impl Iterator<Item = &'a str>, delimiter: char) -> String {
    let merged: BTreeSet<String> = values
        .flat_map(|cell| split_values(cell, delimiter))
        .collect();
    join_values(&merged, delimiter)
}

fn longest<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut best = "";
    for value in values {
        if value.chars().count() > best.chars().count() {
            best = value;
        }
    }
    best.to_string()
}
