//! Finding records and their tabular representation.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::MessageId;

/// Canonical column order of the record store.
pub const COLUMNS: [&str; 7] = [
    "date_utc",
    "message_id",
    "url",
    "keywords",
    "udemy_urls",
    "coupon_codes",
    "snippet",
];

/// Single-label column used by the first store layout.
pub const LEGACY_LABEL_COLUMN: &str = "keyword";

/// Delimiter for the `keywords` column.
pub const LABEL_DELIMITER: char = '|';

/// Delimiter for the `udemy_urls` and `coupon_codes` columns.
pub const LIST_DELIMITER: char = ';';

/// A structured record produced for a message that matched at least one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub timestamp: Option<DateTime<Utc>>,
    pub message_id: MessageId,
    /// Permalink to the message
    pub url: String,
    pub labels: BTreeSet<String>,
    pub embedded_urls: BTreeSet<String>,
    pub codes: BTreeSet<String>,
    pub snippet: String,
}

impl Finding {
    /// Render the timestamp the way the store expects it (`+00:00` offset).
    pub fn date_utc(&self) -> String {
        self.timestamp
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, false))
            .unwrap_or_default()
    }

    /// Labels as the pipe-joined cell value.
    pub fn labels_cell(&self) -> String {
        join_values(&self.labels, LABEL_DELIMITER)
    }
}

/// One row of the record store, cells kept as text in canonical column order.
///
/// Field names double as the CSV header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    pub date_utc: String,
    pub message_id: String,
    pub url: String,
    pub keywords: String,
    pub udemy_urls: String,
    pub coupon_codes: String,
    pub snippet: String,
}

impl StoredRow {
    /// Parsed message id, if the cell holds an integer.
    ///
    /// Accepts a trailing `.0`, which spreadsheet round-trips tend to add.
    pub fn parsed_id(&self) -> Option<MessageId> {
        let raw = self.message_id.trim();
        raw.parse()
            .ok()
            .or_else(|| raw.strip_suffix(".0").and_then(|s| s.parse().ok()))
    }

    /// Labels split out of the `keywords` cell.
    pub fn labels(&self) -> BTreeSet<String> {
        split_values(&self.keywords, LABEL_DELIMITER)
    }

    /// Cells in canonical column order.
    pub fn cells(&self) -> [&str; 7] {
        [
            &self.date_utc,
            &self.message_id,
            &self.url,
            &self.keywords,
            &self.udemy_urls,
            &self.coupon_codes,
            &self.snippet,
        ]
    }

    /// Build a row from cells in canonical column order.
    pub fn from_cells(cells: [String; 7]) -> Self {
        let [date_utc, message_id, url, keywords, udemy_urls, coupon_codes, snippet] = cells;
        Self {
            date_utc,
            message_id,
            url,
            keywords,
            udemy_urls,
            coupon_codes,
            snippet,
        }
    }
}

impl From<&Finding> for StoredRow {
    fn from(finding: &Finding) -> Self {
        Self {
            date_utc: finding.date_utc(),
            message_id: finding.message_id.to_string(),
            url: finding.url.clone(),
            keywords: finding.labels_cell(),
            udemy_urls: join_values(&finding.embedded_urls, LIST_DELIMITER),
            coupon_codes: join_values(&finding.codes, LIST_DELIMITER),
            snippet: finding.snippet.clone(),
        }
    }
}

/// Split a multi-valued cell into a trimmed, deduplicated, sorted set.
pub fn split_values(cell: &str, delimiter: char) -> BTreeSet<String> {
    cell.split(delimiter)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

/// Join a set back into a multi-valued cell.
pub fn join_values(values: &BTreeSet<String>, delimiter: char) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(delimiter);
        }
        out.push_str(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_split_values_trims_and_dedupes() {
        assert_eq!(split_values(" B| A ||B", '|'), set(&["A", "B"]));
        assert!(split_values("", ';').is_empty());
    }

    #[test]
    fn test_join_values() {
        assert_eq!(join_values(&set(&["b", "a"]), ';'), "a;b");
        assert_eq!(join_values(&BTreeSet::new(), ';'), "");
    }

    #[test]
    fn test_row_from_finding() {
        let finding = Finding {
            timestamp: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            message_id: 42,
            url: "https://t.me/chan/42".to_string(),
            labels: set(&["SC-200", "AZ-104"]),
            embedded_urls: set(&["https://udemy.com/b", "https://udemy.com/a"]),
            codes: set(&["X1"]),
            snippet: "hello".to_string(),
        };

        let row = StoredRow::from(&finding);
        assert_eq!(row.date_utc, "2024-05-01T10:00:00+00:00");
        assert_eq!(row.message_id, "42");
        assert_eq!(row.keywords, "AZ-104|SC-200");
        assert_eq!(row.udemy_urls, "https://udemy.com/a;https://udemy.com/b");
        assert_eq!(row.coupon_codes, "X1");
    }

    #[test]
    fn test_parsed_id() {
        let mut row = StoredRow::default();
        row.message_id = " 17 ".to_string();
        assert_eq!(row.parsed_id(), Some(17));
        row.message_id = "17.0".to_string();
        assert_eq!(row.parsed_id(), Some(17));
        row.message_id = "abc".to_string();
        assert_eq!(row.parsed_id(), None);
    }
}
