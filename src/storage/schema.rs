//! Record store schema versions and column mapping.
//!
//! - `V1`: a single `keyword` label column
//! - `V2`: the canonical columns, with multi-valued `keywords`
//!
//! Any stored header is mapped onto the canonical columns; legacy labels are
//! promoted into `keywords`, missing columns read as empty, unknown columns
//! are dropped.

use csv::StringRecord;

use crate::models::{COLUMNS, LEGACY_LABEL_COLUMN, StoredRow};

/// Layout generation of a stored table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    V1,
    V2,
}

impl SchemaVersion {
    /// Detect the layout from header names.
    pub fn detect<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut legacy = false;
        let mut current = false;
        for header in headers {
            match header.trim() {
                h if h == LEGACY_LABEL_COLUMN => legacy = true,
                "keywords" => current = true,
                _ => {}
            }
        }
        if legacy && !current { Self::V1 } else { Self::V2 }
    }
}

/// Where each canonical column comes from in a stored header.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    version: SchemaVersion,
    sources: [Option<usize>; COLUMNS.len()],
    extra: Vec<String>,
    canonical: bool,
}

impl ColumnMap {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let names: Vec<&str> = headers.iter().map(str::trim).collect();
        let version = SchemaVersion::detect(names.iter().copied());

        let position = |name: &str| names.iter().position(|h| *h == name);
        let mut sources = [None; COLUMNS.len()];
        for (slot, column) in sources.iter_mut().zip(COLUMNS) {
            *slot = match (version, column) {
                (SchemaVersion::V1, "keywords") => position(LEGACY_LABEL_COLUMN),
                _ => position(column),
            };
        }

        let extra = names
            .iter()
            .filter(|h| !COLUMNS.contains(*h))
            .filter(|h| !(version == SchemaVersion::V1 && **h == LEGACY_LABEL_COLUMN))
            .map(|h| h.to_string())
            .collect();

        let canonical =
            names.len() == COLUMNS.len() && names.iter().zip(COLUMNS).all(|(h, c)| *h == c);

        Self {
            version,
            sources,
            extra,
            canonical,
        }
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// Header is exactly the canonical column list, in order.
    pub fn is_canonical(&self) -> bool {
        self.canonical
    }

    /// Canonical columns absent from the stored header.
    pub fn missing(&self) -> Vec<&'static str> {
        COLUMNS
            .iter()
            .zip(&self.sources)
            .filter(|(_, source)| source.is_none())
            .map(|(column, _)| *column)
            .collect()
    }

    /// Stored columns that will be dropped.
    pub fn extra(&self) -> &[String] {
        &self.extra
    }

    /// Project a stored record onto the canonical columns.
    ///
    /// Short records read as empty cells.
    pub fn row(&self, record: &StringRecord) -> StoredRow {
        let cells = self
            .sources
            .map(|source| source.and_then(|i| record.get(i)).unwrap_or("").to_string());
        let mut row = StoredRow::from_cells(cells);
        if self.version == SchemaVersion::V1 {
            row.keywords = row.keywords.trim().to_string();
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> StringRecord {
        StringRecord::from(names.to_vec())
    }

    #[test]
    fn test_detect_versions() {
        assert_eq!(
            SchemaVersion::detect(["date_utc", "message_id", "keyword"]),
            SchemaVersion::V1
        );
        assert_eq!(SchemaVersion::detect(COLUMNS), SchemaVersion::V2);
        assert_eq!(
            SchemaVersion::detect(["keyword", "keywords"]),
            SchemaVersion::V2
        );
    }

    #[test]
    fn test_canonical_map() {
        let map = ColumnMap::from_headers(&headers(&COLUMNS));
        assert!(map.is_canonical());
        assert!(map.missing().is_empty());
        assert!(map.extra().is_empty());
    }

    #[test]
    fn test_legacy_map_promotes_label() {
        let map = ColumnMap::from_headers(&headers(&[
            "date_utc",
            "message_id",
            "url",
            "keyword",
            "snippet",
        ]));
        assert_eq!(map.version(), SchemaVersion::V1);
        assert!(!map.is_canonical());
        assert_eq!(map.missing(), vec!["udemy_urls", "coupon_codes"]);

        let record = StringRecord::from(vec!["2024-01-01", "5", "u", " CCNA ", "text"]);
        let row = map.row(&record);
        assert_eq!(row.message_id, "5");
        assert_eq!(row.keywords, "CCNA");
        assert_eq!(row.udemy_urls, "");
        assert_eq!(row.snippet, "text");
    }

    #[test]
    fn test_reordered_and_extra_columns() {
        let map = ColumnMap::from_headers(&headers(&[
            "snippet", "message_id", "junk", "date_utc", "url", "keywords", "udemy_urls",
            "coupon_codes",
        ]));
        assert!(!map.is_canonical());
        assert_eq!(map.extra(), ["junk".to_string()]);

        let record = StringRecord::from(vec!["s", "9", "x", "d", "u", "A", "", ""]);
        let row = map.row(&record);
        assert_eq!(row.cells(), ["d", "9", "u", "A", "", "", "s"]);
    }

    #[test]
    fn test_short_record_reads_empty() {
        let map = ColumnMap::from_headers(&headers(&COLUMNS));
        let row = map.row(&StringRecord::from(vec!["d", "3"]));
        assert_eq!(row.message_id, "3");
        assert_eq!(row.snippet, "");
    }
}
