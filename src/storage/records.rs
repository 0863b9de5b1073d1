//! CSV record store for findings.
//!
//! Rows are appended one at a time during a scan and periodically folded back
//! to one row per message id by [`RecordStore::consolidate`].

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Terminator, WriterBuilder};
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::{COLUMNS, Finding, StoredRow};
use crate::pipeline::consolidate_rows;
use crate::storage::schema::{ColumnMap, SchemaVersion};
use crate::storage::{read_bytes, write_bytes_atomic};

/// What `ensure_schema` did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaReport {
    /// No file existed; an empty canonical table was written
    Created,
    /// The file already had the canonical layout
    Unchanged,
    /// The file was migrated and rewritten
    Rewritten {
        from: SchemaVersion,
        added: Vec<&'static str>,
        dropped: Vec<String>,
    },
    /// The file was unreadable and was replaced by an empty canonical table
    Recovered { reason: String },
}

/// Summary of a consolidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// Rows before consolidation
    pub before: usize,
    /// Rows after consolidation
    pub after: usize,
    /// Duplicate rows folded into another row
    pub merged: usize,
    /// Rows dropped for lacking an integer message id
    pub dropped_invalid: usize,
    /// Whether the file was rewritten
    pub rewritten: bool,
}

/// A parsed table: how its header maps to canonical columns, plus its rows.
struct Table {
    columns: ColumnMap,
    rows: Vec<StoredRow>,
}

/// CSV-file backed record store.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bring the file to the canonical layout. Idempotent.
    pub async fn ensure_schema(&self) -> Result<SchemaReport> {
        let Some(bytes) = read_bytes(&self.path).await? else {
            self.write_rows(&[]).await?;
            return Ok(SchemaReport::Created);
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            self.write_rows(&[]).await?;
            return Ok(SchemaReport::Created);
        }

        let table = match parse_table(&bytes) {
            Ok(table) => table,
            Err(e) => {
                self.write_rows(&[]).await?;
                return Ok(SchemaReport::Recovered {
                    reason: e.to_string(),
                });
            }
        };

        if table.columns.is_canonical() && bytes.ends_with(b"\n") {
            return Ok(SchemaReport::Unchanged);
        }

        self.write_rows(&table.rows).await?;
        Ok(SchemaReport::Rewritten {
            from: table.columns.version(),
            added: table.columns.missing(),
            dropped: table.columns.extra().to_vec(),
        })
    }

    /// Append one finding as a single write at the end of the file.
    ///
    /// A missing or empty file gets the header first.
    pub async fn append(&self, finding: &Finding) -> Result<()> {
        let needs_header = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let mut writer = row_writer();
        if needs_header {
            writer.write_record(COLUMNS)?;
        }
        writer.serialize(StoredRow::from(finding))?;
        let bytes = into_bytes(writer)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }

    /// Fold duplicate message ids into single rows.
    ///
    /// The file is only rewritten when folding changes it; on error the
    /// previous file is left in place.
    pub async fn consolidate(&self) -> Result<ConsolidationReport> {
        let Some(bytes) = read_bytes(&self.path).await? else {
            return Ok(ConsolidationReport::default());
        };
        let table = parse_table(&bytes)?;
        if table.rows.is_empty() {
            return Ok(ConsolidationReport::default());
        }

        let folded = consolidate_rows(&table.rows);
        let mut report = ConsolidationReport {
            before: table.rows.len(),
            after: folded.rows.len(),
            merged: folded.merged(table.rows.len()),
            dropped_invalid: folded.dropped_invalid,
            rewritten: false,
        };

        if folded.rows != table.rows || !table.columns.is_canonical() {
            self.write_rows(&folded.rows).await?;
            report.rewritten = true;
        }
        Ok(report)
    }

    /// Read every row, projected onto the canonical columns.
    pub async fn load(&self) -> Result<Vec<StoredRow>> {
        match read_bytes(&self.path).await? {
            Some(bytes) => Ok(parse_table(&bytes)?.rows),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the file with a canonical header and `rows`.
    async fn write_rows(&self, rows: &[StoredRow]) -> Result<()> {
        let mut writer = row_writer();
        writer.write_record(COLUMNS)?;
        for row in rows {
            writer.serialize(row)?;
        }
        write_bytes_atomic(&self.path, &into_bytes(writer)?).await
    }
}

fn row_writer() -> csv::Writer<Vec<u8>> {
    WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| crate::error::AppError::Io(e.into_error()))
}

fn parse_table(bytes: &[u8]) -> Result<Table> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(bytes);
    let columns = ColumnMap::from_headers(reader.headers()?);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(columns.row(&record));
    }
    Ok(Table { columns, rows })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;

    const HEADER: &str = "date_utc,message_id,url,keywords,udemy_urls,coupon_codes,snippet\n";

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn finding(id: i64, labels: &[&str], snippet: &str) -> Finding {
        Finding {
            timestamp: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            message_id: id,
            url: format!("https://t.me/chan/{id}"),
            labels: set(labels),
            embedded_urls: set(&["https://udemy.com/x?couponCode=C1"]),
            codes: set(&["C1"]),
            snippet: snippet.to_string(),
        }
    }

    fn store(tmp: &TempDir) -> RecordStore {
        RecordStore::new(tmp.path().join("findings.csv"))
    }

    #[tokio::test]
    async fn test_ensure_schema_creates_file() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        assert_eq!(store.ensure_schema().await.unwrap(), SchemaReport::Created);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), HEADER);
        assert_eq!(store.ensure_schema().await.unwrap(), SchemaReport::Unchanged);
    }

    #[tokio::test]
    async fn test_ensure_schema_migrates_legacy_column() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        std::fs::write(
            store.path(),
            "date_utc,message_id,url,keyword,snippet\n\
             2024-01-01T00:00:00+00:00,10,https://t.me/c/10,AZ-104,first\n\
             2024-01-02T00:00:00+00:00,11,https://t.me/c/11,CCNA,second\n",
        )
        .unwrap();

        let report = store.ensure_schema().await.unwrap();
        assert_eq!(
            report,
            SchemaReport::Rewritten {
                from: SchemaVersion::V1,
                added: vec!["udemy_urls", "coupon_codes"],
                dropped: vec![],
            }
        );

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with(HEADER));

        let rows = store.load().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].labels(), set(&["AZ-104"]));
        assert_eq!(rows[1].keywords, "CCNA");
        assert_eq!(rows[1].udemy_urls, "");

        assert_eq!(store.ensure_schema().await.unwrap(), SchemaReport::Unchanged);
    }

    #[tokio::test]
    async fn test_ensure_schema_recovers_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        std::fs::write(store.path(), [0xff, 0xfe, b',', 0x00, b'\n', 0xc3]).unwrap();

        let report = store.ensure_schema().await.unwrap();
        assert!(matches!(report, SchemaReport::Recovered { .. }));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), HEADER);
    }

    #[tokio::test]
    async fn test_append_without_dedup() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.ensure_schema().await.unwrap();

        store.append(&finding(5, &["A"], "one")).await.unwrap();
        store.append(&finding(5, &["B"], "one, with \"quotes\"\nand newline")).await.unwrap();

        let rows = store.load().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].snippet, "one, with \"quotes\"\nand newline");
    }

    #[tokio::test]
    async fn test_append_to_missing_file_writes_header() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store.append(&finding(1, &["A"], "x")).await.unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with(HEADER));
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_consolidate_merges_duplicates() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.ensure_schema().await.unwrap();

        store.append(&finding(8, &["A", "B"], "short")).await.unwrap();
        store.append(&finding(7, &["X"], "other")).await.unwrap();
        store.append(&finding(8, &["B", "C"], "longer text")).await.unwrap();

        let report = store.consolidate().await.unwrap();
        assert_eq!(report.before, 3);
        assert_eq!(report.after, 2);
        assert_eq!(report.merged, 1);
        assert!(report.rewritten);

        let rows = store.load().await.unwrap();
        assert_eq!(rows[0].message_id, "7");
        assert_eq!(rows[1].keywords, "A|B|C");
        assert_eq!(rows[1].snippet, "longer text");
        assert_eq!(rows[1].coupon_codes, "C1");
    }

    #[tokio::test]
    async fn test_consolidate_without_duplicates_leaves_file() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.ensure_schema().await.unwrap();
        store.append(&finding(1, &["A"], "x")).await.unwrap();
        store.append(&finding(2, &["B"], "y")).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let report = store.consolidate().await.unwrap();
        assert_eq!(report.before, report.after);
        assert_eq!(report.merged, 0);
        assert!(!report.rewritten);
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_consolidate_missing_or_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        assert_eq!(store.consolidate().await.unwrap(), ConsolidationReport::default());

        store.ensure_schema().await.unwrap();
        assert_eq!(store.consolidate().await.unwrap(), ConsolidationReport::default());
    }
}
