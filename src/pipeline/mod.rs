//! Pipeline entry points for scanner operations.
//!
//! - `run_scan`: Scan the feed past the cursor and record findings
//! - `consolidate_rows`: Fold duplicate rows into one per message
//! - `collect_info`: Summarize the cursor and record store

pub mod consolidate;
pub mod info;
pub mod scan;

pub use consolidate::{Consolidated, consolidate_rows};
pub use info::{StoreSummary, collect_info};
pub use scan::{ScanOptions, ScanReport, resolve_start, run_scan, run_scan_until};
