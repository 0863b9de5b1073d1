// src/pipeline/scan.rs

//! Resumable scan pass over one feed.

use std::future::Future;

use futures::StreamExt;

use crate::error::Result;
use crate::models::{Config, FeedMessage, Finding, MessageId};
use crate::services::{FieldExtractor, MessageFeed, PatternMatcher, stream_after};
use crate::storage::{CursorState, CursorStore, RecordStore, SchemaReport};
use crate::utils::text::snippet;
use crate::utils::url::permalink;

/// Progress is logged at debug level every this many scanned messages.
const PROGRESS_INTERVAL: usize = 500;

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Start after this id, ignoring the stored cursor
    pub from_id: Option<MessageId>,
    /// Start from the configured first-run floor
    pub reset_state: bool,
    /// Read-only: report matches without touching the cursor or the store
    pub dry_run: bool,
}

/// Outcome of one scan pass.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Id the scan started after
    pub start_id: MessageId,
    /// Largest fully handled id, or `start_id` if nothing was handled
    pub end_cursor: MessageId,
    pub scanned: usize,
    pub matched: usize,
    pub findings: Vec<Finding>,
    /// Why the stream stopped early, if it did
    pub halted: Option<String>,
}

impl ScanReport {
    pub fn advanced(&self) -> bool {
        self.end_cursor > self.start_id
    }
}

/// Pick the id to scan after: explicit override, then reset, then stored cursor.
pub fn resolve_start(options: &ScanOptions, stored: &CursorState, floor: MessageId) -> MessageId {
    if let Some(id) = options.from_id {
        return id;
    }
    if options.reset_state {
        return floor;
    }
    stored.resolve(floor)
}

/// Run a scan pass to the end of the feed.
pub async fn run_scan(
    config: &Config,
    feed: &dyn MessageFeed,
    options: &ScanOptions,
) -> Result<ScanReport> {
    run_scan_until(config, feed, options, std::future::pending::<()>()).await
}

/// Run a scan pass, halting early once `shutdown` completes.
///
/// Messages handled before the halt are persisted like a normal run.
pub async fn run_scan_until<F>(
    config: &Config,
    feed: &dyn MessageFeed,
    options: &ScanOptions,
    shutdown: F,
) -> Result<ScanReport>
where
    F: Future<Output = ()>,
{
    let channel = config.feed.channel.as_str();
    let matcher = PatternMatcher::new(&config.patterns)?;
    let extractor = FieldExtractor::new(&config.extract)?;
    let cursor = CursorStore::new(&config.paths.state_file);
    let records = RecordStore::new(&config.paths.records_file);

    let stored = cursor.load(channel).await;
    if let CursorState::Corrupt { reason } = &stored {
        log::warn!(
            "Cursor in {} is unusable ({}), falling back to {}",
            cursor.path().display(),
            reason,
            config.feed.first_run_floor
        );
    }
    let start_id = resolve_start(options, &stored, config.feed.first_run_floor);

    if options.dry_run {
        log::info!("Dry run: cursor and records will not be modified");
    } else {
        log_schema(&records, records.ensure_schema().await?);
    }

    log::info!(
        "Scanning {} after message {} ({} patterns)",
        channel,
        start_id,
        matcher.len()
    );

    let mut report = ScanReport {
        start_id,
        end_cursor: start_id,
        ..ScanReport::default()
    };

    let mut messages = stream_after(feed, channel, start_id);
    tokio::pin!(shutdown);

    loop {
        let next = tokio::select! {
            biased;
            _ = &mut shutdown => {
                report.halted = Some("interrupted".to_string());
                break;
            }
            next = messages.next() => next,
        };

        let message = match next {
            None => break,
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                report.halted = Some(e.to_string());
                break;
            }
        };
        if message.id <= report.end_cursor {
            continue;
        }

        if let Some(finding) = inspect(config, &matcher, &extractor, &message) {
            if !options.dry_run {
                if let Err(e) = records.append(&finding).await {
                    report.halted = Some(format!("append of message {} failed: {}", message.id, e));
                    break;
                }
            }
            log::info!(
                "[MATCH] {} [{}] codes={}",
                finding.url,
                finding.labels_cell(),
                finding.codes.len()
            );
            report.matched += 1;
            report.findings.push(finding);
        }

        report.scanned += 1;
        report.end_cursor = message.id;
        if report.scanned % PROGRESS_INTERVAL == 0 {
            log::debug!(
                "Scanned {} messages (last id {})",
                report.scanned,
                report.end_cursor
            );
        }
    }
    drop(messages);

    if let Some(reason) = &report.halted {
        log::warn!("Scan halted after message {}: {}", report.end_cursor, reason);
    }

    if options.dry_run {
        return Ok(report);
    }

    if report.advanced() {
        cursor.save(channel, report.end_cursor).await?;
        log::debug!("Cursor for {} saved at {}", channel, report.end_cursor);
    }

    match records.consolidate().await {
        Ok(summary) if summary.rewritten => log::info!(
            "Consolidated {} rows into {} ({} merged, {} invalid dropped)",
            summary.before,
            summary.after,
            summary.merged,
            summary.dropped_invalid
        ),
        Ok(_) => {}
        Err(e) => log::warn!("Consolidation failed, store left as is: {}", e),
    }

    Ok(report)
}

/// Match one message and, on a hit, build its finding.
fn inspect(
    config: &Config,
    matcher: &PatternMatcher,
    extractor: &FieldExtractor,
    message: &FeedMessage,
) -> Option<Finding> {
    let text = message.trimmed_text();
    if text.is_empty() {
        return None;
    }
    let labels = matcher.labels(text);
    if labels.is_empty() {
        return None;
    }

    let extraction = extractor.extract(text);
    Some(Finding {
        timestamp: message.timestamp,
        message_id: message.id,
        url: permalink(&config.feed.permalink_base, &config.feed.channel, message.id),
        labels,
        embedded_urls: extraction.urls,
        codes: extraction.codes,
        snippet: snippet(text, config.extract.snippet_max_chars),
    })
}

fn log_schema(records: &RecordStore, report: SchemaReport) {
    let path = records.path().display();
    match report {
        SchemaReport::Created => log::info!("Created record store {}", path),
        SchemaReport::Unchanged => {}
        SchemaReport::Rewritten {
            from,
            added,
            dropped,
        } => log::info!(
            "Migrated {} from {:?}: added {:?}, dropped {:?}",
            path,
            from,
            added,
            dropped
        ),
        SchemaReport::Recovered { reason } => {
            log::warn!("Record store {} was unreadable ({}), started fresh", path, reason)
        }
    }
}
