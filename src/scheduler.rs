//! Window Scheduler: recovers the resume point from the artifact listing,
//! enumerates pending hourly windows, and drives each one through the
//! locator, the fetch stage and the integrity gate.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, FixedOffset, NaiveDateTime, Timelike, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::fetcher::run_fetch_stage;
use crate::locator::locate_window_range;
use crate::model::{ActivityRow, TimeWindow};
use crate::source::GalleryClient;
use crate::storage::{encode_rows_csv, ArtifactStore};
use crate::store::WindowStore;

/// Process every pending window in ascending order.
///
/// A tripped integrity gate aborts the whole run: a failed window usually
/// means the source is blocking requests, and later windows assume earlier
/// ones succeeded.
///
/// # Errors
///
/// Returns an error if the artifact listing fails, a listing scan fails, or
/// the integrity gate trips.
pub async fn run(config: &Config, storage: &ArtifactStore) -> Result<()> {
    let http = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let client = GalleryClient::new(http, config);

    let now = source_now(config.tz_offset_hours);
    let labels = storage
        .list_window_labels()
        .await
        .context("Failed to list existing artifacts")?;
    let last_completed = resume_point(&labels, now, config.resume_staleness_hours);
    let windows = pending_windows(last_completed, now);

    if windows.is_empty() {
        info!("No pending windows, nothing to ingest");
        return Ok(());
    }

    let first_label = windows[0].label();
    let last_label = windows[windows.len() - 1].label();
    info!(
        count = windows.len(),
        first = %first_label,
        last = %last_label,
        "Ingesting pending windows"
    );

    for window in windows {
        let rows = ingest_window(&client, config, &window).await?;
        persist_window(storage, config, &window, &rows).await;

        // Hygiene pause between windows; no correctness implication.
        tokio::time::sleep(config.window_pause).await;
    }

    Ok(())
}

/// Run locator and fetch stage for one window and evaluate the gate.
///
/// # Errors
///
/// Returns an error if the listing scan fails or the integrity gate trips;
/// gate failure discards the window's aggregation.
pub async fn ingest_window(
    client: &GalleryClient,
    config: &Config,
    window: &TimeWindow,
) -> Result<Vec<ActivityRow>> {
    let label = window.label();
    let store = Arc::new(WindowStore::new());

    let range = locate_window_range(client, config, window)
        .await
        .with_context(|| format!("listing scan failed for window {label}"))?;

    if range.is_empty() {
        info!(window = %label, "no posts found in window");
        return Ok(store.export_rows(&label));
    }

    info!(
        window = %label,
        min_id = range.min_id,
        max_id = range.max_id,
        posts = range.len(),
        "fetching post range"
    );

    run_fetch_stage(client, config, window, range, &store).await?;

    let failures = store.failure_count();
    if !gate_passes(failures, config.failure_threshold) {
        bail!(
            "integrity gate tripped for window {label}: {failures} fetch failures \
             (threshold {}), discarding window and aborting run",
            config.failure_threshold
        );
    }

    let rows = store.export_rows(&label);
    info!(
        window = %label,
        identities = rows.len(),
        failures,
        "window aggregated"
    );
    Ok(rows)
}

/// Go/no-go decision once a window's batch has fully finished.
#[must_use]
pub fn gate_passes(failures: u32, threshold: u32) -> bool {
    failures <= threshold
}

/// Spool the window's CSV locally, then upload it.
///
/// Upload failure is logged and the spool file kept for manual recovery; the
/// aggregation itself was computed correctly, and the window simply
/// re-ingests on the next run since no artifact advanced the resume point.
async fn persist_window(
    storage: &ArtifactStore,
    config: &Config,
    window: &TimeWindow,
    rows: &[ActivityRow],
) {
    let label = window.label();
    let csv = encode_rows_csv(rows);
    let spool_path = config.spool_dir.join(format!("{label}.csv"));

    if let Err(e) = tokio::fs::write(&spool_path, csv.as_bytes()).await {
        warn!(window = %label, path = %spool_path.display(), "failed to spool artifact: {e}");
    }

    match storage.upload_window(&label, csv.as_bytes()).await {
        Ok(()) => {
            info!(window = %label, rows = rows.len(), "artifact uploaded");
            if let Err(e) = tokio::fs::remove_file(&spool_path).await {
                warn!(path = %spool_path.display(), "failed to remove spool file: {e}");
            }
        }
        Err(e) => {
            warn!(
                window = %label,
                path = %spool_path.display(),
                "upload failed, keeping spooled artifact: {e:#}"
            );
        }
    }
}

/// Current civil time in the source's fixed timezone.
fn source_now(tz_offset_hours: i32) -> NaiveDateTime {
    let offset =
        FixedOffset::east_opt(tz_offset_hours * 3600).expect("offset validated at startup");
    Utc::now().with_timezone(&offset).naive_local()
}

fn truncate_to_hour(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date()
        .and_hms_opt(ts.hour(), 0, 0)
        .expect("hour taken from a valid timestamp")
}

/// Determine the last completed window start from artifact labels.
///
/// Falls back to one hour before the current hour when nothing parseable
/// exists or the newest artifact is too stale; an unbounded backlog after a
/// long outage is never resumed.
pub fn resume_point(labels: &[String], now: NaiveDateTime, staleness_hours: i64) -> NaiveDateTime {
    let fallback = truncate_to_hour(now) - Duration::hours(1);

    let last = labels
        .iter()
        .filter_map(|label| TimeWindow::from_label(label))
        .map(|window| window.start)
        .max();

    match last {
        Some(start) if now.signed_duration_since(start) <= Duration::hours(staleness_hours) => {
            start
        }
        Some(start) => {
            warn!(
                last_completed = %start,
                "last artifact is stale, falling back to previous hour"
            );
            fallback
        }
        None => fallback,
    }
}

/// Every hourly window strictly after `last_completed` and strictly before
/// the current hour, ascending.
#[must_use]
pub fn pending_windows(last_completed: NaiveDateTime, now: NaiveDateTime) -> Vec<TimeWindow> {
    let current_hour = truncate_to_hour(now);
    let mut windows = Vec::new();
    let mut start = truncate_to_hour(last_completed) + Duration::hours(1);
    while start < current_hour {
        windows.push(TimeWindow::hour_starting(start));
        start += Duration::hours(1);
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_source_timestamp;

    fn ts(s: &str) -> NaiveDateTime {
        parse_source_timestamp(s).unwrap()
    }

    #[test]
    fn test_gate_boundary() {
        // exactly at the threshold the window is still trustworthy
        assert!(gate_passes(10, 10));
        assert!(!gate_passes(11, 10));
        assert!(gate_passes(0, 10));
    }

    #[test]
    fn test_resume_point_takes_max_parseable_label() {
        let labels = vec![
            "2025-01-01_08h".to_string(),
            "2025-01-01_10h".to_string(),
            "2025-01-01_09h".to_string(),
            "not-a-window".to_string(),
        ];
        let now = ts("2025-01-01 12:30:00");
        assert_eq!(resume_point(&labels, now, 24), ts("2025-01-01 10:00:00"));
    }

    #[test]
    fn test_resume_point_fallback_when_empty() {
        let now = ts("2025-01-01 12:30:00");
        assert_eq!(resume_point(&[], now, 24), ts("2025-01-01 11:00:00"));
    }

    #[test]
    fn test_resume_point_fallback_when_stale() {
        let labels = vec!["2024-12-25_10h".to_string()];
        let now = ts("2025-01-01 12:30:00");
        assert_eq!(resume_point(&labels, now, 24), ts("2025-01-01 11:00:00"));
    }

    #[test]
    fn test_pending_windows_enumeration() {
        let windows = pending_windows(ts("2025-01-01 09:00:00"), ts("2025-01-01 12:30:00"));
        let labels: Vec<String> = windows.iter().map(TimeWindow::label).collect();
        // strictly after 09h, excluding the current (12h) hour
        assert_eq!(labels, vec!["2025-01-01_10h", "2025-01-01_11h"]);
    }

    #[test]
    fn test_pending_windows_empty_when_caught_up() {
        assert!(pending_windows(ts("2025-01-01 11:00:00"), ts("2025-01-01 12:30:00")).is_empty());
        assert!(pending_windows(ts("2025-01-01 12:00:00"), ts("2025-01-01 12:30:00")).is_empty());
    }

    #[test]
    fn test_pending_windows_cross_midnight() {
        let windows = pending_windows(ts("2024-12-31 22:00:00"), ts("2025-01-01 01:10:00"));
        let labels: Vec<String> = windows.iter().map(TimeWindow::label).collect();
        assert_eq!(labels, vec!["2024-12-31_23h", "2025-01-01_00h"]);
    }
}
