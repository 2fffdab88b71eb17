//! List Locator: walks listing pages in source order and finds the post-id
//! bounds belonging to a target window.
//!
//! The walk is strictly sequential. Termination rests on observing a run of
//! consecutive posts older than the window, which only means anything if
//! rows are evaluated in the order the source presents them.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::NOISE_SUBJECT_MARKERS;
use crate::model::{parse_source_timestamp, PostIdRange, TimeWindow};
use crate::source::{GalleryClient, ListingRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Continue,
    Done,
}

/// Row-at-a-time evaluation of a listing walk.
///
/// Tolerates the listing's noise: pinned threads surface stale timestamps out
/// of order, pagination repeats rows across requests, and notice/survey/ad
/// rows are interleaved with content.
#[derive(Debug)]
pub struct RangeScan {
    window: TimeWindow,
    scan_start: NaiveDateTime,
    pinned_cutoff: NaiveDateTime,
    old_streak_limit: u32,
    seen: HashSet<u64>,
    min_id: u64,
    max_id: u64,
    consecutive_old: u32,
}

impl RangeScan {
    #[must_use]
    pub fn new(window: TimeWindow, pinned_cutoff_hours: i64, old_streak_limit: u32) -> Self {
        Self {
            window,
            scan_start: window.scan_start(),
            pinned_cutoff: window.start - Duration::hours(pinned_cutoff_hours),
            old_streak_limit,
            seen: HashSet::new(),
            min_id: 0,
            max_id: 0,
            consecutive_old: 0,
        }
    }

    /// Evaluate one listing row; `Done` once enough consecutive pre-window
    /// posts prove the window has been fully traversed.
    pub fn observe(&mut self, row: &ListingRow) -> ScanStatus {
        let Ok(id) = row.id_text.parse::<u64>() else {
            return ScanStatus::Continue;
        };
        if is_noise_subject(&row.subject) {
            return ScanStatus::Continue;
        }
        // Pagination repeats rows across requests.
        if !self.seen.insert(id) {
            return ScanStatus::Continue;
        }
        let Some(ts) = parse_source_timestamp(&row.published) else {
            return ScanStatus::Continue;
        };

        // Stale pinned/promoted threads are not organically ordered and must
        // affect neither the bounds nor the termination streak.
        if ts < self.pinned_cutoff {
            debug!(id, published = %row.published, "ignoring pinned post");
            return ScanStatus::Continue;
        }

        if ts >= self.scan_start && ts < self.window.end {
            if self.min_id == 0 || id < self.min_id {
                self.min_id = id;
            }
            if id > self.max_id {
                self.max_id = id;
            }
            self.consecutive_old = 0;
        } else if ts < self.window.start {
            self.consecutive_old += 1;
            if self.consecutive_old >= self.old_streak_limit {
                return ScanStatus::Done;
            }
        } else {
            // Still in content newer than the window.
            self.consecutive_old = 0;
        }

        ScanStatus::Continue
    }

    #[must_use]
    pub fn into_range(self) -> PostIdRange {
        PostIdRange {
            min_id: self.min_id,
            max_id: self.max_id,
        }
    }
}

fn is_noise_subject(subject: &str) -> bool {
    let subject = subject.trim();
    NOISE_SUBJECT_MARKERS
        .iter()
        .any(|marker| subject.starts_with(marker))
}

/// Walk listing pages until the scan terminates, the listing runs out, or
/// the hard page bound is hit.
///
/// # Errors
///
/// Returns an error when a listing page cannot be fetched after retries: the
/// termination heuristic cannot survive a hole in the page walk.
pub async fn locate_window_range(
    client: &GalleryClient,
    config: &Config,
    window: &TimeWindow,
) -> Result<PostIdRange> {
    let mut scan = RangeScan::new(*window, config.pinned_cutoff_hours, config.old_post_streak);
    let mut terminated = false;

    'pages: for page in 1..=config.max_list_pages {
        let rows = client
            .listing_page(page)
            .await
            .with_context(|| format!("failed to fetch listing page {page}"))?;

        if rows.is_empty() {
            debug!(page, "empty listing page, stopping scan");
            terminated = true;
            break;
        }

        for row in &rows {
            if scan.observe(row) == ScanStatus::Done {
                debug!(page, "old-post streak reached, stopping scan");
                terminated = true;
                break 'pages;
            }
        }
    }

    if !terminated {
        warn!(
            max_pages = config.max_list_pages,
            window = %window.label(),
            "abandoning listing scan at page bound"
        );
    }

    let range = scan.into_range();
    info!(
        window = %window.label(),
        min_id = range.min_id,
        max_id = range.max_id,
        "listing scan complete"
    );
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> TimeWindow {
        TimeWindow::hour_starting(parse_source_timestamp("2025-01-01 09:00:00").unwrap())
    }

    fn scan() -> RangeScan {
        RangeScan::new(window(), 24, 10)
    }

    fn row(id: &str, published: &str) -> ListingRow {
        ListingRow {
            id_text: id.to_string(),
            subject: "a post".to_string(),
            published: published.to_string(),
        }
    }

    #[test]
    fn test_in_window_rows_update_bounds() {
        let mut scan = scan();
        assert_eq!(scan.observe(&row("105", "2025-01-01 09:30:00")), ScanStatus::Continue);
        assert_eq!(scan.observe(&row("110", "2025-01-01 09:59:59")), ScanStatus::Continue);
        assert_eq!(scan.observe(&row("100", "2025-01-01 09:00:00")), ScanStatus::Continue);

        let range = scan.into_range();
        assert_eq!(range, PostIdRange { min_id: 100, max_id: 110 });
    }

    #[test]
    fn test_lookback_buffer_posts_are_kept_in_range() {
        let mut scan = scan();
        scan.observe(&row("100", "2025-01-01 09:10:00"));
        // published before the window but inside the lookback buffer
        scan.observe(&row("99", "2025-01-01 08:30:00"));

        assert_eq!(scan.into_range(), PostIdRange { min_id: 99, max_id: 100 });
    }

    #[test]
    fn test_post_at_end_is_excluded() {
        let mut scan = scan();
        scan.observe(&row("200", "2025-01-01 10:00:00"));
        assert!(scan.into_range().is_empty());
    }

    #[test]
    fn test_non_numeric_and_noise_rows_skipped() {
        let mut scan = scan();
        scan.observe(&row("notice", "2025-01-01 09:30:00"));
        scan.observe(&ListingRow {
            id_text: "107".to_string(),
            subject: "[survey] which keyboard".to_string(),
            published: "2025-01-01 09:30:00".to_string(),
        });
        scan.observe(&row("bad-ts", "yesterday"));
        assert!(scan.into_range().is_empty());
    }

    #[test]
    fn test_duplicate_rows_counted_once() {
        let mut scan = scan();
        // a duplicated old row must not double-increment the streak
        for _ in 0..2 {
            scan.observe(&row("90", "2025-01-01 07:00:00"));
        }
        assert_eq!(scan.consecutive_old, 1);
    }

    #[test]
    fn test_pinned_post_affects_nothing() {
        let mut scan = scan();
        // more than 24h before start: no bounds update, no streak movement
        assert_eq!(scan.observe(&row("5", "2024-12-30 09:00:00")), ScanStatus::Continue);
        assert_eq!(scan.consecutive_old, 0);
        assert!(scan.into_range().is_empty());

        // exactly at the cutoff is still organic ordering, counts as old
        let mut scan = RangeScan::new(window(), 24, 10);
        scan.observe(&row("6", "2024-12-31 09:00:00"));
        assert_eq!(scan.consecutive_old, 1);
    }

    #[test]
    fn test_nine_old_posts_do_not_terminate_tenth_does() {
        let mut scan = scan();
        for i in 0..9u64 {
            let status = scan.observe(&row(&(90 - i).to_string(), "2025-01-01 07:00:00"));
            assert_eq!(status, ScanStatus::Continue);
        }
        let status = scan.observe(&row("81", "2025-01-01 07:00:00"));
        assert_eq!(status, ScanStatus::Done);
    }

    #[test]
    fn test_newer_post_resets_old_streak() {
        let mut scan = scan();
        for i in 0..9u64 {
            scan.observe(&row(&(90 - i).to_string(), "2025-01-01 07:00:00"));
        }
        // newer-than-window content resets the streak
        scan.observe(&row("300", "2025-01-01 11:00:00"));
        assert_eq!(scan.consecutive_old, 0);

        let status = scan.observe(&row("80", "2025-01-01 07:00:00"));
        assert_eq!(status, ScanStatus::Continue);
    }

    #[test]
    fn test_old_run_stops_scan_and_keeps_bounds() {
        // ids 100..110 in-window, then ids 99..90 at 07:00: scan stops after
        // the old group and reports (100, 110)
        let mut scan = scan();
        for id in (100..=110).rev() {
            assert_eq!(
                scan.observe(&row(&id.to_string(), "2025-01-01 09:30:00")),
                ScanStatus::Continue
            );
        }
        let mut stopped = false;
        for id in (90..=99).rev() {
            if scan.observe(&row(&id.to_string(), "2025-01-01 07:00:00")) == ScanStatus::Done {
                stopped = true;
                break;
            }
        }
        assert!(stopped);
        assert_eq!(scan.into_range(), PostIdRange { min_id: 100, max_id: 110 });
    }
}
