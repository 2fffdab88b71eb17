//! Detail & Comment Fetcher: fetches every id in the located range with
//! bounded parallelism and folds classified activity into the window store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Datelike;
use rand::{thread_rng, Rng};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::constants::AUTO_COMMENT_AUTHOR;
use crate::model::{parse_source_timestamp, reconstruct_comment_timestamp, PostIdRange, TimeWindow};
use crate::source::{FetchError, GalleryClient};
use crate::store::WindowStore;

/// Fetch the dense inclusive id range and update `store`.
///
/// Ids are dispatched in increasing order behind a fixed-size semaphore, with
/// a pacing delay plus jitter between dispatches; completions land in any
/// order, which is safe because store updates commute. Exhausted-retry fetch
/// failures are counted in the store and never stop the batch.
///
/// # Errors
///
/// Returns an error only if the worker semaphore is closed, which does not
/// happen while this function owns it.
pub async fn run_fetch_stage(
    client: &GalleryClient,
    config: &Config,
    window: &TimeWindow,
    range: PostIdRange,
    store: &Arc<WindowStore>,
) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(config.worker_concurrency));
    let mut handles = Vec::new();

    for post_id in range.ids() {
        let permit = semaphore.clone().acquire_owned().await?;
        pace(config.pacing_delay, config.pacing_jitter).await;

        let client = client.clone();
        let window = *window;
        let store = Arc::clone(store);

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            match ingest_post(&client, &window, &store, post_id).await {
                Ok(()) => {}
                Err(e @ FetchError::Payload(_)) => {
                    // Malformed payloads are unrecoverable noise, not a
                    // systemic failure.
                    debug!(post_id, error = %e, "skipping unparseable payload");
                }
                Err(e) => {
                    let failures = store.note_failure();
                    warn!(post_id, failures, "fetch failed after retries: {e}");
                }
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!("fetch task panicked: {e}");
        }
    }

    Ok(())
}

/// Mandatory delay between dispatches to the origin, plus randomized jitter.
async fn pace(delay: Duration, jitter: Duration) {
    let jitter_ms = jitter.as_millis() as u64;
    let extra = if jitter_ms == 0 {
        0
    } else {
        thread_rng().gen_range(0..=jitter_ms)
    };
    let total = delay + Duration::from_millis(extra);
    if !total.is_zero() {
        tokio::time::sleep(total).await;
    }
}

/// Fetch one post's detail and comments and fold them into the store.
async fn ingest_post(
    client: &GalleryClient,
    window: &TimeWindow,
    store: &WindowStore,
    post_id: u64,
) -> Result<(), FetchError> {
    let Some(detail) = client.post_detail(post_id).await? else {
        debug!(post_id, "post missing, skipping");
        return Ok(());
    };

    if let Some(published) = parse_source_timestamp(&detail.published_raw) {
        if window.contains(published) {
            if let Some(identity) = detail.author.identity() {
                store.record_post(identity, detail.author.account_type(), &detail.author.nickname);
            }
        }
    }

    // Comments are fetched even when the post itself is outside the window:
    // the lookback buffer exists precisely so that in-window comments on
    // just-before-window posts are counted.
    let token = match detail.comment_token {
        Some(token) => Some(token),
        None => client.comment_token(post_id).await?,
    };
    let Some(token) = token else {
        debug!(post_id, "no comment token available, skipping comments");
        return Ok(());
    };

    let year = window.start.year();
    for entry in client.comments(post_id, &token).await? {
        if entry.name.trim() == AUTO_COMMENT_AUTHOR {
            continue;
        }
        let Some(ts) = reconstruct_comment_timestamp(year, &entry.reg_date) else {
            // Unrecoverable without a year the feed never sends; not worth
            // corrupting the window over.
            debug!(post_id, reg_date = %entry.reg_date, "discarding unparseable comment timestamp");
            continue;
        };
        if !window.contains(ts) {
            continue;
        }
        let author = entry.author();
        if let Some(identity) = author.identity() {
            store.record_comment(identity, author.account_type(), &author.nickname);
        }
    }

    Ok(())
}
