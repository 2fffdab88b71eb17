//! HTTP client for the gallery source: listing pages, post detail pages,
//! comment-token lookup and the token-gated comment feed.

pub mod comments;
pub mod detail;
pub mod listing;

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::constants::SOURCE_USER_AGENT;
pub use comments::CommentEntry;
pub use detail::PostDetail;
pub use listing::ListingRow;

/// Typed outcome of a source request.
///
/// `Transport` and `Status` are retryable; `Payload` is a fatal parse
/// failure and never retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(StatusCode),
    #[error("unexpected payload: {0}")]
    Payload(String),
}

impl FetchError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status(_))
    }
}

/// Retry wrapper applied to every source request: up to `max_attempts`
/// tries, no backoff beyond the fetch stage's own pacing delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    debug!(attempt, error = %e, "retrying source request");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Connection-pooled client for one gallery board.
///
/// Owns no semantic state; cheap to clone into fetch workers.
#[derive(Debug, Clone)]
pub struct GalleryClient {
    http: reqwest::Client,
    base_url: String,
    board_id: String,
    retry: RetryPolicy,
    list_timeout: Duration,
    content_timeout: Duration,
}

impl GalleryClient {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            board_id: config.board_id.clone(),
            retry: RetryPolicy {
                max_attempts: config.max_fetch_attempts,
            },
            list_timeout: config.list_timeout,
            content_timeout: config.content_timeout,
        }
    }

    /// Fetch one listing page and parse its rows.
    ///
    /// A page past the end of the listing comes back empty rather than as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns a retryable error once the retry budget for the request is
    /// exhausted.
    pub async fn listing_page(&self, page: u32) -> Result<Vec<ListingRow>, FetchError> {
        let url = format!(
            "{}/board/lists?id={}&page={page}",
            self.base_url, self.board_id
        );
        let body = self
            .retry
            .run(|| self.get_text(url.clone(), self.list_timeout))
            .await?;
        Ok(body.map(|html| listing::parse_listing(&html)).unwrap_or_default())
    }

    /// Fetch and parse a post detail page.
    ///
    /// `Ok(None)` covers both a missing post (deleted id inside the dense
    /// range) and a page whose markup did not parse; either way the post is
    /// skipped without touching the failure counter.
    ///
    /// # Errors
    ///
    /// Returns a retryable error once the retry budget is exhausted.
    pub async fn post_detail(&self, post_id: u64) -> Result<Option<PostDetail>, FetchError> {
        let url = format!(
            "{}/board/view?id={}&no={post_id}",
            self.base_url, self.board_id
        );
        let Some(body) = self
            .retry
            .run(|| self.get_text(url.clone(), self.content_timeout))
            .await?
        else {
            return Ok(None);
        };

        let parsed = detail::parse_detail(&body);
        if parsed.is_none() {
            debug!(post_id, "detail page did not parse, skipping post");
        }
        Ok(parsed)
    }

    /// Look up the comment token for a post when the detail payload lacked it.
    ///
    /// # Errors
    ///
    /// Returns a retryable error once the retry budget is exhausted, or a
    /// payload error for malformed JSON.
    pub async fn comment_token(&self, post_id: u64) -> Result<Option<String>, FetchError> {
        let url = format!(
            "{}/board/comment-token?id={}&no={post_id}",
            self.base_url, self.board_id
        );
        let Some(body) = self
            .retry
            .run(|| self.get_text(url.clone(), self.content_timeout))
            .await?
        else {
            return Ok(None);
        };

        let payload: comments::TokenPayload = serde_json::from_str(&body)
            .map_err(|e| FetchError::Payload(format!("token payload: {e}")))?;
        Ok(payload.token.filter(|t| !t.is_empty()))
    }

    /// Fetch the comment feed for a post.
    ///
    /// # Errors
    ///
    /// Returns a retryable error once the retry budget is exhausted, or a
    /// payload error for malformed JSON.
    pub async fn comments(
        &self,
        post_id: u64,
        token: &str,
    ) -> Result<Vec<CommentEntry>, FetchError> {
        let url = format!(
            "{}/board/comments?id={}&no={post_id}&token={token}",
            self.base_url, self.board_id
        );
        let Some(body) = self
            .retry
            .run(|| self.get_text(url.clone(), self.content_timeout))
            .await?
        else {
            return Ok(Vec::new());
        };

        let payload: comments::CommentPayload = serde_json::from_str(&body)
            .map_err(|e| FetchError::Payload(format!("comment payload: {e}")))?;
        Ok(payload.comments)
    }

    /// Issue one GET with the given per-request timeout.
    ///
    /// `Ok(None)` for 404/410 (gone content is noise, not a failure); any
    /// other non-success status is retryable, since the source answers
    /// overload and blocking with both 5xx and 4xx refusals.
    async fn get_text(
        &self,
        url: String,
        timeout: Duration,
    ) -> Result<Option<String>, FetchError> {
        let response = self
            .http
            .get(&url)
            .header("User-Agent", SOURCE_USER_AGENT)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(Some(response.text().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_retryability() {
        assert!(FetchError::Status(StatusCode::INTERNAL_SERVER_ERROR).is_retryable());
        assert!(FetchError::Status(StatusCode::FORBIDDEN).is_retryable());
        assert!(!FetchError::Payload("bad json".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn test_retry_policy_stops_on_fatal_error() {
        let policy = RetryPolicy { max_attempts: 3 };
        let mut calls = 0u32;
        let result: Result<(), FetchError> = policy
            .run(|| {
                calls += 1;
                async { Err(FetchError::Payload("malformed".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retry_policy_exhausts_retryable_errors() {
        let policy = RetryPolicy { max_attempts: 3 };
        let mut calls = 0u32;
        let result: Result<(), FetchError> = policy
            .run(|| {
                calls += 1;
                async { Err(FetchError::Status(StatusCode::BAD_GATEWAY)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
