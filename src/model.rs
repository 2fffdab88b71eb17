//! Core data types shared across the ingestion pipeline.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::constants::PERMANENT_BADGE;

/// Timestamp format used by listing and detail pages.
pub const SOURCE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format of comment entries once the year has been prefixed.
///
/// The comment feed itself only carries `MM.DD HH:MM:SS`.
const COMMENT_DATETIME_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// A one-hour half-open ingestion window `[start, end)`.
///
/// All timestamps are civil time in the source's fixed timezone; no offset
/// arithmetic happens past the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Create the one-hour window starting at `start`.
    #[must_use]
    pub fn hour_starting(start: NaiveDateTime) -> Self {
        Self {
            start,
            end: start + Duration::hours(1),
        }
    }

    /// Lookback point handed to the listing scan, one hour before `start`.
    ///
    /// Posts published just before the window may carry comments inside it,
    /// so the scan keeps them in range.
    #[must_use]
    pub fn scan_start(&self) -> NaiveDateTime {
        self.start - Duration::hours(1)
    }

    /// Half-open membership test: `start` is included, `end` is not.
    #[must_use]
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Window label used in artifact names, e.g. `2025-01-01_09h`.
    #[must_use]
    pub fn label(&self) -> String {
        self.start.format("%Y-%m-%d_%Hh").to_string()
    }

    /// Parse a window label back into a window. Returns `None` for names
    /// that do not follow the `YYYY-MM-DD_HHh` convention.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let (date_part, hour_part) = label.split_once('_')?;
        let hour: u32 = hour_part.strip_suffix('h')?.parse().ok()?;
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
        let start = date.and_hms_opt(hour, 0, 0)?;
        Some(Self::hour_starting(start))
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp from a listing or detail page.
#[must_use]
pub fn parse_source_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), SOURCE_DATETIME_FORMAT).ok()
}

/// Reconstruct a comment timestamp by prefixing the target window's year
/// onto the feed's year-less `MM.DD HH:MM:SS` value.
#[must_use]
pub fn reconstruct_comment_timestamp(year: i32, raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&format!("{year}.{}", raw.trim()), COMMENT_DATETIME_FORMAT).ok()
}

/// Attribution key for activity: the registered user id when present,
/// otherwise the anonymous poster's IP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registration status of an identity at the time of a contributing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    /// Registered nickname with the permanent badge.
    Fixed,
    /// Registered nickname without the permanent badge (or with an
    /// unrecognized badge).
    SemiFixed,
    /// No registered identifier; keyed by IP.
    Anonymous,
}

impl AccountType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::SemiFixed => "semi-fixed",
            Self::Anonymous => "anonymous",
        }
    }
}

/// Raw author fields as they appear on detail pages and comment entries.
#[derive(Debug, Clone, Default)]
pub struct AuthorRef {
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub nickname: String,
    pub badge: Option<String>,
}

impl AuthorRef {
    /// Attribution key: registered id first, IP fallback. `None` when the
    /// author carries neither and cannot be attributed.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        if let Some(uid) = self.user_id.as_deref().filter(|s| !s.is_empty()) {
            return Some(Identity(uid.to_string()));
        }
        self.ip
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|ip| Identity(ip.to_string()))
    }

    /// Classify the account type from the registered id and badge marker.
    #[must_use]
    pub fn account_type(&self) -> AccountType {
        if self.user_id.as_deref().is_some_and(|s| !s.is_empty()) {
            if self.badge.as_deref() == Some(PERMANENT_BADGE) {
                AccountType::Fixed
            } else {
                AccountType::SemiFixed
            }
        } else {
            AccountType::Anonymous
        }
    }
}

/// Per-identity activity within a single window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub latest_nickname: String,
    pub account_type: AccountType,
    pub post_count: u32,
    pub comment_count: u32,
}

impl ActivityRecord {
    #[must_use]
    pub fn new(account_type: AccountType, nickname: &str) -> Self {
        Self {
            latest_nickname: nickname.to_string(),
            account_type,
            post_count: 0,
            comment_count: 0,
        }
    }

    /// Overwrite the nickname with every non-empty observation.
    ///
    /// When an identity changes nickname mid-window, which observation ends
    /// up "latest" depends on fetch completion order and is not
    /// deterministic across runs.
    pub fn observe_nickname(&mut self, nickname: &str) {
        if !nickname.is_empty() {
            self.latest_nickname = nickname.to_string();
        }
    }
}

/// Export row handed to the persistence collaborator, one per identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRow {
    pub window_label: String,
    pub nickname: String,
    pub identity: String,
    pub account_type: AccountType,
    pub post_count: u32,
    pub comment_count: u32,
    pub total_activity: u32,
}

/// Post-id bounds located for a window; `(0, 0)` means no in-window post
/// was found and the fetch stage is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostIdRange {
    pub min_id: u64,
    pub max_id: u64,
}

impl PostIdRange {
    pub const EMPTY: Self = Self { min_id: 0, max_id: 0 };

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min_id == 0 && self.max_id == 0
    }

    /// The dense inclusive id range: every id between the bounds is fetched
    /// regardless of whether the listing scan observed it individually.
    #[must_use]
    pub fn ids(&self) -> std::ops::RangeInclusive<u64> {
        self.min_id..=self.max_id
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.max_id - self.min_id + 1
        }
    }
}
