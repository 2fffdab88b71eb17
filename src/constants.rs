//! Shared constants used across the application.

/// User agent string used for source HTTP requests.
///
/// A realistic browser user agent; the gallery serves reduced markup (and
/// sometimes refuses outright) to clients that identify as bots.
pub const SOURCE_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Badge marker carried by permanently registered nicknames.
pub const PERMANENT_BADGE: &str = "perm";

/// Nickname of the gallery's automated placeholder commenter.
///
/// Its entries appear in comment feeds alongside real comments and are not
/// contributions by an actual identity.
pub const AUTO_COMMENT_AUTHOR: &str = "auto-reply";

/// Subject prefixes marking non-content listing rows (notices, surveys, ads).
pub const NOISE_SUBJECT_MARKERS: &[&str] = &["[notice]", "[survey]", "[ad]"];
