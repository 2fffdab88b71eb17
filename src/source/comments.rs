//! Comment feed and token payloads (JSON).

use serde::Deserialize;

use crate::model::AuthorRef;

/// Response of the comment-token lookup endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenPayload {
    #[serde(default)]
    pub token: Option<String>,
}

/// Response of the comment feed endpoint.
#[derive(Debug, Deserialize)]
pub struct CommentPayload {
    #[serde(default)]
    pub comments: Vec<CommentEntry>,
}

/// One comment as the feed serves it. `reg_date` is year-less
/// (`MM.DD HH:MM:SS`); the caller prefixes the target window's year.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentEntry {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub badge: String,
    #[serde(default)]
    pub reg_date: String,
}

impl CommentEntry {
    /// Author fields of this comment, independent of the post author.
    #[must_use]
    pub fn author(&self) -> AuthorRef {
        let non_empty = |s: &str| {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };
        AuthorRef {
            user_id: non_empty(&self.user_id),
            ip: non_empty(&self.ip),
            nickname: self.name.trim().to_string(),
            badge: non_empty(&self.badge),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccountType;

    #[test]
    fn test_comment_payload_deserializes() {
        let json = r#"{
            "comments": [
                {"user_id": "alice", "ip": "", "name": "Alice", "badge": "perm", "reg_date": "01.01 09:15:00"},
                {"user_id": "", "ip": "1.2.3.4", "name": "anon", "badge": "", "reg_date": "01.01 09:20:00"}
            ]
        }"#;
        let payload: CommentPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.comments.len(), 2);

        let registered = payload.comments[0].author();
        assert_eq!(registered.account_type(), AccountType::Fixed);
        assert_eq!(registered.identity().unwrap().as_str(), "alice");

        let anon = payload.comments[1].author();
        assert_eq!(anon.account_type(), AccountType::Anonymous);
        assert_eq!(anon.identity().unwrap().as_str(), "1.2.3.4");
    }

    #[test]
    fn test_comment_payload_tolerates_missing_fields() {
        let payload: CommentPayload = serde_json::from_str(r#"{"comments": [{}]}"#).unwrap();
        assert!(payload.comments[0].author().identity().is_none());
    }

    #[test]
    fn test_empty_token_payload() {
        let payload: TokenPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.token.is_none());
    }
}
