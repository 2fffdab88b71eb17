//! Parsing of post detail pages.

use scraper::{ElementRef, Html, Selector};

use crate::model::AuthorRef;

/// Author, publish timestamp and comment token extracted from a detail page.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub author: AuthorRef,
    pub published_raw: String,
    /// Token gating the comment feed. Absent on some pages; a dedicated
    /// lookup request recovers it.
    pub comment_token: Option<String>,
}

/// Parse a detail page. `None` when the expected head markup is missing
/// (deleted-but-200 placeholder pages, markup drift).
#[must_use]
pub fn parse_detail(html: &str) -> Option<PostDetail> {
    let document = Html::parse_document(html);
    let writer_selector = Selector::parse(".view-head .post-writer").expect("Invalid selector");
    let date_selector = Selector::parse(".view-head .post-date").expect("Invalid selector");
    let token_selector = Selector::parse("input#comment-token").expect("Invalid selector");

    let writer = document.select(&writer_selector).next()?;
    let date = document.select(&date_selector).next()?;

    let published_raw = date
        .value()
        .attr("title")
        .map(str::to_string)
        .unwrap_or_else(|| date.text().collect::<String>())
        .trim()
        .to_string();

    let comment_token = document
        .select(&token_selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    Some(PostDetail {
        author: author_from_element(&writer),
        published_raw,
        comment_token,
    })
}

/// Read author fields off a writer element: `data-uid`, `data-ip`,
/// `data-badge` attributes plus a nested `.nickname` span.
fn author_from_element(writer: &ElementRef) -> AuthorRef {
    let attr = |name: &str| {
        writer
            .value()
            .attr(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let nickname_selector = Selector::parse(".nickname").expect("Invalid selector");
    let nickname = writer
        .select(&nickname_selector)
        .next()
        .map(|n| n.text().collect::<String>())
        .unwrap_or_else(|| writer.text().collect::<String>())
        .trim()
        .to_string();

    AuthorRef {
        user_id: attr("data-uid"),
        ip: attr("data-ip"),
        nickname,
        badge: attr("data-badge"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccountType;

    const REGISTERED_DETAIL: &str = r#"
<html><body>
<div class="view-head">
  <span class="post-writer" data-uid="alice" data-ip="" data-badge="perm">
    <span class="nickname">Alice</span>
  </span>
  <span class="post-date" title="2025-01-01 09:05:00">09:05</span>
</div>
<input type="hidden" id="comment-token" value="tok-100">
<div class="view-body">hello</div>
</body></html>
"#;

    const ANONYMOUS_DETAIL: &str = r#"
<html><body>
<div class="view-head">
  <span class="post-writer" data-uid="" data-ip="1.2.3.4">
    <span class="nickname">someone</span>
  </span>
  <span class="post-date" title="2025-01-01 09:30:00">09:30</span>
</div>
</body></html>
"#;

    #[test]
    fn test_parse_registered_detail() {
        let detail = parse_detail(REGISTERED_DETAIL).unwrap();
        assert_eq!(detail.author.user_id.as_deref(), Some("alice"));
        assert_eq!(detail.author.nickname, "Alice");
        assert_eq!(detail.author.account_type(), AccountType::Fixed);
        assert_eq!(detail.published_raw, "2025-01-01 09:05:00");
        assert_eq!(detail.comment_token.as_deref(), Some("tok-100"));
    }

    #[test]
    fn test_parse_anonymous_detail_without_token() {
        let detail = parse_detail(ANONYMOUS_DETAIL).unwrap();
        assert!(detail.author.user_id.is_none());
        assert_eq!(detail.author.ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(detail.author.account_type(), AccountType::Anonymous);
        assert!(detail.comment_token.is_none());
    }

    #[test]
    fn test_parse_detail_missing_head_returns_none() {
        assert!(parse_detail("<html><body><p>deleted</p></body></html>").is_none());
    }
}
