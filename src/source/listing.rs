//! Parsing of board listing pages.

use scraper::{Html, Selector};

/// One raw row from a listing page, before any scan-side filtering.
///
/// The id is kept as text: notice/ad rows carry non-numeric markers in the
/// id cell and the scan rejects them there.
#[derive(Debug, Clone)]
pub struct ListingRow {
    pub id_text: String,
    pub subject: String,
    pub published: String,
}

/// Extract rows from a listing page, in the order the source presents them.
///
/// Rows missing a cell are dropped; the scan's termination heuristic only
/// needs the well-formed ones.
#[must_use]
pub fn parse_listing(html: &str) -> Vec<ListingRow> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse("table.board-list tr.post-row").expect("Invalid selector");
    let num_selector = Selector::parse("td.post-num").expect("Invalid selector");
    let subject_selector = Selector::parse("td.post-subject").expect("Invalid selector");
    let date_selector = Selector::parse("td.post-date").expect("Invalid selector");

    let mut rows = Vec::new();

    for row in document.select(&row_selector) {
        let Some(num) = row.select(&num_selector).next() else {
            continue;
        };
        let Some(subject) = row.select(&subject_selector).next() else {
            continue;
        };
        let Some(date) = row.select(&date_selector).next() else {
            continue;
        };

        // The full timestamp lives in the title attribute; the cell text is
        // a display-shortened form.
        let published = date
            .value()
            .attr("title")
            .map(str::to_string)
            .unwrap_or_else(|| date.text().collect::<String>());

        rows.push(ListingRow {
            id_text: num.text().collect::<String>().trim().to_string(),
            subject: subject.text().collect::<String>().trim().to_string(),
            published: published.trim().to_string(),
        });
    }

    rows
}
