use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ResultRecord, ResultRow};

/// Organic results link through the search engine's redirect; anything else
/// (image/news carousels, related searches) is a non-organic placement.
pub const REDIRECT_PREFIX: &str = "/url?";

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^/]+").expect("domain pattern is a valid regex")
});

/// Turn settled rows into result records.
///
/// - Stops at the first row without a URL cell (end of data).
/// - Skips rows whose URL does not start with [`REDIRECT_PREFIX`]; they do
///   not consume a position.
/// - `url` is the bare `scheme://host` after the prefix, or empty when none
///   is found.
pub fn extract_records(
    rows: &[ResultRow],
    keyword: &str,
    group: &str,
    date: &str,
) -> Vec<ResultRecord> {
    let mut records = Vec::new();
    let mut position = 0u32;

    for row in rows {
        let Some(url_cell) = row.url.as_deref() else {
            break;
        };

        let Some(target) = url_cell.strip_prefix(REDIRECT_PREFIX) else {
            continue;
        };

        records.push(ResultRecord {
            keyword: keyword.to_string(),
            group: group.to_string(),
            date: date.to_string(),
            url: bare_domain(target).unwrap_or_default().to_string(),
            anchor_text: row.title.clone().unwrap_or_default(),
            position,
        });
        position += 1;
    }

    records
}

/// First `scheme://host` found in `target`.
pub fn bare_domain(target: &str) -> Option<&str> {
    DOMAIN_RE.find(target).map(|m| m.as_str())
}
