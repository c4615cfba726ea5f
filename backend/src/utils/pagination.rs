//! Pagination maths and page links.
//!
//! Links are derived from the request's own query string with the
//! `page` parameter rewritten, so every other filter survives into the
//! emitted urls untouched.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// Number of pages needed for `total` results. An empty result set
/// still has one (empty) page so that `page=1` is always addressable.
pub fn total_pages(total: usize, per_page: i64) -> i64 {
    let per_page = per_page.max(1);
    let pages = (total as i64 + per_page - 1) / per_page;
    pages.max(1)
}

/// Builds `self`/`prev`/`next`/`last` links for the given page.
/// `prev` is omitted on the first page; `next` and `last` are omitted
/// on the final page.
pub fn build_links(path: &str, query: &str, page: i64, total_pages: i64) -> PageLinks {
    PageLinks {
        self_link: join(path, query),
        prev: (page > 1).then(|| join(path, &with_page(query, page - 1))),
        next: (page < total_pages).then(|| join(path, &with_page(query, page + 1))),
        last: (page < total_pages).then(|| join(path, &with_page(query, total_pages))),
    }
}

fn join(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}

/// Rewrites (or appends) the `page` parameter in a raw query string.
fn with_page(query: &str, page: i64) -> String {
    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some("page"))
        .map(|pair| pair.to_string())
        .collect();
    pairs.push(format!("page={}", page));
    pairs.join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up_and_floors_at_one() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(21, 10), 3);
    }

    #[test]
    fn with_page_replaces_existing_parameter() {
        assert_eq!(with_page("audit-type=update_service&page=2", 3), "audit-type=update_service&page=3");
        assert_eq!(with_page("", 1), "page=1");
        assert_eq!(with_page("page=9", 1), "page=1");
    }

    #[test]
    fn single_page_has_only_self_link() {
        let links = build_links("/audit-events", "", 1, 1);
        assert_eq!(links.self_link, "/audit-events");
        assert_eq!(links.prev, None);
        assert_eq!(links.next, None);
        assert_eq!(links.last, None);
    }

    #[test]
    fn middle_page_links_in_both_directions() {
        let links = build_links("/audit-events", "user=joe&page=2", 2, 4);
        assert_eq!(links.self_link, "/audit-events?user=joe&page=2");
        assert_eq!(links.prev.as_deref(), Some("/audit-events?user=joe&page=1"));
        assert_eq!(links.next.as_deref(), Some("/audit-events?user=joe&page=3"));
        assert_eq!(links.last.as_deref(), Some("/audit-events?user=joe&page=4"));
    }

    #[test]
    fn last_page_omits_next_and_last() {
        let links = build_links("/audit-events", "page=4", 4, 4);
        assert_eq!(links.prev.as_deref(), Some("/audit-events?page=3"));
        assert_eq!(links.next, None);
        assert_eq!(links.last, None);
    }

    #[test]
    fn links_serialize_with_self_rename() {
        let links = build_links("/audit-events", "", 1, 1);
        let value = serde_json::to_value(&links).unwrap();
        assert_eq!(value["self"], "/audit-events");
        assert!(value.get("prev").is_none());
    }
}
