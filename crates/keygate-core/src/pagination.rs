//! Page metadata and navigation links for listing endpoints.
//!
//! Everything here is a pure function of `(total_items, page, per_page)`.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total_items: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub items_per_page: u64,
    #[serde(skip)]
    pub offset: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub next_page: Option<u64>,
    pub previous_page: Option<u64>,
}

/// Computes page metadata. `page` and `per_page` below 1 are clamped to 1.
pub fn paginate(total_items: u64, page: i64, per_page: i64) -> PageMeta {
    let page = page.max(1) as u64;
    let per_page = per_page.max(1) as u64;

    let total_pages = total_items.div_ceil(per_page);
    let has_next_page = page < total_pages;
    let has_previous_page = page > 1;

    PageMeta {
        total_items,
        total_pages,
        current_page: page,
        items_per_page: per_page,
        offset: (page - 1).saturating_mul(per_page),
        has_next_page,
        has_previous_page,
        next_page: has_next_page.then(|| page + 1),
        previous_page: has_previous_page.then(|| page - 1),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub first: String,
    pub last: String,
    pub next: Option<String>,
    pub prev: Option<String>,
}

impl PageLinks {
    /// Builds `?page=&per_page=` links against `base_path`.
    pub fn build(base_path: &str, meta: &PageMeta) -> Self {
        let link = |page: u64| format!("{base_path}?page={page}&per_page={}", meta.items_per_page);

        Self {
            self_link: link(meta.current_page),
            first: link(1),
            last: link(meta.total_pages.max(1)),
            next: meta.next_page.map(link),
            prev: meta.previous_page.map(link),
        }
    }
}

/// A page of items plus its metadata and links.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageMeta,
    pub links: PageLinks,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_partial_page() {
        let meta = paginate(25, 3, 10);
        assert_eq!(meta.total_pages, 3);
        assert!(!meta.has_next_page);
        assert!(meta.has_previous_page);
        assert_eq!(meta.offset, 20);
        assert_eq!(meta.next_page, None);
        assert_eq!(meta.previous_page, Some(2));
    }

    #[test]
    fn first_page_has_no_previous() {
        let meta = paginate(25, 1, 10);
        assert!(meta.has_next_page);
        assert!(!meta.has_previous_page);
        assert_eq!(meta.offset, 0);
        assert_eq!(meta.next_page, Some(2));
        assert_eq!(meta.previous_page, None);
    }

    #[test]
    fn exact_multiple_does_not_add_a_page() {
        assert_eq!(paginate(30, 1, 10).total_pages, 3);
        assert_eq!(paginate(31, 1, 10).total_pages, 4);
    }

    #[test]
    fn empty_collection() {
        let meta = paginate(0, 1, 10);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next_page);
        assert!(!meta.has_previous_page);
    }

    #[test]
    fn inputs_below_one_are_clamped() {
        let meta = paginate(25, 0, -5);
        assert_eq!(meta.current_page, 1);
        assert_eq!(meta.items_per_page, 1);
        assert_eq!(meta.offset, 0);
        assert_eq!(meta.total_pages, 25);

        assert_eq!(paginate(25, -3, 10), paginate(25, 1, 10));
    }

    #[test]
    fn page_beyond_the_end() {
        let meta = paginate(5, 4, 2);
        assert_eq!(meta.total_pages, 3);
        assert!(!meta.has_next_page);
        assert!(meta.has_previous_page);
        assert_eq!(meta.offset, 6);
    }

    #[test]
    fn identical_inputs_identical_output() {
        assert_eq!(paginate(99, 4, 7), paginate(99, 4, 7));
    }

    #[test]
    fn links_for_middle_page() {
        let meta = paginate(25, 2, 10);
        let links = PageLinks::build("/api/v1/users", &meta);

        assert_eq!(links.self_link, "/api/v1/users?page=2&per_page=10");
        assert_eq!(links.first, "/api/v1/users?page=1&per_page=10");
        assert_eq!(links.last, "/api/v1/users?page=3&per_page=10");
        assert_eq!(links.next.as_deref(), Some("/api/v1/users?page=3&per_page=10"));
        assert_eq!(links.prev.as_deref(), Some("/api/v1/users?page=1&per_page=10"));
    }

    #[test]
    fn links_omit_prev_on_first_page_and_next_on_last() {
        let first = PageLinks::build("/u", &paginate(25, 1, 10));
        assert!(first.prev.is_none());
        assert!(first.next.is_some());

        let last = PageLinks::build("/u", &paginate(25, 3, 10));
        assert!(last.next.is_none());
        assert!(last.prev.is_some());
    }

    #[test]
    fn links_serialize_with_self_key() {
        let links = PageLinks::build("/u", &paginate(0, 1, 10));
        let json = serde_json::to_value(&links).unwrap();
        assert_eq!(json["self"], "/u?page=1&per_page=10");
        assert_eq!(json["last"], "/u?page=1&per_page=10");
        assert!(json["prev"].is_null());
        assert!(json["next"].is_null());
    }
}
