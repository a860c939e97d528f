//! Pagination bookkeeping for catalog and order listings.

use serde::{Deserialize, Serialize};

/// Default page size for catalog grids.
pub const DEFAULT_LIMIT: u32 = 12;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// A requested page, as parsed from `?page=&limit=`.
///
/// Values are clamped on construction: `page >= 1`, `1 <= limit <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "RawPageRequest")]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

#[derive(Deserialize)]
struct RawPageRequest {
    page: Option<u32>,
    limit: Option<u32>,
}

impl From<RawPageRequest> for PageRequest {
    fn from(raw: RawPageRequest) -> Self {
        Self::new(raw.page.unwrap_or(1), raw.limit.unwrap_or(DEFAULT_LIMIT))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_LIMIT)
    }
}

impl PageRequest {
    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }
}

/// Pagination metadata for a listing.
///
/// The API names these fields differently across endpoints, so the common
/// aliases are accepted. `total_pages` is recomputed when it is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPagination")]
pub struct Pagination {
    /// Current page number (1-based).
    pub page: u32,
    /// Items per page.
    pub limit: u32,
    /// Total number of items.
    pub total: u64,
    /// Total number of pages.
    pub total_pages: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPagination {
    #[serde(default, alias = "currentPage")]
    page: Option<u32>,
    #[serde(default, alias = "perPage", alias = "pageSize")]
    limit: Option<u32>,
    #[serde(default, alias = "totalItems", alias = "count")]
    total: Option<u64>,
    #[serde(default, alias = "pages")]
    total_pages: Option<u32>,
}

impl From<RawPagination> for Pagination {
    fn from(raw: RawPagination) -> Self {
        let mut pagination = Self::new(
            raw.page.unwrap_or(1),
            raw.limit.unwrap_or(DEFAULT_LIMIT),
            raw.total.unwrap_or(0),
        );
        if let Some(total_pages) = raw.total_pages {
            pagination.total_pages = total_pages;
        }
        pagination
    }
}

impl Pagination {
    /// Create pagination metadata, clamping page and limit.
    #[must_use]
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let request = PageRequest::new(page, limit);
        let total_pages = total.div_ceil(u64::from(request.limit));
        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }

    /// Metadata for a single unpaginated list of `len` items.
    #[must_use]
    pub fn single_page(len: usize) -> Self {
        let total = u64::try_from(len).unwrap_or(u64::MAX);
        let limit = u32::try_from(len).unwrap_or(MAX_LIMIT).clamp(1, MAX_LIMIT);
        Self {
            page: 1,
            limit,
            total,
            total_pages: u32::from(len > 0),
        }
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn next_page(&self) -> Option<u32> {
        if self.has_next() {
            Some(self.page + 1)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn prev_page(&self) -> Option<u32> {
        if self.has_prev() {
            Some(self.page - 1)
        } else {
            None
        }
    }

    /// Page numbers to show in the navigation bar, centered on the current
    /// page and at most `width` wide.
    #[must_use]
    pub fn window(&self, width: u32) -> Vec<u32> {
        if self.total_pages == 0 || width == 0 {
            return Vec::new();
        }
        let width = width.min(self.total_pages);
        let half = width / 2;
        let start = self
            .page
            .saturating_sub(half)
            .max(1)
            .min(self.total_pages - width + 1);
        (start..start + width).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_ceil() {
        assert_eq!(Pagination::new(1, 12, 25).total_pages, 3);
        assert_eq!(Pagination::new(1, 12, 24).total_pages, 2);
        assert_eq!(Pagination::new(1, 12, 0).total_pages, 0);
    }

    #[test]
    fn test_clamping() {
        let p = Pagination::new(0, 500, 1000);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, MAX_LIMIT);
        assert_eq!(PageRequest::new(0, 0), PageRequest { page: 1, limit: 1 });
    }

    #[test]
    fn test_navigation() {
        let first = Pagination::new(1, 10, 30);
        assert!(!first.has_prev());
        assert_eq!(first.next_page(), Some(2));

        let last = Pagination::new(3, 10, 30);
        assert!(!last.has_next());
        assert_eq!(last.prev_page(), Some(2));
        assert_eq!(last.next_page(), None);
    }

    #[test]
    fn test_window() {
        assert_eq!(Pagination::new(1, 10, 100).window(5), vec![1, 2, 3, 4, 5]);
        assert_eq!(Pagination::new(5, 10, 100).window(5), vec![3, 4, 5, 6, 7]);
        assert_eq!(Pagination::new(10, 10, 100).window(5), vec![6, 7, 8, 9, 10]);
        assert_eq!(Pagination::new(1, 10, 20).window(5), vec![1, 2]);
        assert!(Pagination::new(1, 10, 0).window(5).is_empty());
    }

    #[test]
    fn test_deserialize_aliases() {
        let p: Pagination =
            serde_json::from_str(r#"{"currentPage":2,"perPage":20,"totalItems":45}"#)
                .unwrap_or_else(|_| Pagination::new(1, 1, 0));
        assert_eq!(p, Pagination::new(2, 20, 45));
        assert_eq!(p.total_pages, 3);
    }

    #[test]
    fn test_page_request_from_query() {
        let req: PageRequest =
            serde_json::from_str(r#"{"page":3}"#).unwrap_or_default();
        assert_eq!(req, PageRequest { page: 3, limit: DEFAULT_LIMIT });
    }
}
