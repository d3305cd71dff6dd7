//! Page arithmetic for listing views.

use serde::{Deserialize, Serialize};

/// Position within a paginated listing.
///
/// Pages are 1-based. A listing with no results still has one (empty) page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Current page, 1-based.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items across all pages.
    pub total: u64,
}

impl Pagination {
    /// Create a pagination value, normalizing page and page size to at least 1.
    #[must_use]
    pub fn new(page: u32, per_page: u32, total: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
            total,
        }
    }

    /// Number of pages, never less than 1.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        let pages = self.total.div_ceil(u64::from(self.per_page.max(1))).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Whether a previous page exists.
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Whether a next page exists.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Previous page number (saturating at 1).
    #[must_use]
    pub const fn prev_page(&self) -> u32 {
        if self.page > 1 { self.page - 1 } else { 1 }
    }

    /// Next page number (saturating at the last page).
    #[must_use]
    pub fn next_page(&self) -> u32 {
        self.page.saturating_add(1).min(self.total_pages())
    }

    /// Page numbers to link to: up to `radius` pages on each side of the
    /// current one, clamped to the valid range.
    #[must_use]
    pub fn window(&self, radius: u32) -> Vec<u32> {
        let last = self.total_pages();
        let current = self.page.min(last);
        let start = current.saturating_sub(radius).max(1);
        let end = current.saturating_add(radius).min(last);
        (start..=end).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(Pagination::new(1, 12, 0).total_pages(), 1);
        assert_eq!(Pagination::new(1, 12, 12).total_pages(), 1);
        assert_eq!(Pagination::new(1, 12, 13).total_pages(), 2);
        assert_eq!(Pagination::new(1, 0, 5).total_pages(), 5);
    }

    #[test]
    fn test_prev_next() {
        let first = Pagination::new(1, 10, 35);
        assert!(!first.has_prev());
        assert!(first.has_next());
        assert_eq!(first.prev_page(), 1);
        assert_eq!(first.next_page(), 2);

        let last = Pagination::new(4, 10, 35);
        assert!(last.has_prev());
        assert!(!last.has_next());
        assert_eq!(last.next_page(), 4);
    }

    #[test]
    fn test_window_is_clamped() {
        assert_eq!(Pagination::new(1, 10, 100).window(2), vec![1, 2, 3]);
        assert_eq!(Pagination::new(5, 10, 100).window(2), vec![3, 4, 5, 6, 7]);
        assert_eq!(Pagination::new(10, 10, 100).window(2), vec![8, 9, 10]);
        assert_eq!(Pagination::new(1, 10, 0).window(2), vec![1]);
    }

    #[test]
    fn test_window_with_page_past_the_end() {
        assert_eq!(Pagination::new(50, 10, 30).window(1), vec![2, 3]);
    }
}
