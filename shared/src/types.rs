//! Common types used across the platform

use serde::{Deserialize, Serialize};

const MAX_PER_PAGE: u32 = 100;

/// Pagination parameters accepted by list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    /// Rows per page, clamped to keep list queries bounded
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, MAX_PER_PAGE))
    }

    /// Rows to skip; page numbering starts at 1
    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u64) -> Self {
        let per_page = pagination.per_page.clamp(1, MAX_PER_PAGE);
        let total_pages = total_items.div_ceil(u64::from(per_page)) as u32;
        Self {
            page: pagination.page.max(1),
            per_page,
            total_items,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pagination() {
        let p = Pagination::default();
        assert_eq!(p.limit(), 20);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_offset_skips_earlier_pages() {
        let p = Pagination {
            page: 3,
            per_page: 25,
        };
        assert_eq!(p.limit(), 25);
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn test_limit_is_clamped() {
        let p = Pagination {
            page: 0,
            per_page: 5000,
        };
        assert_eq!(p.limit(), 100);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_meta_rounds_total_pages_up() {
        let p = Pagination {
            page: 1,
            per_page: 20,
        };
        assert_eq!(PaginationMeta::new(&p, 41).total_pages, 3);
        assert_eq!(PaginationMeta::new(&p, 40).total_pages, 2);
        assert_eq!(PaginationMeta::new(&p, 0).total_pages, 0);
    }
}
