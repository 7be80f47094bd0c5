use serde::{Deserialize, Serialize};

/// Query parameters selecting one page of a listing.
/// Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromForm, UriDisplayQuery)]
pub struct PaginationRequest {
    #[field(default = 1, validate = range(1..))]
    pub page_num: u32,
    #[field(default = 50, validate = range(1..))]
    pub page_size: u32,
}

impl PaginationRequest {
    /// Number of items on the pages before this one.
    pub fn skip(&self) -> u64 {
        u64::from(self.page_num - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }

    /// Wrap one page of items with the pagination details.
    pub fn to_paginated<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
            },
            items,
        }
    }
}

/// Which page was returned, and how many items exist in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub page_num: u32,
    pub page_size: u32,
    pub total: u64,
}

/// A page of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub pagination: PaginationResult,
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_counts_earlier_pages() {
        let first = PaginationRequest {
            page_num: 1,
            page_size: 50,
        };
        assert_eq!(first.skip(), 0);

        let third = PaginationRequest {
            page_num: 3,
            page_size: 20,
        };
        assert_eq!(third.skip(), 40);
        assert_eq!(third.limit(), 20);

        let page = third.to_paginated(45, vec!["a", "b"]);
        assert_eq!(page.pagination.total, 45);
        assert_eq!(page.pagination.page_num, 3);
        assert_eq!(page.items, vec!["a", "b"]);
    }
}
