//! Limit/offset pagination

use serde::{Deserialize, Serialize};

/// Window into an ordered listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Maximum number of items to return
    pub limit: i64,
    /// Number of items to skip
    pub offset: i64,
}

impl ListParams {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.max(1),
            offset: offset.max(0),
        }
    }
}

/// One page of items plus the total size of the listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64) -> Self {
        Self { items, total }
    }

    /// Transform the items, keeping the total
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}
