//! Common API utilities and shared types
//!
//! Limit/offset pagination and raw query-string parsing shared by the
//! list endpoints.

use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::models::{ListParams, PagedResult};

/// `limit` / `offset` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct LimitOffsetQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl LimitOffsetQuery {
    /// Apply configured defaults and the maximum page size
    pub fn resolve(&self, config: &PaginationConfig) -> ListParams {
        let limit = self
            .limit
            .unwrap_or(config.default_limit)
            .clamp(1, config.max_limit.max(1));
        ListParams::new(limit, self.offset.unwrap_or(0))
    }
}

/// Paginated list response
#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    /// Wrap a page, building `next`/`previous` links from the request URI
    pub fn from_page(page: PagedResult<T>, params: ListParams, uri: &Uri) -> Self {
        let next_offset = params.offset.saturating_add(params.limit);
        let next = (next_offset < page.total).then(|| page_link(uri, params.limit, next_offset));
        let previous = (params.offset > 0)
            .then(|| page_link(uri, params.limit, params.offset.saturating_sub(params.limit).max(0)));

        Self {
            count: page.total,
            next,
            previous,
            results: page.items,
        }
    }
}

/// Same path and query with `limit`/`offset` replaced; offset 0 is omitted
fn page_link(uri: &Uri, limit: i64, offset: i64) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or("");
            key != "limit" && key != "offset"
        })
        .map(str::to_string)
        .collect();

    pairs.push(format!("limit={}", limit));
    if offset > 0 {
        pairs.push(format!("offset={}", offset));
    }

    format!("{}?{}", uri.path(), pairs.join("&"))
}

/// Decode a raw query string into ordered key/value pairs, keeping repeats
pub fn parse_query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(value: &str) -> String {
    let spaced = value.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}
