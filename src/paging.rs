//! Query-string paging: resolves loosely typed `page`/`limit`/`sort`/`order`/
//! `search` parameters into a bounded request, and wraps results in a uniform
//! envelope. Bad input never fails, it falls back to defaults.

use std::collections::HashMap;

use serde::Serialize;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Per-endpoint defaults. `sortable` is the only source of sort columns.
#[derive(Debug, Clone, Copy)]
pub struct PagingDefaults {
    pub sort: &'static str,
    pub order: SortOrder,
    pub sortable: &'static [&'static str],
    /// Name of the endpoint-specific filter parameter, e.g. `status`.
    pub custom: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
    pub sort: &'static str,
    pub order: SortOrder,
    pub search: Option<String>,
    pub role: Option<i64>,
    pub custom: Option<i64>,
}

impl PageRequest {
    pub fn from_query(query: &HashMap<String, String>, defaults: &PagingDefaults) -> Self {
        let get = |key: &str| query.get(key).map(String::as_str);

        let limit = get("limit")
            .and_then(positive_int)
            .map(|l| l.min(MAX_LIMIT))
            .unwrap_or(DEFAULT_LIMIT);
        let page = get("page").and_then(positive_int).unwrap_or(1);

        let sort = get("sort")
            .map(str::trim)
            .and_then(|s| defaults.sortable.iter().copied().find(|c| *c == s))
            .unwrap_or(defaults.sort);
        let order = get("order")
            .and_then(SortOrder::parse)
            .unwrap_or(defaults.order);

        let search = get("search")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Self {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
            sort,
            order,
            search,
            role: get("role_id").and_then(|v| v.trim().parse().ok()).filter(|r| *r != 0),
            custom: get(defaults.custom).and_then(|v| v.trim().parse().ok()),
        }
    }
}

fn positive_int(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|v| *v > 0)
}

/// `%term%` for ILIKE, with LIKE metacharacters matched literally.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub filtered_count: i64,
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
    pub last_page: i64,
}

impl<T> Page<T> {
    pub fn new(req: &PageRequest, items: Vec<T>, total_count: i64, filtered_count: i64) -> Self {
        let last_page = ((filtered_count + req.limit - 1) / req.limit).max(1);
        Self {
            items,
            total_count,
            filtered_count,
            page: req.page,
            limit: req.limit,
            offset: req.offset,
            last_page,
        }
    }
}
