//! Page-number pagination: `?page=N&page_size=M`, page size clamped to [`MAX_PAGE_SIZE`].

use crate::error::AppError;
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const PAGE_PARAM: &str = "page";
pub const PAGE_SIZE_PARAM: &str = "page_size";

/// Requested page: a 1-based number, or `last` which is only known once the total is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Page {
    Number(u64),
    Last,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: Page,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: Page::Number(1),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A page checked against the total; its offset never passes the last row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedPage {
    /// 1-based.
    pub page: u64,
    pub page_size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    /// Total matching records across all pages.
    pub count: u64,
    pub page: u64,
    pub page_size: u32,
    pub total_pages: u64,
    pub next_page: Option<u64>,
    pub previous_page: Option<u64>,
}

impl PageRequest {
    /// Page size falls back to the default when absent, zero or unparseable, and is
    /// clamped to the maximum. A page that is not a positive integer is not found.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, AppError> {
        let page_size = params
            .get(PAGE_SIZE_PARAM)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .map(|n| n.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let page = match params.get(PAGE_PARAM).map(|v| v.trim()) {
            None | Some("") => Page::Number(1),
            Some("last") => Page::Last,
            Some(v) => v
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .map(Page::Number)
                .ok_or_else(|| AppError::NotFound(format!("invalid page: {}", v)))?,
        };
        Ok(PageRequest { page, page_size })
    }

    /// Check the page against the total and build response metadata.
    /// A page past the end is not found; page 1 of an empty result is valid.
    pub fn resolve(self, total: u64) -> Result<(ResolvedPage, PageMeta), AppError> {
        let size = self.page_size as u64;
        let total_pages = total.div_ceil(size).max(1);
        let page = match self.page {
            Page::Last => total_pages,
            Page::Number(n) if n <= total_pages => n,
            Page::Number(n) => return Err(AppError::NotFound(format!("invalid page: {}", n))),
        };
        let resolved = ResolvedPage {
            page,
            page_size: self.page_size,
        };
        let meta = PageMeta {
            count: total,
            page,
            page_size: self.page_size,
            total_pages,
            next_page: (page < total_pages).then_some(page + 1),
            previous_page: (page > 1).then_some(page - 1),
        };
        Ok((resolved, meta))
    }
}

impl ResolvedPage {
    pub fn limit(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size as u64
    }
}
