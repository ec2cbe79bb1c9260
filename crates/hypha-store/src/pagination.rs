//! List envelopes
//!
//! Two shapes are served: offset lists (`{data, meta: {total, limit, offset}}`)
//! and page lists (`{data, pagination: {...}}`).

use crate::error::{Result, StoreError};
use serde::Serialize;

pub const DEFAULT_LIMIT: u64 = 20;
pub const MAX_LIMIT: u64 = 100;

/// Validated `limit`/`offset` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetRequest {
    pub limit: u64,
    pub offset: u64,
}

impl OffsetRequest {
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> Result<Self> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > MAX_LIMIT {
            return Err(StoreError::validation(
                "limit",
                format!("must be between 1 and {}", MAX_LIMIT),
            ));
        }
        Ok(Self {
            limit,
            offset: offset.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OffsetMeta {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OffsetPage<T> {
    pub data: Vec<T>,
    pub meta: OffsetMeta,
}

impl<T> OffsetPage<T> {
    pub fn new(data: Vec<T>, total: u64, request: OffsetRequest) -> Self {
        Self {
            data,
            meta: OffsetMeta {
                total,
                limit: request.limit,
                offset: request.offset,
            },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> OffsetPage<U> {
        OffsetPage {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// Validated 1-based `page`/`pageSize` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Result<Self> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(DEFAULT_LIMIT);
        if page == 0 {
            return Err(StoreError::validation("page", "must be at least 1"));
        }
        if page_size == 0 || page_size > MAX_LIMIT {
            return Err(StoreError::validation(
                "pageSize",
                format!("must be between 1 and {}", MAX_LIMIT),
            ));
        }
        if (page - 1).checked_mul(page_size).is_none() {
            return Err(StoreError::validation("page", "is out of range"));
        }
        Ok(Self { page, page_size })
    }

    /// Row offset of the first item; `new` guarantees it does not overflow
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PageInfo {
    pub fn new(total: u64, request: PageRequest) -> Self {
        let total_pages = total.div_ceil(request.page_size);
        Self {
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages,
            has_next_page: request.page < total_pages,
            has_previous_page: request.page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            data,
            pagination: PageInfo::new(total, request),
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}
