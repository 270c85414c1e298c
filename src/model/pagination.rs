use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

/// Page size used when the request doesn't specify one.
pub const DEFAULT_PAGE_SIZE: u64 = 50;
/// Largest page a single request may ask for.
pub const MAX_PAGE_SIZE: u64 = 1000;

/// The slice of `items` starting at `start` with at most `count` entries.
/// Out-of-range requests are clamped, so this never panics.
pub fn page<T>(items: &[T], start: u64, count: u64) -> &[T] {
    let len = items.len();
    let start = usize::try_from(start).unwrap_or(usize::MAX).min(len);
    let count = usize::try_from(count).unwrap_or(usize::MAX);
    let end = start.saturating_add(count).min(len);
    &items[start..end]
}

/// Pagination requested via the `start` and `count` query parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pagination {
    start: u64,
    count: u64,
}

impl Pagination {
    pub fn new(start: u64, count: u64) -> Self {
        Self {
            start,
            count: count.min(MAX_PAGE_SIZE),
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn to_paginated<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            start: self.start,
            count: self.count,
            total,
            items,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let start = if let Ok(start) = req.query_value::<u64>("start").unwrap_or(Ok(0)) {
            start
        } else {
            return request::Outcome::Failure((Status::BadRequest, ()));
        };
        let count = if let Ok(count) = req
            .query_value::<u64>("count")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE))
        {
            count
        } else {
            return request::Outcome::Failure((Status::BadRequest, ()));
        };
        request::Outcome::Success(Self::new(start, count))
    }
}

/// One page of results plus enough context to fetch the next.
#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub start: u64,
    pub count: u64,
    pub total: u64,
    pub items: Vec<T>,
}
