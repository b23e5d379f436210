use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};
use reqwest::header::HeaderMap;

use crate::error::{GitLabToolsError, Result};

/// Largest page size GitLab honors for list endpoints.
pub const MAX_PER_PAGE: u32 = 100;

pub const HEADER_PAGE: &str = "x-page";
pub const HEADER_PER_PAGE: &str = "x-per-page";
pub const HEADER_TOTAL_PAGES: &str = "x-total-pages";
pub const HEADER_TOTAL: &str = "x-total";

/// One page of a list endpoint. Metadata comes from the response headers and
/// is best-effort: any of it may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub total_pages: Option<u32>,
    pub per_page: Option<u32>,
    pub total: Option<u64>,
}

impl<T> Page<T> {
    /// A page without any header metadata.
    pub fn new(page_number: u32, items: Vec<T>) -> Self {
        Self {
            items,
            page_number,
            total_pages: None,
            per_page: None,
            total: None,
        }
    }

    /// Reads `x-page`, `x-total-pages`, `x-per-page` and `x-total`. A missing
    /// or malformed `x-page` keeps the requested page number.
    pub fn from_headers(requested_page: u32, items: Vec<T>, headers: &HeaderMap) -> Self {
        Self {
            items,
            page_number: header_value(headers, HEADER_PAGE).unwrap_or(requested_page),
            total_pages: header_value(headers, HEADER_TOTAL_PAGES),
            per_page: header_value(headers, HEADER_PER_PAGE),
            total: header_value(headers, HEADER_TOTAL),
        }
    }
}

fn header_value<N: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<N> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

struct Cursor<F> {
    fetch: F,
    next_page: u32,
    known_total_pages: Option<u32>,
    exhausted: bool,
}

/// Lazily walks a paginated endpoint, one page at a time, starting at page 1.
///
/// `fetch` is called with the 1-based page number. The stream ends after an
/// empty page (which is not yielded), after the page whose number reaches the
/// last known total page count, or after a page shorter than the page size.
/// The page size is the server's `x-per-page` when present, else `per_page`.
/// Pages are never requested ahead and the stream cannot be restarted.
pub fn pages<T, F, Fut>(per_page: u32, fetch: F) -> impl Stream<Item = Result<Page<T>>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let cursor = Cursor {
        fetch,
        next_page: 1,
        known_total_pages: None,
        exhausted: false,
    };

    stream::try_unfold(cursor, move |mut cursor| async move {
        if cursor.exhausted {
            return Ok(None);
        }

        let requested = cursor.next_page;
        let page = (cursor.fetch)(requested).await?;
        if page.items.is_empty() {
            return Ok(None);
        }

        if let Some(total_pages) = page.total_pages {
            cursor.known_total_pages = Some(total_pages);
        }

        let reached_last = cursor
            .known_total_pages
            .is_some_and(|total_pages| requested >= total_pages);
        let page_size = page.per_page.filter(|&size| size > 0).unwrap_or(per_page);
        let short_page = page.items.len() < page_size as usize;

        cursor.exhausted = reached_last || short_page;
        cursor.next_page = requested + 1;

        Ok::<_, GitLabToolsError>(Some((page, cursor)))
    })
}

/// Collects every item of every page, in server order.
pub async fn fetch_all<T, F, Fut>(per_page: u32, fetch: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    pages(per_page, fetch)
        .try_fold(Vec::new(), |mut all, page| async move {
            all.extend(page.items);
            Ok::<_, GitLabToolsError>(all)
        })
        .await
}
