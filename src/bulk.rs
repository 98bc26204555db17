//! Concurrent fan-out of large reads and writes
//!
//! A bulk call is split into partitions (page windows for reads, contiguous
//! chunks for writes). One future is built per partition, then all of them
//! are driven together by `try_join_all`, so every sub-request is in flight
//! before any is awaited. Results come back in partition order whatever the
//! completion order. The first failure aborts the call: remaining futures
//! are dropped and no partial result escapes.
//!
//! When `max_concurrent_requests` is set, sub-requests wait on the client's
//! semaphore for a slot; they are still all initiated up front.

use std::future::Future;
use std::ops::Range;

use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::types::{Document, ListParams, Window};

/// Split `[0, total)` into windows of `page_length` records.
///
/// A zero page length yields no windows. Every window asks for a full page;
/// the server returns fewer records for the last one.
///
/// # Errors
/// Returns `Error::InvalidArgument` if the number of windows cannot be held
/// in memory.
pub fn plan_windows(total: u64, page_length: u64) -> Result<Vec<Window>> {
    if page_length == 0 {
        return Ok(Vec::new());
    }

    let too_many = || {
        Error::InvalidArgument(format!(
            "{} records in pages of {} is too many windows",
            total, page_length
        ))
    };
    let count = usize::try_from(total.div_ceil(page_length)).map_err(|_| too_many())?;
    let mut windows = Vec::new();
    windows.try_reserve_exact(count).map_err(|_| too_many())?;
    let mut offset = 0;
    while offset < total {
        windows.push(Window {
            offset,
            limit: page_length,
        });
        offset = offset.saturating_add(page_length);
    }
    Ok(windows)
}

/// Split `len` items into contiguous index ranges of at most `per_chunk`.
///
/// # Errors
/// Returns `Error::InvalidArgument` if `per_chunk` is zero.
pub fn plan_chunks(len: usize, per_chunk: usize) -> Result<Vec<Range<usize>>> {
    if per_chunk == 0 {
        return Err(Error::InvalidArgument(
            "docs_per_conn must be greater than zero".to_string(),
        ));
    }

    Ok((0..len)
        .step_by(per_chunk)
        .map(|start| start..len.min(start + per_chunk))
        .collect())
}

impl Client {
    /// Drive all partition futures concurrently and collect their results
    /// in partition order.
    async fn fan_out<I, Fut, T>(&self, partitions: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T>>,
    {
        let permits = self.permits();

        let tasks = partitions.into_iter().enumerate().map(|(index, sub)| async move {
            let _permit = match permits {
                Some(semaphore) => Some(
                    semaphore
                        .acquire()
                        .await
                        .map_err(|e| Error::partition(index, Error::Transport(e.to_string())))?,
                ),
                None => None,
            };

            sub.await.map_err(|e| {
                warn!("Bulk partition {} failed: {}", index, e);
                Error::partition(index, e)
            })
        });

        try_join_all(tasks).await
    }

    /// Read every document matching `params` with one concurrent request
    /// per page.
    ///
    /// Counts the matching documents first, then fetches
    /// `ceil(total / limit_page_length)` pages at offsets `0, n, 2n, ...`.
    /// `params.limit_start` is ignored. Page `i` of the result is window
    /// `i`. A zero `limit_page_length` returns an empty list without
    /// contacting the server.
    ///
    /// # Example
    /// ```rust,no_run
    /// # use frappe_client::{Client, ListParams};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), frappe_client::Error> {
    /// # let client = Client::new("http://localhost:8000")?;
    /// let params = ListParams::new()
    ///     .filters(serde_json::json!({"status": "Open"}))
    ///     .page_length(50);
    /// let pages = client.simult_bulk_get_list("Task", &params).await?;
    /// let tasks: Vec<_> = pages.into_iter().flatten().collect();
    /// # Ok(())
    /// # }
    /// ```
    pub async fn simult_bulk_get_list(
        &self,
        doctype: &str,
        params: &ListParams,
    ) -> Result<Vec<Vec<Document>>> {
        let page_length = params.limit_page_length;
        if page_length == 0 {
            return Ok(Vec::new());
        }

        let total = self.get_count(doctype, params.filters.as_ref()).await?;
        let windows = plan_windows(total, page_length)?;
        debug!(
            "Bulk list of {}: {} records in {} windows of {}",
            doctype,
            total,
            windows.len(),
            page_length
        );

        let pages = windows.into_iter().map(|window| {
            let page = params.clone().page(window.offset, window.limit);
            async move { self.get_list(doctype, &page).await }
        });

        self.fan_out(pages).await
    }

    /// [`Client::simult_bulk_get_list`] flattened into one list, in offset order
    pub async fn simult_bulk_get_all(
        &self,
        doctype: &str,
        params: &ListParams,
    ) -> Result<Vec<Document>> {
        let pages = self.simult_bulk_get_list(doctype, params).await?;
        Ok(pages.into_iter().flatten().collect())
    }

    /// Insert many documents with concurrent `insert_many` requests of
    /// `docs_per_conn` documents each (from the client configuration).
    pub async fn simult_bulk_insert(&self, docs: &[Document]) -> Result<Vec<Option<Value>>> {
        self.simult_bulk_insert_chunked(docs, self.config().docs_per_conn)
            .await
    }

    /// Insert many documents with one concurrent request per chunk of
    /// `docs_per_conn` documents.
    ///
    /// Returns one result per chunk, in chunk order. An empty `docs` sends
    /// nothing.
    ///
    /// # Errors
    /// `Error::InvalidArgument` if `docs_per_conn` is zero; otherwise the
    /// first failing chunk as `Error::Partition`.
    pub async fn simult_bulk_insert_chunked(
        &self,
        docs: &[Document],
        docs_per_conn: usize,
    ) -> Result<Vec<Option<Value>>> {
        let chunks = plan_chunks(docs.len(), docs_per_conn)?;
        debug!(
            "Bulk insert of {} documents in {} requests",
            docs.len(),
            chunks.len()
        );

        let inserts = chunks
            .into_iter()
            .map(|range| self.insert_many(&docs[range]));

        self.fan_out(inserts).await
    }

    /// Update many documents with concurrent `bulk_update` requests of
    /// `docs_per_conn` documents each (from the client configuration).
    pub async fn simult_bulk_update(&self, docs: &[Document]) -> Result<Vec<Option<Value>>> {
        self.simult_bulk_update_chunked(docs, self.config().docs_per_conn)
            .await
    }

    /// Update many documents with one concurrent request per chunk of
    /// `docs_per_conn` documents.
    pub async fn simult_bulk_update_chunked(
        &self,
        docs: &[Document],
        docs_per_conn: usize,
    ) -> Result<Vec<Option<Value>>> {
        let chunks = plan_chunks(docs.len(), docs_per_conn)?;
        debug!(
            "Bulk update of {} documents in {} requests",
            docs.len(),
            chunks.len()
        );

        let updates = chunks
            .into_iter()
            .map(|range| self.bulk_update(&docs[range]));

        self.fan_out(updates).await
    }
}
