//! Drives a page-at-a-time collection endpoint to completion

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{BackupError, Result};
use crate::model::{Page, PlaylistIdentifier};

const MAX_RESERVE: usize = 10_000;

/// Fetches a single page of a remote collection
#[async_trait]
pub trait PageFetcher: Send + Sync {
    type Item: Send;

    async fn fetch_page(
        &self,
        collection: &PlaylistIdentifier,
        offset: u32,
    ) -> Result<Page<Self::Item>>;
}

/// Collects every item of a collection, following continuation markers until the
/// fetcher reports the last page.
///
/// A failure on any page fails the whole traversal; whatever was collected before it is
/// dropped rather than handed back as a partial result.
pub struct Paginator<'a, F> {
    fetcher: &'a F,
    cancel: &'a CancellationToken,
}

impl<'a, F: PageFetcher> Paginator<'a, F> {
    pub fn new(fetcher: &'a F, cancel: &'a CancellationToken) -> Self {
        Self { fetcher, cancel }
    }

    pub async fn fetch_all(&self, collection: &PlaylistIdentifier) -> Result<Vec<F::Item>> {
        let mut offset = 0;
        let mut items = Vec::new();
        let mut pages = 0usize;

        let total_hint = loop {
            let page = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(BackupError::Cancelled),
                page = self.fetcher.fetch_page(collection, offset) => page?,
            };
            pages += 1;
            tracing::trace!(collection = %collection, offset = page.offset, count = page.items.len(), "Page received");

            // The hint is only ever used to size the buffer
            if pages == 1 {
                items.reserve((page.total as usize).min(MAX_RESERVE));
            }
            let total = page.total;
            items.extend(page.items);

            match page.next_offset {
                None => break total,
                Some(next) if next <= offset => {
                    return Err(BackupError::StalledPagination {
                        collection: collection.to_string(),
                        offset,
                    });
                }
                Some(next) => offset = next,
            }
        };

        if items.len() != total_hint as usize {
            tracing::debug!(
                collection = %collection,
                count = items.len(),
                total_hint,
                "Item count differs from reported total"
            );
        }
        tracing::debug!(collection = %collection, count = items.len(), pages, "Collection fetched");

        Ok(items)
    }
}
