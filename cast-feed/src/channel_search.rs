use crate::types::{Channel, ChannelLookup, FeedError, Result, SearchConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Debounced channel-name search.
///
/// Every call takes a ticket; only the holder of the newest ticket may write
/// the shared result set, so a slow response to an old query can never
/// overwrite the answer to a newer one.
pub struct ChannelSearchService {
    lookup: Arc<dyn ChannelLookup>,
    config: SearchConfig,
    latest: AtomicU64,
    results: RwLock<Vec<Channel>>,
}

impl ChannelSearchService {
    pub fn new(lookup: Arc<dyn ChannelLookup>, config: SearchConfig) -> Self {
        Self {
            lookup,
            config,
            latest: AtomicU64::new(0),
            results: RwLock::new(Vec::new()),
        }
    }

    /// Search for channels matching `query` once input has been quiet for the
    /// configured window.
    ///
    /// Returns `Ok(None)` when a newer query superseded this one. A blank
    /// query clears the results without a lookup.
    pub async fn search(&self, query: &str) -> Result<Option<Vec<Channel>>> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.trim();

        if query.is_empty() {
            self.store_results(Vec::new());
            return Ok(Some(Vec::new()));
        }

        tokio::time::sleep(self.config.quiescence).await;
        if !self.is_latest(ticket) {
            debug!("Channel search for {:?} superseded before lookup", query);
            return Ok(None);
        }

        let lookup = self.lookup.search_channels(query).await;
        if !self.is_latest(ticket) {
            debug!("Channel search for {:?} superseded during lookup", query);
            return Ok(None);
        }

        let channels = lookup.map_err(FeedError::Network)?;
        debug!("Channel search for {:?} found {} channels", query, channels.len());
        self.store_results(channels.clone());
        Ok(Some(channels))
    }

    /// Results of the most recent completed query
    pub fn results(&self) -> Vec<Channel> {
        self.results.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Drop current results and invalidate any in-flight query
    pub fn clear(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
        self.store_results(Vec::new());
    }

    fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    fn store_results(&self, channels: Vec<Channel>) {
        *self.results.write().unwrap_or_else(PoisonError::into_inner) = channels;
    }
}
