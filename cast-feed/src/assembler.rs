use crate::bus::{FilterEvent, SubscriptionId};
use crate::filter_store::FilterStore;
use crate::processing::ContentFilterPipeline;
use crate::token_gate::{merge_token_gated, TokenGateResolver};
use crate::types::{AssemblerConfig, Cast, FeedError, FeedPage, FeedSource, FilterSpec, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Filtering,
    AwaitingTokenGate,
    Ready,
    Error(String),
}

/// Point-in-time view of the assembled feed
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub items: Vec<Cast>,
    pub phase: FeedPhase,
    pub is_loading: bool,
    pub is_reaching_end: bool,
    pub generation: u64,
}

struct FeedState {
    /// Spec the current feed was built with
    spec: FilterSpec,
    /// Every raw item fetched since the last reset, unique by hash
    accumulated: Vec<Cast>,
    seen: HashSet<String>,
    /// `accumulated` after the filter pipeline
    organic: Vec<Cast>,
    /// Holder casts resolved for the current generation
    token_gated: Vec<Cast>,
    gate_pending: bool,
    feed: Vec<Cast>,
    cursor: Option<String>,
    is_loading: bool,
    is_reaching_end: bool,
    phase: FeedPhase,
    /// Bumped on reset/refresh; pages fetched under an older epoch are dropped
    epoch: u64,
}

impl FeedState {
    fn new(spec: FilterSpec) -> Self {
        Self {
            spec,
            accumulated: Vec::new(),
            seen: HashSet::new(),
            organic: Vec::new(),
            token_gated: Vec::new(),
            gate_pending: false,
            feed: Vec::new(),
            cursor: None,
            is_loading: false,
            is_reaching_end: false,
            phase: FeedPhase::Idle,
            epoch: 0,
        }
    }

    fn rebuild_feed(&mut self) {
        self.feed = merge_token_gated(&self.token_gated, &self.organic);
    }

    fn settled_phase(&self) -> FeedPhase {
        if self.gate_pending {
            FeedPhase::AwaitingTokenGate
        } else {
            FeedPhase::Ready
        }
    }

    fn clear_items(&mut self) {
        self.epoch += 1;
        self.accumulated.clear();
        self.seen.clear();
        self.organic.clear();
        self.token_gated.clear();
        self.gate_pending = false;
        self.feed.clear();
        self.cursor = None;
        self.is_loading = false;
        self.is_reaching_end = false;
        self.phase = FeedPhase::Idle;
    }
}

/// Builds the displayed feed from paged raw content and the current filter.
///
/// The feed is always `merge(token_gated, filter(accumulated))`. Filter
/// events are debounced and tagged with a generation; work started for an
/// older generation never commits.
pub struct FeedAssembler {
    source: Arc<dyn FeedSource>,
    resolver: TokenGateResolver,
    pipeline: ContentFilterPipeline,
    store: Arc<FilterStore>,
    config: AssemblerConfig,
    generation: AtomicU64,
    state: Mutex<FeedState>,
    subscription: SubscriptionId,
}

impl FeedAssembler {
    pub fn new(
        source: Arc<dyn FeedSource>,
        resolver: TokenGateResolver,
        store: Arc<FilterStore>,
        config: AssemblerConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let handle = weak.clone();
            let subscription = store.subscribe(move |event: &FilterEvent| {
                if let Some(assembler) = handle.upgrade() {
                    assembler.on_filter_event(event);
                }
            });

            let spec = store.get();
            Self {
                source,
                resolver,
                pipeline: ContentFilterPipeline::new(),
                store,
                config,
                generation: AtomicU64::new(0),
                state: Mutex::new(FeedState::new(spec)),
                subscription,
            }
        })
    }

    /// Load the first page and, for a token-gated filter, the holder casts
    pub async fn start(&self) -> Result<()> {
        let spec = self.store.get();
        {
            let mut state = self.lock_state();
            state.spec = spec.clone();
        }

        info!("Starting feed (token gated: {})", spec.is_token_gated());
        self.on_end_reached().await?;

        if spec.is_token_gated() {
            let generation = self.generation();
            self.refilter(generation, spec).await;
        }

        Ok(())
    }

    /// Fetch the next page.
    ///
    /// Returns `Ok(false)` without fetching when a load is already in flight,
    /// the end was reached, or the page arrived after a reset. A failed fetch
    /// moves to `Error` and keeps the feed shown so far.
    pub async fn on_end_reached(&self) -> Result<bool> {
        let (epoch, cursor) = {
            let mut state = self.lock_state();
            if state.is_loading || state.is_reaching_end {
                debug!(
                    "Skipping page load (loading: {}, at end: {})",
                    state.is_loading, state.is_reaching_end
                );
                return Ok(false);
            }
            state.is_loading = true;
            (state.epoch, state.cursor.clone())
        };

        let page = self.source.get_page(cursor).await;

        let mut state = self.lock_state();
        if state.epoch != epoch {
            debug!("Discarding page fetched before reset");
            return Ok(false);
        }
        state.is_loading = false;

        match page {
            Ok(page) => {
                self.absorb_page(&mut state, page);
                Ok(true)
            }
            Err(e) => {
                error!("Failed to load feed page: {:#}", e);
                state.phase = FeedPhase::Error(format!("{:#}", e));
                Err(FeedError::Network(e))
            }
        }
    }

    /// Replace the filter through the store; the feed follows once the
    /// debounce window has passed.
    pub async fn apply_filter(&self, spec: FilterSpec) -> Result<u64> {
        self.store.update(spec).await
    }

    /// Clear the filter and the feed, then reload from the first page
    pub async fn reset_filter(&self) -> Result<()> {
        self.store.clear().await?;
        {
            let mut state = self.lock_state();
            state.clear_items();
            state.spec = self.store.get();
        }

        info!("Filter reset, reloading feed");
        self.start().await
    }

    /// Drop everything fetched and reload from the first page under the
    /// current filter
    pub async fn refresh(&self) -> Result<()> {
        {
            let mut state = self.lock_state();
            state.clear_items();
        }

        info!("Refreshing feed");
        self.start().await
    }

    pub fn current_feed(&self) -> Vec<Cast> {
        self.lock_state().feed.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock_state().is_loading
    }

    pub fn is_reaching_end(&self) -> bool {
        self.lock_state().is_reaching_end
    }

    pub fn phase(&self) -> FeedPhase {
        self.lock_state().phase.clone()
    }

    /// Filter the current feed was built with
    pub fn applied_spec(&self) -> FilterSpec {
        self.lock_state().spec.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = self.lock_state();
        FeedSnapshot {
            items: state.feed.clone(),
            phase: state.phase.clone(),
            is_loading: state.is_loading,
            is_reaching_end: state.is_reaching_end,
            generation: self.generation(),
        }
    }

    fn on_filter_event(self: &Arc<Self>, event: &FilterEvent) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let spec = event.spec().clone();
        debug!("Received {} (generation {})", event.name(), generation);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No async runtime, filter generation {} not applied", generation);
                return;
            }
        };

        let weak = Arc::downgrade(self);
        let debounce = self.config.filter_debounce;
        runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(assembler) = weak.upgrade() {
                assembler.settle(generation, spec).await;
            }
        });
    }

    async fn settle(&self, generation: u64, spec: FilterSpec) {
        if self.generation() != generation {
            debug!("Filter generation {} superseded during debounce", generation);
            return;
        }
        self.refilter(generation, spec).await;
    }

    /// Re-run the pipeline over everything accumulated, then resolve the
    /// token gate when the spec selects any NFTs.
    async fn refilter(&self, generation: u64, spec: FilterSpec) {
        {
            let mut state = self.lock_state();
            if self.generation() != generation {
                return;
            }

            state.phase = FeedPhase::Filtering;
            state.organic = self.pipeline.apply(state.accumulated.clone(), &spec);
            state.token_gated.clear();
            state.gate_pending = spec.is_token_gated();
            state.spec = spec.clone();
            state.rebuild_feed();
            state.phase = state.settled_phase();

            info!(
                "Refiltered {} accumulated items into {} (generation {})",
                state.accumulated.len(),
                state.organic.len(),
                generation
            );
        }

        if !spec.is_token_gated() {
            return;
        }

        let gated = self.resolver.resolve(&spec.nfts).await;

        let mut state = self.lock_state();
        if self.generation() != generation {
            debug!("Discarding token-gate result for stale generation {}", generation);
            return;
        }

        state.token_gated = gated;
        state.gate_pending = false;
        state.rebuild_feed();
        if state.phase == FeedPhase::AwaitingTokenGate {
            state.phase = FeedPhase::Ready;
        }
    }

    fn absorb_page(&self, state: &mut FeedState, page: FeedPage) {
        state.phase = FeedPhase::Filtering;

        let fetched = page.items.len();
        let mut fresh = Vec::new();
        for cast in page.items {
            if state.seen.insert(cast.hash.clone()) {
                fresh.push(cast);
            }
        }

        state.accumulated.extend(fresh.iter().cloned());
        let kept = self.pipeline.apply(fresh, &state.spec);
        let kept_len = kept.len();
        state.organic.extend(kept);
        state.rebuild_feed();

        state.is_reaching_end = page.reached_end || page.next_cursor.is_none();
        state.cursor = page.next_cursor;
        state.phase = state.settled_phase();

        debug!(
            "Absorbed page: {} fetched, {} kept, feed now {} items (end: {})",
            fetched,
            kept_len,
            state.feed.len(),
            state.is_reaching_end
        );
    }

    fn lock_state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for FeedAssembler {
    fn drop(&mut self) {
        self.store.unsubscribe(self.subscription);
    }
}
