use crate::bus::{FilterBus, FilterEvent, SubscriptionId};
use crate::types::{FeedError, FilterSpec, KeyValueStore, Result, FILTERS_KEY};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct Snapshot {
    spec: FilterSpec,
    version: u64,
}

/// Owner of the current filter.
///
/// The spec is only ever replaced wholesale through `update`. Writers are
/// serialized, each accepted update is persisted as a full snapshot and then
/// broadcast on the bus before `update` returns.
pub struct FilterStore {
    current: RwLock<Snapshot>,
    write_lock: Mutex<()>,
    bus: FilterBus,
    storage: Arc<dyn KeyValueStore>,
}

impl FilterStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, bus: FilterBus, initial: FilterSpec) -> Self {
        Self {
            current: RwLock::new(Snapshot { spec: initial, version: 0 }),
            write_lock: Mutex::new(()),
            bus,
            storage,
        }
    }

    /// Build a store from the persisted snapshot, falling back to the default
    /// filter when it is missing, unreadable or invalid.
    pub async fn load(storage: Arc<dyn KeyValueStore>, bus: FilterBus) -> Self {
        let initial = match storage.get(FILTERS_KEY).await {
            Ok(Some(raw)) => match decode_spec(&raw) {
                Ok(spec) => {
                    info!("Loaded persisted filter");
                    spec
                }
                Err(e) => {
                    warn!("Persisted filter rejected, using default: {}", e);
                    FilterSpec::default()
                }
            },
            Ok(None) => {
                debug!("No persisted filter, using default");
                FilterSpec::default()
            }
            Err(e) => {
                warn!("Failed to read persisted filter, using default: {:#}", e);
                FilterSpec::default()
            }
        };

        Self::new(storage, bus, initial)
    }

    pub fn get(&self) -> FilterSpec {
        self.current.read().unwrap_or_else(PoisonError::into_inner).spec.clone()
    }

    /// Number of accepted updates since construction
    pub fn version(&self) -> u64 {
        self.current.read().unwrap_or_else(PoisonError::into_inner).version
    }

    pub fn bus(&self) -> &FilterBus {
        &self.bus
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&FilterEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Replace the filter. Returns the new version.
    ///
    /// Invalid specs are rejected before anything is replaced or emitted.
    /// Persistence is best-effort: a failed write is logged and the in-memory
    /// spec stays authoritative.
    pub async fn update(&self, spec: FilterSpec) -> Result<u64> {
        self.commit(spec, false).await
    }

    /// Like `update`, then also emits `FiltersUpdated`. Both events go out
    /// before another writer can replace the filter.
    pub async fn update_and_announce(&self, spec: FilterSpec) -> Result<u64> {
        self.commit(spec, true).await
    }

    /// Reset to the default filter
    pub async fn clear(&self) -> Result<u64> {
        self.update(FilterSpec::default()).await
    }

    async fn commit(&self, spec: FilterSpec, announce: bool) -> Result<u64> {
        validate_spec(&spec)?;

        let _writer = self.write_lock.lock().await;

        let version = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            current.spec = spec.clone();
            current.version += 1;
            current.version
        };

        self.persist(&spec).await;

        let delivered = if announce {
            self.bus.emit(FilterEvent::FilterChanged(spec.clone()));
            self.bus.emit(FilterEvent::FiltersUpdated(spec))
        } else {
            self.bus.emit(FilterEvent::FilterChanged(spec))
        };
        info!("Filter updated to version {} ({} subscribers notified)", version, delivered);

        Ok(version)
    }

    async fn persist(&self, spec: &FilterSpec) {
        let raw = match serde_json::to_string(spec) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize filter snapshot: {}", e);
                return;
            }
        };

        if let Err(e) = self.storage.set(FILTERS_KEY, &raw).await {
            let error = FeedError::Persistence(e);
            warn!("{}", error);
        }
    }
}

/// Check the fields a usable filter must have
pub fn validate_spec(spec: &FilterSpec) -> Result<()> {
    if let Some(upper) = spec.upper_fid {
        if spec.lower_fid > upper {
            return Err(FeedError::Validation(format!(
                "lowerFid {} is above upperFid {}",
                spec.lower_fid, upper
            )));
        }
    }

    if let Some(nft) = spec.nfts.iter().find(|nft| nft.address.trim().is_empty()) {
        return Err(FeedError::Validation(format!("NFT {} has no address", nft.id)));
    }

    let has_blank_channel = spec
        .show_channels
        .iter()
        .chain(spec.muted_channels.iter())
        .any(|channel| channel.trim().is_empty());
    if has_blank_channel {
        return Err(FeedError::Validation("channel ids must not be empty".to_string()));
    }

    Ok(())
}

/// Parse and validate a persisted filter snapshot
pub fn decode_spec(raw: &str) -> Result<FilterSpec> {
    let spec: FilterSpec = serde_json::from_str(raw)?;
    validate_spec(&spec)?;
    Ok(spec)
}
