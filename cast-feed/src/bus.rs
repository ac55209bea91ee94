//! Synchronous publish/subscribe for filter replacement events.
//!
//! Handlers run inline on the emitting task, in subscription order, so every
//! subscriber has seen an event by the time `emit` returns. Handlers must not
//! block; anything asynchronous should be spawned from the handler.

use crate::types::FilterSpec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Filter replacement notification. Both variants carry the full spec and
/// mean the same thing to consumers: the filter was replaced.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterEvent {
    FilterChanged(FilterSpec),
    FiltersUpdated(FilterSpec),
}

impl FilterEvent {
    pub fn spec(&self) -> &FilterSpec {
        match self {
            FilterEvent::FilterChanged(spec) | FilterEvent::FiltersUpdated(spec) => spec,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterEvent::FilterChanged(_) => "filterChanged",
            FilterEvent::FiltersUpdated(_) => "filtersUpdated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type FilterHandler = Arc<dyn Fn(&FilterEvent) + Send + Sync>;

struct BusInner {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, FilterHandler)>>,
}

/// Cloneable handle to a shared filter event bus
#[derive(Clone)]
pub struct FilterBus {
    inner: Arc<BusInner>,
}

impl FilterBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(1),
                handlers: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&FilterEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        debug!("Filter bus subscriber {:?} added", id);
        id
    }

    /// Returns false when `id` was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.inner.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        before != handlers.len()
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: FilterEvent) -> usize {
        // Snapshot first so handlers may (un)subscribe without deadlocking.
        let handlers: Vec<FilterHandler> = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in &handlers {
            handler(&event);
        }

        debug!("Emitted {} to {} subscribers", event.name(), handlers.len());
        handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for FilterBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer that keeps its own copy of the most recent filter on the bus
pub struct FilterMirror {
    spec: Arc<RwLock<FilterSpec>>,
    bus: FilterBus,
    subscription: SubscriptionId,
}

impl FilterMirror {
    pub fn attach(bus: &FilterBus, initial: FilterSpec) -> Self {
        let spec = Arc::new(RwLock::new(initial));
        let target = spec.clone();
        let subscription = bus.subscribe(move |event| {
            *target.write().unwrap_or_else(PoisonError::into_inner) = event.spec().clone();
        });

        Self {
            spec,
            bus: bus.clone(),
            subscription,
        }
    }

    pub fn spec(&self) -> FilterSpec {
        self.spec.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Drop for FilterMirror {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription);
    }
}
