mod common;

use cast_feed::filter_store::{decode_spec, validate_spec};
use cast_feed::{FeedError, FilterBus, FilterEvent, FilterMirror, FilterSpec, FilterStore, KeyValueStore, MemoryStore, Result, FILTERS_KEY};
use common::*;
use std::sync::{Arc, Mutex};

fn muted(channel: &str) -> FilterSpec {
    let mut spec = FilterSpec::default();
    spec.muted_channels.insert(channel.to_string());
    spec
}

#[tokio::test]
async fn test_update_reaches_every_subscriber() -> Result<()> {
    init_tracing();

    let bus = FilterBus::new();
    let store = FilterStore::new(Arc::new(MemoryStore::new()), bus.clone(), FilterSpec::default());
    let first = FilterMirror::attach(&bus, store.get());
    let second = FilterMirror::attach(&bus, store.get());

    let version = store.update(muted("spam")).await?;

    assert_eq!(version, 1);
    assert_eq!(store.version(), 1);
    assert_eq!(store.get(), muted("spam"));
    assert_eq!(first.spec(), store.get());
    assert_eq!(second.spec(), store.get());
    Ok(())
}

#[tokio::test]
async fn test_events_arrive_in_update_order() -> Result<()> {
    let store = FilterStore::new(Arc::new(MemoryStore::new()), FilterBus::new(), FilterSpec::default());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    store.subscribe(move |event: &FilterEvent| {
        let channels: Vec<String> = event.spec().muted_channels.iter().cloned().collect();
        sink.lock().unwrap().push((event.name(), channels));
    });

    store.update(muted("a")).await?;
    store.update(muted("b")).await?;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            ("filterChanged", vec!["a".to_string()]),
            ("filterChanged", vec!["b".to_string()]),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_unsubscribed_handler_is_not_called() -> Result<()> {
    let store = FilterStore::new(Arc::new(MemoryStore::new()), FilterBus::new(), FilterSpec::default());

    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let id = store.subscribe(move |_: &FilterEvent| *counter.lock().unwrap() += 1);

    store.update(muted("a")).await?;
    assert!(store.unsubscribe(id));
    assert!(!store.unsubscribe(id));
    store.update(muted("b")).await?;

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(store.bus().subscriber_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_dropped_mirror_unsubscribes() {
    let bus = FilterBus::new();
    let mirror = FilterMirror::attach(&bus, FilterSpec::default());
    assert_eq!(bus.subscriber_count(), 1);

    drop(mirror);
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn test_update_persists_full_snapshot() -> Result<()> {
    let storage = Arc::new(MemoryStore::new());
    let store = FilterStore::new(storage.clone(), FilterBus::new(), FilterSpec::default());

    let mut spec = muted("spam");
    spec.upper_fid = Some(100);
    spec.nfts.push(nft("0xA"));
    store.update(spec.clone()).await?;

    let raw = storage.get(FILTERS_KEY).await.unwrap().expect("snapshot stored");
    assert_eq!(decode_spec(&raw)?, spec);

    let reloaded = FilterStore::load(storage, FilterBus::new()).await;
    assert_eq!(reloaded.get(), spec);
    Ok(())
}

#[tokio::test]
async fn test_invalid_update_changes_nothing() -> Result<()> {
    let store = FilterStore::new(Arc::new(MemoryStore::new()), FilterBus::new(), FilterSpec::default());

    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    store.subscribe(move |_: &FilterEvent| *counter.lock().unwrap() += 1);

    let inverted = FilterSpec {
        lower_fid: 50,
        upper_fid: Some(10),
        ..FilterSpec::default()
    };
    let result = store.update(inverted).await;

    assert!(matches!(result, Err(FeedError::Validation(_))));
    assert_eq!(store.get(), FilterSpec::default());
    assert_eq!(store.version(), 0);
    assert_eq!(*calls.lock().unwrap(), 0);
    Ok(())
}

#[test]
fn test_validation_rules() {
    let mut no_address = FilterSpec::default();
    no_address.nfts.push(nft(" "));
    assert!(validate_spec(&no_address).is_err());

    let mut blank_channel = FilterSpec::default();
    blank_channel.show_channels.insert("  ".to_string());
    assert!(validate_spec(&blank_channel).is_err());

    let bounded = FilterSpec {
        lower_fid: 10,
        upper_fid: Some(10),
        ..FilterSpec::default()
    };
    assert!(validate_spec(&bounded).is_ok());
}

#[tokio::test]
async fn test_persistence_failure_is_not_fatal() -> Result<()> {
    init_tracing();

    let store = FilterStore::new(Arc::new(FailingStore), FilterBus::new(), FilterSpec::default());
    let mirror = FilterMirror::attach(store.bus(), store.get());

    store.update(muted("spam")).await?;

    assert_eq!(store.get(), muted("spam"));
    assert_eq!(mirror.spec(), muted("spam"));
    Ok(())
}

#[tokio::test]
async fn test_load_falls_back_to_default() {
    init_tracing();

    let missing = FilterStore::load(Arc::new(MemoryStore::new()), FilterBus::new()).await;
    assert_eq!(missing.get(), FilterSpec::default());

    let malformed = FilterStore::load(Arc::new(MemoryStore::with_entry(FILTERS_KEY, "{not json")), FilterBus::new()).await;
    assert_eq!(malformed.get(), FilterSpec::default());

    let invalid = FilterStore::load(
        Arc::new(MemoryStore::with_entry(FILTERS_KEY, r#"{"lowerFid":10,"upperFid":5}"#)),
        FilterBus::new(),
    )
    .await;
    assert_eq!(invalid.get(), FilterSpec::default());

    let unreadable = FilterStore::load(Arc::new(FailingStore), FilterBus::new()).await;
    assert_eq!(unreadable.get(), FilterSpec::default());
}

#[tokio::test]
async fn test_load_reads_legacy_snapshot() {
    let raw = r#"{
        "lowerFid": 3,
        "upperFid": null,
        "showChannels": ["memes"],
        "mutedChannels": [],
        "isPowerBadgeHolder": true,
        "nftFilters": [{"id": "1"}]
    }"#;
    let store = FilterStore::load(Arc::new(MemoryStore::with_entry(FILTERS_KEY, raw)), FilterBus::new()).await;

    let spec = store.get();
    assert_eq!(spec.lower_fid, 3);
    assert_eq!(spec.upper_fid, None);
    assert!(spec.show_channels.contains("memes"));
    assert!(spec.is_power_badge_holder);
    assert!(spec.include_recasts);
    assert!(spec.nfts.is_empty());
}

#[tokio::test]
async fn test_clear_restores_default() -> Result<()> {
    let store = FilterStore::new(Arc::new(MemoryStore::new()), FilterBus::new(), muted("spam"));

    let version = store.clear().await?;

    assert_eq!(version, 1);
    assert_eq!(store.get(), FilterSpec::default());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_announced_update_is_never_interleaved() -> Result<()> {
    let store = Arc::new(FilterStore::new(Arc::new(MemoryStore::new()), FilterBus::new(), FilterSpec::default()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    store.subscribe(move |event: &FilterEvent| {
        sink.lock().unwrap().push((event.name(), event.spec().lower_fid));
    });

    let mut tasks = Vec::new();
    for fid in 1..=200u64 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let spec = FilterSpec {
                lower_fid: fid,
                ..FilterSpec::default()
            };
            if fid % 2 == 0 {
                store.update_and_announce(spec).await
            } else {
                store.update(spec).await
            }
        }));
    }
    for task in tasks {
        task.await.expect("update task panicked")?;
    }

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 300);
    for (index, (name, fid)) in seen.iter().enumerate() {
        if *name == "filtersUpdated" {
            assert_eq!(fid % 2, 0);
            assert!(index > 0);
            assert_eq!(seen[index - 1], ("filterChanged", *fid));
        }
    }
    assert_eq!(seen.last().map(|(_, fid)| *fid), Some(store.get().lower_fid));
    assert_eq!(store.version(), 200);
    Ok(())
}
