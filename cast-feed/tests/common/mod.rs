#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use cast_feed::{
    Author, Cast, Channel, ChannelLookup, ContractMetadata, ContractMetadataLookup, FeedPage, FeedSource, KeyValueStore,
    NftDescriptor, Reactions, TokenGateLookup,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn cast(hash: &str, fid: u64) -> Cast {
    Cast {
        hash: hash.to_string(),
        author: Author {
            fid,
            username: Some(format!("user{}", fid)),
            display_name: None,
            pfp_url: None,
            power_badge: false,
        },
        parent_url: None,
        channel: None,
        timestamp: None,
        reactions: Reactions::default(),
        text: String::new(),
        embeds: Vec::new(),
    }
}

pub fn in_channel(mut cast: Cast, channel: &str) -> Cast {
    cast.parent_url = Some(format!("https://warpcast.com/~/channel/{}", channel));
    cast
}

pub fn with_badge(mut cast: Cast) -> Cast {
    cast.author.power_badge = true;
    cast
}

pub fn recast(mut cast: Cast, count: u64) -> Cast {
    cast.reactions.recasts_count = count;
    cast
}

pub fn nft(address: &str) -> NftDescriptor {
    NftDescriptor {
        id: address.to_string(),
        name: format!("Collection {}", address),
        address: address.to_string(),
    }
}

pub fn channel(id: &str, name: &str) -> Channel {
    Channel {
        id: id.to_string(),
        name: name.to_string(),
        image_url: None,
    }
}

pub fn hashes(items: &[Cast]) -> Vec<&str> {
    items.iter().map(|cast| cast.hash.as_str()).collect()
}

/// Serves `pages` in order; the cursor is the index of the next page
pub struct PagedSource {
    pages: Vec<Vec<Cast>>,
    delay: Duration,
    calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl PagedSource {
    pub fn new(pages: Vec<Vec<Cast>>) -> Self {
        Self {
            pages,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl FeedSource for PagedSource {
    async fn get_page(&self, cursor: Option<String>) -> anyhow::Result<FeedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("feed unavailable"));
        }

        let index = match cursor {
            Some(cursor) => cursor.parse::<usize>()?,
            None => 0,
        };
        let last = index + 1 >= self.pages.len();

        Ok(FeedPage {
            items: self.pages.get(index).cloned().unwrap_or_default(),
            next_cursor: if last { None } else { Some((index + 1).to_string()) },
            reached_end: last,
        })
    }
}

/// Holder casts keyed by contract address
#[derive(Default)]
pub struct HolderLookup {
    holders: HashMap<String, Vec<Cast>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl HolderLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holders(mut self, address: &str, casts: Vec<Cast>) -> Self {
        self.holders.insert(address.to_string(), casts);
        self
    }

    pub fn failing(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    pub fn with_delay(mut self, address: &str, delay: Duration) -> Self {
        self.delays.insert(address.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenGateLookup for HolderLookup {
    async fn holder_casts(&self, address: &str) -> anyhow::Result<Vec<Cast>> {
        self.calls.lock().unwrap().push(address.to_string());

        if let Some(delay) = self.delays.get(address) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.contains(address) {
            return Err(anyhow!("holder lookup failed for {}", address));
        }

        Ok(self.holders.get(address).cloned().unwrap_or_default())
    }
}

/// Channel directory matched by case-insensitive substring on id or name
pub struct ChannelDirectory {
    channels: Vec<Channel>,
    delay: Duration,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl ChannelDirectory {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            channels,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChannelLookup for ChannelDirectory {
    async fn search_channels(&self, query: &str) -> anyhow::Result<Vec<Channel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("channel search unavailable"));
        }

        let query = query.to_lowercase();
        Ok(self
            .channels
            .iter()
            .filter(|channel| channel.id.to_lowercase().contains(&query) || channel.name.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }
}

/// Contract names keyed by address; unknown addresses fail
#[derive(Default)]
pub struct MetadataLookup {
    names: HashMap<String, Option<String>>,
}

impl MetadataLookup {
    pub fn with_contract(mut self, address: &str, name: Option<&str>) -> Self {
        self.names.insert(address.to_string(), name.map(str::to_string));
        self
    }
}

#[async_trait]
impl ContractMetadataLookup for MetadataLookup {
    async fn contract_metadata(&self, address: &str) -> anyhow::Result<ContractMetadata> {
        let name = self
            .names
            .get(address)
            .ok_or_else(|| anyhow!("unknown contract {}", address))?;

        Ok(ContractMetadata {
            address: address.to_string(),
            name: name.clone(),
            symbol: None,
            image_url: None,
        })
    }
}

/// Storage whose reads and writes always fail
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Err(anyhow!("storage offline"))
    }

    async fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        Err(anyhow!("storage offline"))
    }
}
