use crate::bus::{FilterEvent, SubscriptionId};
use crate::channel_search::ChannelSearchService;
use crate::filter_store::FilterStore;
use crate::types::{Channel, ChannelLookup, ContractMetadataLookup, FeedError, FilterSpec, NftDescriptor, Result, SearchConfig};
use crate::utils::normalize_channel;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Well-known collections offered by the NFT picker: (id, name, address)
pub const KNOWN_COLLECTIONS: [(&str, &str, &str); 4] = [
    ("1", "Alpaca NFT", "0x03ad6cd7410ce01a8b9ed26a080f8f9c1d7cc222"),
    ("2", "Bored Ape Yacht Club", "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D"),
    ("3", "Nouns", "0x9C8fF314C9Bc7F6e59A9d9225Fb22946427eDC03"),
    ("4", "CryptoPunks", "0xb47e3cd837dDF8e4c57F05d70Ab865de6e193BBB"),
];

/// Case-insensitive name search over `KNOWN_COLLECTIONS`
pub fn search_catalog(query: &str) -> Vec<NftDescriptor> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    KNOWN_COLLECTIONS
        .iter()
        .filter(|(_, name, _)| name.to_lowercase().contains(&query))
        .map(|(id, name, address)| NftDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            address: address.to_string(),
        })
        .collect()
}

/// Looks like an EVM contract address (`0x` + 40 characters)
pub fn is_contract_address(text: &str) -> bool {
    text.len() == 42 && text.starts_with("0x")
}

/// Upper FID bound from free text; blank or non-numeric input means unbounded
pub fn parse_max_fid(text: &str) -> Option<u64> {
    text.trim().parse::<u64>().ok()
}

/// Draft copy of the filter that the user edits before applying.
///
/// The draft follows the store: any filter event on the bus replaces it, so
/// edits made elsewhere (e.g. a reset from the feed screen) show up here.
pub struct FilterEditor {
    store: Arc<FilterStore>,
    draft: Arc<Mutex<FilterSpec>>,
    show_search: ChannelSearchService,
    mute_search: ChannelSearchService,
    subscription: SubscriptionId,
}

impl FilterEditor {
    pub fn new(store: Arc<FilterStore>, channels: Arc<dyn ChannelLookup>, config: SearchConfig) -> Self {
        let draft = Arc::new(Mutex::new(store.get()));

        let target = draft.clone();
        let subscription = store.subscribe(move |event: &FilterEvent| {
            *target.lock().unwrap_or_else(PoisonError::into_inner) = event.spec().clone();
        });

        Self {
            store,
            draft,
            show_search: ChannelSearchService::new(channels.clone(), config.clone()),
            mute_search: ChannelSearchService::new(channels, config),
            subscription,
        }
    }

    pub fn draft(&self) -> FilterSpec {
        self.lock_draft().clone()
    }

    pub fn set_min_fid(&self, lower_fid: u64) {
        self.lock_draft().lower_fid = lower_fid;
    }

    pub fn set_max_fid(&self, upper_fid: Option<u64>) {
        self.lock_draft().upper_fid = upper_fid;
    }

    pub fn set_max_fid_text(&self, text: &str) {
        self.set_max_fid(parse_max_fid(text));
    }

    pub fn set_power_badge_holder(&self, enabled: bool) {
        self.lock_draft().is_power_badge_holder = enabled;
    }

    pub fn set_include_recasts(&self, enabled: bool) {
        self.lock_draft().include_recasts = enabled;
    }

    /// Returns false for blank or already-present ids
    pub fn add_show_channel(&self, id: &str) -> bool {
        let id = normalize_channel(id);
        !id.is_empty() && self.lock_draft().show_channels.insert(id)
    }

    pub fn remove_show_channel(&self, id: &str) -> bool {
        self.lock_draft().show_channels.remove(&normalize_channel(id))
    }

    pub fn add_muted_channel(&self, id: &str) -> bool {
        let id = normalize_channel(id);
        !id.is_empty() && self.lock_draft().muted_channels.insert(id)
    }

    pub fn remove_muted_channel(&self, id: &str) -> bool {
        self.lock_draft().muted_channels.remove(&normalize_channel(id))
    }

    pub async fn search_show_channels(&self, query: &str) -> Result<Option<Vec<Channel>>> {
        self.show_search.search(query).await
    }

    pub async fn search_muted_channels(&self, query: &str) -> Result<Option<Vec<Channel>>> {
        self.mute_search.search(query).await
    }

    pub fn show_search_results(&self) -> Vec<Channel> {
        self.show_search.results()
    }

    pub fn mute_search_results(&self) -> Vec<Channel> {
        self.mute_search.results()
    }

    /// Add a search result to the allow-list and reset that search
    pub fn pick_show_channel(&self, channel: &Channel) -> bool {
        self.show_search.clear();
        self.add_show_channel(&channel.id)
    }

    /// Add a search result to the mute-list and reset that search
    pub fn pick_muted_channel(&self, channel: &Channel) -> bool {
        self.mute_search.clear();
        self.add_muted_channel(&channel.id)
    }

    /// Returns false when an NFT with the same id is already selected
    pub fn add_nft(&self, nft: NftDescriptor) -> bool {
        let mut draft = self.lock_draft();
        if draft.nfts.iter().any(|existing| existing.id == nft.id) {
            return false;
        }
        debug!("Adding NFT {} ({}) to draft", nft.name, nft.address);
        draft.nfts.push(nft);
        true
    }

    pub fn remove_nft(&self, id: &str) -> bool {
        let mut draft = self.lock_draft();
        let before = draft.nfts.len();
        draft.nfts.retain(|nft| nft.id != id);
        before != draft.nfts.len()
    }

    /// Resolve a pasted contract address and add it to the draft
    pub async fn add_contract(&self, address: &str, lookup: &dyn ContractMetadataLookup) -> Result<NftDescriptor> {
        let address = address.trim();
        if !is_contract_address(address) {
            return Err(FeedError::Validation(format!("{} is not a contract address", address)));
        }

        let metadata = lookup.contract_metadata(address).await.map_err(FeedError::Network)?;
        let nft = NftDescriptor {
            id: address.to_string(),
            name: metadata.name.unwrap_or_else(|| "Unknown Name".to_string()),
            address: address.to_string(),
        };

        self.add_nft(nft.clone());
        Ok(nft)
    }

    /// Commit the draft through the store, then announce it as `filtersUpdated`
    pub async fn apply(&self) -> Result<u64> {
        let version = self.store.update_and_announce(self.draft()).await?;
        info!("Applied filter draft as version {}", version);
        Ok(version)
    }

    /// Reset the store to the default filter; the draft follows via the bus
    pub async fn clear_all(&self) -> Result<u64> {
        self.show_search.clear();
        self.mute_search.clear();
        self.store.clear().await
    }

    fn lock_draft(&self) -> MutexGuard<'_, FilterSpec> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for FilterEditor {
    fn drop(&mut self) {
        self.store.unsubscribe(self.subscription);
    }
}
