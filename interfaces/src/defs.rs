use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Filter applied to the feed. Persisted as camelCase JSON.
///
/// `upper_fid: None` is the unbounded sentinel; it round-trips through JSON as
/// `null`, which is also what a stored `Infinity` serialises to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSpec {
    pub lower_fid: u64,
    pub upper_fid: Option<u64>,
    pub show_channels: BTreeSet<String>,
    pub muted_channels: BTreeSet<String>,
    pub is_power_badge_holder: bool,
    pub include_recasts: bool,
    pub nfts: Vec<NftDescriptor>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            lower_fid: 0,
            upper_fid: None,
            show_channels: BTreeSet::new(),
            muted_channels: BTreeSet::new(),
            is_power_badge_holder: false,
            include_recasts: true,
            nfts: Vec::new(),
        }
    }
}

impl FilterSpec {
    pub fn fid_in_range(&self, fid: u64) -> bool {
        fid >= self.lower_fid && self.upper_fid.is_none_or(|upper| fid <= upper)
    }

    pub fn is_token_gated(&self) -> bool {
        !self.nfts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NftDescriptor {
    pub id: String,
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub fid: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub pfp_url: Option<String>,
    #[serde(default)]
    pub power_badge: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reactions {
    #[serde(default, alias = "recastCount")]
    pub recasts_count: u64,
    #[serde(default, alias = "likeCount")]
    pub likes_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub url: Option<String>,
}

/// One content item ("cast"). Missing optional fields take their defaults:
/// no power badge, no channel, no reactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    pub hash: String,
    pub author: Author,
    #[serde(default)]
    pub parent_url: Option<String>,
    #[serde(default)]
    pub channel: Option<ChannelRef>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reactions: Reactions,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

/// Channel search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    pub items: Vec<Cast>,
    pub next_cursor: Option<String>,
    pub reached_end: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractMetadata {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub image_url: Option<String>,
}

/// Snapshot of the signed-in account, stored alongside the filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[serde(rename = "signer_uuid", default)]
    pub signer_uuid: Option<String>,
    #[serde(default)]
    pub fid: Option<u64>,
    #[serde(default)]
    pub fname: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub pfp: Option<String>,
    #[serde(default)]
    pub follower_count: Option<u64>,
    #[serde(default)]
    pub following_count: Option<u64>,
}

// Provider seams. Implementations own their transport; callers only see
// `anyhow::Result` and decide which failures are fatal.

/// Paginated raw content provider
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the page at `cursor`; `None` is the first page.
    async fn get_page(&self, cursor: Option<String>) -> Result<FeedPage>;
}

/// Casts authored by holders of the token at `address`
#[async_trait]
pub trait TokenGateLookup: Send + Sync {
    async fn holder_casts(&self, address: &str) -> Result<Vec<Cast>>;
}

#[async_trait]
pub trait ChannelLookup: Send + Sync {
    async fn search_channels(&self, query: &str) -> Result<Vec<Channel>>;
}

#[async_trait]
pub trait ContractMetadataLookup: Send + Sync {
    async fn contract_metadata(&self, address: &str) -> Result<ContractMetadata>;
}
