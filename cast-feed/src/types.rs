use std::time::Duration;

// Use the interfaces crate for core types
pub use interfaces::defs::{Author, Cast, Channel, ChannelRef, ContractMetadata, CurrentUser, Embed, FeedPage, FilterSpec, NftDescriptor, Reactions};
pub use interfaces::defs::{ChannelLookup, ContractMetadataLookup, FeedSource, TokenGateLookup};
pub use interfaces::state::{KeyValueStore, CURRENT_USER_KEY, FILTERS_KEY};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub alchemy_url: String,
    pub alchemy_api_key: Option<String>,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub viewer_fid: u64,
    pub page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000/".to_string(),
            api_key: None,
            alchemy_url: "https://eth-mainnet.g.alchemy.com/nft/v3/".to_string(),
            alchemy_api_key: None,
            user_agent: "Cast-Feed/1.0".to_string(),
            timeout_seconds: 30,
            viewer_fid: crate::session::DEFAULT_VIEWER_FID,
            page_size: 25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Quiescence window applied to bursts of filter events
    pub filter_debounce: Duration,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            filter_debounce: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub quiescence: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            quiescence: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Network failure: {0:#}")]
    Network(anyhow::Error),

    #[error("Persistence failure: {0:#}")]
    Persistence(anyhow::Error),

    #[error("Invalid filter: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FeedError>;
