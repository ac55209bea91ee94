use crate::types::{Cast, Channel, ChannelLookup, ClientConfig, ContractMetadata, ContractMetadataLookup, FeedPage, FeedSource, Result, TokenGateLookup};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    casts: Vec<Cast>,
    #[serde(default)]
    next: Option<NextCursor>,
}

#[derive(Debug, Deserialize)]
struct NextCursor {
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HolderFeedResponse {
    #[serde(default)]
    feed: Option<HolderFeed>,
}

#[derive(Debug, Deserialize)]
struct HolderFeed {
    #[serde(default)]
    casts: Vec<Cast>,
}

#[derive(Debug, Deserialize)]
struct ChannelSearchResponse {
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractMetadataResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    open_sea_metadata: Option<OpenSeaMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenSeaMetadata {
    #[serde(default)]
    image_url: Option<String>,
}

/// HTTP client for the feed API and the NFT metadata API
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        join_url(&self.config.api_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("api_key", key),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> anyhow::Result<T> {
        let start_time = Instant::now();
        let response = request.send().await.with_context(|| format!("{} request failed", what))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "{} returned HTTP {}: {}",
                what,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }

        let body = response
            .json::<T>()
            .await
            .with_context(|| format!("{} returned an unreadable body", what))?;

        debug!("{} completed in {}ms", what, start_time.elapsed().as_millis());
        Ok(body)
    }
}

#[async_trait]
impl FeedSource for ApiClient {
    async fn get_page(&self, cursor: Option<String>) -> anyhow::Result<FeedPage> {
        let url = self.endpoint("feed")?;

        let mut query = vec![
            ("fid", self.config.viewer_fid.to_string()),
            ("limit", self.config.page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let request = self.authorized(self.client.get(url).query(&query));
        let response: FeedResponse = self.get_json(request, "feed page").await?;

        let next_cursor = response.next.and_then(|next| next.cursor).filter(|cursor| !cursor.is_empty());
        let reached_end = next_cursor.is_none() || response.casts.is_empty();

        info!("Fetched feed page with {} casts (end: {})", response.casts.len(), reached_end);
        Ok(FeedPage {
            items: response.casts,
            next_cursor,
            reached_end,
        })
    }
}

#[async_trait]
impl TokenGateLookup for ApiClient {
    async fn holder_casts(&self, address: &str) -> anyhow::Result<Vec<Cast>> {
        let url = self.endpoint(&format!("nft-holders/{}", address))?;
        let request = self.authorized(self.client.get(url));
        let response: HolderFeedResponse = self.get_json(request, "holder feed").await?;

        Ok(response.feed.map(|feed| feed.casts).unwrap_or_default())
    }
}

#[async_trait]
impl ChannelLookup for ApiClient {
    async fn search_channels(&self, query: &str) -> anyhow::Result<Vec<Channel>> {
        let url = self.endpoint("search-channels")?;
        let request = self.authorized(self.client.get(url).query(&[("q", query)]));
        let response: ChannelSearchResponse = self.get_json(request, "channel search").await?;

        Ok(response.channels)
    }
}

#[async_trait]
impl ContractMetadataLookup for ApiClient {
    async fn contract_metadata(&self, address: &str) -> anyhow::Result<ContractMetadata> {
        let key = self
            .config
            .alchemy_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("no Alchemy API key configured"))?;

        let url = join_url(&self.config.alchemy_url, &format!("{}/getContractMetadata", key))?;
        let request = self.client.get(url).query(&[("contractAddress", address)]);
        let response: ContractMetadataResponse = self.get_json(request, "contract metadata").await?;

        Ok(ContractMetadata {
            address: address.to_string(),
            name: response.name,
            symbol: response.symbol,
            image_url: response.open_sea_metadata.and_then(|meta| meta.image_url),
        })
    }
}

/// Join `path` onto `base`, treating `base` as a directory
pub fn join_url(base: &str, path: &str) -> Result<Url> {
    let mut base = base.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }

    let url = Url::parse(&base)?.join(path.trim_start_matches('/'))?;
    Ok(url)
}
