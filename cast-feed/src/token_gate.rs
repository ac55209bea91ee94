use crate::types::{Cast, NftDescriptor, TokenGateLookup};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetches casts authored by holders of each selected token.
pub struct TokenGateResolver {
    lookup: Arc<dyn TokenGateLookup>,
}

impl TokenGateResolver {
    pub fn new(lookup: Arc<dyn TokenGateLookup>) -> Self {
        Self { lookup }
    }

    /// Look up every descriptor concurrently.
    ///
    /// A failed lookup contributes nothing and does not affect its siblings.
    /// Results are concatenated in descriptor order and deduplicated by hash,
    /// keeping the first occurrence.
    pub async fn resolve(&self, nfts: &[NftDescriptor]) -> Vec<Cast> {
        if nfts.is_empty() {
            return Vec::new();
        }

        let lookups = nfts.iter().map(|nft| async move {
            match self.lookup.holder_casts(&nft.address).await {
                Ok(casts) => {
                    debug!("Token gate {} ({}) returned {} casts", nft.name, nft.address, casts.len());
                    casts
                }
                Err(e) => {
                    warn!("Token gate lookup failed for {} ({}): {:#}", nft.name, nft.address, e);
                    Vec::new()
                }
            }
        });

        let results = join_all(lookups).await;
        let resolved = dedupe_by_hash(results.into_iter().flatten());

        info!("Resolved {} token-gated casts from {} descriptors", resolved.len(), nfts.len());
        resolved
    }
}

/// Drop repeated hashes, keeping the first occurrence
pub fn dedupe_by_hash(items: impl IntoIterator<Item = Cast>) -> Vec<Cast> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|cast| seen.insert(cast.hash.clone()))
        .collect()
}

/// Token-gated casts first, then organic casts not already among them.
/// Each side keeps its own order.
pub fn merge_token_gated(gated: &[Cast], organic: &[Cast]) -> Vec<Cast> {
    dedupe_by_hash(gated.iter().chain(organic.iter()).cloned())
}
