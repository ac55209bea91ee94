use anyhow::Result;
use async_trait::async_trait;

/// Key holding the persisted filter snapshot
pub const FILTERS_KEY: &str = "filters";

/// Key holding the persisted current-user snapshot
pub const CURRENT_USER_KEY: &str = "farcasterUser";

/// String key-value storage for persisted client state.
///
/// Writers always store a full snapshot under a key, so there is no
/// read-modify-write cycle to guard.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;
}
