use crate::types::{CurrentUser, FeedError, KeyValueStore, Result, CURRENT_USER_KEY};
use tracing::{debug, warn};

/// Viewer fid used when no signed-in user is stored
pub const DEFAULT_VIEWER_FID: u64 = 404104;

/// Read the stored current-user snapshot. Unreadable or malformed snapshots
/// are logged and treated as absent.
pub async fn load_current_user(storage: &dyn KeyValueStore) -> Option<CurrentUser> {
    let raw = match storage.get(CURRENT_USER_KEY).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No stored user");
            return None;
        }
        Err(e) => {
            warn!("Failed to read stored user: {:#}", e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!("Ignoring malformed stored user: {}", e);
            None
        }
    }
}

pub async fn save_current_user(storage: &dyn KeyValueStore, user: &CurrentUser) -> Result<()> {
    let raw = serde_json::to_string(user)?;
    storage
        .set(CURRENT_USER_KEY, &raw)
        .await
        .map_err(FeedError::Persistence)
}

pub fn viewer_fid(user: Option<&CurrentUser>) -> u64 {
    user.and_then(|user| user.fid).unwrap_or(DEFAULT_VIEWER_FID)
}
