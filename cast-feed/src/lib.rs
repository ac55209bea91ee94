pub mod types;
pub mod utils;
pub mod processing;
pub mod bus;
pub mod filter_store;
pub mod token_gate;
pub mod channel_search;
pub mod assembler;
pub mod editor;
pub mod fetcher;
pub mod state;
pub mod session;

pub use types::*;
pub use processing::{apply_filters, ContentFilterPipeline, FilterStage};
pub use bus::{FilterBus, FilterEvent, FilterMirror, SubscriptionId};
pub use filter_store::FilterStore;
pub use token_gate::{merge_token_gated, TokenGateResolver};
pub use channel_search::ChannelSearchService;
pub use assembler::{FeedAssembler, FeedPhase, FeedSnapshot};
pub use editor::FilterEditor;
pub use fetcher::ApiClient;
pub use state::{MemoryStore, SqliteStore};
