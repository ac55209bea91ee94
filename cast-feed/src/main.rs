use anyhow::Context;
use cast_feed::editor::{is_contract_address, parse_max_fid};
use cast_feed::session::{load_current_user, viewer_fid};
use cast_feed::utils::{channel_id, image_urls};
use cast_feed::{
    ApiClient, AssemblerConfig, ClientConfig, FeedAssembler, FilterBus, FilterEditor, FilterStore, KeyValueStore, NftDescriptor,
    SearchConfig, SqliteStore, TokenGateResolver,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cast-feed")]
#[command(about = "Load a filtered cast feed and print it")]
struct Cli {
    /// Base URL of the feed API
    #[arg(long, env = "API_URL", default_value = "http://localhost:3000/")]
    api_url: String,

    #[arg(long, env = "NEYNAR_API_KEY")]
    api_key: Option<String>,

    /// Used to resolve contract names for --nft
    #[arg(long, env = "ALCHEMY_API_KEY")]
    alchemy_api_key: Option<String>,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://cast-feed.db")]
    database_url: String,

    /// Viewer fid; defaults to the stored user
    #[arg(long)]
    fid: Option<u64>,

    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: u32,

    /// Reset the stored filter before loading
    #[arg(long)]
    reset: bool,

    #[arg(long)]
    min_fid: Option<u64>,

    /// Upper fid bound; anything non-numeric means unbounded
    #[arg(long)]
    max_fid: Option<String>,

    /// Only show these channels
    #[arg(long = "show")]
    show_channels: Vec<String>,

    #[arg(long = "mute")]
    muted_channels: Vec<String>,

    /// Only show power badge holders
    #[arg(long)]
    power_badge: bool,

    #[arg(long)]
    no_recasts: bool,

    /// Include casts from holders of this contract
    #[arg(long = "nft")]
    nfts: Vec<String>,
}

impl Cli {
    fn has_overrides(&self) -> bool {
        self.min_fid.is_some()
            || self.max_fid.is_some()
            || !self.show_channels.is_empty()
            || !self.muted_channels.is_empty()
            || self.power_badge
            || self.no_recasts
            || !self.nfts.is_empty()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("Starting cast feed");

    let storage: Arc<dyn KeyValueStore> = Arc::new(
        SqliteStore::connect(&cli.database_url)
            .await
            .with_context(|| format!("failed to open {}", cli.database_url))?,
    );

    let user = load_current_user(storage.as_ref()).await;
    let fid = cli.fid.unwrap_or_else(|| viewer_fid(user.as_ref()));
    info!("Viewing feed as fid {}", fid);

    let client = Arc::new(ApiClient::new(ClientConfig {
        api_url: cli.api_url.clone(),
        api_key: cli.api_key.clone(),
        alchemy_api_key: cli.alchemy_api_key.clone(),
        viewer_fid: fid,
        ..ClientConfig::default()
    })?);

    let store = Arc::new(FilterStore::load(storage.clone(), FilterBus::new()).await);
    if cli.reset {
        store.clear().await?;
        info!("Stored filter reset");
    }
    if cli.has_overrides() {
        apply_overrides(&cli, store.clone(), client.clone()).await?;
    }

    let assembler = FeedAssembler::new(
        client.clone(),
        TokenGateResolver::new(client.clone()),
        store.clone(),
        AssemblerConfig::default(),
    );

    if let Err(e) = assembler.start().await {
        error!("Failed to load feed: {}", e);
        return Err(e.into());
    }

    for _ in 1..cli.pages {
        match assembler.on_end_reached().await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                warn!("Stopped paging: {}", e);
                break;
            }
        }
    }

    let snapshot = assembler.snapshot();
    for cast in &snapshot.items {
        let name = cast.author.username.as_deref().unwrap_or("unknown");
        let channel = channel_id(cast).map(|id| format!(" /{}", id)).unwrap_or_default();
        println!("@{} ({}){} {}", name, cast.author.fid, channel, cast.hash);
        if !cast.text.is_empty() {
            println!("    {}", cast.text.replace('\n', "\n    "));
        }
        for url in image_urls(cast) {
            println!("    [image] {}", url);
        }
    }

    info!(
        "Feed has {} casts (phase: {:?}, end reached: {})",
        snapshot.items.len(),
        snapshot.phase,
        snapshot.is_reaching_end
    );
    Ok(())
}

async fn apply_overrides(cli: &Cli, store: Arc<FilterStore>, client: Arc<ApiClient>) -> anyhow::Result<()> {
    let editor = FilterEditor::new(store, client.clone(), SearchConfig::default());

    if let Some(min_fid) = cli.min_fid {
        editor.set_min_fid(min_fid);
    }
    if let Some(max_fid) = &cli.max_fid {
        editor.set_max_fid(parse_max_fid(max_fid));
    }
    for channel in &cli.show_channels {
        editor.add_show_channel(channel);
    }
    for channel in &cli.muted_channels {
        editor.add_muted_channel(channel);
    }
    if cli.power_badge {
        editor.set_power_badge_holder(true);
    }
    if cli.no_recasts {
        editor.set_include_recasts(false);
    }

    for address in &cli.nfts {
        if !is_contract_address(address) {
            warn!("Skipping {}: not a contract address", address);
            continue;
        }

        if let Err(e) = editor.add_contract(address, client.as_ref()).await {
            warn!("Could not resolve {}, adding it unnamed: {}", address, e);
            editor.add_nft(NftDescriptor {
                id: address.clone(),
                name: "Unknown Name".to_string(),
                address: address.clone(),
            });
        }
    }

    let version = editor.apply().await?;
    info!("Applied filter overrides (version {})", version);
    Ok(())
}
