//! troth server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store with the standard owned-data registry, and serves the account
//! lifecycle API over HTTP. A registry/schema mismatch refuses startup.
//!
//! # Token minting
//!
//! To mint a bearer token for a person id (operations and testing; real
//! session issuance belongs to the authentication subsystem):
//!
//! ```
//! cargo run -p troth-api --bin server -- --mint-token <person-id>
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use troth_api::{AppState, ServerConfig, auth::TokenSigner};
use troth_core::registry::OwnedDataRegistry;
use troth_store_sqlite::SqliteStore;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Troth account-lifecycle server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Mint a bearer token for this person id and exit.
  #[arg(long, value_name = "PERSON_ID")]
  mint_token: Option<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TROTH"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let tokens =
    TokenSigner::new(&server_cfg.token_secret, server_cfg.token_ttl_seconds)
      .context("token signer rejected the configured secret")?;

  // Helper mode: mint a token and exit.
  if let Some(person) = cli.mint_token {
    let token = tokens.mint(person).context("failed to mint token")?;
    println!("{token}");
    return Ok(());
  }

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open the SQLite store.
  let store = SqliteStore::open(&store_path, OwnedDataRegistry::standard())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Build application state.
  let state = AppState {
    store:  Arc::new(store),
    tokens: Arc::new(tokens),
    config: Arc::new(server_cfg.clone()),
  };

  let app = troth_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
