//! Binary entrypoint for the civic feed service.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use civic_feed::ml::{ImageClassifierClient, UrgencyModelClient};
use civic_feed::repository::{MemoryRepository, PgRepository, PostRepository};
use civic_feed::{router, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  init_tracing();

  let config = Config::from_env().context("invalid configuration")?;

  let repo: Arc<dyn PostRepository> = match config.database_url.as_deref() {
    Some(url) => {
      let pg = PgRepository::connect(url)
        .await
        .context("failed to connect to database")?;
      pg.migrate().await.context("failed to run migrations")?;
      Arc::new(pg)
    }
    None => {
      warn!("DATABASE_URL not set, using in-memory repository");
      Arc::new(MemoryRepository::new())
    }
  };

  let ml_client = config
    .ml_api_url
    .clone()
    .map(|url| UrgencyModelClient::new(url, config.ml_text_timeout))
    .transpose()
    .context("failed to build urgency model client")?;
  let classifier = config
    .image_api_url
    .clone()
    .map(|url| ImageClassifierClient::new(url, config.ml_image_timeout))
    .transpose()
    .context("failed to build image classifier client")?;

  info!(
    bind_addr = %config.bind_addr,
    scoring_mode = %config.scoring_mode,
    ml_enabled = ml_client.is_some(),
    image_classification_enabled = classifier.is_some(),
    feed_call_budget = config.feed.call_budget,
    "starting civic-feed"
  );

  let addr = config.bind_addr;
  let state = Arc::new(AppState::new(config, repo, ml_client, classifier));
  let app = router(state);

  let listener = tokio::net::TcpListener::bind(addr)
    .await
    .with_context(|| format!("failed to bind {addr}"))?;
  info!(%addr, "civic-feed listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  info!("civic-feed stopped");
  Ok(())
}

/// JSON logs unless `RUST_LOG_FORMAT=text`.
fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let text = std::env::var("RUST_LOG_FORMAT")
    .map(|v| v.eq_ignore_ascii_case("text"))
    .unwrap_or(false);

  if text {
    tracing_subscriber::registry()
      .with(filter)
      .with(fmt::layer())
      .init();
  } else {
    tracing_subscriber::registry()
      .with(filter)
      .with(fmt::layer().json())
      .init();
  }
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      warn!(error = %e, "failed to listen for ctrl-c");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        warn!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!("shutdown signal received");
}
