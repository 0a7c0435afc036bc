//! Chat relay: accepts prompts from banter clients, forwards them to an
//! OpenAI-compatible completion API, and returns the reply text.

pub mod config;
pub mod error;
pub mod history;
pub mod rate_limit;
pub mod routes;

use anyhow::Result;
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub use config::RelayConfig;
pub use error::RelayError;
pub use routes::{router, AppState};

/// Bind the configured address and serve until the process is stopped.
pub async fn run(config: RelayConfig) -> Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    log::info!(
        "[relay] listening on http://{} (upstream {}, default model {})",
        listener.local_addr()?,
        config.api_url,
        config.default_model
    );
    serve(listener, AppState::from_config(&config)).await
}

/// Serve on an already bound listener. Client addresses are needed by the rate limiter.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
