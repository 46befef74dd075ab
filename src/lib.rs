pub mod adapters;
pub mod alarms;
mod app;
mod assets;
pub mod client;
pub mod config;
pub mod occurrences;
pub mod ports;
pub mod push;
pub mod state;
pub mod store;
pub mod telemetry;
mod templates;
pub mod types;

pub use app::{app, router};
pub use push::{VapidCredentials, generate_vapid_credentials};

use std::net::SocketAddr;

pub async fn serve(addr: SocketAddr, config: config::AppConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, data_dir = %config.data_dir.display(), "listening");
    axum::serve(listener, app(config)).await
}
