mod client;
mod state;

use anyhow::Context;
use state::HubState;
use tokio::net::TcpListener;

const DEFAULT_PORT: u16 = 42933;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    tracing::info!("Hub Version: {}", pubgolf_lib::VERSION);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    tracing::info!("Listening on port {port}");

    serve(listener, HubState::default()).await
}

async fn serve(listener: TcpListener, state: HubState) -> anyhow::Result<()> {
    loop {
        let (socket, addr) = listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        tracing::debug!(%addr, "Accepted connection");

        tokio::spawn(client::handle_new_connection(state.clone(), socket));
    }
}
