use std::net::SocketAddr;

use conduit::run_app;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("conduit=info")),
        )
        .init();

    let addr = SocketAddr::from(([127, 0, 0, 1], 3001));
    if let Err(error) = run_app(addr).await {
        tracing::error!("server error: {}", error);
    }
}
