use std::net::SocketAddr;

use tracing::{error, info};

use ucaep_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ucaep_observability::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };
    let bind_addr = config.bind_addr;

    let app = ucaep_api::app::build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("listening on {}", listener.local_addr()?);

    // Peer addresses key anonymous rate limiting.
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
