//! Application orchestrator — wires all node components together.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

use echo_http_server::AppState;
use echo_inventory::Inventory;
use echo_overseer_connection::{
    run_channel, ChannelConfig, ControlChannel, OverseerHandle, ReconnectConfig,
};

use crate::config::Config;
use crate::handler::EchoHandler;

/// Runs the node until shutdown is requested.
pub async fn run(config: Config) -> anyhow::Result<()> {
    if config.overseer_url.is_empty() {
        anyhow::bail!(
            "no Overseer URL configured; set overseer_url in the config file or ECHO_OVERSEER_URL"
        );
    }

    let cancel = CancellationToken::new();

    // -- Storage inventory --
    let inventory = Arc::new(Inventory::bootstrap(&config.storage_path)?);

    // -- Overseer channel --
    let overseer = OverseerHandle::new();
    let handler = Arc::new(EchoHandler::new(Arc::clone(&inventory)));
    let channel_config = ChannelConfig {
        url: config.overseer_url.clone(),
        token: config.overseer_token.clone(),
        reconnect: ReconnectConfig::default(),
    };
    let channel_task = tokio::spawn(run_channel(
        channel_config,
        handler,
        overseer.clone(),
        cancel.clone(),
    ));

    // -- HTTP server --
    let router = echo_http_server::router(
        AppState {
            inventory,
            overseer: Arc::new(overseer) as Arc<dyn ControlChannel>,
        },
        overseer_http_origin(&config.overseer_url),
    );

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    let server_handle = axum_server::Handle::new();

    let mut server_task = {
        let handle = server_handle.clone();
        let service = router.into_make_service();
        match (&config.tls_cert, &config.tls_key) {
            (Some(cert), Some(key)) => {
                let tls = RustlsConfig::from_pem_file(cert, key).await?;
                info!(%addr, "serving HTTPS");
                tokio::spawn(async move {
                    axum_server::bind_rustls(addr, tls)
                        .handle(handle)
                        .serve(service)
                        .await
                })
            }
            _ => {
                info!(%addr, "serving HTTP");
                tokio::spawn(async move {
                    axum_server::bind(addr).handle(handle).serve(service).await
                })
            }
        }
    };

    info!("node ready");

    // -- Main loop: wait for shutdown --
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("SIGINT received, shutting down");
        }
        result = &mut server_task => {
            result??;
            anyhow::bail!("HTTP server stopped unexpectedly");
        }
    }

    // -- Graceful shutdown --
    cancel.cancel();
    server_handle.graceful_shutdown(Some(Duration::from_secs(10)));
    let _ = server_task.await;
    let _ = channel_task.await;

    Ok(())
}

/// Derives the Overseer's HTTP origin from its WebSocket URL for CORS.
///
/// Browsers upload and download from the Overseer's web frontend, which
/// lives on the same host as the channel endpoint.
fn overseer_http_origin(ws_url: &str) -> Option<HeaderValue> {
    let (scheme, rest) = ws_url.split_once("://")?;
    let http_scheme = match scheme {
        "ws" => "http",
        "wss" => "https",
        other => other,
    };
    let host = rest.split('/').next()?;
    if host.is_empty() {
        return None;
    }
    HeaderValue::from_str(&format!("{http_scheme}://{host}")).ok()
}
