mod capabilities;
mod config;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uplink_domain::{
    IngestionOutcome, IngestionService, InMemoryDeviceStore, InMemoryMessageStore,
    InMemoryOrganizationLinkStore, ParserDefinition, Reception, UplinkRequest,
};

#[tokio::main]
async fn main() {
    let config = match config::ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting uplink-all-in-one service");
    info!("Configuration: {:?}", config);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_token.cancel();
        }
    });

    if let Err(e) = run_service(shutdown, config).await {
        error!("Service failed: {}", e);
        std::process::exit(1);
    }
}

/// Feed synthesized uplinks through the ingestion service until cancelled
async fn run_service(shutdown: CancellationToken, config: config::ServiceConfig) -> Result<()> {
    let devices = Arc::new(InMemoryDeviceStore::new());
    let messages = Arc::new(InMemoryMessageStore::new());
    let organizations = Arc::new(InMemoryOrganizationLinkStore::new());

    devices.add_parser(ParserDefinition {
        id: "hex-temperature".to_string(),
        name: "hex temperature".to_string(),
        function: "builtin".to_string(),
    });
    organizations.link_device(&config.device_id, "demo-organization");

    let service = IngestionService::new(
        devices.clone(),
        messages.clone(),
        organizations,
        Arc::new(capabilities::HexTemperatureParser),
        Arc::new(capabilities::LoggingAlertNotifier),
        Arc::new(capabilities::LoggingGeolocationExtractor),
    );

    info!("Service started successfully");

    let interval = Duration::from_secs(config.interval_secs);
    let feed_epoch = unix_now_seconds();
    let mut frame = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Stopping service");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                let request = demo_uplink(&config, feed_epoch, frame);
                match service.ingest(&config.user_id, request).await {
                    Ok(IngestionOutcome::Created { message, decode_error }) => {
                        info!(
                            message_id = %message.id,
                            seq_number = message.seq_number,
                            decode_error = ?decode_error,
                            "stored uplink"
                        );
                    }
                    Ok(IngestionOutcome::Merged { message }) => {
                        info!(
                            message_id = %message.id,
                            receptions = message.reception.len(),
                            "merged duplicate uplink"
                        );
                    }
                    Ok(IngestionOutcome::Acked { response, .. }) => {
                        info!(response = %response, "acked uplink");
                    }
                    Err(e) => warn!("ingestion failed: {}", e),
                }
                frame += 1;
            }
        }
    }

    info!(
        devices = devices.device_count(),
        messages = messages.message_count(),
        "Service stopped gracefully"
    );
    Ok(())
}

/// One synthesized frame. Every `duplicate_every`th frame re-delivers the
/// previous one as heard by a second gateway, with the same logical identity
/// (sequence number and timestamp) so dedup merges it.
fn demo_uplink(config: &config::ServiceConfig, feed_epoch: i64, frame: u64) -> UplinkRequest {
    let duplicate = frame > 0
        && config.duplicate_every != 0
        && frame % config.duplicate_every == config.duplicate_every - 1;
    let effective = if duplicate { frame - 1 } else { frame };

    let seq_number = (effective % 4096) as u16;
    let temperature_tenths = 200 + (effective * 7) % 150;

    UplinkRequest {
        device_id: config.device_id.clone(),
        time: feed_epoch + effective as i64 * config.interval_secs as i64,
        seq_number,
        duplicate,
        reception: vec![Reception {
            gateway_id: if duplicate { "demo-gw-2" } else { "demo-gw-1" }.to_string(),
            rssi: Some(-110.0 - (effective % 20) as f64),
            snr: Some(12.0 - (effective % 8) as f64),
        }],
        data: Some(format!("{:04x}", temperature_tenths)),
        ack: false,
        device_name_prefix: Some("demo".to_string()),
        parser_id: Some("hex-temperature".to_string()),
        category_id: None,
        downlink_payload: None,
    }
}

fn unix_now_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
