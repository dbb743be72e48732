//! Initiator demo.
//!
//! Connects to `FIX_HOST:FIX_PORT`, sends a NewOrderSingle every few seconds
//! while logged on, and reconnects after `FIX_RECONNECT_SECS` whenever the
//! connection drops. Ctrl-C logs out and exits.

use fixgate::prelude::*;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

mod common;
use common::{ExampleConfig, LoggingApplication, init_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cfg = ExampleConfig::client();
    let config = cfg.session(Role::Initiator)?;
    let store = cfg.store(&config.session_id()).await?;

    let (mut engine, handle) = EngineBuilder::new()
        .with_application(LoggingApplication)
        .with_session(config)
        .with_store(store)
        .with_reconnect_interval(cfg.reconnect_interval)
        .build()?;

    tokio::spawn(send_orders(handle.clone()));

    let shutdown = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("logging out");
            if let Err(e) = shutdown.logout(Some("operator shutdown".into())).await {
                warn!("logout failed: {e}");
            }
        }
    });

    loop {
        info!("connecting to {}", cfg.addr());
        match engine.connect(&cfg.addr()).await {
            Ok(DisconnectReason::LogoutComplete) => {
                info!("logged out");
                break;
            }
            Ok(reason) => warn!(%reason, "session ended"),
            Err(e) => error!("connection failed: {e}"),
        }
        tokio::time::sleep(engine.reconnect_interval()).await;
    }
    Ok(())
}

async fn send_orders(handle: SessionHandle) {
    let mut tick = interval(Duration::from_secs(5));
    let mut next_id = 1u64;
    loop {
        tick.tick().await;
        let order = FixMessage::new(&MsgType::App("D".to_string()))
            .with(11, format!("ORD-{next_id}"))
            .with(21, "1")
            .with(55, "IBM")
            .with(54, "1")
            .with(60, Timestamp::now().to_wire().to_string())
            .with(38, "100")
            .with(40, "2")
            .with(44, "125.00");
        match handle.send_application_message(order).await {
            Ok(seq) => {
                info!(seq = seq.value(), "order ORD-{next_id} sent");
                next_id += 1;
            }
            Err(FixError::Session(SessionError::InvalidState { .. })) => {}
            Err(FixError::Session(SessionError::Closed)) => break,
            Err(e) => warn!("order rejected locally: {e}"),
        }
    }
}
