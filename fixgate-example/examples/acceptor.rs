//! Acceptor demo.
//!
//! Listens on `FIX_HOST:FIX_PORT` and serves one counterparty at a time.
//! Every NewOrderSingle is answered with a filled ExecutionReport.

use fixgate::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod common;
use common::{ExampleConfig, init_logging};

/// Forwards received orders to the fill task.
///
/// Callbacks run on the session task, so replies go through a channel
/// rather than through the handle directly.
struct OrderDesk {
    orders: mpsc::UnboundedSender<FixMessage>,
}

#[async_trait::async_trait]
impl Application for OrderDesk {
    async fn on_create(&self, session_id: &SessionId) {
        info!(session = %session_id, "created");
    }

    async fn on_logon(&self, session_id: &SessionId) {
        info!(session = %session_id, "logon");
    }

    async fn on_logout(&self, session_id: &SessionId) {
        info!(session = %session_id, "logout");
    }

    async fn on_application_message(
        &self,
        _session_id: &SessionId,
        seq: SeqNum,
        message: &FixMessage,
    ) {
        info!(seq = seq.value(), "received {message}");
        if message.get_str(35) == Some("D") {
            let _ = self.orders.send(message.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cfg = ExampleConfig::server();
    let config = cfg.session(Role::Acceptor)?;
    let store = cfg.store(&config.session_id()).await?;

    let (orders, mut incoming) = mpsc::unbounded_channel();
    let (mut engine, handle) = EngineBuilder::new()
        .with_shared_application(Arc::new(OrderDesk { orders }))
        .with_session(config)
        .with_store(store)
        .build()?;

    tokio::spawn(async move {
        let mut exec_id = 1u64;
        while let Some(order) = incoming.recv().await {
            match handle.send_application_message(fill(&order, exec_id)).await {
                Ok(seq) => info!(seq = seq.value(), "execution report sent"),
                Err(e) => warn!("execution report not sent: {e}"),
            }
            exec_id += 1;
        }
    });

    let acceptor = Acceptor::bind(cfg.addr()).await?;
    info!("listening on {}", acceptor.local_addr()?);
    loop {
        let (stream, peer) = acceptor.accept().await?;
        info!(%peer, "counterparty connected");
        match engine.run(stream).await {
            Ok(reason) => info!(%reason, "session ended"),
            Err(e) => error!("session failed: {e}"),
        }
    }
}

fn fill(order: &FixMessage, exec_id: u64) -> FixMessage {
    let field = |tag| order.get_str(tag).unwrap_or("?").to_string();
    FixMessage::new(&MsgType::App("8".to_string()))
        .with(37, format!("O-{exec_id}"))
        .with(11, field(11))
        .with(17, format!("E-{exec_id}"))
        .with(150, "F")
        .with(39, "2")
        .with(55, field(55))
        .with(54, field(54))
        .with(38, field(38))
        .with(32, field(38))
        .with(31, field(44))
        .with(151, "0")
        .with(14, field(38))
        .with(6, field(44))
}
