/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use fixgate_core::error::{FixError, SessionError};
use fixgate_core::message::{FixMessage, MsgType};
use fixgate_core::tags;
use fixgate_core::types::{CompId, SeqNum, SessionId};
use fixgate_engine::{Application, Engine, EngineBuilder, SessionHandle};
use fixgate_session::{DisconnectReason, Role, SessionConfig, SessionPhase};
use fixgate_store::{MemoryStore, MessageStore};
use fixgate_transport::{FixCodec, InboundFrame};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Created,
    LoggedOn,
    LoggedOut,
    Message(u64, String),
    Alert(String),
}

struct Recorder {
    events: mpsc::UnboundedSender<Event>,
}

#[async_trait]
impl Application for Recorder {
    async fn on_create(&self, _session_id: &SessionId) {
        let _ = self.events.send(Event::Created);
    }

    async fn on_logon(&self, _session_id: &SessionId) {
        let _ = self.events.send(Event::LoggedOn);
    }

    async fn on_logout(&self, _session_id: &SessionId) {
        let _ = self.events.send(Event::LoggedOut);
    }

    async fn on_application_message(
        &self,
        _session_id: &SessionId,
        seq: SeqNum,
        message: &FixMessage,
    ) {
        let cl_ord_id = message.get_str(11).unwrap_or_default().to_string();
        let _ = self.events.send(Event::Message(seq.value(), cl_ord_id));
    }

    async fn on_alert(&self, _session_id: &SessionId, alert: &str) {
        let _ = self.events.send(Event::Alert(alert.to_string()));
    }
}

struct Side {
    engine: Engine<Recorder>,
    handle: SessionHandle,
    events: mpsc::UnboundedReceiver<Event>,
    store: Arc<MemoryStore>,
}

fn side(role: Role, sender: &str, target: &str) -> Side {
    let (tx, events) = mpsc::unbounded_channel();
    let store = Arc::new(MemoryStore::new());
    let config = SessionConfig::new(
        CompId::new(sender).unwrap(),
        CompId::new(target).unwrap(),
        "FIX.4.4",
        role,
    );
    let (engine, handle) = EngineBuilder::new()
        .with_application(Recorder { events: tx })
        .with_session(config)
        .with_store(store.clone())
        .with_tick_interval(Duration::from_millis(100))
        .build()
        .unwrap();
    Side {
        engine,
        handle,
        events,
        store,
    }
}

async fn wait_for(events: &mut mpsc::UnboundedReceiver<Event>, wanted: Event) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if event == wanted {
                return;
            }
        }
        panic!("event stream ended before {wanted:?}");
    })
    .await
    .unwrap();
}

fn order(cl_ord_id: &str) -> FixMessage {
    FixMessage::new(&MsgType::App("D".to_string())).with(11, cl_ord_id.to_string())
}

type Running = tokio::task::JoinHandle<(Engine<Recorder>, Result<DisconnectReason, FixError>)>;

fn spawn_run(mut engine: Engine<Recorder>, stream: DuplexStream) -> Running {
    tokio::spawn(async move {
        let result = engine.run(stream).await;
        (engine, result)
    })
}

fn frames(bytes: &[u8]) -> Vec<FixMessage> {
    let mut codec = FixCodec::new("FIX.4.4");
    let mut buf = BytesMut::from(bytes);
    let mut out = Vec::new();
    while let Some(frame) = codec.decode(&mut buf).unwrap() {
        match frame {
            InboundFrame::Message(message) => out.push(message),
            InboundFrame::Garbled { error, .. } => panic!("garbled frame: {error}"),
        }
    }
    out
}

fn frame_types(bytes: &[u8]) -> Vec<String> {
    frames(bytes)
        .iter()
        .map(|m| m.get_str(tags::MSG_TYPE).unwrap().to_string())
        .collect()
}

fn logon_from_client(seq: u64) -> Bytes {
    let logon = FixMessage::new(&MsgType::Logon)
        .with(tags::SENDER_COMP_ID, "CLIENT")
        .with(tags::TARGET_COMP_ID, "BROKER")
        .with_uint(tags::MSG_SEQ_NUM, seq)
        .with(tags::SENDING_TIME, "20260127-10:00:00.000")
        .with(tags::ENCRYPT_METHOD, "0")
        .with_uint(tags::HEART_BT_INT, 30);
    fixgate_tagvalue::encode("FIX.4.4", &logon).unwrap()
}

#[tokio::test]
async fn test_logon_message_logout_and_reconnect() {
    let mut client = side(Role::Initiator, "CLIENT", "BROKER");
    let mut broker = side(Role::Acceptor, "BROKER", "CLIENT");

    let (a, b) = tokio::io::duplex(64 * 1024);
    let broker_task = spawn_run(broker.engine, b);
    let client_task = spawn_run(client.engine, a);

    wait_for(&mut client.events, Event::Created).await;
    wait_for(&mut client.events, Event::LoggedOn).await;
    wait_for(&mut broker.events, Event::LoggedOn).await;

    for (i, id) in ["ORD-1", "ORD-2", "ORD-3"].iter().enumerate() {
        let seq = client.handle.send_application_message(order(id)).await.unwrap();
        assert_eq!(seq.value(), 2 + i as u64);
        assert!(client.store.contains(seq.value()));
    }
    wait_for(&mut broker.events, Event::Message(2, "ORD-1".into())).await;
    wait_for(&mut broker.events, Event::Message(4, "ORD-3".into())).await;

    let state = client.handle.state().await.unwrap();
    assert_eq!(state.phase, SessionPhase::Active);
    assert_eq!(state.next_outbound, SeqNum::new(5));

    client.handle.logout(Some("end of day".into())).await.unwrap();
    let (client_engine, client_result) = client_task.await.unwrap();
    let (broker_engine, broker_result) = broker_task.await.unwrap();
    assert_eq!(client_result.unwrap(), DisconnectReason::LogoutComplete);
    assert_eq!(broker_result.unwrap(), DisconnectReason::LogoutComplete);
    wait_for(&mut client.events, Event::LoggedOut).await;
    wait_for(&mut broker.events, Event::LoggedOut).await;

    // counters survive the connection
    assert_eq!(client.store.outbound_seq().await, 6);
    assert_eq!(broker.store.inbound_seq().await, 6);

    let (a, b) = tokio::io::duplex(64 * 1024);
    let broker_task = spawn_run(broker_engine, b);
    let client_task = spawn_run(client_engine, a);
    wait_for(&mut client.events, Event::LoggedOn).await;
    wait_for(&mut broker.events, Event::LoggedOn).await;

    let seq = client
        .handle
        .send_application_message(order("ORD-4"))
        .await
        .unwrap();
    assert_eq!(seq.value(), 7);
    wait_for(&mut broker.events, Event::Message(7, "ORD-4".into())).await;

    broker.handle.logout(None).await.unwrap();
    assert_eq!(
        broker_task.await.unwrap().1.unwrap(),
        DisconnectReason::LogoutComplete
    );
    assert_eq!(
        client_task.await.unwrap().1.unwrap(),
        DisconnectReason::LogoutComplete
    );
}

#[tokio::test(start_paused = true)]
async fn test_silent_counterparty_times_out() {
    let mut broker = side(Role::Acceptor, "BROKER", "CLIENT");
    let (mut peer, stream) = tokio::io::duplex(64 * 1024);
    peer.write_all(&logon_from_client(1)).await.unwrap();

    let reason = broker.engine.run(stream).await.unwrap();
    assert_eq!(reason, DisconnectReason::HeartbeatTimeout);

    let mut written = Vec::new();
    peer.read_to_end(&mut written).await.unwrap();
    assert_eq!(frame_types(&written), vec!["A", "0", "1"]);

    wait_for(&mut broker.events, Event::LoggedOn).await;
    let mut saw_alert = false;
    while let Ok(event) = broker.events.try_recv() {
        saw_alert |= matches!(event, Event::Alert(ref text) if text.contains("heartbeat timeout"));
    }
    assert!(saw_alert);
}

#[tokio::test(start_paused = true)]
async fn test_garbled_frame_is_rejected_and_session_continues() {
    let mut broker = side(Role::Acceptor, "BROKER", "CLIENT");
    let (mut peer, stream) = tokio::io::duplex(64 * 1024);
    let running = spawn_run(broker.engine, stream);

    peer.write_all(&logon_from_client(1)).await.unwrap();
    wait_for(&mut broker.events, Event::LoggedOn).await;

    let order = order("ORD-9")
        .with(tags::SENDER_COMP_ID, "CLIENT")
        .with(tags::TARGET_COMP_ID, "BROKER")
        .with_uint(tags::MSG_SEQ_NUM, 2)
        .with(tags::SENDING_TIME, "20260127-10:00:01.000");
    let good = fixgate_tagvalue::encode("FIX.4.4", &order).unwrap();
    let mut bad = good.to_vec();
    let last_digit = bad.len() - 2;
    bad[last_digit] = if bad[last_digit] == b'0' { b'1' } else { b'0' };

    peer.write_all(&bad).await.unwrap();
    peer.write_all(&good).await.unwrap();
    wait_for(&mut broker.events, Event::Message(2, "ORD-9".into())).await;

    drop(peer);
    let (_, result) = running.await.unwrap();
    assert_eq!(result.unwrap(), DisconnectReason::TransportClosed);
    wait_for(&mut broker.events, Event::LoggedOut).await;
}

#[tokio::test(start_paused = true)]
async fn test_send_before_logon_is_refused() {
    let broker = side(Role::Acceptor, "BROKER", "CLIENT");
    let (peer, stream) = tokio::io::duplex(1024);
    let running = spawn_run(broker.engine, stream);

    let result = broker.handle.send_application_message(order("EARLY")).await;
    assert!(matches!(
        result,
        Err(FixError::Session(SessionError::InvalidState { .. }))
    ));

    drop(peer);
    let (_, result) = running.await.unwrap();
    assert_eq!(result.unwrap(), DisconnectReason::TransportClosed);
}
