/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The session state machine.
//!
//! [`Session`] performs no I/O of its own apart from the store. Each input
//! (connection up or down, a decoded message, a garbled frame, a timer tick,
//! an application send) returns the [`Action`]s the caller must carry out in
//! order. Every outbound message is persisted before its `Send` action is
//! returned.

use crate::admin::{AdminMessage, SessionRejectReason};
use crate::config::{MAX_HEARTBEAT_INTERVAL, Role, SessionConfig};
use crate::heartbeat::{HeartbeatAction, HeartbeatManager};
use crate::sequence::{self, GapTracker, GapWindow};
use crate::state::{DisconnectReason, SessionPhase, SessionState};
use bytes::Bytes;
use fixgate_core::error::{
    DecodeError, EncodeError, FixError, SequenceError, SessionError, StoreError,
};
use fixgate_core::message::{FixMessage, MsgType};
use fixgate_core::tags;
use fixgate_core::types::{SeqNum, SessionId, Timestamp};
use fixgate_dictionary::{Dictionary, ValidationError};
use fixgate_store::MessageStore;
use fixgate_tagvalue::{Decoder, Encoder, peek_msg_type, peek_seq_num};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Something the caller must do on the session's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write these already-persisted bytes to the transport.
    Send {
        /// MsgSeqNum of the frame.
        seq: SeqNum,
        /// Encoded frame.
        bytes: Bytes,
    },
    /// Hand an accepted, in-order application message to the application.
    Deliver {
        /// MsgSeqNum of the message.
        seq: SeqNum,
        /// The message.
        message: FixMessage,
    },
    /// The session reached `Active`.
    LoggedOn,
    /// The session left `Active`.
    LoggedOut,
    /// Something an operator should see.
    Alert(String),
    /// Close the transport.
    Disconnect(DisconnectReason),
}

/// FIX session state machine over a message store.
#[derive(Debug)]
pub struct Session<S: MessageStore + ?Sized> {
    config: SessionConfig,
    session_id: SessionId,
    store: Arc<S>,
    dictionary: Arc<Dictionary>,
    encoder: Encoder,
    /// Re-reads stored frames during replay.
    decoder: Decoder,
    phase: SessionPhase,
    heartbeat: HeartbeatManager,
    gaps: GapTracker,
    /// This side asked for ResetSeqNumFlag=Y on the current logon.
    reset_requested: bool,
}

impl<S: MessageStore + ?Sized> Session<S> {
    /// Creates a disconnected session.
    ///
    /// # Errors
    /// `SessionError::Configuration` if `config` is invalid.
    pub fn new(
        config: SessionConfig,
        store: Arc<S>,
        dictionary: Arc<Dictionary>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let heartbeat = heartbeat_for(&config, Instant::now());
        Ok(Self {
            session_id: config.session_id(),
            encoder: Encoder::new(config.begin_string.clone()),
            decoder: Decoder::new(config.begin_string.clone()).with_max_message_size(usize::MAX),
            config,
            store,
            dictionary,
            phase: SessionPhase::Disconnected,
            heartbeat,
            gaps: GapTracker::new(),
            reset_requested: false,
        })
    }

    /// Session identity.
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Configuration in force.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Dictionary used to classify and validate messages.
    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Snapshot of the session.
    pub async fn state(&self) -> SessionState {
        SessionState {
            session_id: self.session_id.clone(),
            phase: self.phase,
            next_outbound: SeqNum::new(self.store.outbound_seq().await),
            next_inbound: SeqNum::new(self.store.inbound_seq().await),
            heartbeat_interval: self.heartbeat.interval(),
            awaiting_test_response: self.heartbeat.pending_test_request().is_some(),
            gap: self.gaps.window(),
            last_sent: self.heartbeat.last_sent(),
            last_received: self.heartbeat.last_received(),
        }
    }

    /// A transport connection is up.
    ///
    /// An initiator sends Logon; an acceptor starts waiting for one. Both
    /// start the logon timer.
    ///
    /// # Errors
    /// Store or encoding failures while sending Logon.
    pub async fn on_connected(&mut self, now: Instant) -> Result<Vec<Action>, FixError> {
        let mut actions = Vec::new();
        self.heartbeat = heartbeat_for(&self.config, now);
        self.gaps.clear();
        self.reset_requested = false;
        self.phase = SessionPhase::LogonPending { since: now };

        if self.config.role == Role::Initiator {
            if self.config.reset_on_logon {
                self.store.reset(1, 1, true).await?;
                self.reset_requested = true;
            }
            let logon = AdminMessage::Logon {
                heart_bt_int: self.config.heartbeat_interval_secs(),
                reset_seq_num: self.reset_requested,
            };
            let seq = self.send_admin(logon, now, &mut actions).await?;
            info!(session = %self.session_id, seq = seq.value(), "logon sent");
        } else {
            debug!(session = %self.session_id, "waiting for logon");
        }
        Ok(actions)
    }

    /// The transport closed underneath the session.
    pub fn on_disconnected(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.phase != SessionPhase::Disconnected {
            if self.phase.is_logged_on() {
                actions.push(Action::LoggedOut);
            }
            info!(session = %self.session_id, phase = %self.phase, "transport closed");
            self.phase = SessionPhase::Disconnected;
            self.gaps.clear();
        }
        actions
    }

    /// Processes one decoded inbound message.
    ///
    /// # Errors
    /// Store or encoding failures. Protocol problems are answered on the
    /// wire and reported through the returned actions instead.
    pub async fn on_message(
        &mut self,
        message: FixMessage,
        now: Instant,
    ) -> Result<Vec<Action>, FixError> {
        let mut actions = Vec::new();
        let msg_type = message.msg_type();
        let answered = self.heartbeat.on_message_received(
            now,
            msg_type == Some(MsgType::Heartbeat),
            message.get_str(tags::TEST_REQ_ID),
        );
        if answered {
            debug!(session = %self.session_id, "test request answered");
        }
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(session = %self.session_id, "inbound\n{}", self.dictionary.describe(&message));
        }

        let Some(msg_type) = msg_type else {
            warn!(session = %self.session_id, "message without MsgType ignored");
            return Ok(actions);
        };
        let Ok(seq) = message.seq_num() else {
            warn!(session = %self.session_id, msg_type = %msg_type, "message without MsgSeqNum");
            if self.phase != SessionPhase::Disconnected {
                self.logout_and_disconnect(
                    Some("MsgSeqNum(34) missing".to_string()),
                    DisconnectReason::ProtocolViolation,
                    now,
                    &mut actions,
                )
                .await?;
            }
            return Ok(actions);
        };

        match self.phase {
            SessionPhase::Disconnected => {
                warn!(session = %self.session_id, seq = seq.value(), "message while disconnected ignored");
            }
            SessionPhase::LogonPending { .. } => {
                self.on_logon_pending(message, msg_type, seq, now, &mut actions)
                    .await?;
            }
            SessionPhase::Active | SessionPhase::LogoutPending { .. } => {
                self.on_in_session(message, msg_type, seq, now, &mut actions)
                    .await?;
            }
        }
        Ok(actions)
    }

    /// A frame failed to decode.
    ///
    /// Never consumes a sequence number. While logged on, a Reject naming
    /// the offending tag is sent when the frame's MsgSeqNum is readable.
    ///
    /// # Errors
    /// Store or encoding failures while sending the Reject.
    pub async fn on_decode_error(
        &mut self,
        error: &DecodeError,
        raw: &[u8],
        now: Instant,
    ) -> Result<Vec<Action>, FixError> {
        let mut actions = Vec::new();
        self.heartbeat.on_message_received(now, false, None);
        warn!(session = %self.session_id, %error, "garbled frame discarded");

        if matches!(error, DecodeError::Truncated) || !self.phase.is_logged_on() {
            return Ok(actions);
        }
        let Some(ref_seq) = peek_seq_num(raw) else {
            return Ok(actions);
        };
        let reason = match error {
            DecodeError::Malformed { .. } => SessionRejectReason::IncorrectDataFormat,
            DecodeError::MessageTooLarge { .. } => SessionRejectReason::Other,
            _ => SessionRejectReason::ValueIncorrect,
        };
        self.send_reject(
            ref_seq,
            peek_msg_type(raw),
            error.ref_tag(),
            reason,
            error.to_string(),
            now,
            &mut actions,
        )
        .await?;
        Ok(actions)
    }

    /// Drives logon/logout timeouts and heartbeat supervision.
    ///
    /// # Errors
    /// Store or encoding failures while sending Heartbeat or TestRequest.
    pub async fn on_timer(&mut self, now: Instant) -> Result<Vec<Action>, FixError> {
        let mut actions = Vec::new();
        match self.phase {
            SessionPhase::Disconnected => {}
            SessionPhase::LogonPending { since } => {
                if now.saturating_duration_since(since) >= self.config.logon_timeout {
                    warn!(session = %self.session_id, "no logon within {:?}", self.config.logon_timeout);
                    actions.push(Action::Alert(format!(
                        "no logon within {:?}",
                        self.config.logon_timeout
                    )));
                    self.disconnect(DisconnectReason::LogonTimeout, &mut actions);
                }
            }
            SessionPhase::LogoutPending { since, .. } => {
                if now.saturating_duration_since(since) >= self.config.logout_timeout {
                    warn!(session = %self.session_id, "no logout confirmation");
                    self.disconnect(DisconnectReason::LogoutTimeout, &mut actions);
                }
            }
            SessionPhase::Active => match self.heartbeat.poll(now) {
                HeartbeatAction::None => {}
                HeartbeatAction::SendHeartbeat => {
                    self.send_admin(AdminMessage::Heartbeat { test_req_id: None }, now, &mut actions)
                        .await?;
                }
                HeartbeatAction::SendTestRequest(test_req_id) => {
                    debug!(session = %self.session_id, %test_req_id, "sending test request to silent counterparty");
                    self.send_admin(AdminMessage::TestRequest { test_req_id }, now, &mut actions)
                        .await?;
                }
                HeartbeatAction::TimedOut { silent_for } => {
                    let error = SessionError::HeartbeatTimeout {
                        elapsed_ms: u64::try_from(silent_for.as_millis()).unwrap_or(u64::MAX),
                    };
                    warn!(session = %self.session_id, %error, "counterparty unresponsive");
                    actions.push(Action::Alert(error.to_string()));
                    self.disconnect(DisconnectReason::HeartbeatTimeout, &mut actions);
                }
            },
        }
        Ok(actions)
    }

    /// Sends an application message.
    ///
    /// Returns the assigned MsgSeqNum with the actions to carry out.
    ///
    /// # Errors
    /// - `SessionError::InvalidState` unless `Active`
    /// - `SessionError::AdminMessageNotAllowed` for session-level types
    /// - `EncodeError` for a message that cannot be encoded; no sequence
    ///   number is consumed
    /// - `StoreError` if persistence fails; nothing is sent
    pub async fn send_application(
        &mut self,
        message: FixMessage,
        now: Instant,
    ) -> Result<(SeqNum, Vec<Action>), FixError> {
        if self.phase != SessionPhase::Active {
            return Err(SessionError::InvalidState {
                expected: SessionPhase::Active.name().to_string(),
                current: self.phase.name().to_string(),
            }
            .into());
        }
        let msg_type = message.msg_type().ok_or(EncodeError::MissingRequiredField {
            tag: tags::MSG_TYPE,
        })?;
        if self.dictionary.is_admin(&msg_type) {
            return Err(SessionError::AdminMessageNotAllowed {
                msg_type: msg_type.to_string(),
            }
            .into());
        }
        self.encoder.encode(&message)?;

        let mut actions = Vec::new();
        let seq = self.send(message, now, &mut actions).await?;
        Ok((seq, actions))
    }

    /// Starts a locally initiated logout.
    ///
    /// From `Active` a Logout is sent and the logout timer starts; before
    /// logon completes the connection is simply closed.
    ///
    /// # Errors
    /// Store or encoding failures while sending Logout.
    pub async fn initiate_logout(
        &mut self,
        text: Option<String>,
        now: Instant,
    ) -> Result<Vec<Action>, FixError> {
        let mut actions = Vec::new();
        match self.phase {
            SessionPhase::Active => {
                self.send_admin(AdminMessage::Logout { text }, now, &mut actions)
                    .await?;
                self.phase = SessionPhase::LogoutPending {
                    since: now,
                    initiated_locally: true,
                };
                info!(session = %self.session_id, "logout sent");
            }
            SessionPhase::LogonPending { .. } => {
                self.disconnect(DisconnectReason::LogoutComplete, &mut actions);
            }
            SessionPhase::Disconnected | SessionPhase::LogoutPending { .. } => {}
        }
        Ok(actions)
    }

    async fn on_logon_pending(
        &mut self,
        message: FixMessage,
        msg_type: MsgType,
        seq: SeqNum,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        if msg_type != MsgType::Logon {
            let text = message.get_str(tags::TEXT).unwrap_or_default();
            warn!(session = %self.session_id, msg_type = %msg_type, text, "expected logon");
            actions.push(Action::Alert(format!(
                "logon not completed: received MsgType {msg_type} {text}"
            )));
            self.disconnect(DisconnectReason::LogonRejected, actions);
            return Ok(());
        }

        if let Some((_, error)) = self.comp_id_mismatch(&message) {
            warn!(session = %self.session_id, %error, "logon from unexpected counterparty");
            actions.push(Action::Alert(error.to_string()));
            self.logout_and_disconnect(
                Some(error.to_string()),
                DisconnectReason::IdentityMismatch,
                now,
                actions,
            )
            .await?;
            return Ok(());
        }

        let parsed = self
            .dictionary
            .validate(&message)
            .and_then(|()| AdminMessage::parse(&message));
        let (heart_bt_int, reset_seq_num) = match parsed {
            Ok(Some(AdminMessage::Logon {
                heart_bt_int,
                reset_seq_num,
            })) if (1..=MAX_HEARTBEAT_INTERVAL.as_secs()).contains(&heart_bt_int) => {
                (heart_bt_int, reset_seq_num)
            }
            other => {
                let reason = match other {
                    Err(error) => error.to_string(),
                    _ => format!(
                        "HeartBtInt(108) must be between 1 and {}",
                        MAX_HEARTBEAT_INTERVAL.as_secs()
                    ),
                };
                warn!(session = %self.session_id, %reason, "invalid logon");
                self.logout_and_disconnect(
                    Some(format!("invalid Logon: {reason}")),
                    DisconnectReason::LogonRejected,
                    now,
                    actions,
                )
                .await?;
                return Ok(());
            }
        };

        if reset_seq_num && !self.reset_requested {
            self.store.reset(1, 1, true).await?;
            info!(session = %self.session_id, "sequence numbers reset by counterparty");
        }

        let expected = SeqNum::new(self.store.inbound_seq().await);
        if seq < expected {
            let error = SequenceError::TooLow {
                expected: expected.value(),
                received: seq.value(),
            };
            warn!(session = %self.session_id, %error, "logon refused");
            actions.push(Action::Alert(error.to_string()));
            self.logout_and_disconnect(
                Some(error.to_string()),
                DisconnectReason::SequenceTooLow,
                now,
                actions,
            )
            .await?;
            return Ok(());
        }

        if self.config.role == Role::Acceptor {
            self.heartbeat.set_interval(Duration::from_secs(heart_bt_int));
            let reply = AdminMessage::Logon {
                heart_bt_int,
                reset_seq_num,
            };
            self.send_admin(reply, now, actions).await?;
        }
        self.phase = SessionPhase::Active;
        info!(
            session = %self.session_id,
            seq = seq.value(),
            heart_bt_int,
            "logged on"
        );
        actions.push(Action::LoggedOn);

        if seq == expected {
            self.store.advance_inbound_seq(expected.value()).await?;
        } else if let Some(hole) = self.gaps.on_early(expected, seq, None) {
            self.request_resend(hole, now, actions).await?;
        }
        Ok(())
    }

    async fn on_in_session(
        &mut self,
        message: FixMessage,
        msg_type: MsgType,
        seq: SeqNum,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        if let Some((tag, error)) = self.comp_id_mismatch(&message) {
            warn!(session = %self.session_id, %error, "comp id problem");
            actions.push(Action::Alert(error.to_string()));
            self.send_reject(
                seq,
                Some(msg_type.as_str()),
                Some(tag),
                SessionRejectReason::CompIdProblem,
                error.to_string(),
                now,
                actions,
            )
            .await?;
            self.logout_and_disconnect(
                Some("CompID problem".to_string()),
                DisconnectReason::IdentityMismatch,
                now,
                actions,
            )
            .await?;
            return Ok(());
        }

        // reset mode ignores MsgSeqNum
        if msg_type == MsgType::SequenceReset && !is_gap_fill(&message) {
            return self.on_sequence_reset(&message, seq, now, actions).await;
        }

        let expected = SeqNum::new(self.store.inbound_seq().await);
        match sequence::check(expected, seq, message.is_possible_duplicate()) {
            Ok(()) => {
                self.process_in_order(message, seq, now, actions).await?;
                self.drain_queue(now, actions).await
            }
            Err(error @ SequenceError::Gap { .. }) => {
                info!(session = %self.session_id, %error, "queueing early message");
                let early = match AdminMessage::parse(&message) {
                    Ok(Some(AdminMessage::ResendRequest { begin, end })) => {
                        self.replay(begin, end, now, actions).await?;
                        None
                    }
                    _ => Some(message),
                };
                if let Some(hole) = self.gaps.on_early(expected, seq, early) {
                    self.request_resend(hole, now, actions).await?;
                }
                Ok(())
            }
            Err(error @ SequenceError::Duplicate { .. }) => {
                debug!(session = %self.session_id, %error, "duplicate discarded");
                Ok(())
            }
            Err(error @ SequenceError::TooLow { .. }) => {
                warn!(session = %self.session_id, %error, "fatal sequence error");
                actions.push(Action::Alert(error.to_string()));
                self.logout_and_disconnect(
                    Some(error.to_string()),
                    DisconnectReason::SequenceTooLow,
                    now,
                    actions,
                )
                .await
            }
        }
    }

    /// Applies queued messages that became in-order.
    async fn drain_queue(&mut self, now: Instant, actions: &mut Vec<Action>) -> Result<(), FixError> {
        while self.phase != SessionPhase::Disconnected {
            let expected = SeqNum::new(self.store.inbound_seq().await);
            match self.gaps.take_next(expected) {
                Some(Some(message)) => {
                    self.process_in_order(message, expected, now, actions)
                        .await?;
                }
                Some(None) => {
                    self.store.advance_inbound_seq(expected.value()).await?;
                }
                None => {
                    if let Some(window) = self.gaps.close_through(expected) {
                        info!(session = %self.session_id, %window, "gap closed");
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    /// Validates, consumes and dispatches a message whose MsgSeqNum is the
    /// expected one.
    async fn process_in_order(
        &mut self,
        message: FixMessage,
        seq: SeqNum,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        let msg_type = message
            .msg_type()
            .unwrap_or_else(|| MsgType::App(String::new()));
        let parsed = self
            .dictionary
            .validate(&message)
            .and_then(|()| AdminMessage::parse(&message));
        let admin = match parsed {
            Ok(admin) => admin,
            Err(error) => {
                self.reject_invalid(seq, &msg_type, &error, now, actions)
                    .await?;
                self.store.advance_inbound_seq(seq.value()).await?;
                return Ok(());
            }
        };

        let Some(admin) = admin else {
            self.store.advance_inbound_seq(seq.value()).await?;
            debug!(session = %self.session_id, seq = seq.value(), msg_type = %msg_type, "delivering");
            actions.push(Action::Deliver { seq, message });
            return Ok(());
        };

        if let AdminMessage::SequenceReset { new_seq_no, .. } = admin {
            if new_seq_no <= seq {
                self.refuse_lowering(seq, new_seq_no, now, actions).await?;
                self.store.advance_inbound_seq(seq.value()).await?;
            } else {
                info!(
                    session = %self.session_id,
                    seq = seq.value(),
                    new_seq_no = new_seq_no.value(),
                    "gap fill"
                );
                self.store.set_inbound_seq(new_seq_no.value()).await?;
            }
            return Ok(());
        }

        self.store.advance_inbound_seq(seq.value()).await?;
        self.on_admin(admin, seq, now, actions).await
    }

    async fn on_admin(
        &mut self,
        admin: AdminMessage,
        seq: SeqNum,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        match admin {
            AdminMessage::Heartbeat { .. } => {}
            AdminMessage::TestRequest { test_req_id } => {
                let reply = AdminMessage::Heartbeat {
                    test_req_id: Some(test_req_id),
                };
                self.send_admin(reply, now, actions).await?;
            }
            AdminMessage::ResendRequest { begin, end } => {
                self.replay(begin, end, now, actions).await?;
            }
            AdminMessage::Reject {
                ref_seq_num,
                ref_tag_id,
                reason,
                text,
                ..
            } => {
                warn!(
                    session = %self.session_id,
                    ref_seq_num = ref_seq_num.value(),
                    ref_tag_id,
                    reason = ?reason,
                    text = ?text,
                    "counterparty rejected message"
                );
                actions.push(Action::Alert(format!(
                    "message {ref_seq_num} rejected: {}",
                    text.unwrap_or_default()
                )));
            }
            // applied before dispatch
            AdminMessage::SequenceReset { .. } => {}
            AdminMessage::Logout { text } => {
                if let SessionPhase::LogoutPending {
                    initiated_locally: true,
                    ..
                } = self.phase
                {
                    info!(session = %self.session_id, "logout confirmed");
                } else {
                    info!(session = %self.session_id, text = ?text, "counterparty logged out");
                    self.send_admin(AdminMessage::Logout { text: None }, now, actions)
                        .await?;
                }
                self.disconnect(DisconnectReason::LogoutComplete, actions);
            }
            AdminMessage::Logon { .. } => {
                self.send_reject(
                    seq,
                    Some(MsgType::Logon.as_str()),
                    None,
                    SessionRejectReason::Other,
                    "Logon received on an active session".to_string(),
                    now,
                    actions,
                )
                .await?;
            }
        }
        Ok(())
    }

    /// SequenceReset in reset mode: moves the inbound counter forward only.
    async fn on_sequence_reset(
        &mut self,
        message: &FixMessage,
        seq: SeqNum,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        let parsed = self
            .dictionary
            .validate(message)
            .and_then(|()| AdminMessage::parse(message));
        let new_seq_no = match parsed {
            Ok(Some(AdminMessage::SequenceReset { new_seq_no, .. })) => new_seq_no,
            Ok(_) => return Ok(()),
            Err(error) => {
                return self
                    .reject_invalid(seq, &MsgType::SequenceReset, &error, now, actions)
                    .await;
            }
        };

        let expected = SeqNum::new(self.store.inbound_seq().await);
        if new_seq_no < expected {
            return self.refuse_lowering(seq, new_seq_no, now, actions).await;
        }
        info!(
            session = %self.session_id,
            from = expected.value(),
            to = new_seq_no.value(),
            "sequence reset"
        );
        self.store.set_inbound_seq(new_seq_no.value()).await?;
        self.drain_queue(now, actions).await
    }

    /// Replays `begin..=end` from the store.
    ///
    /// Application messages go out again under their original numbers with
    /// PossDupFlag=Y and OrigSendingTime. Administrative and missing records
    /// collapse into SequenceReset gap fills.
    async fn replay(
        &mut self,
        begin: SeqNum,
        end: SeqNum,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        let last_sent = self.store.outbound_seq().await.saturating_sub(1);
        let begin = begin.value().max(1);
        let end = match end.value() {
            0 => last_sent,
            end => end.min(last_sent),
        };
        if begin > end {
            warn!(session = %self.session_id, begin, last_sent, "resend requested beyond last message sent");
            return Ok(());
        }
        info!(session = %self.session_id, begin, end, "replaying");

        let records: Vec<(u64, Option<Bytes>)> = match self.store.fetch_range(begin, end).await {
            Ok(records) => records
                .into_iter()
                .map(|(seq, bytes)| (seq, Some(bytes)))
                .collect(),
            Err(StoreError::RangeUnavailable { missing, .. }) => {
                let alert = format!("messages {missing:?} unavailable for resend, gap filled");
                warn!(session = %self.session_id, "{alert}");
                actions.push(Action::Alert(alert));
                let mut records = Vec::with_capacity(usize::try_from(end - begin + 1).unwrap_or(0));
                for seq in begin..=end {
                    records.push((seq, self.store.get(seq).await?));
                }
                records
            }
            Err(error) => return Err(error.into()),
        };

        let mut gap_start: Option<u64> = None;
        for (seq, bytes) in records {
            let original = bytes
                .and_then(|bytes| self.decoder.decode(bytes).ok())
                .filter(|msg| {
                    msg.msg_type()
                        .is_some_and(|msg_type| !self.dictionary.is_admin(&msg_type))
                });
            let Some(mut original) = original else {
                gap_start.get_or_insert(seq);
                continue;
            };
            if let Some(start) = gap_start.take() {
                self.send_gap_fill(start, seq, now, actions)?;
            }
            mark_possible_duplicate(&mut original);
            let bytes = self.encoder.encode(&original)?;
            self.heartbeat.on_message_sent(now);
            actions.push(Action::Send {
                seq: SeqNum::new(seq),
                bytes,
            });
        }
        if let Some(start) = gap_start {
            self.send_gap_fill(start, end + 1, now, actions)?;
        }
        Ok(())
    }

    /// Gap fill occupying `start`, moving the counterparty to `new_seq_no`.
    /// Reuses an old number, so it is not persisted.
    fn send_gap_fill(
        &mut self,
        start: u64,
        new_seq_no: u64,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        let seq = SeqNum::new(start);
        let mut msg = AdminMessage::SequenceReset {
            new_seq_no: SeqNum::new(new_seq_no),
            gap_fill: true,
        }
        .to_message();
        self.stamp_header(&mut msg, seq);
        msg.insert_after(tags::MSG_SEQ_NUM, tags::POSS_DUP_FLAG, "Y");
        let bytes = self.encoder.encode(&msg)?;
        self.heartbeat.on_message_sent(now);
        debug!(session = %self.session_id, seq = start, new_seq_no, "gap fill sent");
        actions.push(Action::Send { seq, bytes });
        Ok(())
    }

    async fn request_resend(
        &mut self,
        hole: GapWindow,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        info!(session = %self.session_id, window = %hole, "requesting resend");
        let request = AdminMessage::ResendRequest {
            begin: hole.begin,
            end: hole.end,
        };
        self.send_admin(request, now, actions).await.map(|_| ())
    }

    async fn refuse_lowering(
        &mut self,
        seq: SeqNum,
        new_seq_no: SeqNum,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        let expected = self.store.inbound_seq().await;
        self.send_reject(
            seq,
            Some(MsgType::SequenceReset.as_str()),
            Some(tags::NEW_SEQ_NO),
            SessionRejectReason::ValueIncorrect,
            format!(
                "attempt to lower sequence number, invalid value NewSeqNo(36)={new_seq_no}, expecting {expected}"
            ),
            now,
            actions,
        )
        .await
    }

    async fn reject_invalid(
        &mut self,
        seq: SeqNum,
        msg_type: &MsgType,
        error: &ValidationError,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        self.send_reject(
            seq,
            Some(msg_type.as_str()),
            Some(error.tag),
            error.kind.into(),
            error.to_string(),
            now,
            actions,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_reject(
        &mut self,
        ref_seq_num: SeqNum,
        ref_msg_type: Option<&str>,
        ref_tag_id: Option<u32>,
        reason: SessionRejectReason,
        text: String,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        warn!(
            session = %self.session_id,
            ref_seq_num = ref_seq_num.value(),
            ref_tag_id,
            reason = reason.code(),
            %text,
            "rejecting message"
        );
        let reject = AdminMessage::Reject {
            ref_seq_num,
            ref_tag_id,
            ref_msg_type: ref_msg_type.map(str::to_string),
            reason: Some(reason),
            text: Some(text),
        };
        self.send_admin(reject, now, actions).await.map(|_| ())
    }

    async fn logout_and_disconnect(
        &mut self,
        text: Option<String>,
        reason: DisconnectReason,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<(), FixError> {
        self.send_admin(AdminMessage::Logout { text }, now, actions)
            .await?;
        self.disconnect(reason, actions);
        Ok(())
    }

    fn disconnect(&mut self, reason: DisconnectReason, actions: &mut Vec<Action>) {
        if self.phase.is_logged_on() {
            actions.push(Action::LoggedOut);
        }
        info!(session = %self.session_id, %reason, "disconnecting");
        self.phase = SessionPhase::Disconnected;
        self.gaps.clear();
        actions.push(Action::Disconnect(reason));
    }

    async fn send_admin(
        &mut self,
        admin: AdminMessage,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<SeqNum, FixError> {
        self.send(admin.to_message(), now, actions).await
    }

    /// Allocates a number, stamps the header, encodes and persists.
    async fn send(
        &mut self,
        mut message: FixMessage,
        now: Instant,
        actions: &mut Vec<Action>,
    ) -> Result<SeqNum, FixError> {
        let seq = SeqNum::new(self.store.next_outbound_seq().await?);
        self.stamp_header(&mut message, seq);
        let bytes = self.encoder.encode(&message)?;
        self.store
            .persist_outbound(seq.value(), bytes.clone())
            .await?;
        self.heartbeat.on_message_sent(now);
        debug!(
            session = %self.session_id,
            seq = seq.value(),
            msg_type = message.get_str(tags::MSG_TYPE).unwrap_or_default(),
            "sending"
        );
        actions.push(Action::Send { seq, bytes });
        Ok(seq)
    }

    /// Writes 49, 56, 34 and 52 directly after MsgType, replacing any
    /// values already present.
    fn stamp_header(&self, message: &mut FixMessage, seq: SeqNum) {
        for tag in tags::SESSION_HEADER {
            while message.remove(tag).is_some() {}
        }
        message
            .insert_after(tags::MSG_TYPE, tags::SENDING_TIME, sending_time())
            .insert_after(tags::MSG_TYPE, tags::MSG_SEQ_NUM, seq.to_string())
            .insert_after(
                tags::MSG_TYPE,
                tags::TARGET_COMP_ID,
                self.config.target_comp_id.to_string(),
            )
            .insert_after(
                tags::MSG_TYPE,
                tags::SENDER_COMP_ID,
                self.config.sender_comp_id.to_string(),
            );
    }

    /// The tag and error when inbound comp ids do not mirror the session's.
    fn comp_id_mismatch(&self, message: &FixMessage) -> Option<(u32, SessionError)> {
        if !self.config.validate_comp_ids {
            return None;
        }
        let sender = message.sender_comp_id().unwrap_or_default();
        let target = message.target_comp_id().unwrap_or_default();
        let tag = if sender != self.config.target_comp_id.as_str() {
            tags::SENDER_COMP_ID
        } else if target != self.config.sender_comp_id.as_str() {
            tags::TARGET_COMP_ID
        } else {
            return None;
        };
        Some((
            tag,
            SessionError::IdentityMismatch {
                expected: format!(
                    "{}->{}",
                    self.config.target_comp_id, self.config.sender_comp_id
                ),
                received: format!("{sender}->{target}"),
            },
        ))
    }
}

fn heartbeat_for(config: &SessionConfig, now: Instant) -> HeartbeatManager {
    HeartbeatManager::new(
        config.heartbeat_interval,
        config.test_request_margin,
        config.test_request_grace,
        now,
    )
}

fn sending_time() -> String {
    Timestamp::now().to_wire().to_string()
}

fn is_gap_fill(message: &FixMessage) -> bool {
    message
        .get(tags::GAP_FILL_FLAG)
        .is_some_and(|f| matches!(f.as_bool(), Ok(true)))
}

/// PossDupFlag=Y after MsgSeqNum, OrigSendingTime from the original
/// SendingTime, and a fresh SendingTime.
fn mark_possible_duplicate(message: &mut FixMessage) {
    let original = message.get(tags::SENDING_TIME).map(|f| f.value.clone());
    if message.contains(tags::POSS_DUP_FLAG) {
        message.set(tags::POSS_DUP_FLAG, "Y");
    } else {
        message.insert_after(tags::MSG_SEQ_NUM, tags::POSS_DUP_FLAG, "Y");
    }
    message.set(tags::SENDING_TIME, sending_time());
    if let Some(original) = original {
        while message.remove(tags::ORIG_SENDING_TIME).is_some() {}
        message.insert_after(tags::SENDING_TIME, tags::ORIG_SENDING_TIME, original);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fixgate_core::types::CompId;
    use fixgate_dictionary::Version;
    use fixgate_store::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    const T0: &str = "20260127-10:00:00.000";

    fn config(role: Role) -> SessionConfig {
        SessionConfig::new(
            CompId::new("CLIENT").unwrap(),
            CompId::new("BROKER").unwrap(),
            "FIX.4.4",
            role,
        )
    }

    fn session_with(config: SessionConfig, store: MemoryStore) -> Session<MemoryStore> {
        Session::new(
            config,
            Arc::new(store),
            Arc::new(Dictionary::session(Version::Fix44)),
        )
        .unwrap()
    }

    /// A message from the counterparty.
    fn inbound(body: FixMessage, seq: u64) -> FixMessage {
        let mut msg = body;
        msg.insert_after(tags::MSG_TYPE, tags::SENDING_TIME, T0)
            .insert_after(tags::MSG_TYPE, tags::MSG_SEQ_NUM, seq.to_string())
            .insert_after(tags::MSG_TYPE, tags::TARGET_COMP_ID, "CLIENT")
            .insert_after(tags::MSG_TYPE, tags::SENDER_COMP_ID, "BROKER");
        msg
    }

    fn admin(admin: AdminMessage, seq: u64) -> FixMessage {
        inbound(admin.to_message(), seq)
    }

    fn order(seq: u64) -> FixMessage {
        inbound(
            FixMessage::new(&MsgType::App("D".into())).with(11, format!("ORD-{seq}")),
            seq,
        )
    }

    fn logon(seq: u64) -> FixMessage {
        admin(
            AdminMessage::Logon {
                heart_bt_int: 30,
                reset_seq_num: false,
            },
            seq,
        )
    }

    fn sent(actions: &[Action]) -> Vec<FixMessage> {
        actions
            .iter()
            .filter_map(|action| match action {
                Action::Send { bytes, .. } => {
                    Some(fixgate_tagvalue::decode("FIX.4.4", bytes.clone()).unwrap())
                }
                _ => None,
            })
            .collect()
    }

    fn delivered(actions: &[Action]) -> Vec<u64> {
        actions
            .iter()
            .filter_map(|action| match action {
                Action::Deliver { seq, .. } => Some(seq.value()),
                _ => None,
            })
            .collect()
    }

    fn types(messages: &[FixMessage]) -> Vec<String> {
        messages
            .iter()
            .map(|m| m.get_str(tags::MSG_TYPE).unwrap().to_string())
            .collect()
    }

    /// Memory store whose writes fail once `fail` is set.
    struct FlakyStore {
        inner: MemoryStore,
        fail: AtomicBool,
    }

    #[async_trait]
    impl MessageStore for FlakyStore {
        async fn persist_outbound(&self, seq_num: u64, message: Bytes) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::PersistFailed {
                    seq_num,
                    reason: "disk full".to_string(),
                });
            }
            self.inner.persist_outbound(seq_num, message).await
        }

        async fn next_outbound_seq(&self) -> Result<u64, StoreError> {
            self.inner.next_outbound_seq().await
        }

        async fn outbound_seq(&self) -> u64 {
            self.inner.outbound_seq().await
        }

        async fn inbound_seq(&self) -> u64 {
            self.inner.inbound_seq().await
        }

        async fn advance_inbound_seq(&self, expected: u64) -> Result<u64, StoreError> {
            self.inner.advance_inbound_seq(expected).await
        }

        async fn set_inbound_seq(&self, seq: u64) -> Result<(), StoreError> {
            self.inner.set_inbound_seq(seq).await
        }

        async fn fetch_range(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError> {
            self.inner.fetch_range(begin, end).await
        }

        async fn get(&self, seq_num: u64) -> Result<Option<Bytes>, StoreError> {
            self.inner.get(seq_num).await
        }

        async fn reset(
            &self,
            next_outbound: u64,
            next_inbound: u64,
            clear_history: bool,
        ) -> Result<(), StoreError> {
            self.inner
                .reset(next_outbound, next_inbound, clear_history)
                .await
        }
    }

    /// Initiator logged on with both sides at seq 1.
    async fn active_initiator(now: Instant) -> Session<MemoryStore> {
        let mut session = session_with(config(Role::Initiator), MemoryStore::new());
        session.on_connected(now).await.unwrap();
        let actions = session.on_message(logon(1), now).await.unwrap();
        assert!(actions.contains(&Action::LoggedOn));
        session
    }

    #[tokio::test]
    async fn test_initiator_logon() {
        let now = Instant::now();
        let mut session = session_with(config(Role::Initiator), MemoryStore::new());

        let actions = session.on_connected(now).await.unwrap();
        let out = sent(&actions);
        assert_eq!(types(&out), vec!["A"]);
        assert_eq!(out[0].seq_num().unwrap(), SeqNum::new(1));
        assert_eq!(out[0].sender_comp_id(), Some("CLIENT"));
        assert_eq!(out[0].target_comp_id(), Some("BROKER"));
        assert_eq!(out[0].get_str(tags::HEART_BT_INT), Some("30"));
        assert_eq!(
            out[0].fields().iter().take(5).map(|f| f.tag).collect::<Vec<_>>(),
            vec![35, 49, 56, 34, 52]
        );
        assert!(session.store().contains(1));
        assert!(matches!(session.phase(), SessionPhase::LogonPending { .. }));

        let actions = session.on_message(logon(1), now).await.unwrap();
        assert_eq!(actions, vec![Action::LoggedOn]);
        let state = session.state().await;
        assert_eq!(state.phase, SessionPhase::Active);
        assert_eq!(state.next_inbound, SeqNum::new(2));
        assert_eq!(state.next_outbound, SeqNum::new(2));
    }

    #[tokio::test]
    async fn test_restart_resumes_persisted_counters() {
        let now = Instant::now();
        let mut session = session_with(
            config(Role::Initiator),
            MemoryStore::with_initial_seqs(5, 5),
        );
        let out = sent(&session.on_connected(now).await.unwrap());
        assert_eq!(out[0].seq_num().unwrap(), SeqNum::new(5));

        let actions = session.on_message(logon(5), now).await.unwrap();
        assert_eq!(actions, vec![Action::LoggedOn]);
        assert_eq!(session.state().await.next_inbound, SeqNum::new(6));
    }

    #[tokio::test]
    async fn test_send_persist_and_resend() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;

        let mut frames = Vec::new();
        for i in 0..3 {
            let order = FixMessage::new(&MsgType::App("D".into())).with(11, format!("C{i}"));
            let (seq, actions) = session.send_application(order, now).await.unwrap();
            assert_eq!(seq.value(), 2 + i);
            let [Action::Send { bytes, .. }] = actions.as_slice() else {
                panic!("expected one send, got {actions:?}");
            };
            assert_eq!(session.store().get(seq.value()).await.unwrap().as_ref(), Some(bytes));
            frames.push(fixgate_tagvalue::decode("FIX.4.4", bytes.clone()).unwrap());
        }

        let request = admin(
            AdminMessage::ResendRequest {
                begin: SeqNum::new(2),
                end: SeqNum::new(3),
            },
            2,
        );
        let replayed = sent(&session.on_message(request, now).await.unwrap());
        assert_eq!(replayed.len(), 2);
        for (replay, original) in replayed.iter().zip(&frames) {
            assert_eq!(replay.seq_num().unwrap(), original.seq_num().unwrap());
            assert!(replay.is_possible_duplicate());
            assert_eq!(
                replay.get_str(tags::ORIG_SENDING_TIME),
                original.get_str(tags::SENDING_TIME)
            );
            assert_eq!(replay.get_str(11), original.get_str(11));
        }
        assert_eq!(session.state().await.next_outbound, SeqNum::new(5));
    }

    #[tokio::test]
    async fn test_replay_collapses_admin_and_missing() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;
        // 2 app, 3 heartbeat, 4 allocated but never persisted, 5 app
        session
            .send_application(order(0), now)
            .await
            .unwrap();
        session
            .on_timer(now + Duration::from_secs(30))
            .await
            .unwrap();
        session.store().next_outbound_seq().await.unwrap();
        session
            .send_application(order(0), now)
            .await
            .unwrap();

        let request = admin(
            AdminMessage::ResendRequest {
                begin: SeqNum::new(1),
                end: SeqNum::new(0),
            },
            2,
        );
        let actions = session.on_message(request, now).await.unwrap();
        assert!(actions.iter().any(|a| matches!(a, Action::Alert(text) if text.contains("[4]"))));

        let out = sent(&actions);
        assert_eq!(types(&out), vec!["4", "D", "4", "D"]);
        let seqs: Vec<u64> = out.iter().map(|m| m.seq_num().unwrap().value()).collect();
        assert_eq!(seqs, vec![1, 2, 3, 5]);
        assert_eq!(out[0].get_str(tags::NEW_SEQ_NO), Some("2"));
        assert_eq!(out[2].get_str(tags::NEW_SEQ_NO), Some("5"));
        assert_eq!(out[2].get_str(tags::GAP_FILL_FLAG), Some("Y"));
        assert!(out.iter().all(FixMessage::is_possible_duplicate));
    }

    #[tokio::test]
    async fn test_gap_recovered_by_resend() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;
        assert_eq!(delivered(&session.on_message(order(2), now).await.unwrap()), vec![2]);

        let actions = session.on_message(order(5), now).await.unwrap();
        assert!(delivered(&actions).is_empty());
        let out = sent(&actions);
        assert_eq!(types(&out), vec!["2"]);
        assert_eq!(out[0].get_str(tags::BEGIN_SEQ_NO), Some("3"));
        assert_eq!(out[0].get_str(tags::END_SEQ_NO), Some("4"));
        assert!(session.state().await.gap.is_some());

        let resent = |seq| order(seq).with(tags::POSS_DUP_FLAG, "Y");
        assert_eq!(delivered(&session.on_message(resent(3), now).await.unwrap()), vec![3]);
        assert_eq!(
            delivered(&session.on_message(resent(4), now).await.unwrap()),
            vec![4, 5]
        );
        let state = session.state().await;
        assert_eq!(state.next_inbound, SeqNum::new(6));
        assert!(state.gap.is_none());
    }

    #[tokio::test]
    async fn test_gap_closed_by_gap_fill() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;
        session.on_message(order(4), now).await.unwrap();

        let fill = admin(
            AdminMessage::SequenceReset {
                new_seq_no: SeqNum::new(4),
                gap_fill: true,
            },
            2,
        )
        .with(tags::POSS_DUP_FLAG, "Y");
        let actions = session.on_message(fill, now).await.unwrap();
        assert_eq!(delivered(&actions), vec![4]);
        assert_eq!(session.state().await.next_inbound, SeqNum::new(5));
    }

    #[tokio::test]
    async fn test_second_hole_extends_window() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;
        session.on_message(order(4), now).await.unwrap();
        assert!(sent(&session.on_message(order(5), now).await.unwrap()).is_empty());

        let out = sent(&session.on_message(order(8), now).await.unwrap());
        assert_eq!(out[0].get_str(tags::BEGIN_SEQ_NO), Some("6"));
        assert_eq!(out[0].get_str(tags::END_SEQ_NO), Some("7"));
        let gap = session.state().await.gap.unwrap();
        assert_eq!((gap.begin.value(), gap.end.value()), (2, 7));
    }

    #[tokio::test]
    async fn test_duplicate_discarded_and_too_low_fatal() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;
        session.on_message(order(2), now).await.unwrap();

        let dup = order(2).with(tags::POSS_DUP_FLAG, "Y");
        assert!(session.on_message(dup, now).await.unwrap().is_empty());

        let actions = session.on_message(order(2), now).await.unwrap();
        let out = sent(&actions);
        assert_eq!(types(&out), vec!["5"]);
        assert_eq!(
            out[0].get_str(tags::TEXT),
            Some("MsgSeqNum too low, expecting 3 but received 2")
        );
        assert!(actions.contains(&Action::LoggedOut));
        assert_eq!(
            actions.last(),
            Some(&Action::Disconnect(DisconnectReason::SequenceTooLow))
        );
        assert_eq!(session.phase(), SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_test_request_answered() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;
        let request = admin(
            AdminMessage::TestRequest {
                test_req_id: "PING-7".into(),
            },
            2,
        );
        let out = sent(&session.on_message(request, now).await.unwrap());
        assert_eq!(types(&out), vec!["0"]);
        assert_eq!(out[0].get_str(tags::TEST_REQ_ID), Some("PING-7"));
    }

    #[tokio::test]
    async fn test_heartbeat_liveness() {
        let t0 = Instant::now();
        let mut session = active_initiator(t0).await;

        let out = sent(&session.on_timer(t0 + Duration::from_secs(30)).await.unwrap());
        assert_eq!(types(&out), vec!["0"]);

        let out = sent(&session.on_timer(t0 + Duration::from_secs(45)).await.unwrap());
        assert_eq!(types(&out), vec!["1"]);
        assert!(session.state().await.awaiting_test_response);

        assert!(
            session
                .on_timer(t0 + Duration::from_secs(60))
                .await
                .unwrap()
                .is_empty()
        );
        let actions = session.on_timer(t0 + Duration::from_secs(75)).await.unwrap();
        assert_eq!(
            actions.last(),
            Some(&Action::Disconnect(DisconnectReason::HeartbeatTimeout))
        );
        assert!(actions.contains(&Action::LoggedOut));
    }

    #[tokio::test]
    async fn test_inbound_traffic_clears_test_request() {
        let t0 = Instant::now();
        let mut session = active_initiator(t0).await;
        session.on_timer(t0 + Duration::from_secs(45)).await.unwrap();

        let reply = admin(
            AdminMessage::Heartbeat {
                test_req_id: Some("TEST1".into()),
            },
            2,
        );
        session
            .on_message(reply, t0 + Duration::from_secs(50))
            .await
            .unwrap();
        assert!(!session.state().await.awaiting_test_response);
        let actions = session.on_timer(t0 + Duration::from_secs(75)).await.unwrap();
        assert!(!actions.iter().any(|a| matches!(a, Action::Disconnect(_))));
    }

    #[tokio::test]
    async fn test_acceptor_echoes_logon_and_adopts_interval() {
        let now = Instant::now();
        let mut session = session_with(config(Role::Acceptor), MemoryStore::new());
        assert!(session.on_connected(now).await.unwrap().is_empty());

        let request = admin(
            AdminMessage::Logon {
                heart_bt_int: 10,
                reset_seq_num: false,
            },
            1,
        );
        let actions = session.on_message(request, now).await.unwrap();
        let out = sent(&actions);
        assert_eq!(types(&out), vec!["A"]);
        assert_eq!(out[0].get_str(tags::HEART_BT_INT), Some("10"));
        assert!(actions.contains(&Action::LoggedOn));
        assert_eq!(
            session.state().await.heartbeat_interval,
            Duration::from_secs(10)
        );
    }

    #[tokio::test]
    async fn test_acceptor_honours_reset_flag() {
        let now = Instant::now();
        let store = MemoryStore::with_initial_seqs(9, 9);
        let mut session = session_with(config(Role::Acceptor), store);
        session.on_connected(now).await.unwrap();

        let request = admin(
            AdminMessage::Logon {
                heart_bt_int: 30,
                reset_seq_num: true,
            },
            1,
        );
        let out = sent(&session.on_message(request, now).await.unwrap());
        assert_eq!(out[0].seq_num().unwrap(), SeqNum::new(1));
        assert_eq!(out[0].get_str(tags::RESET_SEQ_NUM_FLAG), Some("Y"));
        let state = session.state().await;
        assert_eq!(state.next_inbound, SeqNum::new(2));
        assert_eq!(state.next_outbound, SeqNum::new(2));
    }

    #[tokio::test]
    async fn test_initiator_reset_on_logon() {
        let now = Instant::now();
        let cfg = config(Role::Initiator).with_reset_on_logon(true);
        let mut session = session_with(cfg, MemoryStore::with_initial_seqs(40, 40));
        let out = sent(&session.on_connected(now).await.unwrap());
        assert_eq!(out[0].seq_num().unwrap(), SeqNum::new(1));
        assert_eq!(out[0].get_str(tags::RESET_SEQ_NUM_FLAG), Some("Y"));

        let reply = admin(
            AdminMessage::Logon {
                heart_bt_int: 30,
                reset_seq_num: true,
            },
            1,
        );
        session.on_message(reply, now).await.unwrap();
        let state = session.state().await;
        assert_eq!(state.next_outbound, SeqNum::new(2));
        assert_eq!(state.next_inbound, SeqNum::new(2));
    }

    #[tokio::test]
    async fn test_logon_sequence_too_low() {
        let now = Instant::now();
        let mut session = session_with(
            config(Role::Acceptor),
            MemoryStore::with_initial_seqs(1, 5),
        );
        session.on_connected(now).await.unwrap();

        let actions = session.on_message(logon(3), now).await.unwrap();
        let out = sent(&actions);
        assert_eq!(types(&out), vec!["5"]);
        assert_eq!(
            out[0].get_str(tags::TEXT),
            Some("MsgSeqNum too low, expecting 5 but received 3")
        );
        assert_eq!(
            actions.last(),
            Some(&Action::Disconnect(DisconnectReason::SequenceTooLow))
        );
        assert!(!actions.contains(&Action::LoggedOn));
    }

    #[tokio::test]
    async fn test_logon_with_gap_requests_resend() {
        let now = Instant::now();
        let mut session = session_with(config(Role::Initiator), MemoryStore::new());
        session.on_connected(now).await.unwrap();

        let actions = session.on_message(logon(4), now).await.unwrap();
        assert!(actions.contains(&Action::LoggedOn));
        let out = sent(&actions);
        assert_eq!(types(&out), vec!["2"]);
        assert_eq!(out[0].get_str(tags::BEGIN_SEQ_NO), Some("1"));
        assert_eq!(out[0].get_str(tags::END_SEQ_NO), Some("3"));

        let fill = admin(
            AdminMessage::SequenceReset {
                new_seq_no: SeqNum::new(4),
                gap_fill: true,
            },
            1,
        )
        .with(tags::POSS_DUP_FLAG, "Y");
        session.on_message(fill, now).await.unwrap();
        // logon at 4 already consumed
        assert_eq!(session.state().await.next_inbound, SeqNum::new(5));
        assert!(session.state().await.gap.is_none());
    }

    #[tokio::test]
    async fn test_logon_rejections() {
        let now = Instant::now();

        let mut session = session_with(config(Role::Acceptor), MemoryStore::new());
        session.on_connected(now).await.unwrap();
        let mut missing_interval = logon(1);
        missing_interval.remove(tags::HEART_BT_INT);
        let actions = session.on_message(missing_interval, now).await.unwrap();
        assert_eq!(
            actions.last(),
            Some(&Action::Disconnect(DisconnectReason::LogonRejected))
        );

        let mut session = session_with(config(Role::Acceptor), MemoryStore::new());
        session.on_connected(now).await.unwrap();
        let actions = session.on_message(order(1), now).await.unwrap();
        assert!(sent(&actions).is_empty());
        assert_eq!(
            actions.last(),
            Some(&Action::Disconnect(DisconnectReason::LogonRejected))
        );

        let mut session = session_with(config(Role::Acceptor), MemoryStore::new());
        session.on_connected(now).await.unwrap();
        let mut stranger = logon(1);
        stranger.set(tags::SENDER_COMP_ID, "STRANGER");
        let actions = session.on_message(stranger, now).await.unwrap();
        assert_eq!(
            actions.last(),
            Some(&Action::Disconnect(DisconnectReason::IdentityMismatch))
        );
    }

    #[tokio::test]
    async fn test_logon_interval_out_of_range() {
        let now = Instant::now();
        let mut session = session_with(config(Role::Acceptor), MemoryStore::new());
        session.on_connected(now).await.unwrap();

        let request = admin(
            AdminMessage::Logon {
                heart_bt_int: u64::MAX,
                reset_seq_num: false,
            },
            1,
        );
        let actions = session.on_message(request, now).await.unwrap();
        let out = sent(&actions);
        assert_eq!(types(&out), vec!["5"]);
        assert!(out[0].get_str(tags::TEXT).unwrap().contains("HeartBtInt(108)"));
        assert!(!actions.contains(&Action::LoggedOn));
        assert_eq!(
            actions.last(),
            Some(&Action::Disconnect(DisconnectReason::LogonRejected))
        );
        assert_eq!(
            session.state().await.heartbeat_interval,
            Duration::from_secs(30)
        );

        session.on_timer(now + Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_logon_timeout() {
        let t0 = Instant::now();
        let mut session = session_with(config(Role::Initiator), MemoryStore::new());
        session.on_connected(t0).await.unwrap();
        assert!(
            session
                .on_timer(t0 + Duration::from_secs(9))
                .await
                .unwrap()
                .is_empty()
        );
        let actions = session.on_timer(t0 + Duration::from_secs(10)).await.unwrap();
        assert_eq!(
            actions.last(),
            Some(&Action::Disconnect(DisconnectReason::LogonTimeout))
        );
        assert!(!actions.contains(&Action::LoggedOut));
    }

    #[tokio::test]
    async fn test_invalid_admin_rejected_and_consumed() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;
        let mut request = admin(
            AdminMessage::ResendRequest {
                begin: SeqNum::new(1),
                end: SeqNum::new(0),
            },
            2,
        );
        request.remove(tags::END_SEQ_NO);

        let out = sent(&session.on_message(request, now).await.unwrap());
        assert_eq!(types(&out), vec!["3"]);
        assert_eq!(out[0].get_str(tags::REF_SEQ_NUM), Some("2"));
        assert_eq!(out[0].get_str(tags::REF_TAG_ID), Some("16"));
        assert_eq!(out[0].get_str(tags::SESSION_REJECT_REASON), Some("1"));
        assert_eq!(session.state().await.next_inbound, SeqNum::new(3));
    }

    #[tokio::test]
    async fn test_sequence_reset_cannot_lower() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;
        session.on_message(order(2), now).await.unwrap();
        session.on_message(order(3), now).await.unwrap();

        let reset = admin(
            AdminMessage::SequenceReset {
                new_seq_no: SeqNum::new(2),
                gap_fill: false,
            },
            9,
        );
        let out = sent(&session.on_message(reset, now).await.unwrap());
        assert_eq!(types(&out), vec!["3"]);
        assert_eq!(out[0].get_str(tags::SESSION_REJECT_REASON), Some("5"));
        assert_eq!(out[0].get_str(tags::REF_TAG_ID), Some("36"));
        assert_eq!(session.state().await.next_inbound, SeqNum::new(4));

        let forward = admin(
            AdminMessage::SequenceReset {
                new_seq_no: SeqNum::new(20),
                gap_fill: false,
            },
            1,
        );
        assert!(session.on_message(forward, now).await.unwrap().is_empty());
        assert_eq!(session.state().await.next_inbound, SeqNum::new(20));
    }

    #[tokio::test]
    async fn test_garbled_frame_rejected_without_consuming() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;
        let raw = b"8=FIX.4.4\x019=5\x0135=D\x0134=2\x0110=000\x01";
        let error = DecodeError::BadChecksum {
            calculated: 17,
            declared: 0,
        };

        let out = sent(&session.on_decode_error(&error, raw, now).await.unwrap());
        assert_eq!(types(&out), vec!["3"]);
        assert_eq!(out[0].get_str(tags::REF_SEQ_NUM), Some("2"));
        assert_eq!(out[0].get_str(tags::REF_TAG_ID), Some("10"));
        assert_eq!(out[0].get_str(tags::REF_MSG_TYPE), Some("D"));
        assert_eq!(session.state().await.next_inbound, SeqNum::new(2));

        // the retransmission arrives as a normal in-order message
        assert_eq!(delivered(&session.on_message(order(2), now).await.unwrap()), vec![2]);
    }

    #[tokio::test]
    async fn test_comp_id_problem_logs_out() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;
        let mut wrong = order(2);
        wrong.set(tags::TARGET_COMP_ID, "SOMEONE");

        let actions = session.on_message(wrong, now).await.unwrap();
        let out = sent(&actions);
        assert_eq!(types(&out), vec!["3", "5"]);
        assert_eq!(out[0].get_str(tags::SESSION_REJECT_REASON), Some("9"));
        assert_eq!(out[0].get_str(tags::REF_TAG_ID), Some("56"));
        assert_eq!(
            actions.last(),
            Some(&Action::Disconnect(DisconnectReason::IdentityMismatch))
        );
        assert!(delivered(&actions).is_empty());
    }

    #[tokio::test]
    async fn test_logout_flows() {
        let t0 = Instant::now();

        let mut session = active_initiator(t0).await;
        let out = sent(&session.initiate_logout(Some("bye".into()), t0).await.unwrap());
        assert_eq!(types(&out), vec!["5"]);
        assert!(matches!(
            session.phase(),
            SessionPhase::LogoutPending {
                initiated_locally: true,
                ..
            }
        ));
        let echo = admin(AdminMessage::Logout { text: None }, 2);
        let actions = session.on_message(echo, t0).await.unwrap();
        assert!(sent(&actions).is_empty());
        assert_eq!(
            actions,
            vec![
                Action::LoggedOut,
                Action::Disconnect(DisconnectReason::LogoutComplete)
            ]
        );

        let mut session = active_initiator(t0).await;
        let peer = admin(AdminMessage::Logout { text: None }, 2);
        let actions = session.on_message(peer, t0).await.unwrap();
        assert_eq!(types(&sent(&actions)), vec!["5"]);
        assert_eq!(
            actions.last(),
            Some(&Action::Disconnect(DisconnectReason::LogoutComplete))
        );

        let mut session = active_initiator(t0).await;
        session.initiate_logout(None, t0).await.unwrap();
        let actions = session.on_timer(t0 + Duration::from_secs(2)).await.unwrap();
        assert_eq!(
            actions.last(),
            Some(&Action::Disconnect(DisconnectReason::LogoutTimeout))
        );
    }

    #[tokio::test]
    async fn test_send_application_guards() {
        let now = Instant::now();
        let mut session = session_with(config(Role::Initiator), MemoryStore::new());
        let result = session.send_application(order(0), now).await;
        assert!(matches!(
            result,
            Err(FixError::Session(SessionError::InvalidState { .. }))
        ));

        let mut session = active_initiator(now).await;
        let heartbeat = FixMessage::new(&MsgType::Heartbeat);
        assert!(matches!(
            session.send_application(heartbeat, now).await,
            Err(FixError::Session(SessionError::AdminMessageNotAllowed { .. }))
        ));

        let bad = FixMessage::new(&MsgType::App("D".into())).with(58, "a\x01b");
        assert!(matches!(
            session.send_application(bad, now).await,
            Err(FixError::Encode(_))
        ));
        assert_eq!(session.state().await.next_outbound, SeqNum::new(2));
    }

    #[tokio::test]
    async fn test_failed_persist_blocks_send() {
        let now = Instant::now();
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail: AtomicBool::new(false),
        });
        let mut session = Session::new(
            config(Role::Initiator),
            Arc::clone(&store),
            Arc::new(Dictionary::session(Version::Fix44)),
        )
        .unwrap();
        session.on_connected(now).await.unwrap();
        let actions = session.on_message(logon(1), now).await.unwrap();
        assert!(actions.contains(&Action::LoggedOn));

        store.fail.store(true, Ordering::SeqCst);
        let result = session.send_application(order(0), now).await;
        assert!(matches!(
            result,
            Err(FixError::Store(StoreError::PersistFailed { seq_num: 2, .. }))
        ));
        assert!(store.inner.get(2).await.unwrap().is_none());

        // a due Heartbeat is held back the same way
        let result = session.on_timer(now + Duration::from_secs(30)).await;
        assert!(matches!(result, Err(FixError::Store(_))));

        store.fail.store(false, Ordering::SeqCst);
        let (seq, actions) = session.send_application(order(0), now).await.unwrap();
        assert!(matches!(
            actions.as_slice(),
            [Action::Send { seq: sent_seq, .. }] if *sent_seq == seq
        ));
        assert!(store.inner.get(seq.value()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transport_loss_notifies_logout() {
        let now = Instant::now();
        let mut session = active_initiator(now).await;
        assert_eq!(session.on_disconnected(), vec![Action::LoggedOut]);
        assert!(session.on_disconnected().is_empty());
        assert_eq!(session.phase(), SessionPhase::Disconnected);
    }
}
