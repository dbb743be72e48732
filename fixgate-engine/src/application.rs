/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Application callback interface.
//!
//! This module defines the callbacks through which the engine reports
//! session events and hands over accepted application messages.

use async_trait::async_trait;
use fixgate_core::message::FixMessage;
use fixgate_core::types::{SeqNum, SessionId};
use tracing::warn;

/// Application callback interface for handling FIX messages.
///
/// Callbacks run on the session task, so a slow callback delays the
/// session. Messages arrive strictly in sequence order and at most once per
/// connection.
#[async_trait]
pub trait Application: Send + Sync {
    /// Called once before the first connection.
    async fn on_create(&self, session_id: &SessionId);

    /// Called on successful logon.
    async fn on_logon(&self, session_id: &SessionId);

    /// Called when a logged-on session ends, for whatever reason.
    async fn on_logout(&self, session_id: &SessionId);

    /// Called for each accepted in-order application message.
    ///
    /// # Arguments
    /// * `session_id` - The session identifier
    /// * `seq` - The message's MsgSeqNum
    /// * `message` - The received message
    async fn on_application_message(
        &self,
        session_id: &SessionId,
        seq: SeqNum,
        message: &FixMessage,
    );

    /// Called with conditions an operator should see, such as an incomplete
    /// resend or a heartbeat timeout.
    async fn on_alert(&self, session_id: &SessionId, alert: &str) {
        warn!(session = %session_id, alert, "session alert");
    }
}

/// Default no-op application implementation.
#[derive(Debug, Default)]
pub struct NoOpApplication;

#[async_trait]
impl Application for NoOpApplication {
    async fn on_create(&self, _session_id: &SessionId) {}

    async fn on_logon(&self, _session_id: &SessionId) {}

    async fn on_logout(&self, _session_id: &SessionId) {}

    async fn on_application_message(
        &self,
        _session_id: &SessionId,
        _seq: SeqNum,
        _message: &FixMessage,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixgate_core::message::MsgType;
    use fixgate_core::types::CompId;

    #[tokio::test]
    async fn test_noop_application() {
        let app = NoOpApplication;
        let session_id = SessionId::new(
            "FIX.4.4",
            CompId::new("SENDER").unwrap(),
            CompId::new("TARGET").unwrap(),
        );

        app.on_create(&session_id).await;
        app.on_logon(&session_id).await;
        app.on_application_message(
            &session_id,
            SeqNum::new(2),
            &FixMessage::new(&MsgType::App("D".into())),
        )
        .await;
        app.on_alert(&session_id, "resend incomplete").await;
        app.on_logout(&session_id).await;
    }
}
