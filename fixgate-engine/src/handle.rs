/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Cloneable handle to a running session.

use fixgate_core::error::{FixError, SessionError};
use fixgate_core::message::FixMessage;
use fixgate_core::types::{SeqNum, SessionId};
use fixgate_session::SessionState;
use tokio::sync::{mpsc, oneshot};

/// Requests served by the session task.
#[derive(Debug)]
pub(crate) enum Command {
    Send {
        message: FixMessage,
        reply: oneshot::Sender<Result<SeqNum, FixError>>,
    },
    Logout {
        text: Option<String>,
        reply: oneshot::Sender<Result<(), FixError>>,
    },
    State {
        reply: oneshot::Sender<SessionState>,
    },
}

/// Sends commands to the task that owns a session.
///
/// Every request is serialized with inbound traffic and timer ticks, so it
/// observes a consistent session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub(crate) const fn new(session_id: SessionId, commands: mpsc::Sender<Command>) -> Self {
        Self {
            session_id,
            commands,
        }
    }

    /// Session this handle drives.
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Sends an application message and returns its MsgSeqNum.
    ///
    /// The message is persisted and queued for the transport by the time
    /// this returns.
    ///
    /// # Errors
    /// `SessionError::InvalidState` unless the session is logged on,
    /// `SessionError::AdminMessageNotAllowed` for administrative types,
    /// `SessionError::Closed` once the session task is gone, and any encode
    /// or store failure.
    pub async fn send_application_message(&self, message: FixMessage) -> Result<SeqNum, FixError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Send { message, reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Starts a graceful logout.
    ///
    /// # Errors
    /// `SessionError::Closed` once the session task is gone, or a store
    /// failure while sending Logout.
    pub async fn logout(&self, text: Option<String>) -> Result<(), FixError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Logout { text, reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Snapshot of the session.
    ///
    /// # Errors
    /// `SessionError::Closed` once the session task is gone.
    pub async fn state(&self) -> Result<SessionState, FixError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::State { reply }).await?;
        Ok(rx.await.map_err(|_| SessionError::Closed)?)
    }

    async fn request(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}
