/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The task that owns a session.
//!
//! [`Engine::run`] drives one connection to completion. It selects over
//! decoded frames, a periodic tick and handle commands, so every session
//! transition happens on this task. Outbound frames are handed to a separate
//! writer task and the session never waits on a socket write.

use crate::application::Application;
use crate::handle::{Command, SessionHandle};
use bytes::Bytes;
use fixgate_core::error::{FixError, TransportError};
use fixgate_core::types::SessionId;
use fixgate_session::{Action, DisconnectReason, Session};
use fixgate_store::MessageStore;
use fixgate_transport::{FixCodec, InboundFrame};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// A session plus the application it reports to.
///
/// Reusable across connections: persisted counters carry over and each call
/// to [`Engine::run`] starts a new logon.
pub struct Engine<A: Application + ?Sized> {
    session: Session<dyn MessageStore>,
    application: Arc<A>,
    commands: mpsc::Receiver<Command>,
    tick_interval: Duration,
    connect_timeout: Duration,
    reconnect_interval: Duration,
    created: bool,
}

impl<A: Application + ?Sized> std::fmt::Debug for Engine<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("session_id", self.session.session_id())
            .field("phase", &self.session.phase())
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

impl<A: Application + ?Sized> Engine<A> {
    pub(crate) fn new(
        session: Session<dyn MessageStore>,
        application: Arc<A>,
        command_buffer: usize,
        tick_interval: Duration,
        connect_timeout: Duration,
        reconnect_interval: Duration,
    ) -> (Self, SessionHandle) {
        let (tx, commands) = mpsc::channel(command_buffer.max(1));
        let handle = SessionHandle::new(session.session_id().clone(), tx);
        let engine = Self {
            session,
            application,
            commands,
            tick_interval,
            connect_timeout,
            reconnect_interval,
            created: false,
        };
        (engine, handle)
    }

    /// Session identity.
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        self.session.session_id()
    }

    /// Delay the caller should observe between connection attempts.
    #[must_use]
    pub const fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    /// Connect timeout used by [`Engine::connect`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Connects over TCP and runs the session on that connection.
    ///
    /// # Errors
    /// Connection failures, plus everything [`Engine::run`] returns.
    pub async fn connect(&mut self, addr: &str) -> Result<DisconnectReason, FixError> {
        let stream = fixgate_transport::connect(addr, self.connect_timeout).await?;
        self.run(stream).await
    }

    /// Runs the session over `stream` until it disconnects.
    ///
    /// Returns why the connection ended. The application sees `on_logout`
    /// for any logged-on session that ends here, errors included.
    ///
    /// # Errors
    /// Store failures and encode failures of session-generated messages.
    pub async fn run<T>(&mut self, stream: T) -> Result<DisconnectReason, FixError>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let span = info_span!("session", id = %self.session.session_id());
        async {
            if !self.created {
                self.application.on_create(self.session.session_id()).await;
                self.created = true;
            }
            let result = self.run_connection(stream).await;
            if let Err(error) = &result {
                error!(%error, "session failed");
                let actions = self.session.on_disconnected();
                self.notify(actions).await;
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_connection<T>(&mut self, stream: T) -> Result<DisconnectReason, FixError>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let config = self.session.config();
        let codec = FixCodec::new(config.begin_string.clone())
            .with_max_message_size(config.max_message_size);
        let (reader, writer) = tokio::io::split(stream);
        let mut frames = FramedRead::new(reader, codec.clone());

        let (outbound, queue) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(FramedWrite::new(writer, codec), queue).in_current_span());

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let actions = self.session.on_connected(Instant::now()).await?;
        let mut outcome = self.apply(actions, &outbound).await;

        while outcome.is_none() {
            outcome = tokio::select! {
                frame = frames.next() => match frame {
                    Some(Ok(InboundFrame::Message(message))) => {
                        let actions = self.session.on_message(message, Instant::now()).await?;
                        self.apply(actions, &outbound).await
                    }
                    Some(Ok(InboundFrame::Garbled { error, raw })) => {
                        let actions = self
                            .session
                            .on_decode_error(&error, &raw, Instant::now())
                            .await?;
                        self.apply(actions, &outbound).await
                    }
                    Some(Err(error)) => {
                        warn!(%error, "read failed");
                        self.transport_closed().await
                    }
                    None => {
                        info!("connection closed by peer");
                        self.transport_closed().await
                    }
                },
                _ = ticker.tick() => {
                    let actions = self.session.on_timer(Instant::now()).await?;
                    self.apply(actions, &outbound).await
                }
                Some(command) = self.commands.recv() => {
                    self.on_command(command, &outbound).await
                }
            };
        }

        drop(outbound);
        match writer.await {
            Ok(Err(error)) => debug!(%error, "writer stopped"),
            Err(error) => warn!(%error, "writer task failed"),
            Ok(Ok(())) => {}
        }
        let reason = outcome.unwrap_or(DisconnectReason::TransportClosed);
        info!(%reason, "disconnected");
        Ok(reason)
    }

    async fn on_command(
        &mut self,
        command: Command,
        outbound: &mpsc::UnboundedSender<Bytes>,
    ) -> Option<DisconnectReason> {
        match command {
            Command::Send { message, reply } => {
                match self.session.send_application(message, Instant::now()).await {
                    Ok((seq, actions)) => {
                        let outcome = self.apply(actions, outbound).await;
                        let _ = reply.send(Ok(seq));
                        outcome
                    }
                    Err(error) => {
                        debug!(%error, "application send refused");
                        let _ = reply.send(Err(error));
                        None
                    }
                }
            }
            Command::Logout { text, reply } => {
                match self.session.initiate_logout(text, Instant::now()).await {
                    Ok(actions) => {
                        let outcome = self.apply(actions, outbound).await;
                        let _ = reply.send(Ok(()));
                        outcome
                    }
                    Err(error) => {
                        let _ = reply.send(Err(error));
                        None
                    }
                }
            }
            Command::State { reply } => {
                let _ = reply.send(self.session.state().await);
                None
            }
        }
    }

    async fn transport_closed(&mut self) -> Option<DisconnectReason> {
        let actions = self.session.on_disconnected();
        self.notify(actions).await;
        Some(DisconnectReason::TransportClosed)
    }

    /// Carries out `actions` in order. Returns the disconnect reason if one
    /// was requested.
    async fn apply(
        &self,
        actions: Vec<Action>,
        outbound: &mpsc::UnboundedSender<Bytes>,
    ) -> Option<DisconnectReason> {
        let mut disconnect = None;
        for action in actions {
            match action {
                Action::Send { seq, bytes } => {
                    if outbound.send(bytes).is_err() {
                        warn!(seq = seq.value(), "writer gone, frame dropped");
                    }
                }
                Action::Disconnect(reason) => disconnect = Some(reason),
                other => self.notify_one(other).await,
            }
        }
        disconnect
    }

    async fn notify(&self, actions: Vec<Action>) {
        for action in actions {
            self.notify_one(action).await;
        }
    }

    async fn notify_one(&self, action: Action) {
        let session_id = self.session.session_id();
        match action {
            Action::Deliver { seq, message } => {
                self.application
                    .on_application_message(session_id, seq, &message)
                    .await;
            }
            Action::LoggedOn => self.application.on_logon(session_id).await,
            Action::LoggedOut => self.application.on_logout(session_id).await,
            Action::Alert(alert) => self.application.on_alert(session_id, &alert).await,
            Action::Send { .. } | Action::Disconnect(_) => {}
        }
    }
}

async fn write_loop<W>(
    mut sink: FramedWrite<WriteHalf<W>, FixCodec>,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
) -> Result<(), TransportError>
where
    W: AsyncRead + AsyncWrite,
{
    while let Some(bytes) = queue.recv().await {
        sink.send(bytes).await?;
    }
    sink.into_inner().shutdown().await?;
    Ok(())
}
