/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Engine builder for fluent configuration.

use crate::application::{Application, NoOpApplication};
use crate::engine::Engine;
use crate::handle::SessionHandle;
use fixgate_core::error::{FixError, SessionError};
use fixgate_dictionary::{Dictionary, Version};
use fixgate_session::{Session, SessionConfig};
use fixgate_store::{MemoryStore, MessageStore};
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring a session engine.
pub struct EngineBuilder<A: Application + ?Sized = NoOpApplication> {
    /// Application callback handler.
    application: Arc<A>,
    /// Session configuration.
    config: Option<SessionConfig>,
    /// Message store; in-memory when unset.
    store: Option<Arc<dyn MessageStore>>,
    /// Dictionary; the built-in session dictionary when unset.
    dictionary: Option<Arc<Dictionary>>,
    /// Connection timeout.
    connect_timeout: Duration,
    /// Reconnect interval.
    reconnect_interval: Duration,
    /// Timer resolution.
    tick_interval: Duration,
    /// Pending handle commands before senders wait.
    command_buffer: usize,
}

impl<A: Application + ?Sized> std::fmt::Debug for EngineBuilder<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("has_store", &self.store.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

impl Default for EngineBuilder<NoOpApplication> {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder<NoOpApplication> {
    /// Creates a new engine builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            application: Arc::new(NoOpApplication),
            config: None,
            store: None,
            dictionary: None,
            connect_timeout: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
            command_buffer: 64,
        }
    }
}

impl<A: Application + ?Sized> EngineBuilder<A> {
    /// Sets the application callback handler.
    #[must_use]
    pub fn with_application<B: Application>(self, application: B) -> EngineBuilder<B> {
        self.with_shared_application(Arc::new(application))
    }

    /// Sets an application handler shared with other owners.
    #[must_use]
    pub fn with_shared_application<B: Application + ?Sized>(
        self,
        application: Arc<B>,
    ) -> EngineBuilder<B> {
        EngineBuilder {
            application,
            config: self.config,
            store: self.store,
            dictionary: self.dictionary,
            connect_timeout: self.connect_timeout,
            reconnect_interval: self.reconnect_interval,
            tick_interval: self.tick_interval,
            command_buffer: self.command_buffer,
        }
    }

    /// Sets the session configuration.
    #[must_use]
    pub fn with_session(mut self, config: SessionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the message store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the dictionary.
    #[must_use]
    pub fn with_dictionary(mut self, dictionary: Arc<Dictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the reconnect interval.
    #[must_use]
    pub const fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets how often timers are evaluated.
    #[must_use]
    pub const fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the command channel capacity.
    #[must_use]
    pub const fn with_command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity;
        self
    }

    /// Returns the configured session.
    #[must_use]
    pub const fn session(&self) -> Option<&SessionConfig> {
        self.config.as_ref()
    }

    /// Returns the connection timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the reconnect interval.
    #[must_use]
    pub const fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    /// Returns the application handler.
    #[must_use]
    pub fn application(&self) -> Arc<A> {
        Arc::clone(&self.application)
    }

    /// Builds the engine and a handle to it.
    ///
    /// # Errors
    /// `SessionError::Configuration` when no session is configured, the
    /// configuration is invalid, or the tick interval is zero.
    pub fn build(self) -> Result<(Engine<A>, SessionHandle), FixError> {
        let config = self
            .config
            .ok_or_else(|| SessionError::Configuration("no session configured".to_string()))?;
        if self.tick_interval.is_zero() {
            return Err(SessionError::Configuration("tick interval must be positive".into()).into());
        }
        let dictionary = self.dictionary.unwrap_or_else(|| {
            let version = Version::from_begin_string(&config.begin_string).unwrap_or(Version::Fix44);
            Arc::new(Dictionary::session(version))
        });
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn MessageStore>);

        let session = Session::new(config, store, dictionary)?;
        Ok(Engine::new(
            session,
            self.application,
            self.command_buffer,
            self.tick_interval,
            self.connect_timeout,
            self.reconnect_interval,
        ))
    }
}
