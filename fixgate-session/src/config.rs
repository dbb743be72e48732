/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session configuration.
//!
//! [`SessionConfig`] carries defaults suitable for most counterparties;
//! [`SessionConfigBuilder`] validates before handing one out.

use fixgate_core::error::SessionError;
use fixgate_core::types::{CompId, SessionId};
use std::time::Duration;

/// Default maximum inbound frame size (64 KiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Longest heartbeat interval accepted, locally or from a counterparty Logon.
pub const MAX_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Which side opens the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Connects and sends the first Logon.
    Initiator,
    /// Accepts the connection and answers the counterparty's Logon.
    Acceptor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initiator => write!(f, "initiator"),
            Self::Acceptor => write!(f, "acceptor"),
        }
    }
}

/// Configuration for a FIX session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sender CompID (tag 49).
    pub sender_comp_id: CompId,
    /// Target CompID (tag 56).
    pub target_comp_id: CompId,
    /// FIX version BeginString (e.g., "FIX.4.4").
    pub begin_string: String,
    /// Initiator or acceptor.
    pub role: Role,
    /// Heartbeat interval. An acceptor adopts the initiator's value at logon.
    pub heartbeat_interval: Duration,
    /// Fraction of the interval added before a TestRequest is sent.
    pub test_request_margin: f64,
    /// Time allowed for a TestRequest answer before disconnecting.
    pub test_request_grace: Duration,
    /// Logon timeout duration.
    pub logon_timeout: Duration,
    /// Logout timeout duration.
    pub logout_timeout: Duration,
    /// Whether to send ResetSeqNumFlag=Y on every logon.
    pub reset_on_logon: bool,
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
    /// Whether inbound 49/56 must match the session identity.
    pub validate_comp_ids: bool,
}

impl SessionConfig {
    /// Creates a new session configuration with required fields.
    #[must_use]
    pub fn new(
        sender_comp_id: CompId,
        target_comp_id: CompId,
        begin_string: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            sender_comp_id,
            target_comp_id,
            begin_string: begin_string.into(),
            role,
            heartbeat_interval: Duration::from_secs(30),
            test_request_margin: 0.5,
            test_request_grace: Duration::from_secs(30),
            logon_timeout: Duration::from_secs(10),
            logout_timeout: Duration::from_secs(2),
            reset_on_logon: false,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            validate_comp_ids: true,
        }
    }

    /// Sets the heartbeat interval; the grace window follows it.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.test_request_grace = interval;
        self
    }

    /// Sets the TestRequest margin.
    #[must_use]
    pub const fn with_test_request_margin(mut self, margin: f64) -> Self {
        self.test_request_margin = margin;
        self
    }

    /// Sets the TestRequest grace window.
    #[must_use]
    pub const fn with_test_request_grace(mut self, grace: Duration) -> Self {
        self.test_request_grace = grace;
        self
    }

    /// Sets whether to reset sequence numbers on logon.
    #[must_use]
    pub const fn with_reset_on_logon(mut self, reset: bool) -> Self {
        self.reset_on_logon = reset;
        self
    }

    /// Sets the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Sets the logon timeout.
    #[must_use]
    pub const fn with_logon_timeout(mut self, timeout: Duration) -> Self {
        self.logon_timeout = timeout;
        self
    }

    /// Sets the logout timeout.
    #[must_use]
    pub const fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Sets whether inbound comp ids are checked.
    #[must_use]
    pub const fn with_validate_comp_ids(mut self, validate: bool) -> Self {
        self.validate_comp_ids = validate;
        self
    }

    /// Identity of this session, as seen locally.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        SessionId::new(
            self.begin_string.clone(),
            self.sender_comp_id,
            self.target_comp_id,
        )
    }

    /// Returns the heartbeat interval in seconds.
    #[must_use]
    pub fn heartbeat_interval_secs(&self) -> u64 {
        self.heartbeat_interval.as_secs()
    }

    /// Checks the invariants [`SessionConfigBuilder::build`] enforces.
    ///
    /// # Errors
    /// `SessionError::Configuration` naming the first offending setting.
    pub fn validate(&self) -> Result<(), SessionError> {
        let invalid = |reason: &str| Err(SessionError::Configuration(reason.to_string()));
        if self.sender_comp_id.is_empty() {
            return invalid("sender_comp_id must not be empty");
        }
        if self.target_comp_id.is_empty() {
            return invalid("target_comp_id must not be empty");
        }
        if self.begin_string.is_empty() {
            return invalid("begin_string must not be empty");
        }
        if self.heartbeat_interval.as_secs() == 0 {
            return invalid("heartbeat interval must be at least one second");
        }
        if self.heartbeat_interval > MAX_HEARTBEAT_INTERVAL {
            return invalid("heartbeat interval must not exceed one day");
        }
        if !(self.test_request_margin > 0.0 && self.test_request_margin <= 1.0) {
            return invalid("test request margin must be in (0, 1]");
        }
        if self.max_message_size == 0 {
            return invalid("max_message_size must be positive");
        }
        Ok(())
    }
}

/// Builder for session configuration.
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    sender_comp_id: Option<CompId>,
    target_comp_id: Option<CompId>,
    begin_string: Option<String>,
    role: Option<Role>,
    heartbeat_interval: Option<Duration>,
    test_request_margin: Option<f64>,
    test_request_grace: Option<Duration>,
    logon_timeout: Option<Duration>,
    logout_timeout: Option<Duration>,
    reset_on_logon: bool,
    max_message_size: Option<usize>,
    validate_comp_ids: Option<bool>,
}

impl SessionConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender CompID.
    #[must_use]
    pub fn sender_comp_id(mut self, id: CompId) -> Self {
        self.sender_comp_id = Some(id);
        self
    }

    /// Sets the target CompID.
    #[must_use]
    pub fn target_comp_id(mut self, id: CompId) -> Self {
        self.target_comp_id = Some(id);
        self
    }

    /// Sets the FIX version.
    #[must_use]
    pub fn begin_string(mut self, version: impl Into<String>) -> Self {
        self.begin_string = Some(version.into());
        self
    }

    /// Sets the role. Defaults to initiator.
    #[must_use]
    pub const fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub const fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Sets the TestRequest margin.
    #[must_use]
    pub const fn test_request_margin(mut self, margin: f64) -> Self {
        self.test_request_margin = Some(margin);
        self
    }

    /// Sets the TestRequest grace window. Defaults to one interval.
    #[must_use]
    pub const fn test_request_grace(mut self, grace: Duration) -> Self {
        self.test_request_grace = Some(grace);
        self
    }

    /// Sets the logon timeout.
    #[must_use]
    pub const fn logon_timeout(mut self, timeout: Duration) -> Self {
        self.logon_timeout = Some(timeout);
        self
    }

    /// Sets the logout timeout.
    #[must_use]
    pub const fn logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = Some(timeout);
        self
    }

    /// Sets whether to reset on logon.
    #[must_use]
    pub const fn reset_on_logon(mut self, reset: bool) -> Self {
        self.reset_on_logon = reset;
        self
    }

    /// Sets the maximum inbound message size.
    #[must_use]
    pub const fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Sets whether inbound comp ids are checked.
    #[must_use]
    pub const fn validate_comp_ids(mut self, validate: bool) -> Self {
        self.validate_comp_ids = Some(validate);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    /// `SessionError::Configuration` if a comp id is missing or empty, the
    /// heartbeat interval is zero or longer than a day, or the margin is
    /// outside (0, 1].
    pub fn build(self) -> Result<SessionConfig, SessionError> {
        let sender = self
            .sender_comp_id
            .ok_or_else(|| SessionError::Configuration("sender_comp_id is required".into()))?;
        let target = self
            .target_comp_id
            .ok_or_else(|| SessionError::Configuration("target_comp_id is required".into()))?;
        let begin_string = self.begin_string.unwrap_or_else(|| "FIX.4.4".to_string());

        let mut config = SessionConfig::new(
            sender,
            target,
            begin_string,
            self.role.unwrap_or(Role::Initiator),
        );
        if let Some(interval) = self.heartbeat_interval {
            config = config.with_heartbeat_interval(interval);
        }
        if let Some(margin) = self.test_request_margin {
            config.test_request_margin = margin;
        }
        if let Some(grace) = self.test_request_grace {
            config.test_request_grace = grace;
        }
        if let Some(timeout) = self.logon_timeout {
            config.logon_timeout = timeout;
        }
        if let Some(timeout) = self.logout_timeout {
            config.logout_timeout = timeout;
        }
        config.reset_on_logon = self.reset_on_logon;
        if let Some(size) = self.max_message_size {
            config.max_message_size = size;
        }
        if let Some(validate) = self.validate_comp_ids {
            config.validate_comp_ids = validate;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (CompId, CompId) {
        (CompId::new("SENDER").unwrap(), CompId::new("TARGET").unwrap())
    }

    #[test]
    fn test_session_config_defaults() {
        let (sender, target) = ids();
        let config = SessionConfig::new(sender, target, "FIX.4.4", Role::Acceptor);

        assert_eq!(config.sender_comp_id.as_str(), "SENDER");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.test_request_grace, Duration::from_secs(30));
        assert_eq!(config.logon_timeout, Duration::from_secs(10));
        assert_eq!(config.logout_timeout, Duration::from_secs(2));
        assert!((config.test_request_margin - 0.5).abs() < f64::EPSILON);
        assert!(config.validate_comp_ids);
        assert_eq!(config.session_id().to_string(), "FIX.4.4:SENDER->TARGET");
    }

    #[test]
    fn test_session_config_builder() {
        let (sender, target) = ids();
        let config = SessionConfigBuilder::new()
            .sender_comp_id(sender)
            .target_comp_id(target)
            .begin_string("FIX.4.2")
            .role(Role::Acceptor)
            .heartbeat_interval(Duration::from_secs(60))
            .reset_on_logon(true)
            .build()
            .unwrap();

        assert_eq!(config.begin_string, "FIX.4.2");
        assert_eq!(config.role, Role::Acceptor);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(config.test_request_grace, Duration::from_secs(60));
        assert!(config.reset_on_logon);
    }

    #[test]
    fn test_builder_rejects_invalid_settings() {
        let (sender, target) = ids();
        assert!(matches!(
            SessionConfigBuilder::new().target_comp_id(target).build(),
            Err(SessionError::Configuration(_))
        ));

        let zero_interval = SessionConfigBuilder::new()
            .sender_comp_id(sender)
            .target_comp_id(target)
            .heartbeat_interval(Duration::ZERO)
            .build();
        assert!(zero_interval.is_err());

        let week = SessionConfigBuilder::new()
            .sender_comp_id(sender)
            .target_comp_id(target)
            .heartbeat_interval(MAX_HEARTBEAT_INTERVAL * 7)
            .build();
        assert!(week.is_err());

        for margin in [0.0, 1.5, -0.1] {
            let result = SessionConfigBuilder::new()
                .sender_comp_id(sender)
                .target_comp_id(target)
                .test_request_margin(margin)
                .build();
            assert!(result.is_err(), "margin {margin}");
        }

        let empty = SessionConfigBuilder::new()
            .sender_comp_id(CompId::new("").unwrap())
            .target_comp_id(target)
            .build();
        assert!(empty.is_err());
    }
}
