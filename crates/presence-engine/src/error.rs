use thiserror::Error;

/// Presence engine errors
///
/// Every variant is returned before the agent's presence is touched, so a
/// caller that receives one of these can assume the store still holds the
/// state it held before the call. `RemoteCommittedLocalStale` is the one
/// exception on the PBX side: the command was carried out there and must not
/// be resubmitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresenceError {
    /// Channel identifier is not in the registry
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// The state machine does not allow the requested move
    #[error("Invalid transition for agent {agent}: {from} cannot accept {requested}")]
    InvalidTransition {
        agent: String,
        from: String,
        requested: String,
    },

    /// A local intent lost the race against the telephony system
    #[error("Stale intent for agent {agent}: telephony moved the agent to {current}, re-read presence and resubmit")]
    StaleIntent { agent: String, current: String },

    /// Optimistic concurrency check failed
    #[error("Stale write for agent {agent}: expected sequence {expected}, store is at {current}")]
    StaleWrite {
        agent: String,
        expected: u64,
        current: u64,
    },

    /// Pause code outside the fixed set
    #[error("Unknown reason code: {0}")]
    UnknownReasonCode(String),

    /// Telephony call did not return in time
    #[error("Telephony operation '{operation}' timed out after {after_ms}ms")]
    RemoteTimeout { operation: String, after_ms: u64 },

    /// Telephony system explicitly refused the command
    #[error("Telephony rejected '{operation}': {reason}")]
    RemoteRejected { operation: String, reason: String },

    /// The PBX carried out the command but presence moved before the commit
    #[error("Telephony recorded {recorded} for agent {agent} but presence moved to {current} before the local commit ({cause})")]
    RemoteCommittedLocalStale {
        agent: String,
        operation: String,
        recorded: String,
        current: String,
        cause: String,
    },

    /// Transfer target is not ready on the call's channel category
    #[error("Transfer target {target} unavailable: {reason}")]
    TargetUnavailable { target: String, reason: String },

    /// Agent is not enrolled
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// Agent is already enrolled
    #[error("Agent already enrolled: {0}")]
    AgentAlreadyEnrolled(String),

    /// Agent has been soft-disabled
    #[error("Agent disabled: {0}")]
    AgentDisabled(String),

    /// Disposition code is empty or malformed
    #[error("Invalid disposition: {0}")]
    InvalidDisposition(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownChannel,
    InvalidTransition,
    StaleIntent,
    StaleWrite,
    UnknownReasonCode,
    RemoteTimeout,
    RemoteRejected,
    RemoteCommittedLocalStale,
    TargetUnavailable,
    UnknownAgent,
    AgentAlreadyEnrolled,
    AgentDisabled,
    InvalidDisposition,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownChannel => "unknown_channel",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::StaleIntent => "stale_intent",
            ErrorKind::StaleWrite => "stale_write",
            ErrorKind::UnknownReasonCode => "unknown_reason_code",
            ErrorKind::RemoteTimeout => "remote_timeout",
            ErrorKind::RemoteRejected => "remote_rejected",
            ErrorKind::RemoteCommittedLocalStale => "remote_committed_local_stale",
            ErrorKind::TargetUnavailable => "target_unavailable",
            ErrorKind::UnknownAgent => "unknown_agent",
            ErrorKind::AgentAlreadyEnrolled => "agent_already_enrolled",
            ErrorKind::AgentDisabled => "agent_disabled",
            ErrorKind::InvalidDisposition => "invalid_disposition",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PresenceError {
    /// Create a new InvalidTransition error
    pub fn invalid_transition<A, F, R>(agent: A, from: F, requested: R) -> Self
    where
        A: Into<String>,
        F: Into<String>,
        R: Into<String>,
    {
        Self::InvalidTransition {
            agent: agent.into(),
            from: from.into(),
            requested: requested.into(),
        }
    }

    /// Create a new StaleWrite error
    pub fn stale_write<A: Into<String>>(agent: A, expected: u64, current: u64) -> Self {
        Self::StaleWrite {
            agent: agent.into(),
            expected,
            current,
        }
    }

    /// Create a new RemoteRejected error
    pub fn remote_rejected<O: Into<String>, R: Into<String>>(operation: O, reason: R) -> Self {
        Self::RemoteRejected {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a new TargetUnavailable error
    pub fn target_unavailable<T: Into<String>, R: Into<String>>(target: T, reason: R) -> Self {
        Self::TargetUnavailable {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PresenceError::UnknownChannel(_) => ErrorKind::UnknownChannel,
            PresenceError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            PresenceError::StaleIntent { .. } => ErrorKind::StaleIntent,
            PresenceError::StaleWrite { .. } => ErrorKind::StaleWrite,
            PresenceError::UnknownReasonCode(_) => ErrorKind::UnknownReasonCode,
            PresenceError::RemoteTimeout { .. } => ErrorKind::RemoteTimeout,
            PresenceError::RemoteRejected { .. } => ErrorKind::RemoteRejected,
            PresenceError::RemoteCommittedLocalStale { .. } => ErrorKind::RemoteCommittedLocalStale,
            PresenceError::TargetUnavailable { .. } => ErrorKind::TargetUnavailable,
            PresenceError::UnknownAgent(_) => ErrorKind::UnknownAgent,
            PresenceError::AgentAlreadyEnrolled(_) => ErrorKind::AgentAlreadyEnrolled,
            PresenceError::AgentDisabled(_) => ErrorKind::AgentDisabled,
            PresenceError::InvalidDisposition(_) => ErrorKind::InvalidDisposition,
            PresenceError::Config(_) => ErrorKind::Config,
            PresenceError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may re-read presence and resubmit.
    ///
    /// The engine itself never retries on the caller's behalf.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StaleIntent | ErrorKind::StaleWrite | ErrorKind::RemoteTimeout
        )
    }
}

/// Result type for presence operations
pub type Result<T> = std::result::Result<T, PresenceError>;
