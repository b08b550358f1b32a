//! Error types for the execution context engine.

use chrono::{DateTime, Utc};
use std::panic::Location;
use thiserror::Error;

/// Where and when a segment kind was first registered.
///
/// Carried by [`ContextError::AlreadyRegistered`] so the duplicate call can be
/// traced back to the original registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationSite {
    pub location: &'static Location<'static>,
    pub registered_at: DateTime<Utc>,
}

impl std::fmt::Display for RegistrationSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} at {}",
            self.location.file(),
            self.location.line(),
            self.registered_at.to_rfc3339()
        )
    }
}

/// Errors raised by the registry, the lane stacks and the invocation chain.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Execution context kind '{kind}' is already registered (first registered at {original})")]
    AlreadyRegistered {
        kind: String,
        original: RegistrationSite,
    },

    #[error("No execution context kind '{0}' registered")]
    NotRegistered(String),

    #[error("Added multiple segments into the current execution context with kind '{0}'")]
    DuplicateSegment(String),

    #[error("No active execution context for lane '{lane}'")]
    StackEmpty { lane: String },

    #[error("Frame mismatch on lane '{lane}': exiting frame {given}, but the top frame is {top}")]
    FrameMismatch { lane: String, given: u64, top: u64 },

    #[error("Lane '{lane}' has live frames on another thread")]
    LaneBusy { lane: String },

    #[error("No such lane: {0}")]
    NoSuchLane(String),

    #[error("Lane already exists: {0}")]
    DuplicateLane(String),

    #[error("Segment '{kind}' refused the invocation: {reason}")]
    Refused { kind: String, reason: String },

    #[error("Invalid options for segment '{kind}': {reason}")]
    InvalidOptions { kind: String, reason: String },

    #[error("Invocation failed: {0}")]
    Target(#[source] anyhow::Error),

    #[error("The invocation chain completed without a result from its target")]
    NotInvoked,

    #[error("Continuation was dropped before it settled")]
    Abandoned,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ContextError {
    /// True for the registry/stack/lane programmer errors of the core taxonomy.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ContextError::AlreadyRegistered { .. }
                | ContextError::NotRegistered(_)
                | ContextError::DuplicateSegment(_)
                | ContextError::StackEmpty { .. }
                | ContextError::FrameMismatch { .. }
                | ContextError::LaneBusy { .. }
                | ContextError::NoSuchLane(_)
                | ContextError::DuplicateLane(_)
        )
    }

    /// The failure raised by the target itself, if this is one.
    pub fn target_error(&self) -> Option<&anyhow::Error> {
        match self {
            ContextError::Target(err) => Some(err),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ContextError {
    fn from(err: anyhow::Error) -> Self {
        // Context errors that travelled through user code as anyhow come back unchanged.
        match err.downcast::<ContextError>() {
            Ok(inner) => inner,
            Err(err) => ContextError::Target(err),
        }
    }
}

impl From<config::ConfigError> for ContextError {
    fn from(err: config::ConfigError) -> Self {
        ContextError::Config(err.to_string())
    }
}
