//! Retry policy: re-invokes the rest of the chain on failure.

use crate::error::ContextError;
use crate::execution::invocation::Invocation;
use crate::execution::registry::{registration_fn, SegmentRegistration};
use crate::execution::segment::{parse_options, ContextSegment, SegmentRef};
use serde::Deserialize;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

pub const KIND: &str = "retry";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryOptions {
    #[serde(default)]
    max_attempts: Option<u32>,
}

/// Allows up to `max_attempts` runs of the inner chain per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retry {
    max_attempts: u32,
}

impl Default for Retry {
    fn default() -> Self {
        Self { max_attempts: 1 }
    }
}

impl Retry {
    pub fn new(max_attempts: u32) -> Result<Self, ContextError> {
        if max_attempts == 0 {
            return Err(ContextError::InvalidOptions {
                kind: KIND.to_string(),
                reason: "max_attempts must be at least 1".to_string(),
            });
        }
        Ok(Self { max_attempts })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Refusals and usage errors fail the same way every time.
fn is_retryable(err: &ContextError) -> bool {
    !matches!(err, ContextError::Refused { .. }) && !err.is_usage_error()
}

impl ContextSegment for Retry {
    fn create_child(&self, options: &Value) -> Result<SegmentRef, ContextError> {
        let options: RetryOptions = parse_options(KIND, options)?;
        let child = match options.max_attempts {
            Some(n) => Retry::new(n)?,
            None => self.clone(),
        };
        Ok(Arc::new(child))
    }

    fn on_context(&self, invocation: &Invocation<'_>) -> Result<(), ContextError> {
        let mut attempt = 1;
        loop {
            match invocation.invoke() {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.max_attempts && is_retryable(&err) => {
                    debug!(
                        call = %invocation.scope().label(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "Retrying failed invocation"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Registration whose root allows a single attempt.
pub fn registration() -> Arc<dyn SegmentRegistration> {
    registration_fn(KIND, || Arc::new(Retry::default()))
}
