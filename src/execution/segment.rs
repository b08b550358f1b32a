//! Context segment contract and the pre/post execution helpers.

use crate::error::ContextError;
use crate::execution::invocation::{CallScope, Invocation};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Shared handle to a segment instance.
pub type SegmentRef = Arc<dyn ContextSegment>;

/// Immutable, per-kind state attached to a lane.
///
/// `create_child` must not mutate `self`; it returns the state that applies
/// inside a nested `run_in_context` call. Returning a clone of `self` is fine
/// when aliasing is harmless.
pub trait ContextSegment: Send + Sync + 'static {
    /// Derive the segment that is active inside a nested call configured with `options`.
    fn create_child(&self, options: &Value) -> Result<SegmentRef, ContextError>;

    /// Intercept an invocation. The segment decides if, when and how many
    /// times `invocation.invoke()` runs.
    fn on_context(&self, invocation: &Invocation<'_>) -> Result<(), ContextError>;

    fn as_any(&self) -> &dyn Any;
}

/// Downcast a segment handle to its concrete type.
pub fn downcast_segment<S: ContextSegment>(segment: &SegmentRef) -> Option<&S> {
    segment.as_any().downcast_ref::<S>()
}

/// Precondition logic that runs before the rest of the chain.
pub trait PreExecuteHook: Send + Sync + Sized + 'static {
    fn create_child(&self, options: &Value) -> Result<Self, ContextError>;

    fn before_invocation(&self, scope: &CallScope) -> Result<(), ContextError>;
}

/// Logic that runs after the rest of the chain and may rewrite its outcome.
pub trait PostExecuteHook: Send + Sync + Sized + 'static {
    fn create_child(&self, options: &Value) -> Result<Self, ContextError>;

    fn after_invocation(
        &self,
        scope: &CallScope,
        outcome: Result<(), ContextError>,
    ) -> Result<(), ContextError>;
}

/// Adapts a [`PreExecuteHook`] into a full segment.
pub struct PreExecute<H>(pub H);

impl<H: PreExecuteHook> ContextSegment for PreExecute<H> {
    fn create_child(&self, options: &Value) -> Result<SegmentRef, ContextError> {
        Ok(Arc::new(PreExecute(self.0.create_child(options)?)))
    }

    fn on_context(&self, invocation: &Invocation<'_>) -> Result<(), ContextError> {
        self.0.before_invocation(invocation.scope())?;
        invocation.invoke()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<H> PreExecute<H> {
    pub fn hook(&self) -> &H {
        &self.0
    }
}

/// Adapts a [`PostExecuteHook`] into a full segment.
pub struct PostExecute<H>(pub H);

impl<H: PostExecuteHook> ContextSegment for PostExecute<H> {
    fn create_child(&self, options: &Value) -> Result<SegmentRef, ContextError> {
        Ok(Arc::new(PostExecute(self.0.create_child(options)?)))
    }

    fn on_context(&self, invocation: &Invocation<'_>) -> Result<(), ContextError> {
        let outcome = invocation.invoke();
        self.0.after_invocation(invocation.scope(), outcome)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<H> PostExecute<H> {
    pub fn hook(&self) -> &H {
        &self.0
    }
}

/// Parse a segment's option object into a typed options struct.
///
/// `null` is treated as an empty object so callers can pass `Value::Null`
/// when they only want to inherit.
pub fn parse_options<T>(kind: &str, options: &Value) -> Result<T, ContextError>
where
    T: serde::de::DeserializeOwned,
{
    let options = match options {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(options).map_err(|e| ContextError::InvalidOptions {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}
