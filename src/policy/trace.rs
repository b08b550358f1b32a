//! Tracing policy: wraps each invocation in a span named by the call path.

use crate::error::ContextError;
use crate::execution::invocation::Invocation;
use crate::execution::registry::{registration_fn, SegmentRegistration};
use crate::execution::segment::{parse_options, ContextSegment, SegmentRef};
use serde::Deserialize;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, debug_span};

pub const KIND: &str = "trace";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TraceOptions {
    #[serde(default)]
    span: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    path: String,
}

impl Trace {
    /// `/`-joined span names from the root; empty at the root.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ContextSegment for Trace {
    fn create_child(&self, options: &Value) -> Result<SegmentRef, ContextError> {
        let options: TraceOptions = parse_options(KIND, options)?;
        let path = match options.span {
            Some(name) if name.contains('/') => {
                return Err(ContextError::InvalidOptions {
                    kind: KIND.to_string(),
                    reason: format!("span name '{}' must not contain '/'", name),
                })
            }
            Some(name) => format!("{}/{}", self.path, name),
            None => self.path.clone(),
        };
        Ok(Arc::new(Trace { path }))
    }

    fn on_context(&self, invocation: &Invocation<'_>) -> Result<(), ContextError> {
        let span = debug_span!("context", path = %self.path, call = %invocation.scope().label());
        let _entered = span.enter();
        debug!("Entering invocation");
        let outcome = invocation.invoke();
        match &outcome {
            Ok(()) => debug!("Invocation completed"),
            Err(err) => debug!(error = %err, "Invocation failed"),
        }
        outcome
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn registration() -> Arc<dyn SegmentRegistration> {
    registration_fn(KIND, || Arc::new(Trace::default()))
}
