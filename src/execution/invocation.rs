//! Invocation chain.
//!
//! One call is represented as a slice of links, one per registered kind in
//! registration order, plus the raw target. Node 0 is the raw call; node `k`
//! is the composite bound to `links[k - 1]`, whose segment receives node
//! `k - 1` as its inner invocation. The last-registered kind is therefore the
//! outermost interceptor.

use crate::error::ContextError;
use crate::execution::segment::SegmentRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;

/// Descriptive metadata about the call being made, visible to every segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallScope {
    /// The receiver the call is made on, when there is one.
    pub receiver: Option<String>,
    /// Name of the operation being invoked.
    pub operation: Option<String>,
    /// Arguments of the original call, for segments that inspect them.
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl CallScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(name: impl Into<String>) -> Self {
        Self {
            operation: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn with_argument(mut self, argument: Value) -> Self {
        self.arguments.push(argument);
        self
    }

    /// `receiver.operation`, `operation`, or `<anonymous>`.
    pub fn label(&self) -> String {
        match (&self.receiver, &self.operation) {
            (Some(r), Some(o)) => format!("{}.{}", r, o),
            (None, Some(o)) => o.clone(),
            (Some(r), None) => r.clone(),
            (None, None) => "<anonymous>".to_string(),
        }
    }
}

/// A segment bound to its position in the chain.
pub(crate) struct Link {
    pub(crate) kind: String,
    pub(crate) segment: SegmentRef,
}

type RawCall<'a> = RefCell<dyn FnMut() -> Result<(), ContextError> + 'a>;

/// Handle to one node of the chain, passed to [`ContextSegment::on_context`].
///
/// [`ContextSegment::on_context`]: crate::execution::segment::ContextSegment::on_context
pub struct Invocation<'a> {
    links: &'a [Link],
    depth: usize,
    scope: &'a CallScope,
    call: &'a RawCall<'a>,
}

impl<'a> Invocation<'a> {
    /// Run this node. Safe to call repeatedly; every call re-enters the
    /// already-pushed frame.
    pub fn invoke(&self) -> Result<(), ContextError> {
        if self.depth == 0 {
            let mut call = self.call.try_borrow_mut().map_err(|_| {
                ContextError::Target(anyhow::anyhow!(
                    "re-entrant invocation of {}",
                    self.scope.label()
                ))
            })?;
            return (&mut *call)();
        }
        let link = &self.links[self.depth - 1];
        let inner = Invocation {
            links: self.links,
            depth: self.depth - 1,
            scope: self.scope,
            call: self.call,
        };
        link.segment.on_context(&inner)
    }

    pub fn scope(&self) -> &CallScope {
        self.scope
    }

    /// Kind of the segment that will run when this node is invoked, or
    /// `None` for the raw call.
    pub fn next_kind(&self) -> Option<&str> {
        self.depth
            .checked_sub(1)
            .map(|i| self.links[i].kind.as_str())
    }

    /// Number of segments between this node and the raw call.
    pub fn remaining(&self) -> usize {
        self.depth
    }
}

/// Run `target` through `links`, returning its value.
pub(crate) fn run_chain<T, F>(
    links: &[Link],
    scope: &CallScope,
    target: &mut F,
) -> Result<T, ContextError>
where
    F: FnMut() -> anyhow::Result<T>,
{
    let mut slot: Option<T> = None;
    let outcome = {
        let call = RefCell::new(|| -> Result<(), ContextError> {
            let value = target().map_err(ContextError::from)?;
            slot = Some(value);
            Ok(())
        });
        let root = Invocation {
            links,
            depth: links.len(),
            scope,
            call: &call,
        };
        root.invoke()
    };
    outcome?;
    slot.ok_or(ContextError::NotInvoked)
}
