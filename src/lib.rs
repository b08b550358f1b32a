//! Runcontext: Segmented Execution Context Propagation
//!
//! Independent subsystems (security, retry, tracing, ...) each own one
//! segment of a lane's execution context. Code run through a [`View`] is
//! intercepted by every registered segment, and [`ContextFuture`] carries the
//! same context into asynchronous continuations.

pub mod config;
pub mod continuation;
pub mod error;
pub mod execution;
pub mod logging;
pub mod policy;

pub use config::{ConfigLoader, ContextConfig};
pub use continuation::{ContextFuture, Resolver};
pub use error::ContextError;
pub use execution::{
    CallScope, ContextOptions, ContextSegment, ExecutionContextService, Invocation, SegmentRef,
    View,
};
