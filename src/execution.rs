//! Segmented execution contexts.
//!
//! Independent subsystems register a segment *kind* with a root factory.
//! Code then runs through a [`View`] onto a named lane:
//!
//! 1. `run_in_context` derives a child segment for every kind named in the
//!    call's [`ContextOptions`] and pushes them as one frame on the lane.
//! 2. Every registered kind, in registration order, wraps the call; the last
//!    registered kind is the outermost interceptor.
//! 3. The frame is popped when the call returns, fails or unwinds.
//!
//! Kinds not named in a call inherit the nearest frame's segment, falling
//! back to a root instance shared by all lanes.

pub mod invocation;
pub mod model;
pub mod options;
pub mod registry;
pub mod segment;
pub mod service;
pub mod stack;
pub mod view;

pub use invocation::{CallScope, Invocation};
pub use model::{ExecutionContextModel, DEFAULT_FORK_SEPARATOR, DEFAULT_LANE};
pub use options::ContextOptions;
pub use registry::{registration_fn, SegmentRegistration, SegmentRegistry};
pub use segment::{
    downcast_segment, parse_options, ContextSegment, PostExecute, PostExecuteHook, PreExecute,
    PreExecuteHook, SegmentRef,
};
pub use service::{ExecutionContextService, LaneBinding};
pub use stack::{ContextStack, Frame, FrameToken};
pub use view::View;
