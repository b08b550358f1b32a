//! Ready-made segment kinds.
//!
//! Each submodule exports its `KIND` and a `registration()` for
//! [`ExecutionContextService::register`](crate::execution::ExecutionContextService::register).

pub mod retry;
pub mod security;
pub mod trace;

pub use retry::Retry;
pub use security::{Area, Security, SecurityRules};
pub use trace::Trace;
