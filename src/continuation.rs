//! Context-aware continuations.
//!
//! A [`ContextFuture`] carries the [`View`](crate::execution::View) and
//! [`ContextOptions`](crate::execution::ContextOptions) that were current when
//! it was created. Each reaction attached to it later runs through
//! `run_in_context` on that view, so segments see asynchronous steps the same
//! way they see synchronous calls.

mod combinators;
pub mod future;
pub mod resolver;

pub use future::ContextFuture;
pub use resolver::Resolver;
