//! Lane handle: the entry point for running code inside a context.

use crate::error::ContextError;
use crate::execution::invocation::{run_chain, CallScope, Link};
use crate::execution::model::ExecutionContextModel;
use crate::execution::options::ContextOptions;
use crate::execution::segment::{downcast_segment, ContextSegment, SegmentRef};
use crate::execution::stack::FrameToken;
use std::sync::Arc;
use tracing::warn;

/// A named lane bound to a model. Cheap to clone and safe to move between threads.
///
/// A lane is used by one thread at a time: while a thread is inside
/// [`run_in_context`](Self::run_in_context) on a lane, calls from other
/// threads on the same lane fail with [`ContextError::LaneBusy`] before
/// anything runs. Give each thread or task its own lane with
/// [`fork`](Self::fork).
#[derive(Clone)]
pub struct View {
    lane: Arc<str>,
    model: Arc<ExecutionContextModel>,
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View").field("lane", &self.lane).finish()
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.lane == other.lane && Arc::ptr_eq(&self.model, &other.model)
    }
}

impl Eq for View {}

impl View {
    pub fn new(lane: impl AsRef<str>, model: Arc<ExecutionContextModel>) -> Self {
        Self {
            lane: Arc::from(lane.as_ref()),
            model,
        }
    }

    pub fn lane(&self) -> &str {
        &self.lane
    }

    pub fn model(&self) -> &Arc<ExecutionContextModel> {
        &self.model
    }

    /// Segment of `kind` active on this lane right now.
    pub fn active_segment(&self, kind: &str) -> Result<SegmentRef, ContextError> {
        self.model.active_segment(&self.lane, kind)
    }

    /// Inspect the active segment of `kind` as `S`. `Ok(None)` when it is another type.
    pub fn active_segment_as<S, R>(
        &self,
        kind: &str,
        f: impl FnOnce(&S) -> R,
    ) -> Result<Option<R>, ContextError>
    where
        S: ContextSegment,
    {
        let segment = self.active_segment(kind)?;
        Ok(downcast_segment::<S>(&segment).map(f))
    }

    /// Current stack depth of this lane.
    pub fn depth(&self) -> usize {
        self.model.lane_depth(&self.lane)
    }

    /// Fork this lane. See [`ExecutionContextModel::fork_lane`].
    pub fn fork(&self, new_lane: Option<&str>) -> Result<View, ContextError> {
        let name = self.model.fork_lane(&self.lane, new_lane)?;
        Ok(View::new(name, self.model.clone()))
    }

    /// Run `target` with empty call metadata.
    pub fn run<T, F>(&self, options: &ContextOptions, target: F) -> Result<T, ContextError>
    where
        F: FnMut() -> anyhow::Result<T>,
    {
        self.run_in_context(options, CallScope::default(), target)
    }

    /// Enter `options`, run `target` through every registered segment, exit.
    ///
    /// Every registered kind intercepts the call, not only the ones named in
    /// `options`. Exactly one frame is pushed and popped, also when the
    /// chain fails or panics. A segment may invoke `target` more than once.
    pub fn run_in_context<T, F>(
        &self,
        options: &ContextOptions,
        scope: CallScope,
        mut target: F,
    ) -> Result<T, ContextError>
    where
        F: FnMut() -> anyhow::Result<T>,
    {
        let token = self.model.enter(&self.lane, options)?;
        let guard = FrameGuard {
            view: self,
            token: Some(token),
        };
        let outcome = self
            .links()
            .and_then(|links| run_chain(&links, &scope, &mut target));
        let exited = guard.exit();
        match (outcome, exited) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(err),
        }
    }

    fn links(&self) -> Result<Vec<Link>, ContextError> {
        self.model
            .kinds()
            .into_iter()
            .map(|kind| {
                let segment = self.active_segment(&kind)?;
                Ok(Link { kind, segment })
            })
            .collect()
    }
}

/// Pops the frame on every path out of `run_in_context`, unwinding included.
struct FrameGuard<'v> {
    view: &'v View,
    token: Option<FrameToken>,
}

impl FrameGuard<'_> {
    fn exit(mut self) -> Result<(), ContextError> {
        match self.token.take() {
            Some(token) => self.view.model.exit(&self.view.lane, &token),
            None => Ok(()),
        }
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(err) = self.view.model.exit(&self.view.lane, &token) {
                warn!(lane = %self.view.lane, error = %err, "Failed to exit frame while unwinding");
            }
        }
    }
}
