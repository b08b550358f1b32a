//! Service facade: registration and lane views over one shared model.

use crate::config::ContextConfig;
use crate::error::ContextError;
use crate::execution::model::ExecutionContextModel;
use crate::execution::registry::{registration_fn, SegmentRegistration};
use crate::execution::segment::SegmentRef;
use crate::execution::view::View;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::panic::Location;
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<ExecutionContextService> = OnceLock::new();

thread_local! {
    static BOUND_LANE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Registers segment kinds and hands out [`View`]s onto named lanes.
pub struct ExecutionContextService {
    model: Arc<ExecutionContextModel>,
    continuation_lane: String,
}

impl Default for ExecutionContextService {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}

impl ExecutionContextService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            model: Arc::new(ExecutionContextModel::new(
                config.default_lane.clone(),
                config.fork_separator.clone(),
            )),
            continuation_lane: config.continuation_lane.clone(),
        }
    }

    /// Process-wide instance with default configuration.
    pub fn global() -> &'static ExecutionContextService {
        GLOBAL.get_or_init(ExecutionContextService::default)
    }

    pub fn model(&self) -> &Arc<ExecutionContextModel> {
        &self.model
    }

    #[track_caller]
    pub fn register(&self, registration: Arc<dyn SegmentRegistration>) -> Result<(), ContextError> {
        self.model.register_at(registration, Location::caller())
    }

    /// Register `kind` with a closure building its root segment.
    #[track_caller]
    pub fn register_fn<F>(&self, kind: impl Into<String>, factory: F) -> Result<(), ContextError>
    where
        F: Fn() -> SegmentRef + Send + Sync + 'static,
    {
        self.model
            .register_at(registration_fn(kind, factory), Location::caller())
    }

    pub fn kinds(&self) -> Vec<String> {
        self.model.kinds()
    }

    pub fn for_lane(&self, lane: impl AsRef<str>) -> View {
        View::new(lane, self.model.clone())
    }

    /// Lane bound to the calling thread, or the default lane.
    pub fn current_lane_name(&self) -> String {
        BOUND_LANE
            .with(|bound| bound.borrow().clone())
            .unwrap_or_else(|| self.model.default_lane().to_string())
    }

    pub fn for_current_lane(&self) -> View {
        self.for_lane(self.current_lane_name())
    }

    /// Lane used by continuations that were not given one explicitly.
    pub fn continuation_lane(&self) -> &str {
        &self.continuation_lane
    }

    pub fn for_continuations(&self) -> View {
        self.for_lane(&self.continuation_lane)
    }

    pub fn fork_lane_as(&self, old_lane: &str, new_lane: &str) -> Result<View, ContextError> {
        let name = self.model.fork_lane(old_lane, Some(new_lane))?;
        Ok(self.for_lane(name))
    }

    pub fn fork_lane_unique(&self, old_lane: &str) -> Result<View, ContextError> {
        let name = self.model.fork_lane(old_lane, None)?;
        Ok(self.for_lane(name))
    }

    pub fn release_lane(&self, lane: &str) -> bool {
        self.model.release_lane(lane)
    }

    pub fn lane_names(&self) -> Vec<String> {
        self.model.lane_names()
    }

    pub fn lane_depth(&self, lane: &str) -> usize {
        self.model.lane_depth(lane)
    }

    /// Make `lane` the current lane of the calling thread until the guard drops.
    pub fn bind_current_thread(lane: impl Into<String>) -> LaneBinding {
        let previous = BOUND_LANE.with(|bound| bound.borrow_mut().replace(lane.into()));
        LaneBinding {
            previous,
            _not_send: PhantomData,
        }
    }
}

/// Restores the thread's previous lane binding on drop.
#[must_use = "the binding is undone when this guard is dropped"]
pub struct LaneBinding {
    previous: Option<String>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for LaneBinding {
    fn drop(&mut self) {
        let previous = self.previous.take();
        BOUND_LANE.with(|bound| *bound.borrow_mut() = previous);
    }
}
