//! Shared execution context model: registry, root cache and lane table.
//!
//! Locks are never held while segment code runs (`create_child`,
//! `on_context`), so segments may call back into the model freely.
//! Root factories run under the registry read lock and must not register.

use crate::error::ContextError;
use crate::execution::options::ContextOptions;
use crate::execution::registry::{SegmentRegistration, SegmentRegistry};
use crate::execution::segment::SegmentRef;
use crate::execution::stack::{ContextStack, Frame, FrameToken};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace, warn};

/// Lane used when the caller names none.
pub const DEFAULT_LANE: &str = "default";

/// Separator between a lane name and its fork counter.
pub const DEFAULT_FORK_SEPARATOR: &str = ".";

pub struct ExecutionContextModel {
    registry: RwLock<SegmentRegistry>,
    // Filled lazily on first access per kind, then read-only.
    roots: RwLock<HashMap<String, SegmentRef>>,
    lanes: Mutex<HashMap<String, ContextStack>>,
    default_lane: String,
    fork_separator: String,
}

impl Default for ExecutionContextModel {
    fn default() -> Self {
        Self::new(DEFAULT_LANE, DEFAULT_FORK_SEPARATOR)
    }
}

impl ExecutionContextModel {
    pub fn new(default_lane: impl Into<String>, fork_separator: impl Into<String>) -> Self {
        Self {
            registry: RwLock::new(SegmentRegistry::new()),
            roots: RwLock::new(HashMap::new()),
            lanes: Mutex::new(HashMap::new()),
            default_lane: default_lane.into(),
            fork_separator: fork_separator.into(),
        }
    }

    pub fn default_lane(&self) -> &str {
        &self.default_lane
    }

    #[track_caller]
    pub fn register(&self, registration: Arc<dyn SegmentRegistration>) -> Result<(), ContextError> {
        self.register_at(registration, Location::caller())
    }

    pub(crate) fn register_at(
        &self,
        registration: Arc<dyn SegmentRegistration>,
        location: &'static Location<'static>,
    ) -> Result<(), ContextError> {
        self.registry.write().register_at(registration, location)
    }

    /// Registered kinds in registration order.
    pub fn kinds(&self) -> Vec<String> {
        self.registry.read().kinds().to_vec()
    }

    /// Segment of `kind` currently active on `lane`.
    ///
    /// Falls back to the shared root, creating it on first access. The root
    /// is shared by every lane and must not be treated as lane state.
    pub fn active_segment(&self, lane: &str, kind: &str) -> Result<SegmentRef, ContextError> {
        let found = self
            .lanes
            .lock()
            .get(lane)
            .and_then(|stack| stack.lookup(kind))
            .cloned();
        match found {
            Some(segment) => Ok(segment),
            None => self.root_segment(kind),
        }
    }

    /// Shared root of `kind`, created on first use.
    pub fn root_segment(&self, kind: &str) -> Result<SegmentRef, ContextError> {
        if let Some(root) = self.roots.read().get(kind) {
            return Ok(root.clone());
        }
        let created = self.registry.read().create_initial_context(kind)?;
        // Racing lanes may both build a root; the first one stored wins.
        let mut roots = self.roots.write();
        let root = roots.entry(kind.to_string()).or_insert_with(|| {
            debug!(kind = %kind, "Created root execution context segment");
            created
        });
        Ok(root.clone())
    }

    /// Build and push a frame with a child of every kind named in `options`.
    ///
    /// A lane has one owner thread at a time. Entering a lane whose live
    /// frames belong to another thread fails with
    /// [`ContextError::LaneBusy`] and pushes nothing.
    pub fn enter(&self, lane: &str, options: &ContextOptions) -> Result<FrameToken, ContextError> {
        self.check_owner(lane)?;
        let mut frame = Frame::with_capacity(options.len());
        for (kind, child_options) in options.iter() {
            if frame.contains_key(kind) {
                return Err(ContextError::DuplicateSegment(kind.to_string()));
            }
            let parent = self.active_segment(lane, kind)?;
            frame.insert(kind.to_string(), parent.create_child(child_options)?);
        }

        let mut lanes = self.lanes.lock();
        let stack = lanes
            .entry(lane.to_string())
            .or_insert_with(|| ContextStack::new(lane));
        if stack.owner().is_some_and(|owner| owner != thread::current().id()) {
            return Err(ContextError::LaneBusy {
                lane: lane.to_string(),
            });
        }
        let token = stack.enter(frame);
        trace!(
            lane = %lane,
            frame = token.id(),
            depth = stack.depth(),
            kinds = ?options.kinds().collect::<Vec<_>>(),
            "Entered execution context"
        );
        Ok(token)
    }

    fn check_owner(&self, lane: &str) -> Result<(), ContextError> {
        let lanes = self.lanes.lock();
        match lanes.get(lane).and_then(ContextStack::owner) {
            Some(owner) if owner != thread::current().id() => Err(ContextError::LaneBusy {
                lane: lane.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Pop the frame identified by `token`. An emptied lane is dropped from the table.
    ///
    /// An out-of-order exit still fails, but the token's frame is removed
    /// so the lane does not keep serving its segments.
    pub fn exit(&self, lane: &str, token: &FrameToken) -> Result<(), ContextError> {
        let mut lanes = self.lanes.lock();
        let stack = lanes.get_mut(lane).ok_or_else(|| ContextError::StackEmpty {
            lane: lane.to_string(),
        })?;
        let outcome = stack.exit(token);
        match &outcome {
            Ok(()) => trace!(
                lane = %lane,
                frame = token.id(),
                depth = stack.depth(),
                "Exited execution context"
            ),
            Err(err) => {
                let discarded = stack.discard(token);
                warn!(
                    lane = %lane,
                    frame = token.id(),
                    discarded,
                    error = %err,
                    "Execution context exit rejected"
                );
            }
        }
        if stack.is_empty() {
            lanes.remove(lane);
            debug!(lane = %lane, "Reclaimed empty lane");
        }
        outcome
    }

    /// Copy `old_lane`'s stack into a new lane and return the new lane's name.
    ///
    /// Without a requested name the new lane is `old_lane + separator + N`
    /// for the smallest free `N`. A fork taken from a thread that does not
    /// own `old_lane` copies only its resting frames.
    pub fn fork_lane(&self, old_lane: &str, new_lane: Option<&str>) -> Result<String, ContextError> {
        let mut lanes = self.lanes.lock();
        if !lanes.contains_key(old_lane) && old_lane != self.default_lane {
            return Err(ContextError::NoSuchLane(old_lane.to_string()));
        }
        let name = match new_lane {
            Some(name) => {
                if lanes.contains_key(name) {
                    return Err(ContextError::DuplicateLane(name.to_string()));
                }
                name.to_string()
            }
            None => (0u64..)
                .map(|i| format!("{}{}{}", old_lane, self.fork_separator, i))
                .find(|candidate| !lanes.contains_key(candidate))
                .ok_or_else(|| ContextError::DuplicateLane(old_lane.to_string()))?,
        };
        let current = thread::current().id();
        let forked = lanes
            .get(old_lane)
            .map(|stack| match stack.owner() {
                Some(owner) if owner != current => stack.fork_resting(&name),
                _ => stack.fork(&name),
            })
            .unwrap_or_else(|| ContextStack::new(&name));
        debug!(from = %old_lane, to = %name, depth = forked.depth(), "Forked lane");
        lanes.insert(name.clone(), forked);
        Ok(name)
    }

    /// Drop a lane's entry regardless of its depth. Returns whether it existed.
    pub fn release_lane(&self, lane: &str) -> bool {
        let removed = self.lanes.lock().remove(lane).is_some();
        if removed {
            debug!(lane = %lane, "Released lane");
        }
        removed
    }

    pub fn lane_depth(&self, lane: &str) -> usize {
        self.lanes.lock().get(lane).map_or(0, ContextStack::depth)
    }

    pub fn has_lane(&self, lane: &str) -> bool {
        self.lanes.lock().contains_key(lane)
    }

    pub fn lane_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lanes.lock().keys().cloned().collect();
        names.sort();
        names
    }
}
