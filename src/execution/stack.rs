//! Per-lane context stack.
//!
//! A lane's stack is an ordered sequence of frames. Each frame holds the
//! segments introduced by one `enter` call. Lookup walks newest to oldest.
//!
//! Frames copied in by a fork are resting: they belong to no thread. Frames
//! pushed afterwards are live and all belong to the one thread that pushed
//! the first of them, until the stack is back down to its resting frames.

use crate::error::ContextError;
use crate::execution::segment::SegmentRef;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

static FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// Segments newly introduced by one `enter` call, keyed by kind.
pub type Frame = HashMap<String, SegmentRef>;

/// Proof of a pushed frame. Only the matching token can pop it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[must_use = "a pushed frame must be exited with its token"]
pub struct FrameToken {
    lane: Arc<str>,
    id: u64,
}

impl FrameToken {
    pub fn lane(&self) -> &str {
        &self.lane
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Clone)]
struct StackEntry {
    id: u64,
    frame: Arc<Frame>,
}

/// Stack of frames for one lane.
#[derive(Clone)]
pub struct ContextStack {
    lane: Arc<str>,
    entries: Vec<StackEntry>,
    resting: usize,
    owner: Option<ThreadId>,
}

impl ContextStack {
    pub fn new(lane: &str) -> Self {
        Self {
            lane: Arc::from(lane),
            entries: Vec::new(),
            resting: 0,
            owner: None,
        }
    }

    pub fn lane(&self) -> &str {
        &self.lane
    }

    /// Thread holding live frames on this stack, if any.
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner
    }

    /// Push a frame and return the token that exits it. The calling thread
    /// becomes the owner when the stack has no live frames yet.
    pub fn enter(&mut self, frame: Frame) -> FrameToken {
        if self.owner.is_none() {
            self.owner = Some(thread::current().id());
        }
        let id = FRAME_ID.fetch_add(1, Ordering::Relaxed);
        self.entries.push(StackEntry {
            id,
            frame: Arc::new(frame),
        });
        FrameToken {
            lane: self.lane.clone(),
            id,
        }
    }

    /// Pop the top frame. Fails when empty or when `token` is not the top frame.
    pub fn exit(&mut self, token: &FrameToken) -> Result<(), ContextError> {
        let top = self.entries.last().ok_or_else(|| ContextError::StackEmpty {
            lane: self.lane.to_string(),
        })?;
        if top.id != token.id {
            return Err(ContextError::FrameMismatch {
                lane: self.lane.to_string(),
                given: token.id,
                top: top.id,
            });
        }
        self.entries.pop();
        self.settle();
        Ok(())
    }

    /// Remove the frame pushed under `token` wherever it sits. Returns whether it was found.
    pub fn discard(&mut self, token: &FrameToken) -> bool {
        match self.entries.iter().rposition(|entry| entry.id == token.id) {
            Some(index) => {
                self.entries.remove(index);
                self.settle();
                true
            }
            None => false,
        }
    }

    fn settle(&mut self) {
        self.resting = self.resting.min(self.entries.len());
        if self.entries.len() == self.resting {
            self.owner = None;
        }
    }

    /// Newest frame holding `kind`, if any.
    pub fn lookup(&self, kind: &str) -> Option<&SegmentRef> {
        self.entries
            .iter()
            .rev()
            .find_map(|entry| entry.frame.get(kind))
    }

    /// Snapshot this stack under a new lane name. Frame boundaries are kept
    /// and every copied frame is resting in the new stack.
    pub fn fork(&self, lane: &str) -> ContextStack {
        Self::snapshot(lane, &self.entries)
    }

    /// Like [`fork`](Self::fork), without the live frames of the owner.
    pub fn fork_resting(&self, lane: &str) -> ContextStack {
        Self::snapshot(lane, &self.entries[..self.resting])
    }

    fn snapshot(lane: &str, entries: &[StackEntry]) -> ContextStack {
        ContextStack {
            lane: Arc::from(lane),
            entries: entries.to_vec(),
            resting: entries.len(),
            owner: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
