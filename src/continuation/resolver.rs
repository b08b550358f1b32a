//! Settlement handle given to executors.

use crate::error::ContextError;
use futures::channel::oneshot;
use parking_lot::Mutex;
use std::sync::Arc;

type Outcome<T> = Result<T, ContextError>;

/// Settles a [`ContextFuture`](super::ContextFuture) created with
/// `with_executor`. Clones share one slot: the first settlement wins and later
/// ones return `false`. When every clone is dropped unsettled the future
/// fails with [`ContextError::Abandoned`].
pub struct Resolver<T> {
    sender: Arc<Mutex<Option<oneshot::Sender<Outcome<T>>>>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T> Resolver<T> {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Outcome<T>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, error: impl Into<ContextError>) -> bool {
        self.settle(Err(error.into()))
    }

    pub fn is_settled(&self) -> bool {
        self.sender.lock().is_none()
    }

    pub(crate) fn settle(&self, outcome: Outcome<T>) -> bool {
        match self.sender.lock().take() {
            // A closed receiver still counts as settled from the executor's side.
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}
