//! Joining, racing and spawning continuations.

use crate::continuation::future::ContextFuture;
use crate::error::ContextError;
use crate::execution::options::ContextOptions;
use crate::execution::view::View;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::future::Future;
use tracing::debug;

impl<T: Send + 'static> ContextFuture<Vec<T>> {
    /// Wait for every input. Values keep input order; the first failure wins.
    pub fn all<I, F>(view: View, options: ContextOptions, inputs: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, ContextError>> + Send + 'static,
    {
        let joined = future::try_join_all(inputs);
        ContextFuture::wrap(view, options, joined)
    }
}

impl<T: Send + 'static> ContextFuture<T> {
    /// Settle with whichever input settles first, success or failure.
    ///
    /// An empty input never settles on its own, so it is rejected with
    /// [`ContextError::Abandoned`] right away.
    pub fn race<I, F>(view: View, options: ContextOptions, inputs: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, ContextError>> + Send + 'static,
    {
        let inputs: Vec<BoxFuture<'static, Result<T, ContextError>>> =
            inputs.into_iter().map(|input| input.boxed()).collect();
        if inputs.is_empty() {
            debug!(lane = view.lane(), "Race over no continuations");
            return ContextFuture {
                inner: future::ready(Err(ContextError::Abandoned)).boxed(),
                view,
                options,
            };
        }
        let raced = future::select_all(inputs).map(|(outcome, _index, _rest)| outcome);
        ContextFuture::wrap(view, options, raced)
    }

    /// Drive the chain on the ambient tokio runtime; the returned handle keeps
    /// the same view and options.
    ///
    /// Outside a runtime the result fails instead of panicking.
    pub fn spawn(self) -> ContextFuture<T> {
        let ContextFuture {
            inner,
            view,
            options,
        } = self;
        let inner = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(inner);
                async move {
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(join_error) => {
                            Err(ContextError::Target(anyhow::Error::new(join_error)))
                        }
                    }
                }
                .boxed()
            }
            Err(no_runtime) => {
                future::ready(Err(ContextError::Target(anyhow::Error::new(no_runtime)))).boxed()
            }
        };
        ContextFuture {
            inner,
            view,
            options,
        }
    }
}
