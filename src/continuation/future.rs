//! `ContextFuture`: a future whose reactions run inside a lane's context.

use crate::continuation::resolver::Resolver;
use crate::error::ContextError;
use crate::execution::invocation::CallScope;
use crate::execution::options::ContextOptions;
use crate::execution::service::ExecutionContextService;
use crate::execution::view::View;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::trace;

/// A future bound to a [`View`] and the [`ContextOptions`] its reactions use.
///
/// Awaiting it yields the wrapped outcome. Reactions attached with
/// [`then`](Self::then) or [`catch`](Self::catch) run through
/// [`View::run_in_context`] when the future resumes, so every registered
/// segment intercepts each reaction exactly like a synchronous call.
///
/// A reaction that resumes while another thread holds its lane runs on a
/// private fork of the lane's resting frames instead, and receives that
/// fork's view. The fork is released when the reaction returns.
#[must_use = "futures do nothing unless awaited or spawned"]
pub struct ContextFuture<T> {
    pub(crate) inner: BoxFuture<'static, Result<T, ContextError>>,
    pub(crate) view: View,
    pub(crate) options: ContextOptions,
}

impl<T> std::fmt::Debug for ContextFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextFuture")
            .field("view", &self.view)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T> Future for ContextFuture<T> {
    type Output = Result<T, ContextError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T: Send + 'static> ContextFuture<T> {
    /// Wrap an existing future. Its own body is not intercepted; only the
    /// reactions attached afterwards are.
    pub fn wrap<F, E>(view: View, options: ContextOptions, future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<ContextError>,
    {
        Self {
            inner: future.map(|outcome| outcome.map_err(Into::into)).boxed(),
            view,
            options,
        }
    }

    /// Wrap `future` on the global service's continuation lane with no options.
    pub fn detached<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<ContextError>,
    {
        let view = ExecutionContextService::global().for_continuations();
        Self::wrap(view, ContextOptions::new(), future)
    }

    /// Run `executor` now, inside the context, and settle through the resolver it receives.
    ///
    /// A failure of the executor (or a refusal by a segment) rejects the
    /// future unless the executor already settled it. The executor may run
    /// more than once when a segment retries; every run gets a clone of the
    /// same resolver.
    pub fn with_executor<E>(view: View, options: ContextOptions, mut executor: E) -> Self
    where
        E: FnMut(Resolver<T>, &View) -> anyhow::Result<()>,
    {
        let (resolver, receiver) = Resolver::channel();
        let outcome = run_reaction(&view, &options, CallScope::operation("executor"), |view| {
            executor(resolver.clone(), view)
        });
        if let Err(err) = outcome {
            if !resolver.settle(Err(err)) {
                trace!(lane = view.lane(), "Executor failed after settling; failure dropped");
            }
        }
        drop(resolver);

        let inner = receiver
            .map(|received| received.unwrap_or(Err(ContextError::Abandoned)))
            .boxed();
        Self {
            inner,
            view,
            options,
        }
    }

    pub fn resolved(view: View, value: T) -> Self {
        Self::wrap(
            view,
            ContextOptions::new(),
            futures::future::ready(Ok::<T, ContextError>(value)),
        )
    }

    pub fn rejected(view: View, error: impl Into<ContextError>) -> Self {
        Self::wrap(
            view,
            ContextOptions::new(),
            futures::future::ready(Err::<T, ContextError>(error.into())),
        )
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Run `on_fulfilled` in context once the value is available.
    pub fn then<U, F>(self, on_fulfilled: F) -> ContextFuture<U>
    where
        U: Send + 'static,
        F: FnMut(&T, &View) -> anyhow::Result<U> + Send + 'static,
    {
        let options = self.options.clone();
        self.then_in(options, on_fulfilled)
    }

    /// Like [`then`](Self::then), with `options` for the reaction and every later one.
    pub fn then_in<U, F>(self, options: ContextOptions, mut on_fulfilled: F) -> ContextFuture<U>
    where
        U: Send + 'static,
        F: FnMut(&T, &View) -> anyhow::Result<U> + Send + 'static,
    {
        let view = self.view.clone();
        let reaction_view = view.clone();
        let reaction_options = options.clone();
        let upstream = self.inner;
        let inner = async move {
            let value = upstream.await?;
            run_reaction(
                &reaction_view,
                &reaction_options,
                CallScope::operation("then"),
                |view| on_fulfilled(&value, view),
            )
        }
        .boxed();
        ContextFuture {
            inner,
            view,
            options,
        }
    }

    /// Run `on_fulfilled` in context and continue with the future it returns.
    ///
    /// The returned future is awaited outside the frame; its outcome becomes
    /// the outcome of this continuation, which stays bound to the same view
    /// and options.
    pub fn then_continue<U, F, Fut, E>(self, mut on_fulfilled: F) -> ContextFuture<U>
    where
        U: Send + 'static,
        F: FnMut(&T, &View) -> anyhow::Result<Fut> + Send + 'static,
        Fut: Future<Output = Result<U, E>> + Send + 'static,
        E: Into<ContextError>,
    {
        let view = self.view.clone();
        let options = self.options.clone();
        let reaction_view = view.clone();
        let reaction_options = options.clone();
        let upstream = self.inner;
        let inner = async move {
            let value = upstream.await?;
            let next = run_reaction(
                &reaction_view,
                &reaction_options,
                CallScope::operation("then_continue"),
                |view| on_fulfilled(&value, view),
            )?;
            next.await.map_err(Into::into)
        }
        .boxed();
        ContextFuture {
            inner,
            view,
            options,
        }
    }

    /// Run `on_rejected` in context when the future fails; success passes through.
    pub fn catch<F>(self, on_rejected: F) -> ContextFuture<T>
    where
        F: FnMut(&ContextError, &View) -> anyhow::Result<T> + Send + 'static,
    {
        let options = self.options.clone();
        self.catch_in(options, on_rejected)
    }

    pub fn catch_in<F>(self, options: ContextOptions, mut on_rejected: F) -> ContextFuture<T>
    where
        F: FnMut(&ContextError, &View) -> anyhow::Result<T> + Send + 'static,
    {
        let view = self.view.clone();
        let reaction_view = view.clone();
        let reaction_options = options.clone();
        let upstream = self.inner;
        let inner = async move {
            match upstream.await {
                Ok(value) => Ok(value),
                Err(err) => run_reaction(
                    &reaction_view,
                    &reaction_options,
                    CallScope::operation("catch"),
                    |view| on_rejected(&err, view),
                ),
            }
        }
        .boxed();
        ContextFuture {
            inner,
            view,
            options,
        }
    }
}

/// Run `reaction` in context on `view`, or on a private fork of it when
/// another thread holds the lane.
fn run_reaction<U, F>(
    view: &View,
    options: &ContextOptions,
    scope: CallScope,
    mut reaction: F,
) -> Result<U, ContextError>
where
    F: FnMut(&View) -> anyhow::Result<U>,
{
    loop {
        let first = view.run_in_context(options, scope.clone(), || reaction(view));
        match first {
            Err(ContextError::LaneBusy { lane }) if lane == view.lane() => match view.fork(None) {
                Ok(private) => {
                    trace!(
                        lane = %lane,
                        private = private.lane(),
                        "Lane busy; running reaction on a private fork"
                    );
                    let outcome =
                        private.run_in_context(options, scope.clone(), || reaction(&private));
                    private.model().release_lane(private.lane());
                    return outcome;
                }
                // The owner left and the lane was reclaimed in between.
                Err(ContextError::NoSuchLane(_)) => continue,
                Err(err) => return Err(err),
            },
            outcome => return outcome,
        }
    }
}
