//! Results that resolve synchronously when possible.
//!
//! A [`SyncPromise`] is either already settled (fulfilled or rejected) or pending on a
//! shared future. Chaining onto a settled promise runs the continuation immediately, on
//! the caller's stack, without scheduling anything. This is what keeps cache replacement
//! ordered: when a cache is already known, the binding installs its successor before the
//! call that triggered the replacement returns.
//!
//! Pending promises are lazy like any future. They make progress when awaited (directly or
//! through a chained promise) or once [`SyncPromise::driven`] has handed them to a runtime.
//! Calls whose side effects must happen whether or not anyone waits (operation execution,
//! background refreshes) return driven promises.

use std::{
    fmt,
    future::{Future, IntoFuture},
};

use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, error};

use crate::error::{BindingError, SyncResult};

type SharedOutcome<T> = Shared<BoxFuture<'static, SyncResult<T>>>;

/// Drives promises started outside of a tokio runtime.
static BACKGROUND_RUNTIME: Lazy<Option<Runtime>> = Lazy::new(|| {
    match Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("bindery-background")
        .enable_all()
        .build()
    {
        Ok(runtime) => Some(runtime),
        Err(build_error) => {
            error!(error = %build_error, "cannot start background runtime");
            None
        }
    }
});

fn runtime_handle() -> Option<Handle> {
    Handle::try_current()
        .ok()
        .or_else(|| BACKGROUND_RUNTIME.as_ref().map(|runtime| runtime.handle().clone()))
}

#[derive(Clone)]
enum State<T>
where
    T: Clone + Send + Sync + 'static,
{
    Fulfilled(T),
    Rejected(BindingError),
    Pending(SharedOutcome<T>),
}

/// A cloneable, possibly already settled asynchronous result.
#[derive(Clone)]
pub struct SyncPromise<T>
where
    T: Clone + Send + Sync + 'static,
{
    state: State<T>,
}

impl<T> SyncPromise<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn resolve(value: T) -> Self {
        Self {
            state: State::Fulfilled(value),
        }
    }

    pub fn reject(error: BindingError) -> Self {
        Self {
            state: State::Rejected(error),
        }
    }

    pub fn from_result(result: SyncResult<T>) -> Self {
        match result {
            Ok(value) => Self::resolve(value),
            Err(error) => Self::reject(error),
        }
    }

    /// Wraps a future. The future only runs once the promise is awaited or detached.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = SyncResult<T>> + Send + 'static,
    {
        Self {
            state: State::Pending(future.boxed().shared()),
        }
    }

    /// The settled outcome, including pending promises whose future already completed.
    fn settled(&self) -> Option<SyncResult<T>> {
        match &self.state {
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(error) => Some(Err(error.clone())),
            State::Pending(shared) => shared.peek().cloned(),
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self.settled(), Some(Ok(_)))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.settled(), Some(Err(_)))
    }

    pub fn is_pending(&self) -> bool {
        self.settled().is_none()
    }

    /// The value if the promise is fulfilled.
    pub fn result(&self) -> Option<T> {
        self.settled().and_then(Result::ok)
    }

    /// The error if the promise is rejected.
    pub fn error(&self) -> Option<BindingError> {
        self.settled().and_then(Result::err)
    }

    /// Chains a continuation that runs on fulfillment.
    ///
    /// When `self` is already fulfilled the continuation runs before `then` returns.
    pub fn then<U, F>(&self, continuation: F) -> SyncPromise<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> SyncPromise<U> + Send + 'static,
    {
        match self.settled() {
            Some(Ok(value)) => continuation(value),
            Some(Err(error)) => SyncPromise::reject(error),
            None => {
                let pending = self.clone();
                SyncPromise::from_future(async move {
                    let value = pending.await?;
                    continuation(value).await
                })
            }
        }
    }

    pub fn map<U, F>(&self, transform: F) -> SyncPromise<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |value| SyncPromise::resolve(transform(value)))
    }

    pub fn and_then<U, F>(&self, transform: F) -> SyncPromise<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> SyncResult<U> + Send + 'static,
    {
        self.then(move |value| SyncPromise::from_result(transform(value)))
    }

    /// Chains a continuation that runs on rejection and may recover.
    pub fn catch<F>(&self, recover: F) -> SyncPromise<T>
    where
        F: FnOnce(BindingError) -> SyncPromise<T> + Send + 'static,
    {
        match self.settled() {
            Some(Ok(value)) => SyncPromise::resolve(value),
            Some(Err(error)) => recover(error),
            None => {
                let pending = self.clone();
                SyncPromise::from_future(async move {
                    match pending.await {
                        Ok(value) => Ok(value),
                        Err(error) => recover(error).await,
                    }
                })
            }
        }
    }

    /// Observes a rejection without recovering from it.
    pub fn inspect_err<F>(&self, observe: F) -> SyncPromise<T>
    where
        F: FnOnce(&BindingError) + Send + 'static,
    {
        self.catch(move |error| {
            observe(&error);
            SyncPromise::reject(error)
        })
    }

    /// Joins promises in order. Settled synchronously when every input is settled; the
    /// first rejection in list order wins.
    pub fn all(promises: Vec<SyncPromise<T>>) -> SyncPromise<Vec<T>> {
        let settled: Option<Vec<SyncResult<T>>> = promises.iter().map(SyncPromise::settled).collect();
        match settled {
            Some(results) => SyncPromise::from_result(results.into_iter().collect()),
            None => SyncPromise::from_future(future::try_join_all(promises.into_iter().map(IntoFuture::into_future))),
        }
    }

    /// Waits for the outcome.
    pub async fn outcome(self) -> SyncResult<T> {
        self.await
    }

    /// Starts a pending promise on the ambient tokio runtime, or on a shared background
    /// runtime outside of one, and returns it. The work completes even if every handle is
    /// dropped; awaiting the returned promise observes the same outcome.
    pub fn driven(self) -> Self {
        if let State::Pending(shared) = &self.state
            && shared.peek().is_none()
        {
            match runtime_handle() {
                Some(handle) => {
                    let shared = shared.clone();
                    handle.spawn(async move {
                        let _ = shared.await;
                    });
                }
                None => debug!("no runtime available; pending result runs only when awaited"),
            }
        }
        self
    }

    /// Lets a pending promise complete without anybody waiting for it.
    pub fn detach(self) {
        let _ = self.driven();
    }
}

impl<T> IntoFuture for SyncPromise<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = SyncResult<T>;
    type IntoFuture = BoxFuture<'static, SyncResult<T>>;

    fn into_future(self) -> Self::IntoFuture {
        match self.state {
            State::Fulfilled(value) => future::ready(Ok(value)).boxed(),
            State::Rejected(error) => future::ready(Err(error)).boxed(),
            State::Pending(shared) => shared.boxed(),
        }
    }
}

impl<T> From<SyncResult<T>> for SyncPromise<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(result: SyncResult<T>) -> Self {
        Self::from_result(result)
    }
}

impl<T> fmt::Debug for SyncPromise<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.settled() {
            Some(Ok(value)) => f.debug_tuple("SyncPromise::Fulfilled").field(&value).finish(),
            Some(Err(error)) => f.debug_tuple("SyncPromise::Rejected").field(&error).finish(),
            None => f.write_str("SyncPromise::Pending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };
    use tokio::sync::oneshot;

    #[test]
    fn continuation_of_a_settled_promise_runs_immediately() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let chained = SyncPromise::resolve(20).map(move |value| {
            flag.store(true, Ordering::SeqCst);
            value + 1
        });
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(chained.result(), Some(21));
    }

    #[test]
    fn rejection_skips_then_and_reaches_catch() {
        let promise: SyncPromise<i32> = SyncPromise::reject(BindingError::backend("boom"));
        let chained = promise.map(|value| value * 2);
        assert_eq!(chained.error(), Some(BindingError::backend("boom")));

        let recovered = chained.catch(|_| SyncPromise::resolve(0));
        assert_eq!(recovered.result(), Some(0));
    }

    #[test]
    fn all_settles_synchronously_and_keeps_first_rejection() {
        let joined = SyncPromise::all(vec![SyncPromise::resolve(1), SyncPromise::resolve(2)]);
        assert_eq!(joined.result(), Some(vec![1, 2]));

        let joined = SyncPromise::all(vec![
            SyncPromise::resolve(1),
            SyncPromise::reject(BindingError::backend("first")),
            SyncPromise::reject(BindingError::backend("second")),
        ]);
        assert_eq!(joined.error(), Some(BindingError::backend("first")));

        let empty: SyncPromise<Vec<i32>> = SyncPromise::all(Vec::new());
        assert_eq!(empty.result(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn pending_continuation_runs_after_the_input_settles() {
        let (sender, receiver) = oneshot::channel::<i32>();
        let pending = SyncPromise::from_future(async move { receiver.await.map_err(|_| BindingError::canceled("dropped")) });
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let chained = pending.map(move |value| {
            flag.store(true, Ordering::SeqCst);
            value * 3
        });

        assert!(chained.is_pending());
        assert!(!ran.load(Ordering::SeqCst));

        sender.send(4).expect("receiver alive");
        assert_eq!(chained.clone().await, Ok(12));
        assert!(ran.load(Ordering::SeqCst));
        assert!(chained.is_fulfilled());
        // the source completed while driving the chain, so it now reads as settled
        assert_eq!(pending.result(), Some(4));
    }

    #[tokio::test]
    async fn detached_promise_is_driven_by_the_runtime() {
        let (sender, receiver) = oneshot::channel::<()>();
        let promise = SyncPromise::from_future(async move {
            let _ = sender.send(());
            Ok(())
        });
        promise.detach();
        receiver.await.expect("detached future ran");
    }

    #[test]
    fn driven_promise_completes_outside_of_a_runtime() {
        let (gate, opened) = oneshot::channel::<i32>();
        let (done, finished) = std::sync::mpsc::channel();
        let promise = SyncPromise::from_future(async move { opened.await.map_err(|_| BindingError::canceled("dropped")) })
            .map(move |value| {
                let _ = done.send(value);
                value
            })
            .driven();
        drop(promise);

        gate.send(5).expect("receiver alive");
        assert_eq!(finished.recv_timeout(std::time::Duration::from_secs(5)), Ok(5));
    }
}
