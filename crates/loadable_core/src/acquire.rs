//! Acquisition adapter
//!
//! Units arrive in one of three shapes: a procedure returning a future, a
//! future handed over directly, or a procedure that reports through a
//! completion callback. [`Acquisition::start`] normalizes all three into a
//! single future that settles exactly once.

use crate::unit::Module;
use futures::future::{BoxFuture, FutureExt, Shared, TryFutureExt};
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors reported by the acquisition procedure itself.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("{0}")]
    Message(String),

    #[error("completion was dropped before the acquisition settled")]
    Abandoned,

    #[error(transparent)]
    Source(Box<dyn StdError + Send + Sync>),
}

impl AcquireError {
    pub fn msg(message: impl Into<String>) -> Self {
        AcquireError::Message(message.into())
    }

    pub fn from_error<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        AcquireError::Source(Box::new(err))
    }
}

pub type AcquireResult = Result<Arc<Module>, AcquireError>;
pub type UnitFuture = BoxFuture<'static, AcquireResult>;

/// Outcome of one started acquisition, shareable across attempts.
pub type RawOutcome = Result<Arc<Module>, Arc<AcquireError>>;
pub type RawFuture = BoxFuture<'static, RawOutcome>;

pub type ProcedureFn<P> = Arc<dyn Fn(&P) -> UnitFuture + Send + Sync>;
pub type CallbackFn<P> = Arc<dyn Fn(&P, Completion) + Send + Sync>;

/// How a unit is obtained when it is not resident yet.
pub enum Acquisition<P = ()> {
    /// Called once per attempt; returns the future to await.
    Procedure(ProcedureFn<P>),
    /// A single eventual unit. Every attempt observes the same outcome.
    Eventual(Shared<RawFuture>),
    /// Called once per attempt with a [`Completion`] to settle.
    Callback(CallbackFn<P>),
}

impl<P: 'static> Acquisition<P> {
    pub fn procedure<F, Fut>(f: F) -> Self
    where
        F: Fn(&P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AcquireResult> + Send + 'static,
    {
        Acquisition::Procedure(Arc::new(move |props: &P| f(props).boxed()))
    }

    pub fn eventual<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = AcquireResult> + Send + 'static,
    {
        Acquisition::Eventual(future.map_err(Arc::new).boxed().shared())
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&P, Completion) + Send + Sync + 'static,
    {
        Acquisition::Callback(Arc::new(f))
    }

    /// Kick off one acquisition. The returned future resolves once.
    pub(crate) fn start(&self, props: &P) -> RawFuture {
        match self {
            Acquisition::Procedure(f) => f(props).map_err(Arc::new).boxed(),
            Acquisition::Eventual(shared) => shared.clone().boxed(),
            Acquisition::Callback(f) => {
                let (completion, rx) = Completion::channel();
                f(props, completion);
                async move {
                    match rx.await {
                        Ok(result) => result.map_err(Arc::new),
                        Err(_) => Err(Arc::new(AcquireError::Abandoned)),
                    }
                }
                .boxed()
            }
        }
    }
}

impl<P> Clone for Acquisition<P> {
    fn clone(&self) -> Self {
        match self {
            Acquisition::Procedure(f) => Acquisition::Procedure(f.clone()),
            Acquisition::Eventual(shared) => Acquisition::Eventual(shared.clone()),
            Acquisition::Callback(f) => Acquisition::Callback(f.clone()),
        }
    }
}

impl<P> std::fmt::Debug for Acquisition<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self {
            Acquisition::Procedure(_) => "Procedure",
            Acquisition::Eventual(_) => "Eventual",
            Acquisition::Callback(_) => "Callback",
        };
        write!(f, "Acquisition::{shape}")
    }
}

/// Settle-once handle given to callback-style acquisitions.
///
/// Settling consumes the handle. Settling after the attempt has already
/// timed out is silently discarded.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<AcquireResult>,
}

impl Completion {
    fn channel() -> (Self, oneshot::Receiver<AcquireResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn settle(self, result: AcquireResult) {
        if self.tx.send(result).is_err() {
            tracing::trace!("acquisition settled after its attempt was abandoned");
        }
    }

    pub fn resolve(self, module: Arc<Module>) {
        self.settle(Ok(module));
    }

    pub fn reject(self, err: AcquireError) {
        self.settle(Err(err));
    }
}
