//! Cooperative cancellation for command execution.
//!
//! A [`CancelSignal`] combines the server's shutdown channel with an optional
//! per-command deadline (from `maxTimeMS`). Gateway calls are raced against it.

use crate::errors::DbError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Owning side of a shutdown channel. Dropping it does not cancel.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Signals cancellation to every subscribed [`CancelSignal`].
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal { rx: Some(self.tx.subscribe()), deadline: None }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// A signal that never fires.
    #[must_use]
    pub const fn never() -> Self {
        Self { rx: None, deadline: None }
    }

    /// Returns a copy of this signal that also expires after `timeout`.
    /// An earlier existing deadline wins.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let at = Instant::now() + timeout;
        let deadline = Some(self.deadline.map_or(at, |d| d.min(at)));
        Self { rx: self.rx.clone(), deadline }
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails if the signal has already fired.
    ///
    /// # Errors
    /// `Cancelled` after shutdown, `DeadlineExceeded` past the deadline.
    pub fn check(&self) -> Result<(), DbError> {
        if self.rx.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Err(DbError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(DbError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves once the signal fires, with the matching error.
    pub async fn fired(&self) -> DbError {
        let shutdown = async {
            match self.rx.clone() {
                Some(mut rx) => {
                    if rx.wait_for(|c| *c).await.is_err() {
                        // sender gone: nobody can cancel any more
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let expiry = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            () = shutdown => DbError::Cancelled,
            () = expiry => DbError::DeadlineExceeded,
        }
    }

    /// Runs `fut` unless the signal fires first.
    ///
    /// # Errors
    /// Propagates the future's error, or `Cancelled` / `DeadlineExceeded`.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, DbError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.fired() => Err(err),
            res = fut => res,
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}
