//! Bounded parallel task runner
//!
//! Leaf actions are spawned onto the runtime while holding one of `limit`
//! semaphore permits. Admission is fail-fast: once a task has failed, or the
//! cancellation token has fired, `submit` declines new work. Tasks already
//! running are left to finish and `wait` reports the first failure.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub struct ConcurrencyGroup {
    limit: usize,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<Result<()>>,
    first_error: Option<Error>,
    cancel: CancellationToken,
}

impl ConcurrencyGroup {
    /// Group admitting at most `limit` concurrent tasks (at least one)
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
            tasks: JoinSet::new(),
            first_error: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// True once any task failed or the group was cancelled. Collects
    /// finished tasks first so a failure is seen as soon as it happened.
    pub fn has_failed(&mut self) -> bool {
        self.reap();
        self.first_error.is_some()
    }

    /// Run `task` once a slot is free.
    ///
    /// Waits while `limit` tasks are in flight. Returns `false`, without
    /// running the task, when the group has already failed or is cancelled
    /// while waiting.
    pub async fn submit<F>(&mut self, task: F) -> bool
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        if self.has_failed() {
            return false;
        }

        let semaphore = Arc::clone(&self.semaphore);
        let cancel = self.cancel.clone();
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.record(Error::Cancelled);
                return false;
            }
            permit = semaphore.acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        // a task may have failed while we waited for the slot
        if self.has_failed() {
            return false;
        }

        self.tasks.spawn(async move {
            let _permit = permit;
            task.await
        });
        true
    }

    /// Wait for every submitted task and return the first error
    pub async fn wait(mut self) -> Result<()> {
        while let Some(joined) = self.tasks.join_next().await {
            self.settle(joined);
        }

        match self.first_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.settle(joined);
        }
    }

    fn settle(&mut self, joined: std::result::Result<Result<()>, JoinError>) {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(Error::Cancelled),
            Err(e) => Err(Error::General(format!("task panicked: {e}"))),
        };
        if let Err(e) = outcome {
            self.record(e);
        }
    }

    fn record(&mut self, error: Error) {
        if self.first_error.is_none() {
            tracing::debug!(error = %error, "First task failure, no longer admitting work");
            self.first_error = Some(error);
        } else {
            tracing::warn!(error = %error, "Additional task failure");
        }
    }
}
