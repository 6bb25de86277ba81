//! Single-slot operation queue for selection requests.
//!
//! A new request cancels the previous one and then waits for the serial
//! lock, so at most one selection body touches the slot at a time and the
//! latest request wins.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::SwitcherError;

/// Status of the latest selection operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationStatus {
    /// Nothing has been requested yet.
    #[default]
    Idle,
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

/// How an awaited selection request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The selection was committed and presented.
    Applied,
    /// The target was already presented, or could not be resolved.
    Unchanged,
    /// A changing handler vetoed the request.
    Vetoed,
    /// A newer request cancelled this one.
    Superseded,
    /// The caller's own cancellation token fired.
    Cancelled,
}

/// A queued request that has not started running yet.
pub(crate) struct Ticket {
    generation: u64,
    token: CancellationToken,
    external: Option<CancellationToken>,
}

/// Proof that maintenance work has been counted as in flight.
pub(crate) struct Reservation(());

pub(crate) struct SelectionQueue {
    generation: AtomicU64,
    current: Mutex<Option<CancellationToken>>,
    status: Mutex<(u64, OperationStatus)>,
    serial: tokio::sync::Mutex<()>,
    in_flight: AtomicUsize,
    settled: Notify,
    shutdown: CancellationToken,
}

impl SelectionQueue {
    pub(crate) fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
            status: Mutex::new((0, OperationStatus::Idle)),
            serial: tokio::sync::Mutex::new(()),
            in_flight: AtomicUsize::new(0),
            settled: Notify::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a new request, cancelling the one before it.
    pub(crate) fn begin(&self, external: Option<&CancellationToken>) -> Result<Ticket, SwitcherError> {
        if self.shutdown.is_cancelled() {
            return Err(SwitcherError::ShutDown);
        }

        let token = self.shutdown.child_token();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.current.lock().replace(token.clone()) {
            previous.cancel();
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.set_status(generation, OperationStatus::Pending);

        Ok(Ticket {
            generation,
            token,
            external: external.cloned(),
        })
    }

    /// Run `body` once the serial lock is free, unless superseded first.
    pub(crate) async fn execute<F, Fut>(&self, ticket: Ticket, body: F) -> Result<SelectionOutcome, SwitcherError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<SelectionOutcome, SwitcherError>>,
    {
        let _done = scopeguard::guard((), |_| self.finish());
        let Ticket {
            generation,
            token,
            external,
        } = ticket;

        let serial = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            guard = self.serial.lock() => Some(guard),
        };

        let result = match serial {
            Some(_serial) if !token.is_cancelled() => {
                self.set_status(generation, OperationStatus::Running);
                run_linked(body(token.clone()), &token, external.as_ref()).await
            }
            _ => Err(SwitcherError::Cancelled),
        };

        self.release(generation);

        match result {
            Ok(outcome) => {
                self.set_status(generation, OperationStatus::Succeeded);
                Ok(outcome)
            }
            Err(err) if err.is_cancelled() => {
                self.set_status(generation, OperationStatus::Canceled);
                let by_caller = external.as_ref().is_some_and(CancellationToken::is_cancelled);
                tracing::debug!(generation, by_caller, "Selection operation cancelled");
                Ok(if by_caller {
                    SelectionOutcome::Cancelled
                } else {
                    SelectionOutcome::Superseded
                })
            }
            Err(err) => {
                self.set_status(generation, OperationStatus::Failed);
                Err(err)
            }
        }
    }

    /// Count maintenance work as in flight before it is spawned.
    pub(crate) fn reserve(&self) -> Reservation {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Reservation(())
    }

    /// Run reserved maintenance work under the serial lock without
    /// superseding the current request.
    pub(crate) async fn serialized<Fut>(&self, _reservation: Reservation, work: Fut)
    where
        Fut: Future<Output = ()>,
    {
        let _done = scopeguard::guard((), |_| self.finish());
        let _serial = self.serial.lock().await;
        work.await;
    }

    pub(crate) fn status(&self) -> OperationStatus {
        self.status.lock().1
    }

    /// Resolve once no request is queued or running.
    pub(crate) async fn settled(&self) {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Cancel the current request and refuse new ones.
    pub(crate) fn shutdown(&self) {
        self.shutdown.cancel();
        self.current.lock().take();
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn set_status(&self, generation: u64, status: OperationStatus) {
        if generation != self.generation.load(Ordering::SeqCst) {
            return;
        }
        *self.status.lock() = (generation, status);
    }

    fn release(&self, generation: u64) {
        if generation == self.generation.load(Ordering::SeqCst) {
            self.current.lock().take();
        }
    }

    fn finish(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.settled.notify_waiters();
        }
    }
}

/// Await `body`, cancelling `token` if the caller's token fires first.
/// The body still runs to completion so it can roll back.
async fn run_linked<Fut>(
    body: Fut,
    token: &CancellationToken,
    external: Option<&CancellationToken>,
) -> Result<SelectionOutcome, SwitcherError>
where
    Fut: Future<Output = Result<SelectionOutcome, SwitcherError>>,
{
    let Some(external) = external else {
        return body.await;
    };

    tokio::pin!(body);
    tokio::select! {
        biased;
        result = &mut body => result,
        _ = external.cancelled() => {
            token.cancel();
            body.await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn completed_operation_reports_success() {
        let queue = SelectionQueue::new();
        let ticket = queue.begin(None).unwrap();
        assert_eq!(queue.status(), OperationStatus::Pending);

        let outcome = queue
            .execute(ticket, |_| async { Ok(SelectionOutcome::Applied) })
            .await
            .unwrap();

        assert_eq!(outcome, SelectionOutcome::Applied);
        assert_eq!(queue.status(), OperationStatus::Succeeded);
    }

    #[tokio::test]
    async fn newer_request_supersedes_older() {
        let queue = Arc::new(SelectionQueue::new());
        let first = queue.begin(None).unwrap();
        let second = queue.begin(None).unwrap();

        let stale = queue
            .execute(first, |_| async { Ok(SelectionOutcome::Applied) })
            .await
            .unwrap();
        let fresh = queue
            .execute(second, |_| async { Ok(SelectionOutcome::Applied) })
            .await
            .unwrap();

        assert_eq!(stale, SelectionOutcome::Superseded);
        assert_eq!(fresh, SelectionOutcome::Applied);
        assert_eq!(queue.status(), OperationStatus::Succeeded);
    }

    #[tokio::test]
    async fn external_cancellation_is_reported_to_caller() {
        let queue = SelectionQueue::new();
        let external = CancellationToken::new();
        let ticket = queue.begin(Some(&external)).unwrap();

        let outcome = queue
            .execute(ticket, |token| {
                let external = external.clone();
                async move {
                    external.cancel();
                    token.cancelled().await;
                    Err(SwitcherError::Cancelled)
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome, SelectionOutcome::Cancelled);
        assert_eq!(queue.status(), OperationStatus::Canceled);
    }

    #[tokio::test]
    async fn failures_are_returned_and_recorded() {
        let queue = SelectionQueue::new();
        let ticket = queue.begin(None).unwrap();

        let result = queue
            .execute(ticket, |_| async { Err(SwitcherError::FactoryReturnedNothing { index: 0 }) })
            .await;

        assert!(matches!(result, Err(SwitcherError::FactoryReturnedNothing { index: 0 })));
        assert_eq!(queue.status(), OperationStatus::Failed);
    }

    #[tokio::test]
    async fn settled_waits_for_in_flight_work() {
        let queue = Arc::new(SelectionQueue::new());
        let ticket = queue.begin(None).unwrap();

        let worker = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .execute(ticket, |_| async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(SelectionOutcome::Applied)
                    })
                    .await
            })
        };

        queue.settled().await;
        assert_eq!(queue.status(), OperationStatus::Succeeded);
        worker.await.unwrap().unwrap();
    }

    #[test]
    fn shut_down_queue_rejects_requests() {
        let queue = SelectionQueue::new();
        queue.shutdown();
        assert!(queue.is_shut_down());
        assert!(matches!(queue.begin(None), Err(SwitcherError::ShutDown)));
    }
}
