//! Completion status of in-flight operations.
//!
//! A [`Status`] is returned by every non-blocking request (a motor move, a
//! completion put). Each operation runs as a tokio task from the moment the
//! status is created, so issuing several requests and waiting on them later
//! lets them proceed concurrently. Statuses combine with [`Status::and`]; the
//! combined status is complete only when every member is.

use crate::error::{AppResult, DeviceError};
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle on one or more in-flight operations.
#[must_use = "a Status does nothing unless waited on or checked"]
#[derive(Debug)]
pub struct Status {
    ops: Vec<(String, JoinHandle<AppResult<()>>)>,
}

impl Status {
    /// Start `operation` on the runtime and track it under `label`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(label: impl Into<String>, operation: F) -> Self
    where
        F: Future<Output = AppResult<()>> + Send + 'static,
    {
        Self {
            ops: vec![(label.into(), tokio::spawn(operation))],
        }
    }

    /// A status with nothing to wait for.
    pub fn finished() -> Self {
        Self { ops: Vec::new() }
    }

    /// Combine two statuses into one that completes when both do.
    pub fn and(mut self, other: Status) -> Status {
        self.ops.extend(other.ops);
        self
    }

    /// Combine any number of statuses.
    pub fn all(statuses: impl IntoIterator<Item = Status>) -> Status {
        statuses
            .into_iter()
            .fold(Status::finished(), |acc, status| acc.and(status))
    }

    /// Labels of the tracked operations.
    pub fn labels(&self) -> Vec<&str> {
        self.ops.iter().map(|(label, _)| label.as_str()).collect()
    }

    /// Number of tracked operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// True once every tracked operation has finished (successfully or not).
    pub fn done(&self) -> bool {
        self.ops.iter().all(|(_, handle)| handle.is_finished())
    }

    /// Wait for every operation to finish. No timeout.
    ///
    /// All operations are awaited even if one fails; the first failure in
    /// issue order is returned.
    pub async fn wait(self) -> AppResult<()> {
        let (labels, handles): (Vec<_>, Vec<_>) = self.ops.into_iter().unzip();
        let results = join_all(handles).await;

        let mut first_error = None;
        for (label, result) in labels.into_iter().zip(results) {
            let outcome = match result {
                Ok(inner) => inner,
                Err(join_err) => Err(DeviceError::TaskFailed(label, join_err.to_string())),
            };
            if let Err(e) = outcome {
                tracing::warn!(error = %e, "operation failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Wait for every operation, giving up after `timeout`.
    ///
    /// Operations still running at the deadline keep running.
    pub async fn wait_timeout(self, timeout: Duration) -> AppResult<()> {
        let description = self.labels().join(", ");
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| DeviceError::Timeout(timeout, description))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_finished_status_is_done() {
        let status = Status::finished();
        assert!(status.done());
        assert!(status.is_empty());
        status.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_and_waits_for_all() {
        let a = Status::spawn("a", async {
            sleep(Duration::from_millis(20)).await;
            Ok(())
        });
        let b = Status::spawn("b", async { Ok(()) });

        let both = a.and(b);
        assert_eq!(both.labels(), vec!["a", "b"]);
        both.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_reports_first_failure() {
        let ok = Status::spawn("ok", async { Ok(()) });
        let bad = Status::spawn("bad", async {
            Err(DeviceError::channel("m9.VAL", "disconnected"))
        });

        let err = Status::all([ok, bad]).wait().await.unwrap_err();
        assert!(err.to_string().contains("m9.VAL"));
    }

    #[tokio::test]
    async fn test_wait_timeout() {
        let slow = Status::spawn("slow", async {
            sleep(Duration::from_secs(5)).await;
            Ok(())
        });

        let err = slow
            .wait_timeout(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Timeout(_, _)));
    }
}
