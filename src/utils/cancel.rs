// file: src/utils/cancel.rs
// description: cooperative cancellation signal shared across long-running steps
// reference: https://docs.rs/tokio/latest/tokio/sync/watch

use crate::error::{PipelineError, Result};
use std::future::Future;
use tokio::sync::watch;

/// Owner side. Dropping it without cancelling leaves every signal uncancelled.
pub struct CancellationHandle {
    sender: watch::Sender<bool>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct CancellationSignal {
    receiver: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Runs `future` unless cancellation fires first.
    pub async fn run<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(PipelineError::Cancelled),
            result = future => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_signal_observes_handle() {
        let handle = CancellationHandle::new();
        let signal = handle.signal();

        assert!(!signal.is_cancelled());
        assert!(signal.check().is_ok());
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(matches!(signal.check(), Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn test_run_aborts_pending_work() {
        let handle = CancellationHandle::new();
        let signal = handle.signal();

        let task = tokio::spawn(async move {
            signal
                .run(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn test_never_lets_work_finish() {
        let result = CancellationSignal::never().run(async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
