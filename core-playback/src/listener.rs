//! Scoped output-event subscriptions.

use crate::error::{PlaybackError, Result};
use std::future::Future;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Owns the task that drains an output's event stream. Dropping the guard
/// aborts the task, which drops the stream and unsubscribes.
#[derive(Debug)]
pub(crate) struct OutputListener {
    task: JoinHandle<()>,
}

impl OutputListener {
    /// Spawn `pump` on the current Tokio runtime.
    pub(crate) fn spawn<F>(pump: F) -> Result<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|e| {
            PlaybackError::Internal(format!("output listener needs a Tokio runtime: {e}"))
        })?;
        Ok(Self {
            task: handle.spawn(pump),
        })
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for OutputListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drop_aborts_task() {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);
        let listener = OutputListener::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        })
        .unwrap();

        assert!(!listener.is_finished());
        drop(listener);

        // The sender is dropped with the aborted task.
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(closed.unwrap(), None);
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        assert!(matches!(
            OutputListener::spawn(async {}),
            Err(PlaybackError::Internal(_))
        ));
    }
}
