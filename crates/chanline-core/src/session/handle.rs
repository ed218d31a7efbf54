use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::model::{SessionId, SessionStatus};
use crate::stream::StateStream;

/// Stable reference to a playback session.
///
/// Cheaply cloneable. The handle stays valid across pipeline swaps; the
/// status it reports always describes the applied pipeline.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: SessionId,
    channel_id: String,
    status: watch::Receiver<SessionStatus>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    pub(crate) fn new(
        status: watch::Receiver<SessionStatus>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        let (id, channel_id) = {
            let current = status.borrow();
            (current.id, current.channel_id.clone())
        };
        Self {
            inner: Arc::new(HandleInner {
                id,
                channel_id,
                status,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn channel_id(&self) -> &str {
        &self.inner.channel_id
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch(&self) -> StateStream<SessionStatus> {
        StateStream::new(self.inner.status.clone())
    }

    /// Wait until `predicate` holds, returning the matching status. If the
    /// session task ends first, the final status is returned instead.
    pub async fn wait_for(&self, predicate: impl FnMut(&SessionStatus) -> bool) -> SessionStatus {
        let mut rx = self.inner.status.clone();
        let matched = rx
            .wait_for(predicate)
            .await
            .map(|status| SessionStatus::clone(&status));
        matched.unwrap_or_else(|_| rx.borrow().clone())
    }

    /// Stop the session and wait for its pipelines to be released.
    /// Idempotent.
    pub async fn stop(&self) -> SessionStatus {
        self.inner.cancel.cancel();
        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(session = %self.inner.id, error = %e, "session task ended abnormally");
            }
        }
        self.status()
    }

    pub fn is_finished(&self) -> bool {
        self.inner.status.borrow().state.is_terminal()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.inner.id)
            .field("channel_id", &self.inner.channel_id)
            .finish_non_exhaustive()
    }
}
