use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SessionContext;
use super::actor::SessionActor;
use super::handle::SessionHandle;
use crate::error::CoreError;
use crate::model::{Channel, RequestedQuality, SessionEvent, SessionId, SessionStatus};

/// Owns every playback session.
///
/// Selecting a channel replaces the running session unless multi-view is
/// enabled, in which case only a session on the same channel is replaced.
pub struct SessionManager {
    ctx: Arc<SessionContext>,
    sessions: DashMap<SessionId, SessionHandle>,
    cancel: CancellationToken,
    select_lock: Mutex<()>,
}

impl SessionManager {
    pub(crate) fn new(ctx: SessionContext, cancel: CancellationToken) -> Self {
        Self {
            ctx: Arc::new(ctx),
            sessions: DashMap::new(),
            cancel,
            select_lock: Mutex::new(()),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.ctx.events.subscribe()
    }

    /// Begin playback of `channel`, replacing sessions as configured.
    /// Concurrent selections are serialized.
    pub async fn select_channel(
        &self,
        channel: Channel,
        requested: RequestedQuality,
    ) -> SessionHandle {
        let _guard = self.select_lock.lock().await;
        let replaced: Vec<SessionHandle> = self
            .sessions
            .iter()
            .filter(|entry| {
                !self.ctx.config.multi_view
                    || entry.value().channel_id() == channel.id
                    || entry.value().is_finished()
            })
            .map(|entry| entry.value().clone())
            .collect();
        for handle in replaced {
            self.sessions.remove(&handle.id());
            debug!(session = %handle.id(), "replacing session");
            handle.stop().await;
        }

        let id = SessionId::new();
        info!(session = %id, channel = %channel.id, %requested, "selecting channel");
        let (status_tx, status_rx) =
            watch::channel(SessionStatus::new(id, channel.id.clone(), requested));
        let cancel = self.cancel.child_token();
        let actor = SessionActor::new(
            Arc::clone(&self.ctx),
            id,
            channel,
            requested,
            status_tx,
            cancel.clone(),
        );
        let task = tokio::spawn(actor.run());

        let handle = SessionHandle::new(status_rx, cancel, task);
        self.sessions.insert(id, handle.clone());
        handle
    }

    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    pub async fn stop_session(&self, id: SessionId) -> Result<SessionStatus, CoreError> {
        let (_, handle) = self
            .sessions
            .remove(&id)
            .ok_or(CoreError::SessionNotFound { id })?;
        Ok(handle.stop().await)
    }

    pub fn session_state(&self, id: SessionId) -> Result<SessionStatus, CoreError> {
        self.get(id)
            .map(|handle| handle.status())
            .ok_or(CoreError::SessionNotFound { id })
    }

    /// Status of every known session, oldest first.
    pub fn sessions(&self) -> Vec<SessionStatus> {
        let mut all: Vec<SessionStatus> = self
            .sessions
            .iter()
            .map(|entry| entry.value().status())
            .collect();
        all.sort_by_key(|s| s.created_at);
        all
    }

    /// Stop every session and wait for all pipelines to close.
    pub async fn stop_all(&self) {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.sessions.clear();
        for handle in handles {
            handle.stop().await;
        }
    }
}
