//! In-memory registry of live onboarding sessions, at most one per user.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::controller::{FlowStatus, OnboardingController};

/// Sessions untouched for this long are abandoned and dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct Entry {
    flow: Arc<OnboardingController>,
    last_seen: Instant,
}

#[derive(Default)]
struct Sessions {
    by_id: HashMap<Uuid, Entry>,
    by_user: HashMap<String, Uuid>,
}

impl Sessions {
    fn remove(&mut self, id: &Uuid) -> Option<Arc<OnboardingController>> {
        let entry = self.by_id.remove(id)?;
        if self.by_user.get(entry.flow.user_id()) == Some(id) {
            self.by_user.remove(entry.flow.user_id());
        }
        Some(entry.flow)
    }
}

fn is_live(flow: &OnboardingController) -> bool {
    matches!(flow.status(), FlowStatus::InProgress | FlowStatus::Saving)
}

/// Result of registering a flow.
pub struct Registered {
    pub session_id: Uuid,
    pub flow: Arc<OnboardingController>,
    /// False when the user already had a live session, which is returned
    /// instead of the offered flow.
    pub created: bool,
}

pub struct SessionRegistry {
    inner: RwLock<Sessions>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            inner: RwLock::new(Sessions::default()),
            idle_timeout,
        }
    }

    /// Look up a session and mark it as recently used.
    pub async fn get(&self, id: &Uuid) -> Option<Arc<OnboardingController>> {
        let mut sessions = self.inner.write().await;
        let entry = sessions.by_id.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.flow))
    }

    /// The user's live session, if any.
    pub async fn find_by_user(&self, user_id: &str) -> Option<(Uuid, Arc<OnboardingController>)> {
        let mut sessions = self.inner.write().await;
        let id = *sessions.by_user.get(user_id)?;
        let entry = sessions.by_id.get_mut(&id)?;
        if !is_live(&entry.flow) {
            return None;
        }
        entry.last_seen = Instant::now();
        Some((id, Arc::clone(&entry.flow)))
    }

    /// Register a flow. If the user already has a live session that one is
    /// kept and returned.
    pub async fn insert(&self, flow: Arc<OnboardingController>) -> Registered {
        let mut sessions = self.inner.write().await;

        if let Some(existing) = sessions.by_user.get(flow.user_id()).copied() {
            if let Some(entry) = sessions
                .by_id
                .get_mut(&existing)
                .filter(|e| is_live(&e.flow))
            {
                entry.last_seen = Instant::now();
                return Registered {
                    session_id: existing,
                    flow: Arc::clone(&entry.flow),
                    created: false,
                };
            }
            sessions.remove(&existing);
        }

        let session_id = Uuid::new_v4();
        sessions
            .by_user
            .insert(flow.user_id().to_string(), session_id);
        sessions.by_id.insert(
            session_id,
            Entry {
                flow: Arc::clone(&flow),
                last_seen: Instant::now(),
            },
        );
        debug!(session_id = %session_id, user_id = %flow.user_id(), "Session registered");
        Registered {
            session_id,
            flow,
            created: true,
        }
    }

    pub async fn remove(&self, id: &Uuid) -> Option<Arc<OnboardingController>> {
        self.inner.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Abandon and drop sessions idle past the timeout. Sessions with a
    /// save in flight are kept.
    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now()).await
    }

    async fn evict_idle_at(&self, now: Instant) -> usize {
        let evicted: Vec<Arc<OnboardingController>> = {
            let mut sessions = self.inner.write().await;
            let stale: Vec<Uuid> = sessions
                .by_id
                .iter()
                .filter(|(_, e)| {
                    e.flow.status() != FlowStatus::Saving
                        && now.saturating_duration_since(e.last_seen) >= self.idle_timeout
                })
                .map(|(id, _)| *id)
                .collect();
            stale.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for flow in &evicted {
            flow.abandon().await;
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted idle onboarding sessions");
        }
        evicted.len()
    }
}

/// Spawn a background task that periodically evicts idle sessions.
pub fn spawn_eviction_task(
    registry: Arc<SessionRegistry>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            registry.evict_idle().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::controller::OnboardingDeps;
    use crate::onboarding::model::{IdentityMetadata, Role};
    use crate::store::LibSqlBackend;

    async fn flow(deps: &OnboardingDeps, user_id: &str) -> Arc<OnboardingController> {
        Arc::new(
            OnboardingController::start(
                user_id,
                Role::JobSeeker,
                &IdentityMetadata::default(),
                deps.clone(),
            )
            .await
            .unwrap(),
        )
    }

    async fn deps() -> OnboardingDeps {
        OnboardingDeps::new(Arc::new(LibSqlBackend::new_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn one_live_session_per_user() {
        let deps = deps().await;
        let registry = SessionRegistry::new(DEFAULT_IDLE_TIMEOUT);

        let first = registry.insert(flow(&deps, "u1").await).await;
        assert!(first.created);
        let again = registry.insert(flow(&deps, "u1").await).await;
        assert!(!again.created);
        assert_eq!(again.session_id, first.session_id);
        assert!(Arc::ptr_eq(&again.flow, &first.flow));

        registry.insert(flow(&deps, "u2").await).await;
        assert_eq!(registry.len().await, 2);

        let (found, _) = registry.find_by_user("u1").await.unwrap();
        assert_eq!(found, first.session_id);
    }

    #[tokio::test]
    async fn finished_session_is_replaced() {
        let deps = deps().await;
        let registry = SessionRegistry::new(DEFAULT_IDLE_TIMEOUT);

        let first = registry.insert(flow(&deps, "u1").await).await;
        first.flow.abandon().await;
        assert!(registry.find_by_user("u1").await.is_none());

        let second = registry.insert(flow(&deps, "u1").await).await;
        assert!(second.created);
        assert_ne!(second.session_id, first.session_id);
        assert!(registry.get(&first.session_id).await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn idle_sessions_are_abandoned_and_dropped() {
        let deps = deps().await;
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let idle = registry.insert(flow(&deps, "u1").await).await;

        assert_eq!(registry.evict_idle().await, 0);
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(registry.evict_idle_at(later).await, 1);

        assert!(registry.is_empty().await);
        assert_eq!(idle.flow.status(), FlowStatus::Abandoned);
        assert!(registry.find_by_user("u1").await.is_none());
    }

    #[tokio::test]
    async fn remove_clears_user_index() {
        let deps = deps().await;
        let registry = SessionRegistry::new(DEFAULT_IDLE_TIMEOUT);
        let reg = registry.insert(flow(&deps, "u1").await).await;

        assert!(registry.remove(&reg.session_id).await.is_some());
        assert!(registry.find_by_user("u1").await.is_none());
        assert!(registry.remove(&reg.session_id).await.is_none());
    }
}
