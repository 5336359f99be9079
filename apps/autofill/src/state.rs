use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::orchestrator::Orchestrator;
use crate::page::PageAgentHandle;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// The popup session. One per running agent.
    pub orchestrator: Arc<Orchestrator>,
    /// Page agents for the tabs the content script has registered.
    pub tabs: Arc<RwLock<Tabs>>,
}

struct TabEntry {
    handle: PageAgentHandle,
    last_used: Instant,
    /// Tie-breaker for least-recently-used eviction.
    use_seq: u64,
}

/// Registered tabs. Dropping an entry drops its handle, which stops the agent.
#[derive(Default)]
pub struct Tabs {
    entries: HashMap<Uuid, TabEntry>,
    seq: u64,
}

impl Tabs {
    fn touch(&mut self) -> (Instant, u64) {
        self.seq += 1;
        (Instant::now(), self.seq)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl AppState {
    pub fn new(config: Config, orchestrator: Orchestrator) -> Self {
        Self {
            config,
            orchestrator: Arc::new(orchestrator),
            tabs: Arc::new(RwLock::new(Tabs::default())),
        }
    }

    /// Registers a tab's agent, first evicting idle or stopped agents and, at
    /// capacity, the least recently used one.
    pub async fn open_tab(&self, handle: PageAgentHandle) -> Uuid {
        let idle = self.config.tab_idle_timeout();
        let mut tabs = self.tabs.write().await;

        let before = tabs.entries.len();
        tabs.entries
            .retain(|_, e| !e.handle.is_closed() && e.last_used.elapsed() < idle);
        let pruned = before - tabs.entries.len();
        if pruned > 0 {
            info!("Dropped {pruned} idle tab(s)");
        }

        while tabs.entries.len() >= self.config.max_tabs.max(1) {
            let oldest = tabs
                .entries
                .iter()
                .min_by_key(|(_, e)| e.use_seq)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    tabs.entries.remove(&id);
                    info!("Evicted least recently used tab {id}");
                }
                None => break,
            }
        }

        let id = Uuid::new_v4();
        let (last_used, use_seq) = tabs.touch();
        tabs.entries.insert(
            id,
            TabEntry {
                handle,
                last_used,
                use_seq,
            },
        );
        id
    }

    pub async fn close_tab(&self, id: Uuid) -> bool {
        self.tabs.write().await.entries.remove(&id).is_some()
    }

    /// Looks up a tab's agent and marks it used, forgetting it if the agent
    /// has stopped.
    pub async fn tab(&self, id: Uuid) -> Result<PageAgentHandle, AppError> {
        let mut guard = self.tabs.write().await;
        let tabs = &mut *guard;
        let (now, seq) = tabs.touch();
        match tabs.entries.get_mut(&id) {
            Some(entry) if !entry.handle.is_closed() => {
                entry.last_used = now;
                entry.use_seq = seq;
                Ok(entry.handle.clone())
            }
            Some(_) => {
                tabs.entries.remove(&id);
                Err(AppError::NotFound(format!("Tab {id} is no longer available")))
            }
            None => Err(AppError::NotFound(format!("Tab {id} not found"))),
        }
    }
}
