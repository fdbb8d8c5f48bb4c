//! Session janitor
//!
//! Evicts sessions that never got past the system instruction. Optionally
//! also evicts sessions left idle for longer than `max_age`.

use crate::agent::session::store::{Session, SessionStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct SessionJanitor {
    store: Arc<SessionStore>,
    evict_idle: bool,
}

impl SessionJanitor {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            evict_idle: false,
        }
    }

    /// Also evict sessions untouched for longer than `max_age`
    pub fn with_evict_idle(mut self, evict_idle: bool) -> Self {
        self.evict_idle = evict_idle;
        self
    }

    /// Remove unused sessions, returning how many were evicted
    ///
    /// A session only holding the system instruction counts as unused
    /// regardless of age. Each removal re-checks the condition under the
    /// map lock, so a session extended since the scan is kept.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let mut evicted = 0;

        for context_id in self.store.context_ids() {
            if self.store.remove_if(&context_id, |s| self.is_unused(s, max_age)) {
                debug!(context_id = %context_id, "Cleaned up unused session");
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!(evicted, remaining = self.store.len(), "Session sweep finished");
        }
        evicted
    }

    fn is_unused(&self, session: &Session, max_age: Duration) -> bool {
        if session.len() <= 1 {
            return true;
        }
        if !self.evict_idle {
            return false;
        }
        let idle = (Utc::now() - session.last_touched())
            .to_std()
            .unwrap_or_default();
        idle > max_age
    }

    /// Run `sweep` every `interval` until `shutdown` is cancelled
    pub fn spawn(
        self,
        interval: Duration,
        max_age: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Session janitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep(max_age);
                    }
                }
            }
        })
    }
}
