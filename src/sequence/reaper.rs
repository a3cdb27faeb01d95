//! Background task evicting sequences idle for two consecutive sweeps.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::SequenceManager;

type ManagerRef = Weak<Mutex<SequenceManager>>;

/// Process-wide registry of sequence managers that opted into idle cleanup.
///
/// Each sweep removes the sequences still flagged idle from the previous
/// sweep, then flags everything that remains. Any request that touches a
/// sequence in between clears its flag, so only sequences untouched for two
/// full intervals are evicted. The reaper holds weak references only; a
/// retired manager unregisters first and a dangling entry is dropped on the
/// next sweep.
#[derive(Default)]
pub struct SequenceReaper {
    registered: Mutex<HashMap<(String, u64), ManagerRef>>,
}

impl SequenceReaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: re-registering the same (name, version) replaces the entry.
    pub async fn register_for_cleanup(&self, name: &str, version: u64, manager: ManagerRef) {
        let mut registered = self.registered.lock().await;
        registered.insert((name.to_string(), version), manager);
        debug!("Registered model {} version {} for cleanup", name, version);
    }

    /// Idempotent: unregistering an unknown (name, version) is a no-op.
    pub async fn unregister_from_cleanup(&self, name: &str, version: u64) {
        let mut registered = self.registered.lock().await;
        if registered.remove(&(name.to_string(), version)).is_some() {
            debug!("Unregistered model {} version {} from cleanup", name, version);
        }
    }

    /// Run one sweep over every registered manager; returns sequences removed.
    pub async fn sweep(&self) -> usize {
        let managers: Vec<((String, u64), ManagerRef)> = {
            let registered = self.registered.lock().await;
            registered
                .iter()
                .map(|(key, manager)| (key.clone(), manager.clone()))
                .collect()
        };

        let mut removed = 0;
        for ((name, version), manager) in managers {
            let Some(manager) = manager.upgrade() else {
                warn!(
                    "Dropping stale cleanup registration for model {} version {}",
                    name, version
                );
                self.registered.lock().await.remove(&(name, version));
                continue;
            };
            let mut manager = manager.lock().await;
            removed += manager.remove_idle_sequences();
            manager.mark_all_idle();
        }
        removed
    }

    /// Start the periodic sweep task; the returned handle stops and joins it.
    pub fn start(self: Arc<Self>, interval: Duration) -> ReaperHandle {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            info!("Starting sequence reaper with interval: {:?}", interval);
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; consume it so the first
            // sweep happens one full interval after startup
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        info!("Sequence reaper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = self.sweep().await;
                        if removed > 0 {
                            info!("Sequence reaper removed {} idle sequences", removed);
                        }
                    }
                }
            }
        });
        ReaperHandle { token, handle }
    }
}

/// Handle to a running reaper task.
pub struct ReaperHandle {
    token: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the task and wait for it to finish.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!("Sequence reaper task did not shut down cleanly: {}", e);
        }
    }
}
