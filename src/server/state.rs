//! Shared server state: loaded models and the idle sequence reaper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::inference::StatefulModelInstance;
use crate::sequence::{ReaperHandle, SequenceReaper};

/// Shared state behind the HTTP surface.
#[derive(Clone)]
pub struct ServerState {
    /// Loaded model instances by name
    models: Arc<RwLock<HashMap<String, Arc<StatefulModelInstance>>>>,

    /// Process-wide idle sequence reaper
    reaper: Arc<SequenceReaper>,

    /// Running reaper task, held for shutdown
    reaper_task: Arc<Mutex<Option<ReaperHandle>>>,
}

impl ServerState {
    /// Create the state and start the reaper with the configured interval.
    pub fn new(config: &ServerConfig) -> Self {
        let reaper = Arc::new(SequenceReaper::new());
        let interval = Duration::from_secs(config.sequence_cleaner_interval * 60);
        let handle = Arc::clone(&reaper).start(interval);
        info!(
            "Sequence cleaner interval: {} minutes",
            config.sequence_cleaner_interval
        );
        Self {
            models: Arc::new(RwLock::new(HashMap::new())),
            reaper,
            reaper_task: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// The reaper instances register against.
    pub fn reaper(&self) -> &Arc<SequenceReaper> {
        &self.reaper
    }

    pub async fn add_model(&self, instance: Arc<StatefulModelInstance>) {
        let mut models = self.models.write().await;
        models.insert(instance.model_name().to_string(), instance);
    }

    pub async fn get_model(&self, name: &str) -> Result<Arc<StatefulModelInstance>> {
        let models = self.models.read().await;
        models.get(name).cloned().ok_or_else(|| Error::ModelMissing {
            name: name.to_string(),
        })
    }

    /// Retire one model and drop it from the map.
    pub async fn remove_model(&self, name: &str) -> Result<()> {
        let instance = {
            let mut models = self.models.write().await;
            models.remove(name).ok_or_else(|| Error::ModelMissing {
                name: name.to_string(),
            })?
        };
        instance.retire().await;
        Ok(())
    }

    /// Ready once at least one model is loaded.
    pub async fn is_ready(&self) -> bool {
        !self.models.read().await.is_empty()
    }

    /// Stop the reaper, then retire every loaded model.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.reaper_task.lock().await.take() {
            handle.stop().await;
        }
        let instances: Vec<_> = {
            let mut models = self.models.write().await;
            models.drain().map(|(_, instance)| instance).collect()
        };
        join_all(instances.iter().map(|instance| instance.retire())).await;
        info!("Server state shut down");
    }
}
