//! Durable storage for the scenario store.
//!
//! The whole store is kept as one versioned JSON document under a single key.
//! On startup [`PersistenceGateway::load`] restores it once; a document that
//! does not parse or carries another version is discarded and the store starts
//! from its defaults. Afterwards the persister task started by
//! [`PersistenceGateway::spawn`] watches store changes and writes the latest
//! snapshot once the debounce window has passed without further changes.

mod blob;

use std::sync::Arc;
use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

use crate::core::{Action, Scenario, ScenarioId, ScenarioStore, StoreChange, StoreSnapshot};

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore, StorageError};

pub const SNAPSHOT_VERSION: u32 = 1;
pub const DEFAULT_STORAGE_KEY: &str = "scenario-store";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub storage_key: String,
    pub debounce: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub version: u32,
    #[serde(flatten)]
    pub state: StoreSnapshot,
}

#[derive(Serialize)]
struct PersistedSnapshotRef<'a> {
    version: u32,
    #[serde(flatten)]
    state: &'a StoreSnapshot,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscardReason {
    Corrupt(String),
    VersionMismatch { found: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Hydration {
    Missing,
    Discarded(DiscardReason),
    Empty,
    Restored(StoreSnapshot),
}

impl Hydration {
    pub fn into_snapshot(self) -> Option<StoreSnapshot> {
        match self {
            Hydration::Restored(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

impl ScenarioStore {
    /// Marks the store hydrated; only a restored snapshot replaces state.
    pub fn apply_hydration(&mut self, hydration: Hydration) {
        self.dispatch(Action::Hydrate(hydration.into_snapshot()));
    }
}

pub fn encode_snapshot(state: &StoreSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(&PersistedSnapshotRef {
        version: SNAPSHOT_VERSION,
        state,
    })
}

fn decode_snapshot(raw: &str) -> Result<StoreSnapshot, DiscardReason> {
    let probe: VersionProbe =
        serde_json::from_str(raw).map_err(|e| DiscardReason::Corrupt(e.to_string()))?;
    if probe.version != SNAPSHOT_VERSION {
        return Err(DiscardReason::VersionMismatch {
            found: probe.version,
        });
    }
    let persisted: PersistedSnapshot =
        serde_json::from_str(raw).map_err(|e| DiscardReason::Corrupt(e.to_string()))?;
    Ok(persisted.state)
}

/// Normalizes a decoded snapshot: duplicate ids keep the last entry, scenarios
/// are ordered by creation time, projections are recomputed, and dangling
/// current or selected ids are dropped. A missing current id falls back to the
/// oldest scenario.
pub fn restore(snapshot: StoreSnapshot) -> StoreSnapshot {
    let mut by_id: IndexMap<ScenarioId, Scenario> = IndexMap::new();
    for scenario in snapshot.scenarios {
        by_id.insert(scenario.id.clone(), scenario);
    }

    let mut scenarios: Vec<Scenario> = by_id
        .into_values()
        .map(|mut scenario| {
            scenario.data = scenario.data.with_projections();
            scenario
        })
        .collect();
    scenarios.sort_by_key(|scenario| scenario.created_at);

    let exists = |id: &ScenarioId| scenarios.iter().any(|s| &s.id == id);
    let current_scenario_id = snapshot
        .current_scenario_id
        .filter(|id| exists(id))
        .or_else(|| scenarios.first().map(|s| s.id.clone()));
    let selected_scenarios = if snapshot.comparison_mode {
        snapshot
            .selected_scenarios
            .into_iter()
            .filter(|id| exists(id))
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    } else {
        Vec::new()
    };

    StoreSnapshot {
        scenarios,
        current_scenario_id,
        comparison_mode: snapshot.comparison_mode,
        selected_scenarios,
    }
}

pub struct PersistenceGateway<B> {
    blobs: Arc<B>,
    config: PersistenceConfig,
}

impl<B: BlobStore> PersistenceGateway<B> {
    pub fn new(blobs: B, config: PersistenceConfig) -> Self {
        Self::with_shared(Arc::new(blobs), config)
    }

    pub fn with_shared(blobs: Arc<B>, config: PersistenceConfig) -> Self {
        Self { blobs, config }
    }

    pub async fn load(&self) -> Result<Hydration, StorageError> {
        let key = &self.config.storage_key;
        let Some(raw) = self.blobs.read(key).await? else {
            info!("no persisted scenarios under `{key}`, starting from defaults");
            return Ok(Hydration::Missing);
        };

        match decode_snapshot(&raw) {
            Ok(snapshot) if snapshot.scenarios.is_empty() => {
                info!("persisted snapshot under `{key}` has no scenarios");
                Ok(Hydration::Empty)
            }
            Ok(snapshot) => {
                let restored = restore(snapshot);
                info!(
                    "restored {} scenario(s) from `{key}`",
                    restored.scenarios.len()
                );
                Ok(Hydration::Restored(restored))
            }
            Err(reason) => {
                warn!("discarding persisted snapshot under `{key}`: {reason:?}");
                self.blobs.remove(key).await?;
                Ok(Hydration::Discarded(reason))
            }
        }
    }

    /// Loads the persisted snapshot and applies it. The store is hydrated
    /// afterwards whatever the blob contained.
    pub async fn hydrate(&self, store: &mut ScenarioStore) -> Result<Hydration, StorageError> {
        let hydration = self.load().await?;
        store.apply_hydration(hydration.clone());
        Ok(hydration)
    }

    pub async fn persist(&self, state: &StoreSnapshot) -> Result<(), PersistError> {
        write_snapshot(self.blobs.as_ref(), &self.config.storage_key, state).await
    }

    /// Removes the persisted document. In-memory state is left alone.
    pub async fn clear(&self) -> Result<(), StorageError> {
        info!("clearing persisted scenarios under `{}`", self.config.storage_key);
        self.blobs.remove(&self.config.storage_key).await
    }

    /// Starts the background writer for `changes`. The task ends once the
    /// store is dropped, flushing a pending write first.
    pub fn spawn(&self, changes: watch::Receiver<StoreChange>) -> PersisterHandle {
        let persister = Persister {
            blobs: Arc::clone(&self.blobs),
            key: self.config.storage_key.clone(),
            debounce: self.config.debounce,
        };
        PersisterHandle {
            task: tokio::spawn(persister.run(changes)),
        }
    }
}

async fn write_snapshot<B: BlobStore>(
    blobs: &B,
    key: &str,
    state: &StoreSnapshot,
) -> Result<(), PersistError> {
    let encoded = encode_snapshot(state)?;
    blobs.write(key, &encoded).await?;
    Ok(())
}

struct Persister<B> {
    blobs: Arc<B>,
    key: String,
    debounce: Duration,
}

impl<B: BlobStore> Persister<B> {
    async fn run(self, mut changes: watch::Receiver<StoreChange>) {
        let timer = sleep(self.debounce);
        tokio::pin!(timer);
        let mut pending: Option<Arc<StoreSnapshot>> = None;

        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        if let Some(snapshot) = pending.take() {
                            debug!("store closed, flushing pending snapshot");
                            self.write(&snapshot).await;
                        }
                        break;
                    }
                    let change = changes.borrow_and_update().clone();
                    if !change.hydrated {
                        debug!("ignoring revision {} before hydration", change.revision);
                        continue;
                    }
                    pending = Some(change.snapshot);
                    timer.as_mut().reset(Instant::now() + self.debounce);
                    debug!("scheduled write for revision {}", change.revision);
                }
                () = &mut timer, if pending.is_some() => {
                    if let Some(snapshot) = pending.take() {
                        self.write(&snapshot).await;
                    }
                }
            }
        }
    }

    async fn write(&self, snapshot: &StoreSnapshot) {
        match write_snapshot(self.blobs.as_ref(), &self.key, snapshot).await {
            Ok(()) => debug!(
                "persisted {} scenario(s) to `{}`",
                snapshot.scenarios.len(),
                self.key
            ),
            Err(e) => error!("failed to persist scenarios to `{}`: {e}", self.key),
        }
    }
}

pub struct PersisterHandle {
    task: JoinHandle<()>,
}

impl PersisterHandle {
    /// Waits for the persister to finish. It finishes once every handle to
    /// the store has been dropped.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("persister task failed: {e}");
        }
    }
}
