//! Authoritative in-memory scenario state.
//!
//! Every mutation is an [`Action`] folded through [`ScenarioStore::dispatch`].
//! A dispatch either commits completely or leaves the state untouched, and each
//! committed change is published on a watch channel as a [`StoreChange`]
//! carrying the new revision and a full snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::types::{Scenario, ScenarioId, ScenarioPatch};
use super::validation::{ErrorMap, validate};

/// Flattened, serializable view of the store. Scenarios are ordered by
/// `created_at`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub scenarios: Vec<Scenario>,
    pub current_scenario_id: Option<ScenarioId>,
    pub comparison_mode: bool,
    pub selected_scenarios: Vec<ScenarioId>,
}

#[derive(Clone, Debug)]
pub struct StoreChange {
    pub revision: u64,
    pub hydrated: bool,
    pub snapshot: Arc<StoreSnapshot>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    CreateScenario {
        id: ScenarioId,
        name: String,
        created_at: DateTime<Utc>,
    },
    SetCurrentScenario(ScenarioId),
    UpdateScenario {
        id: ScenarioId,
        patch: ScenarioPatch,
    },
    DeleteScenario(ScenarioId),
    SetComparisonMode(bool),
    ToggleScenarioSelection(ScenarioId),
    /// Marks the store hydrated, replacing state when a snapshot is given.
    Hydrate(Option<StoreSnapshot>),
}

#[derive(Debug)]
pub struct ScenarioStore {
    scenarios: IndexMap<ScenarioId, Scenario>,
    current_scenario_id: Option<ScenarioId>,
    comparison_mode: bool,
    selected_scenarios: IndexSet<ScenarioId>,
    hydrated: bool,
    revision: u64,
    changes: watch::Sender<StoreChange>,
}

impl Default for ScenarioStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(StoreChange {
            revision: 0,
            hydrated: false,
            snapshot: Arc::new(StoreSnapshot::default()),
        });
        Self {
            scenarios: IndexMap::new(),
            current_scenario_id: None,
            comparison_mode: false,
            selected_scenarios: IndexSet::new(),
            hydrated: false,
            revision: 0,
            changes,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Applies one action. Returns whether the state changed; only changes
    /// bump the revision and notify subscribers.
    pub fn dispatch(&mut self, action: Action) -> bool {
        let changed = self.apply(action);
        if changed {
            self.revision += 1;
            self.changes.send_replace(StoreChange {
                revision: self.revision,
                hydrated: self.hydrated,
                snapshot: Arc::new(self.snapshot()),
            });
        }
        changed
    }

    fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::CreateScenario {
                id,
                name,
                created_at,
            } => {
                if self.scenarios.contains_key(&id) {
                    return false;
                }
                let scenario = Scenario::new(id.clone(), name, created_at);
                self.scenarios.insert(id, scenario);
                true
            }
            Action::SetCurrentScenario(id) => {
                if !self.scenarios.contains_key(&id)
                    || self.current_scenario_id.as_ref() == Some(&id)
                {
                    return false;
                }
                self.current_scenario_id = Some(id);
                true
            }
            Action::UpdateScenario { id, patch } => {
                if patch.is_empty() {
                    return false;
                }
                let Some(scenario) = self.scenarios.get_mut(&id) else {
                    return false;
                };
                if let Some(name) = patch.name {
                    scenario.name = name;
                }
                if let Some(data) = patch.data {
                    scenario.data = data.with_projections();
                }
                true
            }
            Action::DeleteScenario(id) => {
                if self.scenarios.shift_remove(&id).is_none() {
                    return false;
                }
                self.selected_scenarios.shift_remove(&id);
                if self.current_scenario_id.as_ref() == Some(&id) {
                    self.current_scenario_id = None;
                }
                true
            }
            Action::SetComparisonMode(enabled) => {
                if self.comparison_mode == enabled {
                    return false;
                }
                self.comparison_mode = enabled;
                if !enabled {
                    self.selected_scenarios.clear();
                }
                true
            }
            Action::ToggleScenarioSelection(id) => {
                if !self.scenarios.contains_key(&id) {
                    return false;
                }
                if !self.selected_scenarios.shift_remove(&id) {
                    self.selected_scenarios.insert(id);
                }
                true
            }
            Action::Hydrate(snapshot) => {
                self.hydrated = true;
                if let Some(snapshot) = snapshot {
                    self.replace_state(snapshot);
                }
                true
            }
        }
    }

    fn replace_state(&mut self, snapshot: StoreSnapshot) {
        self.scenarios = snapshot
            .scenarios
            .into_iter()
            .map(|scenario| (scenario.id.clone(), scenario))
            .collect();
        self.current_scenario_id = snapshot
            .current_scenario_id
            .filter(|id| self.scenarios.contains_key(id));
        self.comparison_mode = snapshot.comparison_mode;
        self.selected_scenarios = if snapshot.comparison_mode {
            snapshot
                .selected_scenarios
                .into_iter()
                .filter(|id| self.scenarios.contains_key(id))
                .collect()
        } else {
            IndexSet::new()
        };
    }

    pub fn create_scenario(&mut self, name: impl Into<String>) -> ScenarioId {
        let id = ScenarioId::generate();
        self.dispatch(Action::CreateScenario {
            id: id.clone(),
            name: name.into(),
            created_at: Utc::now(),
        });
        id
    }

    pub fn set_current_scenario(&mut self, id: &ScenarioId) {
        self.dispatch(Action::SetCurrentScenario(id.clone()));
    }

    pub fn update_scenario(&mut self, id: &ScenarioId, patch: ScenarioPatch) {
        self.dispatch(Action::UpdateScenario {
            id: id.clone(),
            patch,
        });
    }

    pub fn delete_scenario(&mut self, id: &ScenarioId) {
        self.dispatch(Action::DeleteScenario(id.clone()));
    }

    pub fn set_comparison_mode(&mut self, enabled: bool) {
        self.dispatch(Action::SetComparisonMode(enabled));
    }

    pub fn toggle_scenario_selection(&mut self, id: &ScenarioId) {
        self.dispatch(Action::ToggleScenarioSelection(id.clone()));
    }

    pub fn scenario(&self, id: &ScenarioId) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    pub fn contains(&self, id: &ScenarioId) -> bool {
        self.scenarios.contains_key(id)
    }

    /// Scenarios in creation order.
    pub fn scenarios(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.values()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn current_scenario_id(&self) -> Option<&ScenarioId> {
        self.current_scenario_id.as_ref()
    }

    pub fn current_scenario(&self) -> Option<&Scenario> {
        self.current_scenario_id
            .as_ref()
            .and_then(|id| self.scenarios.get(id))
    }

    pub fn comparison_mode(&self) -> bool {
        self.comparison_mode
    }

    pub fn selected_scenario_ids(&self) -> impl Iterator<Item = &ScenarioId> {
        self.selected_scenarios.iter()
    }

    pub fn is_selected(&self, id: &ScenarioId) -> bool {
        self.selected_scenarios.contains(id)
    }

    /// Selected scenarios in selection order.
    pub fn selected_scenarios(&self) -> Vec<&Scenario> {
        self.selected_scenarios
            .iter()
            .filter_map(|id| self.scenarios.get(id))
            .collect()
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn errors_for(&self, id: &ScenarioId) -> Option<ErrorMap> {
        self.scenarios.get(id).map(|scenario| validate(&scenario.data))
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let mut scenarios: Vec<Scenario> = self.scenarios.values().cloned().collect();
        scenarios.sort_by_key(|scenario| scenario.created_at);
        StoreSnapshot {
            scenarios,
            current_scenario_id: self.current_scenario_id.clone(),
            comparison_mode: self.comparison_mode,
            selected_scenarios: self.selected_scenarios.iter().cloned().collect(),
        }
    }
}
