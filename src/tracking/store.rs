use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::daily_log::{deserialize_day_logs, today_key, DayLog, Meal};
use crate::meal_aggregator::sum_day;
use crate::nutrition::summary::Totals;
use crate::tracking::persistence::{export_dump, KeyValueStore, PersistenceError};
use crate::tracking::targets::{MacroProgress, Targets, TargetsPatch};

/// The single key holding the whole serialized state.
pub const STORAGE_KEY: &str = "bitewise-state-v1";

/// Prefix for copies of state that could not be parsed.
pub const BACKUP_KEY_PREFIX: &str = "bitewise-state-v1.unreadable-";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct AppState {
    #[serde(default)]
    pub targets: Targets,
    #[serde(default, deserialize_with = "deserialize_day_logs")]
    pub logs: BTreeMap<NaiveDate, DayLog>,
}

impl AppState {
    /// Default targets and an empty log for `today`.
    pub fn fresh(today: NaiveDate) -> Self {
        let mut state = Self::default();
        state.ensure_day(today);
        state
    }

    fn ensure_day(&mut self, date: NaiveDate) -> &mut DayLog {
        self.logs.entry(date).or_insert_with(|| DayLog::new(date))
    }
}

enum PersistCommand {
    Save(String),
    Flush(oneshot::Sender<()>),
}

/// Owns the app state. Mutations commit in memory first, then a snapshot is
/// queued for a background task that writes it to the key-value store.
/// Write failures are logged and otherwise ignored.
///
/// Must be created inside a tokio runtime.
pub struct MacroStore {
    state: AppState,
    kv: Arc<dyn KeyValueStore>,
    tx: mpsc::UnboundedSender<PersistCommand>,
    /// Cleared when the persisted state could be neither read nor set aside.
    writable: bool,
}

impl MacroStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_state(kv, AppState::fresh(today_key()))
    }

    pub fn with_state(kv: Arc<dyn KeyValueStore>, state: AppState) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_persistence(Arc::clone(&kv), rx));
        Self {
            state,
            kv,
            tx,
            writable: true,
        }
    }

    /// Hydrates from the persisted key; today's log always exists afterwards.
    ///
    /// Unparseable state is copied under a [`BACKUP_KEY_PREFIX`] key before
    /// the store starts fresh. If that copy fails, or the key cannot be read
    /// at all, the store runs in memory only and never writes.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let today = today_key();
        let (mut state, writable) = match kv.get(STORAGE_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<AppState>(&raw) {
                Ok(state) => {
                    debug!(days = state.logs.len(), "Loaded persisted state");
                    (state, true)
                }
                Err(e) => {
                    warn!(error = %e, "Persisted state unreadable");
                    (AppState::default(), set_aside(kv.as_ref(), raw).await)
                }
            },
            Ok(None) => {
                info!("No persisted state, starting fresh");
                (AppState::default(), true)
            }
            Err(e) => {
                warn!(error = %e, "Could not read persisted state, changes will not be saved");
                (AppState::default(), false)
            }
        };
        state.ensure_day(today);
        let mut store = Self::with_state(kv, state);
        store.writable = writable;
        store
    }

    /// False when the store is running in memory only.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn targets(&self) -> &Targets {
        &self.state.targets
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayLog> {
        self.state.logs.get(&date)
    }

    pub fn logs(&self) -> &BTreeMap<NaiveDate, DayLog> {
        &self.state.logs
    }

    pub fn snapshot(&self) -> AppState {
        self.state.clone()
    }

    pub fn day_totals(&self, date: NaiveDate) -> Totals {
        sum_day(self.day(date))
    }

    pub fn progress(&self, date: NaiveDate) -> MacroProgress {
        MacroProgress::compute(&self.day_totals(date), &self.state.targets)
    }

    pub fn set_targets(&mut self, patch: &TargetsPatch) {
        self.state.targets.apply(patch);
        self.persist();
    }

    /// Prepends `meal` to the log for `date`, creating the log if needed.
    pub fn add_meal(&mut self, date: NaiveDate, meal: Meal) {
        self.state.ensure_day(date).meals.insert(0, meal);
        self.persist();
    }

    /// Resolves once every snapshot queued so far has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(PersistCommand::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Waits for pending writes, then dumps every persisted key.
    pub async fn export(&self) -> Result<serde_json::Value, PersistenceError> {
        self.flush().await;
        export_dump(self.kv.as_ref()).await
    }

    /// Clears all persisted data and resets memory to a fresh state.
    pub async fn reset(&mut self) -> Result<(), PersistenceError> {
        self.flush().await;
        self.kv.clear().await?;
        self.state = AppState::fresh(today_key());
        self.writable = true;
        info!("Local data cleared");
        Ok(())
    }

    fn persist(&self) {
        if !self.writable {
            debug!("Store is read-only, skipping save");
            return;
        }
        let snapshot = match serde_json::to_string(&self.state) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Failed to serialize app state");
                return;
            }
        };
        if self.tx.send(PersistCommand::Save(snapshot)).is_err() {
            warn!("Persistence worker stopped, state not saved");
        }
    }
}

/// Copies unparseable state to a fresh backup key. Returns whether it is
/// safe to overwrite the main key afterwards.
async fn set_aside(kv: &dyn KeyValueStore, raw: String) -> bool {
    let backup_key = format!("{}{}", BACKUP_KEY_PREFIX, Utc::now().timestamp_millis());
    match kv.set(&backup_key, raw).await {
        Ok(()) => {
            warn!(backup_key = %backup_key, "Unreadable state backed up, starting fresh");
            true
        }
        Err(e) => {
            warn!(error = %e, "Could not back up unreadable state, changes will not be saved");
            false
        }
    }
}

async fn run_persistence(kv: Arc<dyn KeyValueStore>, mut rx: mpsc::UnboundedReceiver<PersistCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            PersistCommand::Save(snapshot) => {
                if let Err(e) = kv.set(STORAGE_KEY, snapshot).await {
                    warn!(error = %e, "Failed to persist app state");
                }
            }
            PersistCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
