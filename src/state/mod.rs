// State management module
//
// This module provides the StateManager which wraps BatchState with thread-safe
// access using Arc<RwLock<T>> and emits change events for observers.

use crate::models::{BatchState, ItemStatus};
use crate::pipeline::ConversionStage;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when batch state is modified
///
/// Observers (the CLI progress log, tests) subscribe instead of polling.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A batch has started
    BatchStarted { total_items: usize },

    /// Progress has been updated
    ProgressUpdated {
        current: usize,
        total: usize,
        current_item: Option<String>,
    },

    /// The current item moved to a new stage
    StageChanged { item: String, stage: ConversionStage },

    /// An item finished
    ItemProcessed {
        item: String,
        status: String,
        message: String,
    },

    /// The queue is halted waiting for caller input on an item
    ItemSuspended { item: String },

    /// The batch has finished
    BatchFinished { converted: usize, failed: usize },

    /// State has been reset
    StateReset,
}

/// Thread-safe batch state manager with event emission
///
/// - Provides thread-safe access to [`BatchState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// # Usage
///
/// - [`read()`](Self::read) for reading a field without cloning
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
///
/// # Related Types
///
/// - [`crate::models::BatchState`]: The underlying state structure
/// - [`crate::pipeline::BatchQueue`]: The only writer during a run
pub struct StateManager {
    state: Arc<RwLock<BatchState>>,

    /// Multiple subscribers can listen for state changes
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(BatchState::default())),
            state_tx,
        }
    }

    /// Get a clone of the current state
    pub fn snapshot(&self) -> BatchState {
        self.state.read().unwrap().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let suspended = state_manager.read(|state| state.is_suspended());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&BatchState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// # Arguments
    /// * `update_fn` - A function that mutates the state
    ///
    /// # Returns
    /// A vector of StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut BatchState),
    {
        let mut state = self.state.write().unwrap();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);
        for change in &changes {
            // Nobody listening is fine
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(&self, old: &BatchState, new: &BatchState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.is_running != new.is_running {
            if new.is_running {
                changes.push(StateChange::BatchStarted {
                    total_items: new.total_items,
                });
            } else {
                changes.push(StateChange::BatchFinished {
                    converted: new.converted_items.len(),
                    failed: new.failed_items.len(),
                });
            }
        }

        if old.progress != new.progress
            || old.total_items != new.total_items
            || old.current_item != new.current_item
        {
            changes.push(StateChange::ProgressUpdated {
                current: new.progress,
                total: new.total_items,
                current_item: new.current_item.clone(),
            });
        }

        if old.current_stage != new.current_stage {
            if let (Some(item), Some(stage)) = (&new.current_item, new.current_stage) {
                changes.push(StateChange::StageChanged {
                    item: item.clone(),
                    stage,
                });
            }
        }

        if old.suspended_item != new.suspended_item {
            if let Some(item) = &new.suspended_item {
                changes.push(StateChange::ItemSuspended { item: item.clone() });
            }
        }

        changes
    }

    // Convenience methods for common state updates

    /// Start a batch
    pub fn start_batch(&self, total_items: usize) -> Vec<StateChange> {
        self.update(|state| {
            state.reset();
            state.is_running = true;
            state.total_items = total_items;
        })
    }

    /// Grow the batch while it runs
    pub fn add_items(&self, count: usize) -> Vec<StateChange> {
        self.update(|state| state.total_items += count)
    }

    /// Finish the batch
    pub fn finish_batch(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.is_running = false;
            state.current_item = None;
            state.current_stage = None;
            state.suspended_item = None;
        })
    }

    /// Set the item being converted and its stage
    pub fn update_progress(&self, item: String, stage: ConversionStage) -> Vec<StateChange> {
        self.update(|state| {
            state.current_item = Some(item);
            state.current_stage = Some(stage);
        })
    }

    /// Mark an item as waiting for caller input
    pub fn suspend_item(&self, item: String) -> Vec<StateChange> {
        self.update(|state| {
            state.current_stage = None;
            state.suspended_item = Some(item);
        })
    }

    /// Clear the suspension after input was supplied
    pub fn resume_item(&self) -> Vec<StateChange> {
        self.update(|state| state.suspended_item = None)
    }

    /// Record the result of converting an item
    ///
    /// # Arguments
    /// * `item` - Label of the item
    /// * `status` - Converted or failed
    /// * `message` - Output filename or failure reason
    /// * `bytes_written` - Package size for converted items
    pub fn add_item_result(
        &self,
        item: String,
        status: ItemStatus,
        message: String,
        bytes_written: u64,
    ) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.add_result(item.clone(), status);
            state.total_bytes_written += bytes_written;
            state.suspended_item = None;
        });

        let item_event = StateChange::ItemProcessed {
            item,
            status: status.as_str().to_string(),
            message,
        };
        let _ = self.state_tx.send(item_event.clone());
        changes.push(item_event);

        changes
    }

    /// Reset all batch state
    pub fn reset_batch_state(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| state.reset());

        let reset_event = StateChange::StateReset;
        let _ = self.state_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }

    /// Get an Arc reference to the state
    pub fn state_arc(&self) -> Arc<RwLock<BatchState>> {
        Arc::clone(&self.state)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(!state.is_running);
        assert!(!state.is_suspended());
        assert_eq!(state.progress, 0);
    }

    #[test]
    fn test_update_with_change_detection() {
        let manager = StateManager::new();

        let changes = manager.update(|state| {
            state.is_running = true;
            state.total_items = 10;
        });

        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], StateChange::BatchStarted { total_items: 10 }));
        assert!(matches!(changes[1], StateChange::ProgressUpdated { .. }));
    }

    #[test]
    fn test_start_and_finish_batch() {
        let manager = StateManager::new();

        let changes = manager.start_batch(2);
        assert!(matches!(changes[0], StateChange::BatchStarted { total_items: 2 }));

        manager.add_item_result("a.zip".to_string(), ItemStatus::Converted, "a.arcpkg".to_string(), 10);
        let changes = manager.finish_batch();
        assert!(matches!(
            changes[0],
            StateChange::BatchFinished { converted: 1, failed: 0 }
        ));
        assert!(!manager.snapshot().is_running);
    }

    #[test]
    fn test_stage_changes() {
        let manager = StateManager::new();

        let changes = manager.update_progress("a.zip".to_string(), ConversionStage::Reading);
        assert!(changes.iter().any(|c| matches!(
            c,
            StateChange::StageChanged { stage: ConversionStage::Reading, .. }
        )));

        let changes = manager.update_progress("a.zip".to_string(), ConversionStage::Reading);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_suspend_and_resume() {
        let manager = StateManager::new();
        manager.start_batch(1);

        let changes = manager.suspend_item("a.zip".to_string());
        assert!(changes.contains(&StateChange::ItemSuspended {
            item: "a.zip".to_string()
        }));
        assert!(manager.read(|s| s.is_suspended()));

        manager.resume_item();
        assert!(!manager.read(|s| s.is_suspended()));
    }

    #[test]
    fn test_add_item_result() {
        let manager = StateManager::new();
        manager.start_batch(2);

        let changes = manager.add_item_result(
            "a.zip".to_string(),
            ItemStatus::Failed,
            "Missing required files: base.ogg".to_string(),
            0,
        );
        assert!(changes.iter().any(|c| matches!(c, StateChange::ItemProcessed { .. })));

        manager.add_item_result("b.zip".to_string(), ItemStatus::Converted, "b.arcpkg".to_string(), 2048);

        let state = manager.snapshot();
        assert_eq!(state.batch_stats(), (1, 1, 2));
        assert_eq!(state.total_bytes_written, 2048);
    }

    #[test]
    fn test_reset_batch_state() {
        let manager = StateManager::new();
        manager.start_batch(1);
        manager.add_item_result("a.zip".to_string(), ItemStatus::Converted, "ok".to_string(), 1);

        let changes = manager.reset_batch_state();
        assert!(changes.iter().any(|c| matches!(c, StateChange::StateReset)));

        let state = manager.snapshot();
        assert!(!state.is_running);
        assert_eq!(state.total_items, 0);
        assert!(state.converted_items.is_empty());
    }

    #[test]
    fn test_subscribe_to_changes() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.update(|state| state.is_running = true);

        let event = rx.try_recv();
        assert!(matches!(event.unwrap(), StateChange::BatchStarted { .. }));
    }

    #[test]
    fn test_clone_state_manager() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.update(|state| state.progress = 10);

        assert_eq!(manager2.snapshot().progress, 10);
    }

    #[test]
    fn test_state_arc() {
        let manager = StateManager::new();
        let state_arc = manager.state_arc();
        {
            let mut state = state_arc.write().unwrap();
            state.progress = 99;
        }
        assert_eq!(manager.read(|s| s.progress), 99);
    }
}
