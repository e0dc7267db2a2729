use crate::pipeline::ConversionStage;

/// Status of one finished batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Converted,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Converted => "converted",
            Self::Failed => "failed",
        }
    }
}

/// Single source of truth for batch progress.
///
/// Holds only progress and results; per-item conversion scratch state lives in
/// [`crate::pipeline::ConversionContext`] and never lands here.
///
/// # Thread Safety
///
/// `BatchState` is wrapped in `Arc<RwLock<BatchState>>` by [`crate::state::StateManager`].
/// Mutate it through [`update()`](crate::state::StateManager::update) so change
/// events are emitted.
#[derive(Clone, Debug, Default)]
pub struct BatchState {
    // Runtime state
    pub is_running: bool,
    pub current_item: Option<String>,
    pub current_stage: Option<ConversionStage>,

    /// Item currently waiting for caller input, if any.
    pub suspended_item: Option<String>,

    // Progress state
    pub progress: usize,
    pub total_items: usize,

    // Results, in completion order
    pub converted_items: Vec<String>,
    pub failed_items: Vec<String>,

    pub total_bytes_written: u64,
}

impl BatchState {
    /// Get current batch statistics.
    ///
    /// Returns a tuple of (converted, failed, total).
    pub fn batch_stats(&self) -> (usize, usize, usize) {
        (
            self.converted_items.len(),
            self.failed_items.len(),
            self.total_items,
        )
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended_item.is_some()
    }

    /// Reset all batch-related state to initial values.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Add an item processing result.
    pub fn add_result(&mut self, item: String, status: ItemStatus) {
        match status {
            ItemStatus::Converted => self.converted_items.push(item),
            ItemStatus::Failed => self.failed_items.push(item),
        }
        self.progress += 1;
    }

    /// Get a formatted string summarizing the batch.
    pub fn summary(&self) -> String {
        if self.progress == 0 {
            return String::new();
        }

        format!(
            "{} converted, {} failed ({:.2} MB written)",
            self.converted_items.len(),
            self.failed_items.len(),
            self.total_bytes_written as f64 / 1024.0 / 1024.0
        )
    }
}
