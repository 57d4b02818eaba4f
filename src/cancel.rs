use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Batch-level cancellation flag. Cloning shares the flag; once raised it
/// stays raised for the lifetime of the batch.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
