use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-device mutual exclusion.
///
/// The synchronous ingestion path and the detached success-rate recompute for
/// one device must not interleave: find-or-create races would mint two device
/// rows, concurrent merges would drop receptions. Handles are retained per
/// device id, so growth is bounded by the device population rather than
/// message volume.
#[derive(Default)]
pub struct DeviceLockRegistry {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DeviceLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for the device's lock, created on first use
    pub fn acquire(&self, device_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("device lock registry poisoned");
        locks.entry(device_id.to_string()).or_default().clone()
    }

    #[cfg(test)]
    fn tracked_devices(&self) -> usize {
        self.locks.lock().expect("device lock registry poisoned").len()
    }
}
