//! Application state management

use crate::inference::InferenceEngine;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Application state shared across handlers
///
/// The engine is immutable after startup, so handlers share it without locks.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<InferenceEngine>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: InferenceEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            started_at: Instant::now(),
        }
    }

    /// Short id used to tag a request's log span
    pub fn generate_id() -> String {
        Uuid::new_v4().simple().to_string()[..8].to_string()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
