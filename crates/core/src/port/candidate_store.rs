// Candidate Store Port
// Persisted, ordered candidate list (failover order = insertion order)

use crate::domain::Candidate;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No saved candidates")]
    NoHistory,

    #[error("IO error: {0}")]
    IoError(String),
}

/// Persistence of the candidate list
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Load the saved list
    ///
    /// # Errors
    /// - StoreError::NoHistory if nothing was ever saved
    async fn load(&self) -> Result<Vec<Candidate>, StoreError>;

    /// Replace the saved list
    ///
    /// Returns true once the whole list was written.
    async fn save(&self, candidates: &[Candidate]) -> Result<bool, StoreError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// In-memory store; `None` means nothing saved yet
    pub struct MemoryCandidateStore {
        saved: Mutex<Option<Vec<Candidate>>>,
        save_count: Mutex<usize>,
    }

    impl MemoryCandidateStore {
        pub fn empty() -> Self {
            Self {
                saved: Mutex::new(None),
                save_count: Mutex::new(0),
            }
        }

        pub fn with(candidates: Vec<Candidate>) -> Self {
            Self {
                saved: Mutex::new(Some(candidates)),
                save_count: Mutex::new(0),
            }
        }

        pub fn snapshot(&self) -> Option<Vec<Candidate>> {
            self.saved.lock().unwrap().clone()
        }

        pub fn paths(&self) -> Vec<String> {
            self.snapshot()
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.path)
                .collect()
        }

        pub fn save_count(&self) -> usize {
            *self.save_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl CandidateStore for MemoryCandidateStore {
        async fn load(&self) -> Result<Vec<Candidate>, StoreError> {
            self.saved
                .lock()
                .unwrap()
                .clone()
                .ok_or(StoreError::NoHistory)
        }

        async fn save(&self, candidates: &[Candidate]) -> Result<bool, StoreError> {
            *self.saved.lock().unwrap() = Some(candidates.to_vec());
            *self.save_count.lock().unwrap() += 1;
            Ok(true)
        }
    }
}
