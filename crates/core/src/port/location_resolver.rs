// Location Resolver Port
// Maps a config's remote endpoint to a country code

use crate::domain::Location;
use async_trait::async_trait;

/// Location lookup
///
/// Never fails: lookup problems degrade to `Location::Unknown` or
/// `Location::ApiError`.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// Resolve the location of the server named in the config at `config_path`
    async fn resolve(&self, config_path: &str) -> Location;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fixed answers per path, with a fallback
    pub struct StaticLocationResolver {
        answers: HashMap<String, Location>,
        fallback: Location,
        calls: AtomicUsize,
    }

    impl StaticLocationResolver {
        pub fn new(fallback: Location) -> Self {
            Self {
                answers: HashMap::new(),
                fallback,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_answer(mut self, path: &str, location: Location) -> Self {
            self.answers.insert(path.to_string(), location);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LocationResolver for StaticLocationResolver {
        async fn resolve(&self, config_path: &str) -> Location {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .get(config_path)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }
}
