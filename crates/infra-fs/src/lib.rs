// vmate Infrastructure - Filesystem Adapters
// Implements: CandidateStore (flat file), config discovery, cipher rewrite

mod cipher;
mod discovery;
mod flat_file_store;

pub use cipher::{modify_configs, CipherReport, MODIFIED_MARKER, NEW_CIPHER, OLD_CIPHER};
pub use discovery::{discover_configs, DiscoveryError, CONFIG_EXTENSION};
pub use flat_file_store::{FlatFileCandidateStore, RECORD_DELIMITER};
