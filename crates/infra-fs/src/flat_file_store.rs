// Flat-file CandidateStore Implementation
// One record per line: `location;;path`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use vmate_core::domain::{Candidate, Location};
use vmate_core::port::{CandidateStore, StoreError};

/// Separator between the location and the path of a record
pub const RECORD_DELIMITER: &str = ";;";

pub struct FlatFileCandidateStore {
    path: PathBuf,
}

impl FlatFileCandidateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn map_io_error(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::IoError(format!("{}: {}", path.display(), err))
}

/// Parse one record; `None` for lines that are not `location;;path`
fn parse_record(line: &str) -> Option<Candidate> {
    let (location, path) = line.trim().split_once(RECORD_DELIMITER)?;
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    Some(Candidate::with_location(path, Location::parse(location)))
}

fn format_record(candidate: &Candidate) -> String {
    format!(
        "{}{}{}\n",
        candidate.location, RECORD_DELIMITER, candidate.path
    )
}

#[async_trait]
impl CandidateStore for FlatFileCandidateStore {
    async fn load(&self) -> Result<Vec<Candidate>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NoHistory)
            }
            Err(e) => return Err(map_io_error(&self.path, e)),
        };

        let mut candidates = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_record(line) {
                Some(candidate) => candidates.push(candidate),
                None => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    "Skipping malformed history record"
                ),
            }
        }

        debug!(path = %self.path.display(), count = candidates.len(), "History loaded");
        Ok(candidates)
    }

    async fn save(&self, candidates: &[Candidate]) -> Result<bool, StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(parent, e))?;
        }

        let body: String = candidates.iter().map(format_record).collect();
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| map_io_error(&self.path, e))?;

        info!(path = %self.path.display(), count = candidates.len(), "History saved");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FlatFileCandidateStore {
        FlatFileCandidateStore::new(dir.path().join("nested").join("recent.txt"))
    }

    #[tokio::test]
    async fn test_missing_file_is_no_history() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let result = store.load().await;
        assert!(matches!(result, Err(StoreError::NoHistory)));
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let saved = vec![
            Candidate::with_location("/vpn/b.ovpn", Location::Country("DE".to_string())),
            Candidate::with_location("/vpn/a.ovpn", Location::ApiError),
            Candidate::with_location("/vpn/c.ovpn", Location::Unknown),
        ];
        assert!(store.save(&saved).await.unwrap());

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            raw,
            "DE;;/vpn/b.ovpn\nERR_API;;/vpn/a.ovpn\nUNKNOWN;;/vpn/c.ovpn\n"
        );
        assert_eq!(store.load().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .save(&[Candidate::with_location("/a.ovpn", Location::Unknown)])
            .await
            .unwrap();
        store.save(&[]).await.unwrap();

        // An empty saved list is still history, just exhausted
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recent.txt");
        std::fs::write(
            &path,
            "JP;;/vpn/jp.ovpn\ngarbage line\n\nUS;;\r\nNL;; /vpn/my;;odd.ovpn \r\n",
        )
        .unwrap();

        let store = FlatFileCandidateStore::new(&path);
        let loaded = store.load().await.unwrap();

        assert_eq!(
            loaded,
            vec![
                Candidate::with_location("/vpn/jp.ovpn", Location::Country("JP".to_string())),
                Candidate::with_location("/vpn/my;;odd.ovpn", Location::Country("NL".to_string())),
            ]
        );
    }
}
