// Config discovery
// Recursive walk collecting client configs

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File suffix of a client config
pub const CONFIG_EXTENSION: &str = ".ovpn";

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Config directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Cannot walk {path}: {reason}")]
    Walk { path: PathBuf, reason: String },
}

/// Every `*.ovpn` file under `root`, in walk order (sorted per directory)
///
/// Subtrees that cannot be read for lack of permission are skipped; any other
/// walk error aborts.
pub fn discover_configs(root: &Path) -> Result<Vec<String>, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::NotFound(root.to_path_buf()));
    }

    let mut configs = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() > 0 && is_permission_denied(&e) => {
                warn!(path = ?e.path(), "Skipping unreadable directory");
                continue;
            }
            Err(e) => {
                return Err(DiscoveryError::Walk {
                    path: e.path().unwrap_or(root).to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().ends_with(CONFIG_EXTENSION) {
            configs.push(entry.path().to_string_lossy().into_owned());
        }
    }

    debug!(root = %root.display(), count = configs.len(), "Config discovery finished");
    Ok(configs)
}

fn is_permission_denied(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|e| e.kind() == ErrorKind::PermissionDenied)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_finds_nested_configs_only() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("providers").join("eu");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("a.ovpn"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(nested.join("b.ovpn"), "").unwrap();
        fs::write(nested.join("b.ovpn.bak"), "").unwrap();
        // A directory named like a config is not a config
        fs::create_dir_all(dir.path().join("dir.ovpn")).unwrap();

        let found = discover_configs(dir.path()).unwrap();

        assert_eq!(
            found,
            vec![
                dir.path().join("a.ovpn").to_string_lossy().into_owned(),
                nested.join("b.ovpn").to_string_lossy().into_owned(),
            ]
        );
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        let result = discover_configs(&dir.path().join("missing"));
        assert!(matches!(result, Err(DiscoveryError::NotFound(_))));
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(discover_configs(dir.path()).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subtree_does_not_abort() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("hidden.ovpn"), "").unwrap();
        fs::write(dir.path().join("visible.ovpn"), "").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let result = discover_configs(dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        // root ignores the mode bits, so the hidden file may or may not show up
        let found = result.unwrap();
        assert!(found
            .iter()
            .any(|p| p.ends_with("visible.ovpn")));
    }
}
