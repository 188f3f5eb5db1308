// Cipher rewrite
// Swaps the legacy single-cipher directive for a data-ciphers list newer clients accept

use std::fs;
use tracing::{info, warn};

/// Legacy directive that newer clients refuse on its own
pub const OLD_CIPHER: &str = "cipher AES-128-CBC";

/// Replacement negotiating modern ciphers with the legacy one as fallback
pub const NEW_CIPHER: &str = "data-ciphers AES-256-GCM:AES-128-GCM:CHACHA20-POLY1305:AES-128-CBC";

/// First line of every rewritten file
pub const MODIFIED_MARKER: &str = "#MODIFIED";

/// What happened to each file handed to `modify_configs`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CipherReport {
    pub modified: Vec<String>,
    pub already_modified: Vec<String>,
    /// No legacy directive present; left untouched
    pub unchanged: Vec<String>,
    /// Path and reason
    pub failed: Vec<(String, String)>,
}

/// Rewrite every config that still carries the legacy cipher directive
///
/// Files are independent: a marked or unreadable file is recorded and the
/// rest are still processed.
pub fn modify_configs(paths: &[String]) -> CipherReport {
    let mut report = CipherReport::default();

    for path in paths {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path, error = %e, "Cannot read config");
                report.failed.push((path.clone(), e.to_string()));
                continue;
            }
        };

        if is_marked(&content) {
            report.already_modified.push(path.clone());
            continue;
        }

        let Some(rewritten) = rewrite(&content) else {
            report.unchanged.push(path.clone());
            continue;
        };

        match fs::write(path, rewritten) {
            Ok(()) => {
                info!(path = %path, "Config cipher updated");
                report.modified.push(path.clone());
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Cannot write config");
                report.failed.push((path.clone(), e.to_string()));
            }
        }
    }

    report
}

fn is_marked(content: &str) -> bool {
    content
        .lines()
        .next()
        .map(|first| first.trim_end() == MODIFIED_MARKER)
        .unwrap_or(false)
}

/// New file body, or `None` when nothing needed replacing
fn rewrite(content: &str) -> Option<String> {
    let normalized = content.replace("\r\n", "\n");
    let mut changed = false;

    let lines: Vec<&str> = normalized
        .split('\n')
        .map(|line| {
            if line.trim().contains(OLD_CIPHER) {
                changed = true;
                NEW_CIPHER
            } else {
                line
            }
        })
        .collect();

    changed.then(|| format!("{}\n{}", MODIFIED_MARKER, lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_rewrites_legacy_cipher() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "a.ovpn",
            "client\r\n  cipher AES-128-CBC\r\nauth SHA1\r\n",
        );

        let report = modify_configs(&[path.clone()]);

        assert_eq!(report.modified, vec![path.clone()]);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("#MODIFIED\nclient\n{}\nauth SHA1\n", NEW_CIPHER)
        );
    }

    #[test]
    fn test_marked_file_skipped_and_walk_continues() {
        let dir = TempDir::new().unwrap();
        let marked_body = "#MODIFIED\ncipher AES-128-CBC\n";
        let marked = write(&dir, "a.ovpn", marked_body);
        let fresh = write(&dir, "b.ovpn", "cipher AES-128-CBC\n");

        let report = modify_configs(&[marked.clone(), fresh.clone()]);

        assert_eq!(report.already_modified, vec![marked.clone()]);
        assert_eq!(report.modified, vec![fresh]);
        assert_eq!(fs::read_to_string(&marked).unwrap(), marked_body);
    }

    #[test]
    fn test_no_legacy_directive_untouched() {
        let dir = TempDir::new().unwrap();
        let body = "client\ndata-ciphers AES-256-GCM\n";
        let path = write(&dir, "a.ovpn", body);

        let report = modify_configs(&[path.clone()]);

        assert_eq!(report.unchanged, vec![path.clone()]);
        assert_eq!(fs::read_to_string(&path).unwrap(), body);
    }

    #[test]
    fn test_unreadable_file_reported() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.ovpn").to_string_lossy().into_owned();
        let ok = write(&dir, "b.ovpn", "cipher AES-128-CBC\n");

        let report = modify_configs(&[missing.clone(), ok]);

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, missing);
        assert_eq!(report.modified.len(), 1);
        assert!(report.unchanged.is_empty());
        assert!(report.already_modified.is_empty());
    }
}
