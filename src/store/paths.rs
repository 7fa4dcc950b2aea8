// Data directory resolution for container and read-only deployments.
//
// The ledger's documents live in the first directory (out of an ordered
// candidate list) that accepts a test write. Deployments with a fully
// read-only filesystem get `None` and the store runs in-memory with
// best-effort emergency backups.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

const APP_DIR_NAME: &str = "lge-backend";

/// Ordered candidate locations for the data directory. The explicit
/// override (LEDGER_DATA_DIR / config) always probes first.
pub fn candidate_dirs(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(dir) = explicit {
        candidates.push(dir.to_path_buf());
    }

    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("data"));
    }

    if let Ok(home) = std::env::var("HOME") {
        candidates.push(PathBuf::from(home).join(".config").join(APP_DIR_NAME));
    }

    candidates.push(std::env::temp_dir().join(APP_DIR_NAME));

    candidates
}

/// Probe a directory by creating it and writing a scratch file into it
pub fn is_writable(dir: &Path) -> bool {
    if fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(".write_probe");
    match fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            true
        },
        Err(_) => false,
    }
}

/// Pick the data directory: first writable candidate wins. The remaining
/// writable candidates are kept as emergency backup targets.
pub fn resolve_data_dir(explicit: Option<&Path>) -> (Option<PathBuf>, Vec<PathBuf>) {
    let mut primary = None;
    let mut fallbacks = Vec::new();

    for candidate in candidate_dirs(explicit) {
        if !is_writable(&candidate) {
            warn!(dir = %candidate.display(), "Data directory candidate is not writable");
            continue;
        }
        if primary.is_none() {
            info!(dir = %candidate.display(), "Selected data directory");
            primary = Some(candidate);
        } else if !fallbacks.contains(&candidate) {
            fallbacks.push(candidate);
        }
    }

    if primary.is_none() {
        warn!("No writable data directory found; ledger will run in-memory");
    }

    (primary, fallbacks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dir_probes_first() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = candidate_dirs(Some(dir.path()));
        assert_eq!(candidates[0], dir.path());
        // cwd/home/temp candidates follow
        assert!(candidates.len() >= 2);
    }

    #[test]
    fn test_writable_probe_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_writable(dir.path()));
        assert!(!dir.path().join(".write_probe").exists());
    }

    #[test]
    fn test_resolve_prefers_explicit_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (primary, _) = resolve_data_dir(Some(dir.path()));
        assert_eq!(primary.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_unwritable_explicit_falls_through() {
        let (primary, _) = resolve_data_dir(Some(Path::new("/proc/no_such_dir")));
        // Some other candidate is picked instead of the bogus one
        if let Some(dir) = primary {
            assert_ne!(dir, Path::new("/proc/no_such_dir"));
        }
    }
}
