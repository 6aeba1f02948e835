use std::path::{Path, PathBuf};

/// Files deleted when the guard is dropped, whichever way the scope exits.
/// Call [`release`](Self::release) for a path that should survive.
#[derive(Debug, Default)]
pub struct ScopedFiles {
    paths: Vec<PathBuf>,
}

impl ScopedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `path` and hand it back for convenience.
    pub fn track(&mut self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        self.paths.push(path.clone());
        path
    }

    /// Stop tracking `path`; it will not be deleted.
    pub fn release(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }
}

impl Drop for ScopedFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => log::debug!("video: removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("video: could not remove {}: {e}", path.display()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_files_are_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        std::fs::write(&a, b"x").unwrap();
        {
            let mut guard = ScopedFiles::new();
            guard.track(&a);
        }
        assert!(!a.exists());
    }

    #[test]
    fn released_files_survive() {
        let dir = tempfile::tempdir().unwrap();
        let keep = dir.path().join("keep.mp4");
        std::fs::write(&keep, b"x").unwrap();
        {
            let mut guard = ScopedFiles::new();
            guard.track(&keep);
            guard.release(&keep);
        }
        assert!(keep.exists());
    }

    #[test]
    fn missing_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut guard = ScopedFiles::new();
        guard.track(dir.path().join("never-written.mp4"));
        drop(guard);
    }
}
