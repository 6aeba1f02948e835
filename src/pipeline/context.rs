//! Per-run context.
//!
//! Everything that used to be process-wide mutable state (credential cursor,
//! frame counter, scratch directory) lives here, one instance per run, so
//! concurrent runs in the same process never share a counter or a path.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::credentials::CredentialPool;
use crate::pipeline::state::StateMachine;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// Identity of one run: a random id for scratch paths plus the start time.
/// Both go into the output file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunId {
    id: Uuid,
    started_at: DateTime<Utc>,
}

impl RunId {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Milliseconds since the Unix epoch at run start.
    pub fn timestamp_ms(&self) -> i64 {
        self.started_at.timestamp_millis()
    }

    /// First eight hex digits of the id.  Disambiguates runs that start in
    /// the same millisecond.
    pub fn short(&self) -> String {
        let mut s = self.id.simple().to_string();
        s.truncate(8);
        s
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id.simple())
    }
}

// ---------------------------------------------------------------------------
// ScratchDir
// ---------------------------------------------------------------------------

/// Directory removed with everything in it when dropped.
#[derive(Debug)]
struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    fn create(path: PathBuf) -> io::Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => log::debug!("pipeline: removed scratch dir {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "pipeline: could not remove scratch dir {}: {e}",
                self.path.display()
            ),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        self.remove();
    }
}

// ---------------------------------------------------------------------------
// RunContext
// ---------------------------------------------------------------------------

pub struct RunContext {
    run_id: RunId,
    credentials: CredentialPool,
    next_frame: usize,
    scratch: ScratchDir,
    state: StateMachine,
}

impl RunContext {
    /// Create `{scratch_root}/run_{id}` and take ownership of `credentials`
    /// (normally a [`CredentialPool::fresh`] copy).
    pub fn create(scratch_root: &Path, credentials: CredentialPool) -> io::Result<Self> {
        let run_id = RunId::new();
        let scratch = ScratchDir::create(scratch_root.join(format!("run_{run_id}")))?;
        log::debug!("pipeline: run {run_id} scratch at {}", scratch.path.display());
        Ok(Self {
            run_id,
            credentials,
            next_frame: 0,
            scratch,
            state: StateMachine::new(),
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn credentials(&self) -> &CredentialPool {
        &self.credentials
    }

    pub fn credentials_mut(&mut self) -> &mut CredentialPool {
        &mut self.credentials
    }

    /// Reserve the next frame file name: `frame_0.png`, `frame_1.png`, ...
    pub fn next_frame_path(&mut self) -> PathBuf {
        let path = self.scratch_path(&format!("frame_{}.png", self.next_frame));
        self.next_frame += 1;
        path
    }

    /// Number of frame paths handed out so far.
    pub fn frames_allocated(&self) -> usize {
        self.next_frame
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch.path
    }

    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.scratch.path.join(name)
    }

    pub fn state(&self) -> &StateMachine {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateMachine {
        &mut self.state
    }

    /// Delete the scratch directory now.  Also happens on drop.
    pub fn cleanup(&mut self) {
        self.scratch.remove();
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("credentials", &self.credentials)
            .field("next_frame", &self.next_frame)
            .field("scratch", &self.scratch.path)
            .field("state", &self.state.current())
            .finish()
    }
}
