//! Process-wide ownership of output paths

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use tracing::debug;

use crate::domain::errors::ExecError;
use crate::utils::path::absolute_path;

fn claimed_paths() -> &'static Mutex<HashSet<PathBuf>> {
    static CLAIMED: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    CLAIMED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive right to write one output path. Released on drop.
#[derive(Debug)]
pub struct OutputClaim {
    path: PathBuf,
}

impl OutputClaim {
    /// Claim `path` for this process, failing with [`ExecError::OutputBusy`]
    /// while another clip holds it. Paths are compared in absolute form.
    pub fn acquire(path: &Path) -> Result<Self, ExecError> {
        let absolute = absolute_path(path)?;
        let mut claimed = claimed_paths()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !claimed.insert(absolute.clone()) {
            return Err(ExecError::OutputBusy(path.to_path_buf()));
        }
        debug!("Claimed output path {}", absolute.display());
        Ok(Self { path: absolute })
    }
}

impl Drop for OutputClaim {
    fn drop(&mut self) {
        let mut claimed = claimed_paths()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        claimed.remove(&self.path);
    }
}
