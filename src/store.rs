//! JSON state file
//!
//! Holds module snapshots keyed by group id plus the protocol snapshot.
//! Writes go to a sibling temp file first and are renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::module::{Module, ModuleSnapshot};
use crate::protocol::ProtocolSnapshot;

/// Everything the CLI persists between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TetraState {
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleSnapshot>,
    #[serde(default)]
    pub protocol: ProtocolSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl TetraState {
    /// Rebuild the module stored for a group
    pub fn module(&self, group_id: &str) -> Result<Option<Module>> {
        self.modules
            .get(group_id)
            .cloned()
            .map(Module::from_snapshot)
            .transpose()
    }

    pub fn put_module(&mut self, group_id: impl Into<String>, module: &Module) {
        self.modules.insert(group_id.into(), module.snapshot());
    }
}

/// File-backed store for [`TetraState`]
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state; a missing file is an empty state
    pub fn load(&self) -> Result<TetraState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No state file yet");
            return Ok(TetraState::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| Error::IoRead {
            path: self.path.clone(),
            source,
        })?;
        let state = serde_json::from_str(&content).map_err(|source| Error::StateCorrupted {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "State loaded");
        Ok(state)
    }

    pub fn save(&self, state: &TetraState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| Error::IoWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut state = state.clone();
        state.saved_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(&state)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| Error::IoWrite {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| Error::IoWrite {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), modules = state.modules.len(), "State saved");
        Ok(())
    }
}
