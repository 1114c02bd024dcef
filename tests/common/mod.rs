//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use tetrahedron::module::{Module, ModuleCategory, ModuleMetadata};
use tetrahedron::topology::{Vertex, VertexCategory};

/// A module with one vertex per category
pub fn family_module(id: &str) -> Module {
    Module::new(
        ModuleMetadata::new(id, "The Okafors", ModuleCategory::Family),
        family_vertices(),
    )
    .unwrap()
}

pub fn family_vertices() -> [Vertex; 4] {
    [
        Vertex::new("emotional", "Ada", VertexCategory::Emotional),
        Vertex::new("practical", "Bayo", VertexCategory::Practical),
        Vertex::new("technical", "Chi", VertexCategory::Technical),
        Vertex::new("philosophical", "Dele", VertexCategory::Philosophical),
    ]
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

/// Isolated home, working directory and state file for CLI runs
pub struct CliFixture {
    temp_dir: TempDir,
    state_path: PathBuf,
}

impl CliFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("state.json");
        Self {
            temp_dir,
            state_path,
        }
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// A command that cannot see the user's real config or state
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("tetrahedron").unwrap();
        cmd.current_dir(self.dir())
            .env("HOME", self.dir())
            .env("XDG_CONFIG_HOME", self.dir().join(".config"))
            .env_remove("TETRA_CONFIG")
            .env_remove("TETRA_STATE_FILE")
            .env_remove("TETRA_LOG_LEVEL")
            .env_remove("RUST_LOG")
            .arg("--state")
            .arg(&self.state_path);
        cmd
    }

    /// Create the four-vertex family module under `group`
    pub fn create_family(&self, group: &str) {
        self.cmd()
            .args(["module", "create", "--group", group, "--name", "Family"])
            .args(["--vertex", "emotional:Ada:emotional"])
            .args(["--vertex", "practical:Bayo:practical"])
            .args(["--vertex", "technical:Chi:technical"])
            .args(["--vertex", "philosophical:Dele:philosophical"])
            .assert()
            .success();
    }
}
