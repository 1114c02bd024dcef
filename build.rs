//! Build script for the tetrahedron crate
//!
//! Exposes git and toolchain details to `src/version.rs` through
//! `TETRA_*` compile-time environment variables.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = command_output("git", &["rev-parse", "--short=8", "HEAD"]);
    let git_branch = command_output("git", &["rev-parse", "--abbrev-ref", "HEAD"]);
    let git_dirty = match Command::new("git").args(["status", "--porcelain"]).output() {
        Ok(output) if output.status.success() => (!output.stdout.is_empty()).to_string(),
        _ => "unknown".to_string(),
    };
    let rustc_version = command_output("rustc", &["--version"]);

    let build_timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    let vars = [
        ("TETRA_GIT_HASH", git_hash),
        ("TETRA_GIT_BRANCH", git_branch),
        ("TETRA_GIT_DIRTY", git_dirty),
        ("TETRA_BUILD_TIMESTAMP", build_timestamp),
        ("TETRA_TARGET", cargo_var("TARGET")),
        ("TETRA_PROFILE", cargo_var("PROFILE")),
        ("TETRA_RUSTC_VERSION", rustc_version),
        ("TETRA_HOST", cargo_var("HOST")),
    ];

    for (key, value) in vars {
        println!("cargo:rustc-env={}={}", key, value);
    }
}

/// Read a variable cargo sets for build scripts
fn cargo_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| "unknown".to_string())
}

/// Run a command and return its trimmed stdout, or "unknown"
fn command_output(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
