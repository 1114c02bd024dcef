//! Error types for the tetrahedron crate
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-facing suggestions
//! - Exit codes for the CLI
//!
//! Expected domain outcomes (a triad that is not ready, an irreversible loss,
//! a module that has not docked yet) are variants here too, so callers can
//! branch on them instead of string-matching messages.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for tetrahedron operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO / state file errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    StateCorrupted = 202,

    // Docking errors (3xx)
    NotConnected = 300,
    HookFailure = 301,
    ModuleNotRegistered = 302,

    // Topology errors (4xx)
    DuplicateVertex = 400,
    VertexNotFound = 401,
    EdgeNotFound = 402,

    // Protocol errors (5xx)
    RecordNotFound = 500,
    IrreversibleLoss = 501,
    ConsentBlocked = 502,
    TriadAlreadyOpen = 503,
    VertexNotInGroup = 504,
    MemorialExists = 505,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            500..=599 => 50,
            _ => 90,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State file could not be decoded
    #[error("State file {path} is corrupted: {source}")]
    StateCorrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Docking Errors
    // ─────────────────────────────────────────────────────────────

    /// Docking operation attempted without a hub credential
    #[error("Module {module_id} is not connected to a hub ({operation})")]
    NotConnected { module_id: String, operation: String },

    /// A lifecycle hook failed
    #[error("Hook {hook} failed: {message}")]
    HookFailure { hook: String, message: String },

    /// Hub has no module with this id
    #[error("Module {module_id} is not registered with the hub")]
    ModuleNotRegistered { module_id: String },

    // ─────────────────────────────────────────────────────────────
    // Topology Errors
    // ─────────────────────────────────────────────────────────────

    /// Two vertices share an id
    #[error("Duplicate vertex id: {vertex_id}")]
    DuplicateVertex { vertex_id: String },

    /// Vertex lookup failed
    #[error("Vertex not found: {vertex_id}")]
    VertexNotFound { vertex_id: String },

    /// Edge lookup failed
    #[error("No edge between {source_id} and {target_id}")]
    EdgeNotFound { source_id: String, target_id: String },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// No memorial or stabilization record for the group
    #[error("{message}")]
    RecordNotFound { group_id: String, message: String },

    /// Loss type cannot be reversed
    #[error("{message}")]
    IrreversibleLoss { group_id: String, message: String },

    /// Triad consent blocked a replacement
    #[error("{message}")]
    ConsentBlocked { group_id: String, message: String },

    /// Group already has an open triad stabilization
    #[error("Group {group_id} already has an open triad stabilization (memorial vertex {vertex_id})")]
    TriadAlreadyOpen { group_id: String, vertex_id: String },

    /// Vertex is not one of the group's four vertices
    #[error("Vertex {vertex_id} is not part of group {group_id}")]
    VertexNotInGroup { group_id: String, vertex_id: String },

    /// A memorial already exists for this vertex
    #[error("Vertex {vertex_id} in group {group_id} already has a memorial")]
    MemorialExists { group_id: String, vertex_id: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::Config(_) => ErrorCode::ConfigValidation,
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::StateCorrupted { .. } => ErrorCode::StateCorrupted,
            Error::Json(_) => ErrorCode::StateCorrupted,

            Error::NotConnected { .. } => ErrorCode::NotConnected,
            Error::HookFailure { .. } => ErrorCode::HookFailure,
            Error::ModuleNotRegistered { .. } => ErrorCode::ModuleNotRegistered,

            Error::DuplicateVertex { .. } => ErrorCode::DuplicateVertex,
            Error::VertexNotFound { .. } => ErrorCode::VertexNotFound,
            Error::EdgeNotFound { .. } => ErrorCode::EdgeNotFound,

            Error::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            Error::IrreversibleLoss { .. } => ErrorCode::IrreversibleLoss,
            Error::ConsentBlocked { .. } => ErrorCode::ConsentBlocked,
            Error::TriadAlreadyOpen { .. } => ErrorCode::TriadAlreadyOpen,
            Error::VertexNotInGroup { .. } => ErrorCode::VertexNotInGroup,
            Error::MemorialExists { .. } => ErrorCode::MemorialExists,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Expected domain outcomes, as opposed to faults
    pub fn is_domain_outcome(&self) -> bool {
        matches!(
            self,
            Error::NotConnected { .. }
                | Error::RecordNotFound { .. }
                | Error::IrreversibleLoss { .. }
                | Error::ConsentBlocked { .. }
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    /// Get a user-friendly suggestion for how to resolve this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => {
                Some("Run 'tetrahedron config init' to create a default configuration file.")
            }
            Error::ConfigParse { .. } | Error::Config(_) => {
                Some("Check the configuration file. Run 'tetrahedron config validate' for details.")
            }
            Error::StateCorrupted { .. } => {
                Some("The state file could not be decoded. Restore it from a backup or point --state at a new file.")
            }
            Error::NotConnected { .. } => Some("Dock the module with a hub before sharing data."),
            Error::RecordNotFound { .. } => {
                Some("Nothing to act on. Use 'tetrahedron memorial list' to see the group's records.")
            }
            Error::IrreversibleLoss { .. } => Some(
                "A death cannot be undone. The memorial stays; the triad can still signal readiness for a new fourth.",
            ),
            Error::ConsentBlocked { .. } => {
                Some("Give the triad more time and vote again when everyone is ready.")
            }
            Error::TriadAlreadyOpen { .. } => Some(
                "Restore the lost vertex, or let the triad vote ready for a new fourth, before marking another loss in this group.",
            ),
            Error::MemorialExists { .. } => {
                Some("Use 'tetrahedron memorial list' to see the existing record.")
            }
            Error::VertexNotInGroup { .. } | Error::VertexNotFound { .. } => {
                Some("Check the vertex id with 'tetrahedron module show'.")
            }
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", self.code().as_str(), self);
        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }
        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a not-connected error for a docking operation
    pub fn not_connected(module_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Error::NotConnected {
            module_id: module_id.into(),
            operation: operation.into(),
        }
    }

    /// Create a hook failure error
    pub fn hook_failure(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Error::HookFailure {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// Create a vertex not found error
    pub fn vertex_not_found(vertex_id: impl Into<String>) -> Self {
        Error::VertexNotFound {
            vertex_id: vertex_id.into(),
        }
    }

    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>, source: Option<toml::de::Error>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source,
        }
    }
}
