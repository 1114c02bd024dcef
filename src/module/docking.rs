//! Docking contract between a module and a hub
//!
//! A module docks into a hub with an opaque [`HubAuth`] credential. Holding a
//! credential is the only gate for data-sharing operations. Concrete modules
//! customise behaviour by implementing [`ModuleHooks`]; every hook has a
//! no-op default so an implementation only overrides what it needs.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::topology::{Edge, Vertex, EDGE_COUNT, VERTEX_COUNT};

use super::metadata::{ModuleConfig, ModuleMetadata};

// ─────────────────────────────────────────────────────────────────
// Status & Credentials
// ─────────────────────────────────────────────────────────────────

/// Connection state of a module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DockingStatus {
    #[default]
    Undocked,
    Docked,
}

impl fmt::Display for DockingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockingStatus::Undocked => write!(f, "undocked"),
            DockingStatus::Docked => write!(f, "docked"),
        }
    }
}

/// Opaque hub credential.
///
/// The core never inspects `token` or `claims`; `Debug` redacts the token.
#[derive(Clone)]
pub struct HubAuth {
    /// Holder of the credential
    pub user_id: String,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub claims: BTreeMap<String, String>,
}

impl HubAuth {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            issued_at: Utc::now(),
            claims: BTreeMap::new(),
        }
    }

    /// Credential with a random token
    pub fn generate(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Uuid::new_v4().to_string())
    }
}

impl fmt::Debug for HubAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubAuth")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("claims", &self.claims.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Result of a connect attempt.
///
/// When `connected` is false, `error` carries the hook failure and the
/// module stays undocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub holder_id: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn connected(holder_id: impl Into<String>) -> Self {
        Self {
            connected: true,
            holder_id: Some(holder_id.into()),
            connected_at: Some(Utc::now()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            holder_id: None,
            connected_at: None,
            error: Some(error.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────

/// An event delivered to a module subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEvent {
    pub source_module: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

impl ModuleEvent {
    pub fn new(
        source_module: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            source_module: source_module.into(),
            event_type: event_type.into(),
            payload,
            emitted_at: Utc::now(),
        }
    }
}

/// Subscription callback
pub type EventCallback = Arc<dyn Fn(&ModuleEvent) + Send + Sync>;

// ─────────────────────────────────────────────────────────────────
// Hooks
// ─────────────────────────────────────────────────────────────────

/// Read-only view of a module handed to hooks
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub metadata: &'a ModuleMetadata,
    pub vertices: &'a [Vertex; VERTEX_COUNT],
    pub edges: &'a [Edge; EDGE_COUNT],
    pub config: Option<&'a ModuleConfig>,
}

impl HookContext<'_> {
    pub fn module_id(&self) -> &str {
        &self.metadata.id
    }
}

/// Lifecycle and data hooks a concrete module may implement.
///
/// Hooks may perform real I/O, which is why they are async; the base
/// [`Module`](super::Module) never suspends on its own.
#[async_trait]
pub trait ModuleHooks: Send + Sync {
    /// Called while docking. An error aborts the dock.
    async fn on_connect(&self, ctx: HookContext<'_>, auth: &HubAuth) -> Result<()> {
        let _ = (ctx, auth);
        Ok(())
    }

    /// Called after the credential has been dropped
    async fn on_disconnect(&self, ctx: HookContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    async fn on_share_data(
        &self,
        ctx: HookContext<'_>,
        data_type: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let _ = (ctx, data_type, data);
        Ok(())
    }

    async fn on_receive_data(
        &self,
        ctx: HookContext<'_>,
        data_type: &str,
    ) -> Result<Option<serde_json::Value>> {
        let _ = (ctx, data_type);
        Ok(None)
    }

    async fn on_send_to_module(
        &self,
        ctx: HookContext<'_>,
        module_id: &str,
        message: serde_json::Value,
    ) -> Result<()> {
        let _ = (ctx, module_id, message);
        Ok(())
    }

    async fn on_docked(&self, ctx: HookContext<'_>) {
        let _ = ctx;
    }

    async fn on_undocked(&self, ctx: HookContext<'_>) {
        let _ = ctx;
    }

    async fn on_updated(&self, ctx: HookContext<'_>) {
        let _ = ctx;
    }

    async fn on_synced(&self, ctx: HookContext<'_>) {
        let _ = ctx;
    }
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl ModuleHooks for NoopHooks {}

/// Type alias for shared hooks
pub type SharedHooks = Arc<dyn ModuleHooks>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_auth_debug_redacts_token() {
        let auth = HubAuth::new("parent-1", "super-secret");
        let debug = format!("{:?}", auth);
        assert!(debug.contains("parent-1"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_docking_status_defaults_to_undocked() {
        assert_eq!(DockingStatus::default(), DockingStatus::Undocked);
        assert_eq!(
            serde_json::to_string(&DockingStatus::default()).unwrap(),
            "\"undocked\""
        );
    }

    #[test]
    fn test_generated_tokens_differ() {
        let a = HubAuth::generate("u");
        let b = HubAuth::generate("u");
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_connection_status_constructors() {
        let ok = ConnectionStatus::connected("u");
        assert!(ok.connected);
        assert!(ok.error.is_none());

        let failed = ConnectionStatus::failed("hub unreachable");
        assert!(!failed.connected);
        assert_eq!(failed.error.as_deref(), Some("hub unreachable"));
    }
}
