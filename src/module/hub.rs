//! In-process module hub
//!
//! Issues credentials, docks registered modules and routes events between
//! them. This is a reference consumer of the docking contract; it does no
//! network transport.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::base::Module;
use super::docking::{ConnectionStatus, HubAuth, ModuleEvent};

/// A module shared between the hub and its owner
pub type SharedModule = Arc<Mutex<Module>>;

/// Event type used for direct module-to-module messages
pub const MESSAGE_EVENT: &str = "message";

/// Registry of modules docked into one hub
pub struct ModuleHub {
    hub_id: String,
    modules: RwLock<HashMap<String, SharedModule>>,
}

impl ModuleHub {
    pub fn new(hub_id: impl Into<String>) -> Self {
        Self {
            hub_id: hub_id.into(),
            modules: RwLock::new(HashMap::new()),
        }
    }

    pub fn hub_id(&self) -> &str {
        &self.hub_id
    }

    /// Issue a credential for `user_id`, tagged with this hub's id
    pub fn issue_auth(&self, user_id: &str) -> HubAuth {
        let mut auth = HubAuth::generate(user_id);
        auth.claims.insert("hub".to_string(), self.hub_id.clone());
        auth
    }

    /// Register a module, replacing any module with the same id
    pub fn register(&self, module: Module) -> SharedModule {
        let id = module.id().to_string();
        let shared = Arc::new(Mutex::new(module));
        if self
            .modules
            .write()
            .insert(id.clone(), Arc::clone(&shared))
            .is_some()
        {
            warn!(hub = %self.hub_id, module_id = %id, "Replaced registered module");
        } else {
            debug!(hub = %self.hub_id, module_id = %id, "Module registered");
        }
        shared
    }

    /// Get a registered module
    pub fn get(&self, module_id: &str) -> Option<SharedModule> {
        self.modules.read().get(module_id).cloned()
    }

    fn require(&self, module_id: &str) -> Result<SharedModule> {
        self.get(module_id).ok_or_else(|| Error::ModuleNotRegistered {
            module_id: module_id.to_string(),
        })
    }

    /// Ids of all registered modules, sorted
    pub fn module_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.modules.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Dock a registered module on behalf of `user_id`
    pub async fn dock(&self, module_id: &str, user_id: &str) -> Result<ConnectionStatus> {
        let shared = self.require(module_id)?;
        let mut module = shared.lock().await;
        let status = module.connect_to_hub(self.issue_auth(user_id)).await;
        if status.connected {
            module.on_dock().await;
        }
        Ok(status)
    }

    /// Undock a registered module
    pub async fn undock(&self, module_id: &str) -> Result<()> {
        let shared = self.require(module_id)?;
        let mut module = shared.lock().await;
        if module.is_connected() {
            module.on_undock().await;
        }
        module.disconnect().await;
        Ok(())
    }

    /// Ids of docked modules, sorted
    pub async fn docked_modules(&self) -> Vec<String> {
        let mut docked = Vec::new();
        for (id, shared) in self.snapshot_modules() {
            if shared.lock().await.is_connected() {
                docked.push(id);
            }
        }
        docked.sort();
        docked
    }

    fn snapshot_modules(&self) -> Vec<(String, SharedModule)> {
        self.modules
            .read()
            .iter()
            .map(|(id, m)| (id.clone(), Arc::clone(m)))
            .collect()
    }

    /// Deliver an event from `source_module` to every docked subscriber.
    /// Returns how many callbacks ran.
    pub async fn publish(
        &self,
        source_module: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> usize {
        let event = ModuleEvent::new(source_module, event_type, payload);
        let mut delivered = 0;
        for (id, shared) in self.snapshot_modules() {
            if id == source_module {
                continue;
            }
            let module = shared.lock().await;
            if module.is_connected() && module.dispatch_event(&event) {
                delivered += 1;
            }
        }
        debug!(
            hub = %self.hub_id,
            source = %source_module,
            event_type = %event_type,
            delivered,
            "Event published"
        );
        delivered
    }

    /// Send a message from one module to another.
    ///
    /// The sender must be docked; its `on_send_to_module` hook runs first,
    /// then the target's subscription to the sender's `message` events fires.
    /// Returns whether the target had a matching subscription.
    pub async fn send(&self, from: &str, to: &str, message: serde_json::Value) -> Result<bool> {
        let sender = self.require(from)?;
        let target = self.require(to)?;

        sender.lock().await.send_to_module(to, message.clone()).await?;

        let target = target.lock().await;
        if !target.is_connected() {
            return Err(Error::not_connected(to, "receive message"));
        }
        if target.config().is_some_and(|c| !c.accept_messages) {
            debug!(from = %from, to = %to, "Target does not accept messages");
            return Ok(false);
        }
        Ok(target.dispatch_event(&ModuleEvent::new(from, MESSAGE_EVENT, message)))
    }

    /// Run the sync hook on every docked module
    pub async fn sync_all(&self) -> usize {
        let mut synced = 0;
        for (_, shared) in self.snapshot_modules() {
            let module = shared.lock().await;
            if module.is_connected() {
                module.on_sync().await;
                synced += 1;
            }
        }
        synced
    }

    /// Undock every module
    pub async fn shutdown(&self) {
        for (id, _) in self.snapshot_modules() {
            if let Err(e) = self.undock(&id).await {
                warn!(module_id = %id, error = %e, "Failed to undock during shutdown");
            }
        }
        info!(hub = %self.hub_id, "Hub shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleCategory, ModuleConfig, ModuleMetadata};
    use crate::topology::{Vertex, VertexCategory};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn module(id: &str) -> Module {
        Module::new(
            ModuleMetadata::new(id, id, ModuleCategory::Team),
            [
                Vertex::new("a", "A", VertexCategory::Emotional),
                Vertex::new("b", "B", VertexCategory::Practical),
                Vertex::new("c", "C", VertexCategory::Technical),
                Vertex::new("d", "D", VertexCategory::Philosophical),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_dock_and_undock() {
        let hub = ModuleHub::new("home");
        hub.register(module("chores"));

        let status = hub.dock("chores", "parent").await.unwrap();
        assert!(status.connected);
        assert_eq!(hub.docked_modules().await, vec!["chores"]);

        hub.undock("chores").await.unwrap();
        assert!(hub.docked_modules().await.is_empty());
        assert!(matches!(
            hub.dock("missing", "parent").await,
            Err(Error::ModuleNotRegistered { .. })
        ));
    }

    #[tokio::test]
    async fn test_publish_reaches_docked_subscribers_only() {
        let hub = ModuleHub::new("home");
        let hits = Arc::new(AtomicUsize::new(0));

        let listener = hub.register(module("dashboard"));
        hub.register(module("chores"));
        {
            let counter = hits.clone();
            listener.lock().await.subscribe_to_module(
                "chores",
                "completed",
                Arc::new(move |_: &ModuleEvent| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        // not docked yet
        assert_eq!(hub.publish("chores", "completed", serde_json::json!({})).await, 0);

        hub.dock("dashboard", "parent").await.unwrap();
        assert_eq!(hub.publish("chores", "completed", serde_json::json!({})).await, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_requires_docked_sender() {
        let hub = ModuleHub::new("home");
        let receiver = hub.register(module("inbox"));
        hub.register(module("outbox"));
        hub.dock("inbox", "p").await.unwrap();

        let got = Arc::new(AtomicUsize::new(0));
        {
            let counter = got.clone();
            receiver.lock().await.subscribe_to_module(
                "outbox",
                MESSAGE_EVENT,
                Arc::new(move |_: &ModuleEvent| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        assert!(matches!(
            hub.send("outbox", "inbox", serde_json::json!("hi")).await,
            Err(Error::NotConnected { .. })
        ));

        hub.dock("outbox", "p").await.unwrap();
        assert!(hub.send("outbox", "inbox", serde_json::json!("hi")).await.unwrap());
        assert_eq!(got.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_respects_accept_messages() {
        let hub = ModuleHub::new("home");
        hub.register(module("quiet").with_config(ModuleConfig {
            accept_messages: false,
            ..Default::default()
        }));
        hub.register(module("loud"));
        hub.dock("quiet", "p").await.unwrap();
        hub.dock("loud", "p").await.unwrap();

        assert!(!hub.send("loud", "quiet", serde_json::json!("hey")).await.unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_undocks_all() {
        let hub = ModuleHub::new("home");
        hub.register(module("a"));
        hub.register(module("b"));
        hub.dock("a", "p").await.unwrap();
        hub.dock("b", "p").await.unwrap();
        assert_eq!(hub.sync_all().await, 2);

        hub.shutdown().await;
        assert!(hub.docked_modules().await.is_empty());
        assert_eq!(hub.module_ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_issued_auth_carries_hub_claim() {
        let hub = ModuleHub::new("home");
        let auth = hub.issue_auth("parent");
        assert_eq!(auth.user_id, "parent");
        assert_eq!(auth.claims.get("hub").map(String::as_str), Some("home"));
    }
}
