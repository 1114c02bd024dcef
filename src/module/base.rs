//! The base module: a fixed tetrahedron plus the docking interface

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::topology::{
    clamp_strength, generate_edges, Edge, Vertex, VertexPatch, EDGE_COUNT, VERTEX_COUNT,
};

use super::docking::{
    ConnectionStatus, DockingStatus, EventCallback, HookContext, HubAuth, ModuleEvent, NoopHooks,
    SharedHooks,
};
use super::metadata::{ModuleConfig, ModuleMetadata};

/// A unit of functionality owning one tetrahedron.
///
/// Edges are materialized once from the vertex list. Vertex ids never
/// change after construction, so the edge set always stays the complete
/// graph on the current ids.
pub struct Module {
    metadata: ModuleMetadata,
    vertices: [Vertex; VERTEX_COUNT],
    edges: [Edge; EDGE_COUNT],
    status: DockingStatus,
    sub_modules: Vec<Module>,
    config: Option<ModuleConfig>,
    auth: Option<HubAuth>,
    subscriptions: HashMap<String, HashMap<String, EventCallback>>,
    hooks: SharedHooks,
}

impl Module {
    /// Create a module with no-op hooks
    pub fn new(metadata: ModuleMetadata, vertices: [Vertex; VERTEX_COUNT]) -> Result<Self> {
        Self::with_hooks(metadata, vertices, Arc::new(NoopHooks))
    }

    /// Create a module with custom hooks
    pub fn with_hooks(
        metadata: ModuleMetadata,
        vertices: [Vertex; VERTEX_COUNT],
        hooks: SharedHooks,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for vertex in &vertices {
            if !seen.insert(vertex.id.as_str()) {
                return Err(Error::DuplicateVertex {
                    vertex_id: vertex.id.clone(),
                });
            }
        }

        let edges = generate_edges(&vertices);
        debug!(module_id = %metadata.id, "Module topology generated");

        Ok(Self {
            metadata,
            vertices,
            edges,
            status: DockingStatus::Undocked,
            sub_modules: Vec::new(),
            config: None,
            auth: None,
            subscriptions: HashMap::new(),
            hooks,
        })
    }

    /// Builder-style configuration
    pub fn with_config(mut self, config: ModuleConfig) -> Self {
        self.config = Some(config);
        self
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    pub fn vertices(&self) -> &[Vertex; VERTEX_COUNT] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge; EDGE_COUNT] {
        &self.edges
    }

    pub fn status(&self) -> DockingStatus {
        self.status
    }

    pub fn config(&self) -> Option<&ModuleConfig> {
        self.config.as_ref()
    }

    pub fn sub_modules(&self) -> &[Module] {
        &self.sub_modules
    }

    pub fn add_sub_module(&mut self, module: Module) {
        debug!(parent = %self.metadata.id, child = %module.id(), "Sub-module attached");
        self.sub_modules.push(module);
        self.metadata.touch();
    }

    /// True iff a credential is held and the module is not undocked
    pub fn is_connected(&self) -> bool {
        self.auth.is_some() && self.status != DockingStatus::Undocked
    }

    /// Id of the credential holder, if docked
    pub fn holder_id(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.user_id.as_str())
    }

    fn context(&self) -> HookContext<'_> {
        HookContext {
            metadata: &self.metadata,
            vertices: &self.vertices,
            edges: &self.edges,
            config: self.config.as_ref(),
        }
    }

    fn require_connection(&self, operation: &str) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::not_connected(&self.metadata.id, operation))
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Docking
    // ─────────────────────────────────────────────────────────────

    /// Dock into a hub.
    ///
    /// The status only becomes docked once `on_connect` succeeds; on hook
    /// failure the credential is dropped and a failed status is returned.
    pub async fn connect_to_hub(&mut self, auth: HubAuth) -> ConnectionStatus {
        let hooks = Arc::clone(&self.hooks);
        if let Err(e) = hooks.on_connect(self.context(), &auth).await {
            warn!(
                module_id = %self.metadata.id,
                error = %e,
                "on_connect hook failed, module stays undocked"
            );
            self.auth = None;
            self.status = DockingStatus::Undocked;
            return ConnectionStatus::failed(e.to_string());
        }

        let holder = auth.user_id.clone();
        self.auth = Some(auth);
        self.status = DockingStatus::Docked;
        info!(module_id = %self.metadata.id, holder = %holder, "Module docked");
        ConnectionStatus::connected(holder)
    }

    /// Undock: drop the credential and every subscription
    pub async fn disconnect(&mut self) {
        self.auth = None;
        self.status = DockingStatus::Undocked;
        self.subscriptions.clear();

        let hooks = Arc::clone(&self.hooks);
        if let Err(e) = hooks.on_disconnect(self.context()).await {
            warn!(module_id = %self.metadata.id, error = %e, "on_disconnect hook failed");
        }
        info!(module_id = %self.metadata.id, "Module undocked");
    }

    /// Share typed data through the hub
    pub async fn share_data(&self, data_type: &str, data: serde_json::Value) -> Result<()> {
        self.require_connection("share_data")?;
        self.hooks.on_share_data(self.context(), data_type, data).await
    }

    /// Receive typed data from the hub
    pub async fn receive_data(&self, data_type: &str) -> Result<Option<serde_json::Value>> {
        self.require_connection("receive_data")?;
        self.hooks.on_receive_data(self.context(), data_type).await
    }

    /// Send a message to another module
    pub async fn send_to_module(&self, module_id: &str, message: serde_json::Value) -> Result<()> {
        self.require_connection("send_to_module")?;
        self.hooks
            .on_send_to_module(self.context(), module_id, message)
            .await
    }

    // ─────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────

    /// Subscribe to `event_type` events from `module_id`, replacing any
    /// existing callback for that pair
    pub fn subscribe_to_module(
        &mut self,
        module_id: impl Into<String>,
        event_type: impl Into<String>,
        callback: EventCallback,
    ) {
        let (module_id, event_type) = (module_id.into(), event_type.into());
        debug!(
            module_id = %self.metadata.id,
            source = %module_id,
            event_type = %event_type,
            "Subscribed"
        );
        self.subscriptions
            .entry(module_id)
            .or_default()
            .insert(event_type, callback);
    }

    /// Remove a subscription; a module with no callbacks left is dropped
    pub fn unsubscribe_from_module(&mut self, module_id: &str, event_type: &str) {
        if let Some(events) = self.subscriptions.get_mut(module_id) {
            events.remove(event_type);
            if events.is_empty() {
                self.subscriptions.remove(module_id);
            }
        }
    }

    /// Whether any callback is registered for `module_id`
    pub fn is_subscribed_to(&self, module_id: &str) -> bool {
        self.subscriptions.contains_key(module_id)
    }

    /// Number of modules with at least one subscription
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Invoke the matching callback; returns whether one ran
    pub fn dispatch_event(&self, event: &ModuleEvent) -> bool {
        match self
            .subscriptions
            .get(&event.source_module)
            .and_then(|events| events.get(&event.event_type))
        {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Lifecycle hooks
    // ─────────────────────────────────────────────────────────────

    pub async fn on_dock(&self) {
        self.hooks.on_docked(self.context()).await
    }

    pub async fn on_undock(&self) {
        self.hooks.on_undocked(self.context()).await
    }

    pub async fn on_update(&self) {
        self.hooks.on_updated(self.context()).await
    }

    pub async fn on_sync(&self) {
        self.hooks.on_synced(self.context()).await
    }

    // ─────────────────────────────────────────────────────────────
    // Topology helpers
    // ─────────────────────────────────────────────────────────────

    pub fn get_vertex(&self, id: &str) -> Option<&Vertex> {
        self.vertices.iter().find(|v| v.id == id)
    }

    /// Shallow-merge a patch into a vertex
    pub fn update_vertex(&mut self, id: &str, patch: VertexPatch) -> Result<&Vertex> {
        let index = self
            .vertices
            .iter()
            .position(|v| v.id == id)
            .ok_or_else(|| Error::vertex_not_found(id))?;
        self.vertices[index].apply(patch);
        self.metadata.touch();
        Ok(&self.vertices[index])
    }

    /// Direction-insensitive edge lookup
    pub fn get_edge(&self, source_id: &str, target_id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.connects(source_id, target_id))
    }

    fn edge_mut(&mut self, source_id: &str, target_id: &str) -> Result<&mut Edge> {
        self.edges
            .iter_mut()
            .find(|e| e.connects(source_id, target_id))
            .ok_or_else(|| Error::EdgeNotFound {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
            })
    }

    /// Set an edge's strength, clamped to [0, 1]
    pub fn update_edge_strength(
        &mut self,
        source_id: &str,
        target_id: &str,
        strength: f64,
    ) -> Result<&Edge> {
        let edge = self.edge_mut(source_id, target_id)?;
        edge.set_strength(strength, Utc::now());
        Ok(edge)
    }

    /// Nudge an edge's strength by `delta`
    pub fn record_interaction(
        &mut self,
        source_id: &str,
        target_id: &str,
        delta: f64,
    ) -> Result<&Edge> {
        let edge = self.edge_mut(source_id, target_id)?;
        let strength = clamp_strength(edge.strength + delta);
        edge.set_strength(strength, Utc::now());
        Ok(edge)
    }

    /// The three edges touching a vertex
    pub fn edges_of(&self, vertex_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.touches(vertex_id)).collect()
    }

    // ─────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────

    /// Serializable copy of the module's state (credential excluded)
    pub fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot {
            metadata: self.metadata.clone(),
            vertices: self.vertices.clone(),
            edges: self.edges.clone(),
            config: self.config.clone(),
            sub_modules: self.sub_modules.iter().map(Module::snapshot).collect(),
        }
    }

    /// Rebuild from a snapshot with no-op hooks
    pub fn from_snapshot(snapshot: ModuleSnapshot) -> Result<Self> {
        Self::from_snapshot_with_hooks(snapshot, Arc::new(NoopHooks))
    }

    /// Rebuild from a snapshot.
    ///
    /// Edges are regenerated from the vertex list and stored strengths are
    /// copied over by pair, so a stale or tampered edge list cannot drift
    /// from the vertices.
    pub fn from_snapshot_with_hooks(snapshot: ModuleSnapshot, hooks: SharedHooks) -> Result<Self> {
        let mut module = Self::with_hooks(snapshot.metadata, snapshot.vertices, hooks)?;
        for stored in &snapshot.edges {
            if let Some(edge) = module
                .edges
                .iter_mut()
                .find(|e| e.connects(&stored.source, &stored.target))
            {
                edge.set_strength(stored.strength, stored.last_interaction);
            } else {
                warn!(
                    module_id = %module.metadata.id,
                    edge = %stored.id,
                    "Dropping stored edge that does not match the vertex set"
                );
            }
        }
        module.config = snapshot.config;
        module.sub_modules = snapshot
            .sub_modules
            .into_iter()
            .map(Module::from_snapshot)
            .collect::<Result<Vec<_>>>()?;
        Ok(module)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("metadata", &self.metadata)
            .field("vertices", &self.vertices)
            .field("status", &self.status)
            .field("subscriptions", &self.subscriptions.len())
            .field("sub_modules", &self.sub_modules.len())
            .finish()
    }
}

/// Serializable module state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    pub metadata: ModuleMetadata,
    pub vertices: [Vertex; VERTEX_COUNT],
    pub edges: [Edge; EDGE_COUNT],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ModuleConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_modules: Vec<ModuleSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleCategory, ModuleHooks};
    use crate::topology::VertexCategory;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn vertices() -> [Vertex; 4] {
        [
            Vertex::new("emotional", "Heart", VertexCategory::Emotional),
            Vertex::new("practical", "Hands", VertexCategory::Practical),
            Vertex::new("technical", "Tools", VertexCategory::Technical),
            Vertex::new("philosophical", "Mind", VertexCategory::Philosophical),
        ]
    }

    fn module() -> Module {
        Module::new(
            ModuleMetadata::new("m1", "Test", ModuleCategory::Personal),
            vertices(),
        )
        .unwrap()
    }

    struct FailingConnect;

    #[async_trait]
    impl ModuleHooks for FailingConnect {
        async fn on_connect(&self, _ctx: HookContext<'_>, _auth: &HubAuth) -> Result<()> {
            Err(Error::hook_failure("on_connect", "hub rejected module"))
        }
    }

    #[derive(Default)]
    struct CountingShare(AtomicUsize);

    #[async_trait]
    impl ModuleHooks for CountingShare {
        async fn on_share_data(
            &self,
            _ctx: HookContext<'_>,
            _data_type: &str,
            _data: serde_json::Value,
        ) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_vertex_rejected() {
        let mut vs = vertices();
        vs[3].id = "emotional".to_string();
        let err = Module::new(ModuleMetadata::new("m", "M", ModuleCategory::Team), vs).unwrap_err();
        assert!(matches!(err, Error::DuplicateVertex { vertex_id } if vertex_id == "emotional"));
    }

    #[test]
    fn test_edge_symmetry() {
        let m = module();
        for a in m.vertices() {
            for b in m.vertices() {
                if a.id != b.id {
                    assert_eq!(m.get_edge(&a.id, &b.id), m.get_edge(&b.id, &a.id));
                    assert!(m.get_edge(&a.id, &b.id).is_some());
                }
            }
        }
        assert!(m.get_edge("emotional", "emotional").is_none());
    }

    #[test]
    fn test_update_edge_strength_clamps() {
        let mut m = module();
        assert_eq!(m.update_edge_strength("emotional", "technical", 5.0).unwrap().strength, 1.0);
        assert_eq!(m.update_edge_strength("technical", "emotional", -3.0).unwrap().strength, 0.0);
        assert_eq!(m.update_edge_strength("emotional", "technical", 0.25).unwrap().strength, 0.25);
        assert!(m.update_edge_strength("emotional", "nobody", 0.5).is_err());
    }

    #[test]
    fn test_record_interaction_accumulates() {
        let mut m = module();
        m.update_edge_strength("practical", "technical", 0.5).unwrap();
        m.record_interaction("technical", "practical", 0.2).unwrap();
        let strength = m.get_edge("practical", "technical").unwrap().strength;
        assert!((strength - 0.7).abs() < 1e-9);
        m.record_interaction("technical", "practical", 1.0).unwrap();
        assert_eq!(m.get_edge("practical", "technical").unwrap().strength, 1.0);
    }

    #[test]
    fn test_update_vertex_keeps_edges() {
        let mut m = module();
        let before = m.edges().clone();
        let v = m
            .update_vertex(
                "practical",
                VertexPatch {
                    name: Some("Builder".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(v.name, "Builder");
        assert_eq!(v.id, "practical");
        assert_eq!(m.edges(), &before);
        assert!(m.update_vertex("ghost", VertexPatch::default()).is_err());
    }

    #[test]
    fn test_edges_of_vertex() {
        let m = module();
        assert_eq!(m.edges_of("technical").len(), 3);
        assert!(m.edges_of("nobody").is_empty());
    }

    #[tokio::test]
    async fn test_gated_operations_before_connect() {
        let m = module();
        assert!(matches!(
            m.share_data("notes", serde_json::json!({})).await,
            Err(Error::NotConnected { .. })
        ));
        assert!(matches!(
            m.receive_data("notes").await,
            Err(Error::NotConnected { .. })
        ));
        assert!(matches!(
            m.send_to_module("other", serde_json::json!("hi")).await,
            Err(Error::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_gate() {
        let hooks = Arc::new(CountingShare::default());
        let mut m = Module::with_hooks(
            ModuleMetadata::new("m2", "Counting", ModuleCategory::Team),
            vertices(),
            hooks.clone(),
        )
        .unwrap();

        let status = m.connect_to_hub(HubAuth::new("owner", "t")).await;
        assert!(status.connected);
        assert!(m.is_connected());
        assert_eq!(m.holder_id(), Some("owner"));

        m.share_data("notes", serde_json::json!({"n": 1})).await.unwrap();
        assert_eq!(hooks.0.load(Ordering::SeqCst), 1);
        assert_eq!(m.receive_data("notes").await.unwrap(), None);

        m.disconnect().await;
        assert!(!m.is_connected());
        assert_eq!(m.status(), DockingStatus::Undocked);
        assert!(matches!(
            m.share_data("notes", serde_json::json!({})).await,
            Err(Error::NotConnected { .. })
        ));
        assert_eq!(hooks.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_hook_failure_leaves_module_undocked() {
        let mut m = Module::with_hooks(
            ModuleMetadata::new("m3", "Failing", ModuleCategory::Team),
            vertices(),
            Arc::new(FailingConnect),
        )
        .unwrap();

        let status = m.connect_to_hub(HubAuth::new("owner", "t")).await;
        assert!(!status.connected);
        assert!(status.error.unwrap().contains("hub rejected module"));
        assert_eq!(m.status(), DockingStatus::Undocked);
        assert!(!m.is_connected());
    }

    #[tokio::test]
    async fn test_subscriptions_two_level_map() {
        let mut m = module();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let cb: EventCallback = Arc::new(move |_e: &ModuleEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        m.subscribe_to_module("calendar", "event-added", cb.clone());
        m.subscribe_to_module("calendar", "event-removed", cb);
        assert_eq!(m.subscription_count(), 1);

        assert!(m.dispatch_event(&ModuleEvent::new("calendar", "event-added", serde_json::json!(1))));
        assert!(!m.dispatch_event(&ModuleEvent::new("calendar", "other", serde_json::json!(1))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        m.unsubscribe_from_module("calendar", "event-added");
        assert!(m.is_subscribed_to("calendar"));
        m.unsubscribe_from_module("calendar", "event-removed");
        assert!(!m.is_subscribed_to("calendar"));
        assert_eq!(m.subscription_count(), 0);

        // disconnect clears everything
        m.subscribe_to_module("chores", "done", Arc::new(|_: &ModuleEvent| {}));
        m.connect_to_hub(HubAuth::new("u", "t")).await;
        m.disconnect().await;
        assert_eq!(m.subscription_count(), 0);
    }

    #[test]
    fn test_snapshot_reconciles_edges() {
        let mut m = module();
        m.update_edge_strength("emotional", "practical", 0.3).unwrap();

        let mut snapshot = m.snapshot();
        snapshot.edges[5].source = "stranger".to_string();

        let restored = Module::from_snapshot(snapshot).unwrap();
        assert_eq!(restored.get_edge("practical", "emotional").unwrap().strength, 0.3);
        // the tampered edge is regenerated at full strength
        assert_eq!(restored.get_edge("technical", "philosophical").unwrap().strength, 1.0);
        assert_eq!(restored.status(), DockingStatus::Undocked);
    }

    #[test]
    fn test_sub_modules_roundtrip_through_snapshot() {
        let mut parent = module();
        parent.add_sub_module(
            Module::new(ModuleMetadata::new("child", "Child", ModuleCategory::Team), vertices()).unwrap(),
        );
        let json = serde_json::to_string(&parent.snapshot()).unwrap();
        let restored = Module::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.sub_modules().len(), 1);
        assert_eq!(restored.sub_modules()[0].id(), "child");
    }
}
