//! The creator's own tetrahedron
//!
//! Four facets of one person. Hooks count dock and sync events and answer
//! `receive_data("facets")` with the facet list.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::error::Result;
use crate::module::{HookContext, Module, ModuleCategory, ModuleHooks, ModuleMetadata};
use crate::topology::{Vertex, VertexCategory};

/// Data type answered with the facet list
pub const FACETS_DATA: &str = "facets";

/// Dock and sync counters
#[derive(Debug, Default)]
pub struct CreatorCounters {
    docks: AtomicUsize,
    syncs: AtomicUsize,
}

impl CreatorCounters {
    pub fn docks(&self) -> usize {
        self.docks.load(Ordering::SeqCst)
    }

    pub fn syncs(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }
}

struct CreatorHooks {
    counters: Arc<CreatorCounters>,
}

#[async_trait]
impl ModuleHooks for CreatorHooks {
    async fn on_receive_data(&self, ctx: HookContext<'_>, data_type: &str) -> Result<Option<Value>> {
        if data_type != FACETS_DATA {
            return Ok(None);
        }
        Ok(Some(serde_json::to_value(ctx.vertices)?))
    }

    async fn on_docked(&self, ctx: HookContext<'_>) {
        let docks = self.counters.docks.fetch_add(1, Ordering::SeqCst) + 1;
        info!(module_id = %ctx.module_id(), docks, "Creator tetrahedron docked");
    }

    async fn on_synced(&self, _ctx: HookContext<'_>) {
        self.counters.syncs.fetch_add(1, Ordering::SeqCst);
    }
}

/// The creator's four-facet tetrahedron
pub struct CreatorTetrahedron {
    module: Module,
    counters: Arc<CreatorCounters>,
}

impl CreatorTetrahedron {
    pub fn new(creator_id: &str, creator_name: &str) -> Result<Self> {
        let facet = |suffix: &str, name: &str, category, description: &str| {
            Vertex::new(format!("{}-{}", creator_id, suffix), name, category)
                .with_description(description)
        };
        let facets = [
            facet("heart", "Heart", VertexCategory::Emotional, "What I care about"),
            facet("hands", "Hands", VertexCategory::Practical, "What I build"),
            facet("mind", "Mind", VertexCategory::Technical, "How I build it"),
            facet("spirit", "Spirit", VertexCategory::Philosophical, "Why I build it"),
        ];

        let counters = Arc::new(CreatorCounters::default());
        let metadata = ModuleMetadata::new(
            format!("{}-creator", creator_id),
            format!("{}'s Tetrahedron", creator_name),
            ModuleCategory::Personal,
        );
        let module = Module::with_hooks(
            metadata,
            facets,
            Arc::new(CreatorHooks {
                counters: Arc::clone(&counters),
            }),
        )?;
        Ok(Self { module, counters })
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn counters(&self) -> Arc<CreatorCounters> {
        Arc::clone(&self.counters)
    }

    /// Hand the module to a hub, keeping the counters
    pub fn into_parts(self) -> (Module, Arc<CreatorCounters>) {
        (self.module, self.counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleHub;

    #[test]
    fn test_facets_cover_every_category() {
        let creator = CreatorTetrahedron::new("dana", "Dana").unwrap();
        let categories: Vec<_> = creator.module().vertices().iter().map(|v| v.category).collect();
        assert_eq!(categories, VertexCategory::all());
        assert_eq!(creator.module().id(), "dana-creator");
        assert!(creator.module().get_vertex("dana-mind").is_some());
    }

    #[tokio::test]
    async fn test_hub_lifecycle_counts() {
        let (module, counters) = CreatorTetrahedron::new("dana", "Dana").unwrap().into_parts();
        let hub = ModuleHub::new("studio");
        let shared = hub.register(module);

        hub.dock("dana-creator", "dana").await.unwrap();
        hub.sync_all().await;
        hub.sync_all().await;
        assert_eq!(counters.docks(), 1);
        assert_eq!(counters.syncs(), 2);

        let facets = shared.lock().await.receive_data(FACETS_DATA).await.unwrap().unwrap();
        assert_eq!(facets.as_array().unwrap().len(), 4);
        assert_eq!(facets[0]["name"], "Heart");
        assert!(shared.lock().await.receive_data("other").await.unwrap().is_none());
    }
}
