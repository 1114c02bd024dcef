//! Family memorial module
//!
//! A family tetrahedron whose hooks keep a ledger of everything shared
//! through it, so memories can be read back later. Losses are recorded in a
//! [`MissingNodeProtocol`] under the module id.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::Result;
use crate::module::{HookContext, Module, ModuleCategory, ModuleHooks, ModuleMetadata};
use crate::protocol::{LossType, MemorialRequest, MemorialVertex, MissingNodeProtocol};
use crate::topology::{Vertex, VERTEX_COUNT};

/// Data type used for shared memories
pub const MEMORY_DATA: &str = "memory";

/// Everything shared through a module, by data type
pub type Ledger = Arc<RwLock<BTreeMap<String, Vec<Value>>>>;

struct LedgerHooks {
    ledger: Ledger,
}

#[async_trait]
impl ModuleHooks for LedgerHooks {
    async fn on_share_data(&self, ctx: HookContext<'_>, data_type: &str, data: Value) -> Result<()> {
        debug!(module_id = %ctx.module_id(), data_type = %data_type, "Recording shared data");
        self.ledger
            .write()
            .entry(data_type.to_string())
            .or_default()
            .push(data);
        Ok(())
    }

    async fn on_receive_data(&self, _ctx: HookContext<'_>, data_type: &str) -> Result<Option<Value>> {
        Ok(self
            .ledger
            .read()
            .get(data_type)
            .map(|entries| Value::Array(entries.clone())))
    }
}

/// A family module that remembers
pub struct MemorialTetrahedron {
    module: Module,
    ledger: Ledger,
}

impl MemorialTetrahedron {
    pub fn new(
        family_id: impl Into<String>,
        family_name: impl Into<String>,
        members: [Vertex; VERTEX_COUNT],
    ) -> Result<Self> {
        let ledger: Ledger = Arc::default();
        let metadata = ModuleMetadata::new(family_id, family_name, ModuleCategory::Family)
            .with_tags(vec!["family".to_string(), "memorial".to_string()]);
        let module = Module::with_hooks(
            metadata,
            members,
            Arc::new(LedgerHooks {
                ledger: Arc::clone(&ledger),
            }),
        )?;
        Ok(Self { module, ledger })
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    /// Hand the module to a hub; the ledger handle stays usable
    pub fn into_parts(self) -> (Module, Ledger) {
        (self.module, self.ledger)
    }

    pub fn ledger(&self) -> Ledger {
        Arc::clone(&self.ledger)
    }

    /// Share a memory from one member. Requires the module to be docked.
    pub async fn share_memory(&self, author_id: &str, text: &str) -> Result<()> {
        self.module
            .share_data(
                MEMORY_DATA,
                json!({ "author": author_id, "text": text, "shared_at": Utc::now() }),
            )
            .await
    }

    /// Memories shared so far, oldest first
    pub fn memories(&self) -> Vec<Value> {
        self.ledger
            .read()
            .get(MEMORY_DATA)
            .cloned()
            .unwrap_or_default()
    }

    /// Record a member as lost; the module id is the group id
    pub fn record_loss(
        &self,
        protocol: &MissingNodeProtocol,
        vertex_id: &str,
        loss_type: LossType,
        loss_date: DateTime<Utc>,
    ) -> Result<MemorialVertex> {
        let request = MemorialRequest::from_module(&self.module, vertex_id, loss_type, loss_date)?;
        protocol.mark_as_memorial(self.module.id(), request)
    }
}
