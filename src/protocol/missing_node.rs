//! Missing Node Protocol
//!
//! Tracks what happens to a group when one of its four vertices is lost:
//! - **Memorial**: the lost vertex's last-known identity, kept per (group, vertex)
//! - **Triad stabilization**: the three remaining vertices, opened with the memorial
//! - **Readiness**: the triad's consent to seek a new fourth
//! - **Restore**: undo a reversible loss and return to a full tetrahedron
//!
//! Both maps sit behind one lock so a memorial and its triad record are always
//! created and deleted together.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::topology::VertexId;

use super::outcome::{GroupState, ProtocolFailure, ProtocolOutcome, StabilityReport};
use super::types::{
    ConsentVote, Contribution, MemorialRequest, MemorialStatus, MemorialUpdate, MemorialVertex,
    ReplacementCriteria, StabilizationPolicy, TriadStabilization,
};

/// Shared protocol handle
pub type SharedProtocol = Arc<MissingNodeProtocol>;

#[derive(Debug, Default)]
struct ProtocolState {
    memorials: HashMap<String, HashMap<VertexId, MemorialVertex>>,
    triads: HashMap<String, TriadStabilization>,
}

impl ProtocolState {
    fn memorial(&self, group_id: &str, vertex_id: &str) -> Option<&MemorialVertex> {
        self.memorials.get(group_id)?.get(vertex_id)
    }

    fn memorial_mut(&mut self, group_id: &str, vertex_id: &str) -> Option<&mut MemorialVertex> {
        self.memorials.get_mut(group_id)?.get_mut(vertex_id)
    }

    fn remove_memorial(&mut self, group_id: &str, vertex_id: &str) -> Option<MemorialVertex> {
        let group = self.memorials.get_mut(group_id)?;
        let removed = group.remove(vertex_id);
        if group.is_empty() {
            self.memorials.remove(group_id);
        }
        removed
    }
}

/// Serializable protocol state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSnapshot {
    #[serde(default)]
    pub memorials: Vec<MemorialVertex>,
    #[serde(default)]
    pub triads: Vec<TriadStabilization>,
}

/// Memorial and triad bookkeeping for any number of groups
#[derive(Debug)]
pub struct MissingNodeProtocol {
    policy: StabilizationPolicy,
    require_full_triad_vote: bool,
    state: RwLock<ProtocolState>,
}

impl Default for MissingNodeProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl MissingNodeProtocol {
    /// Protocol with the default stabilization floors
    pub fn new() -> Self {
        Self::with_policy(StabilizationPolicy::default())
    }

    pub fn with_policy(policy: StabilizationPolicy) -> Self {
        Self {
            policy,
            require_full_triad_vote: false,
            state: RwLock::new(ProtocolState::default()),
        }
    }

    /// When true, a unanimous decision needs a `ready` vote from every
    /// remaining vertex and a missing vote counts against it. By default
    /// only the votes actually cast are considered.
    pub fn require_full_triad_vote(mut self, required: bool) -> Self {
        self.require_full_triad_vote = required;
        self
    }

    pub fn policy(&self) -> &StabilizationPolicy {
        &self.policy
    }

    // ─────────────────────────────────────────────────────────────
    // Loss
    // ─────────────────────────────────────────────────────────────

    /// Record a vertex as lost and open the group's triad stabilization.
    ///
    /// Fails if the group has a triad that has not yet agreed to a new fourth,
    /// if the vertex is not one of the four group vertices, or if the vertex
    /// already has a memorial. A triad that is ready for replacement is
    /// superseded by the new one; earlier memorials are kept.
    pub fn mark_as_memorial(
        &self,
        group_id: &str,
        request: MemorialRequest,
    ) -> Result<MemorialVertex> {
        let vertex_id = request.vertex.id.clone();
        if !request.group_vertices.contains(&vertex_id) {
            return Err(Error::VertexNotInGroup {
                group_id: group_id.to_string(),
                vertex_id,
            });
        }

        let mut seen = HashSet::new();
        for id in &request.group_vertices {
            if !seen.insert(id.as_str()) {
                return Err(Error::DuplicateVertex {
                    vertex_id: id.clone(),
                });
            }
        }

        let remaining: [VertexId; 3] = request
            .group_vertices
            .iter()
            .filter(|id| **id != vertex_id)
            .cloned()
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| Error::Internal("triad must have exactly three vertices".to_string()))?;

        let mut state = self.state.write();
        if let Some(open) = state.triads.get(group_id) {
            if !open.ready_for_replacement {
                return Err(Error::TriadAlreadyOpen {
                    group_id: group_id.to_string(),
                    vertex_id: open.memorial_vertex_id.clone(),
                });
            }
        }
        if state.memorial(group_id, &vertex_id).is_some() {
            return Err(Error::MemorialExists {
                group_id: group_id.to_string(),
                vertex_id,
            });
        }

        let now = Utc::now();
        let memorial = MemorialVertex {
            group_id: group_id.to_string(),
            vertex_id: vertex_id.clone(),
            name: request.vertex.name,
            category: request.vertex.category,
            description: request.vertex.description,
            status: MemorialStatus::Memorial,
            loss_type: request.loss_type,
            loss_date: request.loss_date,
            last_active_date: request.last_active_date.unwrap_or(request.loss_date),
            contributions: request
                .contributions
                .into_iter()
                .map(|description| Contribution {
                    description,
                    recorded_at: now,
                })
                .collect(),
            edge_history: request.edge_history,
            messages: Vec::new(),
            preserve_indefinitely: request.preserve_indefinitely,
            allow_replacement: false,
            created_at: now,
        };
        let triad = TriadStabilization {
            group_id: group_id.to_string(),
            original_vertices: request.group_vertices,
            remaining_vertices: remaining,
            memorial_vertex_id: vertex_id.clone(),
            is_stable: false,
            opened_at: now,
            ready_for_replacement: false,
            ready_since: None,
        };

        state
            .memorials
            .entry(group_id.to_string())
            .or_default()
            .insert(vertex_id.clone(), memorial.clone());
        if let Some(previous) = state.triads.insert(group_id.to_string(), triad) {
            info!(
                group_id = %group_id,
                previous = %previous.memorial_vertex_id,
                "Superseded triad that was ready for replacement"
            );
        }

        info!(
            group_id = %group_id,
            vertex_id = %vertex_id,
            loss_type = %memorial.loss_type,
            minimum_days = self.policy.minimum_days(memorial.loss_type),
            "Vertex marked as memorial; triad stabilization opened"
        );
        Ok(memorial)
    }

    // ─────────────────────────────────────────────────────────────
    // Stability
    // ─────────────────────────────────────────────────────────────

    /// Whether the triad has had its minimum stabilization period.
    /// Read-only; nothing is written back.
    pub fn check_triad_stability(&self, group_id: &str) -> Option<StabilityReport> {
        self.check_triad_stability_at(group_id, Utc::now())
    }

    pub fn check_triad_stability_at(
        &self,
        group_id: &str,
        now: DateTime<Utc>,
    ) -> Option<StabilityReport> {
        let state = self.state.read();
        let triad = state.triads.get(group_id)?;
        let memorial = state.memorial(group_id, &triad.memorial_vertex_id)?;
        Some(self.stability_of(memorial, now))
    }

    fn stability_of(&self, memorial: &MemorialVertex, now: DateTime<Utc>) -> StabilityReport {
        let minimum_days = self.policy.minimum_days(memorial.loss_type);
        let days_since_loss = (now - memorial.loss_date).num_days();
        let is_stable = days_since_loss >= i64::from(minimum_days);

        let recommendation = if is_stable {
            format!(
                "It has been {} days since {} was lost ({} minimum for {}). \
                 The triad can begin talking about whether to welcome a new fourth, if and when everyone is ready.",
                days_since_loss, memorial.name, minimum_days, memorial.loss_type
            )
        } else {
            let remaining = i64::from(minimum_days) - days_since_loss;
            format!(
                "Give the triad more time: {} more day(s) of stabilization are recommended after a {} loss. \
                 Focus on supporting each other and honoring {}.",
                remaining, memorial.loss_type, memorial.name
            )
        };

        StabilityReport {
            is_stable,
            days_since_loss,
            minimum_days,
            loss_type: memorial.loss_type,
            recommendation,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Replacement readiness
    // ─────────────────────────────────────────────────────────────

    /// Ask the triad whether a new fourth may be sought.
    ///
    /// A single `not-ready` vote always blocks, whoever cast it. Under
    /// `requires_unanimous` every counted vote must be `ready` as well; only
    /// triad members are counted there.
    pub fn signal_readiness_for_replacement(
        &self,
        group_id: &str,
        criteria: &ReplacementCriteria,
    ) -> ProtocolOutcome {
        let mut guard = self.state.write();
        let ProtocolState { memorials, triads } = &mut *guard;

        let Some(triad) = triads.get_mut(group_id) else {
            return ProtocolOutcome::declined(
                group_id,
                ProtocolFailure::RecordNotFound,
                format!("No triad stabilization found for group {}", group_id),
            );
        };
        let Some(memorial) = memorials
            .get_mut(group_id)
            .and_then(|m| m.get_mut(&triad.memorial_vertex_id))
        else {
            return ProtocolOutcome::declined(
                group_id,
                ProtocolFailure::RecordNotFound,
                format!("No memorial found for group {}", group_id),
            );
        };

        let not_ready: Vec<VertexId> = criteria
            .consent
            .iter()
            .filter(|(_, vote)| **vote == ConsentVote::NotReady)
            .map(|(id, _)| id.clone())
            .collect();
        if !not_ready.is_empty() {
            debug!(group_id = %group_id, blockers = ?not_ready, "Replacement blocked by not-ready vote");
            return ProtocolOutcome::declined(
                group_id,
                ProtocolFailure::NotReady {
                    vertex_ids: not_ready.clone(),
                },
                format!(
                    "Not everyone is ready: {} voted not-ready. The triad moves at the pace of its slowest healer.",
                    not_ready.join(", ")
                ),
            );
        }

        let mut votes: BTreeMap<&str, ConsentVote> = BTreeMap::new();
        for (voter, vote) in &criteria.consent {
            if triad.is_remaining(voter) {
                votes.insert(voter.as_str(), *vote);
            } else {
                warn!(group_id = %group_id, voter = %voter, "Vote from outside the triad not counted");
            }
        }

        if criteria.requires_unanimous {
            let pending: Vec<VertexId> = if self.require_full_triad_vote {
                triad
                    .remaining_vertices
                    .iter()
                    .filter(|id| votes.get(id.as_str()) != Some(&ConsentVote::Ready))
                    .cloned()
                    .collect()
            } else {
                votes
                    .iter()
                    .filter(|(_, vote)| **vote != ConsentVote::Ready)
                    .map(|(id, _)| id.to_string())
                    .collect()
            };
            if !pending.is_empty() {
                debug!(group_id = %group_id, pending = ?pending, "Replacement blocked awaiting unanimity");
                return ProtocolOutcome::declined(
                    group_id,
                    ProtocolFailure::NotUnanimous {
                        pending: pending.clone(),
                    },
                    format!(
                        "Unanimous consent is required but {} has not voted ready",
                        pending.join(", ")
                    ),
                );
            }
        }

        if triad.ready_for_replacement {
            return ProtocolOutcome::succeeded(
                group_id,
                "The triad had already agreed to welcome a new fourth",
            );
        }

        let now = Utc::now();
        triad.ready_for_replacement = true;
        triad.ready_since = Some(now);
        triad.is_stable = true;
        memorial.allow_replacement = true;

        info!(
            group_id = %group_id,
            memorial = %memorial.vertex_id,
            preferred_category = ?criteria.preferred_category,
            similarity = ?criteria.similarity,
            "Triad ready for replacement"
        );

        let mut message = format!(
            "The triad is ready to welcome a new fourth. {} will be remembered.",
            memorial.name
        );
        if let Some(category) = criteria.preferred_category {
            message.push_str(&format!(" Looking for someone {}.", category));
        }
        ProtocolOutcome::succeeded(group_id, message)
    }

    // ─────────────────────────────────────────────────────────────
    // Restore
    // ─────────────────────────────────────────────────────────────

    /// Undo a reversible loss: removes the memorial and the group's triad
    /// record. The caller restores the vertex in its own module.
    pub fn restore_vertex(&self, group_id: &str, vertex_id: &str) -> ProtocolOutcome {
        let mut state = self.state.write();
        let Some(memorial) = state.memorial(group_id, vertex_id) else {
            return ProtocolOutcome::declined(
                group_id,
                ProtocolFailure::RecordNotFound,
                format!("No memorial found for vertex {} in group {}", vertex_id, group_id),
            );
        };

        if !memorial.loss_type.is_reversible() {
            debug!(group_id = %group_id, vertex_id = %vertex_id, "Restore refused for irreversible loss");
            return ProtocolOutcome::declined(
                group_id,
                ProtocolFailure::IrreversibleLoss,
                format!(
                    "{} cannot be restored: a loss of type {} is irreversible. The memorial remains.",
                    memorial.name, memorial.loss_type
                ),
            );
        }

        let name = memorial.name.clone();
        state.remove_memorial(group_id, vertex_id);
        if state
            .triads
            .get(group_id)
            .is_some_and(|t| t.memorial_vertex_id == vertex_id)
        {
            state.triads.remove(group_id);
        }

        info!(group_id = %group_id, vertex_id = %vertex_id, "Vertex restored");
        ProtocolOutcome::succeeded(
            group_id,
            format!("{} has been restored. The tetrahedron is whole again.", name),
        )
    }

    /// Whether the lost vertex stays visible as a ghost after a new fourth joins
    pub fn should_become_ghost(&self, group_id: &str, vertex_id: &str) -> bool {
        self.state
            .read()
            .memorial(group_id, vertex_id)
            .is_some_and(|m| m.preserve_indefinitely)
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn get_memorial(&self, group_id: &str, vertex_id: &str) -> Option<MemorialVertex> {
        self.state.read().memorial(group_id, vertex_id).cloned()
    }

    /// All memorials of a group, oldest loss first
    pub fn all_memorials(&self, group_id: &str) -> Vec<MemorialVertex> {
        let mut memorials: Vec<MemorialVertex> = self
            .state
            .read()
            .memorials
            .get(group_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        memorials.sort_by(|a, b| {
            a.loss_date
                .cmp(&b.loss_date)
                .then_with(|| a.vertex_id.cmp(&b.vertex_id))
        });
        memorials
    }

    pub fn get_triad_status(&self, group_id: &str) -> Option<TriadStabilization> {
        self.state.read().triads.get(group_id).cloned()
    }

    /// Append messages or contributions, or change the preserve flag.
    /// Returns the updated memorial, or `None` if there is none.
    pub fn update_memorial(
        &self,
        group_id: &str,
        vertex_id: &str,
        update: MemorialUpdate,
    ) -> Option<MemorialVertex> {
        let mut state = self.state.write();
        let memorial = state.memorial_mut(group_id, vertex_id)?;

        if let Some(message) = update.message {
            memorial.messages.push(message);
        }
        if let Some(description) = update.contribution {
            memorial.contributions.push(Contribution {
                description,
                recorded_at: Utc::now(),
            });
        }
        if let Some(description) = update.description {
            memorial.description = description;
        }
        if let Some(preserve) = update.preserve_indefinitely {
            memorial.preserve_indefinitely = preserve;
        }

        debug!(group_id = %group_id, vertex_id = %vertex_id, "Memorial updated");
        Some(memorial.clone())
    }

    pub fn group_state(&self, group_id: &str) -> GroupState {
        self.group_state_at(group_id, Utc::now())
    }

    pub fn group_state_at(&self, group_id: &str, now: DateTime<Utc>) -> GroupState {
        let state = self.state.read();
        let Some(triad) = state.triads.get(group_id) else {
            return GroupState::Active;
        };
        if triad.ready_for_replacement {
            return GroupState::ReplacementReady;
        }
        match state.memorial(group_id, &triad.memorial_vertex_id) {
            Some(m) if self.stability_of(m, now).is_stable => GroupState::MemorialStable,
            _ => GroupState::MemorialPending,
        }
    }

    /// Ids of groups holding any memorial or triad record, sorted
    pub fn groups(&self) -> Vec<String> {
        let state = self.state.read();
        let mut ids: Vec<String> = state
            .memorials
            .keys()
            .chain(state.triads.keys())
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        ids.sort();
        ids
    }

    // ─────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> ProtocolSnapshot {
        let state = self.state.read();
        let mut memorials: Vec<MemorialVertex> = state
            .memorials
            .values()
            .flat_map(|m| m.values().cloned())
            .collect();
        memorials.sort_by(|a, b| (&a.group_id, &a.vertex_id).cmp(&(&b.group_id, &b.vertex_id)));
        let mut triads: Vec<TriadStabilization> = state.triads.values().cloned().collect();
        triads.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        ProtocolSnapshot { memorials, triads }
    }

    /// Rebuild from a snapshot. Triads without a matching memorial are kept
    /// but logged, since they can still be cleared by a later restore.
    pub fn from_snapshot(policy: StabilizationPolicy, snapshot: ProtocolSnapshot) -> Self {
        let protocol = Self::with_policy(policy);
        {
            let mut state = protocol.state.write();
            for memorial in snapshot.memorials {
                let replaced = state
                    .memorials
                    .entry(memorial.group_id.clone())
                    .or_default()
                    .insert(memorial.vertex_id.clone(), memorial);
                if let Some(old) = replaced {
                    warn!(
                        group_id = %old.group_id,
                        vertex_id = %old.vertex_id,
                        "Duplicate memorial in snapshot; keeping the last one"
                    );
                }
            }
            for triad in snapshot.triads {
                if state
                    .memorial(&triad.group_id, &triad.memorial_vertex_id)
                    .is_none()
                {
                    warn!(
                        group_id = %triad.group_id,
                        vertex_id = %triad.memorial_vertex_id,
                        "Triad stabilization has no matching memorial"
                    );
                }
                state.triads.insert(triad.group_id.clone(), triad);
            }
            debug!(
                groups = state.triads.len(),
                "Protocol state restored from snapshot"
            );
        }
        protocol
    }
}
