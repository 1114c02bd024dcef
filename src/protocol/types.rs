//! Core types for the missing-node protocol

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::module::Module;
use crate::topology::{Vertex, VertexCategory, VertexId, VERTEX_COUNT};

// ─────────────────────────────────────────────────────────────────
// Loss Type
// ─────────────────────────────────────────────────────────────────

/// Why a vertex is no longer an active participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossType {
    /// Permanent; can never be restored
    Death,
    Departure,
    /// Geographic or logistic separation
    Distance,
    /// Gradual disengagement
    Drift,
    /// Conflict
    Disagreement,
    /// Leave of absence with an expected return
    Temporary,
}

impl LossType {
    pub fn slug(&self) -> &'static str {
        match self {
            LossType::Death => "death",
            LossType::Departure => "departure",
            LossType::Distance => "distance",
            LossType::Drift => "drift",
            LossType::Disagreement => "disagreement",
            LossType::Temporary => "temporary",
        }
    }

    pub fn all() -> &'static [LossType] {
        &[
            LossType::Death,
            LossType::Departure,
            LossType::Distance,
            LossType::Drift,
            LossType::Disagreement,
            LossType::Temporary,
        ]
    }

    /// Whether `restore_vertex` may bring this vertex back
    pub fn is_reversible(&self) -> bool {
        !matches!(self, LossType::Death)
    }
}

impl fmt::Display for LossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for LossType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        LossType::all()
            .iter()
            .copied()
            .find(|lt| lt.slug() == s.to_lowercase())
            .ok_or_else(|| {
                format!(
                    "Unknown loss type '{}'. Valid: death, departure, distance, drift, disagreement, temporary",
                    s
                )
            })
    }
}

// ─────────────────────────────────────────────────────────────────
// Stabilization Policy
// ─────────────────────────────────────────────────────────────────

/// Minimum days a triad needs after each kind of loss before it is
/// considered stable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationPolicy {
    pub death: u32,
    pub departure: u32,
    pub distance: u32,
    pub drift: u32,
    pub disagreement: u32,
    pub temporary: u32,
}

impl Default for StabilizationPolicy {
    fn default() -> Self {
        Self {
            death: 90,
            departure: 30,
            distance: 14,
            drift: 21,
            disagreement: 60,
            temporary: 7,
        }
    }
}

impl StabilizationPolicy {
    pub fn minimum_days(&self, loss_type: LossType) -> u32 {
        match loss_type {
            LossType::Death => self.death,
            LossType::Departure => self.departure,
            LossType::Distance => self.distance,
            LossType::Drift => self.drift,
            LossType::Disagreement => self.disagreement,
            LossType::Temporary => self.temporary,
        }
    }

    pub fn set_minimum_days(&mut self, loss_type: LossType, days: u32) {
        let slot = match loss_type {
            LossType::Death => &mut self.death,
            LossType::Departure => &mut self.departure,
            LossType::Distance => &mut self.distance,
            LossType::Drift => &mut self.drift,
            LossType::Disagreement => &mut self.disagreement,
            LossType::Temporary => &mut self.temporary,
        };
        *slot = days;
    }
}

// ─────────────────────────────────────────────────────────────────
// Memorial Vertex
// ─────────────────────────────────────────────────────────────────

/// Status of a memorial record. There is only one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemorialStatus {
    #[default]
    Memorial,
}

/// Something the lost vertex contributed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

/// An edge strength at the moment of loss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub partner_id: VertexId,
    pub strength: f64,
    pub last_interaction: DateTime<Utc>,
}

/// A message left on a memorial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorialMessage {
    pub author_id: String,
    pub text: String,
    pub written_at: DateTime<Utc>,
}

impl MemorialMessage {
    pub fn new(author_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            text: text.into(),
            written_at: Utc::now(),
        }
    }
}

/// The last-known identity of a lost vertex plus its loss details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorialVertex {
    pub group_id: String,
    pub vertex_id: VertexId,
    pub name: String,
    pub category: VertexCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: MemorialStatus,
    pub loss_type: LossType,
    pub loss_date: DateTime<Utc>,
    pub last_active_date: DateTime<Utc>,
    #[serde(default)]
    pub contributions: Vec<Contribution>,
    #[serde(default)]
    pub edge_history: Vec<EdgeSnapshot>,
    #[serde(default)]
    pub messages: Vec<MemorialMessage>,
    /// Keep the memorial after a new fourth joins
    #[serde(default)]
    pub preserve_indefinitely: bool,
    /// The triad has agreed a new fourth may be sought
    #[serde(default)]
    pub allow_replacement: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for marking a vertex as lost
#[derive(Debug, Clone)]
pub struct MemorialRequest {
    /// Last-known identity of the vertex
    pub vertex: Vertex,
    /// All four vertex ids of the group at the time of loss
    pub group_vertices: [VertexId; VERTEX_COUNT],
    pub loss_type: LossType,
    pub loss_date: DateTime<Utc>,
    /// Defaults to `loss_date`
    pub last_active_date: Option<DateTime<Utc>>,
    pub contributions: Vec<String>,
    pub edge_history: Vec<EdgeSnapshot>,
    pub preserve_indefinitely: bool,
}

impl MemorialRequest {
    pub fn new(
        vertex: Vertex,
        group_vertices: [VertexId; VERTEX_COUNT],
        loss_type: LossType,
        loss_date: DateTime<Utc>,
    ) -> Self {
        Self {
            vertex,
            group_vertices,
            loss_type,
            loss_date,
            last_active_date: None,
            contributions: Vec::new(),
            edge_history: Vec::new(),
            preserve_indefinitely: false,
        }
    }

    /// Build a request from a module without mutating it: snapshots the
    /// vertex identity and the strengths of its three edges
    pub fn from_module(
        module: &Module,
        vertex_id: &str,
        loss_type: LossType,
        loss_date: DateTime<Utc>,
    ) -> Result<Self> {
        let vertex = module
            .get_vertex(vertex_id)
            .cloned()
            .ok_or_else(|| Error::vertex_not_found(vertex_id))?;
        let group_vertices = module.vertices().clone().map(|v| v.id);
        let edge_history = module
            .edges_of(vertex_id)
            .into_iter()
            .filter_map(|edge| {
                edge.other(vertex_id).map(|partner| EdgeSnapshot {
                    partner_id: partner.to_string(),
                    strength: edge.strength,
                    last_interaction: edge.last_interaction,
                })
            })
            .collect();

        Ok(Self {
            edge_history,
            ..Self::new(vertex, group_vertices, loss_type, loss_date)
        })
    }

    pub fn last_active(mut self, date: DateTime<Utc>) -> Self {
        self.last_active_date = Some(date);
        self
    }

    pub fn preserve(mut self, preserve: bool) -> Self {
        self.preserve_indefinitely = preserve;
        self
    }

    pub fn contribution(mut self, description: impl Into<String>) -> Self {
        self.contributions.push(description.into());
        self
    }
}

/// Mutation of a stored memorial. Loss type and loss date never change.
#[derive(Debug, Clone, Default)]
pub struct MemorialUpdate {
    pub message: Option<MemorialMessage>,
    pub contribution: Option<String>,
    pub description: Option<String>,
    pub preserve_indefinitely: Option<bool>,
}

// ─────────────────────────────────────────────────────────────────
// Triad Stabilization
// ─────────────────────────────────────────────────────────────────

/// Bookkeeping for the three remaining vertices of a group after a loss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriadStabilization {
    pub group_id: String,
    pub original_vertices: [VertexId; VERTEX_COUNT],
    pub remaining_vertices: [VertexId; 3],
    pub memorial_vertex_id: VertexId,
    /// Set once the triad signals readiness; stability checks never write it
    pub is_stable: bool,
    pub opened_at: DateTime<Utc>,
    pub ready_for_replacement: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_since: Option<DateTime<Utc>>,
}

impl TriadStabilization {
    pub fn is_remaining(&self, vertex_id: &str) -> bool {
        self.remaining_vertices.iter().any(|v| v == vertex_id)
    }
}

// ─────────────────────────────────────────────────────────────────
// Replacement Criteria
// ─────────────────────────────────────────────────────────────────

/// One triad member's answer to "are we ready for a new fourth?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsentVote {
    Ready,
    NotReady,
    NeedsDiscussion,
}

impl fmt::Display for ConsentVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsentVote::Ready => write!(f, "ready"),
            ConsentVote::NotReady => write!(f, "not-ready"),
            ConsentVote::NeedsDiscussion => write!(f, "needs-discussion"),
        }
    }
}

impl FromStr for ConsentVote {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "ready" => Ok(ConsentVote::Ready),
            "not-ready" => Ok(ConsentVote::NotReady),
            "needs-discussion" => Ok(ConsentVote::NeedsDiscussion),
            _ => Err(format!(
                "Unknown vote '{}'. Valid: ready, not-ready, needs-discussion",
                s
            )),
        }
    }
}

/// How close a new fourth should be to the lost vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplacementSimilarity {
    /// Someone who fills the same role
    Similar,
    /// Someone who brings something new
    Complementary,
    #[default]
    Open,
}

/// One-shot input to `signal_readiness_for_replacement`; never stored
#[derive(Debug, Clone, Default)]
pub struct ReplacementCriteria {
    pub preferred_category: Option<VertexCategory>,
    pub similarity: ReplacementSimilarity,
    pub consent: BTreeMap<VertexId, ConsentVote>,
    pub requires_unanimous: bool,
}

impl ReplacementCriteria {
    pub fn unanimous() -> Self {
        Self {
            requires_unanimous: true,
            ..Default::default()
        }
    }

    pub fn vote(mut self, vertex_id: impl Into<VertexId>, vote: ConsentVote) -> Self {
        self.consent.insert(vertex_id.into(), vote);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleCategory, ModuleMetadata};

    #[test]
    fn test_default_policy_table() {
        let policy = StabilizationPolicy::default();
        assert_eq!(policy.minimum_days(LossType::Death), 90);
        assert_eq!(policy.minimum_days(LossType::Departure), 30);
        assert_eq!(policy.minimum_days(LossType::Distance), 14);
        assert_eq!(policy.minimum_days(LossType::Drift), 21);
        assert_eq!(policy.minimum_days(LossType::Disagreement), 60);
        assert_eq!(policy.minimum_days(LossType::Temporary), 7);
    }

    #[test]
    fn test_set_minimum_days() {
        let mut policy = StabilizationPolicy::default();
        policy.set_minimum_days(LossType::Drift, 28);
        assert_eq!(policy.minimum_days(LossType::Drift), 28);
        assert_eq!(policy.minimum_days(LossType::Death), 90);
    }

    #[test]
    fn test_only_death_is_irreversible() {
        for lt in LossType::all() {
            assert_eq!(lt.is_reversible(), *lt != LossType::Death, "{}", lt);
        }
    }

    #[test]
    fn test_parse_loss_type_and_vote() {
        assert_eq!("Drift".parse::<LossType>().unwrap(), LossType::Drift);
        assert!("vanished".parse::<LossType>().is_err());
        assert_eq!("not_ready".parse::<ConsentVote>().unwrap(), ConsentVote::NotReady);
        assert_eq!(
            "needs-discussion".parse::<ConsentVote>().unwrap(),
            ConsentVote::NeedsDiscussion
        );
        assert_eq!(
            serde_json::to_string(&ConsentVote::NotReady).unwrap(),
            "\"not-ready\""
        );
    }

    #[test]
    fn test_request_from_module_snapshots_edges() {
        let mut module = Module::new(
            ModuleMetadata::new("fam", "Family", ModuleCategory::Family),
            [
                Vertex::new("a", "A", VertexCategory::Emotional),
                Vertex::new("b", "B", VertexCategory::Practical),
                Vertex::new("c", "C", VertexCategory::Technical),
                Vertex::new("d", "D", VertexCategory::Philosophical),
            ],
        )
        .unwrap();
        module.update_edge_strength("a", "c", 0.4).unwrap();

        let req = MemorialRequest::from_module(&module, "a", LossType::Drift, Utc::now()).unwrap();
        assert_eq!(req.vertex.name, "A");
        assert_eq!(req.group_vertices, ["a", "b", "c", "d"].map(String::from));
        assert_eq!(req.edge_history.len(), 3);
        let to_c = req.edge_history.iter().find(|s| s.partner_id == "c").unwrap();
        assert_eq!(to_c.strength, 0.4);

        assert!(MemorialRequest::from_module(&module, "z", LossType::Drift, Utc::now()).is_err());
        // the module itself is untouched
        assert_eq!(module.vertices().len(), 4);
    }
}
