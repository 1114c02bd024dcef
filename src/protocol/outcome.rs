//! Results reported by the missing-node protocol

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::topology::VertexId;

use super::types::LossType;

/// Answer to "has the triad had enough time?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityReport {
    pub is_stable: bool,
    /// Whole days since the loss date; negative if the date is in the future
    pub days_since_loss: i64,
    pub minimum_days: u32,
    pub loss_type: LossType,
    pub recommendation: String,
}

/// Why a protocol operation declined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProtocolFailure {
    /// No memorial or stabilization record exists
    RecordNotFound,
    /// The loss type cannot be undone
    IrreversibleLoss,
    /// At least one remaining vertex voted not-ready
    NotReady { vertex_ids: Vec<VertexId> },
    /// A unanimous decision was required and these members did not vote ready
    NotUnanimous { pending: Vec<VertexId> },
}

/// Outcome of a state-changing protocol operation.
///
/// Declines are expected results, not faults; `into_result` converts them
/// into typed errors for callers that prefer `?`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolOutcome {
    pub group_id: String,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ProtocolFailure>,
}

impl ProtocolOutcome {
    pub fn succeeded(group_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            success: true,
            message: message.into(),
            failure: None,
        }
    }

    pub fn declined(
        group_id: impl Into<String>,
        failure: ProtocolFailure,
        message: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            success: false,
            message: message.into(),
            failure: Some(failure),
        }
    }

    /// Convert a decline into the matching error variant
    pub fn into_result(self) -> Result<String> {
        let Some(failure) = self.failure else {
            return Ok(self.message);
        };
        let group_id = self.group_id;
        let message = self.message;
        Err(match failure {
            ProtocolFailure::RecordNotFound => Error::RecordNotFound { group_id, message },
            ProtocolFailure::IrreversibleLoss => Error::IrreversibleLoss { group_id, message },
            ProtocolFailure::NotReady { .. } | ProtocolFailure::NotUnanimous { .. } => {
                Error::ConsentBlocked { group_id, message }
            }
        })
    }
}

impl fmt::Display for ProtocolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Where a group currently is in the missing-node lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupState {
    /// Four active vertices
    Active,
    /// A vertex was lost and the triad is still inside its minimum period
    MemorialPending,
    /// The minimum period has passed but no decision has been made
    MemorialStable,
    /// The triad agreed to welcome a new fourth
    ReplacementReady,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupState::Active => "active",
            GroupState::MemorialPending => "memorial-pending",
            GroupState::MemorialStable => "memorial-stable",
            GroupState::ReplacementReady => "replacement-ready",
        };
        write!(f, "{}", s)
    }
}
