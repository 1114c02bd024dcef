//! Vertices: the four participants of a tetrahedron

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a vertex within a module
pub type VertexId = String;

// ─────────────────────────────────────────────────────────────────
// Vertex Category
// ─────────────────────────────────────────────────────────────────

/// The facet a participant brings to the relationship.
///
/// Informational only: two vertices may share a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VertexCategory {
    Emotional,
    Practical,
    Technical,
    Philosophical,
}

impl VertexCategory {
    /// Slug used in the CLI and serialized state
    pub fn slug(&self) -> &'static str {
        match self {
            VertexCategory::Emotional => "emotional",
            VertexCategory::Practical => "practical",
            VertexCategory::Technical => "technical",
            VertexCategory::Philosophical => "philosophical",
        }
    }

    /// All categories in canonical order
    pub fn all() -> &'static [VertexCategory] {
        &[
            VertexCategory::Emotional,
            VertexCategory::Practical,
            VertexCategory::Technical,
            VertexCategory::Philosophical,
        ]
    }
}

impl fmt::Display for VertexCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for VertexCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emotional" => Ok(VertexCategory::Emotional),
            "practical" => Ok(VertexCategory::Practical),
            "technical" => Ok(VertexCategory::Technical),
            "philosophical" => Ok(VertexCategory::Philosophical),
            _ => Err(format!(
                "Unknown vertex category '{}'. Valid: emotional, practical, technical, philosophical",
                s
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Vertex
// ─────────────────────────────────────────────────────────────────

/// Known metadata keys plus an open map for everything else
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexMetadata {
    /// Role within the relationship (e.g. "parent", "sibling")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// When the participant joined the group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,

    /// Any other keys
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl VertexMetadata {
    /// Shallow-merge another metadata bag into this one
    pub fn merge(&mut self, other: VertexMetadata) {
        if other.role.is_some() {
            self.role = other.role;
        }
        if other.joined_at.is_some() {
            self.joined_at = other.joined_at;
        }
        self.extra.extend(other.extra);
    }
}

/// A named participant of a tetrahedron
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub name: String,
    pub category: VertexCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: VertexMetadata,
}

impl Vertex {
    pub fn new(
        id: impl Into<VertexId>,
        name: impl Into<String>,
        category: VertexCategory,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: String::new(),
            metadata: VertexMetadata::default(),
        }
    }

    /// Builder-style description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder-style role
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.metadata.role = Some(role.into());
        self
    }

    /// Apply a partial update. The id and category never change.
    pub fn apply(&mut self, patch: VertexPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata.merge(metadata);
        }
    }
}

impl FromStr for Vertex {
    type Err = String;

    /// Parse the CLI form `id:name:category`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(3, ':').collect();
        match parts.as_slice() {
            [id, name, category] if !id.is_empty() && !name.is_empty() => {
                Ok(Vertex::new(*id, *name, category.parse()?))
            }
            _ => Err(format!(
                "Invalid vertex '{}'. Expected id:name:category",
                s
            )),
        }
    }
}

/// Partial vertex update
#[derive(Debug, Clone, Default)]
pub struct VertexPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<VertexMetadata>,
}
