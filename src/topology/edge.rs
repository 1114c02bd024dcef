//! Edges: weighted relationships between two vertices
//!
//! A tetrahedron always carries the complete graph K4: one edge for each of
//! the C(4,2) = 6 unordered vertex pairs. Edges are materialized once from
//! the vertex list and only their strength and last interaction change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::vertex::{Vertex, VertexId};

/// Number of vertices in a tetrahedron
pub const VERTEX_COUNT: usize = 4;

/// Number of edges in K4
pub const EDGE_COUNT: usize = 6;

/// Index pairs in the order edges are generated
const PAIRS: [(usize, usize); EDGE_COUNT] = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];

/// A weighted relationship between two vertices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: VertexId,
    pub target: VertexId,
    /// Always within [0.0, 1.0]
    pub strength: f64,
    pub last_interaction: DateTime<Utc>,
}

impl Edge {
    /// Whether this edge joins `a` and `b`, in either direction
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    /// Whether `vertex_id` is one of the endpoints
    pub fn touches(&self, vertex_id: &str) -> bool {
        self.source == vertex_id || self.target == vertex_id
    }

    /// The endpoint opposite `vertex_id`, if it is an endpoint
    pub fn other(&self, vertex_id: &str) -> Option<&str> {
        if self.source == vertex_id {
            Some(&self.target)
        } else if self.target == vertex_id {
            Some(&self.source)
        } else {
            None
        }
    }

    /// Set strength, clamped to [0, 1], and stamp the interaction time
    pub fn set_strength(&mut self, strength: f64, at: DateTime<Utc>) {
        self.strength = clamp_strength(strength);
        self.last_interaction = at;
    }
}

/// Clamp a strength into [0, 1]. NaN becomes 0.
pub fn clamp_strength(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Generate the six edges of K4 with full strength, stamped now
pub fn generate_edges(vertices: &[Vertex; VERTEX_COUNT]) -> [Edge; EDGE_COUNT] {
    generate_edges_at(vertices, Utc::now())
}

/// Generate the six edges of K4 with an explicit timestamp
pub fn generate_edges_at(
    vertices: &[Vertex; VERTEX_COUNT],
    now: DateTime<Utc>,
) -> [Edge; EDGE_COUNT] {
    PAIRS.map(|(i, j)| {
        let (source, target) = (&vertices[i].id, &vertices[j].id);
        Edge {
            id: format!("{}-{}", source, target),
            source: source.clone(),
            target: target.clone(),
            strength: 1.0,
            last_interaction: now,
        }
    })
}
