//! Topology model
//!
//! Any four-party relationship (family, team, co-parents) is modelled as a
//! tetrahedron: four vertices and the six edges of the complete graph K4.
//! A vertex set of any other size is unrepresentable; constructors take
//! `[Vertex; 4]`.

pub mod edge;
pub mod vertex;

pub use edge::*;
pub use vertex::*;
