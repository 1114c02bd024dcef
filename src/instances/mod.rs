//! Concrete modules built on the docking contract

pub mod creator;
pub mod memorial;

pub use creator::CreatorTetrahedron;
pub use memorial::MemorialTetrahedron;
