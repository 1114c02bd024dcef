//! Tetrahedron
//!
//! Groups of exactly four people modelled as a complete graph on four
//! vertices, a docking contract that lets a group plug into a hub, and the
//! missing-node protocol for when one of the four is lost.

pub mod config;
pub mod error;
pub mod instances;
pub mod logging;
pub mod module;
pub mod protocol;
pub mod store;
pub mod topology;
pub mod version;

pub use error::{Error, ErrorCode, Result};
