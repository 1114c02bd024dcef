//! Modules and the docking interface
//!
//! A module owns exactly one tetrahedron and exposes a docking contract to
//! an external hub:
//! - **Docking**: connect with an opaque credential, disconnect
//! - **Data**: share, receive and send typed data, gated on the credential
//! - **Events**: per-module, per-event-type subscriptions

pub mod base;
pub mod docking;
pub mod hub;
pub mod metadata;

pub use base::*;
pub use docking::*;
pub use hub::*;
pub use metadata::*;
