//! Missing Node Protocol
//!
//! What a group does when it loses one of its four vertices. A loss opens a
//! memorial and a triad stabilization period whose length depends on the
//! kind of loss; the remaining three then decide together, at their own
//! pace, whether to welcome a new fourth.

pub mod missing_node;
pub mod outcome;
pub mod types;

pub use missing_node::*;
pub use outcome::*;
pub use types::*;
