//! Coupled protocol state machines.
//!
//! [`NdlState`] tracks the schedule with one peer, [`NdpState`] one data
//! session on that schedule. Both step functions live on the
//! [`Engine`](crate::Engine) because their entry effects reach the
//! collaborators and each other.

mod ndl;
mod ndp;

pub use ndl::NdlState;
pub use ndp::NdpState;
