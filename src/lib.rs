//! # nan-datapath
//!
//! **N**eighbor **A**wareness **N**etworking data path engine.
//!
//! The crate sets up, maintains and tears down NAN data links (NDL) and the
//! data path sessions (NDP) carried over them. Two coupled protocol state
//! machines drive the exchange of schedule and data path action frames with
//! a peer:
//!
//! - **Schedule negotiation**: request, response and confirm of the link
//!   schedule, plus later renegotiation and one-way updates
//! - **Data path setup**: request, response, confirm and key install, with an
//!   optional security handshake interleaved
//! - **Recovery**: retransmission, timeouts, crossed requests and fast
//!   recovery eviction when the link pool is full
//!
//! Radio scheduling, key derivation, frame transmission and time are
//! collaborators supplied by the host through the [`Platform`] traits.
//!
//! ## Feature Flags
//!
//! - `runtime` (default): tokio-backed [`TimerService`]
//!
//! ## Modules
//!
//! - [`core`]: Configuration, errors, shared types and collaborator traits
//! - [`registry`]: Link and session pools, handles and instance ids
//! - [`frame`]: Action frame and attribute codec
//! - [`fsm`]: Link and session state enums
//! - [`engine`]: The [`Engine`] and its host API
//! - [`timer`]: Timer identities
//! - [`runtime`]: Tokio timer service (requires `runtime` feature)
//!
//! ## Example Usage
//!
//! ```ignore
//! use nan_datapath::prelude::*;
//!
//! let config = EngineConfig {
//!     local_address: MacAddr([0x02, 0, 0, 0, 0, 0x10]),
//!     local_ndi: MacAddr([0x02, 0, 0, 0, 0, 0x11]),
//!     ..EngineConfig::default()
//! };
//! let mut engine = Engine::new(config, platform)?;
//!
//! let outcome = engine.data_request(DataRequest::new(peer, publish_id))?;
//! println!("session {} started", outcome.instance_id);
//!
//! // driver loop
//! engine.receive(&frame)?;
//! engine.tx_done(&sent, TxStatus::Success)?;
//! engine.timer_expired(timer)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod engine;
pub mod frame;
pub mod fsm;
pub mod registry;
pub mod timer;

// Tokio timers (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Configuration, errors, traits and shared types
    pub use crate::core::*;

    pub use crate::engine::{
        DataEnd, DataRequest, DataRequestOutcome, DataResponse, Engine, HostEvent,
    };
    pub use crate::fsm::{NdlState, NdpState};
    pub use crate::registry::{InstanceId, NdlHandle, NdlSnapshot, NdpSnapshot};
    pub use crate::timer::{TimerId, TimerKind};

    #[cfg(feature = "runtime")]
    pub use crate::runtime::TokioTimers;
}

// Re-export commonly used items at crate root
pub use core::{
    ConfigError, EngineConfig, EngineError, EngineResult, FrameError, HostEvents, MacAddr,
    Platform, Scheduler, Security, TimerService, Transport, TransportError, TxStatus,
};
pub use engine::{DataEnd, DataRequest, DataRequestOutcome, DataResponse, Engine, HostEvent};
pub use fsm::{NdlState, NdpState};
pub use registry::{InstanceId, NdlHandle, NdlSnapshot, NdpSnapshot};
pub use timer::{TimerId, TimerKind};

#[cfg(feature = "runtime")]
pub use runtime::TokioTimers;
