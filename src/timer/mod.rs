//! Timer identities.
//!
//! The engine never sleeps. It arms one-shot deadlines on the
//! [`TimerService`](crate::TimerService) collaborator and the host reports
//! each expiry back through [`Engine::timer_expired`](crate::Engine::timer_expired).
//! Every id embeds the link handle, and session timers the session slot, so
//! an expiry that outlived its owner is recognised and dropped.

use std::fmt;

use crate::core::Role;
use crate::registry::NdlHandle;

/// What a timer guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Wait for a peer reply.
    ProtocolExpire,
    /// Security handshake deadline.
    SecurityExpire,
    /// Retransmission guard for a schedule frame sent in the given role.
    ReschRetry(Role),
    /// Retransmission guard for a data path frame of session slot `0`.
    NdpRetry(u8),
    /// Host deadline for answering a data indication.
    UserResponse {
        /// Session slot.
        ndp: u8,
        /// Session generation at arming time.
        generation: u32,
    },
}

/// Identity of one engine timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    /// Owning link.
    pub ndl: NdlHandle,
    /// Purpose.
    pub kind: TimerKind,
}

impl TimerId {
    pub(crate) fn new(ndl: NdlHandle, kind: TimerKind) -> Self {
        Self { ndl, kind }
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ndl[{}#{}]/{:?}",
            self.ndl.slot(),
            self.ndl.generation(),
            self.kind
        )
    }
}
