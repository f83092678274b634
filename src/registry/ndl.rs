//! Data link (NDL) entity.

use crate::core::constants::{MAX_NDP, MAX_NDP_CONTEXT};
use crate::core::{MacAddr, QosParams, ReasonCode, Role, SetupStatus};
use crate::fsm::NdlState;

use super::handle::NdlHandle;
use super::ndp::Ndp;
use super::pending::PendingQueue;

/// Established (local NDI, peer NDI) pair shared by the sessions using it.
#[derive(Debug, Clone, Default)]
pub(crate) struct NdpContext {
    pub valid: bool,
    pub local_ndi: MacAddr,
    pub peer_ndi: MacAddr,
    /// Bit per session slot enrolled in this context.
    pub members: u32,
}

/// Schedule relationship with one peer.
#[derive(Debug, Clone)]
pub(crate) struct Ndl {
    pub valid: bool,
    pub slot: usize,
    pub generation: u32,
    pub peer: MacAddr,

    pub state: NdlState,
    pub last_state: NdlState,
    pub role: Role,
    pub established: bool,
    pub under_negotiation: bool,
    pub dialog_token: u8,
    /// Last NDP-ID handed out in sequential mode.
    pub seq_num: u8,
    pub qos: QosParams,
    pub setup_status: SetupStatus,
    pub reason: ReasonCode,
    pub retry_count: u8,
    /// Peer answered our schedule request with a counter proposal.
    pub is_counter: bool,
    pub reject_pending: bool,

    pub ndps: Vec<Ndp>,
    pub ndp_count: u8,
    pub operating: Option<usize>,
    pub contexts: Vec<NdpContext>,
    pub pending: PendingQueue,

    /// Fast-recovery generation; zero when not in fast recovery.
    pub fast_recovery: u32,
    pub fast_recovery_id: u8,
}

impl Ndl {
    pub fn empty(slot: usize) -> Self {
        Self {
            valid: false,
            slot,
            generation: 0,
            peer: MacAddr::ZERO,
            state: NdlState::Idle,
            last_state: NdlState::Idle,
            role: Role::Initiator,
            established: false,
            under_negotiation: false,
            dialog_token: 0,
            seq_num: 0,
            qos: QosParams::default(),
            setup_status: SetupStatus::Continued,
            reason: ReasonCode::Reserved,
            retry_count: 0,
            is_counter: false,
            reject_pending: false,
            ndps: (0..MAX_NDP).map(|_| Ndp::empty()).collect(),
            ndp_count: 0,
            operating: None,
            contexts: vec![NdpContext::default(); MAX_NDP_CONTEXT],
            pending: PendingQueue::new(),
            fast_recovery: 0,
            fast_recovery_id: 0,
        }
    }

    pub fn handle(&self) -> NdlHandle {
        NdlHandle {
            slot: self.slot as u8,
            generation: self.generation,
        }
    }

    /// Next dialog token, never zero.
    pub fn next_dialog_token(&mut self) -> u8 {
        self.dialog_token = if self.dialog_token < u8::MAX {
            self.dialog_token + 1
        } else {
            1
        };
        self.dialog_token
    }

    /// Slot of the valid session with `ndp_id`.
    pub fn find_ndp(&self, ndp_id: u8) -> Option<usize> {
        self.ndps
            .iter()
            .position(|ndp| ndp.valid && ndp.ndp_id == ndp_id)
    }

    pub fn has_ndp_id(&self, ndp_id: u8) -> bool {
        self.find_ndp(ndp_id).is_some()
    }

    /// True when `mac` is the peer management address or a peer NDI.
    pub fn matches_mac(&self, mac: MacAddr) -> bool {
        self.peer == mac || self.ndps.iter().any(|ndp| ndp.valid && ndp.peer_ndi == mac)
    }

    /// State machine is idle or settled on an established schedule.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, NdlState::Idle | NdlState::ScheduleEstablished)
    }

    /// Attach session `ndp` to the context of its NDI pair.
    pub fn enroll_context(&mut self, ndp: usize) -> Option<usize> {
        let (local, peer) = (self.ndps[ndp].local_ndi, self.ndps[ndp].peer_ndi);
        let index = self
            .contexts
            .iter()
            .position(|c| c.valid && c.local_ndi == local && c.peer_ndi == peer)
            .or_else(|| self.contexts.iter().position(|c| !c.valid))?;

        let context = &mut self.contexts[index];
        if !context.valid {
            *context = NdpContext {
                valid: true,
                local_ndi: local,
                peer_ndi: peer,
                members: 0,
            };
        }
        context.members |= 1 << ndp;
        self.ndps[ndp].context = Some(index);
        Some(index)
    }

    /// Detach session `ndp`; the context is released with its last member.
    pub fn unroll_context(&mut self, ndp: usize) {
        let Some(index) = self.ndps[ndp].context.take() else {
            return;
        };
        let context = &mut self.contexts[index];
        context.members &= !(1 << ndp);
        if context.members == 0 {
            *context = NdpContext::default();
        }
    }

    pub fn snapshot(&self) -> NdlSnapshot {
        NdlSnapshot {
            handle: self.handle(),
            peer: self.peer,
            state: self.state,
            role: self.role,
            established: self.established,
            under_negotiation: self.under_negotiation,
            ndp_count: self.ndp_count,
            operating_ndp: self.operating.map(|slot| self.ndps[slot].ndp_id),
            pending: self.pending.len(),
            dialog_token: self.dialog_token,
            setup_status: self.setup_status,
            fast_recovery: self.fast_recovery,
            contexts: self.contexts.iter().filter(|c| c.valid).count(),
        }
    }
}

/// Read-only view of a data link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdlSnapshot {
    /// Handle of the link.
    pub handle: NdlHandle,
    /// Peer management address.
    pub peer: MacAddr,
    /// Management state.
    pub state: NdlState,
    /// Role in the current negotiation.
    pub role: Role,
    /// Schedule established.
    pub established: bool,
    /// Holds the scheduler negotiation permit.
    pub under_negotiation: bool,
    /// Number of valid sessions.
    pub ndp_count: u8,
    /// NDP-ID of the session being negotiated.
    pub operating_ndp: Option<u8>,
    /// Queued requests.
    pub pending: usize,
    /// Current dialog token.
    pub dialog_token: u8,
    /// Current setup status.
    pub setup_status: SetupStatus,
    /// Fast-recovery generation.
    pub fast_recovery: u32,
    /// Live NDI contexts.
    pub contexts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialog_token_skips_zero() {
        let mut ndl = Ndl::empty(0);
        ndl.dialog_token = u8::MAX;
        assert_eq!(ndl.next_dialog_token(), 1);
        assert_eq!(ndl.next_dialog_token(), 2);
    }

    #[test]
    fn test_context_shared_by_same_pair() {
        let mut ndl = Ndl::empty(0);
        for slot in [0, 1] {
            ndl.ndps[slot].valid = true;
            ndl.ndps[slot].local_ndi = MacAddr::new([2, 0, 0, 0, 0, 1]);
            ndl.ndps[slot].peer_ndi = MacAddr::new([2, 0, 0, 0, 0, 2]);
        }

        assert_eq!(ndl.enroll_context(0), Some(0));
        assert_eq!(ndl.enroll_context(1), Some(0));

        ndl.unroll_context(0);
        assert!(ndl.contexts[0].valid);
        ndl.unroll_context(1);
        assert!(!ndl.contexts[0].valid);

        // second unroll is a no-op
        ndl.unroll_context(1);
    }

    #[test]
    fn test_context_table_full() {
        let mut ndl = Ndl::empty(0);
        for c in ndl.contexts.iter_mut() {
            c.valid = true;
            c.members = 1 << 7;
        }
        ndl.ndps[0].valid = true;
        ndl.ndps[0].peer_ndi = MacAddr::new([2, 0, 0, 0, 0, 9]);
        assert_eq!(ndl.enroll_context(0), None);
    }
}
