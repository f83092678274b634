//! Data link (NDL) management state machine.
//!
//! One machine per peer. It owns the schedule negotiation and gates every
//! session setup behind it. Schedule failures fall back to the last
//! established schedule instead of tearing the link down, so running
//! sessions keep their availability.

use std::fmt;

use tracing::{debug, info, warn};

use crate::core::{NegotiationStart, Platform, ProposalVerdict, Role, SetupStatus};
use crate::engine::Engine;
use crate::frame::ActionSubtype;
use crate::registry::{NdpRef, RequestKind};
use crate::timer::TimerKind;

use super::NdpState;

/// Management state of a data link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NdlState {
    /// No schedule, nothing in progress.
    Idle,
    /// Waiting for the scheduler permit to set up a session.
    RequestScheduleNdp,
    /// Waiting for the scheduler permit to renegotiate the link.
    RequestScheduleNdl,
    /// Session setup carries the schedule negotiation.
    ScheduleSetup,
    /// Sending our schedule request.
    InitiatorTxScheduleRequest,
    /// Waiting for the peer schedule response.
    InitiatorWaitforRxScheduleResponse,
    /// Judging the peer schedule response.
    InitiatorRxScheduleResponse,
    /// Sending our schedule confirm.
    InitiatorTxScheduleConfirm,
    /// Judging a peer schedule request.
    ResponderRxScheduleRequest,
    /// Sending our schedule response.
    ResponderTxScheduleResponse,
    /// Waiting for the peer schedule confirm.
    ResponderRxScheduleConfirm,
    /// Schedule agreed.
    ScheduleEstablished,
    /// Release the link and every session on it.
    Teardown,
    /// A session ended; release the link if it was the last one.
    TeardownByNdpTermination,
}

impl fmt::Display for NdlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NdlState::Idle => "NDL_IDLE",
            NdlState::RequestScheduleNdp => "NDL_REQUEST_SCHEDULE_NDP",
            NdlState::RequestScheduleNdl => "NDL_REQUEST_SCHEDULE_NDL",
            NdlState::ScheduleSetup => "NDL_SCHEDULE_SETUP",
            NdlState::InitiatorTxScheduleRequest => "NDL_INITIATOR_TX_SCHEDULE_REQUEST",
            NdlState::InitiatorWaitforRxScheduleResponse => {
                "NDL_INITIATOR_WAITFOR_RX_SCHEDULE_RESPONSE"
            }
            NdlState::InitiatorRxScheduleResponse => "NDL_INITIATOR_RX_SCHEDULE_RESPONSE",
            NdlState::InitiatorTxScheduleConfirm => "NDL_INITIATOR_TX_SCHEDULE_CONFIRM",
            NdlState::ResponderRxScheduleRequest => "NDL_RESPONDER_RX_SCHEDULE_REQUEST",
            NdlState::ResponderTxScheduleResponse => "NDL_RESPONDER_TX_SCHEDULE_RESPONSE",
            NdlState::ResponderRxScheduleConfirm => "NDL_RESPONDER_RX_SCHEDULE_CONFIRM",
            NdlState::ScheduleEstablished => "NDL_SCHEDULE_ESTABLISHED",
            NdlState::Teardown => "NDL_TEARDOWN",
            NdlState::TeardownByNdpTermination => "NDL_TEARDOWN_BY_NDP_TERMINATION",
        };
        f.write_str(name)
    }
}

impl<P: Platform> Engine<P> {
    /// Drive link `slot` into `next` and onward until it settles.
    pub(crate) fn ndl_step(&mut self, slot: usize, next: NdlState) {
        let mut next = next;
        loop {
            let ndl = self.registry.ndl_mut(slot);
            if !ndl.valid {
                return;
            }
            let from = ndl.state;
            ndl.last_state = from;
            ndl.state = next;
            info!(peer = %ndl.peer, from = %from, to = %next, "NDL state transition");

            match self.ndl_enter(slot, next) {
                Some(requested) if requested != next => next = requested,
                _ => return,
            }
        }
    }

    fn ndl_enter(&mut self, slot: usize, state: NdlState) -> Option<NdlState> {
        match state {
            NdlState::Idle => self.pop_pending(slot),

            NdlState::RequestScheduleNdp => {
                if self.registry.ndl(slot).established {
                    return Some(NdlState::ScheduleSetup);
                }
                self.request_negotiation(slot);
                None
            }

            NdlState::RequestScheduleNdl => {
                let peer = self.registry.ndl(slot).peer;
                self.request_negotiation(slot);
                self.platform.peer_negotiation_complete(peer);
                None
            }

            NdlState::ScheduleSetup => self.schedule_setup(slot),

            NdlState::InitiatorTxScheduleRequest => {
                let ndl = self.registry.ndl_mut(slot);
                ndl.setup_status = SetupStatus::Continued;
                ndl.next_dialog_token();
                self.send_schedule_frame(slot, ActionSubtype::ScheduleRequest);
                let after = self.config.schedule_timeout;
                self.restart_timer(slot, TimerKind::ReschRetry(Role::Initiator), after);
                None
            }

            NdlState::ResponderRxScheduleRequest => {
                self.registry.ndl_mut(slot).retry_count = 0;
                let verdict = self.platform.check_remote_proposal();
                let ndl = self.registry.ndl_mut(slot);
                match verdict {
                    ProposalVerdict::Accept => ndl.setup_status = SetupStatus::Accepted,
                    ProposalVerdict::Counter => ndl.setup_status = SetupStatus::Continued,
                    ProposalVerdict::Reject(reason) => {
                        ndl.setup_status = SetupStatus::Rejected;
                        ndl.reason = reason;
                    }
                }
                Some(NdlState::ResponderTxScheduleResponse)
            }

            NdlState::ResponderTxScheduleResponse => {
                self.send_schedule_frame(slot, ActionSubtype::ScheduleResponse);
                let after = self.config.schedule_timeout;
                self.restart_timer(slot, TimerKind::ReschRetry(Role::Responder), after);
                None
            }

            NdlState::InitiatorWaitforRxScheduleResponse | NdlState::ResponderRxScheduleConfirm => {
                let after = self.config.security_timeout;
                self.restart_timer(slot, TimerKind::ProtocolExpire, after);
                None
            }

            NdlState::InitiatorRxScheduleResponse => {
                self.stop_timer(slot, TimerKind::ProtocolExpire);
                let verdict = self.platform.check_remote_proposal();
                let ndl = self.registry.ndl_mut(slot);
                match verdict {
                    ProposalVerdict::Accept => {
                        ndl.setup_status = SetupStatus::Accepted;
                        if ndl.is_counter {
                            Some(NdlState::InitiatorTxScheduleConfirm)
                        } else {
                            Some(NdlState::ScheduleEstablished)
                        }
                    }
                    ProposalVerdict::Counter => {
                        ndl.setup_status = SetupStatus::Continued;
                        Some(NdlState::InitiatorTxScheduleConfirm)
                    }
                    ProposalVerdict::Reject(reason) => {
                        ndl.setup_status = SetupStatus::Rejected;
                        ndl.reason = reason;
                        Some(NdlState::InitiatorTxScheduleConfirm)
                    }
                }
            }

            NdlState::InitiatorTxScheduleConfirm => {
                self.send_schedule_frame(slot, ActionSubtype::ScheduleConfirm);
                let after = self.config.schedule_timeout;
                self.restart_timer(slot, TimerKind::ReschRetry(Role::Initiator), after);
                None
            }

            NdlState::ScheduleEstablished => {
                if self.registry.ndl(slot).last_state == NdlState::ScheduleEstablished {
                    return None;
                }
                self.registry.ndl_mut(slot).established = true;
                self.deactivate_ndl_timers(slot);
                self.return_permit(slot);
                self.registry.ndl_mut(slot).operating = None;
                self.pop_pending(slot)
            }

            NdlState::Teardown | NdlState::TeardownByNdpTermination => {
                self.deactivate_ndl_timers(slot);
                self.return_permit(slot);

                let ndl = self.registry.ndl_mut(slot);
                if ndl.ndp_count == 0 || state == NdlState::Teardown {
                    ndl.established = false;
                    let peer = ndl.peer;
                    self.free_ndl(slot);
                    self.platform.drop_resources(peer);
                    return None;
                }

                if ndl.last_state == NdlState::RequestScheduleNdl {
                    // wait for the scheduler to grant the pending renegotiation
                    ndl.state = NdlState::RequestScheduleNdl;
                    return None;
                }
                Some(NdlState::ScheduleEstablished)
            }
        }
    }

    /// Entry of SCHEDULE_SETUP: start or answer the operating session.
    fn schedule_setup(&mut self, slot: usize) -> Option<NdlState> {
        let ndl = self.registry.ndl_mut(slot);
        let Some(operating) = ndl.operating else {
            warn!(peer = %ndl.peer, "schedule setup without an operating data path");
            let established = ndl.established;
            self.return_permit(slot);
            return Some(if established {
                NdlState::ScheduleEstablished
            } else {
                NdlState::Idle
            });
        };
        let (role, established) = (ndl.role, ndl.established);
        let at = NdpRef::new(slot, operating);

        match (role, established) {
            (Role::Initiator, false) => {
                if let Err(reason) = self.platform.gen_local_proposal() {
                    warn!(?reason, "scheduler refused to build a proposal");
                    return Some(NdlState::Teardown);
                }
                self.ndp_step(at, NdpState::InitiatorTxDpRequest);
            }
            (Role::Initiator, true) => self.ndp_step(at, NdpState::InitiatorTxDpRequest),
            (Role::Responder, false) => {
                let verdict = self.platform.check_remote_proposal();
                let ndl = self.registry.ndl_mut(slot);
                let ndp_needs_more = {
                    let ndp = &ndl.ndps[operating];
                    ndp.confirm_required || ndp.security_required
                };
                let (ndl_status, ndp_status) = match verdict {
                    ProposalVerdict::Accept if ndp_needs_more => {
                        (SetupStatus::Accepted, SetupStatus::Continued)
                    }
                    ProposalVerdict::Accept => (SetupStatus::Accepted, SetupStatus::Accepted),
                    ProposalVerdict::Counter => (SetupStatus::Continued, SetupStatus::Continued),
                    ProposalVerdict::Reject(reason) => {
                        ndl.reason = reason;
                        ndl.ndps[operating].reason = reason;
                        (SetupStatus::Rejected, SetupStatus::Rejected)
                    }
                };
                debug!(?verdict, "peer proposal checked");
                ndl.setup_status = ndl_status;
                ndl.ndps[operating].setup_status = ndp_status;
                self.ndp_step(at, NdpState::ResponderTxDpResponse);
            }
            (Role::Responder, true) => self.ndp_step(at, NdpState::ResponderTxDpResponse),
        }
        None
    }

    /// Replay the next queued request, if any.
    fn pop_pending(&mut self, slot: usize) -> Option<NdlState> {
        let ndl = self.registry.ndl_mut(slot);
        let request = ndl.pending.pop()?;
        ndl.role = request.role;
        debug!(peer = %ndl.peer, kind = ?request.kind, "replaying pending request");
        match request.kind {
            RequestKind::NdlSetup => Some(NdlState::RequestScheduleNdl),
            RequestKind::NdpSetup => {
                ndl.operating = request.ndp;
                Some(NdlState::RequestScheduleNdp)
            }
        }
    }

    /// Ask the scheduler for the negotiation permit.
    fn request_negotiation(&mut self, slot: usize) {
        let ndl = self.registry.ndl(slot);
        let (peer, role, handle) = (ndl.peer, ndl.role, ndl.handle());
        match self.platform.negotiation_start(peer, role, handle) {
            NegotiationStart::Granted => self.negotiation_granted(handle),
            NegotiationStart::Deferred => {
                debug!(peer = %peer, "negotiation permit deferred");
            }
        }
    }

    /// Give the negotiation permit back if this link holds it.
    pub(crate) fn return_permit(&mut self, slot: usize) {
        let ndl = self.registry.ndl_mut(slot);
        if ndl.under_negotiation {
            ndl.under_negotiation = false;
            self.platform.negotiation_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(NdlState::Idle.to_string(), "NDL_IDLE");
        assert_eq!(
            NdlState::TeardownByNdpTermination.to_string(),
            "NDL_TEARDOWN_BY_NDP_TERMINATION"
        );
    }
}
