//! Data path (NDP) protocol state machine.
//!
//! One machine per session. Entering a state runs its effects; an effect may
//! request another state, in which case the step loop continues there.

use std::fmt;

use tracing::{error, info};

use crate::core::{Platform, Role, SetupStatus};
use crate::engine::{Engine, HostEvent};
use crate::frame::ActionSubtype;
use crate::registry::NdpRef;
use crate::timer::TimerKind;

use super::NdlState;

/// Protocol state of a data path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NdpState {
    /// Allocated, nothing sent or received.
    Idle,
    /// Sending our data path request.
    InitiatorTxDpRequest,
    /// Waiting for the peer response.
    InitiatorRxDpResponse,
    /// Sending our data path confirm.
    InitiatorTxDpConfirm,
    /// Waiting for the peer key installment.
    InitiatorRxDpSecurityInstall,
    /// Waiting for the host decision on a peer request.
    ResponderWaitDataRsp,
    /// Sending our data path response.
    ResponderTxDpResponse,
    /// Waiting for the peer confirm.
    ResponderRxDpConfirm,
    /// Sending our key installment.
    ResponderTxDpSecurityInstall,
    /// Set up and carrying traffic.
    NormalTr,
    /// Sending a termination.
    TxDpTermination,
    /// Tearing the session down.
    Disconnect,
}

impl NdpState {
    /// Transmit state whose frame is `subtype`.
    pub(crate) fn is_tx_of(self, subtype: ActionSubtype) -> bool {
        matches!(
            (self, subtype),
            (NdpState::InitiatorTxDpRequest, ActionSubtype::DataPathRequest)
                | (NdpState::ResponderTxDpResponse, ActionSubtype::DataPathResponse)
                | (NdpState::InitiatorTxDpConfirm, ActionSubtype::DataPathConfirm)
                | (
                    NdpState::ResponderTxDpSecurityInstall,
                    ActionSubtype::DataPathKeyInstall
                )
                | (NdpState::TxDpTermination, ActionSubtype::DataPathTermination)
        )
    }
}

impl fmt::Display for NdpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NdpState::Idle => "NDP_IDLE",
            NdpState::InitiatorTxDpRequest => "NDP_INITIATOR_TX_DP_REQUEST",
            NdpState::InitiatorRxDpResponse => "NDP_INITIATOR_RX_DP_RESPONSE",
            NdpState::InitiatorTxDpConfirm => "NDP_INITIATOR_TX_DP_CONFIRM",
            NdpState::InitiatorRxDpSecurityInstall => "NDP_INITIATOR_RX_DP_SECURITY_INSTALL",
            NdpState::ResponderWaitDataRsp => "NDP_RESPONDER_WAIT_DATA_RSP",
            NdpState::ResponderTxDpResponse => "NDP_RESPONDER_TX_DP_RESPONSE",
            NdpState::ResponderRxDpConfirm => "NDP_RESPONDER_RX_DP_CONFIRM",
            NdpState::ResponderTxDpSecurityInstall => "NDP_RESPONDER_TX_DP_SECURITY_INSTALL",
            NdpState::NormalTr => "NDP_NORMAL_TR",
            NdpState::TxDpTermination => "NDP_TX_DP_TERMINATION",
            NdpState::Disconnect => "NDP_DISCONNECT",
        };
        f.write_str(name)
    }
}

impl<P: Platform> Engine<P> {
    /// Drive session `at` into `next` and onward until it settles.
    pub(crate) fn ndp_step(&mut self, at: NdpRef, next: NdpState) {
        let mut next = next;
        loop {
            let ndp = self.registry.ndp_mut(at);
            if !ndp.valid {
                return;
            }
            let from = ndp.state;
            ndp.last_state = from;
            ndp.state = next;
            info!(ndp_id = ndp.ndp_id, from = %from, to = %next, "NDP state transition");

            match self.ndp_enter(at, next) {
                Some(requested) => next = requested,
                None => return,
            }
        }
    }

    fn ndp_enter(&mut self, at: NdpRef, state: NdpState) -> Option<NdpState> {
        let config = &self.config;
        let (data_retry, confirm_timeout, protocol_timeout, user_timeout) = (
            config.data_retry_timeout,
            config.confirm_timeout,
            config.protocol_timeout,
            config.user_response_timeout,
        );
        let retry_timer = TimerKind::NdpRetry(at.ndp as u8);

        match state {
            NdpState::Idle => None,

            NdpState::InitiatorTxDpRequest => {
                let ndl = self.registry.ndl_mut(at.ndl);
                let established = ndl.established;
                let fresh = ndl.ndps[at.ndp].retry_frame.is_none();
                ndl.ndps[at.ndp].setup_status = SetupStatus::Continued;
                if fresh {
                    if !established {
                        ndl.next_dialog_token();
                    }
                    ndl.ndps[at.ndp].next_dialog_token();
                }
                self.send_data_path_frame(at, ActionSubtype::DataPathRequest);
                self.restart_timer(at.ndl, retry_timer, data_retry);
                None
            }

            NdpState::InitiatorRxDpResponse
            | NdpState::InitiatorRxDpSecurityInstall
            | NdpState::ResponderRxDpConfirm => {
                self.restart_timer(at.ndl, TimerKind::ProtocolExpire, protocol_timeout);
                None
            }

            NdpState::InitiatorTxDpConfirm => {
                self.send_data_path_frame(at, ActionSubtype::DataPathConfirm);
                self.restart_timer(at.ndl, retry_timer, data_retry);
                None
            }

            NdpState::ResponderWaitDataRsp => {
                let event = self.data_indication(at);
                self.emit(event);
                let kind = TimerKind::UserResponse {
                    ndp: at.ndp as u8,
                    generation: self.registry.ndp_generation(at),
                };
                self.restart_timer(at.ndl, kind, user_timeout);
                None
            }

            NdpState::ResponderTxDpResponse => {
                self.stop_user_response_timer(at);
                self.send_data_path_frame(at, ActionSubtype::DataPathResponse);
                self.restart_timer(at.ndl, retry_timer, confirm_timeout);
                None
            }

            NdpState::ResponderTxDpSecurityInstall => {
                self.send_data_path_frame(at, ActionSubtype::DataPathKeyInstall);
                self.restart_timer(at.ndl, retry_timer, data_retry);
                None
            }

            NdpState::NormalTr => {
                self.deactivate_ndl_timers(at.ndl);

                let ndl = self.registry.ndl_mut(at.ndl);
                if ndl.enroll_context(at.ndp).is_none() {
                    error!(peer = %ndl.peer, ndp_id = ndl.ndps[at.ndp].ndp_id, "no free NDP context");
                    ndl.ndps[at.ndp].established = false;
                    return Some(NdpState::TxDpTermination);
                }
                let peer = ndl.peer;
                ndl.ndps[at.ndp].established = true;

                self.platform.setup_complete(peer);
                self.ndl_step(at.ndl, NdlState::ScheduleEstablished);
                self.setup_success(at);
                None
            }

            NdpState::TxDpTermination => {
                self.send_data_path_frame(at, ActionSubtype::DataPathTermination);
                None
            }

            NdpState::Disconnect => {
                self.deactivate_ndl_timers(at.ndl);

                let ndp = self.registry.ndp(at);
                let event = HostEvent::DataTermination {
                    instance_id: ndp.instance_id,
                    ndp_id: ndp.ndp_id,
                    reason: ndp.fail_reason,
                };
                let (session, security) = (ndp.instance_id, ndp.security_required);
                self.emit(event);

                let ndl = self.registry.ndl_mut(at.ndl);
                if ndl.operating == Some(at.ndp) {
                    ndl.operating = None;
                }
                if security {
                    self.platform.terminate_handshake(session);
                }
                self.free_ndp(at);
                self.ndl_step(at.ndl, NdlState::TeardownByNdpTermination);
                None
            }
        }
    }

    /// Session reached normal traffic: mark it active and confirm to the host.
    fn setup_success(&mut self, at: NdpRef) {
        let use_ndpe = self.use_ndpe(at);
        let ndp = self.registry.ndp_mut(at);
        if !ndp.valid {
            return;
        }
        ndp.active = true;
        let event = HostEvent::DataConfirm {
            instance_id: ndp.instance_id,
            ndp_id: ndp.ndp_id,
            status: ndp.setup_status,
            reason: ndp.reason,
            peer_ndi: ndp.peer_ndi,
            security: ndp.security_required,
            app_info: ndp.peer_app_info.clone(),
            ndpe: use_ndpe.then_some(ndp.peer_ndpe),
        };
        self.emit(event);
    }

    fn data_indication(&self, at: NdpRef) -> HostEvent {
        let ndl = self.registry.ndl(at.ndl);
        let ndp = &ndl.ndps[at.ndp];
        HostEvent::DataIndication {
            instance_id: ndp.instance_id,
            ndp_id: ndp.ndp_id,
            publish_id: ndp.publish_id,
            peer: ndl.peer,
            peer_ndi: ndp.peer_ndi,
            qos_required: ndp.qos_required,
            security_required: ndp.security_required,
            cipher: ndp.cipher,
            scid: ndp.scid,
            app_info: ndp.peer_app_info.clone(),
            ndpe: self.use_ndpe(at).then_some(ndp.peer_ndpe),
        }
    }

    /// Initiator side verdict on sending the request.
    pub(crate) fn initiator_response(&mut self, at: NdpRef, success: bool) {
        let ndp = self.registry.ndp(at);
        if ndp.role != Role::Initiator {
            return;
        }
        let event = HostEvent::InitiatorResponse {
            trans_id: ndp.trans_id,
            instance_id: ndp.instance_id,
            ndp_id: ndp.ndp_id,
            success,
        };
        self.emit(event);
    }

    /// Responder side verdict on sending the response.
    pub(crate) fn responder_response(&mut self, at: NdpRef, success: bool) {
        let ndp = self.registry.ndp(at);
        let event = HostEvent::ResponderResponse {
            trans_id: ndp.trans_id,
            instance_id: ndp.instance_id,
            ndp_id: ndp.ndp_id,
            success,
            reason: ndp.fail_reason,
        };
        self.emit(event);
    }
}
