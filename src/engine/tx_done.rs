//! Transmit completions.
//!
//! The transport reports every queued frame back with its final status. A
//! completion only moves a state machine that is still in the state that
//! sent the frame; anything else is a late report and changes nothing.

use tracing::{debug, warn};

use crate::core::{EngineError, EngineResult, Platform, Role, SecMessage, SetupStatus, TxStatus};
use crate::frame::{ActionFrame, ActionSubtype};
use crate::fsm::{NdlState, NdpState};
use crate::registry::NdpRef;
use crate::timer::TimerKind;

use super::{Engine, HostEvent};

impl<P: Platform> Engine<P> {
    /// Transmit completion of `frame`, as handed to
    /// [`Transport::send_naf`](crate::Transport::send_naf).
    pub fn tx_done(&mut self, frame: &[u8], status: TxStatus) -> EngineResult<()> {
        self.ensure_running()?;
        let (dest, _, subtype) = ActionFrame::peek_header(frame)?;
        let slot = self
            .registry
            .find_ndl_by_mac(dest)
            .ok_or(EngineError::Ignored("transmit completion for unknown peer"))?;
        debug!(peer = %dest, %subtype, ?status, "transmit completion");

        if subtype.is_data_path() {
            let decoded = ActionFrame::decode(frame)?;
            let ndp_id = decoded
                .data_path()
                .ok_or(EngineError::Ignored("transmit completion without data path"))?
                .ndp_id;
            let at = self
                .registry
                .find_ndp_by_id(slot, ndp_id)
                .ok_or(EngineError::Ignored("transmit completion for released session"))?;
            self.data_path_tx_done(at, subtype, frame, status);
        } else {
            self.schedule_tx_done(slot, subtype, frame, status);
        }
        Ok(())
    }

    fn data_path_tx_done(
        &mut self,
        at: NdpRef,
        subtype: ActionSubtype,
        frame: &[u8],
        status: TxStatus,
    ) {
        let in_tx_state = self.registry.ndp(at).state.is_tx_of(subtype);
        if status.is_success() {
            self.stop_timer(at.ndl, TimerKind::NdpRetry(at.ndp as u8));
        }
        if !in_tx_state {
            debug!(%subtype, "late transmit completion");
            return;
        }

        if status.is_success() {
            self.registry.ndp_mut(at).retry_count = 0;
            self.data_path_sent(at, subtype);
            return;
        }

        let limit = self.config.retry_limit;
        let ndp = self.registry.ndp_mut(at);
        ndp.retry_count += 1;
        if ndp.retry_count < limit {
            debug!(ndp_id = ndp.ndp_id, retry = ndp.retry_count, %subtype, "retransmitting");
            if subtype != ActionSubtype::DataPathTermination {
                ndp.retry_frame = Some(frame.to_vec());
            }
            let state = ndp.state;
            self.ndp_step(at, state);
            return;
        }

        warn!(ndp_id = ndp.ndp_id, %subtype, "retry limit reached, disconnecting");
        ndp.retry_frame = None;
        let (trans_id, reason) = (ndp.trans_id, ndp.fail_reason);
        match subtype {
            ActionSubtype::DataPathRequest => self.initiator_response(at, false),
            ActionSubtype::DataPathResponse => self.responder_response(at, false),
            _ => {}
        }
        self.ndp_step(at, NdpState::Disconnect);
        if subtype == ActionSubtype::DataPathTermination {
            self.emit(HostEvent::EndResponse { trans_id, reason });
        }
    }

    /// A data path frame left the air while its sending state was current.
    fn data_path_sent(&mut self, at: NdpRef, subtype: ActionSubtype) {
        let ndp = self.registry.ndp(at);
        let (session, security, status) = (ndp.instance_id, ndp.security_required, ndp.setup_status);
        let handshake = |message| security.then_some((session, message));

        let next = match subtype {
            ActionSubtype::DataPathRequest => {
                if let Some((session, message)) = handshake(SecMessage::M1) {
                    self.platform.tx_done(session, message);
                }
                self.ndp_step(at, NdpState::InitiatorRxDpResponse);
                self.initiator_response(at, true);
                return;
            }
            ActionSubtype::DataPathResponse => {
                if let Some((session, message)) = handshake(SecMessage::M2) {
                    self.platform.tx_done(session, message);
                }
                self.responder_response(at, true);
                match status {
                    SetupStatus::Continued => NdpState::ResponderRxDpConfirm,
                    SetupStatus::Accepted => NdpState::NormalTr,
                    SetupStatus::Rejected => NdpState::Disconnect,
                }
            }
            ActionSubtype::DataPathConfirm => {
                if let Some((session, message)) = handshake(SecMessage::M3) {
                    self.platform.tx_done(session, message);
                }
                match status {
                    SetupStatus::Continued => NdpState::InitiatorRxDpSecurityInstall,
                    SetupStatus::Accepted => NdpState::NormalTr,
                    SetupStatus::Rejected => NdpState::Disconnect,
                }
            }
            ActionSubtype::DataPathKeyInstall => {
                if let Some((session, message)) = handshake(SecMessage::M4) {
                    self.platform.tx_done(session, message);
                }
                if status == SetupStatus::Accepted {
                    NdpState::NormalTr
                } else {
                    NdpState::Disconnect
                }
            }
            _ => {
                let ndp = self.registry.ndp(at);
                let (trans_id, reason) = (ndp.trans_id, ndp.fail_reason);
                self.ndp_step(at, NdpState::Disconnect);
                self.emit(HostEvent::EndResponse { trans_id, reason });
                return;
            }
        };
        self.ndp_step(at, next);
    }

    fn schedule_tx_done(
        &mut self,
        slot: usize,
        subtype: ActionSubtype,
        frame: &[u8],
        status: TxStatus,
    ) {
        let ndl = self.registry.ndl(slot);
        let (state, setup_status) = (ndl.state, ndl.setup_status);
        let (role, tx_state, limit) = match subtype {
            ActionSubtype::ScheduleRequest => (
                Role::Initiator,
                NdlState::InitiatorTxScheduleRequest,
                self.config.schedule_request_retry_limit,
            ),
            ActionSubtype::ScheduleResponse => (
                Role::Responder,
                NdlState::ResponderTxScheduleResponse,
                self.config.retry_limit,
            ),
            ActionSubtype::ScheduleConfirm => (
                Role::Initiator,
                NdlState::InitiatorTxScheduleConfirm,
                self.config.retry_limit,
            ),
            _ => (
                Role::Initiator,
                NdlState::ScheduleEstablished,
                self.config.retry_limit,
            ),
        };
        let retry_timer = TimerKind::ReschRetry(role);

        if status.is_success() {
            self.stop_timer(slot, retry_timer);
        }
        if state != tx_state {
            debug!(%subtype, "late transmit completion");
            return;
        }

        if status.is_success() {
            self.registry.ndl_mut(slot).retry_count = 0;
            match subtype {
                ActionSubtype::ScheduleRequest => {
                    self.ndl_step(slot, NdlState::InitiatorWaitforRxScheduleResponse);
                }
                ActionSubtype::ScheduleResponse => match setup_status {
                    SetupStatus::Continued => {
                        self.ndl_step(slot, NdlState::ResponderRxScheduleConfirm);
                    }
                    SetupStatus::Accepted => self.ndl_step(slot, NdlState::ScheduleEstablished),
                    SetupStatus::Rejected => self.fall_back_to_established(slot),
                },
                ActionSubtype::ScheduleConfirm => {
                    if setup_status == SetupStatus::Accepted {
                        self.ndl_step(slot, NdlState::ScheduleEstablished);
                    } else {
                        self.fall_back_to_established(slot);
                    }
                }
                _ => {}
            }
            return;
        }

        let ndl = self.registry.ndl_mut(slot);
        ndl.retry_count += 1;
        if ndl.retry_count < limit {
            debug!(peer = %ndl.peer, retry = ndl.retry_count, %subtype, "retransmitting");
            self.transmit(frame);
            let after = self.config.schedule_timeout;
            self.restart_timer(slot, retry_timer, after);
            return;
        }

        warn!(peer = %ndl.peer, %subtype, "retry limit reached");
        ndl.retry_count = 0;
        if subtype == ActionSubtype::ScheduleUpdateNotification {
            self.ndl_step(slot, NdlState::Teardown);
        } else {
            self.fall_back_to_established(slot);
        }
    }
}
