//! Inbound action frames.
//!
//! Every handler first tolerates the transmit race: a reply can arrive
//! before the transmit completion of the frame it answers. The handler then
//! plays the missing completion forward and processes the reply as usual.

use tracing::{debug, info, warn};

use crate::core::{
    Decision, EngineError, EngineResult, FrameError, Platform, ProposalVerdict, ReasonCode, Role,
    ScheduleAttributes, SecMessage, SetupStatus,
};
use crate::frame::parse::{PeerRequest, ndpe_mismatch, parse_data_path, parse_schedule};
use crate::frame::{ActionFrame, ActionSubtype, CATEGORY_OFFSET};
use crate::fsm::{NdlState, NdpState};
use crate::registry::{NdpRef, PendingRequest};
use crate::timer::TimerKind;

use super::Engine;

impl<P: Platform> Engine<P> {
    /// Feed one received action frame.
    ///
    /// Frames that do not fit the current state are dropped and reported as
    /// [`EngineError::Ignored`] without touching any state.
    pub fn receive(&mut self, bytes: &[u8]) -> EngineResult<()> {
        self.ensure_running()?;
        let frame = ActionFrame::decode(bytes)?;
        debug!(peer = %frame.src, subtype = %frame.subtype, "action frame received");
        let body = bytes.get(CATEGORY_OFFSET..).unwrap_or_default();

        match frame.subtype {
            ActionSubtype::DataPathRequest => self.process_data_request(&frame, body),
            ActionSubtype::DataPathResponse => self.process_data_response(&frame, body),
            ActionSubtype::DataPathConfirm => self.process_data_confirm(&frame, body),
            ActionSubtype::DataPathKeyInstall => self.process_key_install(&frame, body),
            ActionSubtype::DataPathTermination => self.process_termination(&frame),
            ActionSubtype::ScheduleRequest => self.process_schedule_request(&frame),
            ActionSubtype::ScheduleResponse => self.process_schedule_response(&frame),
            ActionSubtype::ScheduleConfirm => self.process_schedule_confirm(&frame),
            ActionSubtype::ScheduleUpdateNotification => {
                self.process_update_notification(&frame)
            }
        }
    }

    /// Session a data path frame from the peer refers to.
    fn data_path_session(&self, frame: &ActionFrame) -> EngineResult<NdpRef> {
        let ndp_id = frame
            .data_path()
            .ok_or(FrameError::MissingAttribute("NDP"))?
            .ndp_id;
        let slot = self
            .registry
            .find_ndl_by_mac(frame.src)
            .ok_or(EngineError::NotFound)?;
        self.registry
            .find_ndp_by_id(slot, ndp_id)
            .ok_or(EngineError::NotFound)
    }

    fn security_received(&mut self, at: NdpRef, message: SecMessage, body: &[u8]) {
        let ndp = self.registry.ndp(at);
        if ndp.security_required {
            let session = ndp.instance_id;
            self.platform.message_received(session, message, body);
        }
    }

    /// Judge the peer schedule carried in a setup frame.
    fn judge_peer_schedule(
        &mut self,
        at: NdpRef,
        schedule: &ScheduleAttributes,
    ) -> ProposalVerdict {
        let ndl = self.registry.ndl(at.ndl);
        if ndl.established {
            return ProposalVerdict::Accept;
        }
        let peer = ndl.peer;
        match self.platform.apply_peer_schedule(peer, schedule) {
            Ok(()) => self.platform.check_remote_proposal(),
            Err(reason) => ProposalVerdict::Reject(reason),
        }
    }

    /// Inbound data path request: create the responder session and ask the
    /// host, or answer right away with a stored decision.
    pub(crate) fn process_data_request(
        &mut self,
        frame: &ActionFrame,
        body: &[u8],
    ) -> EngineResult<()> {
        let peer = frame.src;
        let Some(dp) = frame.data_path() else {
            return Err(FrameError::MissingAttribute("NDP").into());
        };
        let (ndp_id, initiator_ndi, security) = (dp.ndp_id, dp.initiator_ndi, dp.security_present);
        let request = PeerRequest::from_frame(frame);

        let mut existing = self.registry.find_ndl_by_mac(peer);
        if let Some(slot) = existing {
            let ndl = self.registry.ndl(slot);
            let ours = ndl.operating.map(|op| NdpRef::new(slot, op));
            let crossed = ours.filter(|&ours| {
                ndl.role == Role::Initiator && ndp_id > self.registry.ndp(ours).ndp_id
            });
            if let Some(ours) = crossed {
                warn!(
                    peer = %peer,
                    ours = self.registry.ndp(ours).ndp_id,
                    theirs = ndp_id,
                    "crossed data path requests, yielding to the peer"
                );
                if self.registry.ndp(ours).state == NdpState::InitiatorTxDpRequest {
                    self.initiator_response(ours, false);
                }
                self.ndl_step(slot, NdlState::Teardown);
                existing = None;
            }
        }

        let (slot, at, allocated) = match existing {
            Some(slot) => {
                let ndl = self.registry.ndl(slot);
                let operating = ndl.operating;
                let same_id = operating.is_some_and(|op| ndl.ndps[op].ndp_id == ndp_id);
                let at = match operating {
                    None => self.registry.find_ndp_by_id(slot, ndp_id).or_else(|| {
                        self.registry
                            .allocate_ndp(slot, Role::Responder, initiator_ndi, ndp_id, security)
                    }),
                    Some(op) if same_id => Some(NdpRef::new(slot, op)),
                    Some(_) => None,
                };
                (Some(slot), at, false)
            }
            None => match self.allocate_ndl(peer, Role::Responder) {
                Some(slot) => {
                    let at = self.registry.allocate_ndp(
                        slot,
                        Role::Responder,
                        initiator_ndi,
                        ndp_id,
                        security,
                    );
                    (Some(slot), at, true)
                }
                None => (None, None, false),
            },
        };

        let Some(at) = at else {
            let reason = match slot {
                Some(slot) if self.registry.find_ndp_by_id(slot, ndp_id).is_some() => {
                    ReasonCode::InvalidParameters
                }
                _ => ReasonCode::ResourceLimitation,
            };
            if let (true, Some(slot)) = (allocated, slot) {
                self.free_ndl(slot);
            }
            warn!(peer = %peer, ndp_id, ?reason, "refusing data path request");
            self.send_reject_response(peer, &request, reason);
            return Err(match reason {
                ReasonCode::InvalidParameters => EngineError::InvalidParams("NDP-ID in use"),
                _ => EngineError::Resources,
            });
        };

        if self.registry.ndp(at).state != NdpState::Idle {
            return Err(EngineError::Ignored("data path request for a session in progress"));
        }

        let local_ndi = self.config.local_ndi;
        let ndl = self.registry.ndl_mut(at.ndl);
        let ndp = &mut ndl.ndps[at.ndp];
        ndp.retry_count = 0;
        ndp.local_ndi = local_ndi;
        ndp.peer_request = Some(request.clone());

        match parse_data_path(frame, ndl, at.ndp) {
            Ok(parsed) => {
                self.security_received(at, SecMessage::M1, body);
                if ndpe_mismatch(frame, self.use_ndpe(at)) {
                    warn!(peer = %peer, ndp_id, "NDP/NDPE attributes inconsistent with capability");
                    self.send_reject_response(peer, &request, ReasonCode::InvalidParameters);
                    if allocated {
                        self.free_ndl(at.ndl);
                    } else {
                        self.free_ndp(at);
                    }
                    return Err(FrameError::Contradictory("NDP and NDPE").into());
                }
                if let Err(reason) = self.platform.apply_peer_schedule(peer, &parsed.schedule) {
                    warn!(peer = %peer, ?reason, "peer schedule refused");
                    self.registry.ndp_mut(at).reason = reason;
                    self.send_reject_response(peer, &request, reason);
                    self.ndp_step(at, NdpState::Disconnect);
                    return Ok(());
                }
                if !self.auto_reply_data_request(at) {
                    self.ndp_step(at, NdpState::ResponderWaitDataRsp);
                }
            }
            Err(reason) => {
                warn!(peer = %peer, ndp_id, ?reason, "invalid data path request");
                self.send_reject_response(peer, &request, ReasonCode::InvalidParameters);
                self.ndp_step(at, NdpState::Disconnect);
            }
        }
        Ok(())
    }

    /// Answer session `at` with the stored host decision, if there is one.
    fn auto_reply_data_request(&mut self, at: NdpRef) -> bool {
        let Some(reply) = self.auto_reply.take() else {
            return false;
        };
        let ndp = self.registry.ndp_mut(at);
        ndp.trans_id = reply.trans_id;
        info!(ndp_id = ndp.ndp_id, decision = ?reply.decision, "answering with stored decision");

        let decision = if ndp.security_required && reply.security.is_none() {
            warn!(ndp_id = ndp.ndp_id, "stored decision carries no security material");
            ndp.security_required = false;
            Decision::Reject
        } else {
            reply.decision
        };

        match decision {
            Decision::Accept => {
                self.accept_session(
                    at,
                    reply.qos,
                    reply.security,
                    reply.app_info,
                    reply.ndpe,
                    reply.local_ndi,
                );
                let ndl = self.registry.ndl_mut(at.ndl);
                if ndl.is_settled() {
                    ndl.role = Role::Responder;
                    ndl.operating = Some(at.ndp);
                    self.ndl_step(at.ndl, NdlState::RequestScheduleNdp);
                } else {
                    ndl.pending.push(PendingRequest::ndp_setup(Role::Responder, at.ndp));
                }
            }
            Decision::Reject => self.reject_session(at),
        }
        true
    }

    pub(crate) fn process_data_response(
        &mut self,
        frame: &ActionFrame,
        body: &[u8],
    ) -> EngineResult<()> {
        let at = self.data_path_session(frame)?;

        if self.registry.ndp(at).state == NdpState::InitiatorTxDpRequest {
            debug!("data path response ahead of request completion");
            self.stop_timer(at.ndl, TimerKind::NdpRetry(at.ndp as u8));
            let ndp = self.registry.ndp_mut(at);
            ndp.retry_count = 0;
            ndp.retry_frame = None;
            if ndp.security_required {
                let session = ndp.instance_id;
                self.platform.tx_done(session, SecMessage::M1);
            }
            self.ndp_step(at, NdpState::InitiatorRxDpResponse);
            self.initiator_response(at, true);
        }
        if self.registry.ndp(at).state != NdpState::InitiatorRxDpResponse {
            return Err(EngineError::Ignored("data path response in unexpected state"));
        }
        self.stop_timer(at.ndl, TimerKind::ProtocolExpire);

        let parsed = parse_data_path(frame, self.registry.ndl_mut(at.ndl), at.ndp);
        let confirm = self.registry.ndp(at).confirm_required;
        let next = match parsed {
            Ok(parsed) => {
                self.security_received(at, SecMessage::M2, body);
                if ndpe_mismatch(frame, self.use_ndpe(at)) {
                    warn!("NDP/NDPE attributes inconsistent in data path response");
                    self.set_setup_status(at, SetupStatus::Rejected, SetupStatus::Rejected);
                    let next = if confirm {
                        NdpState::InitiatorTxDpConfirm
                    } else {
                        NdpState::TxDpTermination
                    };
                    self.ndp_step(at, next);
                    return Err(FrameError::Contradictory("NDP and NDPE").into());
                }

                match self.judge_peer_schedule(at, &parsed.schedule) {
                    ProposalVerdict::Accept => {
                        if self.registry.ndp(at).security_required {
                            self.set_setup_status(at, SetupStatus::Accepted, SetupStatus::Continued);
                            NdpState::InitiatorTxDpConfirm
                        } else {
                            self.set_setup_status(at, SetupStatus::Accepted, SetupStatus::Accepted);
                            if confirm {
                                NdpState::InitiatorTxDpConfirm
                            } else {
                                NdpState::NormalTr
                            }
                        }
                    }
                    ProposalVerdict::Counter => {
                        self.set_setup_status(at, SetupStatus::Continued, SetupStatus::Continued);
                        if confirm {
                            NdpState::InitiatorTxDpConfirm
                        } else {
                            NdpState::TxDpTermination
                        }
                    }
                    ProposalVerdict::Reject(reason) => {
                        self.set_setup_status(at, SetupStatus::Rejected, SetupStatus::Rejected);
                        self.registry.ndp_mut(at).reason = reason;
                        self.registry.ndl_mut(at.ndl).reason = reason;
                        if confirm {
                            NdpState::InitiatorTxDpConfirm
                        } else {
                            NdpState::TxDpTermination
                        }
                    }
                }
            }
            Err(reason) if self.peer_rejected(at) => {
                info!(?reason, "peer rejected the data path");
                self.registry.ndp_mut(at).setup_status = SetupStatus::Rejected;
                if confirm {
                    NdpState::InitiatorTxDpConfirm
                } else {
                    NdpState::TxDpTermination
                }
            }
            Err(reason) => {
                warn!(?reason, "invalid data path response");
                NdpState::Disconnect
            }
        };
        self.ndp_step(at, next);
        Ok(())
    }

    /// The last frame for session `at` rejected it in its NDP or NDL attribute.
    fn peer_rejected(&self, at: NdpRef) -> bool {
        let ndl = self.registry.ndl(at.ndl);
        ndl.reject_pending || ndl.ndps[at.ndp].reject_pending
    }

    fn set_setup_status(&mut self, at: NdpRef, ndl: SetupStatus, ndp: SetupStatus) {
        let link = self.registry.ndl_mut(at.ndl);
        link.setup_status = ndl;
        link.ndps[at.ndp].setup_status = ndp;
    }

    pub(crate) fn process_data_confirm(
        &mut self,
        frame: &ActionFrame,
        body: &[u8],
    ) -> EngineResult<()> {
        let at = self.data_path_session(frame)?;

        let ndp = self.registry.ndp_mut(at);
        if ndp.state == NdpState::ResponderTxDpResponse
            && ndp.setup_status == SetupStatus::Continued
        {
            debug!("data path confirm ahead of response completion");
            ndp.retry_count = 0;
            ndp.retry_frame = None;
            let (session, security) = (ndp.instance_id, ndp.security_required);
            self.stop_timer(at.ndl, TimerKind::NdpRetry(at.ndp as u8));
            if security {
                self.platform.tx_done(session, SecMessage::M2);
            }
            self.ndp_step(at, NdpState::ResponderRxDpConfirm);
            self.responder_response(at, true);
        }
        if self.registry.ndp(at).state != NdpState::ResponderRxDpConfirm {
            return Err(EngineError::Ignored("data path confirm in unexpected state"));
        }
        self.stop_timer(at.ndl, TimerKind::ProtocolExpire);

        let parsed = parse_data_path(frame, self.registry.ndl_mut(at.ndl), at.ndp);
        let security = self.registry.ndp(at).security_required;
        let next = match parsed {
            Ok(parsed) => {
                self.security_received(at, SecMessage::M3, body);
                if ndpe_mismatch(frame, self.use_ndpe(at)) {
                    warn!("NDP/NDPE attributes inconsistent in data path confirm");
                    self.ndp_step(at, NdpState::TxDpTermination);
                    return Err(FrameError::Contradictory("NDP and NDPE").into());
                }
                match self.judge_peer_schedule(at, &parsed.schedule) {
                    ProposalVerdict::Accept if security => {
                        self.set_setup_status(at, SetupStatus::Accepted, SetupStatus::Accepted);
                        NdpState::ResponderTxDpSecurityInstall
                    }
                    ProposalVerdict::Accept => {
                        self.set_setup_status(at, SetupStatus::Accepted, SetupStatus::Accepted);
                        NdpState::NormalTr
                    }
                    verdict => {
                        debug!(?verdict, "final peer schedule not acceptable");
                        self.registry.ndl_mut(at.ndl).setup_status = SetupStatus::Rejected;
                        NdpState::TxDpTermination
                    }
                }
            }
            Err(reason) if self.peer_rejected(at) => {
                info!(?reason, "peer rejected the data path in its confirm");
                if security {
                    self.registry.ndp_mut(at).setup_status = SetupStatus::Rejected;
                    NdpState::ResponderTxDpSecurityInstall
                } else {
                    NdpState::TxDpTermination
                }
            }
            Err(reason) => {
                warn!(?reason, "invalid data path confirm");
                NdpState::Disconnect
            }
        };
        self.ndp_step(at, next);
        Ok(())
    }

    pub(crate) fn process_key_install(
        &mut self,
        frame: &ActionFrame,
        body: &[u8],
    ) -> EngineResult<()> {
        let at = self.data_path_session(frame)?;

        let ndp = self.registry.ndp_mut(at);
        if ndp.state == NdpState::InitiatorTxDpConfirm && ndp.setup_status == SetupStatus::Continued
        {
            debug!("key installment ahead of confirm completion");
            ndp.retry_count = 0;
            ndp.retry_frame = None;
            let (session, security) = (ndp.instance_id, ndp.security_required);
            self.stop_timer(at.ndl, TimerKind::NdpRetry(at.ndp as u8));
            if security {
                self.platform.tx_done(session, SecMessage::M3);
            }
            self.ndp_step(at, NdpState::InitiatorRxDpSecurityInstall);
        }
        if self.registry.ndp(at).state != NdpState::InitiatorRxDpSecurityInstall {
            return Err(EngineError::Ignored("key installment in unexpected state"));
        }
        self.stop_timer(at.ndl, TimerKind::ProtocolExpire);

        let next = match parse_data_path(frame, self.registry.ndl_mut(at.ndl), at.ndp) {
            Ok(_) => {
                self.security_received(at, SecMessage::M4, body);
                if ndpe_mismatch(frame, self.use_ndpe(at)) {
                    warn!("NDP/NDPE attributes inconsistent in key installment");
                    NdpState::TxDpTermination
                } else {
                    self.registry.ndp_mut(at).setup_status = SetupStatus::Accepted;
                    NdpState::NormalTr
                }
            }
            Err(reason) if self.peer_rejected(at) => {
                info!(?reason, "peer rejected the data path in its key installment");
                NdpState::TxDpTermination
            }
            Err(reason) => {
                warn!(?reason, "invalid key installment");
                NdpState::Disconnect
            }
        };
        self.ndp_step(at, next);
        Ok(())
    }

    pub(crate) fn process_termination(&mut self, frame: &ActionFrame) -> EngineResult<()> {
        let at = self.data_path_session(frame)?;
        match parse_data_path(frame, self.registry.ndl_mut(at.ndl), at.ndp) {
            Ok(_) => {
                info!(peer = %frame.src, ndp_id = self.registry.ndp(at).ndp_id, "peer terminated data path");
                self.ndp_step(at, NdpState::Disconnect);
                Ok(())
            }
            Err(reason) => {
                warn!(?reason, "invalid data path termination");
                Err(EngineError::Ignored("invalid data path termination"))
            }
        }
    }

    pub(crate) fn process_schedule_request(&mut self, frame: &ActionFrame) -> EngineResult<()> {
        let peer = frame.src;
        let attr = *frame.ndl().ok_or(FrameError::MissingAttribute("NDL"))?;

        if let Some(slot) = self.registry.find_ndl_by_mac(peer) {
            if self.registry.ndl(slot).dialog_token == attr.dialog_token {
                return Err(EngineError::Ignored("duplicate schedule request"));
            }
            self.platform.prepare_negotiation(peer);

            match self.parse_peer_schedule(slot, frame) {
                Ok(()) => {
                    let ndl = self.registry.ndl_mut(slot);
                    if ndl.is_settled() {
                        ndl.role = Role::Responder;
                        self.ndl_step(slot, NdlState::RequestScheduleNdl);
                    } else {
                        debug!(peer = %peer, state = %ndl.state, "link busy, queueing schedule request");
                        ndl.pending.push(PendingRequest::ndl_setup(Role::Responder));
                    }
                }
                Err(reason) => {
                    warn!(peer = %peer, ?reason, "schedule request refused");
                    self.platform.peer_negotiation_complete(peer);
                    self.send_schedule_reject(peer, &attr, reason);
                }
            }
            return Ok(());
        }

        let Some(slot) = self.allocate_ndl(peer, Role::Responder) else {
            self.send_schedule_reject(peer, &attr, ReasonCode::ResourceLimitation);
            return Err(EngineError::Resources);
        };
        self.platform.prepare_negotiation(peer);
        match self.parse_peer_schedule(slot, frame) {
            Ok(()) => {
                self.ndl_step(slot, NdlState::RequestScheduleNdl);
                Ok(())
            }
            Err(reason) => {
                warn!(peer = %peer, ?reason, "schedule request refused");
                self.platform.peer_negotiation_complete(peer);
                self.send_schedule_reject(peer, &attr, reason);
                self.free_ndl(slot);
                Err(EngineError::InvalidParams("schedule request"))
            }
        }
    }

    /// Parse a schedule frame into link `slot` and hand its schedule to the
    /// scheduler.
    fn parse_peer_schedule(&mut self, slot: usize, frame: &ActionFrame) -> Result<(), ReasonCode> {
        let parsed = parse_schedule(frame, self.registry.ndl_mut(slot))?;
        if let Some(status) = parsed.ndl_status {
            if frame.subtype == ActionSubtype::ScheduleConfirm {
                self.registry.ndl_mut(slot).setup_status = status;
            }
        }
        let peer = self.registry.ndl(slot).peer;
        self.platform.apply_peer_schedule(peer, &parsed.schedule)
    }

    /// Keep the last agreed schedule after a failed renegotiation.
    pub(crate) fn fall_back_to_established(&mut self, slot: usize) {
        warn!(peer = %self.registry.ndl(slot).peer, "renegotiation failed, keeping last schedule");
        self.platform.update_negotiation_result();
        self.ndl_step(slot, NdlState::ScheduleEstablished);
    }

    pub(crate) fn process_schedule_response(&mut self, frame: &ActionFrame) -> EngineResult<()> {
        frame.ndl().ok_or(FrameError::MissingAttribute("NDL"))?;
        let slot = self
            .registry
            .find_ndl_by_mac(frame.src)
            .ok_or(EngineError::NotFound)?;

        if self.registry.ndl(slot).state == NdlState::InitiatorTxScheduleRequest {
            debug!("schedule response ahead of request completion");
            self.stop_timer(slot, TimerKind::ReschRetry(Role::Initiator));
            self.registry.ndl_mut(slot).retry_count = 0;
            self.ndl_step(slot, NdlState::InitiatorWaitforRxScheduleResponse);
        }
        if self.registry.ndl(slot).state != NdlState::InitiatorWaitforRxScheduleResponse {
            return Err(EngineError::Ignored("schedule response in unexpected state"));
        }

        match self.parse_peer_schedule(slot, frame) {
            Ok(()) => self.ndl_step(slot, NdlState::InitiatorRxScheduleResponse),
            Err(reason) => {
                debug!(?reason, "schedule response refused");
                self.fall_back_to_established(slot);
            }
        }
        Ok(())
    }

    pub(crate) fn process_schedule_confirm(&mut self, frame: &ActionFrame) -> EngineResult<()> {
        frame.ndl().ok_or(FrameError::MissingAttribute("NDL"))?;
        let slot = self
            .registry
            .find_ndl_by_mac(frame.src)
            .ok_or(EngineError::NotFound)?;

        let ndl = self.registry.ndl(slot);
        if ndl.state == NdlState::ResponderTxScheduleResponse
            && ndl.setup_status == SetupStatus::Continued
        {
            debug!("schedule confirm ahead of response completion");
            self.stop_timer(slot, TimerKind::ReschRetry(Role::Responder));
            self.registry.ndl_mut(slot).retry_count = 0;
            self.ndl_step(slot, NdlState::ResponderRxScheduleConfirm);
        }
        if self.registry.ndl(slot).state != NdlState::ResponderRxScheduleConfirm {
            return Err(EngineError::Ignored("schedule confirm in unexpected state"));
        }
        self.stop_timer(slot, TimerKind::ProtocolExpire);

        match self.parse_peer_schedule(slot, frame) {
            Ok(()) if self.registry.ndl(slot).setup_status == SetupStatus::Accepted => {
                self.ndl_step(slot, NdlState::ScheduleEstablished);
            }
            Ok(()) => {
                info!(peer = %frame.src, "peer rejected the schedule in its confirm");
                self.ndl_step(slot, NdlState::Teardown);
            }
            Err(reason) => {
                debug!(?reason, "schedule confirm refused");
                self.fall_back_to_established(slot);
            }
        }
        Ok(())
    }

    pub(crate) fn process_update_notification(
        &mut self,
        frame: &ActionFrame,
    ) -> EngineResult<()> {
        let peer = frame.src;
        let slot = self
            .registry
            .find_ndl_by_mac(peer)
            .ok_or(EngineError::NotFound)?;
        if self.registry.ndl(slot).state != NdlState::ScheduleEstablished {
            return Err(EngineError::Ignored("schedule update on a link not established"));
        }
        if let Err(reason) = self.parse_peer_schedule(slot, frame) {
            warn!(peer = %peer, ?reason, "peer schedule update refused");
        }
        Ok(())
    }
}
