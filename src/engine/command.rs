//! Host commands.

use tracing::{debug, info, warn};

use crate::core::{
    Decision, EngineError, EngineResult, MacAddr, NdpeParams, Platform, QosParams, ReasonCode,
    Role, SecurityParams, SetupStatus,
};
use crate::frame::ActionSubtype;
use crate::fsm::{NdlState, NdpState};
use crate::registry::{InstanceId, NdpRef, PendingRequest};
use crate::timer::TimerKind;

use super::{Engine, HostEvent};

/// Parameters of [`Engine::data_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    /// Peer management address.
    pub peer: MacAddr,
    /// Publish id of the peer service.
    pub publish_id: u8,
    /// Host transaction id echoed in the initiator response.
    pub trans_id: u16,
    /// QoS requirement; only honoured for the first session of a link.
    pub qos: Option<QosParams>,
    /// Security material; `None` for an open session.
    pub security: Option<SecurityParams>,
    /// Service specific info for the peer.
    pub app_info: Vec<u8>,
    /// NDP extension fields.
    pub ndpe: NdpeParams,
    /// Local data interface; the configured default when `None`.
    pub local_ndi: Option<MacAddr>,
}

impl DataRequest {
    /// Open request to `peer` with every optional part left out.
    pub fn new(peer: MacAddr, publish_id: u8) -> Self {
        Self {
            peer,
            publish_id,
            trans_id: 0,
            qos: None,
            security: None,
            app_info: Vec::new(),
            ndpe: NdpeParams::default(),
            local_ndi: None,
        }
    }
}

/// Result of a successful [`Engine::data_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRequestOutcome {
    /// Allocated NDP-ID.
    pub ndp_id: u8,
    /// Session id for later commands.
    pub instance_id: InstanceId,
    /// Local data interface of the session.
    pub local_ndi: MacAddr,
}

/// Parameters of [`Engine::data_response`].
///
/// The session is found by `peer` and `ndp_id`, then by `instance_id`, then
/// by `ndp_id` alone. With `ndp_id == 0` and no match, the decision is kept
/// for the next inbound request when auto handling is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataResponse {
    /// Peer management address or NDI, when known.
    pub peer: Option<MacAddr>,
    /// NDP-ID from the data indication.
    pub ndp_id: u8,
    /// Session id from the data indication.
    pub instance_id: Option<InstanceId>,
    /// Host transaction id echoed in the responder response.
    pub trans_id: u16,
    /// Accept or reject.
    pub decision: Decision,
    /// QoS requirement.
    pub qos: Option<QosParams>,
    /// Security material; must match what the peer asked for.
    pub security: Option<SecurityParams>,
    /// Service specific info for the peer.
    pub app_info: Vec<u8>,
    /// NDP extension fields.
    pub ndpe: NdpeParams,
    /// Local data interface; the configured default when `None`.
    pub local_ndi: Option<MacAddr>,
}

impl DataResponse {
    /// Answer session `instance_id` with `decision`.
    pub fn new(instance_id: InstanceId, decision: Decision) -> Self {
        Self {
            peer: None,
            ndp_id: instance_id.ndp_id(),
            instance_id: Some(instance_id),
            trans_id: 0,
            decision,
            qos: None,
            security: None,
            app_info: Vec::new(),
            ndpe: NdpeParams::default(),
            local_ndi: None,
        }
    }
}

/// Parameters of [`Engine::data_end`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataEnd {
    /// NDP-ID of the session.
    pub ndp_id: u8,
    /// Session id, preferred over `ndp_id` when present.
    pub instance_id: Option<InstanceId>,
    /// Host transaction id echoed in the end response.
    pub trans_id: u16,
}

/// Decision stored for the next inbound data request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AutoReply {
    pub decision: Decision,
    pub trans_id: u16,
    pub qos: Option<QosParams>,
    pub security: Option<SecurityParams>,
    pub app_info: Vec<u8>,
    pub ndpe: NdpeParams,
    pub local_ndi: Option<MacAddr>,
}

impl From<DataResponse> for AutoReply {
    fn from(response: DataResponse) -> Self {
        Self {
            decision: response.decision,
            trans_id: response.trans_id,
            qos: response.qos,
            security: response.security,
            app_info: response.app_info,
            ndpe: response.ndpe,
            local_ndi: response.local_ndi,
        }
    }
}

impl<P: Platform> Engine<P> {
    /// Start a data path to `request.peer` as initiator.
    ///
    /// Fails with [`EngineError::Busy`] while another session of the same
    /// link is being set up. When the link is renegotiating its schedule
    /// the request is queued and started once the link settles.
    pub fn data_request(&mut self, request: DataRequest) -> EngineResult<DataRequestOutcome> {
        self.ensure_running()?;
        let peer = request.peer;
        if peer.is_zero() || peer.is_broadcast() {
            return Err(EngineError::InvalidParams("peer"));
        }
        if request.security.as_ref().is_some_and(|s| s.cipher.is_none()) {
            return Err(EngineError::InvalidParams("cipher"));
        }

        let existing = self.registry.find_ndl_by_mac(peer);
        if let Some(slot) = existing {
            if self.registry.ndl(slot).operating.is_some() {
                debug!(peer = %peer, "data path setup already in progress");
                return Err(EngineError::Busy);
            }
        }
        let slot = match existing {
            Some(slot) => slot,
            None => self
                .allocate_ndl(peer, Role::Initiator)
                .ok_or(EngineError::Resources)?,
        };

        let security_required = request.security.is_some();
        let Some(at) = self.registry.allocate_ndp(
            slot,
            Role::Initiator,
            MacAddr::ZERO,
            0,
            security_required,
        ) else {
            if existing.is_none() {
                self.free_ndl(slot);
            }
            return Err(EngineError::Resources);
        };

        let local_ndi = request.local_ndi.unwrap_or(self.config.local_ndi);
        let ndl = self.registry.ndl_mut(slot);
        let qos_required = request.qos.is_some() && ndl.ndp_count <= 1;
        if let (true, Some(qos)) = (qos_required, request.qos) {
            ndl.qos = qos;
        }

        let ndp = &mut ndl.ndps[at.ndp];
        ndp.publish_id = request.publish_id;
        ndp.trans_id = request.trans_id;
        ndp.local_ndi = local_ndi;
        ndp.app_info = request.app_info;
        ndp.local_ndpe = request.ndpe;
        ndp.qos_required = qos_required;
        if let Some(security) = &request.security {
            ndp.cipher = security.cipher;
            ndp.scid = security.scid;
            ndp.pmk = Some(security.pmk);
        }
        let outcome = DataRequestOutcome {
            ndp_id: ndp.ndp_id,
            instance_id: ndp.instance_id,
            local_ndi,
        };

        if let Some(security) = &request.security {
            let session = outcome.instance_id;
            self.platform.set_pmk(session, &security.pmk);
            self.platform.set_cipher(session, security.cipher);
            self.platform.begin_handshake(session);
        }
        info!(peer = %peer, ndp_id = outcome.ndp_id, instance_id = %outcome.instance_id, "data request");

        self.start_or_queue(at, Role::Initiator);
        Ok(outcome)
    }

    /// Start setup of session `at` now, or queue it behind the link's
    /// current transaction.
    fn start_or_queue(&mut self, at: NdpRef, role: Role) {
        let ndl = self.registry.ndl_mut(at.ndl);
        if ndl.is_settled() {
            ndl.role = role;
            ndl.operating = Some(at.ndp);
            self.ndl_step(at.ndl, NdlState::RequestScheduleNdp);
        } else {
            debug!(peer = %ndl.peer, state = %ndl.state, "link busy, queueing data path setup");
            ndl.pending.push(PendingRequest::ndp_setup(role, at.ndp));
        }
    }

    fn find_session(
        &self,
        peer: Option<MacAddr>,
        ndp_id: u8,
        instance_id: Option<InstanceId>,
    ) -> Option<NdpRef> {
        let by_peer = peer
            .filter(|mac| !mac.is_zero() && !mac.is_broadcast() && ndp_id != 0)
            .and_then(|mac| self.registry.find_ndl_by_mac(mac))
            .and_then(|slot| self.registry.find_ndp_by_id(slot, ndp_id));
        by_peer
            .or_else(|| instance_id.and_then(|id| self.registry.find_ndp_by_instance_id(id)))
            .or_else(|| {
                (ndp_id != 0)
                    .then(|| self.registry.find_ndp_by_id_only(ndp_id))
                    .flatten()
            })
    }

    /// Answer a data indication.
    ///
    /// Security material that does not match the peer request turns an
    /// accept into a reject.
    pub fn data_response(&mut self, response: DataResponse) -> EngineResult<()> {
        self.ensure_running()?;
        let Some(at) = self.find_session(response.peer, response.ndp_id, response.instance_id)
        else {
            if response.ndp_id == 0
                && response.instance_id.is_none()
                && self.config.auto_handle_data_request
            {
                info!(decision = ?response.decision, "storing decision for the next data request");
                self.auto_reply = Some(AutoReply::from(response));
                return Ok(());
            }
            warn!(ndp_id = response.ndp_id, "data response for unknown session");
            return Err(EngineError::NotFound);
        };

        let ndp = self.registry.ndp_mut(at);
        if ndp.state != NdpState::ResponderWaitDataRsp {
            return Err(EngineError::UnexpectedState);
        }
        ndp.trans_id = response.trans_id;

        let mismatch = match (&response.security, ndp.security_required) {
            (Some(security), true) => security.cipher != ndp.cipher,
            (None, true) | (Some(_), false) => true,
            (None, false) => false,
        };
        let decision = if mismatch {
            warn!(ndp_id = ndp.ndp_id, "security does not match the peer request, rejecting");
            ndp.security_required = false;
            Decision::Reject
        } else {
            response.decision
        };

        match decision {
            Decision::Accept => {
                self.accept_session(
                    at,
                    response.qos,
                    response.security,
                    response.app_info,
                    response.ndpe,
                    response.local_ndi,
                );
                self.stop_user_response_timer(at);
                self.start_or_queue(at, Role::Responder);
            }
            Decision::Reject => self.reject_session(at),
        }
        Ok(())
    }

    /// Record an accept decision on responder session `at`.
    pub(crate) fn accept_session(
        &mut self,
        at: NdpRef,
        qos: Option<QosParams>,
        security: Option<SecurityParams>,
        app_info: Vec<u8>,
        ndpe: NdpeParams,
        local_ndi: Option<MacAddr>,
    ) {
        let ndl = self.registry.ndl_mut(at.ndl);
        if let Some(qos) = qos {
            ndl.qos = qos;
        }
        let ndp = &mut ndl.ndps[at.ndp];
        ndp.qos_required = qos.is_some();
        if let Some(ndi) = local_ndi {
            ndp.local_ndi = ndi;
        }
        ndp.app_info = app_info;
        ndp.local_ndpe = ndpe;
        ndp.setup_status = if ndp.confirm_required || ndp.security_required {
            SetupStatus::Continued
        } else {
            SetupStatus::Accepted
        };

        if let Some(security) = security.filter(|_| ndp.security_required) {
            ndp.pmk = Some(security.pmk);
            if security.scid.is_some() {
                ndp.scid = security.scid;
            }
            let session = ndp.instance_id;
            self.platform.set_pmk(session, &security.pmk);
            self.platform.set_cipher(session, security.cipher);
            self.platform.begin_handshake(session);
        }
    }

    /// Refuse responder session `at` and tear it down.
    pub(crate) fn reject_session(&mut self, at: NdpRef) {
        self.stop_user_response_timer(at);
        let peer = self.registry.ndl(at.ndl).peer;
        let ndp = self.registry.ndp_mut(at);
        ndp.setup_status = SetupStatus::Rejected;
        ndp.reason = ReasonCode::NdpRejected;
        let request = ndp.peer_request.take().unwrap_or_default();
        info!(peer = %peer, ndp_id = ndp.ndp_id, "data path rejected by host");

        self.send_reject_response(peer, &request, ReasonCode::NdpRejected);
        self.responder_response(at, false);
        self.ndp_step(at, NdpState::Disconnect);
    }

    /// End a data path.
    ///
    /// A session in normal traffic sends a termination first and the end
    /// response follows its transmit completion. Any other session is
    /// released at once.
    pub fn data_end(&mut self, end: DataEnd) -> EngineResult<()> {
        self.ensure_running()?;
        let Some(at) = self.find_session(None, end.ndp_id, end.instance_id) else {
            debug!(ndp_id = end.ndp_id, "data end for unknown session");
            self.emit(HostEvent::EndResponse {
                trans_id: end.trans_id,
                reason: Default::default(),
            });
            return Ok(());
        };

        let ndp = self.registry.ndp_mut(at);
        ndp.trans_id = end.trans_id;
        info!(ndp_id = ndp.ndp_id, state = %ndp.state, "data end");
        if ndp.state == NdpState::NormalTr {
            self.ndp_step(at, NdpState::TxDpTermination);
        } else {
            let reason = ndp.fail_reason;
            self.ndp_step(at, NdpState::Disconnect);
            self.emit(HostEvent::EndResponse {
                trans_id: end.trans_id,
                reason,
            });
        }
        Ok(())
    }

    /// Renegotiate the schedule of the established link with `peer`.
    pub fn update_schedule(&mut self, peer: MacAddr, qos: Option<QosParams>) -> EngineResult<()> {
        self.ensure_running()?;
        let slot = self
            .registry
            .find_ndl_by_mac(peer)
            .ok_or(EngineError::NotFound)?;
        let ndl = self.registry.ndl_mut(slot);
        if !ndl.established {
            return Err(EngineError::UnexpectedState);
        }
        if let Some(qos) = qos.filter(QosParams::is_set) {
            ndl.qos = qos;
        }

        if ndl.is_settled() {
            ndl.role = Role::Initiator;
            let peer = ndl.peer;
            self.platform.prepare_negotiation(peer);
            self.ndl_step(slot, NdlState::RequestScheduleNdl);
        } else {
            debug!(peer = %ndl.peer, state = %ndl.state, "link busy, queueing schedule update");
            ndl.pending.push(PendingRequest::ndl_setup(Role::Initiator));
        }
        Ok(())
    }

    /// Announce a local schedule change to the peer of an established link.
    pub fn send_schedule_update(&mut self, peer: MacAddr) -> EngineResult<()> {
        self.ensure_running()?;
        let slot = self
            .registry
            .find_ndl_by_mac(peer)
            .ok_or(EngineError::NotFound)?;
        let ndl = self.registry.ndl_mut(slot);
        if !ndl.established {
            return Err(EngineError::UnexpectedState);
        }
        ndl.retry_count = 0;
        self.send_schedule_frame(slot, ActionSubtype::ScheduleUpdateNotification);
        let after = self.config.schedule_timeout;
        self.restart_timer(slot, TimerKind::ReschRetry(Role::Initiator), after);
        Ok(())
    }
}
