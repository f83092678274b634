//! Recording platform and peer frame builders for engine tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::core::{
    CipherSuite, EngineConfig, MacAddr, NdpeParams, NegotiationStart, ProposalVerdict, QosParams,
    ReasonCode, Role, ScheduleAttributes, SecMessage, SetupStatus, TransportError,
};
use crate::core::{HostEvents, Scheduler, Security, TimerService, Transport};
use crate::frame::{
    ActionFrame, ActionSubtype, Attribute, DataPathAttribute, DeviceCapability, NdlAttribute,
    NdlType, NdpType,
};
use crate::frame::attribute::DEVCAP_NDPE_SUPPORTED;
use crate::registry::{InstanceId, NdlHandle};
use crate::timer::{TimerId, TimerKind};

use super::{Engine, HostEvent};

pub(crate) const LOCAL: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x10]);
pub(crate) const LOCAL_NDI: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x11]);
pub(crate) const PEER: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x20]);
pub(crate) const PEER_NDI: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x21]);

pub(crate) fn peer(n: u8) -> MacAddr {
    MacAddr([0x02, 0, 0, 0, 1, n])
}

/// One call into the security collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SecCall {
    Begin(InstanceId),
    Pmk(InstanceId),
    Cipher(InstanceId, CipherSuite),
    BodyReady(InstanceId, SecMessage),
    TxDone(InstanceId, SecMessage),
    Received(InstanceId, SecMessage),
    Terminate(InstanceId),
}

/// Platform that records every call and answers from configurable values.
#[derive(Debug)]
pub(crate) struct MockPlatform {
    pub grant: NegotiationStart,
    /// Verdicts handed out in order, then `default_verdict`.
    pub verdicts: VecDeque<ProposalVerdict>,
    pub default_verdict: ProposalVerdict,
    pub proposal: Result<(), ReasonCode>,
    pub peer_schedule: Result<(), ReasonCode>,
    pub refuse_send: bool,

    pub sent: Vec<Vec<u8>>,
    pub events: Vec<HostEvent>,
    pub timers: HashMap<TimerId, Duration>,
    pub security: Vec<SecCall>,
    pub permit_requests: Vec<(MacAddr, Role, NdlHandle)>,
    pub permit_returns: usize,
    pub committed: usize,
    pub dropped: Vec<MacAddr>,
    pub qos: Vec<QosParams>,
    pub schedules: Vec<ScheduleAttributes>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            grant: NegotiationStart::Granted,
            verdicts: VecDeque::new(),
            default_verdict: ProposalVerdict::Accept,
            proposal: Ok(()),
            peer_schedule: Ok(()),
            refuse_send: false,
            sent: Vec::new(),
            events: Vec::new(),
            timers: HashMap::new(),
            security: Vec::new(),
            permit_requests: Vec::new(),
            permit_returns: 0,
            committed: 0,
            dropped: Vec::new(),
            qos: Vec::new(),
            schedules: Vec::new(),
        }
    }
}

impl MockPlatform {
    /// Last transmitted frame, decoded.
    pub fn last_sent(&self) -> ActionFrame {
        let bytes = self.sent.last().expect("nothing sent");
        ActionFrame::decode(bytes).expect("engine sent an undecodable frame")
    }

    pub fn last_bytes(&self) -> Vec<u8> {
        self.sent.last().cloned().expect("nothing sent")
    }

    pub fn sent_subtypes(&self) -> Vec<ActionSubtype> {
        self.sent
            .iter()
            .map(|bytes| ActionFrame::peek_header(bytes).expect("header").2)
            .collect()
    }

    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }

    /// Armed timer matching `pred`.
    pub fn armed(&self, pred: impl Fn(&TimerKind) -> bool) -> Option<TimerId> {
        self.timers.keys().copied().find(|id| pred(&id.kind))
    }

    /// Permit requests not yet answered by a return.
    pub fn permits_outstanding(&self) -> usize {
        self.permit_requests.len().saturating_sub(self.permit_returns)
    }
}

impl Scheduler for MockPlatform {
    fn negotiation_start(&mut self, peer: MacAddr, role: Role, token: NdlHandle) -> NegotiationStart {
        self.permit_requests.push((peer, role, token));
        self.grant
    }

    fn negotiation_stop(&mut self) {
        self.permit_returns += 1;
    }

    fn gen_local_proposal(&mut self) -> Result<(), ReasonCode> {
        self.proposal
    }

    fn check_remote_proposal(&mut self) -> ProposalVerdict {
        self.verdicts.pop_front().unwrap_or(self.default_verdict)
    }

    fn update_negotiation_result(&mut self) {
        self.committed += 1;
    }

    fn drop_resources(&mut self, peer: MacAddr) {
        self.dropped.push(peer);
    }

    fn add_qos(&mut self, qos: QosParams) {
        self.qos.push(qos);
    }

    fn apply_peer_schedule(
        &mut self,
        _peer: MacAddr,
        schedule: &ScheduleAttributes,
    ) -> Result<(), ReasonCode> {
        self.schedules.push(schedule.clone());
        self.peer_schedule
    }

    fn local_schedule(&mut self, _peer: MacAddr) -> ScheduleAttributes {
        ScheduleAttributes {
            availability: vec![vec![0x01, 0x02]],
            ..ScheduleAttributes::default()
        }
    }
}

impl Security for MockPlatform {
    fn begin_handshake(&mut self, session: InstanceId) {
        self.security.push(SecCall::Begin(session));
    }

    fn set_pmk(&mut self, session: InstanceId, _pmk: &[u8]) {
        self.security.push(SecCall::Pmk(session));
    }

    fn set_cipher(&mut self, session: InstanceId, cipher: CipherSuite) {
        self.security.push(SecCall::Cipher(session, cipher));
    }

    fn message_body_ready(&mut self, session: InstanceId, message: SecMessage, _body: &[u8]) {
        self.security.push(SecCall::BodyReady(session, message));
    }

    fn tx_done(&mut self, session: InstanceId, message: SecMessage) {
        self.security.push(SecCall::TxDone(session, message));
    }

    fn message_received(&mut self, session: InstanceId, message: SecMessage, _body: &[u8]) {
        self.security.push(SecCall::Received(session, message));
    }

    fn terminate_handshake(&mut self, session: InstanceId) {
        self.security.push(SecCall::Terminate(session));
    }
}

impl HostEvents for MockPlatform {
    fn notify(&mut self, event: HostEvent) {
        self.events.push(event);
    }
}

impl Transport for MockPlatform {
    fn send_naf(&mut self, frame: &[u8], _retry_limit: u8) -> Result<(), TransportError> {
        if self.refuse_send {
            return Err(TransportError::QueueFull);
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }
}

impl TimerService for MockPlatform {
    fn start_timer(&mut self, timer: TimerId, after: Duration) {
        self.timers.insert(timer, after);
    }

    fn stop_timer(&mut self, timer: TimerId) {
        self.timers.remove(&timer);
    }
}

pub(crate) fn config() -> EngineConfig {
    EngineConfig {
        local_address: LOCAL,
        local_ndi: LOCAL_NDI,
        rng_seed: Some(7),
        ..EngineConfig::default()
    }
}

pub(crate) fn engine() -> Engine<MockPlatform> {
    Engine::new(config(), MockPlatform::default()).expect("valid config")
}

pub(crate) fn engine_with(config: EngineConfig) -> Engine<MockPlatform> {
    Engine::new(config, MockPlatform::default()).expect("valid config")
}

/// Data path attribute as the peer would send it.
pub(crate) fn dp(kind: NdpType, ndp_id: u8, status: SetupStatus) -> DataPathAttribute {
    DataPathAttribute {
        dialog_token: 1,
        kind,
        status,
        reason: ReasonCode::Reserved,
        initiator_ndi: PEER_NDI,
        ndp_id,
        confirm_required: false,
        security_present: false,
        publish_id: (kind == NdpType::Request).then_some(3),
        responder_ndi: (kind == NdpType::Response).then_some(PEER_NDI),
        app_info: Vec::new(),
        ndpe: NdpeParams::default(),
    }
}

pub(crate) fn ndl(kind: NdlType, dialog_token: u8, status: SetupStatus) -> NdlAttribute {
    NdlAttribute {
        dialog_token,
        kind,
        status,
        reason: ReasonCode::Reserved,
        control: 0,
    }
}

pub(crate) fn frame_from(src: MacAddr, subtype: ActionSubtype, attributes: Vec<Attribute>) -> Vec<u8> {
    ActionFrame {
        dest: LOCAL,
        src,
        subtype,
        attributes,
    }
    .encode()
}

fn peer_availability() -> Attribute {
    Attribute::Availability(vec![0x0A, 0x0B])
}

/// Peer data path request carrying a link proposal.
pub(crate) fn data_request_from(src: MacAddr, attr: DataPathAttribute) -> Vec<u8> {
    frame_from(
        src,
        ActionSubtype::DataPathRequest,
        vec![
            Attribute::Ndp(attr),
            Attribute::Ndl(ndl(NdlType::Request, 1, SetupStatus::Continued)),
            peer_availability(),
        ],
    )
}

pub(crate) fn data_request(ndp_id: u8) -> Vec<u8> {
    data_request_from(PEER, dp(NdpType::Request, ndp_id, SetupStatus::Continued))
}

/// Peer data request advertising NDPE support and carrying an NDPE attribute.
pub(crate) fn ndpe_data_request(ndp_id: u8, ndpe: NdpeParams) -> Vec<u8> {
    let attr = DataPathAttribute {
        ndpe,
        ..dp(NdpType::Request, ndp_id, SetupStatus::Continued)
    };
    frame_from(
        PEER,
        ActionSubtype::DataPathRequest,
        vec![
            Attribute::Ndpe(attr),
            Attribute::DeviceCapability(DeviceCapability {
                capabilities: DEVCAP_NDPE_SUPPORTED,
                ..DeviceCapability::default()
            }),
            Attribute::Ndl(ndl(NdlType::Request, 1, SetupStatus::Continued)),
            peer_availability(),
        ],
    )
}

/// Peer data path response to our session `ndp_id`.
pub(crate) fn data_response(ndp_id: u8, status: SetupStatus) -> Vec<u8> {
    data_response_with(dp(NdpType::Response, ndp_id, status))
}

pub(crate) fn data_response_with(attr: DataPathAttribute) -> Vec<u8> {
    let link_status = match attr.status {
        SetupStatus::Rejected => SetupStatus::Rejected,
        _ => SetupStatus::Accepted,
    };
    frame_from(
        PEER,
        ActionSubtype::DataPathResponse,
        vec![
            Attribute::Ndp(attr),
            Attribute::Ndl(ndl(NdlType::Response, 1, link_status)),
            peer_availability(),
        ],
    )
}

pub(crate) fn data_confirm(ndp_id: u8, status: SetupStatus) -> Vec<u8> {
    frame_from(
        PEER,
        ActionSubtype::DataPathConfirm,
        vec![
            Attribute::Ndp(dp(NdpType::Confirm, ndp_id, status)),
            Attribute::Ndl(ndl(NdlType::Confirm, 1, SetupStatus::Accepted)),
            peer_availability(),
        ],
    )
}

pub(crate) fn key_install(ndp_id: u8, status: SetupStatus) -> Vec<u8> {
    let attr = DataPathAttribute {
        security_present: true,
        ..dp(NdpType::SecurityInstall, ndp_id, status)
    };
    frame_from(PEER, ActionSubtype::DataPathKeyInstall, vec![Attribute::Ndp(attr)])
}

pub(crate) fn termination(ndp_id: u8) -> Vec<u8> {
    frame_from(
        PEER,
        ActionSubtype::DataPathTermination,
        vec![Attribute::Ndp(dp(NdpType::Terminate, ndp_id, SetupStatus::Accepted))],
    )
}

/// Peer schedule frame with one NDL attribute and its availability.
pub(crate) fn schedule_frame(
    subtype: ActionSubtype,
    dialog_token: u8,
    status: SetupStatus,
) -> Vec<u8> {
    let kind = match subtype {
        ActionSubtype::ScheduleResponse => NdlType::Response,
        ActionSubtype::ScheduleConfirm => NdlType::Confirm,
        _ => NdlType::Request,
    };
    frame_from(
        PEER,
        subtype,
        vec![Attribute::Ndl(ndl(kind, dialog_token, status)), peer_availability()],
    )
}
