//! Data path (NDP) entity.

use crate::core::constants::{PMK_LEN, PROTOCOL_TYPE_NONE, SCID_LEN};
use crate::core::{
    CipherSuite, FailReason, MacAddr, NdpeParams, ReasonCode, Role, SetupStatus,
};
use crate::frame::parse::PeerRequest;
use crate::fsm::NdpState;

use super::handle::InstanceId;

/// One data session nested in a data link.
#[derive(Debug, Clone)]
pub(crate) struct Ndp {
    pub valid: bool,
    pub generation: u32,
    pub ndp_id: u8,
    pub instance_id: InstanceId,
    pub role: Role,
    pub local_ndi: MacAddr,
    pub peer_ndi: MacAddr,

    pub state: NdpState,
    pub last_state: NdpState,
    pub setup_status: SetupStatus,
    pub reason: ReasonCode,
    pub fail_reason: FailReason,
    /// Status of the last frame we transmitted (reported in data confirm).
    pub tx_status: SetupStatus,

    pub dialog_token: u8,
    pub publish_id: u8,
    pub trans_id: u16,

    pub security_required: bool,
    pub cipher: CipherSuite,
    pub pmk: Option<[u8; PMK_LEN]>,
    pub scid: Option<[u8; SCID_LEN]>,
    pub qos_required: bool,
    pub confirm_required: bool,
    pub reject_pending: bool,
    pub peer_supports_ndpe: bool,
    pub established: bool,
    pub active: bool,

    pub app_info: Vec<u8>,
    pub peer_app_info: Vec<u8>,
    pub local_ndpe: NdpeParams,
    pub peer_ndpe: NdpeParams,
    pub protocol: u8,

    pub retry_count: u8,
    /// Exact bytes of the last transmitted frame, held for retransmission.
    pub retry_frame: Option<Vec<u8>>,
    pub context: Option<usize>,
    /// Peer request attributes, echoed when the host rejects it.
    pub peer_request: Option<PeerRequest>,
}

impl Ndp {
    pub fn empty() -> Self {
        Self {
            valid: false,
            generation: 0,
            ndp_id: 0,
            instance_id: InstanceId(0),
            role: Role::Initiator,
            local_ndi: MacAddr::ZERO,
            peer_ndi: MacAddr::ZERO,
            state: NdpState::Idle,
            last_state: NdpState::Idle,
            setup_status: SetupStatus::Continued,
            reason: ReasonCode::Reserved,
            fail_reason: FailReason::None,
            tx_status: SetupStatus::Continued,
            dialog_token: 0,
            publish_id: 0,
            trans_id: 0,
            security_required: false,
            cipher: CipherSuite::NONE,
            pmk: None,
            scid: None,
            qos_required: false,
            confirm_required: false,
            reject_pending: false,
            peer_supports_ndpe: false,
            established: false,
            active: false,
            app_info: Vec::new(),
            peer_app_info: Vec::new(),
            local_ndpe: NdpeParams::default(),
            peer_ndpe: NdpeParams::default(),
            protocol: PROTOCOL_TYPE_NONE,
            retry_count: 0,
            retry_frame: None,
            context: None,
            peer_request: None,
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

    pub fn snapshot(&self) -> NdpSnapshot {
        NdpSnapshot {
            ndp_id: self.ndp_id,
            instance_id: self.instance_id,
            role: self.role,
            state: self.state,
            local_ndi: self.local_ndi,
            peer_ndi: self.peer_ndi,
            setup_status: self.setup_status,
            reason: self.reason,
            fail_reason: self.fail_reason,
            security_required: self.security_required,
            confirm_required: self.confirm_required,
            retry_count: self.retry_count,
            active: self.active,
        }
    }
}

/// Read-only view of a data path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdpSnapshot {
    /// NDP-ID.
    pub ndp_id: u8,
    /// Host-facing instance id.
    pub instance_id: InstanceId,
    /// Role.
    pub role: Role,
    /// Protocol state.
    pub state: NdpState,
    /// Local data interface address.
    pub local_ndi: MacAddr,
    /// Peer data interface address.
    pub peer_ndi: MacAddr,
    /// Current setup status.
    pub setup_status: SetupStatus,
    /// Reason code.
    pub reason: ReasonCode,
    /// Local failure cause.
    pub fail_reason: FailReason,
    /// Security handshake required.
    pub security_required: bool,
    /// Confirm frame required.
    pub confirm_required: bool,
    /// Retransmissions of the current frame.
    pub retry_count: u8,
    /// Session carries traffic.
    pub active: bool,
}
