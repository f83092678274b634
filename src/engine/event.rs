//! Notifications delivered to the host through [`HostEvents`](crate::HostEvents).

use crate::core::{CipherSuite, FailReason, MacAddr, NdpeParams, ReasonCode, SetupStatus};
use crate::core::constants::SCID_LEN;
use crate::registry::InstanceId;

/// Upper-layer notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A peer asks to set up a data path; answer with
    /// [`Engine::data_response`](crate::Engine::data_response).
    DataIndication {
        /// Session id.
        instance_id: InstanceId,
        /// NDP-ID.
        ndp_id: u8,
        /// Publish id of the local service.
        publish_id: u8,
        /// Peer management address.
        peer: MacAddr,
        /// Peer data interface address.
        peer_ndi: MacAddr,
        /// Peer requires QoS.
        qos_required: bool,
        /// Peer requires security.
        security_required: bool,
        /// Cipher suite offered by the peer.
        cipher: CipherSuite,
        /// Security context identifier offered by the peer.
        scid: Option<[u8; SCID_LEN]>,
        /// Peer service specific info.
        app_info: Vec<u8>,
        /// Peer NDP extension fields, when NDPE is in use.
        ndpe: Option<NdpeParams>,
    },

    /// A data path finished setup.
    DataConfirm {
        /// Session id.
        instance_id: InstanceId,
        /// NDP-ID.
        ndp_id: u8,
        /// Final status.
        status: SetupStatus,
        /// Reason code.
        reason: ReasonCode,
        /// Peer data interface address.
        peer_ndi: MacAddr,
        /// Security in use.
        security: bool,
        /// Peer service specific info.
        app_info: Vec<u8>,
        /// Peer NDP extension fields, when NDPE is in use.
        ndpe: Option<NdpeParams>,
    },

    /// A data path went away.
    DataTermination {
        /// Session id.
        instance_id: InstanceId,
        /// NDP-ID.
        ndp_id: u8,
        /// Local failure cause, if any.
        reason: FailReason,
    },

    /// Outcome of sending our data path request.
    InitiatorResponse {
        /// Host transaction id of the request.
        trans_id: u16,
        /// Session id.
        instance_id: InstanceId,
        /// NDP-ID.
        ndp_id: u8,
        /// Request left the air.
        success: bool,
    },

    /// Outcome of sending our data path response.
    ResponderResponse {
        /// Host transaction id of the response.
        trans_id: u16,
        /// Session id.
        instance_id: InstanceId,
        /// NDP-ID.
        ndp_id: u8,
        /// Response left the air, whether it accepted or rejected.
        success: bool,
        /// Local failure cause, if any.
        reason: FailReason,
    },

    /// Completion of [`Engine::data_end`](crate::Engine::data_end).
    EndResponse {
        /// Host transaction id of the end command.
        trans_id: u16,
        /// Failure cause of the session, if any.
        reason: FailReason,
    },

    /// A fast-recovery link was evicted to make room.
    FastRecoveryDeleted {
        /// Peer of the evicted link.
        peer: MacAddr,
        /// Request id given with [`Engine::set_fast_recovery`](crate::Engine::set_fast_recovery).
        request_id: u8,
    },
}

impl HostEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::DataIndication { .. } => "data_indication",
            HostEvent::DataConfirm { .. } => "data_confirm",
            HostEvent::DataTermination { .. } => "data_termination",
            HostEvent::InitiatorResponse { .. } => "initiator_response",
            HostEvent::ResponderResponse { .. } => "responder_response",
            HostEvent::EndResponse { .. } => "end_response",
            HostEvent::FastRecoveryDeleted { .. } => "fast_recovery_deleted",
        }
    }
}
