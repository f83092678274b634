//! Frame composition from link and session state.

use crate::core::{MacAddr, ReasonCode, Role, ScheduleAttributes, SetupStatus};
use crate::registry::{Ndl, Ndp};

use super::action::{ActionFrame, ActionSubtype};
use super::attribute::{
    Attribute, DataPathAttribute, DeviceCapability, DEVCAP_NDPE_SUPPORTED, NdlAttribute, NdlType,
    NdpType,
};

/// Collects attributes and emits them in the fixed wire order.
#[derive(Debug)]
pub(crate) struct FrameBuilder {
    frame: ActionFrame,
}

impl FrameBuilder {
    pub fn new(subtype: ActionSubtype, src: MacAddr, dest: MacAddr) -> Self {
        Self {
            frame: ActionFrame::new(subtype, src, dest),
        }
    }

    pub fn push(&mut self, attr: Attribute) -> &mut Self {
        self.frame.attributes.push(attr);
        self
    }

    pub fn push_schedule(&mut self, schedule: ScheduleAttributes) -> &mut Self {
        for body in schedule.availability {
            self.push(Attribute::Availability(body));
        }
        if let Some(body) = schedule.ndc {
            self.push(Attribute::Ndc(body));
        }
        if let Some(body) = schedule.element_container {
            self.push(Attribute::ElementContainer(body));
        }
        if let Some(body) = schedule.unaligned {
            self.push(Attribute::UnalignedSchedule(body));
        }
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        // stable: repeated availability attributes keep their order
        self.frame.attributes.sort_by_key(Attribute::rank);
        self.frame.encode()
    }
}

/// Device capability advertised in requests and responses.
pub(crate) fn device_capability(ndpe_enabled: bool) -> DeviceCapability {
    DeviceCapability {
        capabilities: if ndpe_enabled { DEVCAP_NDPE_SUPPORTED } else { 0 },
        ..DeviceCapability::default()
    }
}

/// NDP/NDPE body describing session `ndp` in a frame of type `kind`.
pub(crate) fn data_path_attribute(ndp: &Ndp, kind: NdpType, with_app_info: bool) -> DataPathAttribute {
    let initiator_ndi = match ndp.role {
        Role::Initiator => ndp.local_ndi,
        Role::Responder => ndp.peer_ndi,
    };
    DataPathAttribute {
        dialog_token: ndp.dialog_token,
        kind,
        status: ndp.setup_status,
        reason: ndp.reason,
        initiator_ndi,
        ndp_id: ndp.ndp_id,
        confirm_required: ndp.confirm_required,
        security_present: ndp.security_required,
        publish_id: (kind == NdpType::Request).then_some(ndp.publish_id),
        responder_ndi: (kind == NdpType::Response).then_some(ndp.local_ndi),
        app_info: if with_app_info {
            ndp.app_info.clone()
        } else {
            Vec::new()
        },
        ndpe: ndp.local_ndpe,
    }
}

/// NDL body for link `ndl` in a frame of type `kind`.
pub(crate) fn ndl_attribute(ndl: &Ndl, kind: NdlType) -> NdlAttribute {
    NdlAttribute {
        dialog_token: ndl.dialog_token,
        kind,
        status: ndl.setup_status,
        reason: ndl.reason,
        control: 0,
    }
}

/// Rejecting response that echoes a peer request we hold no session for.
pub(crate) fn reject_data_path(peer: &DataPathAttribute, reason: ReasonCode) -> DataPathAttribute {
    DataPathAttribute {
        kind: NdpType::Response,
        status: SetupStatus::Rejected,
        reason,
        confirm_required: false,
        security_present: false,
        publish_id: None,
        responder_ndi: None,
        app_info: Vec::new(),
        ndpe: Default::default(),
        ..peer.clone()
    }
}

/// Rejecting NDL body echoing the peer's dialog token.
pub(crate) fn reject_ndl(peer: &NdlAttribute, reason: ReasonCode) -> NdlAttribute {
    NdlAttribute {
        dialog_token: peer.dialog_token,
        kind: NdlType::Response,
        status: SetupStatus::Rejected,
        reason,
        control: 0,
    }
}
