//! Outbound frames.
//!
//! Composition reads link and session state at send time. A data path frame
//! that has to be retransmitted goes out with its original bytes so the
//! security handshake sees the same message twice.

use tracing::{debug, warn};

use crate::core::{MacAddr, Platform, ReasonCode, Role, SecMessage, SetupStatus};
use crate::frame::compose::{
    FrameBuilder, data_path_attribute, device_capability, ndl_attribute, reject_data_path,
    reject_ndl,
};
use crate::frame::parse::PeerRequest;
use crate::frame::{
    ActionSubtype, Attribute, CATEGORY_OFFSET, CipherSuiteInfo, NdlAttribute, NdlType, NdpType,
    SecurityContext, SharedKey,
};
use crate::registry::NdpRef;

use super::Engine;

/// Handshake message carried by a data path frame of `subtype`.
fn sec_message(subtype: ActionSubtype) -> Option<SecMessage> {
    match subtype {
        ActionSubtype::DataPathRequest => Some(SecMessage::M1),
        ActionSubtype::DataPathResponse => Some(SecMessage::M2),
        ActionSubtype::DataPathConfirm => Some(SecMessage::M3),
        ActionSubtype::DataPathKeyInstall => Some(SecMessage::M4),
        _ => None,
    }
}

impl<P: Platform> Engine<P> {
    /// Hand `frame` to the transport.
    ///
    /// A refused frame is only logged; the retry timer armed by the sending
    /// state recovers it.
    pub(crate) fn transmit(&mut self, frame: &[u8]) {
        let limit = self.config.naf_tx_retry_limit;
        match self.platform.send_naf(frame, limit) {
            Ok(()) => debug!(len = frame.len(), "action frame queued"),
            Err(err) => warn!(%err, "action frame not queued"),
        }
    }

    /// Send the data path frame `subtype` for session `at`.
    pub(crate) fn send_data_path_frame(&mut self, at: NdpRef, subtype: ActionSubtype) {
        let ndp = self.registry.ndp_mut(at);
        ndp.tx_status = ndp.setup_status;
        let bytes = match ndp.retry_frame.take() {
            Some(bytes) => bytes,
            None => {
                let bytes = self.compose_data_path(at, subtype);
                let ndp = self.registry.ndp(at);
                if let Some(message) = sec_message(subtype).filter(|_| ndp.security_required) {
                    let session = ndp.instance_id;
                    self.platform
                        .message_body_ready(session, message, &bytes[CATEGORY_OFFSET..]);
                }
                bytes
            }
        };
        self.transmit(&bytes);
    }

    fn compose_data_path(&mut self, at: NdpRef, subtype: ActionSubtype) -> Vec<u8> {
        let use_ndpe = self.use_ndpe(at);
        let ndpe_enabled = self.config.ndpe_enabled;
        let src = self.config.local_address;

        let ndl = self.registry.ndl(at.ndl);
        let ndp = &ndl.ndps[at.ndp];
        let (kind, ndl_kind) = match subtype {
            ActionSubtype::DataPathRequest => (NdpType::Request, Some(NdlType::Request)),
            ActionSubtype::DataPathResponse => (NdpType::Response, Some(NdlType::Response)),
            ActionSubtype::DataPathConfirm => (NdpType::Confirm, Some(NdlType::Confirm)),
            ActionSubtype::DataPathKeyInstall => (NdpType::SecurityInstall, None),
            _ => (NdpType::Terminate, None),
        };
        let extended = if subtype == ActionSubtype::DataPathRequest && ndp.role == Role::Initiator
        {
            ndpe_enabled
        } else {
            use_ndpe
        };
        let opening = matches!(
            subtype,
            ActionSubtype::DataPathRequest | ActionSubtype::DataPathResponse
        );

        let attr = data_path_attribute(ndp, kind, opening);
        let link = ndl_kind
            .filter(|_| !ndl.established)
            .map(|kind| ndl_attribute(ndl, kind));
        let qos = (subtype == ActionSubtype::DataPathRequest && ndl.qos.is_set()).then_some(ndl.qos);
        let peer = ndl.peer;
        let session = ndp.instance_id;
        let security = ndp.security_required;
        let cipher_info = (security && opening && ndp.setup_status != SetupStatus::Rejected).then(
            || CipherSuiteInfo {
                capabilities: 0,
                suites: vec![(ndp.cipher, ndp.publish_id)],
            },
        );
        let context = ndp.scid.filter(|_| cipher_info.is_some()).map(|scid| SecurityContext {
            publish_id: ndp.publish_id,
            scid,
        });
        let publish_id = ndp.publish_id;
        let rejected = ndp.setup_status == SetupStatus::Rejected;

        let mut builder = FrameBuilder::new(subtype, src, peer);
        builder.push(if extended {
            Attribute::Ndpe(attr)
        } else {
            Attribute::Ndp(attr)
        });
        if opening {
            builder.push(Attribute::DeviceCapability(device_capability(ndpe_enabled)));
        }
        if let Some(link) = link {
            builder.push(Attribute::Ndl(link));
            if let Some(qos) = qos {
                builder.push(Attribute::NdlQos(qos));
            }
            let schedule = self.platform.local_schedule(peer);
            builder.push_schedule(schedule);
        }
        if let Some(info) = cipher_info {
            builder.push(Attribute::CipherSuite(info));
        }
        if let Some(context) = context {
            builder.push(Attribute::SecurityContext(context));
        }
        let message = sec_message(subtype).filter(|_| security && !rejected);
        if let Some(message) = message {
            if let Some(descriptor) = self.platform.key_descriptor(session, message) {
                builder.push(Attribute::SharedKey(SharedKey {
                    publish_id,
                    descriptor,
                }));
            }
        }
        if let Some(vendor) = &self.config.vendor_attribute {
            builder.push(Attribute::Vendor(vendor.clone()));
        }
        builder.build()
    }

    /// Send the schedule frame `subtype` for link `slot`.
    pub(crate) fn send_schedule_frame(&mut self, slot: usize, subtype: ActionSubtype) {
        let src = self.config.local_address;
        let ndl = self.registry.ndl(slot);
        let peer = ndl.peer;
        let kind = match subtype {
            ActionSubtype::ScheduleRequest => Some(NdlType::Request),
            ActionSubtype::ScheduleResponse => Some(NdlType::Response),
            ActionSubtype::ScheduleConfirm => Some(NdlType::Confirm),
            _ => None,
        };
        let link = kind.map(|kind| ndl_attribute(ndl, kind));
        let qos = (subtype == ActionSubtype::ScheduleRequest && ndl.qos.is_set()).then_some(ndl.qos);

        let mut builder = FrameBuilder::new(subtype, src, peer);
        if let Some(link) = link {
            builder.push(Attribute::Ndl(link));
        }
        if let Some(qos) = qos {
            builder.push(Attribute::NdlQos(qos));
        }
        let schedule = self.platform.local_schedule(peer);
        builder.push_schedule(schedule);
        if let Some(vendor) = &self.config.vendor_attribute {
            builder.push(Attribute::Vendor(vendor.clone()));
        }
        let bytes = builder.build();
        self.transmit(&bytes);
    }

    /// Refuse a peer data path request we keep no session for.
    pub(crate) fn send_reject_response(
        &mut self,
        dest: MacAddr,
        request: &PeerRequest,
        reason: ReasonCode,
    ) {
        debug!(peer = %dest, ?reason, "rejecting data path request");
        let src = self.config.local_address;
        let mut builder = FrameBuilder::new(ActionSubtype::DataPathResponse, src, dest);
        if let Some(ndp) = &request.ndp {
            builder.push(Attribute::Ndp(reject_data_path(ndp, reason)));
        }
        if let Some(ndpe) = &request.ndpe {
            builder.push(Attribute::Ndpe(reject_data_path(ndpe, reason)));
        }
        if let Some(ndl) = &request.ndl {
            builder.push(Attribute::Ndl(reject_ndl(ndl, reason)));
        }
        if let Some(vendor) = &self.config.vendor_attribute {
            builder.push(Attribute::Vendor(vendor.clone()));
        }
        let bytes = builder.build();
        self.transmit(&bytes);
    }

    /// Refuse a peer schedule request.
    pub(crate) fn send_schedule_reject(
        &mut self,
        dest: MacAddr,
        request: &NdlAttribute,
        reason: ReasonCode,
    ) {
        debug!(peer = %dest, ?reason, "rejecting schedule request");
        let src = self.config.local_address;
        let mut builder = FrameBuilder::new(ActionSubtype::ScheduleResponse, src, dest);
        builder.push(Attribute::Ndl(reject_ndl(request, reason)));
        if let Some(vendor) = &self.config.vendor_attribute {
            builder.push(Attribute::Vendor(vendor.clone()));
        }
        let bytes = builder.build();
        self.transmit(&bytes);
    }
}
