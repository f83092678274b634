//! Interpretation of received frames into link and session state.
//!
//! Parsing records what the peer told us and reports whether the frame can be
//! acted on. A rejected status is recorded in `reject_pending` and surfaces
//! as an error, so callers take their reject path.

use crate::core::{ReasonCode, ScheduleAttributes, SetupStatus};
use crate::registry::Ndl;

use super::action::{ActionFrame, ActionSubtype};
use super::attribute::{Attribute, DataPathAttribute, NdlAttribute};

/// Identity attributes of a peer data path request, kept for a late reject.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct PeerRequest {
    pub ndp: Option<DataPathAttribute>,
    pub ndpe: Option<DataPathAttribute>,
    pub ndl: Option<NdlAttribute>,
}

impl PeerRequest {
    pub fn from_frame(frame: &ActionFrame) -> Self {
        Self {
            ndp: frame.ndp().cloned(),
            ndpe: frame.ndpe().cloned(),
            ndl: frame.ndl().copied(),
        }
    }
}

/// What a successfully parsed frame leaves for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Parsed {
    /// Status the peer put in the NDL attribute, when one was carried.
    pub ndl_status: Option<SetupStatus>,
    /// Peer schedule, for the scheduler.
    pub schedule: ScheduleAttributes,
}

/// Schedule attributes carried by `frame`.
pub(crate) fn peer_schedule(frame: &ActionFrame) -> ScheduleAttributes {
    let mut schedule = ScheduleAttributes::default();
    for attr in &frame.attributes {
        match attr {
            Attribute::Availability(body) => schedule.availability.push(body.clone()),
            Attribute::Ndc(body) => schedule.ndc = Some(body.clone()),
            Attribute::ElementContainer(body) => schedule.element_container = Some(body.clone()),
            Attribute::UnalignedSchedule(body) => schedule.unaligned = Some(body.clone()),
            _ => {}
        }
    }
    schedule
}

/// NDP and NDPE presence does not match what the link negotiated.
///
/// Both at once is always inconsistent. Otherwise NDPE is expected exactly
/// when it is enabled locally and advertised by the peer.
pub(crate) fn ndpe_mismatch(frame: &ActionFrame, use_ndpe: bool) -> bool {
    match (frame.ndp().is_some(), frame.ndpe().is_some()) {
        (true, true) => true,
        (_, has_ndpe) if use_ndpe => !has_ndpe,
        (has_ndp, _) => !has_ndp,
    }
}

/// Update session `ndp` of `ndl` from a data path frame.
pub(crate) fn parse_data_path(
    frame: &ActionFrame,
    ndl: &mut Ndl,
    ndp: usize,
) -> Result<Parsed, ReasonCode> {
    let dp = frame.data_path().ok_or(ReasonCode::InvalidParameters)?;
    ndl.reject_pending = false;
    ndl.ndps[ndp].reject_pending = false;

    if let Some(cap) = frame.device_capability() {
        ndl.ndps[ndp].peer_supports_ndpe = cap.supports_ndpe();
    }

    let session = &mut ndl.ndps[ndp];
    match frame.subtype {
        ActionSubtype::DataPathRequest => {
            session.peer_ndi = dp.initiator_ndi;
            session.dialog_token = dp.dialog_token;
            session.publish_id = dp.publish_id.unwrap_or(0);
            session.confirm_required = dp.confirm_required;
            session.security_required = dp.security_present;
            session.peer_app_info = dp.app_info.clone();
            session.peer_ndpe = dp.ndpe;
        }
        ActionSubtype::DataPathResponse => {
            if dp.status != SetupStatus::Rejected {
                let Some(ndi) = dp.responder_ndi else {
                    return Err(ReasonCode::InvalidParameters);
                };
                session.peer_ndi = ndi;
            }
            session.confirm_required |= dp.confirm_required;
            session.peer_app_info = dp.app_info.clone();
            session.peer_ndpe = dp.ndpe;
        }
        _ => {}
    }
    if let Some(protocol) = dp.ndpe.protocol {
        session.protocol = protocol;
    }

    if session.security_required {
        for attr in &frame.attributes {
            match attr {
                Attribute::CipherSuite(info) if session.cipher.is_none() => {
                    if let Some((suite, _)) = info.suites.first() {
                        session.cipher = *suite;
                    }
                }
                Attribute::SecurityContext(ctx) => session.scid = Some(ctx.scid),
                _ => {}
            }
        }
    }

    let checks_status = !matches!(
        frame.subtype,
        ActionSubtype::DataPathRequest | ActionSubtype::DataPathTermination
    );
    if checks_status && dp.status == SetupStatus::Rejected {
        session.reject_pending = true;
        session.reason = dp.reason;
        return Err(dp.reason);
    }

    let ndl_status = match frame.ndl() {
        Some(attr) if attr.status == SetupStatus::Rejected => {
            ndl.reject_pending = true;
            ndl.reason = attr.reason;
            return Err(attr.reason);
        }
        Some(attr) => Some(attr.status),
        None => None,
    };

    Ok(Parsed {
        ndl_status,
        schedule: peer_schedule(frame),
    })
}

/// Update `ndl` from a schedule frame.
pub(crate) fn parse_schedule(frame: &ActionFrame, ndl: &mut Ndl) -> Result<Parsed, ReasonCode> {
    let attr = frame.ndl();
    if attr.is_none() && frame.subtype != ActionSubtype::ScheduleUpdateNotification {
        return Err(ReasonCode::InvalidParameters);
    }
    ndl.reject_pending = false;

    for qos in frame.attributes.iter().filter_map(|a| match a {
        Attribute::NdlQos(qos) => Some(*qos),
        _ => None,
    }) {
        ndl.qos = qos;
    }

    if let Some(attr) = attr {
        match frame.subtype {
            ActionSubtype::ScheduleRequest => ndl.dialog_token = attr.dialog_token,
            ActionSubtype::ScheduleResponse => {
                ndl.is_counter = attr.status == SetupStatus::Continued;
                if attr.status == SetupStatus::Rejected {
                    ndl.reject_pending = true;
                    ndl.reason = attr.reason;
                    return Err(attr.reason);
                }
            }
            _ => {}
        }
    }

    Ok(Parsed {
        ndl_status: attr.map(|a| a.status),
        schedule: peer_schedule(frame),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MacAddr, NdpeParams, QosParams};
    use crate::frame::attribute::{DataPathAttribute, NdlAttribute, NdlType, NdpType};

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([0x02, 0, 0, 0, 0, n])
    }

    fn dp(kind: NdpType, status: SetupStatus) -> DataPathAttribute {
        DataPathAttribute {
            dialog_token: 5,
            kind,
            status,
            reason: ReasonCode::Reserved,
            initiator_ndi: mac(7),
            ndp_id: 9,
            confirm_required: true,
            security_present: false,
            publish_id: Some(2),
            responder_ndi: None,
            app_info: vec![0xCA, 0xFE],
            ndpe: NdpeParams::default(),
        }
    }

    fn frame(subtype: ActionSubtype, attributes: Vec<Attribute>) -> ActionFrame {
        ActionFrame {
            dest: mac(1),
            src: mac(2),
            subtype,
            attributes,
        }
    }

    fn link() -> Ndl {
        let mut ndl = Ndl::empty(0);
        ndl.valid = true;
        ndl.ndps[0].valid = true;
        ndl
    }

    #[test]
    fn test_request_fills_session() {
        let mut ndl = link();
        let f = frame(
            ActionSubtype::DataPathRequest,
            vec![
                Attribute::Ndp(dp(NdpType::Request, SetupStatus::Continued)),
                Attribute::Availability(vec![1, 2]),
            ],
        );
        let parsed = parse_data_path(&f, &mut ndl, 0).expect("parse");

        let ndp = &ndl.ndps[0];
        assert_eq!(ndp.peer_ndi, mac(7));
        assert_eq!(ndp.publish_id, 2);
        assert!(ndp.confirm_required);
        assert_eq!(ndp.peer_app_info, vec![0xCA, 0xFE]);
        assert_eq!(parsed.schedule.availability, vec![vec![1, 2]]);
    }

    #[test]
    fn test_rejected_response_sets_reject_pending() {
        let mut ndl = link();
        let mut attr = dp(NdpType::Response, SetupStatus::Rejected);
        attr.reason = ReasonCode::NdpRejected;
        let f = frame(ActionSubtype::DataPathResponse, vec![Attribute::Ndp(attr)]);

        assert_eq!(parse_data_path(&f, &mut ndl, 0), Err(ReasonCode::NdpRejected));
        assert!(ndl.ndps[0].reject_pending);
    }

    #[test]
    fn test_rejected_link_in_data_path_response() {
        let mut ndl = link();
        let rejected = NdlAttribute {
            dialog_token: 1,
            kind: NdlType::Response,
            status: SetupStatus::Rejected,
            reason: ReasonCode::InvalidAvailability,
            control: 0,
        };
        let response = DataPathAttribute {
            responder_ndi: Some(mac(8)),
            ..dp(NdpType::Response, SetupStatus::Accepted)
        };
        let f = frame(
            ActionSubtype::DataPathResponse,
            vec![Attribute::Ndp(response.clone()), Attribute::Ndl(rejected)],
        );

        assert_eq!(
            parse_data_path(&f, &mut ndl, 0),
            Err(ReasonCode::InvalidAvailability)
        );
        assert!(ndl.reject_pending);
        assert!(!ndl.ndps[0].reject_pending);

        // cleared by the next frame that parses
        let f = frame(ActionSubtype::DataPathResponse, vec![Attribute::Ndp(response)]);
        assert!(parse_data_path(&f, &mut ndl, 0).is_ok());
        assert!(!ndl.reject_pending);
    }

    #[test]
    fn test_response_without_responder_ndi_is_invalid() {
        let mut ndl = link();
        let f = frame(
            ActionSubtype::DataPathResponse,
            vec![Attribute::Ndp(dp(NdpType::Response, SetupStatus::Accepted))],
        );
        assert_eq!(
            parse_data_path(&f, &mut ndl, 0),
            Err(ReasonCode::InvalidParameters)
        );
    }

    #[test]
    fn test_ndpe_mismatch_rules() {
        let ndp = Attribute::Ndp(dp(NdpType::Request, SetupStatus::Continued));
        let ndpe = Attribute::Ndpe(dp(NdpType::Request, SetupStatus::Continued));

        let only_ndp = frame(ActionSubtype::DataPathRequest, vec![ndp.clone()]);
        let only_ndpe = frame(ActionSubtype::DataPathRequest, vec![ndpe.clone()]);
        let both = frame(ActionSubtype::DataPathRequest, vec![ndp, ndpe]);

        assert!(!ndpe_mismatch(&only_ndp, false));
        assert!(ndpe_mismatch(&only_ndp, true));
        assert!(!ndpe_mismatch(&only_ndpe, true));
        assert!(ndpe_mismatch(&only_ndpe, false));
        assert!(ndpe_mismatch(&both, true));
        assert!(ndpe_mismatch(&both, false));
    }

    #[test]
    fn test_schedule_response_counter() {
        let mut ndl = link();
        let f = frame(
            ActionSubtype::ScheduleResponse,
            vec![
                Attribute::Ndl(NdlAttribute {
                    dialog_token: 1,
                    kind: NdlType::Response,
                    status: SetupStatus::Continued,
                    reason: ReasonCode::Reserved,
                    control: 0,
                }),
                Attribute::NdlQos(QosParams {
                    min_slots: Some(3),
                    max_latency: None,
                }),
            ],
        );
        let parsed = parse_schedule(&f, &mut ndl).expect("parse");
        assert!(ndl.is_counter);
        assert_eq!(ndl.qos.min_slots, Some(3));
        assert_eq!(parsed.ndl_status, Some(SetupStatus::Continued));
    }

    #[test]
    fn test_schedule_request_needs_ndl_attribute() {
        let mut ndl = link();
        let f = frame(ActionSubtype::ScheduleRequest, vec![]);
        assert_eq!(parse_schedule(&f, &mut ndl), Err(ReasonCode::InvalidParameters));

        let notify = frame(ActionSubtype::ScheduleUpdateNotification, vec![]);
        assert!(parse_schedule(&notify, &mut ndl).is_ok());
    }
}
