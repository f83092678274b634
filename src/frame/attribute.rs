//! NAN attributes carried by data path and schedule action frames.
//!
//! Every attribute is a TLV: `id: u8`, `len: u16` (little endian), body.
//! Bodies owned by other collaborators (availability, NDC, element container,
//! unaligned schedule, vendor) are kept as opaque bytes.

use crate::core::constants::{IPV6_IID_LEN, SCID_LEN};
use crate::core::{CipherSuite, FrameError, MacAddr, NdpeParams, QosParams, ReasonCode, SetupStatus};

// =============================================================================
// ATTRIBUTE IDS
// =============================================================================

/// NDP attribute.
pub const ATTR_NDP: u8 = 0x0E;
/// Device capability attribute.
pub const ATTR_DEVICE_CAPABILITY: u8 = 0x0F;
/// NDL attribute.
pub const ATTR_NDL: u8 = 0x10;
/// NDL QoS attribute.
pub const ATTR_NDL_QOS: u8 = 0x11;
/// NAN availability attribute.
pub const ATTR_AVAILABILITY: u8 = 0x12;
/// NDC attribute.
pub const ATTR_NDC: u8 = 0x13;
/// Element container attribute.
pub const ATTR_ELEMENT_CONTAINER: u8 = 0x14;
/// Unaligned schedule attribute.
pub const ATTR_UNALIGNED_SCHEDULE: u8 = 0x15;
/// Cipher suite info attribute.
pub const ATTR_CIPHER_SUITE: u8 = 0x22;
/// Security context info attribute.
pub const ATTR_SECURITY_CONTEXT: u8 = 0x23;
/// Shared key descriptor attribute.
pub const ATTR_SHARED_KEY: u8 = 0x24;
/// NDP extension attribute.
pub const ATTR_NDPE: u8 = 0x29;
/// Vendor specific attribute.
pub const ATTR_VENDOR: u8 = 0xDD;

/// TLV header size.
pub const ATTR_HEADER_LEN: usize = 3;

// NDP / NDPE control bits
const CTRL_CONFIRM_REQUIRED: u8 = 0x01;
const CTRL_SECURITY_PRESENT: u8 = 0x04;
const CTRL_PUBLISH_ID_PRESENT: u8 = 0x08;
const CTRL_RESPONDER_NDI_PRESENT: u8 = 0x10;
const CTRL_SPECIFIC_INFO_PRESENT: u8 = 0x20;

// NDPE TLV types
const NDPE_TLV_IPV6_IID: u8 = 0x00;
const NDPE_TLV_PORT: u8 = 0x01;
const NDPE_TLV_PROTOCOL: u8 = 0x02;
const NDPE_TLV_APP_INFO: u8 = 0x03;

/// Device capability bit announcing NDPE support.
pub const DEVCAP_NDPE_SUPPORTED: u8 = 0x08;

/// Fixed part of an NDP/NDPE body.
const DATA_PATH_FIXED_LEN: usize = 11;

/// NDP/NDPE attribute type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NdpType {
    /// Data path request.
    Request = 0,
    /// Data path response.
    Response = 1,
    /// Data path confirm.
    Confirm = 2,
    /// Security install.
    SecurityInstall = 3,
    /// Termination.
    Terminate = 4,
}

impl NdpType {
    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => NdpType::Request,
            1 => NdpType::Response,
            2 => NdpType::Confirm,
            3 => NdpType::SecurityInstall,
            4 => NdpType::Terminate,
            _ => return None,
        })
    }
}

/// NDL attribute type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NdlType {
    /// Schedule request.
    Request = 0,
    /// Schedule response.
    Response = 1,
    /// Schedule confirm.
    Confirm = 2,
}

impl NdlType {
    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => NdlType::Request,
            1 => NdlType::Response,
            2 => NdlType::Confirm,
            _ => return None,
        })
    }
}

/// Body shared by the NDP and NDPE attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPathAttribute {
    /// Dialog token.
    pub dialog_token: u8,
    /// Message type.
    pub kind: NdpType,
    /// Setup status.
    pub status: SetupStatus,
    /// Reason code.
    pub reason: ReasonCode,
    /// NDI of the initiator.
    pub initiator_ndi: MacAddr,
    /// NDP-ID.
    pub ndp_id: u8,
    /// Sender wants a data path confirm.
    pub confirm_required: bool,
    /// Security handshake in use.
    pub security_present: bool,
    /// Publish id of the service.
    pub publish_id: Option<u8>,
    /// NDI of the responder.
    pub responder_ndi: Option<MacAddr>,
    /// Service specific info.
    pub app_info: Vec<u8>,
    /// Extension fields, encoded for NDPE only.
    pub ndpe: NdpeParams,
}

impl DataPathAttribute {
    fn control(&self, extended: bool) -> u8 {
        let mut control = 0;
        if self.confirm_required {
            control |= CTRL_CONFIRM_REQUIRED;
        }
        if self.security_present {
            control |= CTRL_SECURITY_PRESENT;
        }
        if self.publish_id.is_some() {
            control |= CTRL_PUBLISH_ID_PRESENT;
        }
        if self.responder_ndi.is_some() {
            control |= CTRL_RESPONDER_NDI_PRESENT;
        }
        if !extended && !self.app_info.is_empty() {
            control |= CTRL_SPECIFIC_INFO_PRESENT;
        }
        control
    }

    fn body_len(&self, extended: bool) -> usize {
        let mut len = DATA_PATH_FIXED_LEN
            + usize::from(self.publish_id.is_some())
            + if self.responder_ndi.is_some() { 6 } else { 0 };
        if extended {
            if self.ndpe.ipv6_iid.is_some() {
                len += ATTR_HEADER_LEN + IPV6_IID_LEN;
            }
            if self.ndpe.port.is_some() {
                len += ATTR_HEADER_LEN + 2;
            }
            if self.ndpe.protocol.is_some() {
                len += ATTR_HEADER_LEN + 1;
            }
            if !self.app_info.is_empty() {
                len += ATTR_HEADER_LEN + self.app_info.len();
            }
        } else {
            len += self.app_info.len();
        }
        len
    }

    fn append(&self, extended: bool, out: &mut Vec<u8>) {
        out.push(self.dialog_token);
        out.push(self.kind as u8 | (self.status as u8) << 4);
        out.push(self.reason as u8);
        out.extend_from_slice(self.initiator_ndi.as_bytes());
        out.push(self.ndp_id);
        out.push(self.control(extended));
        if let Some(publish_id) = self.publish_id {
            out.push(publish_id);
        }
        if let Some(ndi) = self.responder_ndi {
            out.extend_from_slice(ndi.as_bytes());
        }

        if !extended {
            out.extend_from_slice(&self.app_info);
            return;
        }
        if let Some(iid) = &self.ndpe.ipv6_iid {
            push_tlv(out, NDPE_TLV_IPV6_IID, iid);
        }
        if let Some(port) = self.ndpe.port {
            push_tlv(out, NDPE_TLV_PORT, &port.to_le_bytes());
        }
        if let Some(protocol) = self.ndpe.protocol {
            push_tlv(out, NDPE_TLV_PROTOCOL, &[protocol]);
        }
        if !self.app_info.is_empty() {
            push_tlv(out, NDPE_TLV_APP_INFO, &self.app_info);
        }
    }

    fn decode(id: u8, body: &[u8], extended: bool) -> Result<Self, FrameError> {
        let mut r = Reader::new(id, body);
        let dialog_token = r.u8()?;
        let type_status = r.u8()?;
        let kind = NdpType::from_u8(type_status & 0x0F).ok_or(FrameError::InvalidField {
            field: "ndp type",
            value: type_status & 0x0F,
        })?;
        let status = SetupStatus::from_u8(type_status >> 4).ok_or(FrameError::InvalidField {
            field: "ndp status",
            value: type_status >> 4,
        })?;
        let reason = ReasonCode::from_u8(r.u8()?);
        let initiator_ndi = r.mac()?;
        let ndp_id = r.u8()?;
        let control = r.u8()?;
        let publish_id = if control & CTRL_PUBLISH_ID_PRESENT != 0 {
            Some(r.u8()?)
        } else {
            None
        };
        let responder_ndi = if control & CTRL_RESPONDER_NDI_PRESENT != 0 {
            Some(r.mac()?)
        } else {
            None
        };

        let mut attr = DataPathAttribute {
            dialog_token,
            kind,
            status,
            reason,
            initiator_ndi,
            ndp_id,
            confirm_required: control & CTRL_CONFIRM_REQUIRED != 0,
            security_present: control & CTRL_SECURITY_PRESENT != 0,
            publish_id,
            responder_ndi,
            app_info: Vec::new(),
            ndpe: NdpeParams::default(),
        };

        if !extended {
            if control & CTRL_SPECIFIC_INFO_PRESENT != 0 {
                attr.app_info = r.rest().to_vec();
            }
            return Ok(attr);
        }

        while !r.is_empty() {
            let tlv_type = r.u8()?;
            let len = r.u16()? as usize;
            let value = r.take(len)?;
            match tlv_type {
                NDPE_TLV_IPV6_IID => {
                    let iid: [u8; IPV6_IID_LEN] =
                        value.try_into().map_err(|_| FrameError::InvalidField {
                            field: "ipv6 interface id length",
                            value: len as u8,
                        })?;
                    attr.ndpe.ipv6_iid = Some(iid);
                }
                NDPE_TLV_PORT if len == 2 => {
                    attr.ndpe.port = Some(u16::from_le_bytes([value[0], value[1]]));
                }
                NDPE_TLV_PROTOCOL if len == 1 => attr.ndpe.protocol = Some(value[0]),
                NDPE_TLV_APP_INFO => attr.app_info = value.to_vec(),
                _ => {}
            }
        }
        Ok(attr)
    }
}

/// Device capability attribute body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceCapability {
    /// Availability map id.
    pub map_id: u8,
    /// Committed discovery window info.
    pub committed_dw: u16,
    /// Supported bands bitmap.
    pub bands: u8,
    /// Operation mode.
    pub op_mode: u8,
    /// Antenna configuration.
    pub antennas: u8,
    /// Maximum channel switch time in microseconds.
    pub switch_time: u16,
    /// Capability bits.
    pub capabilities: u8,
}

impl DeviceCapability {
    const LEN: usize = 9;

    /// Peer announces NDPE support.
    pub fn supports_ndpe(&self) -> bool {
        self.capabilities & DEVCAP_NDPE_SUPPORTED != 0
    }
}

/// NDL attribute body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdlAttribute {
    /// Dialog token.
    pub dialog_token: u8,
    /// Message type.
    pub kind: NdlType,
    /// Setup status.
    pub status: SetupStatus,
    /// Reason code.
    pub reason: ReasonCode,
    /// Control bits.
    pub control: u8,
}

impl NdlAttribute {
    const LEN: usize = 4;
}

/// Cipher suite info attribute body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CipherSuiteInfo {
    /// Security capability bits.
    pub capabilities: u8,
    /// `(suite, publish id)` pairs.
    pub suites: Vec<(CipherSuite, u8)>,
}

/// Security context info attribute body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityContext {
    /// Publish id the context belongs to.
    pub publish_id: u8,
    /// Security context identifier (PMKID).
    pub scid: [u8; SCID_LEN],
}

/// Shared key descriptor attribute body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedKey {
    /// Publish id the key belongs to.
    pub publish_id: u8,
    /// Key descriptor produced by the security collaborator.
    pub descriptor: Vec<u8>,
}

/// One NAN attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// NDP.
    Ndp(DataPathAttribute),
    /// NDP extension.
    Ndpe(DataPathAttribute),
    /// Device capability.
    DeviceCapability(DeviceCapability),
    /// NAN availability (opaque).
    Availability(Vec<u8>),
    /// NDC (opaque).
    Ndc(Vec<u8>),
    /// NDL.
    Ndl(NdlAttribute),
    /// NDL QoS.
    NdlQos(QosParams),
    /// Element container (opaque).
    ElementContainer(Vec<u8>),
    /// Unaligned schedule (opaque).
    UnalignedSchedule(Vec<u8>),
    /// Cipher suite info.
    CipherSuite(CipherSuiteInfo),
    /// Security context info.
    SecurityContext(SecurityContext),
    /// Shared key descriptor.
    SharedKey(SharedKey),
    /// Vendor specific (opaque).
    Vendor(Vec<u8>),
}

impl Attribute {
    /// Attribute id on the wire.
    pub fn id(&self) -> u8 {
        match self {
            Attribute::Ndp(_) => ATTR_NDP,
            Attribute::Ndpe(_) => ATTR_NDPE,
            Attribute::DeviceCapability(_) => ATTR_DEVICE_CAPABILITY,
            Attribute::Availability(_) => ATTR_AVAILABILITY,
            Attribute::Ndc(_) => ATTR_NDC,
            Attribute::Ndl(_) => ATTR_NDL,
            Attribute::NdlQos(_) => ATTR_NDL_QOS,
            Attribute::ElementContainer(_) => ATTR_ELEMENT_CONTAINER,
            Attribute::UnalignedSchedule(_) => ATTR_UNALIGNED_SCHEDULE,
            Attribute::CipherSuite(_) => ATTR_CIPHER_SUITE,
            Attribute::SecurityContext(_) => ATTR_SECURITY_CONTEXT,
            Attribute::SharedKey(_) => ATTR_SHARED_KEY,
            Attribute::Vendor(_) => ATTR_VENDOR,
        }
    }

    /// Position in the fixed emission order of composed frames.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Attribute::Ndp(_) => 0,
            Attribute::Ndpe(_) => 1,
            Attribute::DeviceCapability(_) => 2,
            Attribute::Availability(_) => 3,
            Attribute::Ndc(_) => 4,
            Attribute::Ndl(_) => 5,
            Attribute::NdlQos(_) => 6,
            Attribute::ElementContainer(_) => 7,
            Attribute::UnalignedSchedule(_) => 8,
            Attribute::CipherSuite(_) => 9,
            Attribute::SecurityContext(_) => 10,
            Attribute::SharedKey(_) => 11,
            Attribute::Vendor(_) => 12,
        }
    }

    fn body_len(&self) -> usize {
        match self {
            Attribute::Ndp(dp) => dp.body_len(false),
            Attribute::Ndpe(dp) => dp.body_len(true),
            Attribute::DeviceCapability(_) => DeviceCapability::LEN,
            Attribute::Availability(body)
            | Attribute::Ndc(body)
            | Attribute::ElementContainer(body)
            | Attribute::UnalignedSchedule(body)
            | Attribute::Vendor(body) => body.len(),
            Attribute::Ndl(_) => NdlAttribute::LEN,
            Attribute::NdlQos(_) => 3,
            Attribute::CipherSuite(info) => 1 + 2 * info.suites.len(),
            Attribute::SecurityContext(_) => 1 + SCID_LEN,
            Attribute::SharedKey(key) => 1 + key.descriptor.len(),
        }
    }

    /// Encoded size including the TLV header.
    pub fn len(&self) -> usize {
        ATTR_HEADER_LEN + self.body_len()
    }

    /// Always false; an attribute has at least its header.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Encode into `out`.
    pub fn append(&self, out: &mut Vec<u8>) {
        out.push(self.id());
        out.extend_from_slice(&(self.body_len() as u16).to_le_bytes());
        match self {
            Attribute::Ndp(dp) => dp.append(false, out),
            Attribute::Ndpe(dp) => dp.append(true, out),
            Attribute::DeviceCapability(cap) => {
                out.push(cap.map_id);
                out.extend_from_slice(&cap.committed_dw.to_le_bytes());
                out.push(cap.bands);
                out.push(cap.op_mode);
                out.push(cap.antennas);
                out.extend_from_slice(&cap.switch_time.to_le_bytes());
                out.push(cap.capabilities);
            }
            Attribute::Availability(body)
            | Attribute::Ndc(body)
            | Attribute::ElementContainer(body)
            | Attribute::UnalignedSchedule(body)
            | Attribute::Vendor(body) => out.extend_from_slice(body),
            Attribute::Ndl(ndl) => {
                out.push(ndl.dialog_token);
                out.push(ndl.kind as u8 | (ndl.status as u8) << 4);
                out.push(ndl.reason as u8);
                out.push(ndl.control);
            }
            Attribute::NdlQos(qos) => {
                out.push(qos.min_slots.unwrap_or(0));
                out.extend_from_slice(&qos.max_latency.unwrap_or(u16::MAX).to_le_bytes());
            }
            Attribute::CipherSuite(info) => {
                out.push(info.capabilities);
                for (suite, publish_id) in &info.suites {
                    out.push(suite.0);
                    out.push(*publish_id);
                }
            }
            Attribute::SecurityContext(ctx) => {
                out.push(ctx.publish_id);
                out.extend_from_slice(&ctx.scid);
            }
            Attribute::SharedKey(key) => {
                out.push(key.publish_id);
                out.extend_from_slice(&key.descriptor);
            }
        }
    }

    /// Decode one attribute body. Unknown ids yield `Ok(None)`.
    pub fn decode(id: u8, body: &[u8]) -> Result<Option<Self>, FrameError> {
        let attr = match id {
            ATTR_NDP => Attribute::Ndp(DataPathAttribute::decode(id, body, false)?),
            ATTR_NDPE => Attribute::Ndpe(DataPathAttribute::decode(id, body, true)?),
            ATTR_DEVICE_CAPABILITY => {
                let mut r = Reader::new(id, body);
                Attribute::DeviceCapability(DeviceCapability {
                    map_id: r.u8()?,
                    committed_dw: r.u16()?,
                    bands: r.u8()?,
                    op_mode: r.u8()?,
                    antennas: r.u8()?,
                    switch_time: r.u16()?,
                    capabilities: r.u8()?,
                })
            }
            ATTR_AVAILABILITY => Attribute::Availability(body.to_vec()),
            ATTR_NDC => Attribute::Ndc(body.to_vec()),
            ATTR_ELEMENT_CONTAINER => Attribute::ElementContainer(body.to_vec()),
            ATTR_UNALIGNED_SCHEDULE => Attribute::UnalignedSchedule(body.to_vec()),
            ATTR_VENDOR => Attribute::Vendor(body.to_vec()),
            ATTR_NDL => {
                let mut r = Reader::new(id, body);
                let dialog_token = r.u8()?;
                let type_status = r.u8()?;
                let kind = NdlType::from_u8(type_status & 0x0F).ok_or(
                    FrameError::InvalidField {
                        field: "ndl type",
                        value: type_status & 0x0F,
                    },
                )?;
                let status = SetupStatus::from_u8(type_status >> 4).ok_or(
                    FrameError::InvalidField {
                        field: "ndl status",
                        value: type_status >> 4,
                    },
                )?;
                Attribute::Ndl(NdlAttribute {
                    dialog_token,
                    kind,
                    status,
                    reason: ReasonCode::from_u8(r.u8()?),
                    control: r.u8()?,
                })
            }
            ATTR_NDL_QOS => {
                let mut r = Reader::new(id, body);
                let min_slots = r.u8()?;
                let max_latency = r.u16()?;
                Attribute::NdlQos(QosParams {
                    min_slots: (min_slots != 0).then_some(min_slots),
                    max_latency: (max_latency != u16::MAX).then_some(max_latency),
                })
            }
            ATTR_CIPHER_SUITE => {
                let mut r = Reader::new(id, body);
                let capabilities = r.u8()?;
                let mut suites = Vec::new();
                while !r.is_empty() {
                    suites.push((CipherSuite(r.u8()?), r.u8()?));
                }
                Attribute::CipherSuite(CipherSuiteInfo {
                    capabilities,
                    suites,
                })
            }
            ATTR_SECURITY_CONTEXT => {
                let mut r = Reader::new(id, body);
                let publish_id = r.u8()?;
                let scid: [u8; SCID_LEN] = r
                    .take(SCID_LEN)?
                    .try_into()
                    .map_err(|_| FrameError::Contradictory("security context length"))?;
                Attribute::SecurityContext(SecurityContext { publish_id, scid })
            }
            ATTR_SHARED_KEY => {
                let mut r = Reader::new(id, body);
                let publish_id = r.u8()?;
                Attribute::SharedKey(SharedKey {
                    publish_id,
                    descriptor: r.rest().to_vec(),
                })
            }
            _ => return Ok(None),
        };
        Ok(Some(attr))
    }
}

fn push_tlv(out: &mut Vec<u8>, tlv_type: u8, value: &[u8]) {
    out.push(tlv_type);
    out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    out.extend_from_slice(value);
}

/// Bounds-checked cursor over an attribute body.
struct Reader<'a> {
    id: u8,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(id: u8, buf: &'a [u8]) -> Self {
        Self { id, buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FrameError> {
        let available = self.buf.len() - self.pos;
        if n > available {
            return Err(FrameError::AttributeOverrun {
                id: self.id,
                declared: n,
                available,
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, FrameError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn mac(&mut self) -> Result<MacAddr, FrameError> {
        let b = self.take(6)?;
        MacAddr::read(b).ok_or(FrameError::AttributeOverrun {
            id: self.id,
            declared: 6,
            available: b.len(),
        })
    }

    fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ndp() -> DataPathAttribute {
        DataPathAttribute {
            dialog_token: 3,
            kind: NdpType::Response,
            status: SetupStatus::Accepted,
            reason: ReasonCode::Reserved,
            initiator_ndi: MacAddr::new([2, 0, 0, 0, 0, 1]),
            ndp_id: 7,
            confirm_required: true,
            security_present: false,
            publish_id: Some(4),
            responder_ndi: Some(MacAddr::new([2, 0, 0, 0, 0, 2])),
            app_info: vec![0xAA, 0xBB],
            ndpe: NdpeParams::default(),
        }
    }

    fn encode(attr: &Attribute) -> Vec<u8> {
        let mut out = Vec::new();
        attr.append(&mut out);
        assert_eq!(out.len(), attr.len());
        out
    }

    #[test]
    fn test_ndp_wire_layout() {
        let bytes = encode(&Attribute::Ndp(sample_ndp()));
        assert_eq!(
            hex::encode(&bytes),
            "0e1400\
             03\
             11\
             00\
             020000000001\
             07\
             39\
             04\
             020000000002\
             aabb"
        );
    }

    #[test]
    fn test_ndpe_carries_extension_tlvs() {
        let mut dp = sample_ndp();
        dp.ndpe = NdpeParams {
            ipv6_iid: Some([1, 2, 3, 4, 5, 6, 7, 8]),
            port: Some(0x1F90),
            protocol: Some(6),
        };
        let attr = Attribute::Ndpe(dp.clone());
        let bytes = encode(&attr);
        assert_eq!(bytes[0], ATTR_NDPE);

        let decoded = Attribute::decode(ATTR_NDPE, &bytes[ATTR_HEADER_LEN..])
            .expect("decode")
            .expect("known id");
        assert_eq!(decoded, Attribute::Ndpe(dp));
    }

    #[test]
    fn test_ndl_and_qos_layout() {
        let ndl = Attribute::Ndl(NdlAttribute {
            dialog_token: 9,
            kind: NdlType::Confirm,
            status: SetupStatus::Rejected,
            reason: ReasonCode::NdlUnacceptable,
            control: 0,
        });
        assert_eq!(hex::encode(encode(&ndl)), "10040009220b00");

        let qos = Attribute::NdlQos(QosParams {
            min_slots: Some(2),
            max_latency: None,
        });
        assert_eq!(hex::encode(encode(&qos)), "11030002ffff");
    }

    #[test]
    fn test_truncated_body_is_overrun() {
        let err = Attribute::decode(ATTR_NDP, &[1, 0x01, 0]).unwrap_err();
        assert!(matches!(err, FrameError::AttributeOverrun { id: ATTR_NDP, .. }));
    }

    #[test]
    fn test_bad_status_rejected() {
        let mut bytes = encode(&Attribute::Ndp(sample_ndp()));
        bytes[ATTR_HEADER_LEN + 1] = 0x31;
        let err = Attribute::decode(ATTR_NDP, &bytes[ATTR_HEADER_LEN..]).unwrap_err();
        assert_eq!(
            err,
            FrameError::InvalidField {
                field: "ndp status",
                value: 3
            }
        );
    }

    #[test]
    fn test_unknown_attribute_skipped() {
        assert_eq!(Attribute::decode(0x77, &[1, 2, 3]).expect("decode"), None);
    }
}
