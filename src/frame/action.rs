//! NAN action frame header and attribute list.
//!
//! Layout:
//! ```text
//! +--------+--------+----------+--------+-----------+----------+---------+------------+
//! | dest 6 | src 6  | category | action | OUI 3     | OUI type | subtype | attributes |
//! |        |        | 0x04     | 0x09   | 50:6F:9A  | 0x18     |         | TLV ...    |
//! +--------+--------+----------+--------+-----------+----------+---------+------------+
//! ```

use std::fmt;

use crate::core::constants::{ACTION_VENDOR_SPECIFIC, CATEGORY_PUBLIC_ACTION, NAN_OUI_TYPE, WFA_OUI};
use crate::core::{FrameError, MacAddr};

use super::attribute::{ATTR_HEADER_LEN, Attribute, DataPathAttribute, DeviceCapability, NdlAttribute};

/// Offset of the category byte (start of the security message body).
pub const CATEGORY_OFFSET: usize = 12;

/// Bytes before the first attribute.
pub const HEADER_LEN: usize = 19;

/// NAN action frame subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActionSubtype {
    /// Data path request.
    DataPathRequest = 0x05,
    /// Data path response.
    DataPathResponse = 0x06,
    /// Data path confirm.
    DataPathConfirm = 0x07,
    /// Data path key installment.
    DataPathKeyInstall = 0x08,
    /// Data path termination.
    DataPathTermination = 0x09,
    /// Schedule request.
    ScheduleRequest = 0x0A,
    /// Schedule response.
    ScheduleResponse = 0x0B,
    /// Schedule confirm.
    ScheduleConfirm = 0x0C,
    /// Schedule update notification.
    ScheduleUpdateNotification = 0x0D,
}

impl ActionSubtype {
    /// Decode a subtype byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x05 => ActionSubtype::DataPathRequest,
            0x06 => ActionSubtype::DataPathResponse,
            0x07 => ActionSubtype::DataPathConfirm,
            0x08 => ActionSubtype::DataPathKeyInstall,
            0x09 => ActionSubtype::DataPathTermination,
            0x0A => ActionSubtype::ScheduleRequest,
            0x0B => ActionSubtype::ScheduleResponse,
            0x0C => ActionSubtype::ScheduleConfirm,
            0x0D => ActionSubtype::ScheduleUpdateNotification,
            _ => return None,
        })
    }

    /// Data path (NDP) frame, as opposed to a schedule (NDL) frame.
    pub fn is_data_path(self) -> bool {
        (self as u8) <= ActionSubtype::DataPathTermination as u8
    }
}

impl fmt::Display for ActionSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionSubtype::DataPathRequest => "DP request",
            ActionSubtype::DataPathResponse => "DP response",
            ActionSubtype::DataPathConfirm => "DP confirm",
            ActionSubtype::DataPathKeyInstall => "DP key install",
            ActionSubtype::DataPathTermination => "DP termination",
            ActionSubtype::ScheduleRequest => "schedule request",
            ActionSubtype::ScheduleResponse => "schedule response",
            ActionSubtype::ScheduleConfirm => "schedule confirm",
            ActionSubtype::ScheduleUpdateNotification => "schedule update notification",
        };
        f.write_str(name)
    }
}

/// A decoded or to-be-encoded NAN action frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFrame {
    /// Receiver address.
    pub dest: MacAddr,
    /// Transmitter address.
    pub src: MacAddr,
    /// Action subtype.
    pub subtype: ActionSubtype,
    /// Attributes in wire order.
    pub attributes: Vec<Attribute>,
}

impl ActionFrame {
    /// Frame with no attributes.
    pub fn new(subtype: ActionSubtype, src: MacAddr, dest: MacAddr) -> Self {
        Self {
            dest,
            src,
            subtype,
            attributes: Vec::new(),
        }
    }

    /// Encoded size.
    pub fn len(&self) -> usize {
        HEADER_LEN + self.attributes.iter().map(Attribute::len).sum::<usize>()
    }

    /// Always false; a frame has at least its header.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Encode to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(self.dest.as_bytes());
        out.extend_from_slice(self.src.as_bytes());
        out.push(CATEGORY_PUBLIC_ACTION);
        out.push(ACTION_VENDOR_SPECIFIC);
        out.extend_from_slice(&WFA_OUI);
        out.push(NAN_OUI_TYPE);
        out.push(self.subtype as u8);
        for attr in &self.attributes {
            attr.append(&mut out);
        }
        out
    }

    /// Decode a frame. Unknown attributes are skipped.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let (dest, src, subtype) = Self::peek_header(bytes)?;

        let mut attributes = Vec::new();
        let mut rest = &bytes[HEADER_LEN..];
        while !rest.is_empty() {
            if rest.len() < ATTR_HEADER_LEN {
                return Err(FrameError::TooShort {
                    expected: ATTR_HEADER_LEN,
                    actual: rest.len(),
                });
            }
            let id = rest[0];
            let declared = u16::from_le_bytes([rest[1], rest[2]]) as usize;
            let available = rest.len() - ATTR_HEADER_LEN;
            if declared > available {
                return Err(FrameError::AttributeOverrun {
                    id,
                    declared,
                    available,
                });
            }
            let body = &rest[ATTR_HEADER_LEN..ATTR_HEADER_LEN + declared];
            if let Some(attr) = Attribute::decode(id, body)? {
                attributes.push(attr);
            }
            rest = &rest[ATTR_HEADER_LEN + declared..];
        }

        Ok(Self {
            dest,
            src,
            subtype,
            attributes,
        })
    }

    /// Validate the fixed header and return `(dest, src, subtype)`.
    pub fn peek_header(bytes: &[u8]) -> Result<(MacAddr, MacAddr, ActionSubtype), FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::TooShort {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        if bytes[12] != CATEGORY_PUBLIC_ACTION
            || bytes[13] != ACTION_VENDOR_SPECIFIC
            || bytes[14..17] != WFA_OUI
            || bytes[17] != NAN_OUI_TYPE
        {
            return Err(FrameError::BadHeader);
        }
        let subtype = ActionSubtype::from_u8(bytes[18]).ok_or(FrameError::UnknownSubtype(bytes[18]))?;
        let dest = MacAddr::read(&bytes[0..6]).ok_or(FrameError::BadHeader)?;
        let src = MacAddr::read(&bytes[6..12]).ok_or(FrameError::BadHeader)?;
        Ok((dest, src, subtype))
    }

    /// NDP attribute, if present.
    pub fn ndp(&self) -> Option<&DataPathAttribute> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Ndp(dp) => Some(dp),
            _ => None,
        })
    }

    /// NDPE attribute, if present.
    pub fn ndpe(&self) -> Option<&DataPathAttribute> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Ndpe(dp) => Some(dp),
            _ => None,
        })
    }

    /// NDP attribute, else NDPE attribute.
    pub fn data_path(&self) -> Option<&DataPathAttribute> {
        self.ndp().or_else(|| self.ndpe())
    }

    /// NDL attribute, if present.
    pub fn ndl(&self) -> Option<&NdlAttribute> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Ndl(ndl) => Some(ndl),
            _ => None,
        })
    }

    /// Device capability attribute, if present.
    pub fn device_capability(&self) -> Option<&DeviceCapability> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::DeviceCapability(cap) => Some(cap),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([0x02, 0, 0, 0, 0, n])
    }

    #[test]
    fn test_header_layout() {
        let frame = ActionFrame::new(ActionSubtype::ScheduleConfirm, mac(1), mac(2));
        let bytes = frame.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(hex::encode(&bytes), "0200000000020200000000010409506f9a180c");
        assert_eq!(bytes[CATEGORY_OFFSET], CATEGORY_PUBLIC_ACTION);
    }

    #[test]
    fn test_decode_skips_unknown_attribute() {
        let mut frame = ActionFrame::new(ActionSubtype::DataPathTermination, mac(1), mac(2));
        frame.attributes.push(Attribute::Vendor(vec![1, 2, 3]));
        let mut bytes = frame.encode();
        bytes.extend_from_slice(&[0x77, 0x01, 0x00, 0xEE]);

        let decoded = ActionFrame::decode(&bytes).expect("decode");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_decode_rejects_overrun() {
        let mut bytes = ActionFrame::new(ActionSubtype::DataPathRequest, mac(1), mac(2)).encode();
        bytes.extend_from_slice(&[0x12, 0x10, 0x00, 0x01]);
        assert_eq!(
            ActionFrame::decode(&bytes),
            Err(FrameError::AttributeOverrun {
                id: 0x12,
                declared: 16,
                available: 1
            })
        );
    }

    #[test]
    fn test_decode_rejects_foreign_frames() {
        let mut bytes = ActionFrame::new(ActionSubtype::DataPathRequest, mac(1), mac(2)).encode();
        bytes[18] = 0x01;
        assert_eq!(ActionFrame::decode(&bytes), Err(FrameError::UnknownSubtype(0x01)));

        bytes[17] = 0x13;
        assert_eq!(ActionFrame::decode(&bytes), Err(FrameError::BadHeader));

        assert!(matches!(
            ActionFrame::decode(&bytes[..10]),
            Err(FrameError::TooShort { .. })
        ));
    }

    #[test]
    fn test_subtype_family() {
        assert!(ActionSubtype::DataPathTermination.is_data_path());
        assert!(!ActionSubtype::ScheduleRequest.is_data_path());
    }
}
