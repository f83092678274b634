//! Protocol value types shared by the registry, frames and state machines.

use std::fmt;

use super::constants::{PMK_LEN, SCID_LEN};

/// 48-bit IEEE MAC address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// All-zero address.
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    /// Broadcast address.
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// True for `00:00:00:00:00:00`.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    /// True for `ff:ff:ff:ff:ff:ff`.
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }

    pub(crate) fn read(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self(raw))
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Negotiation role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Sent the first request.
    Initiator,
    /// Answering a peer request.
    Responder,
}

impl Role {
    /// Index into per-role tables.
    pub fn index(self) -> usize {
        match self {
            Role::Initiator => 0,
            Role::Responder => 1,
        }
    }
}

/// Status field of NDP and NDL attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SetupStatus {
    /// Negotiation continues with another frame.
    Continued = 0,
    /// Accepted.
    Accepted = 1,
    /// Rejected.
    Rejected = 2,
}

impl SetupStatus {
    /// Decode the 4-bit status value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SetupStatus::Continued),
            1 => Some(SetupStatus::Accepted),
            2 => Some(SetupStatus::Rejected),
            _ => None,
        }
    }
}

/// Reason code carried in NDP/NDL attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReasonCode {
    /// No reason given.
    Reserved = 0,
    /// Unspecified.
    UnspecifiedReason = 1,
    /// Out of links, sessions or schedule room.
    ResourceLimitation = 2,
    /// Malformed or colliding parameters.
    InvalidParameters = 3,
    /// FTM parameters cannot be met.
    FtmParametersIncapable = 4,
    /// Peer did not answer.
    NoResponse = 5,
    /// Availability cannot be accepted.
    InvalidAvailability = 6,
    /// Immutable schedule not acceptable.
    ImmutableUnacceptable = 7,
    /// Security policy mismatch.
    SecurityPolicy = 8,
    /// QoS cannot be met.
    QosUnacceptable = 9,
    /// Data path rejected by the application.
    NdpRejected = 10,
    /// Data link schedule rejected.
    NdlUnacceptable = 11,
}

impl ReasonCode {
    /// Decode a reason byte; unknown values map to [`ReasonCode::UnspecifiedReason`].
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ReasonCode::Reserved,
            2 => ReasonCode::ResourceLimitation,
            3 => ReasonCode::InvalidParameters,
            4 => ReasonCode::FtmParametersIncapable,
            5 => ReasonCode::NoResponse,
            6 => ReasonCode::InvalidAvailability,
            7 => ReasonCode::ImmutableUnacceptable,
            8 => ReasonCode::SecurityPolicy,
            9 => ReasonCode::QosUnacceptable,
            10 => ReasonCode::NdpRejected,
            11 => ReasonCode::NdlUnacceptable,
            _ => ReasonCode::UnspecifiedReason,
        }
    }
}

/// Local cause of a session failure, reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailReason {
    /// No local failure recorded.
    #[default]
    None,
    /// Peer reply did not arrive in time.
    RxTimeout,
    /// Host did not answer the data indication in time.
    UserSpaceResponseTimeout,
    /// Security handshake did not complete in time.
    SecurityTimeout,
}

/// Transmit completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Frame acknowledged.
    Success,
    /// Frame dropped after MAC retries.
    Failure,
}

impl TxStatus {
    /// True when acknowledged.
    pub fn is_success(self) -> bool {
        matches!(self, TxStatus::Success)
    }
}

/// Security handshake message carried by a data path frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecMessage {
    /// Carried by the data path request.
    M1,
    /// Carried by the data path response.
    M2,
    /// Carried by the data path confirm.
    M3,
    /// Carried by the key installment.
    M4,
}

/// NAN cipher suite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CipherSuite(pub u8);

impl CipherSuite {
    /// No cipher.
    pub const NONE: CipherSuite = CipherSuite(0);
    /// NCS-SK-128.
    pub const SK_128: CipherSuite = CipherSuite(1);
    /// NCS-SK-256.
    pub const SK_256: CipherSuite = CipherSuite(2);

    /// True for the "no cipher" value.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Security material supplied with a host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityParams {
    /// Requested cipher suite.
    pub cipher: CipherSuite,
    /// Pairwise master key.
    pub pmk: [u8; PMK_LEN],
    /// Security context identifier (PMKID), when known.
    pub scid: Option<[u8; SCID_LEN]>,
}

/// Host decision on an inbound data request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Accept the session.
    Accept,
    /// Reject the session.
    Reject,
}

/// Scheduler verdict on a peer schedule proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalVerdict {
    /// Proposal fits.
    Accept,
    /// Proposal needs a counter proposal.
    Counter,
    /// Proposal refused.
    Reject(ReasonCode),
}

/// Scheduler answer to a negotiation permit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStart {
    /// Permit granted inside the call.
    Granted,
    /// Permit will be granted later through
    /// [`Engine::schedule_negotiation_granted`](crate::Engine::schedule_negotiation_granted).
    Deferred,
}

/// QoS hints for a data link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QosParams {
    /// Minimum committed time slots.
    pub min_slots: Option<u8>,
    /// Maximum latency in slots.
    pub max_latency: Option<u16>,
}

impl QosParams {
    /// True when at least one hint is present.
    pub fn is_set(&self) -> bool {
        self.min_slots.is_some() || self.max_latency.is_some()
    }
}

/// NDP extension fields (IPv6 interface id, transport port and protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NdpeParams {
    /// IPv6 link-local interface identifier.
    pub ipv6_iid: Option<[u8; super::constants::IPV6_IID_LEN]>,
    /// Transport port.
    pub port: Option<u16>,
    /// Transport protocol.
    pub protocol: Option<u8>,
}

/// Schedule attribute bodies owned by the scheduler.
///
/// The engine carries these opaquely between the scheduler and the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScheduleAttributes {
    /// One body per NAN availability attribute.
    pub availability: Vec<Vec<u8>>,
    /// NDC attribute body.
    pub ndc: Option<Vec<u8>>,
    /// Element container attribute body.
    pub element_container: Option<Vec<u8>>,
    /// Unaligned schedule attribute body.
    pub unaligned: Option<Vec<u8>>,
}

impl ScheduleAttributes {
    /// True when no schedule attribute is present.
    pub fn is_empty(&self) -> bool {
        self.availability.is_empty()
            && self.ndc.is_none()
            && self.element_container.is_none()
            && self.unaligned.is_none()
    }
}
