//! Engine constants.
//!
//! Pool capacities are fixed at compile time. Timing and retry values are the
//! defaults used by [`EngineConfig`](super::EngineConfig).

use std::time::Duration;

// =============================================================================
// ENTITY POOLS
// =============================================================================

/// Maximum number of data links (one per peer device).
pub const MAX_NDL: usize = 4;

/// Maximum number of data paths nested under one data link.
pub const MAX_NDP: usize = 8;

/// Maximum number of (local NDI, peer NDI) contexts per data link.
pub const MAX_NDP_CONTEXT: usize = 8;

/// Multiplier separating the NDP-ID from the slot part of an instance id.
pub const INSTANCE_ID_BASE: u32 = 100;

const _: () = assert!(MAX_NDL * MAX_NDP <= INSTANCE_ID_BASE as usize);

/// Number of negotiation roles (initiator, responder).
pub const PROTOCOL_ROLE_NUM: usize = 2;

// =============================================================================
// RETRY LIMITS
// =============================================================================

/// Retransmissions of one data path frame before the session is dropped.
pub const NAN_DATA_RETRY_LIMIT: u8 = 3;

/// Retransmissions of a schedule request before falling back.
pub const NAN_SCHED_REQ_RETRY_LIMIT: u8 = 3;

/// Per-frame MAC retry limit handed to the transport.
pub const NAF_TX_RETRY_COUNT_LIMIT: u8 = 10;

// =============================================================================
// TIMING
// =============================================================================

/// Window for the host to answer an inbound data request.
pub const DEFAULT_USER_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Responder wait for the data path confirm after sending a response.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_millis(5000);

/// Retry guard for schedule request/response/confirm frames.
pub const DEFAULT_SCHEDULE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Retry guard for initiator-side data path frames.
pub const DEFAULT_DATA_RETRY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Guard for waiting on a peer data path reply.
pub const DEFAULT_PROTOCOL_TIMEOUT: Duration = Duration::from_millis(2000);

/// Guard for waiting on a peer schedule reply.
pub const DEFAULT_SECURITY_TIMEOUT: Duration = Duration::from_millis(2000);

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Public action frame category.
pub const CATEGORY_PUBLIC_ACTION: u8 = 0x04;

/// Vendor specific public action.
pub const ACTION_VENDOR_SPECIFIC: u8 = 0x09;

/// Wi-Fi Alliance OUI.
pub const WFA_OUI: [u8; 3] = [0x50, 0x6F, 0x9A];

/// OUI type identifying a NAN action frame.
pub const NAN_OUI_TYPE: u8 = 0x18;

/// Transport protocol value meaning "not carried".
pub const PROTOCOL_TYPE_NONE: u8 = 0xFF;

/// Length of a pairwise master key.
pub const PMK_LEN: usize = 32;

/// Length of a security context identifier.
pub const SCID_LEN: usize = 16;

/// Length of an IPv6 link-local interface identifier.
pub const IPV6_IID_LEN: usize = 8;
