//! Engine configuration.

use std::time::Duration;

use super::constants::*;
use super::error::ConfigError;
use super::types::MacAddr;

/// Runtime configuration of an [`Engine`](crate::Engine).
///
/// `Default` gives the values a driver uses when nothing is overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Local NAN management interface address, source of every frame.
    pub local_address: MacAddr,
    /// Default local data interface address for new sessions.
    pub local_ndi: MacAddr,
    /// Host deadline for answering an inbound data request.
    pub user_response_timeout: Duration,
    /// Responder wait for the data path confirm.
    pub confirm_timeout: Duration,
    /// Retry guard for schedule frames.
    pub schedule_timeout: Duration,
    /// Retry guard for initiator data path frames.
    pub data_retry_timeout: Duration,
    /// Wait for a peer data path reply.
    pub protocol_timeout: Duration,
    /// Wait for a peer schedule response or confirm.
    pub security_timeout: Duration,
    /// Data path frame retransmission limit.
    pub retry_limit: u8,
    /// Schedule request retransmission limit.
    pub schedule_request_retry_limit: u8,
    /// MAC retry limit handed to the transport per frame.
    pub naf_tx_retry_limit: u8,
    /// Runtime cap on links and on sessions per link.
    pub max_ndp_sessions: usize,
    /// Draw NDP-IDs from a shared random sequence instead of per-link counters.
    pub random_ndp_id: bool,
    /// Local support for the NDP extension attribute.
    pub ndpe_enabled: bool,
    /// Remember a host decision given before the matching request arrives.
    pub auto_handle_data_request: bool,
    /// Seed for the NDP-ID generator; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    /// Vendor attribute body appended to every frame.
    pub vendor_attribute: Option<Vec<u8>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_address: MacAddr::ZERO,
            local_ndi: MacAddr::ZERO,
            user_response_timeout: DEFAULT_USER_RESPONSE_TIMEOUT,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            schedule_timeout: DEFAULT_SCHEDULE_TIMEOUT,
            data_retry_timeout: DEFAULT_DATA_RETRY_TIMEOUT,
            protocol_timeout: DEFAULT_PROTOCOL_TIMEOUT,
            security_timeout: DEFAULT_SECURITY_TIMEOUT,
            retry_limit: NAN_DATA_RETRY_LIMIT,
            schedule_request_retry_limit: NAN_SCHED_REQ_RETRY_LIMIT,
            naf_tx_retry_limit: NAF_TX_RETRY_COUNT_LIMIT,
            max_ndp_sessions: MAX_NDP,
            random_ndp_id: false,
            ndpe_enabled: true,
            auto_handle_data_request: true,
            rng_seed: None,
            vendor_attribute: None,
        }
    }
}

impl EngineConfig {
    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ndp_sessions == 0 {
            return Err(ConfigError::NoSessions);
        }

        let timeouts = [
            ("user_response_timeout", self.user_response_timeout),
            ("confirm_timeout", self.confirm_timeout),
            ("schedule_timeout", self.schedule_timeout),
            ("data_retry_timeout", self.data_retry_timeout),
            ("protocol_timeout", self.protocol_timeout),
            ("security_timeout", self.security_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(ConfigError::ZeroTimeout(name));
            }
        }

        if self.retry_limit == 0 {
            return Err(ConfigError::ZeroRetryLimit("retry_limit"));
        }
        if self.schedule_request_retry_limit == 0 {
            return Err(ConfigError::ZeroRetryLimit("schedule_request_retry_limit"));
        }
        Ok(())
    }

    /// Number of link slots in use.
    pub(crate) fn ndl_limit(&self) -> usize {
        MAX_NDL.min(self.max_ndp_sessions)
    }

    /// Number of session slots per link in use.
    pub(crate) fn ndp_limit(&self) -> usize {
        MAX_NDP.min(self.max_ndp_sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = EngineConfig {
            protocol_timeout: Duration::ZERO,
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroTimeout("protocol_timeout"))
        );
    }

    #[test]
    fn test_limits_follow_session_cap() {
        let config = EngineConfig {
            max_ndp_sessions: 2,
            ..EngineConfig::default()
        };
        assert_eq!(config.ndl_limit(), 2);
        assert_eq!(config.ndp_limit(), 2);
    }
}
