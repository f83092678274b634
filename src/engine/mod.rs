//! The data path engine.
//!
//! [`Engine`] owns the link and session pools and drives both protocol state
//! machines. It is a plain value with no internal locking: the host feeds it
//! inbound frames, transmit completions, timer expiries, scheduler grants and
//! host commands one at a time, and every side effect goes out through the
//! [`Platform`] it was built with.
//!
//! # Example
//!
//! ```ignore
//! let mut engine = Engine::new(EngineConfig::default(), platform)?;
//! let outcome = engine.data_request(DataRequest::new(peer, publish_id))?;
//! // later, from the driver loop
//! engine.receive(&frame)?;
//! engine.tx_done(&sent, TxStatus::Success)?;
//! engine.timer_expired(timer)?;
//! ```

mod command;
mod event;
mod rx;
mod timeout;
mod transmit;
mod tx_done;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::core::constants::MAX_NDP;
use crate::core::{EngineConfig, EngineError, EngineResult, MacAddr, Platform, Role};
use crate::fsm::{NdlState, NdpState};
use crate::registry::{InstanceId, NdlHandle, NdlSnapshot, NdpRef, NdpSnapshot, Registry};
use crate::timer::{TimerId, TimerKind};

pub use command::{DataEnd, DataRequest, DataRequestOutcome, DataResponse};
pub use event::HostEvent;

pub(crate) use command::AutoReply;

/// NAN data path and schedule negotiation engine.
pub struct Engine<P: Platform> {
    pub(crate) config: EngineConfig,
    pub(crate) registry: Registry,
    pub(crate) platform: P,
    /// Host decision stored ahead of the next inbound request.
    pub(crate) auto_reply: Option<AutoReply>,
    /// Source of fast-recovery markers; older links have smaller values.
    fast_recovery_clock: u32,
    running: bool,
}

impl<P: Platform> Engine<P> {
    /// Create an engine over `platform`.
    pub fn new(config: EngineConfig, platform: P) -> EngineResult<Self> {
        config.validate()?;
        let registry = Registry::new(&config);
        info!(
            local = %config.local_address,
            links = registry.ndl_limit(),
            random_ndp_id = config.random_ndp_id,
            ndpe = config.ndpe_enabled,
            "data path engine started"
        );
        Ok(Self {
            config,
            registry,
            platform,
            auto_reply: None,
            fast_recovery_clock: 0,
            running: true,
        })
    }

    /// Release every link and session and stop accepting input.
    ///
    /// Each session is reported with a data termination event.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        for slot in self.registry.valid_ndls() {
            let peer = self.registry.ndl(slot).peer;
            self.deactivate_ndl_timers(slot);
            self.return_permit(slot);
            self.free_ndl(slot);
            self.platform.drop_resources(peer);
        }
        self.auto_reply = None;
        self.running = false;
        info!("data path engine stopped");
    }

    /// False after [`shutdown`](Self::shutdown).
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Collaborators.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Collaborators, mutably.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Link with `peer`, matched by management address or peer NDI.
    pub fn ndl(&self, peer: MacAddr) -> Option<NdlSnapshot> {
        let slot = self.registry.find_ndl_by_mac(peer)?;
        Some(self.registry.ndl(slot).snapshot())
    }

    /// Every valid link.
    pub fn ndls(&self) -> Vec<NdlSnapshot> {
        self.registry
            .valid_ndls()
            .into_iter()
            .map(|slot| self.registry.ndl(slot).snapshot())
            .collect()
    }

    /// Session addressed by `instance_id`.
    pub fn ndp(&self, instance_id: InstanceId) -> Option<NdpSnapshot> {
        let at = self.registry.find_ndp_by_instance_id(instance_id)?;
        Some(self.registry.ndp(at).snapshot())
    }

    /// Sessions on the link with `peer`.
    pub fn ndps(&self, peer: MacAddr) -> Vec<NdpSnapshot> {
        let Some(slot) = self.registry.find_ndl_by_mac(peer) else {
            return Vec::new();
        };
        self.registry
            .ndl(slot)
            .ndps
            .iter()
            .filter(|ndp| ndp.valid)
            .map(|ndp| ndp.snapshot())
            .collect()
    }

    /// Some session is between its first frame and normal traffic.
    pub fn is_setup_ongoing(&self) -> bool {
        self.registry.valid_ndls().into_iter().any(|slot| {
            self.registry.ndl(slot).ndps.iter().any(|ndp| {
                ndp.valid
                    && !matches!(
                        ndp.state,
                        NdpState::Idle
                            | NdpState::NormalTr
                            | NdpState::TxDpTermination
                            | NdpState::Disconnect
                    )
            })
        })
    }

    /// The scheduler grants a permit it deferred in
    /// [`Scheduler::negotiation_start`](crate::Scheduler::negotiation_start).
    pub fn schedule_negotiation_granted(&mut self, handle: NdlHandle) -> EngineResult<()> {
        self.ensure_running()?;
        self.negotiation_granted(handle);
        Ok(())
    }

    /// Arm the handshake deadline of session `instance_id`.
    pub fn arm_security_timer(
        &mut self,
        instance_id: InstanceId,
        after: Duration,
    ) -> EngineResult<()> {
        self.ensure_running()?;
        let at = self
            .registry
            .find_ndp_by_instance_id(instance_id)
            .ok_or(EngineError::NotFound)?;
        self.restart_timer(at.ndl, TimerKind::SecurityExpire, after);
        Ok(())
    }

    /// Permit granted for link `handle`: start what it was requested for.
    pub(crate) fn negotiation_granted(&mut self, handle: NdlHandle) {
        let slot = self.registry.resolve(handle).filter(|&slot| {
            matches!(
                self.registry.ndl(slot).state,
                NdlState::RequestScheduleNdp | NdlState::RequestScheduleNdl
            )
        });
        let Some(slot) = slot else {
            if let Some(slot) = self.registry.resolve(handle) {
                self.registry.ndl_mut(slot).under_negotiation = false;
            }
            warn!(slot = handle.slot(), "negotiation permit for a link not waiting on it");
            self.platform.negotiation_stop();
            return;
        };

        let ndl = self.registry.ndl_mut(slot);
        ndl.under_negotiation = true;
        let (state, role, qos) = (ndl.state, ndl.role, ndl.qos);
        self.platform.add_qos(qos);

        match (state, role) {
            (NdlState::RequestScheduleNdp, _) => self.ndl_step(slot, NdlState::ScheduleSetup),
            (_, Role::Responder) => self.ndl_step(slot, NdlState::ResponderRxScheduleRequest),
            (_, Role::Initiator) => {
                if let Err(reason) = self.platform.gen_local_proposal() {
                    warn!(?reason, "scheduler refused to build a proposal");
                }
                self.ndl_step(slot, NdlState::InitiatorTxScheduleRequest);
            }
        }
    }

    pub(crate) fn ensure_running(&self) -> EngineResult<()> {
        if self.running {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    pub(crate) fn emit(&mut self, event: HostEvent) {
        debug!(event = event.name(), "host event");
        self.platform.notify(event);
    }

    fn timer_id(&self, slot: usize, kind: TimerKind) -> TimerId {
        TimerId::new(self.registry.ndl(slot).handle(), kind)
    }

    /// Arm `kind` on link `slot`, replacing a pending deadline.
    pub(crate) fn restart_timer(&mut self, slot: usize, kind: TimerKind, after: Duration) {
        let id = self.timer_id(slot, kind);
        self.platform.start_timer(id, after);
    }

    pub(crate) fn stop_timer(&mut self, slot: usize, kind: TimerKind) {
        let id = self.timer_id(slot, kind);
        self.platform.stop_timer(id);
    }

    pub(crate) fn stop_user_response_timer(&mut self, at: NdpRef) {
        let kind = TimerKind::UserResponse {
            ndp: at.ndp as u8,
            generation: self.registry.ndp_generation(at),
        };
        self.stop_timer(at.ndl, kind);
    }

    /// Stop every link-level timer of `slot`.
    pub(crate) fn deactivate_ndl_timers(&mut self, slot: usize) {
        self.stop_timer(slot, TimerKind::ProtocolExpire);
        self.stop_timer(slot, TimerKind::ReschRetry(Role::Initiator));
        self.stop_timer(slot, TimerKind::ReschRetry(Role::Responder));
        for ndp in 0..MAX_NDP as u8 {
            self.stop_timer(slot, TimerKind::NdpRetry(ndp));
        }
        self.stop_timer(slot, TimerKind::SecurityExpire);
    }

    /// Both sides support the NDP extension attribute.
    pub(crate) fn use_ndpe(&self, at: NdpRef) -> bool {
        self.config.ndpe_enabled && self.registry.ndp(at).peer_supports_ndpe
    }

    /// Release session `at` and its host deadline.
    pub(crate) fn free_ndp(&mut self, at: NdpRef) {
        if !self.registry.ndp(at).valid {
            return;
        }
        self.stop_user_response_timer(at);
        self.registry.release_ndp(at);
    }

    /// Release link `slot` and every session on it.
    pub(crate) fn free_ndl(&mut self, slot: usize) {
        if !self.registry.ndl(slot).valid {
            return;
        }
        self.deactivate_ndl_timers(slot);
        self.registry.ndl_mut(slot).pending.flush();

        for ndp in 0..MAX_NDP {
            let at = NdpRef::new(slot, ndp);
            let session = self.registry.ndp(at);
            if !session.valid {
                continue;
            }
            let event = HostEvent::DataTermination {
                instance_id: session.instance_id,
                ndp_id: session.ndp_id,
                reason: session.fail_reason,
            };
            let (instance_id, security) = (session.instance_id, session.security_required);
            self.emit(event);
            if security {
                self.platform.terminate_handshake(instance_id);
            }
            self.free_ndp(at);
        }
        self.registry.release_ndl(slot);
    }

    /// Claim a link slot, evicting the oldest fast-recovery link when full.
    pub(crate) fn allocate_ndl(&mut self, peer: MacAddr, role: Role) -> Option<usize> {
        if let Some(slot) = self.registry.allocate_ndl(peer, role) {
            return Some(slot);
        }
        let Some(victim) = self.registry.oldest_fast_recovery() else {
            error!(peer = %peer, "no free data link slot");
            return None;
        };

        let ndl = self.registry.ndl_mut(victim);
        let (old_peer, request_id) = (ndl.peer, ndl.fast_recovery_id);
        ndl.fast_recovery = 0;
        ndl.fast_recovery_id = 0;
        info!(peer = %old_peer, request_id, "evicting fast-recovery link");
        self.emit(HostEvent::FastRecoveryDeleted {
            peer: old_peer,
            request_id,
        });

        self.disconnect_by_ndl(victim, false);
        if self.registry.ndl(victim).valid {
            self.deactivate_ndl_timers(victim);
            self.return_permit(victim);
            self.free_ndl(victim);
            self.platform.drop_resources(old_peer);
        }
        self.registry.allocate_ndl(peer, role)
    }

    /// Take down every session of link `slot`.
    ///
    /// Sessions in normal traffic disconnect silently unless
    /// `send_termination` is set; the rest send a termination first.
    pub(crate) fn disconnect_by_ndl(&mut self, slot: usize, send_termination: bool) {
        let ndl = self.registry.ndl(slot);
        if !ndl.valid {
            return;
        }
        if ndl.fast_recovery != 0 {
            info!(peer = %ndl.peer, "link in fast recovery, keeping sessions");
            return;
        }

        for ndp in 0..MAX_NDP {
            if !self.registry.ndl(slot).valid {
                return;
            }
            let at = NdpRef::new(slot, ndp);
            let session = self.registry.ndp(at);
            if !session.valid {
                continue;
            }
            let next = if session.state == NdpState::NormalTr && !send_termination {
                NdpState::Disconnect
            } else {
                NdpState::TxDpTermination
            };
            self.ndp_step(at, next);
        }
    }

    /// Mark the link with `peer` as in fast recovery.
    ///
    /// A marked link keeps its sessions on link loss and is the first
    /// candidate for eviction when the link pool is full.
    pub fn set_fast_recovery(&mut self, peer: MacAddr, request_id: u8) -> EngineResult<()> {
        self.ensure_running()?;
        let slot = self
            .registry
            .find_ndl_by_mac(peer)
            .ok_or(EngineError::NotFound)?;
        self.fast_recovery_clock = self.fast_recovery_clock.wrapping_add(1).max(1);
        let marker = self.fast_recovery_clock;
        let ndl = self.registry.ndl_mut(slot);
        ndl.fast_recovery = marker;
        ndl.fast_recovery_id = request_id;
        debug!(peer = %peer, request_id, marker, "fast recovery set");
        Ok(())
    }

    /// Clear the fast-recovery mark of the link with `peer`.
    pub fn clear_fast_recovery(&mut self, peer: MacAddr) -> EngineResult<()> {
        self.ensure_running()?;
        let slot = self
            .registry
            .find_ndl_by_mac(peer)
            .ok_or(EngineError::NotFound)?;
        let ndl = self.registry.ndl_mut(slot);
        ndl.fast_recovery = 0;
        ndl.fast_recovery_id = 0;
        Ok(())
    }

    /// The link with `peer` is gone.
    ///
    /// When the keep-alive failed, sessions in normal traffic disconnect
    /// without a termination frame.
    pub fn link_lost(&mut self, peer: MacAddr, keep_alive_failed: bool) -> EngineResult<()> {
        self.ensure_running()?;
        let slot = self
            .registry
            .find_ndl_by_mac(peer)
            .ok_or(EngineError::NotFound)?;
        info!(peer = %peer, keep_alive_failed, "link lost");
        self.disconnect_by_ndl(slot, !keep_alive_failed);
        Ok(())
    }
}

impl<P: Platform> std::fmt::Debug for Engine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("running", &self.running)
            .field("links", &self.registry.valid_ndls().len())
            .finish_non_exhaustive()
    }
}
