//! Timer expiry.

use tracing::{info, warn};

use crate::core::{EngineError, EngineResult, FailReason, Platform};
use crate::fsm::{NdlState, NdpState};
use crate::registry::NdpRef;
use crate::timer::{TimerId, TimerKind};

use super::Engine;

impl<P: Platform> Engine<P> {
    /// A timer armed through [`TimerService`](crate::TimerService) expired.
    ///
    /// Expiries for links or sessions released since arming are dropped.
    pub fn timer_expired(&mut self, timer: TimerId) -> EngineResult<()> {
        self.ensure_running()?;
        let Some(slot) = self.registry.resolve(timer.ndl) else {
            warn!(%timer, "stale timer");
            return Err(EngineError::Ignored("timer of a released link"));
        };
        info!(peer = %self.registry.ndl(slot).peer, %timer, "timer expired");

        match timer.kind {
            TimerKind::UserResponse { ndp, generation } => {
                let at = NdpRef::new(slot, usize::from(ndp));
                let session = self.registry.ndl(slot).ndps.get(at.ndp);
                let live = session.is_some_and(|s| {
                    s.valid && s.generation == generation && s.state == NdpState::ResponderWaitDataRsp
                });
                if !live {
                    return Err(EngineError::Ignored("timer of a released session"));
                }
                let ndp = self.registry.ndp_mut(at);
                ndp.fail_reason = FailReason::UserSpaceResponseTimeout;
                self.responder_response(at, false);
                self.registry.ndp_mut(at).security_required = false;
                self.ndp_step(at, NdpState::Disconnect);
            }

            TimerKind::ProtocolExpire => {
                let ndl = self.registry.ndl(slot);
                match (ndl.state, ndl.operating) {
                    (
                        NdlState::InitiatorWaitforRxScheduleResponse
                        | NdlState::ResponderRxScheduleConfirm,
                        _,
                    ) => self.fall_back_to_established(slot),
                    (_, Some(ndp)) => self.session_timed_out(NdpRef::new(slot, ndp)),
                    (_, None) => self.ndl_step(slot, NdlState::Teardown),
                }
            }

            TimerKind::NdpRetry(ndp) => {
                let at = NdpRef::new(slot, usize::from(ndp));
                if !self.registry.ndl(slot).ndps.get(at.ndp).is_some_and(|s| s.valid) {
                    return Err(EngineError::Ignored("timer of a released session"));
                }
                self.session_timed_out(at);
            }

            TimerKind::ReschRetry(_) => {
                let ndl = self.registry.ndl(slot);
                let (state, operating) = (ndl.state, ndl.operating);
                match operating {
                    Some(ndp) => self.session_timed_out(NdpRef::new(slot, ndp)),
                    None if matches!(
                        state,
                        NdlState::InitiatorTxScheduleRequest
                            | NdlState::ResponderTxScheduleResponse
                            | NdlState::InitiatorTxScheduleConfirm
                    ) =>
                    {
                        self.fall_back_to_established(slot)
                    }
                    None => {
                        return Err(EngineError::Ignored("retry timer with nothing in flight"));
                    }
                }
            }

            TimerKind::SecurityExpire => {
                let Some(ndp) = self.registry.ndl(slot).operating else {
                    return Err(EngineError::Ignored("security timer without a session"));
                };
                let at = NdpRef::new(slot, ndp);
                self.stop_timer(slot, TimerKind::ProtocolExpire);
                self.registry.ndp_mut(at).fail_reason = FailReason::SecurityTimeout;
                self.ndp_step(at, NdpState::Disconnect);
            }
        }
        Ok(())
    }

    /// No reply for session `at`: give up on it.
    fn session_timed_out(&mut self, at: NdpRef) {
        let ndp = self.registry.ndp_mut(at);
        if !ndp.valid {
            return;
        }
        ndp.fail_reason = FailReason::RxTimeout;
        if ndp.state == NdpState::ResponderTxDpResponse {
            self.responder_response(at, false);
        }
        self.ndp_step(at, NdpState::Disconnect);
    }
}
