//! Collaborator traits.
//!
//! The engine owns protocol state only. Slot allocation, key derivation, frame
//! delivery, timers and host notification are provided by the embedding
//! driver through these traits. All calls are made from the single dispatch
//! context that drives the [`Engine`](crate::Engine).

use std::time::Duration;

use super::error::TransportError;
use super::types::{
    CipherSuite, MacAddr, NegotiationStart, ProposalVerdict, QosParams, ReasonCode,
    ScheduleAttributes, SecMessage, Role,
};
use crate::engine::HostEvent;
use crate::registry::{InstanceId, NdlHandle};
use crate::timer::TimerId;

/// Time-slot scheduler.
///
/// Only one link may negotiate availability at a time; the scheduler hands
/// out that permit through [`negotiation_start`](Scheduler::negotiation_start)
/// and takes it back through [`negotiation_stop`](Scheduler::negotiation_stop).
pub trait Scheduler {
    /// Request the negotiation permit for `peer`.
    ///
    /// Returning [`NegotiationStart::Granted`] grants the permit immediately.
    /// With [`NegotiationStart::Deferred`] the driver must later call
    /// [`Engine::schedule_negotiation_granted`](crate::Engine::schedule_negotiation_granted)
    /// with `token`.
    fn negotiation_start(&mut self, peer: MacAddr, role: Role, token: NdlHandle)
        -> NegotiationStart;

    /// Return the negotiation permit.
    fn negotiation_stop(&mut self);

    /// Build the local availability proposal for the peer under negotiation.
    fn gen_local_proposal(&mut self) -> Result<(), ReasonCode>;

    /// Judge the peer proposal recorded by [`apply_peer_schedule`](Scheduler::apply_peer_schedule).
    fn check_remote_proposal(&mut self) -> ProposalVerdict;

    /// Commit the last mutually acknowledged schedule.
    fn update_negotiation_result(&mut self);

    /// Release every resource held for `peer`.
    fn drop_resources(&mut self, peer: MacAddr);

    /// Apply QoS hints to the negotiation in progress.
    fn add_qos(&mut self, qos: QosParams) {
        let _ = qos;
    }

    /// Snapshot negotiation state before an inbound schedule request is parsed.
    fn prepare_negotiation(&mut self, peer: MacAddr) {
        let _ = peer;
    }

    /// Mark the peer side of a link renegotiation complete.
    fn peer_negotiation_complete(&mut self, peer: MacAddr) {
        let _ = peer;
    }

    /// Diagnostic hook run when a session reaches normal traffic.
    fn setup_complete(&mut self, peer: MacAddr) {
        let _ = peer;
    }

    /// Record schedule attributes received from `peer`.
    fn apply_peer_schedule(
        &mut self,
        peer: MacAddr,
        schedule: &ScheduleAttributes,
    ) -> Result<(), ReasonCode> {
        let _ = (peer, schedule);
        Ok(())
    }

    /// Schedule attributes to advertise to `peer`.
    fn local_schedule(&mut self, peer: MacAddr) -> ScheduleAttributes {
        let _ = peer;
        ScheduleAttributes::default()
    }
}

/// Security handshake driver (NAN shared key 4-way handshake).
pub trait Security {
    /// Start the handshake state machine for a session.
    fn begin_handshake(&mut self, session: InstanceId);

    /// Install the pairwise master key.
    fn set_pmk(&mut self, session: InstanceId, pmk: &[u8]);

    /// Select the cipher suite.
    fn set_cipher(&mut self, session: InstanceId, cipher: CipherSuite);

    /// Hand over the body of a handshake message, from category onward.
    fn message_body_ready(&mut self, session: InstanceId, message: SecMessage, body: &[u8]);

    /// Report that a handshake message left the air.
    fn tx_done(&mut self, session: InstanceId, message: SecMessage);

    /// Hand over the body of a received handshake message, from category onward.
    fn message_received(&mut self, session: InstanceId, message: SecMessage, body: &[u8]) {
        let _ = (session, message, body);
    }

    /// Tear the handshake down.
    fn terminate_handshake(&mut self, session: InstanceId);

    /// Shared key descriptor to carry in `message`.
    fn key_descriptor(&mut self, session: InstanceId, message: SecMessage) -> Option<Vec<u8>> {
        let _ = (session, message);
        None
    }
}

/// Upper-layer notification sink.
pub trait HostEvents {
    /// Deliver one event.
    fn notify(&mut self, event: HostEvent);
}

/// Action frame transport.
///
/// Every accepted frame must eventually be reported back through
/// [`Engine::tx_done`](crate::Engine::tx_done) with the same bytes.
pub trait Transport {
    /// Queue an action frame.
    fn send_naf(&mut self, frame: &[u8], retry_limit: u8) -> Result<(), TransportError>;
}

/// One-shot deadline timers.
///
/// Expiry is reported through [`Engine::timer_expired`](crate::Engine::timer_expired).
pub trait TimerService {
    /// Arm `timer`, replacing any pending deadline for the same id.
    fn start_timer(&mut self, timer: TimerId, after: Duration);

    /// Disarm `timer`. Disarming an idle timer is a no-op.
    fn stop_timer(&mut self, timer: TimerId);
}

/// Everything the engine calls out to.
pub trait Platform: Scheduler + Security + HostEvents + Transport + TimerService {}

impl<T> Platform for T where T: Scheduler + Security + HostEvents + Transport + TimerService {}
