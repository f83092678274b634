//! Fixed-capacity pools of data links and their sessions.
//!
//! The pools only manage slots. Side effects of freeing (host events, timer
//! and security teardown) belong to the engine, which wraps these calls.

use tracing::{debug, error};

use crate::core::constants::PROTOCOL_TYPE_NONE;
use crate::core::{EngineConfig, FailReason, MacAddr, ReasonCode, Role, SetupStatus};
use crate::fsm::{NdlState, NdpState};

use super::handle::{InstanceId, NdlHandle, NdpRef};
use super::ndl::Ndl;
use super::ndp::Ndp;
use super::ndp_id::NdpIdGenerator;

/// Link and session pools.
#[derive(Debug)]
pub(crate) struct Registry {
    ndls: Vec<Ndl>,
    ndl_limit: usize,
    ndp_limit: usize,
    ids: NdpIdGenerator,
}

impl Registry {
    pub fn new(config: &EngineConfig) -> Self {
        let ndl_limit = config.ndl_limit();
        Self {
            ndls: (0..ndl_limit).map(Ndl::empty).collect(),
            ndl_limit,
            ndp_limit: config.ndp_limit(),
            ids: NdpIdGenerator::new(config.random_ndp_id, config.rng_seed),
        }
    }

    pub fn ndl(&self, slot: usize) -> &Ndl {
        &self.ndls[slot]
    }

    pub fn ndl_mut(&mut self, slot: usize) -> &mut Ndl {
        &mut self.ndls[slot]
    }

    pub fn ndp(&self, at: NdpRef) -> &Ndp {
        &self.ndls[at.ndl].ndps[at.ndp]
    }

    pub fn ndp_mut(&mut self, at: NdpRef) -> &mut Ndp {
        &mut self.ndls[at.ndl].ndps[at.ndp]
    }

    /// Slots of the valid links.
    pub fn valid_ndls(&self) -> Vec<usize> {
        self.ndls
            .iter()
            .filter(|ndl| ndl.valid)
            .map(|ndl| ndl.slot)
            .collect()
    }

    /// Slot of the valid link `handle` refers to.
    pub fn resolve(&self, handle: NdlHandle) -> Option<usize> {
        let ndl = self.ndls.get(handle.slot())?;
        (ndl.valid && ndl.generation == handle.generation()).then_some(ndl.slot)
    }

    /// Link whose peer address or one of whose peer NDIs is `mac`.
    pub fn find_ndl_by_mac(&self, mac: MacAddr) -> Option<usize> {
        self.ndls
            .iter()
            .find(|ndl| ndl.valid && ndl.matches_mac(mac))
            .map(|ndl| ndl.slot)
    }

    /// Claim the first free link slot for `peer`.
    ///
    /// Eviction of fast-recovery links is up to the caller, see
    /// [`oldest_fast_recovery`](Self::oldest_fast_recovery).
    pub fn allocate_ndl(&mut self, peer: MacAddr, role: Role) -> Option<usize> {
        let slot = self.ndls.iter().position(|ndl| !ndl.valid)?;
        let generation = self.ndls[slot].generation.wrapping_add(1);
        let seq_num = self.ndls[slot].seq_num;

        let ndl = &mut self.ndls[slot];
        *ndl = Ndl::empty(slot);
        ndl.valid = true;
        ndl.generation = generation;
        ndl.seq_num = seq_num;
        ndl.peer = peer;
        ndl.role = role;

        debug!(peer = %peer, slot, generation, "data link allocated");
        Some(slot)
    }

    /// Fast-recovery link with the smallest nonzero marker.
    pub fn oldest_fast_recovery(&self) -> Option<usize> {
        self.ndls
            .iter()
            .filter(|ndl| ndl.valid && ndl.fast_recovery != 0)
            .min_by_key(|ndl| ndl.fast_recovery)
            .map(|ndl| ndl.slot)
    }

    /// Release link slot `slot`. Sessions must already be freed.
    pub fn release_ndl(&mut self, slot: usize) {
        let ndl = &mut self.ndls[slot];
        if !ndl.valid {
            return;
        }
        debug!(peer = %ndl.peer, slot, "data link released");
        ndl.valid = false;
        ndl.state = NdlState::Idle;
        ndl.last_state = NdlState::Idle;
        ndl.operating = None;
        ndl.pending.flush();
        ndl.fast_recovery = 0;
        ndl.fast_recovery_id = 0;
    }

    /// Claim a session slot on link `ndl`.
    ///
    /// An initiator gets a generated NDP-ID and `ndp_id` is ignored. A
    /// responder keeps the peer's id, which must not already be in use.
    pub fn allocate_ndp(
        &mut self,
        ndl: usize,
        role: Role,
        peer_ndi: MacAddr,
        ndp_id: u8,
        security_required: bool,
    ) -> Option<NdpRef> {
        let ndp_limit = self.ndp_limit;
        let link = &mut self.ndls[ndl];
        if !link.valid {
            return None;
        }
        if role == Role::Responder && (ndp_id == 0 || link.has_ndp_id(ndp_id)) {
            error!(peer = %link.peer, ndp_id, "NDP-ID already in use");
            return None;
        }
        let Some(slot) = link.ndps[..ndp_limit].iter().position(|ndp| !ndp.valid) else {
            error!(peer = %link.peer, "no free data path slot");
            return None;
        };

        let ndp_id = match role {
            Role::Initiator => self.ids.next(link)?,
            Role::Responder => ndp_id,
        };

        let generation = link.ndps[slot].generation.wrapping_add(1);
        let ndp = &mut link.ndps[slot];
        *ndp = Ndp::empty();
        ndp.valid = true;
        ndp.generation = generation;
        ndp.ndp_id = ndp_id;
        ndp.instance_id = InstanceId::encode(ndp_id, ndl, slot);
        ndp.role = role;
        ndp.peer_ndi = peer_ndi;
        ndp.security_required = security_required;
        ndp.setup_status = SetupStatus::Continued;
        ndp.reason = ReasonCode::Reserved;
        ndp.fail_reason = FailReason::None;
        ndp.protocol = PROTOCOL_TYPE_NONE;
        ndp.state = NdpState::Idle;
        link.ndp_count += 1;

        debug!(peer = %link.peer, ndp_id, slot, ?role, "data path allocated");
        Some(NdpRef::new(ndl, slot))
    }

    /// Release session `at`. Releasing a free slot is a no-op.
    pub fn release_ndp(&mut self, at: NdpRef) {
        let link = &mut self.ndls[at.ndl];
        if !link.ndps[at.ndp].valid {
            return;
        }
        link.unroll_context(at.ndp);
        if link.operating == Some(at.ndp) {
            link.operating = None;
        }
        link.pending.remove_ndp(at.ndp);

        let ndp = &mut link.ndps[at.ndp];
        debug!(ndp_id = ndp.ndp_id, slot = at.ndp, "data path released");
        ndp.valid = false;
        ndp.state = NdpState::Idle;
        ndp.retry_frame = None;
        ndp.app_info.clear();
        ndp.peer_app_info.clear();
        ndp.pmk = None;
        link.ndp_count = link.ndp_count.saturating_sub(1);
    }

    /// Session with `ndp_id` on the valid link `ndl`.
    pub fn find_ndp_by_id(&self, ndl: usize, ndp_id: u8) -> Option<NdpRef> {
        let link = self.ndls.get(ndl).filter(|link| link.valid)?;
        link.find_ndp(ndp_id).map(|ndp| NdpRef::new(ndl, ndp))
    }

    /// Session addressed by a host instance id.
    pub fn find_ndp_by_instance_id(&self, id: InstanceId) -> Option<NdpRef> {
        let (ndl, ndp, _) = id.decode()?;
        let link = self.ndls.get(ndl).filter(|link| link.valid)?;
        let session = link.ndps.get(ndp).filter(|s| s.valid)?;
        (session.instance_id == id).then_some(NdpRef::new(ndl, ndp))
    }

    /// First session with `ndp_id` on any link.
    pub fn find_ndp_by_id_only(&self, ndp_id: u8) -> Option<NdpRef> {
        self.ndls
            .iter()
            .filter(|link| link.valid)
            .find_map(|link| {
                link.find_ndp(ndp_id)
                    .map(|ndp| NdpRef::new(link.slot, ndp))
            })
    }

    /// Generation of session slot `at`, valid or not.
    pub fn ndp_generation(&self, at: NdpRef) -> u32 {
        self.ndls[at.ndl].ndps[at.ndp].generation
    }

    pub fn ndl_limit(&self) -> usize {
        self.ndl_limit
    }
}
