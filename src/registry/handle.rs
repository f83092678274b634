//! Entity handles and the host-facing NDP instance id.

use std::fmt;

use crate::core::constants::{INSTANCE_ID_BASE, MAX_NDL, MAX_NDP};

/// Generation-checked reference to a data link slot.
///
/// Handed to collaborators (scheduler permit token, timer ids). A handle whose
/// generation no longer matches its slot refers to a freed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NdlHandle {
    pub(crate) slot: u8,
    pub(crate) generation: u32,
}

impl NdlHandle {
    /// Slot index in the link pool.
    pub fn slot(&self) -> usize {
        self.slot as usize
    }

    /// Allocation generation of the slot.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Slot pair addressing one session inside the pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NdpRef {
    pub ndl: usize,
    pub ndp: usize,
}

impl NdpRef {
    pub fn new(ndl: usize, ndp: usize) -> Self {
        Self { ndl, ndp }
    }
}

/// Globally unique session id exposed to the host.
///
/// Encodes `ndp_id * 100 + ndl_slot * MAX_NDP + ndp_slot`, so the host can
/// address a session without tracking link indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

impl InstanceId {
    /// Build the id of session `ndp_slot` on link `ndl_slot`.
    pub fn encode(ndp_id: u8, ndl_slot: usize, ndp_slot: usize) -> Self {
        let slots = (ndl_slot * MAX_NDP + ndp_slot) as u32;
        Self(u32::from(ndp_id) * INSTANCE_ID_BASE + slots)
    }

    /// Split into `(ndl_slot, ndp_slot, ndp_id)`.
    ///
    /// Returns `None` when a part is out of range. A decoded id still has to
    /// match the stored id of the slot before it is trusted.
    pub fn decode(self) -> Option<(usize, usize, u8)> {
        let slots = (self.0 % INSTANCE_ID_BASE) as usize;
        let ndp_id = u8::try_from(self.0 / INSTANCE_ID_BASE).ok()?;
        let ndl_slot = slots / MAX_NDP;
        let ndp_slot = slots % MAX_NDP;
        if ndp_id == 0 || ndl_slot >= MAX_NDL {
            return None;
        }
        Some((ndl_slot, ndp_slot, ndp_id))
    }

    /// NDP-ID part.
    pub fn ndp_id(self) -> u8 {
        (self.0 / INSTANCE_ID_BASE) as u8
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_layout() {
        let id = InstanceId::encode(7, 1, 3);
        assert_eq!(id.0, 700 + MAX_NDP as u32 + 3);
        assert_eq!(id.ndp_id(), 7);
    }

    #[test]
    fn test_instance_id_roundtrip_all_slots() {
        for ndl in 0..MAX_NDL {
            for ndp in 0..MAX_NDP {
                for ndp_id in [1u8, 42, 255] {
                    let id = InstanceId::encode(ndp_id, ndl, ndp);
                    assert_eq!(id.decode(), Some((ndl, ndp, ndp_id)));
                }
            }
        }
    }

    #[test]
    fn test_instance_id_rejects_garbage() {
        assert_eq!(InstanceId(5).decode(), None);
        assert_eq!(InstanceId(256 * 100).decode(), None);
        assert_eq!(InstanceId(100 + (MAX_NDL * MAX_NDP) as u32).decode(), None);
    }
}
