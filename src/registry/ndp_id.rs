//! NDP-ID generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::ndl::Ndl;

/// Hands out NDP-IDs for initiator sessions.
///
/// Sequential mode counts per link from the link's last id. Random mode draws
/// from one engine-wide sequence. Zero is never returned and an id already
/// used by a valid session on the link is skipped.
#[derive(Debug)]
pub(crate) struct NdpIdGenerator {
    random: bool,
    seed: u8,
    rng: StdRng,
}

impl NdpIdGenerator {
    pub fn new(random: bool, rng_seed: Option<u64>) -> Self {
        let mut rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let seed = rng.gen_range(1..=u8::MAX);
        Self { random, seed, rng }
    }

    /// Next free id on `ndl`.
    ///
    /// Returns `None` only when all 255 ids are taken, which the session
    /// capacity rules out in practice.
    pub fn next(&mut self, ndl: &mut Ndl) -> Option<u8> {
        for _ in 0..=u8::MAX as usize {
            let candidate = if self.random {
                self.next_random()
            } else {
                ndl.seq_num = if ndl.seq_num < u8::MAX {
                    ndl.seq_num + 1
                } else {
                    1
                };
                ndl.seq_num
            };

            if !ndl.has_ndp_id(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn next_random(&mut self) -> u8 {
        if self.seed < u8::MAX {
            self.seed += 1;
        } else {
            self.seed = self.rng.gen_range(1..=u8::MAX);
        }
        self.seed
    }
}
