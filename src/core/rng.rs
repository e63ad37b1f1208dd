//! Match-scoped deterministic random source
//!
//! Every random decision in a match (signal fabrication, cover detection,
//! combat variance) is drawn from a stream derived from the match seed and
//! a context key. Streams never share state, so evaluating two regions or
//! two sides in a different order cannot change what either one draws.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::types::Turn;

/// Randomness domains; each gets independent streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Detection rolls against units in cover
    Detection,
    /// Fabricated-versus-stale decisions and fabricated payloads
    Deception,
    /// Combat variance rolls
    Combat,
}

impl Stream {
    fn tag(self) -> u64 {
        match self {
            Self::Detection => 0x11,
            Self::Deception => 0x23,
            Self::Combat => 0x37,
        }
    }
}

/// The single seeded random source of a match.
///
/// Holds only the seed; per-context generators are derived on demand, which
/// keeps the match state cloneable and comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRng {
    seed: u64,
}

impl MatchRng {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive the generator for one (domain, turn, subject) context.
    ///
    /// The same context always yields the same sequence for the same seed.
    pub fn stream(&self, stream: Stream, turn: Turn, subject: u64) -> ChaCha8Rng {
        let mut h = mix(self.seed ^ stream.tag());
        h = mix(h ^ u64::from(turn));
        h = mix(h ^ subject);
        ChaCha8Rng::seed_from_u64(h)
    }
}

/// SplitMix64 finalizer
fn mix(mut h: u64) -> u64 {
    h = h.wrapping_add(0x9E37_79B9_7F4A_7C15);
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^ (h >> 31)
}
