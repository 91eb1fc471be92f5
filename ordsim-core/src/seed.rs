//! Seeded random streams for the stochastic stages.
//!
//! One user-visible seed fans out into domain-separated streams so that
//! adding or removing a stage never shifts the draws of another.

use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;

/// Generator type used by every stochastic stage.
pub type SimRng = ChaCha20Rng;

const REALLOCATION_TAG: &[u8] = b"reallocation";
const MISSINGNESS_TAG: &[u8] = b"missingness";

/// Derive a stream seed from the user seed and a domain tag.
#[must_use]
pub fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> [u8; 32] {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);
    seed
}

/// Independent generators for each stochastic stage, derived from one seed.
#[derive(Debug, Clone)]
pub struct RngStreams {
    seed: u64,
}

impl RngStreams {
    #[must_use]
    pub const fn from_user_seed(seed: u64) -> Self {
        Self { seed }
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Generator for treatment reallocation draws.
    #[must_use]
    pub fn reallocation(&self) -> SimRng {
        SimRng::from_seed(derive_stream_seed(self.seed, REALLOCATION_TAG))
    }

    /// Generator for missingness draws.
    #[must_use]
    pub fn missingness(&self) -> SimRng {
        SimRng::from_seed(derive_stream_seed(self.seed, MISSINGNESS_TAG))
    }
}
