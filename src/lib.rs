//! Exponential ElGamal tallying core: ballot encryption, OR-composition membership proofs,
//! homomorphic tallying and a stage-gated threshold key ceremony
use crypto_bigint::Uint;

/// Use the same big integer type everywhere
pub const LIMBS: usize = 1024 / 64; // 16 words each 64 bits, a total of 1024 bits
pub type BigInt = Uint<LIMBS>;

pub mod arithmetics;
pub mod ceremony;
pub mod ciphertext;
pub mod config;
pub mod election;
pub mod encoding;
pub mod error;
pub mod keys;
pub mod polynomial;
pub mod proofs;
pub mod rng;
pub mod vote;

pub use arithmetics::ModInt;
pub use ceremony::KeyCeremony;
pub use ciphertext::Ciphertext;
pub use config::CeremonyConfig;
pub use election::{Election, PartialDecryption};
pub use error::{CeremonyError, Error, Result};
pub use keys::{Key, PrivateKey, PrivateKeyShare, PublicKey, PublicKeyShare};
pub use proofs::{Domain, MembershipProof, PendingVoteProof, VoteProof};
pub use vote::Vote;

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for the unit tests
    use crate::{arithmetics::ModInt, keys::Key, BigInt};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    /// 64-bit safe prime, p = 2q + 1 with q prime
    pub const SAFE_PRIME: u64 = 18446744073709550147;

    pub fn rng(seed: u64) -> ChaCha20Rng {
        return ChaCha20Rng::seed_from_u64(seed);
    }

    pub fn small_key(seed: u64) -> Key {
        let p = ModInt::plain(BigInt::from_u64(SAFE_PRIME));
        return Key::from_prime(&mut rng(seed), p).unwrap();
    }
}
