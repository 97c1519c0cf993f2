//! Collecting ballots and tallying them without decrypting any single one.
//!
//! Tallying runs in three steps. [`Election::sum_votes`] multiplies all cast ballots together,
//! which encrypts the per-candidate totals. Each authority then partially decrypts the sum
//! with its share, and the coordinator combines the partials and searches for the totals.
use crate::{
    arithmetics::{bounded_discrete_log, ModInt},
    error::{Error, Result},
    keys::PublicKey,
    polynomial::lagrange_coefficients,
    proofs::PendingVoteProof,
    vote::Vote,
};
use crypto_bigint::rand_core::CryptoRngCore;
use log::error;

/// The partial decryptions one authority computed for every slot of the summed vote, tagged
/// with the authority's share index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDecryption {
    pub index: u64,
    pub values: Vec<ModInt>,
}

impl PartialDecryption {
    pub fn new(index: u64, values: Vec<ModInt>) -> Self {
        return Self { index, values };
    }
}

#[derive(Debug, Clone)]
pub struct Election {
    public_key: PublicKey,
    choices: Vec<String>,
    votes: Vec<Vote>,
}

impl Election {
    pub fn new(public_key: PublicKey, choices: Vec<String>) -> Self {
        return Self {
            public_key,
            choices,
            votes: vec![],
        };
    }

    pub fn get_public_key(&self) -> &PublicKey {
        return &self.public_key;
    }

    pub fn get_choices(&self) -> &[String] {
        return &self.choices;
    }

    pub fn get_votes(&self) -> &[Vote] {
        return &self.votes;
    }

    /// Append a ballot. It must hold one ciphertext per candidate. Proofs are not checked here.
    pub fn cast_vote(&mut self, vote: Vote) -> Result<()> {
        if vote.get_ciphertexts().len() != self.choices.len() {
            return Err(Error::LengthMismatch {
                expected: self.choices.len(),
                found: vote.get_ciphertexts().len(),
            });
        }
        self.votes.push(vote);
        return Ok(());
    }

    /// Multiply all cast ballots together and prove that the combined selections, opened with
    /// the combined randomness, lie in `[0, ballots cast]`. The ballots' own slot proofs are
    /// carried along.
    pub fn sum_votes(&self, rng: &mut impl CryptoRngCore) -> Result<Vote> {
        if self.votes.is_empty() {
            return Err(Error::NoVotes);
        }
        let mut sum = Vote::identity(self.public_key.get_key().get_p(), &self.choices);
        let mut pending = PendingVoteProof::new();
        for vote in &self.votes {
            sum = sum.multiply(vote)?;
            if let Some(proof) = vote.get_proof() {
                pending = pending.combine(proof);
            }
        }
        let total = self.votes.len() as u64;
        let proof = pending.finalize(rng, &sum, &self.public_key, total)?;
        return Ok(sum.with_proof(proof));
    }

    /// Combine the partial decryptions of at least a threshold of distinct authorities into
    /// `h^r` for every slot: `prod_i partial_i^(lambda_i)` with Lagrange coefficients over the
    /// share indices.
    pub fn combine_partial_decryptions(&self, shares: &[PartialDecryption]) -> Result<Vec<ModInt>> {
        let key = self.public_key.get_key();
        let indices: Vec<u64> = shares.iter().map(|share| share.index).collect();
        let lambdas = lagrange_coefficients(&indices, key.get_q())?;

        let slots = shares.first().map(|share| share.values.len()).unwrap_or(0);
        if let Some(share) = shares.iter().find(|share| share.values.len() != slots) {
            return Err(Error::LengthMismatch {
                expected: slots,
                found: share.values.len(),
            });
        }

        let mut combined = vec![ModInt::one(key.get_p()); slots];
        for (share, lambda) in shares.iter().zip(&lambdas) {
            for (slot, value) in combined.iter_mut().zip(&share.values) {
                *slot = *slot * value.pow(lambda);
            }
        }
        return Ok(combined);
    }

    /// Recover each candidate's total from `H / h^r = f^total` by searching `0..=votes cast`
    pub fn resolve_final_sum(
        &self,
        partials: &[ModInt],
        summed: &Vote,
        key: &PublicKey,
    ) -> Result<Vec<u64>> {
        let ciphertexts = summed.get_ciphertexts();
        if partials.len() != ciphertexts.len() {
            return Err(Error::LengthMismatch {
                expected: ciphertexts.len(),
                found: partials.len(),
            });
        }
        let bound = self.votes.len() as u64;
        let f = key.get_key().get_f();
        let mut totals = Vec::with_capacity(partials.len());
        for (ciphertext, partial) in ciphertexts.iter().zip(partials) {
            let target = ciphertext.get_h().divide(partial)?;
            match bounded_discrete_log(f, &target, bound) {
                Some(total) => totals.push(total),
                None => {
                    error!("no total up to {bound} matches {target}");
                    return Err(Error::SearchSpaceExhausted {
                        target: target.to_string(),
                        bound,
                    });
                }
            }
        }
        return Ok(totals);
    }
}
