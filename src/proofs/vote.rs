//! Ballot-level validity: each slot encrypts 0 or 1, and the number of selections is within
//! the race's bounds.
use crate::{
    arithmetics::{bounded_discrete_log, ModInt},
    ciphertext::Ciphertext,
    encoding::{
        sexpr::{decode_all, encode_all, expect_labeled, FromSExpr, SExpr, ToSExpr},
        text::words,
    },
    error::{Error, Result},
    keys::PublicKey,
    proofs::{Domain, MembershipProof},
    vote::Vote,
};
use crypto_bigint::rand_core::CryptoRngCore;
use log::warn;
use std::fmt;
use std::str::FromStr;

pub const VOTE_PROOF_LABEL: &str = "vote-proof";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteProof {
    /// Proves that the product of all slots encrypts an allowed selection count
    sum_proof: MembershipProof,

    /// One `{0, 1}` proof per slot
    proofs: Vec<MembershipProof>,
}

/// Product of a vote's ciphertexts, which encrypts its selection count
fn sum_cipher(vote: &Vote, key: &PublicKey) -> Result<Ciphertext> {
    let identity = Ciphertext::identity(key.get_key().get_p());
    return vote
        .get_ciphertexts()
        .iter()
        .try_fold(identity, |sum, ciphertext| sum.multiply(ciphertext));
}

/// The count behind a product whose randomness is known: `H / h^r = f^count`, searched up to
/// `bound`
fn open_count(sum: &Ciphertext, key: &PublicKey, bound: u64) -> Result<u64> {
    let r = sum.get_r().ok_or(Error::MissingRandomness)?;
    let p = key.get_key().get_p();
    let target = sum.get_h().modulo(p).divide(&key.require_h()?.pow(r))?;
    return bounded_discrete_log(key.get_key().get_f(), &target, bound).ok_or(Error::NotInDomain);
}

impl VoteProof {
    pub fn new(sum_proof: MembershipProof, proofs: Vec<MembershipProof>) -> Self {
        return Self { sum_proof, proofs };
    }

    pub fn get_sum_proof(&self) -> &MembershipProof {
        return &self.sum_proof;
    }

    pub fn get_proofs(&self) -> &[MembershipProof] {
        return &self.proofs;
    }

    /// Prove a freshly encrypted ballot. `selections` are the plaintexts behind the vote's
    /// ciphertexts, which must still carry their randomness.
    pub fn compute(
        rng: &mut impl CryptoRngCore,
        vote: &Vote,
        key: &PublicKey,
        selections: &[ModInt],
        min: u64,
        max: u64,
    ) -> Result<Self> {
        let ciphertexts = vote.get_ciphertexts();
        if selections.len() != ciphertexts.len() {
            return Err(Error::LengthMismatch {
                expected: ciphertexts.len(),
                found: selections.len(),
            });
        }

        let binary = Domain::binary();
        let mut proofs = Vec::with_capacity(ciphertexts.len());
        let mut count: u64 = 0;
        for (ciphertext, selection) in ciphertexts.iter().zip(selections) {
            proofs.push(MembershipProof::compute(rng, ciphertext, key, selection, &binary)?);
            if selection.get_value() == ModInt::ONE.get_value() {
                count += 1;
            }
        }

        let sum = sum_cipher(vote, key)?;
        let sum_proof =
            MembershipProof::compute(rng, &sum, key, &ModInt::from_u64(count), &Domain::range(min, max))?;
        return Ok(Self::new(sum_proof, proofs));
    }

    /// Check every slot against `{0, 1}` and the recomputed product against `[min, max]`
    pub fn verify(&self, vote: &Vote, key: &PublicKey, min: u64, max: u64) -> bool {
        let ciphertexts = vote.get_ciphertexts();
        if self.proofs.len() != ciphertexts.len() {
            warn!(
                "vote proof covers {} slots, vote has {}",
                self.proofs.len(),
                ciphertexts.len()
            );
            return false;
        }
        let binary = Domain::binary();
        for (i, (proof, ciphertext)) in self.proofs.iter().zip(ciphertexts).enumerate() {
            if !proof.verify(ciphertext, key, &binary) {
                warn!("slot {i} is not provably 0 or 1");
                return false;
            }
        }
        if !self.verify_range(vote, key, min, max) {
            warn!("selection count is not provably within {min}..={max}");
            return false;
        }
        return true;
    }

    /// Check the sum proof of a tallied vote against `[0, total]`. The per-slot proofs are
    /// not examined.
    pub fn verify_sum(&self, vote: &Vote, key: &PublicKey, total: u64) -> bool {
        return self.verify_range(vote, key, 0, total);
    }

    fn verify_range(&self, vote: &Vote, key: &PublicKey, min: u64, max: u64) -> bool {
        let Ok(sum) = sum_cipher(vote, key) else {
            return false;
        };
        return self.sum_proof.verify(&sum, key, &Domain::range(min, max));
    }

    /// Start accumulating the per-slot proofs of several ballots. The result has no sum proof
    /// until it is finalized against the combined vote.
    pub fn combine(a: &VoteProof, b: &VoteProof) -> PendingVoteProof {
        return PendingVoteProof::new().combine(a).combine(b);
    }
}

/// Accumulated per-slot proofs waiting for a sum proof
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingVoteProof {
    proofs: Vec<MembershipProof>,
}

impl PendingVoteProof {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn combine(mut self, other: &VoteProof) -> Self {
        self.proofs.extend(other.proofs.iter().cloned());
        return self;
    }

    pub fn get_proofs(&self) -> &[MembershipProof] {
        return &self.proofs;
    }

    /// Prove that the combined vote's selections add up to a count in `[0, total]`. The count
    /// is opened with the combined randomness, so every slot must still carry its own; a count
    /// above `total` is `NotInDomain`.
    pub fn finalize(
        self,
        rng: &mut impl CryptoRngCore,
        vote: &Vote,
        key: &PublicKey,
        total: u64,
    ) -> Result<VoteProof> {
        let sum = sum_cipher(vote, key)?;
        let count = open_count(&sum, key, total)?;
        let sum_proof = MembershipProof::compute(
            rng,
            &sum,
            key,
            &ModInt::from_u64(count),
            &Domain::range(0, total),
        )?;
        return Ok(VoteProof::new(sum_proof, self.proofs));
    }
}

impl fmt::Display for VoteProof {
    /// The sum proof, then each slot proof, separated by spaces
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sum_proof)?;
        for proof in &self.proofs {
            write!(f, " {proof}")?;
        }
        return Ok(());
    }
}

impl FromStr for VoteProof {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut encodings = words(s);
        let sum_proof = encodings
            .next()
            .ok_or_else(|| Error::parse("vote proof", "missing sum proof"))?
            .parse()?;
        let proofs = encodings
            .map(str::parse)
            .collect::<Result<Vec<MembershipProof>>>()?;
        return Ok(Self::new(sum_proof, proofs));
    }
}

impl ToSExpr for VoteProof {
    fn to_sexpr(&self) -> SExpr {
        return SExpr::List(vec![
            SExpr::atom(VOTE_PROOF_LABEL),
            self.sum_proof.to_sexpr(),
            encode_all(&self.proofs),
        ]);
    }
}

impl FromSExpr for VoteProof {
    fn from_sexpr(expr: &SExpr) -> Result<Self> {
        let items = expect_labeled(expr, "vote proof", VOTE_PROOF_LABEL, &[3])?;
        let sum_proof = MembershipProof::from_sexpr(&items[1])?;
        let proofs = decode_all(&items[2], "vote proof")?;
        return Ok(Self::new(sum_proof, proofs));
    }
}
