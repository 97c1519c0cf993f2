//! Non-interactive zero-knowledge proofs that ballots are well formed. There are two layers:
//!
//! - [`MembershipProof`]: one ciphertext encrypts some value of a public [`Domain`]
//! - [`VoteProof`]: every slot of a ballot is 0 or 1, and the number of selections lies within
//!   the allowed range
pub mod membership;
pub mod vote;

pub use membership::MembershipProof;
pub use vote::{PendingVoteProof, VoteProof};

use crate::arithmetics::ModInt;

/// The ordered list of plaintexts a membership proof ranges over. The order is part of the
/// proof's hash input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain(Vec<ModInt>);

impl Domain {
    /// Values are stored as plain integers
    pub fn new(values: Vec<ModInt>) -> Self {
        return Self(values.iter().map(|value| ModInt::plain(*value.get_value())).collect());
    }

    /// `{0, 1}`
    pub fn binary() -> Self {
        return Self::range(0, 1);
    }

    /// Every integer from `min` to `max`, both ends included. Empty when `min > max`.
    pub fn range(min: u64, max: u64) -> Self {
        return Self((min..=max).map(ModInt::from_u64).collect());
    }

    pub fn len(&self) -> usize {
        return self.0.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.0.is_empty();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModInt> {
        return self.0.iter();
    }

    /// Position of the value, compared by representative
    pub fn position(&self, value: &ModInt) -> Option<usize> {
        return self
            .0
            .iter()
            .position(|member| member.get_value() == value.get_value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BigInt;

    #[test]
    fn test_domains() {
        assert_eq!(Domain::binary().len(), 2);
        assert_eq!(Domain::range(2, 5).len(), 4);
        assert!(Domain::range(3, 2).is_empty());

        let domain = Domain::range(2, 5);
        let four = ModInt::new(BigInt::from_u64(4), BigInt::from_u64(11));
        assert_eq!(domain.position(&four), Some(2));
        assert_eq!(domain.position(&ModInt::from_u64(6)), None);

        let reordered = Domain::new(vec![ModInt::from_u64(1), ModInt::from_u64(0)]);
        assert_ne!(reordered, Domain::binary());
        assert_eq!(reordered.position(&ModInt::ZERO), Some(1));
    }
}
