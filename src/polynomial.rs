//! Secret sharing polynomials over Z_q
use crate::{
    arithmetics::ModInt,
    error::{Error, Result},
    BigInt,
};
use crypto_bigint::rand_core::CryptoRngCore;
use std::collections::HashSet;

/// The terms are `coefficients[i] * x^i`, so the constant term is the shared secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polynomial {
    coefficients: Vec<ModInt>,
}

impl Polynomial {
    /// Instantiate from coefficients, lowest degree first, with no check
    pub fn new(coefficients: Vec<ModInt>) -> Self {
        return Self { coefficients };
    }

    /// Sample `degree + 1` coefficients uniformly from Z_q
    pub fn random(rng: &mut impl CryptoRngCore, degree: usize, q: &BigInt) -> Self {
        let coefficients = (0..=degree).map(|_| ModInt::random(rng, q)).collect();
        return Self::new(coefficients);
    }

    pub fn get_coefficients(&self) -> &[ModInt] {
        return &self.coefficients;
    }

    pub fn degree(&self) -> usize {
        return self.coefficients.len().saturating_sub(1);
    }

    /// The value at zero
    pub fn get_secret(&self) -> ModInt {
        return self.coefficients.first().copied().unwrap_or(ModInt::ZERO);
    }

    /// Evaluate with Horner's method. The result lives under the coefficients' modulus.
    pub fn evaluate(&self, x: &ModInt) -> ModInt {
        let mut terms = self.coefficients.iter().rev();
        let Some(leading) = terms.next() else {
            return ModInt::ZERO;
        };
        let mut value = *leading;
        for coefficient in terms {
            value = value * *x + *coefficient;
        }
        return value;
    }
}

/// Lagrange coefficients for interpolating at zero from the given evaluation points:
/// `lambda_i = prod_{j != i} j / (j - i) (mod q)`.
///
/// The points must be non-zero and distinct, and `q` must be prime.
pub fn lagrange_coefficients(indices: &[u64], q: &BigInt) -> Result<Vec<ModInt>> {
    if indices.is_empty() {
        return Err(Error::InvalidShares("no evaluation points".to_string()));
    }
    let mut seen = HashSet::new();
    for &index in indices {
        if index == 0 {
            return Err(Error::InvalidShares("index 0 holds the secret".to_string()));
        }
        if !seen.insert(index) {
            return Err(Error::InvalidShares(format!("index {index} appears twice")));
        }
    }

    let mut coefficients = Vec::with_capacity(indices.len());
    for &i in indices {
        let mut numerator = ModInt::one(q);
        let mut denominator = ModInt::one(q);
        for &j in indices.iter().filter(|&&j| j != i) {
            numerator = numerator * ModInt::from_u64(j);
            denominator = denominator * (ModInt::from_u64(j).modulo(q) - ModInt::from_u64(i));
        }
        coefficients.push(numerator.divide(&denominator)?);
    }
    return Ok(coefficients);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn q() -> BigInt {
        return BigInt::from_u64(testing::SAFE_PRIME).shr_vartime(1);
    }

    #[test]
    fn test_evaluate() {
        // 3 + 2x + x^2 under a small modulus
        let modulus = BigInt::from_u64(101);
        let poly = Polynomial::new(
            [3, 2, 1]
                .iter()
                .map(|&c| ModInt::new(BigInt::from_u64(c), modulus))
                .collect(),
        );
        assert_eq!(poly.degree(), 2);
        assert_eq!(poly.evaluate(&ModInt::from_u64(0)).to_u64(), Some(3));
        assert_eq!(poly.evaluate(&ModInt::from_u64(4)).to_u64(), Some(27));
        assert_eq!(poly.evaluate(&ModInt::from_u64(10)).to_u64(), Some(123 % 101));
        assert_eq!(Polynomial::new(vec![]).evaluate(&ModInt::from_u64(7)), ModInt::ZERO);
    }

    #[test]
    fn test_interpolate_secret() {
        let q = q();
        let mut rng = testing::rng(3);
        let poly = Polynomial::random(&mut rng, 2, &q);
        for indices in [vec![1, 2, 3], vec![2, 4, 5], vec![5, 1, 3, 2]] {
            let lambdas = lagrange_coefficients(&indices, &q).unwrap();
            let secret = indices
                .iter()
                .zip(lambdas)
                .fold(ModInt::zero(&q), |acc, (&i, lambda)| {
                    acc + poly.evaluate(&ModInt::from_u64(i)) * lambda
                });
            assert_eq!(secret, poly.get_secret());
        }
    }

    #[test]
    fn test_single_point_is_identity() {
        let q = q();
        let lambdas = lagrange_coefficients(&[4], &q).unwrap();
        assert_eq!(lambdas, vec![ModInt::one(&q)]);
    }

    #[test]
    fn test_rejects_bad_indices() {
        let q = q();
        assert!(lagrange_coefficients(&[], &q).is_err());
        assert!(lagrange_coefficients(&[0, 1], &q).is_err());
        assert!(lagrange_coefficients(&[1, 2, 1], &q).is_err());
    }
}
