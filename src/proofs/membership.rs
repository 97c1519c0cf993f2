//! Proof that an ElGamal ciphertext encrypts one member of a public domain, without revealing
//! which one.
//!
//! This is the disjunctive (OR) composition of Chaum-Pedersen proofs made non-interactive with
//! the Fiat-Shamir transform. For every domain value `d_i` the prover publishes commitments
//! `y_i = g^(s_i) G^(-c_i)` and `z_i = h^(s_i) (H / f^(d_i))^(-c_i)`. All branches but the real one
//! are simulated with random `(s_i, c_i)`; the real branch is forced to satisfy
//! `sum(c_i) = hash(g, h, G, H, y_0, z_0, ...)`, which is only possible with knowledge of `r`.
use crate::{
    arithmetics::ModInt,
    ciphertext::Ciphertext,
    encoding::{
        sexpr::{decode_all, encode_all, expect_labeled, FromSExpr, SExpr, ToSExpr},
        text::TokenStream,
    },
    error::{Error, Result},
    keys::{expect_group_prime, PublicKey},
    proofs::Domain,
    BigInt,
};
use crypto_bigint::rand_core::CryptoRngCore;
use digest::Digest;
use log::trace;
use sha1::Sha1;
use std::fmt;
use std::str::FromStr;

pub const PROOF_LABEL: &str = "membership-proof";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipProof {
    p: BigInt,
    q: BigInt,

    /// Commitments, one per domain value, under p
    y: Vec<ModInt>,
    z: Vec<ModInt>,

    /// Responses and challenges, one per domain value, under q
    s: Vec<ModInt>,
    c: Vec<ModInt>,
}

/// The group elements every branch is checked against
struct Statement {
    g: ModInt,
    h: ModInt,
    f: ModInt,
    big_g: ModInt,
    big_h: ModInt,
}

impl Statement {
    fn new(ciphertext: &Ciphertext, key: &PublicKey) -> Result<Self> {
        let p = key.get_key().get_p();
        return Ok(Self {
            g: *key.get_key().get_g(),
            h: *key.require_h()?,
            f: *key.get_key().get_f(),
            big_g: ciphertext.get_g().modulo(p),
            big_h: ciphertext.get_h().modulo(p),
        });
    }

    /// Whether `(G, H) = (g^r, h^r f^m)`
    fn opens_to(&self, r: &ModInt, m: &ModInt) -> bool {
        return self.big_g == self.g.pow(r) && self.big_h == self.h.pow(r) * self.f.pow(m);
    }

    /// `(g^s G^(-c), h^s (H / f^d)^(-c))`
    fn commitments(&self, d: &ModInt, s: &ModInt, c: &ModInt) -> Result<(ModInt, ModInt)> {
        let neg_c = c.negate();
        let shifted = self.big_h.divide(&self.f.pow(d))?;
        let y = self.g.pow(s) * self.big_g.pow(&neg_c);
        let z = self.h.pow(s) * shifted.pow(&neg_c);
        return Ok((y, z));
    }

    /// SHA-1 over the decimal strings of `g, h, G, H` followed by the interleaved commitments,
    /// read as a big-endian integer mod q
    fn challenge(&self, y: &[ModInt], z: &[ModInt], q: &BigInt) -> Result<ModInt> {
        let mut hasher = Sha1::new();
        for value in [&self.g, &self.h, &self.big_g, &self.big_h] {
            hasher.update(value.to_string().as_bytes());
        }
        for (y, z) in y.iter().zip(z) {
            hasher.update(y.to_string().as_bytes());
            hasher.update(z.to_string().as_bytes());
        }
        let hash: Vec<u8> = hasher.finalize().to_vec();
        trace!("membership proof challenge {}", hex::encode(&hash));
        return Ok(ModInt::from_be_bytes(&hash)?.modulo(q));
    }
}

impl MembershipProof {
    /// Instantiate an instance with no check
    pub fn new(p: BigInt, y: Vec<ModInt>, z: Vec<ModInt>, s: Vec<ModInt>, c: Vec<ModInt>) -> Self {
        let q = p.shr_vartime(1);
        return Self {
            p,
            q,
            y: y.iter().map(|value| value.modulo(&p)).collect(),
            z: z.iter().map(|value| value.modulo(&p)).collect(),
            s: s.iter().map(|value| value.modulo(&q)).collect(),
            c: c.iter().map(|value| value.modulo(&q)).collect(),
        };
    }

    /// Prove that `ciphertext` encrypts `m` and that `m` is in the domain. The ciphertext must
    /// still carry its encryption randomness, and `(r, m)` must open it.
    pub fn compute(
        rng: &mut impl CryptoRngCore,
        ciphertext: &Ciphertext,
        key: &PublicKey,
        m: &ModInt,
        domain: &Domain,
    ) -> Result<Self> {
        let real = domain.position(m).ok_or(Error::NotInDomain)?;
        let r = *ciphertext.get_r().ok_or(Error::MissingRandomness)?;
        let statement = Statement::new(ciphertext, key)?;
        if !statement.opens_to(&r, m) {
            return Err(Error::WitnessMismatch);
        }
        let p = *key.get_key().get_p();
        let q = *key.get_key().get_q();

        let t = ModInt::random(rng, &q);
        let (mut y, mut z, mut s, mut c) = (vec![], vec![], vec![], vec![]);
        for (i, d) in domain.iter().enumerate() {
            if i == real {
                y.push(statement.g.pow(&t));
                z.push(statement.h.pow(&t));
                s.push(ModInt::zero(&q));
                c.push(ModInt::zero(&q));
                continue;
            }
            let fake_s = ModInt::random(rng, &q);
            let fake_c = ModInt::random(rng, &q);
            let (fake_y, fake_z) = statement.commitments(d, &fake_s, &fake_c)?;
            y.push(fake_y);
            z.push(fake_z);
            s.push(fake_s);
            c.push(fake_c);
        }

        let challenge = statement.challenge(&y, &z, &q)?;
        let real_c = c.iter().fold(challenge, |acc, fake| acc - *fake);
        s[real] = real_c * r.modulo(&q) + t;
        c[real] = real_c;
        return Ok(Self::new(p, y, z, s, c));
    }

    /// Check the proof against the ciphertext, the public key and the domain. No secret is
    /// needed. The recomputed commitments must match the published ones, and the challenges
    /// must add up to the hash of the recomputed transcript.
    pub fn verify(&self, ciphertext: &Ciphertext, key: &PublicKey, domain: &Domain) -> bool {
        let size = domain.len();
        if [self.y.len(), self.z.len(), self.s.len(), self.c.len()]
            .iter()
            .any(|&len| len != size)
        {
            return false;
        }
        if self.p != *key.get_key().get_p() {
            return false;
        }
        let Ok(statement) = Statement::new(ciphertext, key) else {
            return false;
        };

        let mut y = Vec::with_capacity(size);
        let mut z = Vec::with_capacity(size);
        for (i, d) in domain.iter().enumerate() {
            let Ok((expected_y, expected_z)) = statement.commitments(d, &self.s[i], &self.c[i])
            else {
                return false;
            };
            if expected_y != self.y[i] || expected_z != self.z[i] {
                return false;
            }
            y.push(expected_y);
            z.push(expected_z);
        }

        let Ok(challenge) = statement.challenge(&y, &z, &self.q) else {
            return false;
        };
        let sum = self
            .c
            .iter()
            .fold(ModInt::zero(&self.q), |acc, c| acc + *c);
        return sum == challenge;
    }

    pub fn get_p(&self) -> &BigInt {
        return &self.p;
    }

    pub fn get_y(&self) -> &[ModInt] {
        return &self.y;
    }

    pub fn get_z(&self) -> &[ModInt] {
        return &self.z;
    }

    pub fn get_s(&self) -> &[ModInt] {
        return &self.s;
    }

    pub fn get_c(&self) -> &[ModInt] {
        return &self.c;
    }
}

impl fmt::Display for MembershipProof {
    /// `p<p>` followed by all `y`, all `z`, all `s` and all `c`, each value behind its tag
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", ModInt::plain(self.p))?;
        for (tag, values) in [("y", &self.y), ("z", &self.z), ("s", &self.s), ("c", &self.c)] {
            for value in values {
                write!(f, "{tag}{value}")?;
            }
        }
        return Ok(());
    }
}

impl FromStr for MembershipProof {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut stream = TokenStream::new(s, "pyzsc", "membership proof");
        if stream.len() < 2 || (stream.len() - 2) % 8 != 0 {
            return Err(stream.error(format!("unexpected token count {}", stream.len())));
        }
        let size = (stream.len() - 2) / 8;
        let p = stream.tagged("p", &BigInt::ZERO)?;
        let p = expect_group_prime(&p, "membership proof")?;
        let q = p.shr_vartime(1);

        let mut columns: [Vec<ModInt>; 4] = Default::default();
        for (column, (tag, modulus)) in columns
            .iter_mut()
            .zip([("y", p), ("z", p), ("s", q), ("c", q)])
        {
            for _ in 0..size {
                column.push(stream.tagged(tag, &modulus)?);
            }
        }
        stream.finish()?;
        let [y, z, s, c] = columns;
        return Ok(Self::new(p, y, z, s, c));
    }
}

impl ToSExpr for MembershipProof {
    fn to_sexpr(&self) -> SExpr {
        return SExpr::List(vec![
            SExpr::atom(PROOF_LABEL),
            ModInt::plain(self.p).to_sexpr(),
            encode_all(&self.y),
            encode_all(&self.z),
            encode_all(&self.s),
            encode_all(&self.c),
        ]);
    }
}

impl FromSExpr for MembershipProof {
    fn from_sexpr(expr: &SExpr) -> Result<Self> {
        let kind = "membership proof";
        let items = expect_labeled(expr, kind, PROOF_LABEL, &[6])?;
        let p = ModInt::from_sexpr(&items[1])?;
        let p = expect_group_prime(&p, kind)?;
        return Ok(Self::new(
            p,
            decode_all(&items[2], kind)?,
            decode_all(&items[3], kind)?,
            decode_all(&items[4], kind)?,
            decode_all(&items[5], kind)?,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn setup(seed: u64) -> (PublicKey, rand_chacha::ChaCha20Rng) {
        let key = testing::small_key(seed);
        let mut rng = testing::rng(seed + 100);
        let (pk, _) = key.gen_key_pair(&mut rng);
        return (pk, rng);
    }

    #[test]
    fn test_correctness() {
        let (pk, mut rng) = setup(30);
        let domain = Domain::range(0, 4);
        for m in 0..=4 {
            let m = ModInt::from_u64(m);
            let ciphertext = pk.encrypt(&mut rng, &m).unwrap();
            let proof = MembershipProof::compute(&mut rng, &ciphertext, &pk, &m, &domain).unwrap();
            assert!(proof.verify(&ciphertext, &pk, &domain));
        }
    }

    #[test]
    fn test_compute_errors() {
        let (pk, mut rng) = setup(31);
        let ciphertext = pk.encrypt(&mut rng, &ModInt::from_u64(2)).unwrap();
        assert!(matches!(
            MembershipProof::compute(&mut rng, &ciphertext, &pk, &ModInt::from_u64(2), &Domain::binary()),
            Err(Error::NotInDomain)
        ));

        let stripped: Ciphertext = ciphertext.to_string().parse().unwrap();
        assert!(matches!(
            MembershipProof::compute(&mut rng, &stripped, &pk, &ModInt::from_u64(2), &Domain::range(0, 2)),
            Err(Error::MissingRandomness)
        ));

        let no_h = PublicKey::new(*pk.get_key(), None);
        assert!(matches!(
            MembershipProof::compute(&mut rng, &ciphertext, &no_h, &ModInt::from_u64(2), &Domain::range(0, 2)),
            Err(Error::MissingPublicValue)
        ));
    }

    #[test]
    fn test_lying_prover_fails() {
        // the ciphertext holds 2; claiming 1 out of {0, 1} is refused outright
        let (pk, mut rng) = setup(32);
        let domain = Domain::binary();
        let one = pk.encrypt(&mut rng, &ModInt::ONE).unwrap();
        let two = one.multiply(&pk.encrypt(&mut rng, &ModInt::ONE).unwrap()).unwrap();
        assert!(matches!(
            MembershipProof::compute(&mut rng, &two, &pk, &ModInt::ONE, &domain),
            Err(Error::WitnessMismatch)
        ));

        // a valid proof for another ciphertext does not carry over
        let proof = MembershipProof::compute(&mut rng, &one, &pk, &ModInt::ONE, &domain).unwrap();
        assert!(proof.verify(&one, &pk, &domain));
        assert!(!proof.verify(&two, &pk, &domain));
    }

    #[test]
    fn test_witness_must_open_ciphertext() {
        let (pk, mut rng) = setup(36);
        let domain = Domain::range(0, 3);
        let ciphertext = pk.encrypt(&mut rng, &ModInt::from_u64(2)).unwrap();
        for m in [0, 1, 3] {
            assert!(matches!(
                MembershipProof::compute(&mut rng, &ciphertext, &pk, &ModInt::from_u64(m), &domain),
                Err(Error::WitnessMismatch)
            ));
        }

        let r = *ciphertext.get_r().unwrap();
        let wrong_r = ciphertext.clone().with_randomness(r + ModInt::ONE);
        assert!(matches!(
            MembershipProof::compute(&mut rng, &wrong_r, &pk, &ModInt::from_u64(2), &domain),
            Err(Error::WitnessMismatch)
        ));

        let (other_pk, _) = pk.get_key().gen_key_pair(&mut rng);
        assert!(matches!(
            MembershipProof::compute(&mut rng, &ciphertext, &other_pk, &ModInt::from_u64(2), &domain),
            Err(Error::WitnessMismatch)
        ));
    }

    #[test]
    fn test_tampering_fails() {
        let (pk, mut rng) = setup(33);
        let domain = Domain::binary();
        let ciphertext = pk.encrypt(&mut rng, &ModInt::ONE).unwrap();
        let proof = MembershipProof::compute(&mut rng, &ciphertext, &pk, &ModInt::ONE, &domain).unwrap();
        assert!(proof.verify(&ciphertext, &pk, &domain));

        let bump = |values: &[ModInt], i: usize| -> Vec<ModInt> {
            let mut values = values.to_vec();
            values[i] = values[i] + ModInt::ONE;
            return values;
        };
        let p = *proof.get_p();
        for i in 0..domain.len() {
            let (y, z, s, c) = (proof.get_y(), proof.get_z(), proof.get_s(), proof.get_c());
            let tampered = [
                MembershipProof::new(p, bump(y, i), z.to_vec(), s.to_vec(), c.to_vec()),
                MembershipProof::new(p, y.to_vec(), bump(z, i), s.to_vec(), c.to_vec()),
                MembershipProof::new(p, y.to_vec(), z.to_vec(), bump(s, i), c.to_vec()),
                MembershipProof::new(p, y.to_vec(), z.to_vec(), s.to_vec(), bump(c, i)),
            ];
            for proof in tampered {
                assert!(!proof.verify(&ciphertext, &pk, &domain));
            }
        }

        let other = pk.encrypt(&mut rng, &ModInt::ONE).unwrap();
        assert!(!proof.verify(&other, &pk, &domain));
    }

    #[test]
    fn test_domain_shape_matters() {
        let (pk, mut rng) = setup(34);
        let domain = Domain::binary();
        let ciphertext = pk.encrypt(&mut rng, &ModInt::ZERO).unwrap();
        let proof = MembershipProof::compute(&mut rng, &ciphertext, &pk, &ModInt::ZERO, &domain).unwrap();

        let reordered = Domain::new(vec![ModInt::ONE, ModInt::ZERO]);
        assert!(!proof.verify(&ciphertext, &pk, &reordered));
        assert!(!proof.verify(&ciphertext, &pk, &Domain::range(0, 2)));
    }

    #[test]
    fn test_encodings() {
        let (pk, mut rng) = setup(35);
        let domain = Domain::range(1, 3);
        let m = ModInt::from_u64(3);
        let ciphertext = pk.encrypt(&mut rng, &m).unwrap();
        let proof = MembershipProof::compute(&mut rng, &ciphertext, &pk, &m, &domain).unwrap();

        let text = proof.to_string();
        assert!(text.starts_with('p'));
        let reread: MembershipProof = text.parse().unwrap();
        assert_eq!(reread, proof);
        assert!(reread.verify(&ciphertext, &pk, &domain));
        assert_eq!(MembershipProof::from_sexpr(&proof.to_sexpr()).unwrap(), proof);
    }

    #[test]
    fn test_text_rejects_malformed() {
        for text in ["", "p23", "p23y1z1s1", "p23y1z1s1c1c1", "p23z1y1s1c1", "p23y1z1s1x1"] {
            let parsed = text.parse::<MembershipProof>();
            if text == "p23" {
                assert!(parsed.unwrap().get_y().is_empty());
            } else {
                assert!(parsed.is_err(), "{text}");
            }
        }
    }
}
