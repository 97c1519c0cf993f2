//! The key material
//!
//! Every key is built on a group template [`Key`]: a safe prime `p = 2q + 1`, a generator `g`
//! of the order-q subgroup of quadratic residues, and a second generator `f` that carries the
//! plaintext in the exponent. The combined keys and the per-authority shares are parallel
//! structs composed over the same template.
use crate::{
    arithmetics::ModInt,
    ciphertext::Ciphertext,
    encoding::{
        sexpr::{expect_labeled, FromSExpr, SExpr, ToSExpr},
        text::TokenStream,
    },
    error::{Error, Result},
    proofs::{Domain, MembershipProof},
    vote::Vote,
    BigInt,
};
use crypto_bigint::{rand_core::CryptoRngCore, Integer};
use log::debug;
use std::fmt;
use std::str::FromStr;

const PUBLIC_LABEL: &str = "public-key";
const PRIVATE_LABEL: &str = "private-key";

/// Check that a modulus can be the prime of a group: odd and at least 7, so that both `[2, p)`
/// and `[2, q)` are non-empty
pub(crate) fn expect_group_prime(p: &ModInt, kind: &'static str) -> Result<BigInt> {
    let value = *p.get_value();
    if !bool::from(value.is_odd()) || value < BigInt::from_u64(7) {
        return Err(Error::parse(kind, format!("{p} is not a usable group prime")));
    }
    return Ok(value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    p: BigInt,
    q: BigInt,
    g: ModInt,
    f: ModInt,
}

impl Key {
    /// Assemble a template from decoded values. Only the shape of `p` is checked.
    pub fn new(p: &ModInt, g: &ModInt, f: &ModInt) -> Result<Self> {
        let p = expect_group_prime(p, "key")?;
        return Ok(Self {
            p,
            q: p.shr_vartime(1),
            g: g.modulo(&p),
            f: f.modulo(&p),
        });
    }

    /// Generate a fresh template over a new safe prime with `bits` bits
    pub fn generate(rng: &mut impl CryptoRngCore, bits: usize) -> Result<Self> {
        let p = ModInt::safe_prime(rng, bits);
        let key = Self::from_prime(rng, p)?;
        debug!("generated {bits}-bit group template");
        return Ok(key);
    }

    /// Derive the generators for a known safe prime: `g = t^2` for a random `t` in `[2, p)`, and
    /// `f = g^a` for a random `a` in `[2, q)`. Squaring lands `g` in the quadratic residues.
    pub fn from_prime(rng: &mut impl CryptoRngCore, p: ModInt) -> Result<Self> {
        let p = expect_group_prime(&p, "key")?;
        let q = p.shr_vartime(1);
        let t = Self::sample_from_two(rng, &p);
        let g = t * t;
        let a = Self::sample_from_two(rng, &q);
        let f = g.pow(&a);
        return Ok(Self { p, q, g, f });
    }

    /// Uniform in `[2, bound)`, carrying `bound` as its modulus
    fn sample_from_two(rng: &mut impl CryptoRngCore, bound: &BigInt) -> ModInt {
        let two = BigInt::from_u64(2);
        let offset = ModInt::random(rng, &bound.wrapping_sub(&two));
        return offset.modulo(bound) + ModInt::plain(two);
    }

    pub fn get_p(&self) -> &BigInt {
        return &self.p;
    }

    pub fn get_q(&self) -> &BigInt {
        return &self.q;
    }

    pub fn get_g(&self) -> &ModInt {
        return &self.g;
    }

    pub fn get_f(&self) -> &ModInt {
        return &self.f;
    }

    /// A uniform exponent in Z_q
    pub(crate) fn random_exponent(&self, rng: &mut impl CryptoRngCore) -> ModInt {
        return ModInt::random(rng, &self.q);
    }

    /// A single-authority key pair with `x` drawn from Z_q and `h = g^x`
    pub fn gen_key_pair(&self, rng: &mut impl CryptoRngCore) -> (PublicKey, PrivateKey) {
        let private = PrivateKey::new(*self, self.random_exponent(rng));
        return (private.get_public_key(), private);
    }

    /// The per-authority counterpart of [`Key::gen_key_pair`]
    pub fn gen_key_share(&self, rng: &mut impl CryptoRngCore) -> (PublicKeyShare, PrivateKeyShare) {
        let private = PrivateKeyShare::new(*self, self.random_exponent(rng));
        return (private.get_public_share(), private);
    }

    /// `(g^r, h^r * factor)` with a fresh `r`, which is kept on the ciphertext
    fn encrypt_factor(&self, rng: &mut impl CryptoRngCore, h: &ModInt, factor: ModInt) -> Ciphertext {
        let r = self.random_exponent(rng);
        let big_g = self.g.pow(&r);
        let big_h = h.pow(&r) * factor.modulo(&self.p);
        return Ciphertext::new(self.p, big_g, big_h).with_randomness(r);
    }

    /// `H / G^x`, which strips the blinding factor `h^r` for `h = g^x`
    fn unblind(&self, ciphertext: &Ciphertext, x: &ModInt) -> Result<ModInt> {
        let blinding = ciphertext.get_g().modulo(&self.p).pow(x);
        return ciphertext.get_h().modulo(&self.p).divide(&blinding);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    key: Key,
    h: Option<ModInt>,
}

impl PublicKey {
    pub fn new(key: Key, h: Option<ModInt>) -> Self {
        let h = h.map(|h| h.modulo(key.get_p()));
        return Self { key, h };
    }

    pub fn get_key(&self) -> &Key {
        return &self.key;
    }

    pub fn get_h(&self) -> Option<&ModInt> {
        return self.h.as_ref();
    }

    /// The public value, which every encryption needs
    pub fn require_h(&self) -> Result<&ModInt> {
        return self.h.as_ref().ok_or(Error::MissingPublicValue);
    }

    /// Exponential ElGamal: `(g^r, h^r * f^m)`
    pub fn encrypt(&self, rng: &mut impl CryptoRngCore, m: &ModInt) -> Result<Ciphertext> {
        let h = self.require_h()?;
        let encoded = self.key.f.pow(m);
        return Ok(self.key.encrypt_factor(rng, h, encoded));
    }

    /// Encrypt and attach a proof that `m` is a member of the domain
    pub fn encrypt_with_proof(
        &self,
        rng: &mut impl CryptoRngCore,
        m: &ModInt,
        domain: &Domain,
    ) -> Result<Ciphertext> {
        let ciphertext = self.encrypt(rng, m)?;
        let proof = MembershipProof::compute(rng, &ciphertext, self, m, domain)?;
        return Ok(ciphertext.with_proof(proof));
    }

    /// Plain ElGamal `(g^r, h^r * m)` without the homomorphic encoding
    pub fn encrypt_raw(&self, rng: &mut impl CryptoRngCore, m: &ModInt) -> Result<Ciphertext> {
        let h = self.require_h()?;
        return Ok(self.key.encrypt_factor(rng, h, *m));
    }

    /// Encrypt one selection per candidate
    pub fn encrypt_vote(
        &self,
        rng: &mut impl CryptoRngCore,
        selections: &[ModInt],
        choices: &[String],
    ) -> Result<Vote> {
        if selections.len() != choices.len() {
            return Err(Error::LengthMismatch {
                expected: choices.len(),
                found: selections.len(),
            });
        }
        let ciphertexts = selections
            .iter()
            .map(|selection| self.encrypt(rng, selection))
            .collect::<Result<Vec<Ciphertext>>>()?;
        return Vote::new(ciphertexts, choices.to_vec());
    }
}

/// One authority's public share. It encrypts the polynomial evaluations addressed to that
/// authority during the key ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyShare {
    key: Key,
    h: Option<ModInt>,
}

impl PublicKeyShare {
    pub fn new(key: Key, h: Option<ModInt>) -> Self {
        let h = h.map(|h| h.modulo(key.get_p()));
        return Self { key, h };
    }

    pub fn get_key(&self) -> &Key {
        return &self.key;
    }

    pub fn get_h(&self) -> Option<&ModInt> {
        return self.h.as_ref();
    }

    /// `(g^r, h^r * (m + 1)^2)`. Squaring moves the plaintext into the quadratic residues so
    /// the ciphertext stays inside the subgroup.
    pub fn encrypt_squared(&self, rng: &mut impl CryptoRngCore, m: &ModInt) -> Result<Ciphertext> {
        let h = self.h.as_ref().ok_or(Error::MissingPublicValue)?;
        let shifted = m.modulo(&self.key.p) + ModInt::ONE;
        return Ok(self.key.encrypt_factor(rng, h, shifted * shifted));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivateKey {
    key: Key,
    x: ModInt,
}

impl PrivateKey {
    pub fn new(key: Key, x: ModInt) -> Self {
        let x = x.modulo(key.get_q());
        return Self { key, x };
    }

    pub fn get_key(&self) -> &Key {
        return &self.key;
    }

    pub fn get_x(&self) -> &ModInt {
        return &self.x;
    }

    pub fn get_public_key(&self) -> PublicKey {
        return PublicKey::new(self.key, Some(self.key.g.pow(&self.x)));
    }

    /// Recover the group element `H / G^x` without taking a logarithm
    pub fn decrypt_raw(&self, ciphertext: &Ciphertext) -> Result<ModInt> {
        return self.key.unblind(ciphertext, &self.x);
    }

    /// Recover `m` from `f^m` by searching `0..=bound`
    pub fn decrypt(&self, ciphertext: &Ciphertext, bound: u64) -> Result<u64> {
        let encoded = self.decrypt_raw(ciphertext)?;
        return crate::arithmetics::bounded_discrete_log(&self.key.f, &encoded, bound).ok_or_else(
            || Error::SearchSpaceExhausted {
                target: encoded.to_string(),
                bound,
            },
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivateKeyShare {
    key: Key,
    x: ModInt,
}

impl PrivateKeyShare {
    pub fn new(key: Key, x: ModInt) -> Self {
        let x = x.modulo(key.get_q());
        return Self { key, x };
    }

    pub fn get_key(&self) -> &Key {
        return &self.key;
    }

    pub fn get_x(&self) -> &ModInt {
        return &self.x;
    }

    pub fn get_public_share(&self) -> PublicKeyShare {
        return PublicKeyShare::new(self.key, Some(self.key.g.pow(&self.x)));
    }

    /// This authority's contribution `G^x` to the blinding factor
    pub fn partial_decrypt(&self, ciphertext: &Ciphertext) -> ModInt {
        return ciphertext.get_g().modulo(&self.key.p).pow(&self.x);
    }

    pub fn partial_decrypt_vote(&self, vote: &Vote) -> Vec<ModInt> {
        return vote
            .get_ciphertexts()
            .iter()
            .map(|ciphertext| self.partial_decrypt(ciphertext))
            .collect();
    }

    /// Invert [`PublicKeyShare::encrypt_squared`]. Since `p = 3 (mod 4)`, `w^((q + 1) / 2)` is a
    /// square root of the residue `w = (m + 1)^2`; `m + 1` is at most `q` and therefore the
    /// smaller of the two roots.
    pub fn decrypt_squared(&self, ciphertext: &Ciphertext) -> Result<ModInt> {
        let square = self.key.unblind(ciphertext, &self.x)?;
        let exponent = ModInt::plain(self.key.q) + ModInt::ONE;
        let exponent = ModInt::plain(exponent.get_value().shr_vartime(1));
        let root = square.pow(&exponent);
        let smaller = (*root.get_value()).min(*root.negate().get_value());
        return Ok(ModInt::new(smaller, self.key.q) - ModInt::ONE);
    }
}

fn fmt_key(f: &mut fmt::Formatter<'_>, key: &Key, tag: &str, value: Option<&ModInt>) -> fmt::Result {
    let value = value.copied().unwrap_or(ModInt::ZERO);
    return write!(f, "p{}g{}{tag}{value}f{}", ModInt::plain(key.p), key.g, key.f);
}

/// Read `p<p>g<g><tag><value>f<f>`; the tagged value is reduced under `value_modulus`
fn parse_key(
    s: &str,
    delimiters: &'static str,
    tag: &str,
    kind: &'static str,
    value_modulus: fn(&Key) -> BigInt,
) -> Result<(Key, ModInt)> {
    let mut stream = TokenStream::new(s, delimiters, kind);
    let p = stream.tagged("p", &BigInt::ZERO)?;
    let p = expect_group_prime(&p, kind)?;
    let g = stream.tagged("g", &p)?;
    stream.expect_tag(tag)?;
    let value = stream.integer(&BigInt::ZERO)?;
    let f = stream.tagged("f", &p)?;
    stream.finish()?;
    let key = Key::new(&ModInt::plain(p), &g, &f)?;
    return Ok((key, value.modulo(&value_modulus(&key))));
}

fn public_value(h: ModInt) -> Option<ModInt> {
    return if h.is_zero() { None } else { Some(h) };
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return fmt_key(f, &self.key, "h", self.get_h());
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, h) = parse_key(s, "pghf", "h", "public key", |key| key.p)?;
        return Ok(Self::new(key, public_value(h)));
    }
}

impl fmt::Display for PublicKeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return fmt_key(f, &self.key, "h", self.get_h());
    }
}

impl FromStr for PublicKeyShare {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, h) = parse_key(s, "pghf", "h", "public key share", |key| key.p)?;
        return Ok(Self::new(key, public_value(h)));
    }
}

impl fmt::Display for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return fmt_key(f, &self.key, "x", Some(&self.x));
    }
}

impl FromStr for PrivateKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, x) = parse_key(s, "pgxf", "x", "private key", |key| key.q)?;
        return Ok(Self::new(key, x));
    }
}

impl fmt::Display for PrivateKeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return fmt_key(f, &self.key, "x", Some(&self.x));
    }
}

impl FromStr for PrivateKeyShare {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, x) = parse_key(s, "pgxf", "x", "private key share", |key| key.q)?;
        return Ok(Self::new(key, x));
    }
}

fn key_to_sexpr(label: &str, key: &Key, value: ModInt) -> SExpr {
    return SExpr::List(vec![
        SExpr::atom(label),
        ModInt::plain(key.p).to_sexpr(),
        key.g.to_sexpr(),
        value.to_sexpr(),
        key.f.to_sexpr(),
    ]);
}

fn key_from_sexpr(expr: &SExpr, label: &str, kind: &'static str) -> Result<(Key, ModInt)> {
    let items = expect_labeled(expr, kind, label, &[5])?;
    let p = ModInt::from_sexpr(&items[1])?;
    let g = ModInt::from_sexpr(&items[2])?;
    let value = ModInt::from_sexpr(&items[3])?;
    let f = ModInt::from_sexpr(&items[4])?;
    let key = Key::new(&p.modulo(&BigInt::ZERO), &g, &f)?;
    return Ok((key, value));
}

impl ToSExpr for PublicKey {
    fn to_sexpr(&self) -> SExpr {
        let h = self.h.unwrap_or_else(|| ModInt::zero(&self.key.p));
        return key_to_sexpr(PUBLIC_LABEL, &self.key, h);
    }
}

impl FromSExpr for PublicKey {
    fn from_sexpr(expr: &SExpr) -> Result<Self> {
        let (key, h) = key_from_sexpr(expr, PUBLIC_LABEL, "public key")?;
        return Ok(Self::new(key, public_value(h)));
    }
}

impl ToSExpr for PublicKeyShare {
    fn to_sexpr(&self) -> SExpr {
        let h = self.h.unwrap_or_else(|| ModInt::zero(&self.key.p));
        return key_to_sexpr(PUBLIC_LABEL, &self.key, h);
    }
}

impl FromSExpr for PublicKeyShare {
    fn from_sexpr(expr: &SExpr) -> Result<Self> {
        let (key, h) = key_from_sexpr(expr, PUBLIC_LABEL, "public key share")?;
        return Ok(Self::new(key, public_value(h)));
    }
}

impl ToSExpr for PrivateKey {
    fn to_sexpr(&self) -> SExpr {
        return key_to_sexpr(PRIVATE_LABEL, &self.key, self.x);
    }
}

impl FromSExpr for PrivateKey {
    fn from_sexpr(expr: &SExpr) -> Result<Self> {
        let (key, x) = key_from_sexpr(expr, PRIVATE_LABEL, "private key")?;
        return Ok(Self::new(key, x));
    }
}

impl ToSExpr for PrivateKeyShare {
    fn to_sexpr(&self) -> SExpr {
        return key_to_sexpr(PRIVATE_LABEL, &self.key, self.x);
    }
}

impl FromSExpr for PrivateKeyShare {
    fn from_sexpr(expr: &SExpr) -> Result<Self> {
        let (key, x) = key_from_sexpr(expr, PRIVATE_LABEL, "private key share")?;
        return Ok(Self::new(key, x));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_template_generators() {
        let key = testing::small_key(1);
        let one = ModInt::one(key.get_p());
        let q = ModInt::plain(*key.get_q());
        assert_eq!(key.get_g().pow(&q), one);
        assert_eq!(key.get_f().pow(&q), one);
        assert_ne!(key.get_g(), &one);
        assert_ne!(key.get_f(), &one);
    }

    #[test]
    fn test_generate_small_template() {
        let mut rng = testing::rng(2);
        let key = Key::generate(&mut rng, 24).unwrap();
        assert_eq!(key.get_p().bits_vartime(), 24);
        assert_eq!(key.get_g().pow(&ModInt::plain(*key.get_q())), ModInt::one(key.get_p()));
    }

    #[test]
    fn test_tiny_primes() {
        let mut rng = testing::rng(2);
        assert!(Key::from_prime(&mut rng, ModInt::from_u64(5)).is_err());
        assert!("p5g4h1f4".parse::<PublicKey>().is_err());

        let key = Key::from_prime(&mut rng, ModInt::from_u64(7)).unwrap();
        assert_eq!(key.get_q(), &BigInt::from_u64(3));
        assert_eq!(key.get_g().pow(&ModInt::from_u64(3)), ModInt::one(key.get_p()));
    }

    #[test]
    fn test_correctness() {
        let key = testing::small_key(3);
        let mut rng = testing::rng(4);
        let (pk, sk) = key.gen_key_pair(&mut rng);
        for m in [0, 1, 7, 20] {
            let ciphertext = pk.encrypt(&mut rng, &ModInt::from_u64(m)).unwrap();
            assert_eq!(sk.decrypt(&ciphertext, 20).unwrap(), m);
        }
    }

    #[test]
    fn test_decrypt_bound() {
        let key = testing::small_key(3);
        let mut rng = testing::rng(5);
        let (pk, sk) = key.gen_key_pair(&mut rng);
        let ciphertext = pk.encrypt(&mut rng, &ModInt::from_u64(9)).unwrap();
        assert!(matches!(
            sk.decrypt(&ciphertext, 8),
            Err(Error::SearchSpaceExhausted { bound: 8, .. })
        ));
    }

    #[test]
    fn test_homomorphism() {
        let key = testing::small_key(6);
        let mut rng = testing::rng(7);
        let (pk, sk) = key.gen_key_pair(&mut rng);
        let a = pk.encrypt(&mut rng, &ModInt::from_u64(3)).unwrap();
        let b = pk.encrypt(&mut rng, &ModInt::from_u64(4)).unwrap();
        assert_eq!(sk.decrypt(&a.multiply(&b).unwrap(), 10).unwrap(), 7);
    }

    #[test]
    fn test_encrypt_raw() {
        let key = testing::small_key(8);
        let mut rng = testing::rng(9);
        let (pk, sk) = key.gen_key_pair(&mut rng);
        let message = key.get_g().pow(&ModInt::from_u64(12345));
        let ciphertext = pk.encrypt_raw(&mut rng, &message).unwrap();
        assert_eq!(sk.decrypt_raw(&ciphertext).unwrap(), message);
    }

    #[test]
    fn test_missing_public_value() {
        let key = testing::small_key(10);
        let mut rng = testing::rng(11);
        let pk = PublicKey::new(key, None);
        assert!(matches!(
            pk.encrypt(&mut rng, &ModInt::ONE),
            Err(Error::MissingPublicValue)
        ));
        let share = PublicKeyShare::new(key, None);
        assert!(share.encrypt_squared(&mut rng, &ModInt::ONE).is_err());
    }

    #[test]
    fn test_squared_encoding() {
        let key = testing::small_key(12);
        let mut rng = testing::rng(13);
        let (public, private) = key.gen_key_share(&mut rng);
        let q = *key.get_q();
        let largest = ModInt::new(q.wrapping_sub(&BigInt::ONE), q);
        for m in [ModInt::zero(&q), ModInt::new(BigInt::from_u64(77), q), largest] {
            let ciphertext = public.encrypt_squared(&mut rng, &m).unwrap();
            assert_eq!(private.decrypt_squared(&ciphertext).unwrap(), m);
        }
        let random = ModInt::random(&mut rng, &q);
        let ciphertext = public.encrypt_squared(&mut rng, &random).unwrap();
        assert_eq!(private.decrypt_squared(&ciphertext).unwrap(), random);
    }

    #[test]
    fn test_partial_decrypt_single_share() {
        let key = testing::small_key(14);
        let mut rng = testing::rng(15);
        let (_, share) = key.gen_key_share(&mut rng);
        let pk = PublicKey::new(key, share.get_public_share().get_h().copied());
        let ciphertext = pk.encrypt(&mut rng, &ModInt::from_u64(2)).unwrap();
        let partial = share.partial_decrypt(&ciphertext);
        let encoded = ciphertext.get_h().divide(&partial).unwrap();
        assert_eq!(encoded, key.get_f().pow(&ModInt::from_u64(2)));
    }

    #[test]
    fn test_text_roundtrip() {
        let key = testing::small_key(16);
        let mut rng = testing::rng(17);
        let (pk, sk) = key.gen_key_pair(&mut rng);
        assert_eq!(pk.to_string().parse::<PublicKey>().unwrap(), pk);
        assert_eq!(sk.to_string().parse::<PrivateKey>().unwrap(), sk);
        let (pks, sks) = key.gen_key_share(&mut rng);
        assert_eq!(pks.to_string().parse::<PublicKeyShare>().unwrap(), pks);
        assert_eq!(sks.to_string().parse::<PrivateKeyShare>().unwrap(), sks);

        let template = PublicKey::new(key, None);
        assert!(template.to_string().contains("h0f"));
        assert_eq!(template.to_string().parse::<PublicKey>().unwrap().get_h(), None);
    }

    #[test]
    fn test_text_rejects_malformed() {
        for text in ["p23g4h9", "p23g4x9f2", "p24g4h9f2", "g4p23h9f2", "p23g4h9f2f2", "p23gah9f2"] {
            assert!(text.parse::<PublicKey>().is_err(), "{text}");
        }
        assert!("p23g4h9f2".parse::<PublicKey>().is_ok());
        assert!("p23g4h9f2".parse::<PrivateKey>().is_err());
    }

    #[test]
    fn test_sexpr_roundtrip() {
        let key = testing::small_key(18);
        let mut rng = testing::rng(19);
        let (pk, sk) = key.gen_key_pair(&mut rng);
        assert_eq!(PublicKey::from_sexpr(&pk.to_sexpr()).unwrap(), pk);
        assert_eq!(PrivateKey::from_sexpr(&sk.to_sexpr()).unwrap(), sk);
        assert!(PrivateKey::from_sexpr(&pk.to_sexpr()).is_err());

        let printed = pk.to_sexpr().to_string();
        assert!(printed.starts_with("(public-key (adder-integer"));
        let reread: SExpr = printed.parse().unwrap();
        assert_eq!(PublicKey::from_sexpr(&reread).unwrap(), pk);
    }
}
