//! Exponential ElGamal ciphertexts
use crate::{
    arithmetics::ModInt,
    encoding::sexpr::{expect_labeled, FromSExpr, SExpr, ToSExpr},
    encoding::text::TokenStream,
    error::{Error, Result},
    keys::expect_group_prime,
    proofs::{membership::PROOF_LABEL, MembershipProof},
    BigInt,
};
use digest::Digest;
use sha1::Sha1;
use std::fmt;
use std::str::FromStr;

const CIPHERTEXT_LABEL: &str = "elgamal-ciphertext";
const SHORT_HASH_LEN: usize = 5;

/// The pair `(G, H) = (g^r, h^r * f^m)` over the prime `p`.
///
/// The randomness `r` stays with the party that encrypted. It is never part of the canonical
/// forms and is ignored by equality.
#[derive(Debug, Clone)]
pub struct Ciphertext {
    p: BigInt,
    g: ModInt,
    h: ModInt,
    r: Option<ModInt>,
    proof: Option<MembershipProof>,
}

impl Ciphertext {
    pub fn new(p: BigInt, g: ModInt, h: ModInt) -> Self {
        return Self {
            p,
            g: g.modulo(&p),
            h: h.modulo(&p),
            r: None,
            proof: None,
        };
    }

    /// Record the encryption randomness, reduced into Z_q
    pub fn with_randomness(mut self, r: ModInt) -> Self {
        self.r = Some(r.modulo(&self.get_q()));
        return self;
    }

    pub fn with_proof(mut self, proof: MembershipProof) -> Self {
        self.proof = Some(proof);
        return self;
    }

    /// `(1, 1)` with zero randomness, the neutral element for [`Ciphertext::multiply`]
    pub fn identity(p: &BigInt) -> Self {
        let identity = Self::new(*p, ModInt::one(p), ModInt::one(p));
        return identity.with_randomness(ModInt::ZERO);
    }

    pub fn get_p(&self) -> &BigInt {
        return &self.p;
    }

    pub fn get_q(&self) -> BigInt {
        return self.p.shr_vartime(1);
    }

    pub fn get_g(&self) -> &ModInt {
        return &self.g;
    }

    pub fn get_h(&self) -> &ModInt {
        return &self.h;
    }

    pub fn get_r(&self) -> Option<&ModInt> {
        return self.r.as_ref();
    }

    pub fn get_proof(&self) -> Option<&MembershipProof> {
        return self.proof.as_ref();
    }

    /// Component-wise product, which encrypts the sum of the plaintexts. The randomness is
    /// summed when both sides know theirs; the proof is dropped. Both operands must share `p`.
    pub fn multiply(&self, other: &Self) -> Result<Self> {
        if self.p != other.p {
            return Err(Error::GroupMismatch {
                expected: ModInt::plain(self.p).to_string(),
                found: ModInt::plain(other.p).to_string(),
            });
        }
        let r = match (self.r, other.r) {
            (Some(lhs), Some(rhs)) => Some(lhs + rhs),
            _ => None,
        };
        return Ok(Self {
            p: self.p,
            g: self.g * other.g,
            h: self.h * other.h,
            r,
            proof: None,
        });
    }

    /// The canonical text without the proof
    pub(crate) fn bare(&self) -> String {
        return format!("p{}G{}H{}", ModInt::plain(self.p), self.g, self.h);
    }

    /// First hex characters of the SHA-1 of the canonical text, proof excluded. Meant for
    /// display, not for binding.
    pub fn short_hash(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.bare().as_bytes());
        let hash: Vec<u8> = hasher.finalize().to_vec();
        let mut digest = hex::encode(hash);
        digest.truncate(SHORT_HASH_LEN);
        return digest;
    }

    /// The structured form including `r` as the third field. Only the encrypting party has it.
    pub fn to_sexpr_with_randomness(&self) -> Result<SExpr> {
        let r = self.r.ok_or(Error::MissingRandomness)?;
        let mut items = vec![
            SExpr::atom(CIPHERTEXT_LABEL),
            ModInt::plain(self.p).to_sexpr(),
            self.g.to_sexpr(),
            r.to_sexpr(),
            self.h.to_sexpr(),
        ];
        if let Some(proof) = &self.proof {
            items.push(proof.to_sexpr());
        }
        return Ok(SExpr::List(items));
    }
}

impl PartialEq for Ciphertext {
    fn eq(&self, other: &Self) -> bool {
        return self.p == other.p
            && self.g == other.g
            && self.h == other.h
            && self.proof == other.proof;
    }
}

impl Eq for Ciphertext {}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bare())?;
        if let Some(proof) = &self.proof {
            write!(f, " {proof}")?;
        }
        return Ok(());
    }
}

impl FromStr for Ciphertext {
    type Err = Error;

    /// `p<p>G<G>H<H>`, optionally followed by a space and the proof
    fn from_str(s: &str) -> Result<Self> {
        let (bare, proof) = match s.split_once(' ') {
            Some((bare, proof)) => (bare, Some(proof)),
            None => (s, None),
        };
        let mut stream = TokenStream::new(bare, "pGH", "ciphertext");
        let p = stream.tagged("p", &BigInt::ZERO)?;
        let p = expect_group_prime(&p, "ciphertext")?;
        let g = stream.tagged("G", &p)?;
        let h = stream.tagged("H", &p)?;
        stream.finish()?;

        let ciphertext = Self::new(p, g, h);
        return match proof {
            Some(proof) => Ok(ciphertext.with_proof(proof.parse()?)),
            None => Ok(ciphertext),
        };
    }
}

impl ToSExpr for Ciphertext {
    fn to_sexpr(&self) -> SExpr {
        let mut items = vec![
            SExpr::atom(CIPHERTEXT_LABEL),
            ModInt::plain(self.p).to_sexpr(),
            self.g.to_sexpr(),
            self.h.to_sexpr(),
        ];
        if let Some(proof) = &self.proof {
            items.push(proof.to_sexpr());
        }
        return SExpr::List(items);
    }
}

impl FromSExpr for Ciphertext {
    /// Accepts both the plain and the with-randomness layout. A five element list is told apart
    /// by whether its last element is a proof.
    fn from_sexpr(expr: &SExpr) -> Result<Self> {
        let items = expect_labeled(expr, "ciphertext", CIPHERTEXT_LABEL, &[4, 5, 6])?;
        let with_randomness =
            items.len() == 6 || (items.len() == 5 && items[4].label() != Some(PROOF_LABEL));
        let p = ModInt::from_sexpr(&items[1])?;
        let p = expect_group_prime(&p, "ciphertext")?;
        let g = ModInt::from_sexpr(&items[2])?;

        let (ciphertext, rest) = if with_randomness {
            let r = ModInt::from_sexpr(&items[3])?;
            let h = ModInt::from_sexpr(&items[4])?;
            (Self::new(p, g, h).with_randomness(r), &items[5..])
        } else {
            let h = ModInt::from_sexpr(&items[3])?;
            (Self::new(p, g, h), &items[4..])
        };
        return match rest.first() {
            Some(proof) => Ok(ciphertext.with_proof(MembershipProof::from_sexpr(proof)?)),
            None => Ok(ciphertext),
        };
    }
}
