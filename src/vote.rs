//! An encrypted ballot for a single race
use crate::{
    ciphertext::Ciphertext,
    encoding::{
        sexpr::{decode_all, encode_all, expect_labeled, expect_list, FromSExpr, SExpr, ToSExpr},
        text::words,
    },
    error::{Error, Result},
    keys::PublicKey,
    proofs::VoteProof,
    BigInt,
};
use std::fmt;

const VOTE_LABEL: &str = "vote";
const IDS_LABEL: &str = "vote-ids";

/// One ciphertext per candidate, in the order of `choices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    ciphertexts: Vec<Ciphertext>,
    choices: Vec<String>,
    proof: Option<VoteProof>,
}

impl Vote {
    pub fn new(ciphertexts: Vec<Ciphertext>, choices: Vec<String>) -> Result<Self> {
        if ciphertexts.len() != choices.len() {
            return Err(Error::LengthMismatch {
                expected: choices.len(),
                found: ciphertexts.len(),
            });
        }
        return Ok(Self {
            ciphertexts,
            choices,
            proof: None,
        });
    }

    /// An encryption of zero for every candidate, the starting point of a tally
    pub fn identity(p: &BigInt, choices: &[String]) -> Self {
        return Self {
            ciphertexts: choices.iter().map(|_| Ciphertext::identity(p)).collect(),
            choices: choices.to_vec(),
            proof: None,
        };
    }

    pub fn with_proof(mut self, proof: VoteProof) -> Self {
        self.proof = Some(proof);
        return self;
    }

    pub fn get_ciphertexts(&self) -> &[Ciphertext] {
        return &self.ciphertexts;
    }

    pub fn get_choices(&self) -> &[String] {
        return &self.choices;
    }

    pub fn get_proof(&self) -> Option<&VoteProof> {
        return self.proof.as_ref();
    }

    /// Candidate-wise product. The result carries no proof.
    pub fn multiply(&self, other: &Self) -> Result<Self> {
        if self.ciphertexts.len() != other.ciphertexts.len() {
            return Err(Error::LengthMismatch {
                expected: self.ciphertexts.len(),
                found: other.ciphertexts.len(),
            });
        }
        let ciphertexts = self
            .ciphertexts
            .iter()
            .zip(&other.ciphertexts)
            .map(|(lhs, rhs)| lhs.multiply(rhs))
            .collect::<Result<Vec<Ciphertext>>>()?;
        return Ok(Self {
            ciphertexts,
            choices: self.choices.clone(),
            proof: None,
        });
    }

    /// Read the text form of a ballot cast in a race with the given candidate ids
    pub fn parse(text: &str, choices: &[String]) -> Result<Self> {
        let ciphertexts = words(text)
            .map(str::parse)
            .collect::<Result<Vec<Ciphertext>>>()?;
        return Self::new(ciphertexts, choices.to_vec());
    }

    /// Verify the attached proof; a vote without one does not verify
    pub fn verify_proof(&self, key: &PublicKey, min: u64, max: u64) -> bool {
        return match &self.proof {
            Some(proof) => proof.verify(self, key, min, max),
            None => false,
        };
    }
}

/// The ciphertexts in candidate order, separated by spaces. Ciphertext proofs, candidate ids
/// and the vote proof are left out; only the structured form carries them.
impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let texts: Vec<String> = self.ciphertexts.iter().map(Ciphertext::bare).collect();
        return write!(f, "{}", texts.join(" "));
    }
}

impl ToSExpr for Vote {
    fn to_sexpr(&self) -> SExpr {
        let ids = self.choices.iter().map(SExpr::atom).collect();
        let mut items = vec![
            SExpr::List(vec![SExpr::atom(VOTE_LABEL), encode_all(&self.ciphertexts)]),
            SExpr::List(vec![SExpr::atom(IDS_LABEL), SExpr::List(ids)]),
        ];
        if let Some(proof) = &self.proof {
            items.push(proof.to_sexpr());
        }
        return SExpr::List(items);
    }
}

impl FromSExpr for Vote {
    fn from_sexpr(expr: &SExpr) -> Result<Self> {
        let kind = "vote";
        let items = expect_list(expr, kind)?;
        if items.len() != 2 && items.len() != 3 {
            return Err(Error::parse(kind, format!("unexpected field count {}", items.len())));
        }
        let ciphertexts = expect_labeled(&items[0], kind, VOTE_LABEL, &[2])?;
        let ciphertexts = decode_all(&ciphertexts[1], kind)?;
        let ids = expect_labeled(&items[1], kind, IDS_LABEL, &[2])?;
        let choices = expect_list(&ids[1], kind)?
            .iter()
            .map(|id| {
                id.as_atom()
                    .map(str::to_string)
                    .ok_or_else(|| Error::parse(kind, "candidate id must be an atom"))
            })
            .collect::<Result<Vec<String>>>()?;

        let vote = Self::new(ciphertexts, choices)?;
        return match items.get(2) {
            Some(proof) => Ok(vote.with_proof(VoteProof::from_sexpr(proof)?)),
            None => Ok(vote),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{arithmetics::ModInt, testing};

    fn ids() -> Vec<String> {
        return vec!["alice".to_string(), "bob smith".to_string()];
    }

    #[test]
    fn test_new_checks_lengths() {
        let p = BigInt::from_u64(23);
        assert!(Vote::new(vec![Ciphertext::identity(&p)], ids()).is_err());
        assert_eq!(Vote::identity(&p, &ids()).get_ciphertexts().len(), 2);
    }

    #[test]
    fn test_multiply() {
        let key = testing::small_key(60);
        let mut rng = testing::rng(61);
        let (pk, sk) = key.gen_key_pair(&mut rng);
        let one_zero = [ModInt::ONE, ModInt::ZERO];
        let a = pk.encrypt_vote(&mut rng, &one_zero, &ids()).unwrap();
        let b = pk.encrypt_vote(&mut rng, &one_zero, &ids()).unwrap();
        let product = a.multiply(&b).unwrap();
        let totals: Vec<u64> = product
            .get_ciphertexts()
            .iter()
            .map(|ciphertext| sk.decrypt(ciphertext, 5).unwrap())
            .collect();
        assert_eq!(totals, vec![2, 0]);
        assert!(product.get_proof().is_none());

        let identity = Vote::identity(key.get_p(), &ids());
        assert_eq!(identity.multiply(&a).unwrap(), a);

        let short = pk.encrypt_vote(&mut rng, &[ModInt::ONE], &ids()[..1]).unwrap();
        assert!(matches!(a.multiply(&short), Err(Error::LengthMismatch { .. })));
    }

    #[test]
    fn test_verify_proof() {
        let key = testing::small_key(62);
        let mut rng = testing::rng(63);
        let (pk, _) = key.gen_key_pair(&mut rng);
        let plain = [ModInt::ZERO, ModInt::ONE];
        let vote = pk.encrypt_vote(&mut rng, &plain, &ids()).unwrap();
        assert!(!vote.verify_proof(&pk, 1, 1));
        let proof = VoteProof::compute(&mut rng, &vote, &pk, &plain, 1, 1).unwrap();
        let vote = vote.with_proof(proof);
        assert!(vote.verify_proof(&pk, 1, 1));
    }

    #[test]
    fn test_text_roundtrip() {
        let key = testing::small_key(66);
        let mut rng = testing::rng(67);
        let (pk, sk) = key.gen_key_pair(&mut rng);
        let plain = [ModInt::ZERO, ModInt::ONE];
        let vote = pk.encrypt_vote(&mut rng, &plain, &ids()).unwrap();
        let proof = VoteProof::compute(&mut rng, &vote, &pk, &plain, 1, 1).unwrap();
        let vote = vote.with_proof(proof);

        let text = vote.to_string();
        assert_eq!(text.split(' ').count(), 2);
        let reread = Vote::parse(&text, &ids()).unwrap();
        assert_eq!(reread.get_ciphertexts(), vote.get_ciphertexts());
        assert_eq!(reread.get_choices(), ids().as_slice());
        assert!(reread.get_proof().is_none());
        assert_eq!(sk.decrypt(&reread.get_ciphertexts()[1], 1).unwrap(), 1);

        assert!(matches!(
            Vote::parse(&text, &ids()[..1]),
            Err(Error::LengthMismatch { expected: 1, found: 2 })
        ));
        assert!(Vote::parse("p23G4H9 p23G4", &ids()).is_err());
        assert!(Vote::parse("", &[]).unwrap().get_ciphertexts().is_empty());
    }

    #[test]
    fn test_sexpr_roundtrip() {
        let key = testing::small_key(64);
        let mut rng = testing::rng(65);
        let (pk, _) = key.gen_key_pair(&mut rng);
        let plain = [ModInt::ONE, ModInt::ZERO];
        let vote = pk.encrypt_vote(&mut rng, &plain, &ids()).unwrap();
        assert_eq!(Vote::from_sexpr(&vote.to_sexpr()).unwrap(), vote);

        let proof = VoteProof::compute(&mut rng, &vote, &pk, &plain, 0, 2).unwrap();
        let vote = vote.with_proof(proof);
        let printed = vote.to_sexpr().to_string();
        assert!(printed.starts_with("((vote ((elgamal-ciphertext"));
        assert!(printed.contains("(vote-ids (alice \"bob smith\"))"));
        let decoded = Vote::from_sexpr(&printed.parse().unwrap()).unwrap();
        assert_eq!(decoded, vote);
        assert!(decoded.verify_proof(&pk, 0, 2));
    }

    #[test]
    fn test_sexpr_rejects_malformed() {
        for text in [
            "((vote ()) (vote-ids (alice)))",
            "((ballot ()) (vote-ids ()))",
            "((vote ()))",
            "((vote ()) (vote-ids ((alice))))",
        ] {
            let expr: SExpr = text.parse().unwrap();
            assert!(Vote::from_sexpr(&expr).is_err(), "{text}");
        }
        let empty: SExpr = "((vote ()) (vote-ids ()))".parse().unwrap();
        assert!(Vote::from_sexpr(&empty).unwrap().get_ciphertexts().is_empty());
    }
}
