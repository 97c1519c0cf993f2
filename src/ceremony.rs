//! Stage-gated threshold key generation among several election authorities.
//!
//! The ceremony runs in four stages, and each stage only opens once enough authorities (the
//! safety threshold) finished the previous one:
//!
//! 1. every authority draws a key share over the common template and receives a share index
//! 2. every authority deals a random polynomial, encrypting its evaluation at each share index
//!    under that authority's public share, and publishes `g^(P(0))`
//! 3. every authority decrypts the evaluations addressed to it and sums them into its final
//!    private share `s_i = sum_k P_k(i)`
//! 4. the public key `h = prod_k g^(P_k(0))` is assembled once
//!
//! Any `decryption_threshold` final shares interpolate the combined secret, see
//! [`crate::election::Election::combine_partial_decryptions`]. All state sits behind one lock, so
//! every precondition check and the mutation that follows it are atomic.
use crate::{
    arithmetics::ModInt,
    ciphertext::Ciphertext,
    config::CeremonyConfig,
    error::{CeremonyError, Result},
    keys::{Key, PrivateKeyShare, PublicKey, PublicKeyShare},
    polynomial::Polynomial,
};
use crypto_bigint::rand_core::CryptoRngCore;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct CeremonyState {
    public_shares: BTreeMap<String, PublicKeyShare>,
    private_shares: BTreeMap<String, PrivateKeyShare>,
    indices: BTreeMap<String, u64>,

    /// Encrypted polynomial evaluations, keyed by dealer and then by recipient
    evaluations: BTreeMap<String, BTreeMap<String, Ciphertext>>,

    /// `g^(P(0))` published by each dealer
    commitments: BTreeMap<String, ModInt>,

    stage1: BTreeSet<String>,
    stage2: BTreeSet<String>,
    stage3: BTreeSet<String>,
    public_key: Option<PublicKey>,
}

#[derive(Debug)]
pub struct KeyCeremony {
    config: CeremonyConfig,
    template: Key,
    state: Mutex<CeremonyState>,
}

impl KeyCeremony {
    /// Validate the configuration and generate a fresh template of `key_bits` bits
    pub fn new(rng: &mut impl CryptoRngCore, config: CeremonyConfig) -> Result<Self> {
        config.validate()?;
        let template = Key::generate(rng, config.key_bits)?;
        return Self::with_template(config, template);
    }

    /// Run the ceremony over an existing template
    pub fn with_template(config: CeremonyConfig, template: Key) -> Result<Self> {
        config.validate()?;
        return Ok(Self {
            config,
            template,
            state: Mutex::new(CeremonyState::default()),
        });
    }

    /// Every check runs before any write, so a poisoned lock still guards consistent state
    fn lock(&self) -> MutexGuard<'_, CeremonyState> {
        return self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }

    pub fn get_config(&self) -> &CeremonyConfig {
        return &self.config;
    }

    pub fn get_template(&self) -> &Key {
        return &self.template;
    }

    /// The next stage the authority may take part in: 1 before it joined, 4 once it holds its
    /// final share
    pub fn stage(&self, authority: &str) -> u8 {
        let state = self.lock();
        if state.stage3.contains(authority) {
            return 4;
        }
        if state.stage2.contains(authority) {
            return 3;
        }
        if state.stage1.contains(authority) {
            return 2;
        }
        return 1;
    }

    /// The 1-based share index assigned when the authority joined
    pub fn index_of(&self, authority: &str) -> Option<u64> {
        return self.lock().indices.get(authority).copied();
    }

    /// The assembled public key, once stage 4 completed
    pub fn public_key(&self) -> Option<PublicKey> {
        return self.lock().public_key;
    }

    /// Stage 1: draw a key share for the authority and assign its share index
    pub fn generate_key_share(
        &self,
        rng: &mut impl CryptoRngCore,
        authority: &str,
    ) -> Result<PrivateKeyShare> {
        let mut state = self.lock();
        if state.public_key.is_some() || !state.stage2.is_empty() {
            return Err(CeremonyError::StageClosed { stage: 1 }.into());
        }
        if state.stage1.len() >= self.config.max_authorities {
            return Err(CeremonyError::TooManyAuthorities {
                max: self.config.max_authorities,
            }
            .into());
        }
        if state.stage1.contains(authority) {
            return Err(CeremonyError::DuplicateParticipation {
                authority: authority.to_string(),
                stage: 1,
            }
            .into());
        }

        let (public, private) = self.template.gen_key_share(rng);
        let index = state.stage1.len() as u64 + 1;
        state.public_shares.insert(authority.to_string(), public);
        state.private_shares.insert(authority.to_string(), private);
        state.indices.insert(authority.to_string(), index);
        state.stage1.insert(authority.to_string());
        debug!("authority {authority} joined the key ceremony with share index {index}");
        return Ok(private);
    }

    /// Stage 2: deal the authority's polynomial to every stage 1 participant
    pub fn distribute_polynomial(&self, rng: &mut impl CryptoRngCore, authority: &str) -> Result<()> {
        let mut state = self.lock();
        self.require_threshold(2, state.stage1.len())?;
        if !state.stage3.is_empty() {
            return Err(CeremonyError::StageClosed { stage: 2 }.into());
        }
        if !state.stage1.contains(authority) {
            return Err(not_registered(authority, 1));
        }
        if state.stage2.contains(authority) {
            return Err(duplicate(authority, 2));
        }

        let q = self.template.get_q();
        let polynomial = Polynomial::random(rng, self.config.polynomial_degree(), q);
        let mut dealt = BTreeMap::new();
        for recipient in &state.stage1 {
            let point = ModInt::from_u64(state.indices[recipient]);
            let evaluation = polynomial.evaluate(&point);
            let ciphertext = state.public_shares[recipient].encrypt_squared(rng, &evaluation)?;
            dealt.insert(recipient.clone(), ciphertext);
        }
        let commitment = self.template.get_g().pow(&polynomial.get_secret());

        state.evaluations.insert(authority.to_string(), dealt);
        state.commitments.insert(authority.to_string(), commitment);
        state.stage2.insert(authority.to_string());
        debug!(
            "authority {authority} dealt its polynomial to {} participants",
            state.stage1.len()
        );
        return Ok(());
    }

    /// Stage 3: decrypt and sum every evaluation addressed to the authority into its final
    /// private share
    pub fn reconstruct_private_share(&self, authority: &str) -> Result<PrivateKeyShare> {
        let mut state = self.lock();
        self.require_threshold(3, state.stage2.len())?;
        if state.public_key.is_some() {
            return Err(CeremonyError::AlreadyFinalized.into());
        }
        if !state.stage2.contains(authority) {
            return Err(not_registered(authority, 2));
        }
        if state.stage3.contains(authority) {
            return Err(duplicate(authority, 3));
        }

        let private = state.private_shares[authority];
        let mut total = ModInt::zero(self.template.get_q());
        for (dealer, dealt) in &state.evaluations {
            let ciphertext = dealt
                .get(authority)
                .ok_or_else(|| CeremonyError::MissingEvaluation {
                    dealer: dealer.clone(),
                    recipient: authority.to_string(),
                })?;
            total = total + private.decrypt_squared(ciphertext)?;
        }

        state.stage3.insert(authority.to_string());
        debug!(
            "authority {authority} reconstructed its share from {} dealers",
            state.evaluations.len()
        );
        return Ok(PrivateKeyShare::new(self.template, total));
    }

    /// Stage 4: multiply the dealers' commitments into the public key. This happens once.
    pub fn assemble_public_key(&self) -> Result<PublicKey> {
        let mut state = self.lock();
        self.require_threshold(4, state.stage3.len())?;
        if state.public_key.is_some() {
            return Err(CeremonyError::AlreadyFinalized.into());
        }

        let h = state
            .stage2
            .iter()
            .map(|dealer| state.commitments[dealer])
            .fold(ModInt::one(self.template.get_p()), |h, commitment| h * commitment);
        let public_key = PublicKey::new(self.template, Some(h));
        state.public_key = Some(public_key);
        debug!("assembled the public key from {} dealers", state.stage2.len());
        return Ok(public_key);
    }

    /// A stage opens once the previous one has at least `safety_threshold` participants
    fn require_threshold(&self, stage: u8, found: usize) -> Result<()> {
        if found < self.config.safety_threshold {
            return Err(CeremonyError::ThresholdNotMet {
                stage,
                required: self.config.safety_threshold,
                found,
            }
            .into());
        }
        return Ok(());
    }
}

fn not_registered(authority: &str, stage: u8) -> crate::error::Error {
    return CeremonyError::NotRegistered {
        authority: authority.to_string(),
        stage,
    }
    .into();
}

fn duplicate(authority: &str, stage: u8) -> crate::error::Error {
    return CeremonyError::DuplicateParticipation {
        authority: authority.to_string(),
        stage,
    }
    .into();
}
