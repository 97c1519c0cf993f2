//! Errors surfaced by the tally core. Nothing here is retried internally.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed {kind}: {reason}")]
    Parse { kind: &'static str, reason: String },

    #[error("value is not invertible under its modulus")]
    NotInvertible,

    #[error("division by zero")]
    DivisionByZero,

    #[error("ciphertext does not carry its encryption randomness")]
    MissingRandomness,

    #[error("public key has no public value h")]
    MissingPublicValue,

    #[error("plaintext is not a member of the proof domain")]
    NotInDomain,

    #[error("the claimed plaintext and randomness do not open the ciphertext")]
    WitnessMismatch,

    #[error("operands belong to different groups: p = {expected} and p = {found}")]
    GroupMismatch { expected: String, found: String },

    #[error("length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("no k in 0..={bound} satisfies f^k = {target}")]
    SearchSpaceExhausted { target: String, bound: u64 },

    #[error("no votes have been cast")]
    NoVotes,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid decryption shares: {0}")]
    InvalidShares(String),

    #[error(transparent)]
    Ceremony(#[from] CeremonyError),
}

impl Error {
    pub(crate) fn parse(kind: &'static str, reason: impl Into<String>) -> Self {
        return Error::Parse {
            kind,
            reason: reason.into(),
        };
    }
}

/// Protocol violations during the key ceremony. These abort the offending authority's action
/// and leave the ceremony state untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CeremonyError {
    #[error("stage {stage} is closed because a later stage has begun")]
    StageClosed { stage: u8 },

    #[error("stage {stage} needs {required} participants from the previous stage, found {found}")]
    ThresholdNotMet {
        stage: u8,
        required: usize,
        found: usize,
    },

    #[error("authority {authority} did not complete stage {stage}")]
    NotRegistered { authority: String, stage: u8 },

    #[error("authority {authority} attempted stage {stage} more than once")]
    DuplicateParticipation { authority: String, stage: u8 },

    #[error("ceremony is limited to {max} authorities")]
    TooManyAuthorities { max: usize },

    #[error("public key has already been assembled")]
    AlreadyFinalized,

    #[error("no polynomial evaluation from {dealer} addressed to {recipient}")]
    MissingEvaluation { dealer: String, recipient: String },
}
