use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    auth::AuthError,
    common::{CandidateId, ElectionId, Identity},
    election::{ElectionStatus, VotingWindow},
};

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Every way a ledger command or query can be refused. A refused command
/// leaves the ledger exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Election {0} not found")]
    ElectionNotFound(ElectionId),
    #[error("Candidate {candidate_id} not found in election {election_id}")]
    CandidateNotFound {
        election_id: ElectionId,
        candidate_id: CandidateId,
    },
    #[error("No credential registered for {0}")]
    CredentialNotFound(Identity),
    #[error("Election {election_id} is {actual:?}; operation requires {required:?}")]
    InvalidState {
        election_id: ElectionId,
        required: ElectionStatus,
        actual: ElectionStatus,
    },
    #[error("Election {0} has no candidates")]
    NoCandidates(ElectionId),
    #[error("End time must be after start time")]
    InvalidTimeRange,
    #[error("Voter {voter} has already voted in election {election_id}")]
    AlreadyVoted {
        election_id: ElectionId,
        voter: Identity,
    },
    #[error("Credential already exists for {0}")]
    AlreadyExists(Identity),
    #[error("Invalid amount: {0}")]
    InvalidAmount(&'static str),
    #[error("Batch must contain at least one wallet")]
    EmptyBatch,
    #[error("Election {election_id} is not accepting votes: {window:?}")]
    OutsideVotingWindow {
        election_id: ElectionId,
        window: VotingWindow,
    },
}

/// The invariant a refused command violated, for clients to translate into
/// their own messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InvalidTimeRange,
    AlreadyVoted,
    AlreadyExists,
    NotAdmin,
    InactiveOrUnknownCredential,
    InvalidAmount,
    EmptyBatch,
    OutsideVotingWindow,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(AuthError::NotAdmin) => ErrorKind::NotAdmin,
            Self::Auth(AuthError::InactiveOrUnknownCredential) => {
                ErrorKind::InactiveOrUnknownCredential
            }
            Self::ElectionNotFound(_)
            | Self::CandidateNotFound { .. }
            | Self::CredentialNotFound(_) => ErrorKind::NotFound,
            Self::InvalidState { .. } | Self::NoCandidates(_) => ErrorKind::InvalidState,
            Self::InvalidTimeRange => ErrorKind::InvalidTimeRange,
            Self::AlreadyVoted { .. } => ErrorKind::AlreadyVoted,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::EmptyBatch => ErrorKind::EmptyBatch,
            Self::OutsideVotingWindow { .. } => ErrorKind::OutsideVotingWindow,
        }
    }
}
