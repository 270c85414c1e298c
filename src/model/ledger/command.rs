use serde::{Deserialize, Serialize};

use crate::model::{
    auth::OperationKind,
    common::{Amount, CandidateId, ElectionId, Identity},
    election::ElectionSpec,
};

/// A state change requested by a caller. Each command is applied whole or
/// not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    CreateElection(ElectionSpec),
    AddCandidate {
        election_id: ElectionId,
        name: String,
    },
    StartElection {
        election_id: ElectionId,
    },
    EndElection {
        election_id: ElectionId,
    },
    /// Cast the caller's vote.
    Vote {
        election_id: ElectionId,
        candidate_id: CandidateId,
    },
    CreateCredential {
        wallet: Identity,
    },
    CreateCredentialsBatch {
        wallets: Vec<Identity>,
    },
    UpdateCredentialStatus {
        wallet: Identity,
        is_active: bool,
    },
    UpdateCredentialsStatusBatch {
        wallets: Vec<Identity>,
        is_active: bool,
    },
    AddFunds {
        wallet: Identity,
        amount: Amount,
    },
    /// Split `total_amount` evenly across `wallets`.
    AddFundsBatch {
        wallets: Vec<Identity>,
        total_amount: Amount,
    },
}

impl Command {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateElection(_) => OperationKind::CreateElection,
            Self::AddCandidate { .. } => OperationKind::AddCandidate,
            Self::StartElection { .. } => OperationKind::StartElection,
            Self::EndElection { .. } => OperationKind::EndElection,
            Self::Vote { .. } => OperationKind::Vote,
            Self::CreateCredential { .. } => OperationKind::CreateCredential,
            Self::CreateCredentialsBatch { .. } => OperationKind::CreateCredentialsBatch,
            Self::UpdateCredentialStatus { .. } => OperationKind::UpdateCredentialStatus,
            Self::UpdateCredentialsStatusBatch { .. } => {
                OperationKind::UpdateCredentialsStatusBatch
            }
            Self::AddFunds { .. } => OperationKind::AddFunds,
            Self::AddFundsBatch { .. } => OperationKind::AddFundsBatch,
        }
    }
}
