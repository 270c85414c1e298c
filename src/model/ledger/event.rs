use serde::{Deserialize, Serialize};

use crate::model::{
    common::{Amount, CandidateId, ElectionId, Identity, Timestamp},
    credential::FundsCredit,
};

/// The observable outcome of a committed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    ElectionCreated {
        election_id: ElectionId,
    },
    CandidateAdded {
        election_id: ElectionId,
        candidate_id: CandidateId,
        name: String,
    },
    ElectionStarted {
        election_id: ElectionId,
        start_time: Timestamp,
    },
    ElectionEnded {
        election_id: ElectionId,
        end_time: Timestamp,
    },
    VoteCast {
        election_id: ElectionId,
        candidate_id: CandidateId,
        voter: Identity,
        timestamp: Timestamp,
    },
    CredentialCreated {
        wallet: Identity,
    },
    CredentialsCreated {
        wallets: Vec<Identity>,
    },
    CredentialStatusUpdated {
        wallet: Identity,
        is_active: bool,
    },
    CredentialsStatusUpdated {
        wallets: Vec<Identity>,
        is_active: bool,
    },
    FundsAdded {
        wallet: Identity,
        amount: Amount,
        /// Balance after the credit.
        balance: Amount,
    },
    FundsAddedBatch {
        credits: Vec<FundsCredit>,
    },
}
