use serde::{Deserialize, Serialize};

use crate::model::common::{Amount, Identity, Timestamp};

mod registry;

pub use registry::{CredentialLookup, CredentialRegistry, FundsCredit};

/// A registered identity: permission to vote and to hold a tracked balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub wallet: Identity,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub balance: Amount,
}

impl Credential {
    /// A fresh credential: active, with nothing in it.
    pub fn new(wallet: Identity, created_at: Timestamp) -> Self {
        Self {
            wallet,
            is_active: true,
            created_at,
            balance: 0,
        }
    }
}
