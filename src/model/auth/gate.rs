use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use thiserror::Error;

use crate::model::{common::Identity, credential::CredentialLookup};

/// Every mutating operation the ledger accepts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    CreateElection,
    AddCandidate,
    StartElection,
    EndElection,
    Vote,
    CreateCredential,
    CreateCredentialsBatch,
    UpdateCredentialStatus,
    UpdateCredentialsStatusBatch,
    AddFunds,
    AddFundsBatch,
}

impl OperationKind {
    /// The role a caller must hold to perform this operation.
    pub fn required_role(self) -> Role {
        match self {
            Self::Vote => Role::Voter,
            _ => Role::Admin,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Role {
    Voter = 0,
    Admin = 1,
}

impl Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Caller is not the administrator")]
    NotAdmin,
    #[error("Caller does not hold an active credential")]
    InactiveOrUnknownCredential,
}

/// Decides whether a caller may perform an operation.
///
/// Administration belongs to a single identity fixed at genesis. Voting
/// belongs to whoever holds an active credential at the moment of the vote,
/// which is why the gate consults the registry rather than caching roles.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    admin: Identity,
}

impl AuthorizationGate {
    pub fn new(admin: Identity) -> Self {
        Self { admin }
    }

    pub fn admin(&self) -> &Identity {
        &self.admin
    }

    pub fn is_admin(&self, caller: &Identity) -> bool {
        &self.admin == caller
    }

    pub fn authorize(
        &self,
        caller: &Identity,
        operation: OperationKind,
        credentials: &impl CredentialLookup,
    ) -> Result<(), AuthError> {
        match operation.required_role() {
            Role::Admin if !self.is_admin(caller) => Err(AuthError::NotAdmin),
            Role::Voter if !credentials.is_active_credential(caller) => {
                Err(AuthError::InactiveOrUnknownCredential)
            }
            _ => Ok(()),
        }
    }
}
