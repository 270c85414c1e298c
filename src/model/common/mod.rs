use chrono::{DateTime, Utc};

mod identity;

pub use identity::Identity;

/// Election IDs are assigned sequentially from 1.
pub type ElectionId = u64;
/// Candidate IDs are scoped to their election and assigned sequentially from 1.
pub type CandidateId = u32;
/// Custodial balances, in the smallest indivisible unit.
pub type Amount = u128;
/// Ledger time.
pub type Timestamp = DateTime<Utc>;
