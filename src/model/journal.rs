//! Tamper-evident record of every committed command.

use data_encoding::HEXLOWER;
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::model::{
    common::{Identity, Timestamp},
    ledger::Event,
    pagination,
};

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A committed command, chained to its predecessor by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the journal, from 0.
    pub sequence: u64,
    pub caller: Identity,
    pub committed_at: Timestamp,
    pub event: Event,
    pub prev_hash: String,
    pub hash: String,
}

/// The hashed part of an entry.
#[derive(Serialize)]
struct EntryBody<'a> {
    sequence: u64,
    caller: &'a Identity,
    committed_at: &'a Timestamp,
    event: &'a Event,
}

impl JournalEntry {
    fn new(
        sequence: u64,
        caller: Identity,
        committed_at: Timestamp,
        event: Event,
        prev_hash: String,
    ) -> Self {
        let hash = entry_hash(&prev_hash, sequence, &caller, &committed_at, &event);
        Self {
            sequence,
            caller,
            committed_at,
            event,
            prev_hash,
            hash,
        }
    }

    /// Recompute this entry's hash from its contents.
    pub fn computed_hash(&self) -> String {
        entry_hash(
            &self.prev_hash,
            self.sequence,
            &self.caller,
            &self.committed_at,
            &self.event,
        )
    }
}

fn entry_hash(
    prev_hash: &str,
    sequence: u64,
    caller: &Identity,
    committed_at: &Timestamp,
    event: &Event,
) -> String {
    let body = EntryBody {
        sequence,
        caller,
        committed_at,
        event,
    };
    let body = serde_json::to_vec(&body).expect("journal entries always serialize to JSON");

    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(&body);
    HEXLOWER.encode(&hasher.finalize())
}

/// Ways a journal can fail verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("Entry {found} is out of sequence; expected {expected}")]
    OutOfSequence { expected: u64, found: u64 },
    #[error("Entry {sequence} does not link to its predecessor")]
    BrokenLink { sequence: u64 },
    #[error("Entry {sequence} has been altered")]
    HashMismatch { sequence: u64 },
}

/// Append-only, hash-chained journal.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Append a committed event and return the new entry.
    pub fn append(
        &mut self,
        caller: Identity,
        committed_at: Timestamp,
        event: Event,
    ) -> &JournalEntry {
        let entry = JournalEntry::new(
            self.len(),
            caller,
            committed_at,
            event,
            self.head_hash().to_string(),
        );
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self, start: u64, count: u64) -> Vec<JournalEntry> {
        pagination::page(&self.entries, start, count).to_vec()
    }

    pub fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash of the latest entry, or [`GENESIS_HASH`] if there is none.
    pub fn head_hash(&self) -> &str {
        self.entries
            .last()
            .map(|entry| entry.hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }

    /// Check that `entries` form an unbroken chain from genesis.
    pub fn verify(entries: &[JournalEntry]) -> Result<(), JournalError> {
        let mut prev_hash = GENESIS_HASH;
        for (expected, entry) in (0u64..).zip(entries) {
            if entry.sequence != expected {
                return Err(JournalError::OutOfSequence {
                    expected,
                    found: entry.sequence,
                });
            }
            if entry.prev_hash != prev_hash {
                return Err(JournalError::BrokenLink {
                    sequence: entry.sequence,
                });
            }
            if entry.computed_hash() != entry.hash {
                return Err(JournalError::HashMismatch {
                    sequence: entry.sequence,
                });
            }
            prev_hash = &entry.hash;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn journal_with(events: usize) -> Journal {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut journal = Journal::default();
        for n in 0..events {
            journal.append(
                Identity::admin_example(),
                start + Duration::seconds(n as i64),
                Event::ElectionCreated {
                    election_id: n as u64 + 1,
                },
            );
        }
        journal
    }

    #[test]
    fn empty_journal_starts_at_genesis() {
        let journal = Journal::default();
        assert!(journal.is_empty());
        assert_eq!(journal.head_hash(), GENESIS_HASH);
        assert_eq!(GENESIS_HASH.len(), 64);
        assert_eq!(Journal::verify(&[]), Ok(()));
    }

    #[test]
    fn entries_chain_together() {
        let journal = journal_with(3);
        let entries = journal.entries(0, 10);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].prev_hash, GENESIS_HASH);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert_eq!(entries[2].prev_hash, entries[1].hash);
        assert_eq!(journal.head_hash(), entries[2].hash);
        assert_eq!(Journal::verify(&entries), Ok(()));
    }

    #[test]
    fn tampering_is_detected() {
        let entries = journal_with(3).entries(0, 10);

        let mut altered = entries.clone();
        altered[1].caller = Identity::voter_example(1);
        assert_eq!(
            Journal::verify(&altered),
            Err(JournalError::HashMismatch { sequence: 1 })
        );

        let mut dropped = entries.clone();
        dropped.remove(1);
        assert_eq!(
            Journal::verify(&dropped),
            Err(JournalError::OutOfSequence {
                expected: 1,
                found: 2
            })
        );

        let mut relinked = entries;
        relinked[2].prev_hash = GENESIS_HASH.to_string();
        assert_eq!(
            Journal::verify(&relinked),
            Err(JournalError::BrokenLink { sequence: 2 })
        );
    }

    #[test]
    fn entries_survive_serialization() {
        let entries = journal_with(2).entries(0, 10);
        let json = serde_json::to_string(&entries).unwrap();
        let parsed: Vec<JournalEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(Journal::verify(&parsed), Ok(()));
    }

    #[test]
    fn hash_covers_the_whole_body() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let admin = Identity::admin_example();
        let event = Event::ElectionCreated { election_id: 1 };
        let hash = entry_hash(GENESIS_HASH, 0, &admin, &at, &event);

        let body = serde_json::to_vec(&EntryBody {
            sequence: 0,
            caller: &admin,
            committed_at: &at,
            event: &event,
        })
        .unwrap();
        assert!(!body.is_empty());
        let mut hasher = Sha256::new();
        hasher.update(GENESIS_HASH.as_bytes());
        hasher.update(&body);
        assert_eq!(hash, HEXLOWER.encode(&hasher.finalize()));

        let other = Event::ElectionCreated { election_id: 2 };
        assert_ne!(hash, entry_hash(GENESIS_HASH, 0, &admin, &at, &other));
    }

    #[test]
    fn pages_are_clamped() {
        let journal = journal_with(5);
        assert_eq!(journal.entries(3, 10).len(), 2);
        assert!(journal.entries(10, 10).is_empty());
        assert_eq!(journal.entries(1, 1)[0].sequence, 1);
    }
}
