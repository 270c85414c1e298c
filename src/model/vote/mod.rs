use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::{CandidateId, ElectionId, Identity, Timestamp},
    election::ElectionStore,
    errors::{LedgerError, LedgerResult},
};

/// One entry in an election's vote timeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEvent {
    pub candidate_id: CandidateId,
    pub timestamp: Timestamp,
}

/// Votes recorded for a single election.
#[derive(Debug, Default)]
struct ElectionVotes {
    voters: HashSet<Identity>,
    /// Append-only, in commit order.
    timeline: Vec<VoteEvent>,
}

/// Owner of who has voted where, and when each vote landed.
///
/// Tallies live on the candidates themselves, so a vote touches both this
/// ledger and the [`ElectionStore`]. [`VoteLedger::vote`] checks everything
/// up front and only then mutates both, so either every part of a vote is
/// recorded or none of it is.
#[derive(Debug, Default)]
pub struct VoteLedger {
    votes: HashMap<ElectionId, ElectionVotes>,
}

impl VoteLedger {
    /// Record `voter`'s vote for `candidate_id`. The caller is expected to
    /// have been authorized already.
    pub fn vote(
        &mut self,
        elections: &mut ElectionStore,
        election_id: ElectionId,
        candidate_id: CandidateId,
        voter: Identity,
        now: Timestamp,
    ) -> LedgerResult<VoteEvent> {
        elections.check_votable(election_id, candidate_id, now)?;
        if self.has_voted(election_id, &voter) {
            return Err(LedgerError::AlreadyVoted { election_id, voter });
        }

        let event = VoteEvent {
            candidate_id,
            timestamp: now,
        };
        let votes = self.votes.entry(election_id).or_default();
        votes.voters.insert(voter);
        votes.timeline.push(event);
        elections.record_vote(election_id, candidate_id);
        Ok(event)
    }

    pub fn has_voted(&self, election_id: ElectionId, voter: &Identity) -> bool {
        self.votes
            .get(&election_id)
            .map(|votes| votes.voters.contains(voter))
            .unwrap_or(false)
    }

    /// Every vote cast in the election, oldest first.
    pub fn timeline(&self, election_id: ElectionId) -> &[VoteEvent] {
        self.votes
            .get(&election_id)
            .map(|votes| votes.timeline.as_slice())
            .unwrap_or_default()
    }

    pub fn voter_count(&self, election_id: ElectionId) -> usize {
        self.votes
            .get(&election_id)
            .map(|votes| votes.voters.len())
            .unwrap_or(0)
    }
}
