use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::{
    common::{CandidateId, ElectionId, Timestamp},
    vote::VoteEvent,
};

mod audit;
mod store;

pub use audit::DumpError;
pub use store::ElectionStore;

/// Phases in the election lifecycle. Transitions only ever move forward.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ElectionStatus {
    /// Under construction; candidates may be added.
    Created = 0,
    /// Administratively open. Votes are accepted only inside the voting window.
    Active = 1,
    /// Finished; counts are frozen.
    Closed = 2,
}

/// Where the current time falls relative to an election's voting window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VotingWindow {
    NotStarted,
    Open,
    Ended,
}

/// A single candidate and their running tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub vote_count: u64,
}

/// Everything an admin supplies when creating an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Unset means no lower bound on the voting window.
    #[serde(default)]
    pub start_time: Option<Timestamp>,
    /// Unset means no upper bound on the voting window.
    #[serde(default)]
    pub end_time: Option<Timestamp>,
}

/// An election record, as owned by the [`ElectionStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub id: ElectionId,
    pub name: String,
    pub description: String,
    pub status: ElectionStatus,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    /// In ID order.
    pub candidates: Vec<Candidate>,
    /// Always equal to the sum of the candidates' vote counts.
    pub total_votes: u64,
}

impl Election {
    /// Where `now` falls relative to this election's voting window. This is
    /// independent of the election's status.
    pub fn window(&self, now: Timestamp) -> VotingWindow {
        match (self.start_time, self.end_time) {
            (Some(start), _) if now < start => VotingWindow::NotStarted,
            (_, Some(end)) if now > end => VotingWindow::Ended,
            _ => VotingWindow::Open,
        }
    }

    /// Active and inside the voting window.
    pub fn is_votable(&self, now: Timestamp) -> bool {
        self.status == ElectionStatus::Active && self.window(now) == VotingWindow::Open
    }

    pub fn candidate(&self, candidate_id: CandidateId) -> Option<&Candidate> {
        // IDs are sequential from 1, so the ID is also the position.
        let index = usize::try_from(candidate_id).ok()?.checked_sub(1)?;
        self.candidates.get(index)
    }

    fn candidate_mut(&mut self, candidate_id: CandidateId) -> Option<&mut Candidate> {
        let index = usize::try_from(candidate_id).ok()?.checked_sub(1)?;
        self.candidates.get_mut(index)
    }
}

/// The public view of an election, without its candidate list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDetails {
    pub id: ElectionId,
    pub name: String,
    pub description: String,
    pub status: ElectionStatus,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub candidates_count: u32,
    pub total_votes: u64,
    /// Only meaningful while the election is active.
    pub window: Option<VotingWindow>,
}

impl ElectionDetails {
    pub fn new(election: &Election, now: Timestamp) -> Self {
        Self {
            id: election.id,
            name: election.name.clone(),
            description: election.description.clone(),
            status: election.status,
            start_time: election.start_time,
            end_time: election.end_time,
            candidates_count: election.candidates.len() as u32,
            total_votes: election.total_votes,
            window: (election.status == ElectionStatus::Active).then(|| election.window(now)),
        }
    }
}

/// A consistent snapshot of one election: details, tallies and timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDump {
    pub details: ElectionDetails,
    pub candidates: Vec<Candidate>,
    pub timeline: Vec<VoteEvent>,
}
