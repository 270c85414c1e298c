use std::collections::HashMap;

use thiserror::Error;

use crate::model::common::CandidateId;

use super::ElectionDump;

/// Ways an election dump can contradict itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DumpError {
    #[error("Election records {recorded} votes but its candidates sum to {counted}")]
    TotalMismatch { recorded: u64, counted: u64 },
    #[error("Election records {total_votes} votes but its timeline has {timeline} entries")]
    TimelineLength { total_votes: u64, timeline: u64 },
    #[error("Timeline entry {index} is for unknown candidate {candidate_id}")]
    UnknownCandidate {
        index: usize,
        candidate_id: CandidateId,
    },
    #[error("Candidate {candidate_id} records {recorded} votes but the timeline has {timeline}")]
    CandidateCount {
        candidate_id: CandidateId,
        recorded: u64,
        timeline: u64,
    },
    #[error("Timeline entry {index} is earlier than the one before it")]
    OutOfOrder { index: usize },
    #[error("Candidate vote counts overflow when summed")]
    CountOverflow,
}

impl ElectionDump {
    /// Check that the tallies, totals and timeline all tell the same story.
    pub fn verify(&self) -> Result<(), DumpError> {
        let counted = self
            .candidates
            .iter()
            .try_fold(0u64, |sum, candidate| sum.checked_add(candidate.vote_count))
            .ok_or(DumpError::CountOverflow)?;
        if self.details.total_votes != counted {
            return Err(DumpError::TotalMismatch {
                recorded: self.details.total_votes,
                counted,
            });
        }

        let timeline = self.timeline.len() as u64;
        if self.details.total_votes != timeline {
            return Err(DumpError::TimelineLength {
                total_votes: self.details.total_votes,
                timeline,
            });
        }

        let mut per_candidate: HashMap<CandidateId, u64> = self
            .candidates
            .iter()
            .map(|candidate| (candidate.id, 0))
            .collect();
        for (index, vote) in self.timeline.iter().enumerate() {
            match per_candidate.get_mut(&vote.candidate_id) {
                Some(count) => *count += 1,
                None => {
                    return Err(DumpError::UnknownCandidate {
                        index,
                        candidate_id: vote.candidate_id,
                    })
                }
            }
        }
        for candidate in &self.candidates {
            let timeline = per_candidate.get(&candidate.id).copied().unwrap_or_default();
            if candidate.vote_count != timeline {
                return Err(DumpError::CandidateCount {
                    candidate_id: candidate.id,
                    recorded: candidate.vote_count,
                    timeline,
                });
            }
        }

        if let Some(index) = self
            .timeline
            .windows(2)
            .position(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(DumpError::OutOfOrder { index: index + 1 });
        }

        Ok(())
    }
}
