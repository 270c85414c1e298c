use crate::model::{
    common::{CandidateId, ElectionId, Timestamp},
    errors::{LedgerError, LedgerResult},
};

use super::{Candidate, Election, ElectionSpec, ElectionStatus};

/// Owner of all election and candidate records.
#[derive(Debug, Default)]
pub struct ElectionStore {
    /// Election `n` lives at index `n - 1`.
    elections: Vec<Election>,
}

impl ElectionStore {
    /// Create an election in the `Created` phase and return its ID.
    ///
    /// A bound at the Unix epoch is treated as unset.
    pub fn create_election(&mut self, spec: ElectionSpec) -> LedgerResult<ElectionId> {
        let start_time = spec.start_time.filter(|time| time.timestamp() != 0);
        let end_time = spec.end_time.filter(|time| time.timestamp() != 0);
        if let (Some(start), Some(end)) = (start_time, end_time) {
            if end <= start {
                return Err(LedgerError::InvalidTimeRange);
            }
        }

        let id = ElectionId::try_from(self.elections.len())
            .ok()
            .and_then(|len| len.checked_add(1))
            .expect("election ID space exhausted");
        self.elections.push(Election {
            id,
            name: spec.name,
            description: spec.description,
            status: ElectionStatus::Created,
            start_time,
            end_time,
            candidates: Vec::new(),
            total_votes: 0,
        });
        Ok(id)
    }

    pub fn add_candidate(
        &mut self,
        election_id: ElectionId,
        name: String,
    ) -> LedgerResult<CandidateId> {
        let election = self.require_status(election_id, ElectionStatus::Created)?;
        let candidate_id = CandidateId::try_from(election.candidates.len())
            .ok()
            .and_then(|len| len.checked_add(1))
            .expect("candidate ID space exhausted");
        election.candidates.push(Candidate {
            id: candidate_id,
            name,
            vote_count: 0,
        });
        Ok(candidate_id)
    }

    /// Open the election. An unset start time is stamped with `now`, so the
    /// election is votable straight away. Returns the effective start time.
    pub fn start_election(
        &mut self,
        election_id: ElectionId,
        now: Timestamp,
    ) -> LedgerResult<Timestamp> {
        let election = self.require_status(election_id, ElectionStatus::Created)?;
        if election.candidates.is_empty() {
            return Err(LedgerError::NoCandidates(election_id));
        }
        election.status = ElectionStatus::Active;
        Ok(*election.start_time.get_or_insert(now))
    }

    /// Close the election for good. The end time is stamped with `now` unless
    /// the window had already run out, so it records when voting really
    /// stopped. It is never earlier than the start time. Returns the
    /// effective end time.
    pub fn end_election(
        &mut self,
        election_id: ElectionId,
        now: Timestamp,
    ) -> LedgerResult<Timestamp> {
        let election = self.require_status(election_id, ElectionStatus::Active)?;
        election.status = ElectionStatus::Closed;
        let end_time = match election.end_time {
            Some(end) if end <= now => end,
            _ => now,
        };
        let end_time = election.start_time.map_or(end_time, |start| end_time.max(start));
        election.end_time = Some(end_time);
        Ok(end_time)
    }

    pub fn get(&self, election_id: ElectionId) -> LedgerResult<&Election> {
        usize::try_from(election_id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| self.elections.get(index))
            .ok_or(LedgerError::ElectionNotFound(election_id))
    }

    pub fn candidates(&self, election_id: ElectionId) -> LedgerResult<&[Candidate]> {
        Ok(&self.get(election_id)?.candidates)
    }

    pub fn candidate(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> LedgerResult<&Candidate> {
        self.get(election_id)?
            .candidate(candidate_id)
            .ok_or(LedgerError::CandidateNotFound {
                election_id,
                candidate_id,
            })
    }

    pub fn count(&self) -> u64 {
        self.elections.len() as u64
    }

    /// IDs of every election in the `Active` phase, whether or not its
    /// window is currently open.
    pub fn active_ids(&self) -> Vec<ElectionId> {
        self.elections
            .iter()
            .filter(|election| election.status == ElectionStatus::Active)
            .map(|election| election.id)
            .collect()
    }

    /// Check that a vote for `candidate_id` would be accepted at `now`.
    pub fn check_votable(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
        now: Timestamp,
    ) -> LedgerResult<()> {
        let election = self.get(election_id)?;
        if election.status != ElectionStatus::Active {
            return Err(LedgerError::InvalidState {
                election_id,
                required: ElectionStatus::Active,
                actual: election.status,
            });
        }
        if !election.is_votable(now) {
            return Err(LedgerError::OutsideVotingWindow {
                election_id,
                window: election.window(now),
            });
        }
        election
            .candidate(candidate_id)
            .map(|_| ())
            .ok_or(LedgerError::CandidateNotFound {
                election_id,
                candidate_id,
            })
    }

    /// Count one vote. Must only follow a successful [`Self::check_votable`].
    pub fn record_vote(&mut self, election_id: ElectionId, candidate_id: CandidateId) {
        let election = self
            .get_mut(election_id)
            .expect("vote recorded against unchecked election");
        let candidate = election
            .candidate_mut(candidate_id)
            .expect("vote recorded against unchecked candidate");
        candidate.vote_count += 1;
        election.total_votes += 1;
    }

    fn get_mut(&mut self, election_id: ElectionId) -> Option<&mut Election> {
        usize::try_from(election_id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| self.elections.get_mut(index))
    }

    fn require_status(
        &mut self,
        election_id: ElectionId,
        required: ElectionStatus,
    ) -> LedgerResult<&mut Election> {
        let election = self
            .get_mut(election_id)
            .ok_or(LedgerError::ElectionNotFound(election_id))?;
        if election.status != required {
            return Err(LedgerError::InvalidState {
                election_id,
                required,
                actual: election.status,
            });
        }
        Ok(election)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::model::election::VotingWindow;

    use super::*;

    fn now() -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn store_with_candidates(names: &[&str]) -> (ElectionStore, ElectionId) {
        let mut store = ElectionStore::default();
        let id = store.create_election(ElectionSpec::example()).unwrap();
        for name in names {
            store.add_candidate(id, name.to_string()).unwrap();
        }
        (store, id)
    }

    #[test]
    fn ids_are_sequential_from_one() {
        let mut store = ElectionStore::default();
        assert_eq!(store.create_election(ElectionSpec::example()), Ok(1));
        assert_eq!(store.create_election(ElectionSpec::example()), Ok(2));
        assert_eq!(store.count(), 2);

        assert_eq!(store.add_candidate(2, "X".to_string()), Ok(1));
        assert_eq!(store.add_candidate(2, "Y".to_string()), Ok(2));
        assert_eq!(store.add_candidate(1, "Z".to_string()), Ok(1));

        let names: Vec<_> = store
            .candidates(2)
            .unwrap()
            .iter()
            .map(|candidate| candidate.name.as_str())
            .collect();
        assert_eq!(names, vec!["X", "Y"]);
    }

    #[test]
    fn time_range_must_be_increasing() {
        let mut store = ElectionStore::default();
        let spec = ElectionSpec::windowed_example(now(), now());
        assert_eq!(
            store.create_election(spec),
            Err(LedgerError::InvalidTimeRange)
        );
        let spec = ElectionSpec::windowed_example(now(), now() - Duration::seconds(1));
        assert_eq!(
            store.create_election(spec),
            Err(LedgerError::InvalidTimeRange)
        );
        assert_eq!(store.count(), 0);

        // A zero bound counts as unset, so it can't make the range invalid.
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let id = store
            .create_election(ElectionSpec::windowed_example(now(), epoch))
            .unwrap();
        assert_eq!(store.get(id).unwrap().end_time, None);
    }

    #[test]
    fn phases_only_move_forward() {
        let (mut store, id) = store_with_candidates(&["X"]);

        assert!(matches!(
            store.end_election(id, now()),
            Err(LedgerError::InvalidState { .. })
        ));
        store.start_election(id, now()).unwrap();
        assert!(matches!(
            store.start_election(id, now()),
            Err(LedgerError::InvalidState { .. })
        ));
        assert!(matches!(
            store.add_candidate(id, "late".to_string()),
            Err(LedgerError::InvalidState { .. })
        ));
        store.end_election(id, now()).unwrap();
        assert!(matches!(
            store.start_election(id, now()),
            Err(LedgerError::InvalidState { .. })
        ));
        assert!(matches!(
            store.end_election(id, now()),
            Err(LedgerError::InvalidState { .. })
        ));
        assert_eq!(store.get(id).unwrap().status, ElectionStatus::Closed);
    }

    #[test]
    fn start_requires_a_candidate() {
        let (mut store, id) = store_with_candidates(&[]);
        assert_eq!(
            store.start_election(id, now()),
            Err(LedgerError::NoCandidates(id))
        );
        assert_eq!(store.get(id).unwrap().status, ElectionStatus::Created);
    }

    #[test]
    fn transitions_stamp_unset_times() {
        let (mut store, id) = store_with_candidates(&["X"]);
        assert_eq!(store.start_election(id, now()), Ok(now()));
        let later = now() + Duration::minutes(5);
        assert_eq!(store.end_election(id, later), Ok(later));

        let election = store.get(id).unwrap();
        assert_eq!(election.start_time, Some(now()));
        assert_eq!(election.end_time, Some(later));
    }

    #[test]
    fn closing_early_never_ends_before_start() {
        let mut store = ElectionStore::default();
        let start = now() + Duration::hours(1);
        let end = now() + Duration::hours(2);
        let id = store
            .create_election(ElectionSpec::windowed_example(start, end))
            .unwrap();
        store.add_candidate(id, "X".to_string()).unwrap();

        // A configured start time is kept even if the admin starts early.
        assert_eq!(store.start_election(id, now()), Ok(start));
        assert_eq!(store.end_election(id, now()), Ok(start));

        let election = store.get(id).unwrap();
        let (start_time, end_time) = (election.start_time.unwrap(), election.end_time.unwrap());
        assert!(end_time >= start_time);
    }

    #[test]
    fn closing_inside_the_window_records_actual_end() {
        let mut store = ElectionStore::default();
        let start = now() - Duration::hours(1);
        let end = now() + Duration::hours(1);
        let id = store
            .create_election(ElectionSpec::windowed_example(start, end))
            .unwrap();
        store.add_candidate(id, "X".to_string()).unwrap();

        assert_eq!(store.start_election(id, start), Ok(start));
        assert_eq!(store.end_election(id, now()), Ok(now()));
    }

    #[test]
    fn missing_records_are_not_found() {
        let (store, id) = store_with_candidates(&["X"]);
        assert_eq!(store.get(0).unwrap_err(), LedgerError::ElectionNotFound(0));
        assert_eq!(
            store.get(id + 1).unwrap_err(),
            LedgerError::ElectionNotFound(id + 1)
        );
        assert_eq!(
            store.candidate(id, 2).unwrap_err(),
            LedgerError::CandidateNotFound {
                election_id: id,
                candidate_id: 2
            }
        );
        assert!(store.candidate(id, 0).is_err());
    }

    #[test]
    fn votes_need_active_phase_and_open_window() {
        let mut store = ElectionStore::default();
        let start = now() + Duration::hours(1);
        let end = now() + Duration::hours(2);
        let id = store
            .create_election(ElectionSpec::windowed_example(start, end))
            .unwrap();
        store.add_candidate(id, "X".to_string()).unwrap();

        assert!(matches!(
            store.check_votable(id, 1, start),
            Err(LedgerError::InvalidState { .. })
        ));

        store.start_election(id, now()).unwrap();
        assert_eq!(store.active_ids(), vec![id]);
        assert_eq!(
            store.check_votable(id, 1, now()),
            Err(LedgerError::OutsideVotingWindow {
                election_id: id,
                window: VotingWindow::NotStarted
            })
        );
        assert_eq!(store.check_votable(id, 1, start), Ok(()));
        assert!(store.check_votable(id, 2, start).is_err());
        assert_eq!(
            store.check_votable(id, 1, end + Duration::seconds(1)),
            Err(LedgerError::OutsideVotingWindow {
                election_id: id,
                window: VotingWindow::Ended
            })
        );

        store.record_vote(id, 1);
        let election = store.get(id).unwrap();
        assert_eq!(election.total_votes, 1);
        assert_eq!(election.candidates[0].vote_count, 1);
    }
}
