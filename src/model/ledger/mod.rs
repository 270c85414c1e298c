//! The single entry point through which all ledger state is read and written.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::{
    auth::AuthorizationGate,
    clock::Clock,
    common::{CandidateId, ElectionId, Identity, Timestamp},
    credential::{Credential, CredentialLookup, CredentialRegistry},
    election::{Candidate, ElectionDetails, ElectionDump, ElectionStore},
    errors::LedgerResult,
    journal::{Journal, JournalEntry},
    vote::{VoteEvent, VoteLedger},
};

mod command;
mod event;

pub use command::Command;
pub use event::Event;

/// Everything the ledger owns, behind one lock.
struct LedgerState {
    gate: AuthorizationGate,
    elections: ElectionStore,
    votes: VoteLedger,
    credentials: CredentialRegistry,
    journal: Journal,
    /// Latest time any command observed.
    last_now: Option<Timestamp>,
}

impl LedgerState {
    /// Ledger time never runs backwards, even if the clock does.
    fn observe(&mut self, now: Timestamp) -> Timestamp {
        let now = self.last_now.map_or(now, |last| last.max(now));
        self.last_now = Some(now);
        now
    }

    fn apply(
        &mut self,
        caller: &Identity,
        command: Command,
        now: Timestamp,
    ) -> LedgerResult<Event> {
        let event = match command {
            Command::CreateElection(spec) => Event::ElectionCreated {
                election_id: self.elections.create_election(spec)?,
            },
            Command::AddCandidate { election_id, name } => Event::CandidateAdded {
                election_id,
                candidate_id: self.elections.add_candidate(election_id, name.clone())?,
                name,
            },
            Command::StartElection { election_id } => Event::ElectionStarted {
                election_id,
                start_time: self.elections.start_election(election_id, now)?,
            },
            Command::EndElection { election_id } => Event::ElectionEnded {
                election_id,
                end_time: self.elections.end_election(election_id, now)?,
            },
            Command::Vote {
                election_id,
                candidate_id,
            } => {
                let vote = self.votes.vote(
                    &mut self.elections,
                    election_id,
                    candidate_id,
                    caller.clone(),
                    now,
                )?;
                Event::VoteCast {
                    election_id,
                    candidate_id: vote.candidate_id,
                    voter: caller.clone(),
                    timestamp: vote.timestamp,
                }
            }
            Command::CreateCredential { wallet } => {
                self.credentials.create_credential(wallet.clone(), now)?;
                Event::CredentialCreated { wallet }
            }
            Command::CreateCredentialsBatch { wallets } => Event::CredentialsCreated {
                wallets: self.credentials.create_credentials_batch(wallets, now)?,
            },
            Command::UpdateCredentialStatus { wallet, is_active } => {
                self.credentials
                    .update_credential_status(&wallet, is_active)?;
                Event::CredentialStatusUpdated { wallet, is_active }
            }
            Command::UpdateCredentialsStatusBatch { wallets, is_active } => {
                Event::CredentialsStatusUpdated {
                    wallets: self
                        .credentials
                        .update_credentials_status_batch(wallets, is_active)?,
                    is_active,
                }
            }
            Command::AddFunds { wallet, amount } => Event::FundsAdded {
                balance: self.credentials.add_funds(&wallet, amount)?,
                wallet,
                amount,
            },
            Command::AddFundsBatch {
                wallets,
                total_amount,
            } => Event::FundsAddedBatch {
                credits: self.credentials.add_funds_batch(wallets, total_amount)?,
            },
        };
        Ok(event)
    }
}

/// A serialized, authorization-gated election ledger.
///
/// Commands are applied one at a time under a write lock, each against a
/// consistent view of every store. Queries share a read lock, so they
/// always see the last committed state and never a command half-applied.
pub struct Ledger {
    clock: Arc<dyn Clock>,
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// A fresh ledger administered by `admin`.
    pub fn new(admin: Identity, clock: impl Clock + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
            state: RwLock::new(LedgerState {
                gate: AuthorizationGate::new(admin),
                elections: ElectionStore::default(),
                votes: VoteLedger::default(),
                credentials: CredentialRegistry::default(),
                journal: Journal::default(),
                last_now: None,
            }),
        }
    }

    /// Authorize `command` for `caller` and apply it. On success the
    /// resulting event is journaled and returned; on failure nothing changes.
    pub fn execute(&self, caller: &Identity, command: Command) -> LedgerResult<Event> {
        let mut state = self.write();
        let now = state.observe(self.clock.now());
        let kind = command.kind();

        let result = state
            .gate
            .authorize(caller, kind, &state.credentials)
            .map_err(Into::into)
            .and_then(|_| state.apply(caller, command, now));

        match result {
            Ok(event) => {
                match &event {
                    Event::VoteCast {
                        election_id,
                        candidate_id,
                        ..
                    } => {
                        debug!("Vote cast in election {election_id} for candidate {candidate_id}")
                    }
                    Event::FundsAddedBatch { credits } => {
                        info!("Funded {} wallets", credits.len())
                    }
                    Event::CredentialsCreated { wallets }
                    | Event::CredentialsStatusUpdated { wallets, .. } => {
                        info!("{kind:?} applied to {} wallets", wallets.len())
                    }
                    other => info!("{caller} committed {other:?}"),
                }
                state.journal.append(caller.clone(), now, event.clone());
                Ok(event)
            }
            Err(err) => {
                warn!("Refused {kind:?} from {caller}: {err}");
                Err(err)
            }
        }
    }

    /// Current ledger time. Never earlier than any committed command.
    pub fn now(&self) -> Timestamp {
        let now = self.clock.now();
        self.read().last_now.map_or(now, |last| last.max(now))
    }

    pub fn admin(&self) -> Identity {
        self.read().gate.admin().clone()
    }

    pub fn is_admin(&self, caller: &Identity) -> bool {
        self.read().gate.is_admin(caller)
    }

    pub fn election_details(&self, election_id: ElectionId) -> LedgerResult<ElectionDetails> {
        let now = self.now();
        let state = self.read();
        Ok(ElectionDetails::new(state.elections.get(election_id)?, now))
    }

    pub fn all_candidates(&self, election_id: ElectionId) -> LedgerResult<Vec<Candidate>> {
        Ok(self.read().elections.candidates(election_id)?.to_vec())
    }

    pub fn candidate(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> LedgerResult<Candidate> {
        self.read()
            .elections
            .candidate(election_id, candidate_id)
            .cloned()
    }

    /// Whether `voter` has voted in the election, which must exist.
    pub fn has_voted(&self, election_id: ElectionId, voter: &Identity) -> LedgerResult<bool> {
        let state = self.read();
        state.elections.get(election_id)?;
        Ok(state.votes.has_voted(election_id, voter))
    }

    /// The election's vote timeline, oldest first.
    pub fn vote_timestamps(&self, election_id: ElectionId) -> LedgerResult<Vec<VoteEvent>> {
        let state = self.read();
        state.elections.get(election_id)?;
        Ok(state.votes.timeline(election_id).to_vec())
    }

    pub fn elections_count(&self) -> u64 {
        self.read().elections.count()
    }

    pub fn active_elections(&self) -> Vec<ElectionId> {
        self.read().elections.active_ids()
    }

    pub fn is_active_credential(&self, wallet: &Identity) -> bool {
        self.read().credentials.is_active_credential(wallet)
    }

    pub fn credential(&self, wallet: &Identity) -> Option<Credential> {
        self.read().credentials.credential(wallet).cloned()
    }

    pub fn credentials(&self, start: u64, count: u64) -> Vec<Credential> {
        self.read().credentials.credentials(start, count)
    }

    pub fn credential_count(&self) -> u64 {
        self.read().credentials.count()
    }

    /// Details, tallies and timeline of one election, all from the same
    /// committed state.
    pub fn election_dump(&self, election_id: ElectionId) -> LedgerResult<ElectionDump> {
        let now = self.now();
        let state = self.read();
        let election = state.elections.get(election_id)?;
        Ok(ElectionDump {
            details: ElectionDetails::new(election, now),
            candidates: election.candidates.clone(),
            timeline: state.votes.timeline(election_id).to_vec(),
        })
    }

    pub fn journal(&self, start: u64, count: u64) -> Vec<JournalEntry> {
        self.read().journal.entries(start, count)
    }

    pub fn journal_len(&self) -> u64 {
        self.read().journal.len()
    }

    pub fn journal_head(&self) -> String {
        self.read().journal.head_hash().to_string()
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().expect("ledger lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().expect("ledger lock poisoned")
    }
}
