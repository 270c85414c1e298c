use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    model::{
        auth::AuthToken,
        common::{CandidateId, ElectionId, Identity},
        election::{Candidate, ElectionDetails, ElectionDump, ElectionSpec},
        ledger::{Command, Event, Ledger},
        vote::VoteEvent,
    },
};

use super::commit;

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        add_candidate,
        start_election,
        end_election,
        elections_count,
        active_elections,
        election,
        candidates,
        candidate,
        has_voted,
        timeline,
        dump,
    ]
}

/// Body of an add-candidate request.
#[derive(Debug, Serialize, Deserialize)]
pub struct NewCandidate {
    pub name: String,
}

#[post("/elections", data = "<spec>", format = "json")]
fn create_election(
    token: AuthToken,
    spec: Json<ElectionSpec>,
    ledger: &State<Ledger>,
) -> Result<Json<Event>> {
    commit(ledger, &token, Command::CreateElection(spec.into_inner()))
}

#[post("/elections/<election_id>/candidates", data = "<candidate>", format = "json")]
fn add_candidate(
    token: AuthToken,
    election_id: ElectionId,
    candidate: Json<NewCandidate>,
    ledger: &State<Ledger>,
) -> Result<Json<Event>> {
    commit(
        ledger,
        &token,
        Command::AddCandidate {
            election_id,
            name: candidate.into_inner().name,
        },
    )
}

#[post("/elections/<election_id>/start")]
fn start_election(
    token: AuthToken,
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<Event>> {
    commit(ledger, &token, Command::StartElection { election_id })
}

#[post("/elections/<election_id>/end")]
fn end_election(
    token: AuthToken,
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<Event>> {
    commit(ledger, &token, Command::EndElection { election_id })
}

#[get("/elections/count")]
fn elections_count(ledger: &State<Ledger>) -> Json<u64> {
    Json(ledger.elections_count())
}

/// Elections in the active phase, whether or not their window is open.
#[get("/elections/active")]
fn active_elections(ledger: &State<Ledger>) -> Json<Vec<ElectionId>> {
    Json(ledger.active_elections())
}

#[get("/elections/<election_id>")]
fn election(election_id: ElectionId, ledger: &State<Ledger>) -> Result<Json<ElectionDetails>> {
    Ok(Json(ledger.election_details(election_id)?))
}

#[get("/elections/<election_id>/candidates")]
fn candidates(election_id: ElectionId, ledger: &State<Ledger>) -> Result<Json<Vec<Candidate>>> {
    Ok(Json(ledger.all_candidates(election_id)?))
}

#[get("/elections/<election_id>/candidates/<candidate_id>")]
fn candidate(
    election_id: ElectionId,
    candidate_id: CandidateId,
    ledger: &State<Ledger>,
) -> Result<Json<Candidate>> {
    Ok(Json(ledger.candidate(election_id, candidate_id)?))
}

#[get("/elections/<election_id>/voters/<wallet>")]
fn has_voted(
    election_id: ElectionId,
    wallet: Identity,
    ledger: &State<Ledger>,
) -> Result<Json<bool>> {
    Ok(Json(ledger.has_voted(election_id, &wallet)?))
}

/// Every vote in commit order, for clients to build a cumulative timeline.
#[get("/elections/<election_id>/timeline")]
fn timeline(election_id: ElectionId, ledger: &State<Ledger>) -> Result<Json<Vec<VoteEvent>>> {
    Ok(Json(ledger.vote_timestamps(election_id)?))
}

/// Everything needed to audit the election offline.
#[get("/elections/<election_id>/dump")]
fn dump(election_id: ElectionId, ledger: &State<Ledger>) -> Result<Json<ElectionDump>> {
    Ok(Json(ledger.election_dump(election_id)?))
}
