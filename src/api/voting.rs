use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    model::{
        auth::AuthToken,
        common::{CandidateId, ElectionId},
        ledger::{Command, Event, Ledger},
    },
};

use super::commit;

pub fn routes() -> Vec<Route> {
    routes![vote]
}

/// Body of a vote request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Ballot {
    pub candidate_id: CandidateId,
}

/// Cast the caller's single vote in an election.
#[post("/elections/<election_id>/vote", data = "<ballot>", format = "json")]
fn vote(
    token: AuthToken,
    election_id: ElectionId,
    ballot: Json<Ballot>,
    ledger: &State<Ledger>,
) -> Result<Json<Event>> {
    commit(
        ledger,
        &token,
        Command::Vote {
            election_id,
            candidate_id: ballot.candidate_id,
        },
    )
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::{
        futures::future::join_all,
        http::{Method, Status},
        local::asynchronous::Client,
        serde::json::{json, serde_json, Value},
    };

    use crate::{
        api::test_helpers::{event, get_json, register, send_as, started_election},
        error::ErrorBody,
        model::{
            clock::{Clock, ManualClock},
            common::Identity,
            election::{Candidate, ElectionDetails, ElectionSpec, ElectionStatus},
        },
    };

    use super::*;

    async fn cast(
        client: &Client,
        voter: &Identity,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> (Status, Value) {
        send_as(
            client,
            voter,
            Method::Post,
            uri!(vote(election_id)).to_string(),
            json!({ "candidate_id": candidate_id }),
        )
        .await
    }

    fn error_kind(body: Value) -> String {
        serde_json::from_value::<ErrorBody>(body).unwrap().error
    }

    #[backend_test]
    async fn one_vote_per_voter(client: Client, clock: ManualClock) {
        let election_id = started_election(&client, &["X", "Y"]).await;
        let voter = Identity::voter_example(1);
        register(&client, &[voter.clone()]).await;

        let (status, body) = cast(&client, &voter, election_id, 1).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(
            event(body),
            Event::VoteCast {
                election_id,
                candidate_id: 1,
                voter: voter.clone(),
                timestamp: clock.now(),
            }
        );

        let (status, body) = cast(&client, &voter, election_id, 2).await;
        assert_eq!(status, Status::Conflict);
        assert_eq!(error_kind(body), "AlreadyVoted");

        let (_, body) = get_json(&client, format!("/elections/{election_id}/candidates")).await;
        let candidates: Vec<Candidate> = serde_json::from_value(body).unwrap();
        assert_eq!(candidates[0].vote_count, 1);
        assert_eq!(candidates[1].vote_count, 0);
    }

    #[backend_test]
    async fn unregistered_and_inactive_voters_are_refused(client: Client) {
        let election_id = started_election(&client, &["X"]).await;
        let voter = Identity::voter_example(1);

        let (status, body) = cast(&client, &voter, election_id, 1).await;
        assert_eq!(status, Status::Forbidden);
        assert_eq!(error_kind(body), "InactiveOrUnknownCredential");

        register(&client, &[voter.clone()]).await;
        send_as(
            &client,
            &Identity::admin_example(),
            Method::Put,
            format!("/credentials/{voter}/status"),
            json!({ "is_active": false }),
        )
        .await;
        let (status, _) = cast(&client, &voter, election_id, 1).await;
        assert_eq!(status, Status::Forbidden);

        // The admin holds no credential, so cannot vote either.
        let (status, _) = cast(&client, &Identity::admin_example(), election_id, 1).await;
        assert_eq!(status, Status::Forbidden);
    }

    #[backend_test]
    async fn votes_need_an_open_election(client: Client, clock: ManualClock) {
        let voter = Identity::voter_example(1);
        register(&client, &[voter.clone()]).await;

        let now = clock.now();
        let spec =
            ElectionSpec::windowed_example(now + Duration::hours(1), now + Duration::hours(2));
        send_as(
            &client,
            &Identity::admin_example(),
            Method::Post,
            "/elections".to_string(),
            json!(spec),
        )
        .await;
        send_as(
            &client,
            &Identity::admin_example(),
            Method::Post,
            "/elections/1/candidates".to_string(),
            json!({ "name": "X" }),
        )
        .await;

        // Still being set up.
        let (status, body) = cast(&client, &voter, 1, 1).await;
        assert_eq!(status, Status::Conflict);
        assert_eq!(error_kind(body), "InvalidState");

        send_as(
            &client,
            &Identity::admin_example(),
            Method::Post,
            "/elections/1/start".to_string(),
            Value::Null,
        )
        .await;
        let (status, body) = cast(&client, &voter, 1, 1).await;
        assert_eq!(status, Status::Conflict);
        assert_eq!(error_kind(body), "OutsideVotingWindow");

        clock.advance(Duration::hours(1));
        let (status, body) = cast(&client, &voter, 1, 9).await;
        assert_eq!(status, Status::NotFound);
        assert_eq!(error_kind(body), "NotFound");
        let (status, _) = cast(&client, &voter, 1, 1).await;
        assert_eq!(status, Status::Ok);
    }

    #[backend_test]
    async fn closed_election_keeps_its_votes(client: Client) {
        let election_id = started_election(&client, &["X", "Y"]).await;
        let v1 = Identity::voter_example(1);
        let v2 = Identity::voter_example(2);
        register(&client, &[v1.clone(), v2.clone()]).await;

        let (status, _) = cast(&client, &v1, election_id, 1).await;
        assert_eq!(status, Status::Ok);

        // Deactivating afterwards doesn't undo the vote.
        send_as(
            &client,
            &Identity::admin_example(),
            Method::Put,
            format!("/credentials/{v1}/status"),
            json!({ "is_active": false }),
        )
        .await;
        let (_, body) = get_json(&client, format!("/elections/{election_id}/voters/{v1}")).await;
        assert_eq!(body, json!(true));

        send_as(
            &client,
            &Identity::admin_example(),
            Method::Post,
            format!("/elections/{election_id}/end"),
            Value::Null,
        )
        .await;
        let (status, body) = cast(&client, &v2, election_id, 2).await;
        assert_eq!(status, Status::Conflict);
        assert_eq!(error_kind(body), "InvalidState");

        let (_, body) = get_json(&client, format!("/elections/{election_id}")).await;
        let details: ElectionDetails = serde_json::from_value(body).unwrap();
        assert_eq!(details.status, ElectionStatus::Closed);
        assert_eq!(details.total_votes, 1);
    }

    #[backend_test]
    async fn concurrent_duplicates_count_once(client: Client) {
        let election_id = started_election(&client, &["X"]).await;
        let voters: Vec<_> = (1..=3).map(Identity::voter_example).collect();
        register(&client, &voters).await;

        let attempts = voters
            .iter()
            .flat_map(|voter| std::iter::repeat(voter).take(5))
            .map(|voter| cast(&client, voter, election_id, 1));
        let results = join_all(attempts).await;

        let accepted = results
            .iter()
            .filter(|(status, _)| *status == Status::Ok)
            .count();
        let conflicts = results
            .iter()
            .filter(|(status, _)| *status == Status::Conflict)
            .count();
        assert_eq!(accepted, voters.len());
        assert_eq!(conflicts, results.len() - voters.len());

        let (_, body) = get_json(&client, format!("/elections/{election_id}")).await;
        let details: ElectionDetails = serde_json::from_value(body).unwrap();
        assert_eq!(details.total_votes, voters.len() as u64);
    }
}
