use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        auth::AuthToken,
        common::{Amount, Identity},
        credential::Credential,
        ledger::{Command, Event, Ledger},
        pagination::{Paginated, Pagination},
    },
};

use super::commit;

pub fn routes() -> Vec<Route> {
    routes![
        create_credential,
        create_credentials,
        update_status,
        update_statuses,
        add_funds,
        add_funds_batch,
        credentials,
        credential_count,
        is_active,
    ]
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewCredential {
    pub wallet: Identity,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletBatch {
    pub wallets: Vec<Identity>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchStatusUpdate {
    pub wallets: Vec<Identity>,
    pub is_active: bool,
}

/// Amounts are signed on the wire so that a negative amount is refused like
/// a zero one rather than failing to parse.
#[derive(Debug, Serialize, Deserialize)]
pub struct Funding {
    pub amount: i128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchFunding {
    pub wallets: Vec<Identity>,
    /// Split evenly, with any remainder going to the last wallet.
    pub total_amount: i128,
}

/// Negative amounts become zero, which the ledger refuses once the caller
/// has been authorized.
fn to_amount(amount: i128) -> Amount {
    Amount::try_from(amount).unwrap_or_default()
}

/// Reject wallets no caller could ever be attested as.
fn check_wallets<'a>(wallets: impl IntoIterator<Item = &'a Identity>) -> Result<()> {
    for (index, wallet) in wallets.into_iter().enumerate() {
        if wallet.is_empty() {
            return Err(Error::BadRequest(format!("Wallet {index} is empty")));
        }
    }
    Ok(())
}

#[post("/credentials", data = "<credential>", format = "json")]
fn create_credential(
    token: AuthToken,
    credential: Json<NewCredential>,
    ledger: &State<Ledger>,
) -> Result<Json<Event>> {
    let NewCredential { wallet } = credential.into_inner();
    check_wallets([&wallet])?;
    commit(ledger, &token, Command::CreateCredential { wallet })
}

#[post("/credentials/batch", data = "<batch>", format = "json")]
fn create_credentials(
    token: AuthToken,
    batch: Json<WalletBatch>,
    ledger: &State<Ledger>,
) -> Result<Json<Event>> {
    let WalletBatch { wallets } = batch.into_inner();
    check_wallets(&wallets)?;
    commit(ledger, &token, Command::CreateCredentialsBatch { wallets })
}

#[put("/credentials/<wallet>/status", data = "<update>", format = "json")]
fn update_status(
    token: AuthToken,
    wallet: Identity,
    update: Json<StatusUpdate>,
    ledger: &State<Ledger>,
) -> Result<Json<Event>> {
    commit(
        ledger,
        &token,
        Command::UpdateCredentialStatus {
            wallet,
            is_active: update.is_active,
        },
    )
}

#[put("/credentials/status", data = "<update>", format = "json")]
fn update_statuses(
    token: AuthToken,
    update: Json<BatchStatusUpdate>,
    ledger: &State<Ledger>,
) -> Result<Json<Event>> {
    let BatchStatusUpdate { wallets, is_active } = update.into_inner();
    check_wallets(&wallets)?;
    commit(
        ledger,
        &token,
        Command::UpdateCredentialsStatusBatch { wallets, is_active },
    )
}

#[post("/credentials/<wallet>/funds", data = "<funding>", format = "json")]
fn add_funds(
    token: AuthToken,
    wallet: Identity,
    funding: Json<Funding>,
    ledger: &State<Ledger>,
) -> Result<Json<Event>> {
    commit(
        ledger,
        &token,
        Command::AddFunds {
            wallet,
            amount: to_amount(funding.amount),
        },
    )
}

#[post("/credentials/funds", data = "<funding>", format = "json")]
fn add_funds_batch(
    token: AuthToken,
    funding: Json<BatchFunding>,
    ledger: &State<Ledger>,
) -> Result<Json<Event>> {
    let BatchFunding {
        wallets,
        total_amount,
    } = funding.into_inner();
    check_wallets(&wallets)?;
    commit(
        ledger,
        &token,
        Command::AddFundsBatch {
            wallets,
            total_amount: to_amount(total_amount),
        },
    )
}

/// Credentials in registration order.
#[get("/credentials")]
fn credentials(pagination: Pagination, ledger: &State<Ledger>) -> Json<Paginated<Credential>> {
    let items = ledger.credentials(pagination.start(), pagination.count());
    Json(pagination.to_paginated(ledger.credential_count(), items))
}

#[get("/credentials/count")]
fn credential_count(ledger: &State<Ledger>) -> Json<u64> {
    Json(ledger.credential_count())
}

/// Unknown wallets are simply not active.
#[get("/credentials/<wallet>/active")]
fn is_active(wallet: Identity, ledger: &State<Ledger>) -> Json<bool> {
    Json(ledger.is_active_credential(&wallet))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{Method, Status},
        local::asynchronous::Client,
        serde::json::{json, serde_json, Value},
    };

    use crate::{
        api::test_helpers::{event, get_json, register, send_as},
        error::ErrorBody,
        model::credential::FundsCredit,
    };

    use super::*;

    fn admin() -> Identity {
        Identity::admin_example()
    }

    fn error_kind(body: Value) -> String {
        serde_json::from_value::<ErrorBody>(body).unwrap().error
    }

    async fn active_flags(client: &Client, wallets: &[Identity]) -> Vec<bool> {
        let mut flags = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            let (_, body) = get_json(client, uri!(is_active(wallet.clone())).to_string()).await;
            flags.push(serde_json::from_value(body).unwrap());
        }
        flags
    }

    async fn credential_page(client: &Client, start: u64, count: u64) -> Paginated<Credential> {
        let (_, body) = get_json(client, format!("/credentials?start={start}&count={count}")).await;
        serde_json::from_value(body).unwrap()
    }

    #[backend_test]
    async fn create_single_credential(client: Client) {
        let wallet = Identity::voter_example(1);
        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Post,
            uri!(create_credential).to_string(),
            json!({ "wallet": wallet }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(
            event(body),
            Event::CredentialCreated {
                wallet: wallet.clone()
            }
        );

        let (_, body) = get_json(&client, uri!(is_active(wallet.clone())).to_string()).await;
        assert_eq!(body, json!(true));
        let (_, body) = get_json(&client, uri!(credential_count).to_string()).await;
        assert_eq!(body, json!(1));
        let stranger = Identity::random_example();
        let (_, body) = get_json(&client, uri!(is_active(stranger)).to_string()).await;
        assert_eq!(body, json!(false));

        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Post,
            uri!(create_credential).to_string(),
            json!({ "wallet": wallet }),
        )
        .await;
        assert_eq!(status, Status::Conflict);
        assert_eq!(error_kind(body), "AlreadyExists");
    }

    #[backend_test]
    async fn empty_wallets_are_bad_requests(client: Client) {
        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Post,
            uri!(create_credential).to_string(),
            json!({ "wallet": "" }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(error_kind(body), "BadRequest");

        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Post,
            uri!(create_credentials).to_string(),
            json!({ "wallets": [] }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(error_kind(body), "EmptyBatch");

        let (_, body) = get_json(&client, uri!(credential_count).to_string()).await;
        assert_eq!(body, json!(0));
    }

    #[backend_test]
    async fn batch_creation_is_atomic(client: Client) {
        let existing = Identity::voter_example(1);
        register(&client, &[existing.clone()]).await;

        let fresh = Identity::voter_example(2);
        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Post,
            uri!(create_credentials).to_string(),
            json!({ "wallets": [fresh, existing] }),
        )
        .await;
        assert_eq!(status, Status::Conflict);
        assert_eq!(error_kind(body), "AlreadyExists");

        let (_, body) = get_json(&client, uri!(is_active(fresh)).to_string()).await;
        assert_eq!(body, json!(false));
    }

    #[backend_test]
    async fn status_updates(client: Client) {
        let wallets: Vec<_> = (1..=3).map(Identity::voter_example).collect();
        register(&client, &wallets).await;

        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Put,
            uri!(update_statuses).to_string(),
            json!({ "wallets": &wallets[..2], "is_active": false }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(
            event(body),
            Event::CredentialsStatusUpdated {
                wallets: wallets[..2].to_vec(),
                is_active: false
            }
        );
        let active = active_flags(&client, &wallets).await;
        assert_eq!(active, vec![false, false, true]);

        let (status, _) = send_as(
            &client,
            &admin(),
            Method::Put,
            uri!(update_status(wallets[0].clone())).to_string(),
            json!({ "is_active": true }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        let active = active_flags(&client, &wallets).await;
        assert_eq!(active, vec![true, false, true]);

        // One unknown wallet spoils the batch.
        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Put,
            uri!(update_statuses).to_string(),
            json!({
                "wallets": [wallets[2], Identity::voter_example(9)],
                "is_active": false
            }),
        )
        .await;
        assert_eq!(status, Status::NotFound);
        assert_eq!(error_kind(body), "NotFound");
        let active = active_flags(&client, &wallets).await;
        assert_eq!(active, vec![true, false, true]);

        let (status, _) = send_as(
            &client,
            &wallets[2],
            Method::Put,
            uri!(update_status(wallets[1].clone())).to_string(),
            json!({ "is_active": true }),
        )
        .await;
        assert_eq!(status, Status::Forbidden);
    }

    #[backend_test]
    async fn funding(client: Client) {
        let wallets: Vec<_> = (1..=3).map(Identity::voter_example).collect();
        register(&client, &wallets).await;

        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Post,
            uri!(add_funds(wallets[0].clone())).to_string(),
            json!({ "amount": 5 }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(
            event(body),
            Event::FundsAdded {
                wallet: wallets[0].clone(),
                amount: 5,
                balance: 5
            }
        );

        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Post,
            uri!(add_funds(wallets[0].clone())).to_string(),
            json!({ "amount": 0 }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(error_kind(body), "InvalidAmount");

        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Post,
            uri!(add_funds_batch).to_string(),
            json!({ "wallets": wallets, "total_amount": 100 }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        let credits = match event(body) {
            Event::FundsAddedBatch { credits } => credits,
            other => panic!("unexpected {other:?}"),
        };
        let amounts: Vec<_> = credits.iter().map(|credit| credit.amount).collect();
        assert_eq!(amounts, vec![33, 33, 34]);
        assert_eq!(
            credits[0],
            FundsCredit {
                wallet: wallets[0].clone(),
                amount: 33,
                balance: 38
            }
        );

        let page = credential_page(&client, 0, 10).await;
        let balances: Vec<_> = page.items.iter().map(|credential| credential.balance).collect();
        assert_eq!(balances, vec![38, 33, 34]);

        // Too little to go round, so it all lands on the last wallet.
        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Post,
            uri!(add_funds_batch).to_string(),
            json!({ "wallets": wallets, "total_amount": 2 }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        let credits = match event(body) {
            Event::FundsAddedBatch { credits } => credits,
            other => panic!("unexpected {other:?}"),
        };
        let amounts: Vec<_> = credits.iter().map(|credit| credit.amount).collect();
        assert_eq!(amounts, vec![0, 0, 2]);

        let page = credential_page(&client, 0, 10).await;
        let balances: Vec<_> = page.items.iter().map(|credential| credential.balance).collect();
        assert_eq!(balances, vec![38, 33, 36]);
    }

    #[backend_test]
    async fn negative_funding_is_an_invalid_amount(client: Client) {
        let wallets: Vec<_> = (1..=2).map(Identity::voter_example).collect();
        register(&client, &wallets).await;

        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Post,
            uri!(add_funds(wallets[0].clone())).to_string(),
            json!({ "amount": -5 }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(error_kind(body), "InvalidAmount");

        let (status, body) = send_as(
            &client,
            &admin(),
            Method::Post,
            uri!(add_funds_batch).to_string(),
            json!({ "wallets": wallets, "total_amount": -10 }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(error_kind(body), "InvalidAmount");

        // Authorization still comes first.
        let (status, _) = send_as(
            &client,
            &wallets[1],
            Method::Post,
            uri!(add_funds(wallets[0].clone())).to_string(),
            json!({ "amount": -5 }),
        )
        .await;
        assert_eq!(status, Status::Forbidden);

        let page = credential_page(&client, 0, 10).await;
        assert!(page.items.iter().all(|credential| credential.balance == 0));
    }

    #[backend_test]
    async fn credentials_are_paginated(client: Client) {
        let wallets: Vec<_> = (1..=5).map(Identity::voter_example).collect();
        register(&client, &wallets).await;

        let page = credential_page(&client, 1, 2).await;
        assert_eq!(page.total, 5);
        assert_eq!(page.start, 1);
        let listed: Vec<_> = page.items.into_iter().map(|credential| credential.wallet).collect();
        assert_eq!(listed, wallets[1..3].to_vec());

        let page = credential_page(&client, 10, 2).await;
        assert!(page.items.is_empty());
        assert_eq!(page.total, 5);

        let (status, _) = get_json(&client, "/credentials?start=abc".to_string()).await;
        assert_eq!(status, Status::BadRequest);
    }
}
