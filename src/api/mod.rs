use rocket::{serde::json::Json, Catcher, Request, Route};

use crate::error::{ErrorBody, Result};
use crate::model::{
    auth::AuthToken,
    ledger::{Command, Event, Ledger},
};

mod credentials;
mod elections;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(elections::routes());
    routes.extend(voting::routes());
    routes.extend(credentials::routes());
    routes.extend(public::routes());
    routes
}

/// Catchers that keep error bodies in the same JSON shape as ledger errors,
/// for failures that happen before a handler runs.
pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        not_found,
        unprocessable,
        internal_error
    ]
}

/// Apply `command` on behalf of the token's caller.
fn commit(ledger: &Ledger, token: &AuthToken, command: Command) -> Result<Json<Event>> {
    Ok(Json(ledger.execute(token.caller(), command)?))
}

fn error_body(error: &str, message: String) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: error.to_string(),
        message,
    })
}

#[catch(400)]
fn bad_request(req: &Request) -> Json<ErrorBody> {
    error_body("BadRequest", format!("Malformed request to {}", req.uri()))
}

#[catch(401)]
fn unauthorized(_req: &Request) -> Json<ErrorBody> {
    error_body(
        "Unauthorized",
        "A valid caller token is required".to_string(),
    )
}

#[catch(404)]
fn not_found(req: &Request) -> Json<ErrorBody> {
    error_body("NotFound", format!("No route for {}", req.uri()))
}

#[catch(422)]
fn unprocessable(_req: &Request) -> Json<ErrorBody> {
    error_body(
        "BadRequest",
        "Request body did not match the expected shape".to_string(),
    )
}

#[catch(500)]
fn internal_error(_req: &Request) -> Json<ErrorBody> {
    error_body("Internal", "Internal server error".to_string())
}
