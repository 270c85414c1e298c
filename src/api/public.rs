use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::model::{
    auth::AuthToken,
    common::{Identity, Timestamp},
    journal::JournalEntry,
    ledger::Ledger,
    pagination::{Paginated, Pagination},
};

pub fn routes() -> Vec<Route> {
    routes![time, auth_check, journal]
}

/// Who the ledger thinks is asking.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerInfo {
    /// `None` for anonymous requests.
    pub caller: Option<Identity>,
    pub is_admin: bool,
}

/// The ledger's current time. Never earlier than any committed timestamp.
#[get("/time")]
fn time(ledger: &State<Ledger>) -> Json<Timestamp> {
    Json(ledger.now())
}

#[get("/auth/check")]
fn auth_check(token: Option<AuthToken>, ledger: &State<Ledger>) -> Json<CallerInfo> {
    let caller = token.map(|token| token.caller().clone());
    let is_admin = caller
        .as_ref()
        .map_or(false, |caller| ledger.is_admin(caller));
    Json(CallerInfo { caller, is_admin })
}

/// A page of the audit journal, oldest entry first.
#[get("/journal")]
fn journal(pagination: Pagination, ledger: &State<Ledger>) -> Json<Paginated<JournalEntry>> {
    let entries = ledger.journal(pagination.start(), pagination.count());
    Json(pagination.to_paginated(ledger.journal_len(), entries))
}
