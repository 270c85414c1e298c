pub mod auth;
pub mod batch;
pub mod clock;
pub mod common;
pub mod credential;
pub mod election;
pub mod errors;
pub mod journal;
pub mod ledger;
pub mod pagination;
pub mod vote;
