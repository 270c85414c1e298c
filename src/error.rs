use jsonwebtoken::errors::Error as JwtError;
use rocket::{
    http::Status,
    response::{status, Responder},
    serde::json::Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::errors::{ErrorKind, LedgerError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// JSON body of every error response.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error kind, e.g. `AlreadyVoted`.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Self::Ledger(err) => match err.kind() {
                ErrorKind::NotFound => Status::NotFound,
                ErrorKind::NotAdmin | ErrorKind::InactiveOrUnknownCredential => Status::Forbidden,
                ErrorKind::InvalidState
                | ErrorKind::AlreadyVoted
                | ErrorKind::AlreadyExists
                | ErrorKind::OutsideVotingWindow => Status::Conflict,
                ErrorKind::InvalidTimeRange | ErrorKind::InvalidAmount | ErrorKind::EmptyBatch => {
                    Status::BadRequest
                }
            },
            Self::Jwt(_) | Self::Unauthorized(_) => Status::Unauthorized,
            Self::BadRequest(_) => Status::BadRequest,
        }
    }

    fn kind_name(&self) -> String {
        match self {
            // Unit variants, so the debug form is just the name.
            Self::Ledger(err) => format!("{:?}", err.kind()),
            Self::Jwt(_) | Self::Unauthorized(_) => "Unauthorized".to_string(),
            Self::BadRequest(_) => "BadRequest".to_string(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        debug!("Responding {status} to {}: {self}", req.uri());
        let body = ErrorBody {
            error: self.kind_name(),
            message: self.to_string(),
        };
        status::Custom(status, Json(body)).respond_to(req)
    }
}
