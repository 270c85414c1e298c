use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{errors::Error as JwtError, DecodingKey, EncodingKey, Header, Validation};
use rocket::{
    http::Status,
    request::{self, FromRequest},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::common::Identity;
use crate::Config;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An attestation that the bearer of a request is a particular identity.
///
/// Tokens are issued by the external identity layer, which shares
/// `jwt_secret` with us. They carry no rights: what the caller may do is
/// decided by the ledger at the moment the command is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    caller: Identity,
}

impl AuthToken {
    /// The attested caller.
    pub fn caller(&self) -> &Identity {
        &self.caller
    }

    /// Issue a signed token for `caller`, valid for `ttl`.
    pub fn issue(caller: &Identity, ttl: Duration, config: &Config) -> String {
        let claims = Claims {
            caller: caller.clone(),
            expire_at: Utc::now() + ttl,
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .unwrap() // Infallible.
    }

    /// Verify a raw token and extract the caller.
    pub fn from_jwt(token: &str, config: &Config) -> Result<Self, JwtError> {
        let mut validation = Validation::default();
        validation.leeway = config.token_leeway();
        jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &validation,
        )
        .map(|data| Self {
            caller: data.claims.caller,
        })
    }
}

/// Token claims: the caller plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "sub")]
    caller: Identity,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// Extract the raw token from an `Authorization: Bearer` header, falling
/// back to the auth cookie.
fn raw_token(req: &Request<'_>) -> Option<String> {
    req.headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .or_else(|| {
            req.cookies()
                .get(AUTH_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_string())
        })
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                return request::Outcome::Failure((
                    Status::InternalServerError,
                    Error::Unauthorized("no configuration to verify tokens".to_string()),
                ))
            }
        };

        let token = match raw_token(req) {
            Some(token) => token,
            None => {
                return request::Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("no caller token presented".to_string()),
                ))
            }
        };

        match Self::from_jwt(&token, config) {
            Ok(token) => request::Outcome::Success(token),
            Err(err) => {
                warn!("Rejected caller token: {err}");
                request::Outcome::Failure((Status::Unauthorized, err.into()))
            }
        }
    }
}
