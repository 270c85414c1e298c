use std::fmt::{Display, Formatter};

use rocket::request::FromParam;
use serde::{Deserialize, Serialize};

/// An opaque caller key, equivalent to a wallet address.
///
/// The ledger never interprets the contents; two identities are the same
/// caller iff their keys are byte-for-byte equal.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, UriDisplayPath,
)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An identity with an empty key can never be attested, so the API rejects it.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identity {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for Identity {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl<'a> FromParam<'a> for Identity {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        if param.is_empty() {
            Err(param)
        } else {
            Ok(Self(param.to_string()))
        }
    }
}
