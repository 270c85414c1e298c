mod gate;
mod token;

pub use gate::{AuthError, AuthorizationGate, OperationKind, Role};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};

#[cfg(test)]
pub use token::examples;
