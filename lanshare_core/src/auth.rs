//! Shared-secret authentication
//!
//! The server generates one password at startup. Every API request must carry
//! it in the `x-auth-password` header.

use crate::error::ShareError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;

/// Header carrying the password on every API request
pub const AUTH_HEADER: &str = "x-auth-password";

/// Default password length
pub const PASSWORD_LENGTH: usize = 12;

/// One character from each class is guaranteed, so shorter passwords are padded up
pub const MIN_PASSWORD_LENGTH: usize = 4;

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}";

fn pick(rng: &mut impl Rng, set: &[u8]) -> u8 {
    set[rng.random_range(0..set.len())]
}

/// Generate a random password with at least one upper, lower, digit and
/// symbol character, in shuffled order.
pub fn generate_password(length: usize) -> String {
    let length = length.max(MIN_PASSWORD_LENGTH);
    let mut rng = rand::rng();

    let alphabet: Vec<u8> = [UPPER, LOWER, DIGITS, SYMBOLS].concat();

    let mut chars = Vec::with_capacity(length);
    for set in [UPPER, LOWER, DIGITS, SYMBOLS] {
        chars.push(pick(&mut rng, set));
    }
    while chars.len() < length {
        chars.push(pick(&mut rng, &alphabet));
    }
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}

/// Read-only holder of the server password
#[derive(Clone)]
pub struct AuthGate {
    secret: Arc<str>,
}

impl AuthGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Arc::from(secret.into()),
        }
    }

    /// Gate with a freshly generated password
    pub fn generate(length: usize) -> Self {
        Self::new(generate_password(length))
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Exact comparison against the server password; empty input never matches
    pub fn authorize(&self, supplied: &str) -> bool {
        !supplied.is_empty() && supplied == &*self.secret
    }
}

/// Middleware rejecting requests without the correct password header
pub async fn require_password(
    State(gate): State<AuthGate>,
    req: Request,
    next: Next,
) -> Result<Response, ShareError> {
    let supplied = req
        .headers()
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !gate.authorize(supplied) {
        tracing::warn!(
            "Rejected {} {}: incorrect or missing password",
            req.method(),
            req.uri().path()
        );
        return Err(ShareError::Unauthorized);
    }

    Ok(next.run(req).await)
}
