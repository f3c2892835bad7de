pub mod invite;
pub mod jwt;
pub mod password;
pub mod validation;

pub use invite::InviteToken;
pub use jwt::{Claims, IssuedToken, JwtKeys, TokenSubject};
pub use password::{hash_password, password_policy_violations, verify_password, HashCost};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid JWT secret")]
    InvalidSecret,
    #[error("JWT generation error: {0}")]
    TokenCreation(String),
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
    #[error("Password does not meet requirements: {}", .0.join("; "))]
    WeakPassword(Vec<&'static str>),
}
