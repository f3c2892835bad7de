use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use super::AuthError;
use crate::config::SecurityConfig;

pub const MIN_PASSWORD_LENGTH: usize = 10;

/// Argon2id cost parameters. Verification reads them back from the stored hash.
#[derive(Debug, Clone, Copy)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl HashCost {
    pub fn from_config(security: &SecurityConfig) -> Self {
        Self {
            memory_kib: security.argon2_memory_kib,
            iterations: security.argon2_iterations,
        }
    }
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
        }
    }
}

pub fn hash_password(password: &str, cost: HashCost) -> Result<String, AuthError> {
    let params = Params::new(cost.memory_kib, cost.iterations, 1, None)
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let salt = SaltString::generate(&mut OsRng);

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswordHash(e.to_string())),
    }
}

/// Unmet password requirements, empty when the password is acceptable.
pub fn password_policy_violations(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push("must be at least 10 characters long");
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        problems.push("must contain an uppercase letter");
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        problems.push("must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("must contain a digit");
    }
    if !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        problems.push("must contain a special character");
    }
    problems
}

pub fn check_password_policy(password: &str) -> Result<(), AuthError> {
    let problems = password_policy_violations(password);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AuthError::WeakPassword(problems))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHEAP: HashCost = HashCost { memory_kib: 256, iterations: 1 };

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("Correct-Horse-9", CHEAP).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Correct-Horse-9", &hash).unwrap());
        assert!(!verify_password("correct-horse-9", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("Correct-Horse-9", CHEAP).unwrap();
        let b = hash_password("Correct-Horse-9", CHEAP).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(verify_password("x", "plaintext"), Err(AuthError::PasswordHash(_))));
    }

    #[test]
    fn policy_lists_every_gap() {
        assert!(password_policy_violations("Str0ng!Passw0rd").is_empty());
        assert_eq!(password_policy_violations("short").len(), 4);
        assert_eq!(
            password_policy_violations("alllowercase1!"),
            vec!["must contain an uppercase letter"]
        );
        assert!(matches!(
            check_password_policy("NoDigitsHere!"),
            Err(AuthError::WeakPassword(p)) if p == vec!["must contain a digit"]
        ));
    }
}
