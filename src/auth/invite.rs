use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// Single-use group invite token. Only `hash` is ever persisted.
#[derive(Debug, Clone)]
pub struct InviteToken {
    pub token: String,
    pub hash: String,
}

impl InviteToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let hash = hash_token(&token);
        Self { token, hash }
    }
}

pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Constant-time comparison of a presented token against a stored hash.
pub fn token_matches(presented: &str, stored_hash: &str) -> bool {
    let candidate = hash_token(presented);
    if candidate.len() != stored_hash.len() {
        return false;
    }
    candidate
        .bytes()
        .zip(stored_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_url_safe_and_unique() {
        let a = InviteToken::generate();
        let b = InviteToken::generate();
        assert_ne!(a.token, b.token);
        assert_eq!(a.token.len(), 43);
        assert!(a
            .token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(a.hash.len(), 64);
    }

    #[test]
    fn matches_only_its_own_hash() {
        let invite = InviteToken::generate();
        assert!(token_matches(&invite.token, &invite.hash));
        assert!(!token_matches("forged", &invite.hash));
        assert!(!token_matches(&invite.token, "short"));
    }
}
