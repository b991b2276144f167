use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
}

/// Why a token was rejected. Only for operator logging; callers surface a
/// single unauthenticated outcome regardless of the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "malformed token"),
            TokenError::BadSignature => write!(f, "invalid signature"),
            TokenError::Expired => write!(f, "token expired"),
        }
    }
}

/// Issues and verifies HS256-signed identity tokens. Expiry is embedded in
/// the token and fixed at issuance; there is no server-side revocation, so
/// rotating the secret is the only way to invalidate outstanding tokens early.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::default();
        // No leeway, so short TTLs expire exactly on time.
        validation.leeway = 0;
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<String, jsonwebtoken::errors::Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<i64, TokenError> {
        let data =
            decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
                match err.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    ErrorKind::InvalidSignature => TokenError::BadSignature,
                    _ => TokenError::Malformed,
                }
            })?;
        data.claims.sub.parse().map_err(|_| TokenError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(ttl_secs: u64) -> TokenService {
        TokenService::new("unit-test-secret-0123456789abcdef", Duration::from_secs(ttl_secs))
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let tokens = service(3600);
        let token = tokens.issue(42).unwrap();
        assert_eq!(tokens.verify(&token), Ok(42));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let tokens = service(3600);
        assert_eq!(tokens.verify("not-a-token"), Err(TokenError::Malformed));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let tokens = service(3600);
        let other = TokenService::new("a-different-secret-0123456789abcd", Duration::from_secs(3600));
        let token = tokens.issue(7).unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service(0);
        let token = tokens.issue(7).unwrap();
        // exp is the issuance instant; one tick later it is in the past.
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }
}
