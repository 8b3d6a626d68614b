//! JWT issuance and verification for access and refresh tokens.
//!
//! The two token kinds are signed with distinct secrets, so leaking the
//! access-token secret does not allow forging refresh tokens. A `kind` claim
//! is embedded and checked at verification so one kind cannot stand in for
//! the other even if the secrets were ever shared.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("malformed token")]
    Malformed,

    #[error("token is not of the expected kind")]
    WrongKind,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    kind: TokenKind,
    /// Random per-issue id; `iat`/`exp` only have second granularity, so two
    /// tokens minted in the same second would otherwise be byte-identical.
    jti: String,
    iat: i64,
    exp: i64,
}

/// Verified token contents handed back to callers.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub user_id: i32,
    pub email: Option<String>,
    pub role: Option<String>,
    pub kind: TokenKind,
}

pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Short-lived token carrying identity and role claims.
    pub fn issue_access_token(
        &self,
        user_id: i32,
        email: &str,
        role: &str,
    ) -> Result<String, TokenError> {
        self.issue(
            user_id,
            Some(email.to_string()),
            Some(role.to_string()),
            TokenKind::Access,
        )
    }

    /// Long-lived token used solely to mint new access tokens.
    pub fn issue_refresh_token(&self, user_id: i32) -> Result<String, TokenError> {
        self.issue(user_id, None, None, TokenKind::Refresh)
    }

    fn issue(
        &self,
        user_id: i32,
        email: Option<String>,
        role: Option<String>,
        kind: TokenKind,
    ) -> Result<String, TokenError> {
        let (key, ttl) = match kind {
            TokenKind::Access => (&self.access_encoding, self.access_ttl),
            TokenKind::Refresh => (&self.refresh_encoding, self.refresh_ttl),
        };

        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email,
            role,
            kind,
            jti: hex::encode(rand::rng().random::<[u8; 8]>()),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        Ok(jsonwebtoken::encode(&Header::default(), &claims, key)?)
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<VerifiedToken, TokenError> {
        let key = match expected {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };

        // No leeway: an expired token is expired, which the short access-token
        // lifetime depends on.
        let mut validation = Validation::default();
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<Claims>(token, key, &validation)?;

        if data.claims.kind != expected {
            return Err(TokenError::WrongKind);
        }

        let user_id = data
            .claims
            .sub
            .parse::<i32>()
            .map_err(|_| TokenError::Malformed)?;

        Ok(VerifiedToken {
            user_id,
            email: data.claims.email,
            role: data.claims.role,
            kind: data.claims.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(
            "access-secret",
            "refresh-secret",
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    #[test]
    fn access_token_roundtrip() {
        let svc = service();
        let token = svc
            .issue_access_token(42, "a@b.com", "trainer")
            .unwrap();

        let verified = svc.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(verified.user_id, 42);
        assert_eq!(verified.email.as_deref(), Some("a@b.com"));
        assert_eq!(verified.role.as_deref(), Some("trainer"));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let svc = service();
        let refresh = svc.issue_refresh_token(7).unwrap();

        // Different secret: verification under the access key fails outright.
        let err = svc.verify(&refresh, TokenKind::Access).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);

        assert!(svc.verify(&refresh, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn kind_claim_is_checked_even_with_shared_secrets() {
        let svc = TokenService::new(
            "same-secret",
            "same-secret",
            Duration::minutes(15),
            Duration::days(7),
        );
        let refresh = svc.issue_refresh_token(7).unwrap();

        assert_eq!(
            svc.verify(&refresh, TokenKind::Access).unwrap_err(),
            TokenError::WrongKind
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = TokenService::new(
            "access-secret",
            "refresh-secret",
            Duration::seconds(-1),
            Duration::days(7),
        );
        let token = svc.issue_access_token(1, "a@b.com", "client").unwrap();

        assert_eq!(
            svc.verify(&token, TokenKind::Access).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = service();
        let token = svc.issue_access_token(1, "a@b.com", "client").unwrap();

        // Flip one character in the signature segment.
        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        assert!(svc.verify(&tampered, TokenKind::Access).is_err());
    }

    #[test]
    fn same_second_issues_are_distinct() {
        let svc = service();
        let first = svc.issue_access_token(1, "a@b.com", "client").unwrap();
        let second = svc.issue_access_token(1, "a@b.com", "client").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            service().verify("not.a.jwt", TokenKind::Access).unwrap_err(),
            TokenError::Malformed
        );
    }
}
