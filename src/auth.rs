//! Identity verification.
//!
//! The caller identity of every protected request comes from a verified
//! bearer token only, never from the request body.

use std::time::Duration;

use axum::http::HeaderMap;
use headers::{authorization::Bearer, Authorization, HeaderMapExt as _};
use jsonwebtoken::{
    decode, encode, errors::Error as JwtError, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db::user;

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AuthClaims {
    pub user_id: user::Id,
    exp: i64,
}

#[derive(Debug, PartialEq)]
pub enum Error {
    /// No credential was presented.
    Unauthenticated,

    /// The credential is malformed, tampered with, expired or signed with
    /// another key.
    InvalidCredential,
}

pub struct Verifier {
    expiration_time: Duration,
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
}

impl Verifier {
    pub fn new(secret: &[u8], expiration_time: Duration) -> Self {
        Self {
            expiration_time,
            decoding_key: DecodingKey::from_secret(secret),
            encoding_key: EncodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, user_id: user::Id) -> Result<String, JwtError> {
        let expires_at = OffsetDateTime::now_utc() + self.expiration_time;
        encode(
            &Header::default(),
            &AuthClaims {
                user_id,
                exp: expires_at.unix_timestamp(),
            },
            &self.encoding_key,
        )
    }

    pub fn verify(&self, token: &str) -> Result<AuthClaims, Error> {
        decode::<AuthClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| Error::InvalidCredential)
    }

    /// Verifies the `Authorization: Bearer` credential of a request.
    pub fn verify_headers(
        &self,
        headers: &HeaderMap,
    ) -> Result<AuthClaims, Error> {
        match headers.typed_try_get::<Authorization<Bearer>>() {
            Ok(Some(Authorization(bearer))) => self.verify(bearer.token()),
            Ok(None) => Err(Error::Unauthenticated),
            Err(_) => Err(Error::InvalidCredential),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header::AUTHORIZATION, HeaderValue};

    use super::*;

    fn verifier() -> Verifier {
        Verifier::new(b"secret", Duration::from_secs(60))
    }

    #[test]
    fn verifies_issued_token() {
        let verifier = verifier();
        let user_id = user::Id::from(42);

        let token = verifier.issue(user_id).unwrap();
        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.user_id, user_id);
    }

    #[test]
    fn rejects_token_signed_with_other_key() {
        let other = Verifier::new(b"other", Duration::from_secs(60));
        let token = other.issue(user::Id::from(1)).unwrap();

        assert_eq!(
            verifier().verify(&token).unwrap_err(),
            Error::InvalidCredential,
        );
    }

    #[test]
    fn rejects_tampered_token() {
        let verifier = verifier();
        let mut token = verifier.issue(user::Id::from(1)).unwrap();
        token.push('x');

        assert_eq!(
            verifier.verify(&token).unwrap_err(),
            Error::InvalidCredential,
        );
    }

    #[test]
    fn rejects_expired_token() {
        let verifier = verifier();
        let token = encode(
            &Header::default(),
            &AuthClaims {
                user_id: user::Id::from(1),
                exp: OffsetDateTime::now_utc().unix_timestamp() - 3600,
            },
            &verifier.encoding_key,
        )
        .unwrap();

        assert_eq!(
            verifier.verify(&token).unwrap_err(),
            Error::InvalidCredential,
        );
    }

    #[test]
    fn distinguishes_missing_from_malformed_header() {
        let verifier = verifier();

        assert_eq!(
            verifier.verify_headers(&HeaderMap::new()).unwrap_err(),
            Error::Unauthenticated,
        );

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(
            verifier.verify_headers(&headers).unwrap_err(),
            Error::InvalidCredential,
        );

        let token = verifier.issue(user::Id::from(3)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let claims = verifier.verify_headers(&headers).unwrap();
        assert_eq!(claims.user_id, user::Id::from(3));
    }
}
