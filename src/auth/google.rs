use axum::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Why an ID token was rejected. These messages are for logs only; clients
/// always receive the same fixed message regardless of the variant.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("token header is malformed: {0}")]
    Malformed(#[source] jsonwebtoken::errors::Error),
    #[error("token has no key id")]
    MissingKid,
    #[error("could not fetch provider keys: {0}")]
    KeyFetch(#[from] reqwest::Error),
    #[error("signing key {kid} not in provider key set")]
    UnknownKey { kid: String },
    #[error("signature, audience or issuer check failed: {0}")]
    Rejected(#[source] jsonwebtoken::errors::Error),
}

/// Identity attested by Google after full signature, audience, issuer and
/// expiry validation. Nothing in here is self-asserted by the client.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[async_trait]
pub trait GoogleTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, VerificationError>;
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: String,
    name: String,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

/// Verifies Google ID tokens against Google's published signing keys.
/// Holds only immutable configuration; one instance lives in `AppState`.
pub struct GoogleAuthVerifier {
    http: reqwest::Client,
    client_id: String,
    certs_url: String,
}

impl GoogleAuthVerifier {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            certs_url: GOOGLE_CERTS_URL.to_string(),
        }
    }
}

#[async_trait]
impl GoogleTokenVerifier for GoogleAuthVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, VerificationError> {
        let header = decode_header(id_token).map_err(VerificationError::Malformed)?;
        let kid = header.kid.ok_or(VerificationError::MissingKid)?;

        // Keys rotate, so they are fetched per verification; the subject id
        // is only trusted after this round trip.
        let keys: JwkSet = self
            .http
            .get(&self.certs_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let jwk = keys
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| VerificationError::UnknownKey { kid: kid.clone() })?;

        let decoding =
            DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(VerificationError::Rejected)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let data = decode::<GoogleClaims>(id_token, &decoding, &validation)
            .map_err(VerificationError::Rejected)?;

        debug!(subject = %data.claims.sub, "google id token verified");
        Ok(VerifiedIdentity {
            subject: data.claims.sub,
            email: data.claims.email,
            name: data.claims.name,
            picture: data.claims.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_a_malformed_token_without_network_io() {
        let verifier = GoogleAuthVerifier::new("test-client-id");
        let err = verifier.verify("definitely-not-a-jwt").await.unwrap_err();
        assert!(matches!(err, VerificationError::Malformed(_)));
    }

    #[tokio::test]
    async fn rejects_a_token_without_a_key_id() {
        // HS256 token with no kid in the header; must fail before any fetch.
        let keys = crate::auth::jwt::JwtKeys::from_secret("whatever");
        let now = time::OffsetDateTime::now_utc().unix_timestamp() as usize;
        let claims = crate::auth::jwt::Claims {
            sub: uuid::Uuid::new_v4(),
            name: "x".into(),
            email: "x@example.com".into(),
            role: "user".into(),
            age: None,
            country: None,
            gender: None,
            iat: now,
            exp: now + 60,
        };
        let token =
            jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &keys.encoding)
                .expect("encode");

        let verifier = GoogleAuthVerifier::new("test-client-id");
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, VerificationError::MissingKid));
    }

    #[test]
    fn jwk_set_parses_googles_published_format() {
        let body = r#"{
            "keys": [
                {"kty": "RSA", "alg": "RS256", "use": "sig",
                 "kid": "abc123", "n": "somemodulus", "e": "AQAB"}
            ]
        }"#;
        let set: JwkSet = serde_json::from_str(body).expect("parse jwks");
        assert_eq!(set.keys.len(), 1);
        assert_eq!(set.keys[0].kid, "abc123");
        assert_eq!(set.keys[0].e, "AQAB");
    }
}
