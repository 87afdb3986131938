/// External identity provider client
///
/// Verifies Google id tokens out of process via the tokeninfo endpoint.
/// The rest of the crate only sees the narrow `GoogleIdentity` contract.
use crate::error::{ApiError, ApiResult};
use serde::Deserialize;
use std::time::Duration;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Verified identity claims returned by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleIdentity {
    pub email: String,
    #[serde(default, deserialize_with = "bool_from_maybe_string")]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    /// Audience the token was minted for; must equal our client id
    pub aud: String,
}

/// Google reports email_verified as the string "true"/"false"
fn bool_from_maybe_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MaybeString {
        Bool(bool),
        Str(String),
    }

    Ok(match MaybeString::deserialize(deserializer)? {
        MaybeString::Bool(b) => b,
        MaybeString::Str(s) => s == "true",
    })
}

/// Client for verifying Google sign-in id tokens
#[derive(Clone)]
pub struct GoogleVerifier {
    http: reqwest::Client,
    client_id: String,
}

impl GoogleVerifier {
    pub fn new(client_id: String) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Internal(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self { http, client_id })
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
    }

    /// Verify an id token and return its claims
    ///
    /// A token Google rejects is an authentication failure; a transport
    /// problem reaching Google is an upstream failure.
    pub async fn verify(&self, id_token: &str) -> ApiResult<GoogleIdentity> {
        let response = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Identity provider unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Unauthorized("Invalid Google id token".to_string()));
        }

        let identity: GoogleIdentity = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Identity provider response: {}", e)))?;

        if identity.aud != self.client_id {
            return Err(ApiError::Unauthorized(
                "Google id token audience mismatch".to_string(),
            ));
        }

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_verified_accepts_string_and_bool() {
        let from_string: GoogleIdentity = serde_json::from_str(
            r#"{"email":"a@example.com","email_verified":"true","aud":"cid"}"#,
        )
        .unwrap();
        assert!(from_string.email_verified);

        let from_bool: GoogleIdentity = serde_json::from_str(
            r#"{"email":"a@example.com","email_verified":false,"aud":"cid"}"#,
        )
        .unwrap();
        assert!(!from_bool.email_verified);
    }

    #[test]
    fn test_unconfigured_verifier() {
        let verifier = GoogleVerifier::new(String::new()).unwrap();
        assert!(!verifier.is_configured());
    }
}
