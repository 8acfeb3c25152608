use std::collections::HashMap;
use std::time::Duration;

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use tracing::*;
use lockgate_common::helpers::hash::verify_password_hash;
use lockgate_common::{CredentialStoreConfig, LockgateError, Secret};

#[enum_dispatch]
pub enum CredentialVerifierEnum {
    Http(HttpCredentialVerifier),
    Static(StaticCredentialVerifier),
}

/// Seam to the external identity/credential store. The enforcement gate only
/// ever learns success/failure from it, never block-relevant state.
#[enum_dispatch(CredentialVerifierEnum)]
#[allow(async_fn_in_trait)]
pub trait CredentialVerifier {
    /// Ok(false) means the credentials are wrong (a counted failure);
    /// Err means the store could not answer (fail closed, not counted).
    async fn verify(
        &mut self,
        identity: &str,
        password: &Secret<String>,
    ) -> Result<bool, LockgateError>;
}

impl CredentialVerifierEnum {
    pub fn from_config(config: &CredentialStoreConfig) -> Result<Self, LockgateError> {
        Ok(match config {
            CredentialStoreConfig::Http { url, timeout } => {
                HttpCredentialVerifier::new(url, *timeout)?.into()
            }
            CredentialStoreConfig::Static { users } => StaticCredentialVerifier::new(
                users
                    .iter()
                    .map(|u| (u.identity.clone(), u.password_hash.clone())),
            )
            .into(),
        })
    }
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    identity: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    valid: bool,
}

/// Asks an out-of-process identity store over HTTP.
pub struct HttpCredentialVerifier {
    client: reqwest::Client,
    url: String,
}

impl HttpCredentialVerifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, LockgateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LockgateError::other)?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }
}

impl CredentialVerifier for HttpCredentialVerifier {
    async fn verify(
        &mut self,
        identity: &str,
        password: &Secret<String>,
    ) -> Result<bool, LockgateError> {
        let response = self
            .client
            .post(&self.url)
            .json(&VerifyRequest {
                identity,
                password: password.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| LockgateError::CredentialStoreUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LockgateError::CredentialStoreUnavailable(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| LockgateError::CredentialStoreUnavailable(e.to_string()))?;

        debug!(%identity, valid = body.valid, "Credential store answered");
        Ok(body.valid)
    }
}

/// Verifies against identities from the config file. Used for tests and
/// self-contained deployments without an external identity store.
pub struct StaticCredentialVerifier {
    users: HashMap<String, Secret<String>>,
}

impl StaticCredentialVerifier {
    pub fn new(users: impl IntoIterator<Item = (String, Secret<String>)>) -> Self {
        Self {
            users: users.into_iter().collect(),
        }
    }
}

impl CredentialVerifier for StaticCredentialVerifier {
    async fn verify(
        &mut self,
        identity: &str,
        password: &Secret<String>,
    ) -> Result<bool, LockgateError> {
        // Unknown identities report plain failure so that the response does
        // not reveal which accounts exist.
        let Some(hash) = self.users.get(identity) else {
            return Ok(false);
        };
        Ok(verify_password_hash(
            password.expose_secret(),
            hash.expose_secret(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockgate_common::helpers::hash::hash_password;

    #[tokio::test]
    async fn test_static_verifier_accepts_good_password() {
        let mut verifier = StaticCredentialVerifier::new([(
            "user@example.com".to_owned(),
            Secret::new(hash_password("s3cret")),
        )]);
        assert!(verifier
            .verify("user@example.com", &Secret::new("s3cret".into()))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_static_verifier_rejects_bad_password_and_unknown_identity() {
        let mut verifier = StaticCredentialVerifier::new([(
            "user@example.com".to_owned(),
            Secret::new(hash_password("s3cret")),
        )]);
        assert!(!verifier
            .verify("user@example.com", &Secret::new("wrong".into()))
            .await
            .unwrap());
        assert!(!verifier
            .verify("ghost@example.com", &Secret::new("s3cret".into()))
            .await
            .unwrap());
    }
}
