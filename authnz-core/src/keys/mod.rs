//! Public key lookup for service identities
//!
//! Keys are published per principal as a JSON object mapping key IDs to
//! X.509 certificates, either as PEM or base64-wrapped PEM.

use crate::config::PRINCIPAL_PLACEHOLDER;
use crate::error::{AuthError, Result};
use crate::telemetry::metrics::record_key_fetch;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonwebtoken::DecodingKey;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use x509_parser::public_key::PublicKey;

/// Resolves the verification key for a (principal, key ID) pair.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn public_key(&self, principal: &str, key_id: &str) -> Result<DecodingKey>;
}

/// Key provider backed by an HTTP key-distribution endpoint
#[derive(Clone)]
pub struct HttpKeyProvider {
    url_template: String,
    http_client: Client,
}

impl HttpKeyProvider {
    /// `timeout` bounds the whole request, connect included.
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url_template: url_template.into(),
            http_client,
        })
    }

    pub fn key_url(&self, principal: &str) -> String {
        self.url_template
            .replace(PRINCIPAL_PLACEHOLDER, &urlencoding::encode(principal))
    }

    async fn fetch_keys(&self, principal: &str) -> Result<HashMap<String, String>> {
        let url = self.key_url(principal);
        let response = self.http_client.get(&url).send().await.map_err(|e| {
            AuthError::KeyProviderUnavailable(format!(
                "Failed to fetch keys for {}: {}",
                principal, e
            ))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AuthError::KeyNotFound {
                principal: principal.to_string(),
                key_id: String::new(),
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::KeyProviderUnavailable(format!(
                "Key endpoint returned {} for {}",
                status, principal
            )));
        }

        response.json().await.map_err(|e| {
            AuthError::KeyProviderUnavailable(format!("Failed to parse key response: {}", e))
        })
    }
}

#[async_trait]
impl KeyProvider for HttpKeyProvider {
    async fn public_key(&self, principal: &str, key_id: &str) -> Result<DecodingKey> {
        let started = Instant::now();
        let keys = self.fetch_keys(principal).await;
        record_key_fetch(started.elapsed());

        let keys = keys.map_err(|e| match e {
            AuthError::KeyNotFound { principal, .. } => AuthError::KeyNotFound {
                principal,
                key_id: key_id.to_string(),
            },
            AuthError::KeyProviderUnavailable(reason) => {
                tracing::error!(
                    principal = %principal,
                    key_id = %key_id,
                    reason = %reason,
                    "Key provider unavailable"
                );
                AuthError::KeyProviderUnavailable(reason)
            }
            other => other,
        })?;

        let material = keys.get(key_id).ok_or_else(|| AuthError::KeyNotFound {
            principal: principal.to_string(),
            key_id: key_id.to_string(),
        })?;

        parse_public_key(material)
    }
}

/// Decode a certificate (PEM or base64-wrapped PEM) into an RSA verification key.
pub fn parse_public_key(material: &str) -> Result<DecodingKey> {
    let pem_bytes = match STANDARD.decode(material.trim()) {
        Ok(decoded) if decoded.starts_with(b"-----BEGIN") => decoded,
        _ => material.as_bytes().to_vec(),
    };

    let (_, pem) = x509_parser::pem::parse_x509_pem(&pem_bytes)
        .map_err(|e| AuthError::KeyDecode(format!("Invalid PEM block: {}", e)))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| AuthError::KeyDecode(format!("Invalid certificate: {}", e)))?;

    let spki = cert.public_key();
    match spki.parsed() {
        Ok(PublicKey::RSA(_)) => Ok(DecodingKey::from_rsa_der(&spki.subject_public_key.data)),
        Ok(_) => Err(AuthError::KeyDecode(
            "Certificate does not carry an RSA public key".to_string(),
        )),
        Err(e) => Err(AuthError::KeyDecode(format!("Invalid public key: {}", e))),
    }
}
