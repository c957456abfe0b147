//! Configuration management for the AuthNZ pipeline

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::grpc::interceptor::HEALTH_CHECK_METHOD;
use crate::store::memory::iam_permissions;

/// Placeholder substituted with the URL-escaped principal in the key lookup template.
pub const PRINCIPAL_PLACEHOLDER: &str = "{principal}";

const DEFAULT_PUBLIC_KEY_URL_TEMPLATE: &str =
    "https://iam.localhost/service_accounts/v1/metadata/x509/{principal}?alt=json";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub authnz: AuthnzConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct AuthnzConfig {
    /// Expected host component of a service identity's `aud` claim
    pub audience: String,
    /// Key lookup URL, `{principal}` is replaced with the escaped subject
    pub public_key_url_template: String,
    /// Shared secret for end-user (HMAC) tokens
    pub hmac_secret: String,
    pub key_fetch_timeout_ms: u64,
    /// User profile endpoint; when unset the static role table is used
    pub user_profile_url: Option<String>,
    pub role_lookup_timeout_ms: u64,
    /// RPC full method name -> required permission
    pub permissions: HashMap<String, String>,
    /// Role name -> included permissions
    pub roles: HashMap<String, Vec<String>>,
    /// Principal -> role, only used by the static role store
    pub user_roles: HashMap<String, String>,
    /// Methods exempt from authentication
    pub skip_methods: Vec<String>,
}

impl Default for AuthnzConfig {
    fn default() -> Self {
        Self {
            audience: String::new(),
            public_key_url_template: DEFAULT_PUBLIC_KEY_URL_TEMPLATE.to_string(),
            hmac_secret: String::new(),
            key_fetch_timeout_ms: 5000,
            user_profile_url: None,
            role_lookup_timeout_ms: 3000,
            permissions: iam_permissions(),
            roles: HashMap::new(),
            user_roles: HashMap::new(),
            skip_methods: vec![HEALTH_CHECK_METHOD.to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "text"
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            metrics_enabled: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let authnz = AuthnzConfig {
            audience: env::var("AUTHNZ_AUDIENCE").unwrap_or_default(),
            public_key_url_template: env::var("AUTHNZ_PUBLIC_KEY_URL_TEMPLATE")
                .unwrap_or_else(|_| DEFAULT_PUBLIC_KEY_URL_TEMPLATE.to_string()),
            hmac_secret: env::var("AUTHNZ_HMAC_SECRET")
                .context("AUTHNZ_HMAC_SECRET is required")?,
            key_fetch_timeout_ms: env::var("AUTHNZ_KEY_FETCH_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("Invalid AUTHNZ_KEY_FETCH_TIMEOUT_MS")?,
            user_profile_url: env::var("AUTHNZ_USER_PROFILE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            role_lookup_timeout_ms: env::var("AUTHNZ_ROLE_LOOKUP_TIMEOUT_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("Invalid AUTHNZ_ROLE_LOOKUP_TIMEOUT_MS")?,
            permissions: match env::var("AUTHNZ_PERMISSIONS") {
                Ok(raw) => serde_json::from_str(&raw).context("Invalid AUTHNZ_PERMISSIONS")?,
                Err(_) => iam_permissions(),
            },
            roles: match env::var("AUTHNZ_ROLES") {
                Ok(raw) => serde_json::from_str(&raw).context("Invalid AUTHNZ_ROLES")?,
                Err(_) => HashMap::new(),
            },
            user_roles: match env::var("AUTHNZ_USER_ROLES") {
                Ok(raw) => serde_json::from_str(&raw).context("Invalid AUTHNZ_USER_ROLES")?,
                Err(_) => HashMap::new(),
            },
            skip_methods: env::var("AUTHNZ_SKIP_METHODS")
                .map(|s| parse_method_list(&s))
                .unwrap_or_else(|_| vec![HEALTH_CHECK_METHOD.to_string()]),
        };
        authnz.validate()?;

        let telemetry = TelemetryConfig {
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            metrics_enabled: env::var("METRICS_ENABLED")
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false),
        };

        Ok(Self { authnz, telemetry })
    }
}

impl AuthnzConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hmac_secret.is_empty() {
            bail!("HMAC secret must not be empty");
        }
        if !self.public_key_url_template.contains(PRINCIPAL_PLACEHOLDER) {
            bail!(
                "Public key URL template must contain {}: {}",
                PRINCIPAL_PLACEHOLDER,
                self.public_key_url_template
            );
        }
        Ok(())
    }

    pub fn key_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.key_fetch_timeout_ms)
    }

    pub fn role_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.role_lookup_timeout_ms)
    }
}

fn parse_method_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect()
}
