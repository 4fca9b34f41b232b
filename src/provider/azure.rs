//! Azure Resource Health provider.
//!
//! Authenticates with a service principal (OAuth2 client credentials flow)
//! and reads `Microsoft.ResourceHealth/availabilityStatuses/current` for a
//! resource through the Azure Resource Manager REST API.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{ProviderClient, ProviderError, RawAvailabilityStatus};

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com";
pub const RESOURCE_HEALTH_API_VERSION: &str = "2022-10-01";

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Longest token lifetime honored, whatever `expires_in` says.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Service principal credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Base URLs of the Azure cloud to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureEndpoints {
    pub authority_host: String,
    pub resource_manager: String,
}

impl Default for AzureEndpoints {
    fn default() -> Self {
        Self {
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            resource_manager: DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Client secret credential with an in-memory token cache.
pub struct ClientSecretCredential {
    http: reqwest::Client,
    credentials: AzureCredentials,
    token_url: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientSecretCredential {
    pub fn new(
        http: reqwest::Client,
        credentials: AzureCredentials,
        endpoints: &AzureEndpoints,
    ) -> Result<Self, ProviderError> {
        for (name, value) in [
            ("tenant id", &credentials.tenant_id),
            ("client id", &credentials.client_id),
            ("client secret", &credentials.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(ProviderError::Credential(format!("{name} must not be empty")));
            }
        }

        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            endpoints.authority_host.trim_end_matches('/'),
            credentials.tenant_id
        );
        let scope = format!(
            "{}/.default",
            endpoints.resource_manager.trim_end_matches('/')
        );

        Ok(Self {
            http,
            credentials,
            token_url,
            scope,
            cached: Mutex::new(None),
        })
    }

    /// Returns a bearer token, requesting a new one when the cached token is
    /// missing or about to expire.
    pub async fn token(&self) -> Result<String, ProviderError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Requesting access token from {}", self.token_url);
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Credential(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Credential(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Credential(format!("invalid token response: {e}")))?;

        let refresh_at = Instant::now() + refresh_after(token.expires_in);
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            refresh_at,
        });

        Ok(access_token)
    }
}

/// How long a token with the given `expires_in` may be served from cache.
fn refresh_after(expires_in: u64) -> Duration {
    Duration::from_secs(expires_in)
        .min(MAX_TOKEN_LIFETIME)
        .saturating_sub(TOKEN_REFRESH_MARGIN)
}

#[derive(Deserialize)]
struct AvailabilityStatusResponse {
    #[serde(default)]
    properties: RawAvailabilityStatus,
}

/// Reads availability statuses from Azure Resource Manager.
pub struct ResourceHealthClient {
    http: reqwest::Client,
    credential: ClientSecretCredential,
    resource_manager: String,
}

impl ResourceHealthClient {
    /// Builds the HTTP client and credential. `timeout` bounds each request.
    pub fn new(
        credentials: AzureCredentials,
        endpoints: AzureEndpoints,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("az-health-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let credential = ClientSecretCredential::new(http.clone(), credentials, &endpoints)?;

        Ok(Self {
            http,
            credential,
            resource_manager: endpoints.resource_manager.trim_end_matches('/').to_string(),
        })
    }

    fn status_url(&self, resource_id: &str) -> String {
        format!(
            "{}{}/providers/Microsoft.ResourceHealth/availabilityStatuses/current?api-version={}",
            self.resource_manager, resource_id, RESOURCE_HEALTH_API_VERSION
        )
    }

    async fn fetch(&self, resource_id: &str) -> Result<RawAvailabilityStatus, ProviderError> {
        let token = self.credential.token().await?;
        let response = self
            .http
            .get(self.status_url(resource_id))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: AvailabilityStatusResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(body.properties)
    }
}

#[async_trait]
impl ProviderClient for ResourceHealthClient {
    #[instrument(skip(self, cancel))]
    async fn check_health(
        &self,
        resource_id: &str,
        cancel: CancellationToken,
    ) -> Result<RawAvailabilityStatus, ProviderError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = self.fetch(resource_id) => result,
        }
    }
}
