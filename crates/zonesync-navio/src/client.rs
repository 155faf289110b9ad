//! HTTP client for the Navio delivery-zone API.

use reqwest::{header, Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::NavioConfig;
use crate::error::{NavioError, NavioResult};
use crate::models::{ProviderZone, ZonesResponse};

/// Header carrying the Navio API key.
const API_KEY_HEADER: &str = "X-Api-Key";

/// Client for the provider's read-only zone API.
#[derive(Debug, Clone)]
pub struct NavioClient {
    client: Client,
    config: NavioConfig,
}

impl NavioClient {
    /// Build a client from config.
    pub fn new(config: NavioConfig) -> NavioResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(NavioError::Transport)?;

        Ok(Self { client, config })
    }

    /// Fetch the live zone list.
    ///
    /// Geofences come back already swapped into GeoJSON ordinate order.
    pub async fn fetch_zones(&self) -> NavioResult<Vec<ProviderZone>> {
        let url = format!("{}/delivery-zones", self.config.base_url.trim_end_matches('/'));
        debug!(url = %url, "Fetching provider zones");

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(NavioError::Transport)?;

        let response = Self::check_status(response).await?;

        let body: ZonesResponse = response
            .json()
            .await
            .map_err(|e| NavioError::Decode(e.to_string()))?;

        let zones: Vec<ProviderZone> = body.zones.into_iter().map(ProviderZone::from).collect();
        info!(count = zones.len(), "Fetched provider zones");
        Ok(zones)
    }

    /// Map HTTP statuses onto the error taxonomy.
    async fn check_status(response: Response) -> NavioResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(NavioError::RateLimited { retry_after_secs });
        }

        if status.is_server_error() {
            return Err(NavioError::Server {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(NavioError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
