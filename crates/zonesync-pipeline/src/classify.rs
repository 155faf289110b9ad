//! AI classification collaborator.
//!
//! The classifier is a black box behind a trait: given raw zone names and
//! hints it proposes a City→District→Area grouping with a per-zone
//! confidence and a `needs_mapping` signal for upstream names that are
//! internal codes rather than place names. Flagged zones are never guessed;
//! they block approval until a human resolves them.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use zonesync_core::ProviderZoneId;
use zonesync_navio::ProviderZone;

use crate::error::{PipelineError, PipelineResult};

/// A proposed city and the zones assigned to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityGroup {
    pub city_name: String,
    pub country_code: Option<String>,
    pub zone_ids: Vec<ProviderZoneId>,
}

/// A proposed district with its member areas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictProposal {
    pub name: String,
    pub areas: Vec<AreaProposal>,
}

/// One zone's classification inside a district.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaProposal {
    pub zone_id: ProviderZoneId,
    /// Human-facing area name. Meaningless when `needs_mapping` is set.
    pub proposed_name: String,
    /// Set when the upstream name is an internal code the classifier will
    /// not translate into a place name.
    pub needs_mapping: bool,
    pub confidence: f32,
}

/// District/area proposals for one city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityClassification {
    pub districts: Vec<DistrictProposal>,
}

/// The AI classification collaborator.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Partition raw zones into city groups.
    async fn group_cities(&self, zones: &[ProviderZone]) -> PipelineResult<Vec<CityGroup>>;

    /// Classify a city's zones into districts and areas.
    async fn classify_city(
        &self,
        city_name: &str,
        zones: &[ProviderZone],
    ) -> PipelineResult<CityClassification>;
}

/// Configuration for the HTTP classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

/// Classifier backed by an HTTP service.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    config: ClassifierConfig,
}

#[derive(Serialize)]
struct GroupRequest<'a> {
    zones: &'a [ProviderZone],
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    city_name: &'a str,
    zones: &'a [ProviderZone],
}

#[derive(Deserialize)]
struct GroupResponse {
    cities: Vec<CityGroup>,
}

impl HttpClassifier {
    /// Build a classifier client from config.
    pub fn new(config: ClassifierConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::NetworkTransient {
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    async fn post<Req: Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> PipelineResult<Resp> {
        let url = format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path);
        debug!(url = %url, "Calling classifier");

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::NetworkTransient {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(PipelineError::UpstreamRateLimited { retry_after_secs });
        }
        if status.is_server_error() {
            return Err(PipelineError::NetworkTransient {
                message: format!("classifier returned HTTP {status}"),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Validation {
                message: format!("classifier rejected request: HTTP {status}: {body}"),
            });
        }

        response
            .json()
            .await
            .map_err(|e| PipelineError::Validation {
                message: format!("classifier response malformed: {e}"),
            })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn group_cities(&self, zones: &[ProviderZone]) -> PipelineResult<Vec<CityGroup>> {
        let response: GroupResponse = self.post("group", &GroupRequest { zones }).await?;
        Ok(response.cities)
    }

    async fn classify_city(
        &self,
        city_name: &str,
        zones: &[ProviderZone],
    ) -> PipelineResult<CityClassification> {
        self.post("classify", &ClassifyRequest { city_name, zones })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn zone(id: &str, name: &str) -> ProviderZone {
        ProviderZone {
            id: ProviderZoneId::new(id),
            name: name.to_string(),
            display_name: None,
            is_active: true,
            geofence: None,
            postal_codes: vec![],
            city_hint: None,
            country_code: None,
        }
    }

    async fn classifier_for(server: &MockServer) -> HttpClassifier {
        HttpClassifier::new(ClassifierConfig {
            endpoint: server.uri(),
            api_key: "key".into(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn group_cities_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/group"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cities": [
                    {"city_name": "Oslo", "country_code": "NO", "zone_ids": ["z-1", "z-2"]}
                ]
            })))
            .mount(&server)
            .await;

        let groups = classifier_for(&server)
            .await
            .group_cities(&[zone("z-1", "Sentrum"), zone("z-2", "Frogner")])
            .await
            .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].city_name, "Oslo");
        assert_eq!(groups[0].zone_ids.len(), 2);
    }

    #[tokio::test]
    async fn classify_city_surfaces_needs_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "districts": [
                    {
                        "name": "Sentrum",
                        "areas": [
                            {"zone_id": "z-1", "proposed_name": "Kvadraturen",
                             "needs_mapping": false, "confidence": 0.93},
                            {"zone_id": "z-2", "proposed_name": "",
                             "needs_mapping": true, "confidence": 0.2}
                        ]
                    }
                ]
            })))
            .mount(&server)
            .await;

        let classification = classifier_for(&server)
            .await
            .classify_city("Oslo", &[zone("z-1", "Kvadraturen"), zone("z-2", "OSL-Z2")])
            .await
            .unwrap();

        let areas = &classification.districts[0].areas;
        assert!(!areas[0].needs_mapping);
        assert!(areas[1].needs_mapping);
    }

    #[tokio::test]
    async fn classifier_5xx_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/group"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = classifier_for(&server)
            .await
            .group_cities(&[])
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
