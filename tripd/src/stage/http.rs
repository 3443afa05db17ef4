//! HTTP stage client implementation
//!
//! Implements the PlannerStage, CriticStage, and IntentStage traits against
//! a JSON-over-HTTP planning backend. One client serves all three contracts;
//! retries are owned by the [`StageInvoker`](super::StageInvoker), so each
//! method here makes exactly one call.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{CriticStage, GenerationRequest, IntentStage, PlannerStage, StageError};
use crate::config::StageConfig;
use crate::domain::{ActivityItem, CritiqueResult, DayPlan, PlanContext, Preferences};

/// JSON-over-HTTP planning backend client
pub struct HttpStageClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl HttpStageClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &StageConfig) -> Result<Self, StageError> {
        debug!(?config, "from_config: called");
        let api_key = config
            .get_api_key()
            .map_err(|e| StageError::InvalidResponse(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(StageError::Network)?;

        Ok(Self {
            api_key,
            base_url: config.base_url.clone(),
            http,
        })
    }

    /// POST a JSON body and deserialize a JSON response
    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, StageError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "post: called");

        let response = self
            .http
            .post(url)
            .header("x-api-key", self.api_key.clone())
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();

        if status == 429 {
            debug!("post: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);

            return Err(StageError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            debug!(%status, "post: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(StageError::Api { status, message: text });
        }

        debug!("post: success");
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PlannerStage for HttpStageClient {
    async fn generate_day(
        &self,
        context: &PlanContext,
        request: &GenerationRequest,
    ) -> Result<Vec<ActivityItem>, StageError> {
        debug!(trip_id = %context.trip_id, day = %request.day_index, "generate_day: called");
        let body = serde_json::json!({
            "destination": context.destination,
            "date": context.date_for(request.day_index),
            "day_index": request.day_index,
            "preferences": context.preferences,
            "feedback": request.feedback,
            "constraints": request.constraints,
        });

        let response: GenerateDayResponse = self.post("/v1/plan/generate-day", &body).await?;
        if response.activities.is_empty() {
            return Err(StageError::InvalidResponse("empty activity list".to_string()));
        }
        Ok(response.activities)
    }
}

#[async_trait]
impl CriticStage for HttpStageClient {
    async fn critique_day(&self, context: &PlanContext, day: &DayPlan) -> Result<CritiqueResult, StageError> {
        debug!(trip_id = %context.trip_id, day = %day.index, "critique_day: called");
        let body = serde_json::json!({
            "destination": context.destination,
            "date": day.date,
            "preferences": context.preferences,
            "activities": day.activities,
        });

        let response: CritiqueResult = self.post("/v1/plan/critique-day", &body).await?;
        if !(0.0..=100.0).contains(&response.score) {
            return Err(StageError::InvalidResponse(format!(
                "critique score {} out of range",
                response.score
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl IntentStage for HttpStageClient {
    async fn extract_intent(&self, raw_text: &str) -> Result<Preferences, StageError> {
        debug!(chars = %raw_text.len(), "extract_intent: called");
        let body = serde_json::json!({ "text": raw_text });
        let response: IntentResponse = self.post("/v1/intent", &body).await?;
        Ok(response.preferences)
    }
}

// Backend response types

#[derive(Debug, serde::Deserialize)]
struct GenerateDayResponse {
    activities: Vec<ActivityItem>,
}

#[derive(Debug, serde::Deserialize)]
struct IntentResponse {
    preferences: Preferences,
}
