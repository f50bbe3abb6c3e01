// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava vendor integration.
//!
//! Handles:
//! - OAuth code exchange and token refresh
//! - Activity fetching mapped to health datapoints
//! - Deauthorization on disconnect
//! - Rate limit and invalid-token detection (tagged for retry handling)

use super::{DeviceDataProvider, HealthDatapoint, TokenResponse};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

const ACTIVITIES_PER_PAGE: u32 = 100;

// Strava caps athlete activity listings; we stop paging well before that.
const MAX_ACTIVITY_PAGES: u32 = 10;

/// Strava API client implementing the device provider contract.
pub struct StravaProvider {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaProvider {
    /// Create a new Strava provider with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://www.strava.com/api/v3".to_string(),
            token_url: "https://www.strava.com/oauth/token".to_string(),
            client_id,
            client_secret,
        }
    }

    /// List activities after a Unix timestamp (paginated).
    async fn list_activities(
        &self,
        access_token: &str,
        after: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", after.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// POST to the token endpoint with the given form parameters.
    async fn token_request(
        &self,
        params: &[(&str, &str)],
    ) -> Result<StravaTokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Token request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Rate limit - retryable on the next scheduled pass
        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
            return Err(AppError::Provider(AppError::VENDOR_RATE_LIMIT.to_string()));
        }

        // Unauthorized - token may be expired or revoked vendor-side
        if status.as_u16() == 401 {
            return Err(AppError::Provider(AppError::VENDOR_TOKEN_ERROR.to_string()));
        }

        Err(AppError::Provider(format!("HTTP {}: {}", status, body)))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
                return Err(AppError::Provider(AppError::VENDOR_RATE_LIMIT.to_string()));
            }

            if status.as_u16() == 401 {
                return Err(AppError::Provider(AppError::VENDOR_TOKEN_ERROR.to_string()));
            }

            return Err(AppError::Provider(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl DeviceDataProvider for StravaProvider {
    fn vendor(&self) -> &str {
        "strava"
    }

    fn supported_data_types(&self) -> &[&str] {
        &["ACTIVITY"]
    }

    async fn authorize(
        &self,
        auth_code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let token = self
            .token_request(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", auth_code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .await?;

        Ok(token.into_token_response())
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let token = self
            .token_request(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        Ok(token.into_token_response())
    }

    async fn fetch_health_data(
        &self,
        access_token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HealthDatapoint>, AppError> {
        let after = from
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();

        let mut datapoints = Vec::new();
        let mut page = 1;

        loop {
            let activities = self
                .list_activities(access_token, after, page, ACTIVITIES_PER_PAGE)
                .await?;
            let fetched = activities.len();

            for activity in activities {
                let Some(datapoint) = activity.into_datapoint() else {
                    continue;
                };
                if datapoint.record_date <= to {
                    datapoints.push(datapoint);
                }
            }

            if fetched < ACTIVITIES_PER_PAGE as usize || page >= MAX_ACTIVITY_PAGES {
                break;
            }
            page += 1;
        }

        Ok(datapoints)
    }

    async fn revoke_access(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post("https://www.strava.com/oauth/deauthorize")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Deauthorization request failed: {}", e)))?;

        self.check_response(response).await?;
        tracing::info!("Strava deauthorization successful");
        Ok(())
    }
}

/// Token response from the Strava OAuth endpoint.
///
/// Strava reports an absolute `expires_at`; the shared contract carries a
/// relative `expires_in_secs`.
#[derive(Debug, Clone, Deserialize)]
struct StravaTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
    #[serde(default)]
    athlete: Option<StravaAthlete>,
}

impl StravaTokenResponse {
    fn into_token_response(self) -> TokenResponse {
        let expires_in_secs = self.expires_at - Utc::now().timestamp();
        TokenResponse {
            access_token: self.access_token,
            refresh_token: Some(self.refresh_token),
            expires_in_secs: expires_in_secs.max(0),
            token_type: "Bearer".to_string(),
            vendor_user_id: self.athlete.map(|a| a.id.to_string()),
        }
    }
}

/// Athlete info included in the token exchange response.
#[derive(Debug, Clone, Deserialize)]
struct StravaAthlete {
    id: u64,
}

/// Summary activity from the list endpoint.
#[derive(Debug, Clone, Deserialize)]
struct StravaActivitySummary {
    id: u64,
    name: String,
    sport_type: String,
    start_date: String,
    distance: f64,
}

impl StravaActivitySummary {
    /// Map an activity into the shared datapoint shape.
    fn into_datapoint(self) -> Option<HealthDatapoint> {
        let measured_at = DateTime::parse_from_rfc3339(&self.start_date)
            .ok()?
            .with_timezone(&Utc);

        Some(HealthDatapoint {
            record_date: measured_at.date_naive(),
            metric_type: "ACTIVITY".to_string(),
            value: serde_json::json!({
                "activity_id": self.id,
                "name": self.name,
                "sport_type": self.sport_type,
                "distance_m": self.distance,
            }),
            measured_at,
        })
    }
}
