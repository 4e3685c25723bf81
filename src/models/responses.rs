use serde::{Deserialize, Serialize};
use crate::models::domain::{BloodType, MatchResult, Urgency};

/// Response for the single-pair predict endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    pub compatible: bool,
    pub score: f64,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub model_used: bool,
}

/// Response for the match endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub request_id: Option<String>,
    pub recipient_name: Option<String>,
    pub blood_type_needed: Option<BloodType>,
    pub urgency: Option<Urgency>,
    pub matches: Vec<MatchResult>,
    pub total_matches_found: usize,
    pub model_used: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub model_id: Option<String>,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
