use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::models::domain::{Donor, RecipientRequest};

/// Request to score a single donor/recipient pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub donor: Donor,
    #[serde(default)]
    pub recipient: RecipientRequest,
}

/// Request to rank donors for a recipient
///
/// Donors stay as raw JSON so one malformed record is dropped on its own
/// instead of rejecting the whole batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    #[serde(default)]
    pub recipient_request: RecipientRequest,
    #[validate(length(max = 10000))]
    #[serde(default)]
    pub available_donors: Vec<serde_json::Value>,
    #[validate(range(min = 1, max = 1000))]
    #[serde(default)]
    pub limit: Option<usize>,
}
