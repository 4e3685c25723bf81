use actix_web::{web, HttpResponse, Responder};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use validator::Validate;
use crate::config::MatchingSettings;
use crate::core::Matcher;
use crate::models::{
    Donor, ErrorResponse, HealthResponse, MatchRequest, MatchResponse, PredictRequest,
    PredictResponse,
};

/// Application state shared across all handlers
///
/// The matcher, and the model inside it, is built once before the server
/// starts and is only read afterward.
#[derive(Clone)]
pub struct AppState {
    pub matcher: Arc<Matcher>,
    pub model_id: Option<String>,
    pub matching: MatchingSettings,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/predict", web::post().to(predict))
        .route("/match", web::post().to(match_donors));
}

/// Health check endpoint
///
/// Reports `degraded` while running on rule-based scoring only.
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let model_loaded = state.matcher.is_model_loaded();
    let status = if model_loaded { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        model_loaded,
        model_id: state.model_id.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Score a single donor/recipient pair
///
/// POST /api/v1/predict
///
/// Request body:
/// ```json
/// {
///   "donor": { "bloodType": "O-", "hivStatus": false },
///   "recipient": { "bloodType": "A+", "urgency": "critical" }
/// }
/// ```
async fn predict(
    state: web::Data<AppState>,
    req: web::Json<PredictRequest>,
) -> impl Responder {
    let PredictRequest { donor, recipient } = req.into_inner();

    let assessment = match run_engine(|| state.matcher.score_pair(&donor, &recipient)) {
        Ok(assessment) => assessment,
        Err(response) => return response,
    };

    HttpResponse::Ok().json(PredictResponse {
        compatible: assessment.compatible,
        score: assessment.score,
        warnings: assessment.warnings,
        reason: assessment.reason,
        model_used: assessment.model_used,
    })
}

/// Find and rank matching donors for a blood request
///
/// POST /api/v1/match
///
/// Request body:
/// ```json
/// {
///   "recipientRequest": { "bloodType": "AB+", "urgency": "high", "units": 2 },
///   "availableDonors": [ { "id": "d1", "bloodType": "O-" } ],
///   "limit": 10
/// }
/// ```
async fn match_donors(
    state: web::Data<AppState>,
    req: web::Json<MatchRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for match request: {:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let MatchRequest {
        recipient_request: recipient,
        available_donors,
        limit,
    } = req.into_inner();

    if available_donors.len() > state.matching.max_donors {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Too many donors".to_string(),
            message: format!(
                "At most {} donors can be ranked per request",
                state.matching.max_donors
            ),
            status_code: 400,
        });
    }

    tracing::info!(
        "Received match request: recipient type {:?}, {} donors",
        recipient.blood_type,
        available_donors.len()
    );

    let donors = parse_donors(available_donors);

    let ranked = match run_engine(|| state.matcher.rank_matches(&recipient, &donors)) {
        Ok(ranked) => ranked,
        Err(response) => return response,
    };

    let mut matches = ranked.matches;
    if let Some(limit) = limit.or(state.matching.default_limit) {
        matches.truncate(limit);
    }

    tracing::info!(
        "Returning {} matches (from {} found) for request {:?}",
        matches.len(),
        ranked.total_matches_found,
        recipient.id
    );

    HttpResponse::Ok().json(MatchResponse {
        request_id: recipient.id.clone(),
        recipient_name: recipient.user_name.clone(),
        blood_type_needed: recipient.blood_type,
        urgency: recipient.urgency,
        matches,
        total_matches_found: ranked.total_matches_found,
        model_used: ranked.model_used,
        timestamp: chrono::Utc::now(),
    })
}

/// Parse donor records one at a time, dropping any that do not parse
fn parse_donors(values: Vec<serde_json::Value>) -> Vec<Donor> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| match serde_json::from_value::<Donor>(value) {
            Ok(donor) => Some(donor),
            Err(e) => {
                tracing::warn!("Dropping unparseable donor record at index {}: {}", i, e);
                None
            }
        })
        .collect()
}

/// Run an engine call, turning a panic into a 500 for this request only
fn run_engine<T>(f: impl FnOnce() -> T) -> Result<T, HttpResponse> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|_| {
        tracing::error!("Matching engine panicked while handling request");
        HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Internal error".to_string(),
            message: "Failed to process request".to_string(),
            status_code: 500,
        })
    })
}
