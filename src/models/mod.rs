// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{BloodType, Donor, MatchResult, Priority, RecipientRequest, RhAntigen, RhVariants, RuleWeights, Urgency};
pub use requests::{MatchRequest, PredictRequest};
pub use responses::{ErrorResponse, HealthResponse, MatchResponse, PredictResponse};
