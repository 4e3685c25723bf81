// Core engine exports
pub mod compatibility;
pub mod eligibility;
pub mod features;
pub mod matcher;
pub mod model;
pub mod scoring;

pub use compatibility::{can_donate_to, compatible_donor_types};
pub use eligibility::{hard_stops, temporary_deferrals};
pub use features::{encode, encode_with_schema, FeatureSchema, FeatureVector};
pub use matcher::{Evaluation, Matcher, PairAssessment, RankedMatches, Rejection};
pub use model::{CompatibilityModel, ModelError, ModelOutput};
pub use scoring::{calculate_rule_based_score, ScoreOutcome, ScoreSource, Scorer};
