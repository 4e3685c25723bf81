//! Blood Match - donor/recipient compatibility scoring and ranking
//!
//! This library screens donors against a recipient request (ABO/Rh
//! compatibility, permanent and temporary deferrals), scores the survivors
//! with a learned model or a rule-based fallback, and ranks them.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{compatible_donor_types, Matcher, Scorer};
pub use models::{BloodType, Donor, MatchResult, RecipientRequest, RuleWeights, Urgency};
