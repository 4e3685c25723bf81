use std::sync::Arc;
use tracing::{error, warn};
use crate::core::features::encode_with_schema;
use crate::core::model::{CompatibilityModel, ModelError};
use crate::models::{Donor, RecipientRequest, RhAntigen, RuleWeights, Urgency};

/// A single additive bonus applied by the rule-based scorer
#[derive(Debug, Clone, PartialEq)]
pub struct Bonus {
    pub reason: String,
    pub points: f64,
}

/// Rule-based bonuses for a blood-type-compatible pair, in evaluation order
///
/// Bonus rules:
///   exact blood type match        +exact_match
///   each shared C/c/E/e antigen   +antigen_match
///   shared Kell, Duffy, Kidd      +antigen_match each
///   more than N prior donations   +experience
///   critical request + emergency  +emergency
pub fn rule_based_bonuses(
    donor: &Donor,
    recipient: &RecipientRequest,
    weights: &RuleWeights,
) -> Vec<Bonus> {
    let mut bonuses = Vec::new();

    if let (Some(donor_type), Some(recipient_type)) = (donor.blood_type, recipient.blood_type) {
        if donor_type == recipient_type {
            bonuses.push(Bonus {
                reason: "Exact blood type match".to_string(),
                points: weights.exact_match,
            });
        }
    }

    for antigen in RhAntigen::ALL {
        if recipient.rh_variants.has(antigen) && donor.rh_variants.has(antigen) {
            bonuses.push(Bonus {
                reason: format!("Rh {} antigen match", antigen.symbol()),
                points: weights.antigen_match,
            });
        }
    }

    for (name, recipient_has, donor_has) in [
        ("Kell", recipient.kell, donor.kell),
        ("Duffy", recipient.duffy, donor.duffy),
        ("Kidd", recipient.kidd, donor.kidd),
    ] {
        if recipient_has && donor_has {
            bonuses.push(Bonus {
                reason: format!("{} antigen match", name),
                points: weights.antigen_match,
            });
        }
    }

    let donations = donor.donation_count();
    if donations > weights.experience_threshold {
        bonuses.push(Bonus {
            reason: format!("Experienced donor ({} donations)", donations),
            points: weights.experience,
        });
    }

    if recipient.urgency_level() == Urgency::Critical && donor.willing_for_emergency {
        bonuses.push(Bonus {
            reason: "Available for emergency donation".to_string(),
            points: weights.emergency,
        });
    }

    bonuses
}

/// Deterministic fallback score (0-100) for a blood-type-compatible pair
pub fn calculate_rule_based_score(
    donor: &Donor,
    recipient: &RecipientRequest,
    weights: &RuleWeights,
) -> f64 {
    let total = rule_based_bonuses(donor, recipient, weights)
        .iter()
        .fold(weights.base, |score, bonus| score + bonus.points);

    total.clamp(0.0, 100.0)
}

/// Score a pair with a learned model
pub fn calculate_learned_score(
    model: &dyn CompatibilityModel,
    donor: &Donor,
    recipient: &RecipientRequest,
) -> Result<f64, ModelError> {
    let features = encode_with_schema(model.schema(), donor, recipient);
    model.predict(&features)?.to_score()
}

/// Which path produced a score
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreSource {
    LearnedModel,
    RuleBased,
    /// The model failed and the rule-based score stood in
    Fallback(ModelError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub score: f64,
    pub source: ScoreSource,
}

impl ScoreOutcome {
    pub fn used_model(&self) -> bool {
        self.source == ScoreSource::LearnedModel
    }
}

/// Compatibility scorer, either backed by a learned model or purely rule-based
///
/// The model handle is fixed at construction and never replaced, so one
/// scorer can be shared freely between threads.
#[derive(Debug, Clone)]
pub enum Scorer {
    Learned {
        model: Arc<dyn CompatibilityModel>,
        weights: RuleWeights,
    },
    RuleBased {
        weights: RuleWeights,
    },
}

impl Scorer {
    pub fn rule_based(weights: RuleWeights) -> Self {
        Scorer::RuleBased { weights }
    }

    pub fn learned(model: Arc<dyn CompatibilityModel>, weights: RuleWeights) -> Self {
        Scorer::Learned { model, weights }
    }

    /// Learned when a model is available, rule-based otherwise
    pub fn from_model(model: Option<Arc<dyn CompatibilityModel>>, weights: RuleWeights) -> Self {
        match model {
            Some(model) => Self::learned(model, weights),
            None => Self::rule_based(weights),
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        matches!(self, Scorer::Learned { .. })
    }

    pub fn weights(&self) -> &RuleWeights {
        match self {
            Scorer::Learned { weights, .. } | Scorer::RuleBased { weights } => weights,
        }
    }

    /// Score a blood-type-compatible, hard-stop-free pair
    ///
    /// Model failures never escape: the rule-based score is returned and the
    /// failure is recorded on the outcome.
    pub fn score(&self, donor: &Donor, recipient: &RecipientRequest) -> ScoreOutcome {
        match self {
            Scorer::RuleBased { weights } => ScoreOutcome {
                score: calculate_rule_based_score(donor, recipient, weights),
                source: ScoreSource::RuleBased,
            },
            Scorer::Learned { model, weights } => {
                match calculate_learned_score(model.as_ref(), donor, recipient) {
                    Ok(score) => ScoreOutcome {
                        score,
                        source: ScoreSource::LearnedModel,
                    },
                    Err(e) => {
                        if e.is_recoverable() {
                            warn!("Model prediction unusable, using rule-based score: {}", e);
                        } else {
                            error!("Scoring failure in learned model, using rule-based score: {}", e);
                        }
                        ScoreOutcome {
                            score: calculate_rule_based_score(donor, recipient, weights),
                            source: ScoreSource::Fallback(e),
                        }
                    }
                }
            }
        }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::rule_based(RuleWeights::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::{FeatureSchema, FeatureVector};
    use crate::core::model::{check_features, ModelOutput};
    use crate::models::{BloodType, RhVariants};

    #[derive(Debug)]
    struct FixedModel {
        schema: FeatureSchema,
        output: Result<ModelOutput, ModelError>,
    }

    impl CompatibilityModel for FixedModel {
        fn schema(&self) -> FeatureSchema {
            self.schema
        }

        fn predict(&self, features: &FeatureVector) -> Result<ModelOutput, ModelError> {
            check_features(self.schema, features)?;
            self.output.clone()
        }
    }

    fn fixed(output: Result<ModelOutput, ModelError>) -> Arc<dyn CompatibilityModel> {
        Arc::new(FixedModel {
            schema: FeatureSchema::V1,
            output,
        })
    }

    fn donor(blood_type: BloodType) -> Donor {
        Donor {
            blood_type: Some(blood_type),
            ..Default::default()
        }
    }

    fn recipient(blood_type: BloodType) -> RecipientRequest {
        RecipientRequest {
            blood_type: Some(blood_type),
            ..Default::default()
        }
    }

    #[test]
    fn test_exact_match_scores_seventy() {
        let score = calculate_rule_based_score(
            &donor(BloodType::APos),
            &recipient(BloodType::APos),
            &RuleWeights::default(),
        );
        assert_eq!(score, 70.0);
    }

    #[test]
    fn test_compatible_non_exact_scores_base() {
        let score = calculate_rule_based_score(
            &donor(BloodType::ONeg),
            &recipient(BloodType::APos),
            &RuleWeights::default(),
        );
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_antigen_bonuses_need_both_sides() {
        let mut d = donor(BloodType::ONeg);
        d.rh_variants = RhVariants {
            big_c: true,
            small_e: true,
            ..Default::default()
        };
        d.kell = true;
        d.duffy = true;

        let mut r = recipient(BloodType::BPos);
        r.rh_variants = RhVariants {
            big_c: true,
            big_e: true,
            ..Default::default()
        };
        r.duffy = true;

        // C and Duffy are shared; e and Kell are donor-only, E recipient-only
        let score = calculate_rule_based_score(&d, &r, &RuleWeights::default());
        assert_eq!(score, 56.0);
    }

    #[test]
    fn test_experience_bonus_threshold() {
        let weights = RuleWeights::default();
        let r = recipient(BloodType::AbPos);

        let mut d = donor(BloodType::ONeg);
        d.total_donations = Some(5);
        assert_eq!(calculate_rule_based_score(&d, &r, &weights), 50.0);

        d.total_donations = Some(6);
        assert_eq!(calculate_rule_based_score(&d, &r, &weights), 55.0);
    }

    #[test]
    fn test_emergency_bonus_only_for_critical() {
        let weights = RuleWeights::default();
        let mut d = donor(BloodType::ONeg);
        d.willing_for_emergency = true;

        let mut r = recipient(BloodType::AbPos);
        r.urgency = Some(Urgency::High);
        assert_eq!(calculate_rule_based_score(&d, &r, &weights), 50.0);

        r.urgency = Some(Urgency::Critical);
        assert_eq!(calculate_rule_based_score(&d, &r, &weights), 60.0);
    }

    #[test]
    fn test_score_clamped_at_hundred() {
        let all = RhVariants {
            big_c: true,
            small_c: true,
            big_e: true,
            small_e: true,
        };
        let d = Donor {
            blood_type: Some(BloodType::AbPos),
            total_donations: Some(20),
            willing_for_emergency: true,
            rh_variants: all,
            kell: true,
            duffy: true,
            kidd: true,
            ..Default::default()
        };
        let r = RecipientRequest {
            blood_type: Some(BloodType::AbPos),
            urgency: Some(Urgency::Critical),
            rh_variants: all,
            kell: true,
            duffy: true,
            kidd: true,
            ..Default::default()
        };

        // 50 + 20 + 12 + 9 + 5 + 10 = 106
        assert_eq!(calculate_rule_based_score(&d, &r, &RuleWeights::default()), 100.0);
        assert_eq!(rule_based_bonuses(&d, &r, &RuleWeights::default()).len(), 10);
    }

    #[test]
    fn test_missing_types_are_not_an_exact_match() {
        let score = calculate_rule_based_score(
            &Donor::default(),
            &RecipientRequest::default(),
            &RuleWeights::default(),
        );
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_rule_based_scorer() {
        let scorer = Scorer::default();
        let outcome = scorer.score(&donor(BloodType::BNeg), &recipient(BloodType::BNeg));

        assert!(!scorer.is_model_loaded());
        assert_eq!(outcome.score, 70.0);
        assert_eq!(outcome.source, ScoreSource::RuleBased);
    }

    #[test]
    fn test_learned_scorer_uses_model() {
        let scorer = Scorer::learned(
            fixed(Ok(ModelOutput::Probabilities(vec![0.1, 0.9]))),
            RuleWeights::default(),
        );
        let outcome = scorer.score(&donor(BloodType::ONeg), &recipient(BloodType::APos));

        assert!(scorer.is_model_loaded());
        assert!(outcome.used_model());
        assert!((outcome.score - 90.0).abs() < 1e-9);
    }

    #[derive(Debug)]
    struct MislabeledModel;

    impl CompatibilityModel for MislabeledModel {
        fn schema(&self) -> FeatureSchema {
            FeatureSchema::V1
        }

        fn predict(&self, features: &FeatureVector) -> Result<ModelOutput, ModelError> {
            check_features(FeatureSchema::V2, features)?;
            Ok(ModelOutput::Raw(0.99))
        }
    }

    #[test]
    fn test_schema_mismatch_falls_back() {
        let scorer = Scorer::learned(Arc::new(MislabeledModel), RuleWeights::default());
        let outcome = scorer.score(&donor(BloodType::APos), &recipient(BloodType::APos));

        assert_eq!(outcome.score, 70.0);
        assert!(matches!(
            outcome.source,
            ScoreSource::Fallback(ModelError::SchemaMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_non_finite_output_falls_back() {
        let scorer = Scorer::learned(fixed(Ok(ModelOutput::Raw(f64::NAN))), RuleWeights::default());
        let outcome = scorer.score(&donor(BloodType::OPos), &recipient(BloodType::OPos));

        assert_eq!(outcome.score, 70.0);
        assert!(matches!(outcome.source, ScoreSource::Fallback(ModelError::NonFinite(_))));
    }

    #[test]
    fn test_evaluation_failure_falls_back() {
        let scorer = Scorer::learned(
            fixed(Err(ModelError::Evaluation("corrupt tree".to_string()))),
            RuleWeights::default(),
        );
        let outcome = scorer.score(&donor(BloodType::OPos), &recipient(BloodType::AbPos));

        assert_eq!(outcome.score, 50.0);
        assert!(!outcome.used_model());
    }

    #[test]
    fn test_custom_weights() {
        let weights = RuleWeights {
            base: 40.0,
            exact_match: 30.0,
            ..Default::default()
        };
        let scorer = Scorer::rule_based(weights);
        let outcome = scorer.score(&donor(BloodType::AbNeg), &recipient(BloodType::AbNeg));

        assert_eq!(outcome.score, 70.0);
        assert_eq!(scorer.weights().base, 40.0);
    }
}
