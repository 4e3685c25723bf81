use tracing::debug;
use crate::core::{
    compatibility::compatible_donor_types,
    eligibility::{hard_stops, temporary_deferrals},
    scoring::{rule_based_bonuses, ScoreOutcome, Scorer},
};
use crate::models::{BloodType, Donor, MatchResult, Priority, RecipientRequest};

/// Why a donor was turned away before scoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    IncompatibleBloodType,
    PermanentDeferral(Vec<String>),
}

impl Rejection {
    pub fn reason(&self) -> String {
        match self {
            Rejection::IncompatibleBloodType => "Blood type incompatible".to_string(),
            Rejection::PermanentDeferral(reasons) => {
                format!("Permanent deferral: {}", reasons.join(", "))
            }
        }
    }
}

/// Result of running one donor through the screening and scoring stages
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Rejected(Rejection),
    Scored {
        outcome: ScoreOutcome,
        warnings: Vec<String>,
    },
}

/// Single-pair assessment
#[derive(Debug, Clone, PartialEq)]
pub struct PairAssessment {
    pub compatible: bool,
    pub score: f64,
    pub warnings: Vec<String>,
    pub reason: Option<String>,
    pub model_used: bool,
}

/// Ranked donors for one recipient request
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMatches {
    pub matches: Vec<MatchResult>,
    pub total_matches_found: usize,
    pub model_used: bool,
}

/// Donor matching orchestrator
///
/// # Pipeline Stages
/// 1. Blood type compatibility
/// 2. Permanent deferral screening
/// 3. Scoring (learned model or rule-based)
/// 4. Temporary deferral warnings, priority tiers and ranking
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    scorer: Scorer,
}

impl Matcher {
    pub fn new(scorer: Scorer) -> Self {
        Self { scorer }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.scorer.is_model_loaded()
    }

    /// Screen and score one donor against a precomputed compatible set
    ///
    /// Both [`Matcher::score_pair`] and [`Matcher::rank_matches`] go through
    /// here so single and batch scoring cannot drift apart.
    fn evaluate(
        &self,
        donor: &Donor,
        recipient: &RecipientRequest,
        compatible_types: &[BloodType],
    ) -> Evaluation {
        let compatible = donor
            .blood_type
            .map(|bt| compatible_types.contains(&bt))
            .unwrap_or(false);
        if !compatible {
            return Evaluation::Rejected(Rejection::IncompatibleBloodType);
        }

        let stops = hard_stops(donor);
        if !stops.is_empty() {
            return Evaluation::Rejected(Rejection::PermanentDeferral(stops));
        }

        Evaluation::Scored {
            outcome: self.scorer.score(donor, recipient),
            warnings: temporary_deferrals(donor),
        }
    }

    /// Score a single donor/recipient pair
    ///
    /// Incompatible or permanently deferred donors come back with
    /// `compatible = false`, a zero score and a reason.
    pub fn score_pair(&self, donor: &Donor, recipient: &RecipientRequest) -> PairAssessment {
        let compatible_types = compatible_donor_types(recipient.blood_type);

        match self.evaluate(donor, recipient, &compatible_types) {
            Evaluation::Rejected(rejection) => PairAssessment {
                compatible: false,
                score: 0.0,
                warnings: Vec::new(),
                reason: Some(rejection.reason()),
                model_used: false,
            },
            Evaluation::Scored { outcome, warnings } => PairAssessment {
                compatible: true,
                score: outcome.score,
                warnings,
                reason: None,
                model_used: outcome.used_model(),
            },
        }
    }

    /// Find and rank matching donors for a recipient request
    ///
    /// Donors are screened in input order. Survivors are sorted by score,
    /// highest first; equal scores keep their input order.
    pub fn rank_matches(&self, recipient: &RecipientRequest, donors: &[Donor]) -> RankedMatches {
        let compatible_types = compatible_donor_types(recipient.blood_type);
        debug!(
            "Ranking {} donors for recipient type {:?}, compatible donor types: {:?}",
            donors.len(),
            recipient.blood_type,
            compatible_types
        );

        let mut model_used = false;
        let mut matches: Vec<MatchResult> = donors
            .iter()
            .filter_map(|donor| match self.evaluate(donor, recipient, &compatible_types) {
                Evaluation::Rejected(rejection) => {
                    debug!(
                        "Skipped donor {}: {}",
                        donor.display_name(),
                        rejection.reason()
                    );
                    None
                }
                Evaluation::Scored { outcome, warnings } => {
                    model_used |= outcome.used_model();
                    Some(self.build_match(donor, recipient, outcome.score, warnings))
                }
            })
            .collect();

        // Stable sort keeps input order for ties
        matches.sort_by(|a, b| {
            b.compatibility_score
                .partial_cmp(&a.compatibility_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        RankedMatches {
            total_matches_found: matches.len(),
            matches,
            model_used,
        }
    }

    fn build_match(
        &self,
        donor: &Donor,
        recipient: &RecipientRequest,
        score: f64,
        warnings: Vec<String>,
    ) -> MatchResult {
        // Only compatible donors reach this point, so the type is known
        let blood_type = donor.blood_type.unwrap_or(BloodType::ONeg);

        let mut match_reasons = vec![format!("Blood type {} compatible", blood_type)];
        match_reasons.extend(
            rule_based_bonuses(donor, recipient, self.scorer.weights())
                .into_iter()
                .map(|bonus| bonus.reason),
        );

        MatchResult {
            donor_id: donor.identifier(),
            donor_name: donor.display_name(),
            donor_blood_type: blood_type,
            donor_location: donor.location.clone().unwrap_or_else(|| "Unknown".to_string()),
            donor_contact: donor.contact_number.clone().unwrap_or_else(|| "N/A".to_string()),
            donor_availability: donor.availability.clone().unwrap_or_else(|| "N/A".to_string()),
            compatibility_score: round_score(score),
            priority: Priority::from_score(score),
            is_eligible: warnings.is_empty(),
            warnings,
            match_reasons,
        }
    }
}

/// Round to one decimal place
#[inline]
fn round_score(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}
