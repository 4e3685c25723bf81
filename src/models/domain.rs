use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Age substituted when a record omits it
pub const DEFAULT_AGE: u32 = 30;
/// Body weight (kg) substituted for donors and patients
pub const DEFAULT_WEIGHT_KG: f64 = 70.0;
/// Hemoglobin level (g/dL) substituted for donors
pub const DEFAULT_HEMOGLOBIN: f64 = 14.0;
/// Units requested when a request omits it
pub const DEFAULT_UNITS: u32 = 1;

/// ABO/Rh blood type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "O-")]
    ONeg,
    #[serde(rename = "O+")]
    OPos,
    #[serde(rename = "A-")]
    ANeg,
    #[serde(rename = "A+")]
    APos,
    #[serde(rename = "B-")]
    BNeg,
    #[serde(rename = "B+")]
    BPos,
    #[serde(rename = "AB-")]
    AbNeg,
    #[serde(rename = "AB+")]
    AbPos,
}

impl BloodType {
    pub const ALL: [BloodType; 8] = [
        BloodType::ONeg,
        BloodType::OPos,
        BloodType::ANeg,
        BloodType::APos,
        BloodType::BNeg,
        BloodType::BPos,
        BloodType::AbNeg,
        BloodType::AbPos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::ONeg => "O-",
            BloodType::OPos => "O+",
            BloodType::ANeg => "A-",
            BloodType::APos => "A+",
            BloodType::BNeg => "B-",
            BloodType::BPos => "B+",
            BloodType::AbNeg => "AB-",
            BloodType::AbPos => "AB+",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown blood type: {0}")]
pub struct UnknownBloodType(pub String);

impl FromStr for BloodType {
    type Err = UnknownBloodType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        BloodType::ALL
            .into_iter()
            .find(|bt| bt.as_str() == normalized)
            .ok_or_else(|| UnknownBloodType(s.to_string()))
    }
}

/// Request urgency, ordered from least to most urgent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Standard,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub const ALL: [Urgency; 4] = [
        Urgency::Standard,
        Urgency::Medium,
        Urgency::High,
        Urgency::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Standard => "standard",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Urgency::ALL
            .into_iter()
            .find(|u| u.as_str() == normalized)
            .ok_or_else(|| format!("unknown urgency: {}", s))
    }
}

/// Minor Rh antigens tracked for extended phenotype matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RhAntigen {
    BigC,
    SmallC,
    BigE,
    SmallE,
}

impl RhAntigen {
    pub const ALL: [RhAntigen; 4] = [
        RhAntigen::BigC,
        RhAntigen::SmallC,
        RhAntigen::BigE,
        RhAntigen::SmallE,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            RhAntigen::BigC => "C",
            RhAntigen::SmallC => "c",
            RhAntigen::BigE => "E",
            RhAntigen::SmallE => "e",
        }
    }
}

/// Presence of the C, c, E and e Rh antigens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RhVariants {
    #[serde(rename = "C", deserialize_with = "lenient_flag")]
    pub big_c: bool,
    #[serde(rename = "c", deserialize_with = "lenient_flag")]
    pub small_c: bool,
    #[serde(rename = "E", deserialize_with = "lenient_flag")]
    pub big_e: bool,
    #[serde(rename = "e", deserialize_with = "lenient_flag")]
    pub small_e: bool,
}

impl RhVariants {
    pub fn has(&self, antigen: RhAntigen) -> bool {
        match antigen {
            RhAntigen::BigC => self.big_c,
            RhAntigen::SmallC => self.small_c,
            RhAntigen::BigE => self.big_e,
            RhAntigen::SmallE => self.small_e,
        }
    }
}

/// Donor record with phenotype and medical history
///
/// Every field is optional on the wire. Missing, null or wrongly typed values
/// resolve to safe defaults instead of failing the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Donor {
    #[serde(deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub donor_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub donor_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub contact_number: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub availability: Option<String>,

    #[serde(deserialize_with = "lenient_blood_type")]
    pub blood_type: Option<BloodType>,
    #[serde(deserialize_with = "lenient_u32")]
    pub age: Option<u32>,
    #[serde(deserialize_with = "lenient_text")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub weight: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub hemoglobin_level: Option<f64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub total_donations: Option<u32>,
    #[serde(deserialize_with = "lenient_flag")]
    pub willing_for_emergency: bool,

    #[serde(deserialize_with = "lenient_rh_variants")]
    pub rh_variants: RhVariants,
    #[serde(deserialize_with = "lenient_flag")]
    pub kell: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub duffy: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub kidd: bool,

    // Permanent deferrals
    #[serde(deserialize_with = "lenient_flag")]
    pub hiv_status: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub hepatitis_b: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub hepatitis_c: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub htlv: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub iv_drug_use: bool,

    // Temporary deferrals
    #[serde(deserialize_with = "lenient_flag")]
    pub recent_cold_flu: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub recent_tattoo: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub recent_surgery: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub pregnant: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub recent_vaccination: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub recent_travel: bool,
}

impl Donor {
    /// Identifier from `id`, falling back to `donorId`
    pub fn identifier(&self) -> Option<String> {
        self.id.clone().or_else(|| self.donor_id.clone())
    }

    pub fn display_name(&self) -> String {
        self.donor_name.clone().unwrap_or_else(|| "Anonymous".to_string())
    }

    pub fn donation_count(&self) -> u32 {
        self.total_donations.unwrap_or(0)
    }
}

/// Recipient blood request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipientRequest {
    #[serde(deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub user_name: Option<String>,

    #[serde(deserialize_with = "lenient_blood_type")]
    pub blood_type: Option<BloodType>,
    #[serde(deserialize_with = "lenient_u32")]
    pub age: Option<u32>,
    #[serde(deserialize_with = "lenient_text")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub patient_weight: Option<f64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub units: Option<u32>,
    #[serde(deserialize_with = "lenient_urgency")]
    pub urgency: Option<Urgency>,

    #[serde(deserialize_with = "lenient_rh_variants")]
    pub rh_variants: RhVariants,
    #[serde(deserialize_with = "lenient_flag")]
    pub kell: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub duffy: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub kidd: bool,

    // Special handling
    #[serde(deserialize_with = "lenient_flag")]
    pub irradiated_blood: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub cmv_negative: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub washed_cells: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub leukocyte_reduced: bool,
}

impl RecipientRequest {
    /// Urgency, defaulting to standard when absent or unrecognized
    pub fn urgency_level(&self) -> Urgency {
        self.urgency.unwrap_or_default()
    }
}

/// Coarse match priority derived from the compatibility score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Priority::High
        } else if score >= 50.0 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

/// Ranked donor for a recipient request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub donor_id: Option<String>,
    pub donor_name: String,
    pub donor_blood_type: BloodType,
    pub donor_location: String,
    pub donor_contact: String,
    pub donor_availability: String,
    pub compatibility_score: f64,
    pub priority: Priority,
    pub is_eligible: bool,
    pub warnings: Vec<String>,
    pub match_reasons: Vec<String>,
}

/// Rule-based scoring weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleWeights {
    pub base: f64,
    pub exact_match: f64,
    pub antigen_match: f64,
    pub experience: f64,
    pub emergency: f64,
    /// Donations a donor must exceed to earn the experience bonus
    pub experience_threshold: u32,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            base: 50.0,
            exact_match: 20.0,
            antigen_match: 3.0,
            experience: 5.0,
            emergency: 10.0,
            experience_threshold: 5,
        }
    }
}

fn lenient_blood_type<'de, D>(deserializer: D) -> Result<Option<BloodType>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_value(Option::<Value>::deserialize(deserializer)?).and_then(|s| s.parse().ok()))
}

fn lenient_urgency<'de, D>(deserializer: D) -> Result<Option<Urgency>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_value(Option::<Value>::deserialize(deserializer)?).and_then(|s| s.parse().ok()))
}

/// Accept strings and numbers; anything else, or an empty string, is absent
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_value(Option::<Value>::deserialize(deserializer)?).filter(|s| !s.is_empty()))
}

/// Booleans, 0/1 numbers and "true"/"false" strings; anything else is false
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    })
}

/// Finite numbers, from JSON numbers or numeric strings
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number_value(Option::<Value>::deserialize(deserializer)?))
}

/// Non-negative whole numbers; `7.0` and `"7"` are accepted, `7.5` is not
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number_value(Option::<Value>::deserialize(deserializer)?)
        .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= u32::MAX as f64)
        .map(|v| v as u32))
}

fn lenient_rh_variants<'de, D>(deserializer: D) -> Result<RhVariants, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default())
}

fn text_value(raw: Option<Value>) -> Option<String> {
    match raw? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_value(raw: Option<Value>) -> Option<f64> {
    let value = match raw? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}
