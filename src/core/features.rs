//! Donor/recipient feature encoding for learned scorers.
//!
//! The order of features is a contract with the trained model. It is pinned
//! by [`FeatureSchema`]: each version names its features, and model
//! artifacts declare the version and names they were trained on.

use crate::models::domain::{DEFAULT_AGE, DEFAULT_HEMOGLOBIN, DEFAULT_UNITS, DEFAULT_WEIGHT_KG};
use crate::models::{BloodType, Donor, RecipientRequest, RhAntigen, RhVariants, Urgency};

/// Blood type ordering used for the ordinal encoding
pub const BLOOD_TYPE_ENCODING: [BloodType; 8] = [
    BloodType::APos,
    BloodType::ANeg,
    BloodType::BPos,
    BloodType::BNeg,
    BloodType::AbPos,
    BloodType::AbNeg,
    BloodType::OPos,
    BloodType::ONeg,
];

pub const DONOR_FEATURES: [&str; 14] = [
    "donor_blood_type",
    "donor_age",
    "donor_gender",
    "donor_weight",
    "donor_hemoglobin",
    "donor_total_donations",
    "donor_willing_emergency",
    "donor_rh_C",
    "donor_rh_c",
    "donor_rh_E",
    "donor_rh_e",
    "donor_kell",
    "donor_duffy",
    "donor_kidd",
];

pub const RECIPIENT_FEATURES: [&str; 13] = [
    "recipient_blood_type",
    "recipient_age",
    "recipient_gender",
    "recipient_weight",
    "recipient_units_needed",
    "recipient_urgency",
    "recipient_rh_C",
    "recipient_rh_c",
    "recipient_rh_E",
    "recipient_rh_e",
    "recipient_kell",
    "recipient_duffy",
    "recipient_kidd",
];

pub const SPECIAL_HANDLING_FEATURES: [&str; 4] = [
    "recipient_irradiated",
    "recipient_cmv_negative",
    "recipient_washed_cells",
    "recipient_leukocyte_reduced",
];

/// Versioned feature layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FeatureSchema {
    /// 14 donor + 13 recipient features
    #[default]
    V1,
    /// V1 followed by the four special-handling flags
    V2,
}

impl FeatureSchema {
    pub fn version(&self) -> u32 {
        match self {
            FeatureSchema::V1 => 1,
            FeatureSchema::V2 => 2,
        }
    }

    pub fn from_version(version: u32) -> Option<Self> {
        match version {
            1 => Some(FeatureSchema::V1),
            2 => Some(FeatureSchema::V2),
            _ => None,
        }
    }

    /// Number of features emitted under this schema
    pub fn width(&self) -> usize {
        match self {
            FeatureSchema::V1 => DONOR_FEATURES.len() + RECIPIENT_FEATURES.len(),
            FeatureSchema::V2 => {
                DONOR_FEATURES.len() + RECIPIENT_FEATURES.len() + SPECIAL_HANDLING_FEATURES.len()
            }
        }
    }

    /// Feature names in emission order
    pub fn feature_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = DONOR_FEATURES
            .iter()
            .chain(RECIPIENT_FEATURES.iter())
            .copied()
            .collect();
        if *self == FeatureSchema::V2 {
            names.extend(SPECIAL_HANDLING_FEATURES);
        }
        names
    }
}

/// Encoded features tagged with the schema that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    schema: FeatureSchema,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Encode a pair under the default (v1) schema
pub fn encode(donor: &Donor, recipient: &RecipientRequest) -> FeatureVector {
    encode_with_schema(FeatureSchema::V1, donor, recipient)
}

/// Encode a pair under a specific schema
pub fn encode_with_schema(
    schema: FeatureSchema,
    donor: &Donor,
    recipient: &RecipientRequest,
) -> FeatureVector {
    let mut values = Vec::with_capacity(schema.width());

    // Donor features
    values.push(blood_type_index(donor.blood_type));
    values.push(donor.age.unwrap_or(DEFAULT_AGE) as f64);
    values.push(gender_code(donor.gender.as_deref()));
    values.push(donor.weight.unwrap_or(DEFAULT_WEIGHT_KG));
    values.push(donor.hemoglobin_level.unwrap_or(DEFAULT_HEMOGLOBIN));
    values.push(donor.donation_count() as f64);
    values.push(flag(donor.willing_for_emergency));
    push_antigens(&mut values, &donor.rh_variants);
    values.push(flag(donor.kell));
    values.push(flag(donor.duffy));
    values.push(flag(donor.kidd));

    // Recipient features
    values.push(blood_type_index(recipient.blood_type));
    values.push(recipient.age.unwrap_or(DEFAULT_AGE) as f64);
    values.push(gender_code(recipient.gender.as_deref()));
    values.push(recipient.patient_weight.unwrap_or(DEFAULT_WEIGHT_KG));
    values.push(recipient.units.unwrap_or(DEFAULT_UNITS) as f64);
    values.push(urgency_index(recipient.urgency_level()));
    push_antigens(&mut values, &recipient.rh_variants);
    values.push(flag(recipient.kell));
    values.push(flag(recipient.duffy));
    values.push(flag(recipient.kidd));

    if schema == FeatureSchema::V2 {
        values.push(flag(recipient.irradiated_blood));
        values.push(flag(recipient.cmv_negative));
        values.push(flag(recipient.washed_cells));
        values.push(flag(recipient.leukocyte_reduced));
    }

    FeatureVector { schema, values }
}

/// Ordinal index of a blood type; unknown or missing encodes as 0
#[inline]
pub fn blood_type_index(blood_type: Option<BloodType>) -> f64 {
    blood_type
        .and_then(|bt| BLOOD_TYPE_ENCODING.iter().position(|candidate| *candidate == bt))
        .unwrap_or(0) as f64
}

#[inline]
fn urgency_index(urgency: Urgency) -> f64 {
    Urgency::ALL
        .iter()
        .position(|u| *u == urgency)
        .unwrap_or(0) as f64
}

#[inline]
fn gender_code(gender: Option<&str>) -> f64 {
    flag(gender == Some("Male"))
}

#[inline]
fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

fn push_antigens(values: &mut Vec<f64>, variants: &RhVariants) {
    for antigen in RhAntigen::ALL {
        values.push(flag(variants.has(antigen)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_widths() {
        assert_eq!(FeatureSchema::V1.width(), 27);
        assert_eq!(FeatureSchema::V2.width(), 31);
        assert_eq!(FeatureSchema::V1.feature_names().len(), 27);
        assert_eq!(FeatureSchema::V2.feature_names().len(), 31);
    }

    #[test]
    fn test_schema_versions_round_trip() {
        for schema in [FeatureSchema::V1, FeatureSchema::V2] {
            assert_eq!(FeatureSchema::from_version(schema.version()), Some(schema));
        }
        assert_eq!(FeatureSchema::from_version(7), None);
    }

    #[test]
    fn test_encode_defaults() {
        let features = encode(&Donor::default(), &RecipientRequest::default());
        let v = features.values();

        assert_eq!(features.len(), 27);
        assert_eq!(features.schema(), FeatureSchema::V1);
        assert_eq!(v[0], 0.0); // unknown blood type
        assert_eq!(v[1], 30.0);
        assert_eq!(v[2], 0.0);
        assert_eq!(v[3], 70.0);
        assert_eq!(v[4], 14.0);
        assert_eq!(v[5], 0.0);
        assert_eq!(v[15], 30.0);
        assert_eq!(v[17], 70.0);
        assert_eq!(v[18], 1.0); // units
        assert_eq!(v[19], 0.0); // standard urgency
    }

    #[test]
    fn test_encode_populated_pair() {
        let donor = Donor {
            blood_type: Some(BloodType::ONeg),
            age: Some(41),
            gender: Some("Male".to_string()),
            weight: Some(82.5),
            hemoglobin_level: Some(15.2),
            total_donations: Some(9),
            willing_for_emergency: true,
            rh_variants: RhVariants {
                small_c: true,
                small_e: true,
                ..Default::default()
            },
            kidd: true,
            ..Default::default()
        };
        let recipient = RecipientRequest {
            blood_type: Some(BloodType::AbNeg),
            gender: Some("Female".to_string()),
            units: Some(3),
            urgency: Some(Urgency::Critical),
            kell: true,
            ..Default::default()
        };

        let features = encode(&donor, &recipient);
        let names = FeatureSchema::V1.feature_names();
        let value_of = |name: &str| {
            let idx = names.iter().position(|n| *n == name).unwrap();
            features.values()[idx]
        };

        assert_eq!(value_of("donor_blood_type"), 7.0);
        assert_eq!(value_of("donor_age"), 41.0);
        assert_eq!(value_of("donor_gender"), 1.0);
        assert_eq!(value_of("donor_weight"), 82.5);
        assert_eq!(value_of("donor_hemoglobin"), 15.2);
        assert_eq!(value_of("donor_total_donations"), 9.0);
        assert_eq!(value_of("donor_willing_emergency"), 1.0);
        assert_eq!(value_of("donor_rh_C"), 0.0);
        assert_eq!(value_of("donor_rh_c"), 1.0);
        assert_eq!(value_of("donor_rh_e"), 1.0);
        assert_eq!(value_of("donor_kidd"), 1.0);
        assert_eq!(value_of("recipient_blood_type"), 5.0);
        assert_eq!(value_of("recipient_gender"), 0.0);
        assert_eq!(value_of("recipient_units_needed"), 3.0);
        assert_eq!(value_of("recipient_urgency"), 3.0);
        assert_eq!(value_of("recipient_kell"), 1.0);
    }

    #[test]
    fn test_v2_appends_special_handling() {
        let recipient = RecipientRequest {
            irradiated_blood: true,
            leukocyte_reduced: true,
            ..Default::default()
        };

        let v1 = encode(&Donor::default(), &recipient);
        let v2 = encode_with_schema(FeatureSchema::V2, &Donor::default(), &recipient);

        assert_eq!(&v2.values()[..27], v1.values());
        assert_eq!(&v2.values()[27..], &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_gender_is_exact_match() {
        assert_eq!(gender_code(Some("Male")), 1.0);
        assert_eq!(gender_code(Some("male")), 0.0);
        assert_eq!(gender_code(None), 0.0);
    }
}
