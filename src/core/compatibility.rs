use crate::models::BloodType::{self, *};

/// ABO/Rh donation table: each donor type with the recipient types it can serve
///
/// This table is the only source of compatibility. Reverse lookups are
/// derived from it rather than encoded separately.
pub const DONATION_TABLE: [(BloodType, &[BloodType]); 8] = [
    (ONeg, &[ONeg, OPos, ANeg, APos, BNeg, BPos, AbNeg, AbPos]),
    (OPos, &[OPos, APos, BPos, AbPos]),
    (ANeg, &[ANeg, APos, AbNeg, AbPos]),
    (APos, &[APos, AbPos]),
    (BNeg, &[BNeg, BPos, AbNeg, AbPos]),
    (BPos, &[BPos, AbPos]),
    (AbNeg, &[AbNeg, AbPos]),
    (AbPos, &[AbPos]),
];

/// Recipient types a donor type can serve
#[inline]
fn recipients_served_by(donor: BloodType) -> &'static [BloodType] {
    DONATION_TABLE
        .iter()
        .find(|(d, _)| *d == donor)
        .map(|(_, recipients)| *recipients)
        .unwrap_or(&[])
}

/// Whether a donor type may donate to a recipient type
#[inline]
pub fn can_donate_to(donor: BloodType, recipient: BloodType) -> bool {
    recipients_served_by(donor).contains(&recipient)
}

/// Donor types that may donate to the recipient, in table order
///
/// A missing or unrecognized recipient type yields an empty set, so no donor
/// passes.
pub fn compatible_donor_types(recipient: Option<BloodType>) -> Vec<BloodType> {
    let Some(recipient) = recipient else {
        return Vec::new();
    };

    DONATION_TABLE
        .iter()
        .filter(|(_, recipients)| recipients.contains(&recipient))
        .map(|(donor, _)| *donor)
        .collect()
}
