use crate::models::Donor;

/// Permanent deferral checklist, in reporting order
fn hard_stop_checklist(donor: &Donor) -> [(bool, &'static str); 5] {
    [
        (donor.hiv_status, "HIV positive"),
        (donor.hepatitis_b, "Hepatitis B"),
        (donor.hepatitis_c, "Hepatitis C"),
        (donor.htlv, "HTLV positive"),
        (donor.iv_drug_use, "IV drug use history"),
    ]
}

/// Temporary deferral checklist, in reporting order
fn temporary_deferral_checklist(donor: &Donor) -> [(bool, &'static str); 6] {
    [
        (donor.recent_cold_flu, "Recent cold/flu"),
        (donor.recent_tattoo, "Recent tattoo"),
        (donor.recent_surgery, "Recent surgery"),
        (donor.pregnant, "Pregnant"),
        (donor.recent_vaccination, "Recent vaccination"),
        (donor.recent_travel, "Recent travel"),
    ]
}

/// Permanent deferral reasons for a donor
///
/// A non-empty result disqualifies the donor outright; they must be dropped
/// before scoring.
pub fn hard_stops(donor: &Donor) -> Vec<String> {
    collect_reasons(&hard_stop_checklist(donor))
}

/// Temporary deferral reasons for a donor
///
/// These do not exclude the donor; they surface as warnings and mark the
/// match as not currently eligible.
pub fn temporary_deferrals(donor: &Donor) -> Vec<String> {
    collect_reasons(&temporary_deferral_checklist(donor))
}

fn collect_reasons(checklist: &[(bool, &'static str)]) -> Vec<String> {
    checklist
        .iter()
        .filter(|(flagged, _)| *flagged)
        .map(|(_, reason)| reason.to_string())
        .collect()
}
