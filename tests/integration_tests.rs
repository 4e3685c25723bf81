// Integration tests for Blood Match

use blood_match::core::{FeatureSchema, Matcher, Scorer};
use blood_match::models::{BloodType, Donor, Priority, RecipientRequest, RuleWeights, Urgency};
use blood_match::services::ModelArtifact;
use serde_json::json;
use std::sync::Arc;
use std::thread;

fn create_donor(id: &str, blood_type: BloodType) -> Donor {
    Donor {
        id: Some(id.to_string()),
        donor_name: Some(format!("Donor {}", id)),
        blood_type: Some(blood_type),
        ..Default::default()
    }
}

fn create_request(blood_type: BloodType, urgency: Urgency) -> RecipientRequest {
    RecipientRequest {
        id: Some("req-42".to_string()),
        user_name: Some("Patient".to_string()),
        blood_type: Some(blood_type),
        urgency: Some(urgency),
        ..Default::default()
    }
}

/// Tree ensemble that is confident only for donors willing to give in an emergency
fn emergency_model_matcher() -> Matcher {
    let artifact = json!({
        "kind": "tree_ensemble",
        "schema_version": 1,
        "feature_names": FeatureSchema::V1.feature_names(),
        "objective": "binary:logistic",
        "trees": [{
            "nodes": [
                { "feature": 6, "threshold": 0.5, "left": 1, "right": 2 },
                { "leaf": 0.0 },
                { "leaf": 9.0_f64.ln() }
            ]
        }]
    });

    let model = ModelArtifact::from_json(&artifact.to_string())
        .unwrap()
        .into_model()
        .unwrap();

    Matcher::new(Scorer::learned(model, RuleWeights::default()))
}

#[test]
fn test_integration_end_to_end_matching() {
    let matcher = Matcher::default();
    let request = create_request(BloodType::APos, Urgency::Critical);

    let mut hero = create_donor("hero", BloodType::APos);
    hero.willing_for_emergency = true;
    hero.total_donations = Some(20);

    let mut traveler = create_donor("traveler", BloodType::ONeg);
    traveler.recent_travel = true;

    let mut deferred = create_donor("deferred", BloodType::APos);
    deferred.hepatitis_b = true;

    let donors = vec![
        create_donor("plain", BloodType::OPos),
        traveler,
        create_donor("wrong", BloodType::BPos),
        deferred,
        hero,
        create_donor("ab-neg", BloodType::AbNeg),
    ];

    let result = matcher.rank_matches(&request, &donors);

    let ids: Vec<_> = result
        .matches
        .iter()
        .filter_map(|m| m.donor_id.clone())
        .collect();
    assert_eq!(ids, vec!["hero", "plain", "traveler"]);
    assert_eq!(result.total_matches_found, 3);

    // 50 + 20 + 5 + 10
    let top = &result.matches[0];
    assert_eq!(top.compatibility_score, 85.0);
    assert_eq!(top.priority, Priority::High);
    assert!(top.is_eligible);

    let traveler = &result.matches[2];
    assert_eq!(traveler.priority, Priority::Medium);
    assert!(!traveler.is_eligible);
    assert_eq!(traveler.warnings, vec!["Recent travel"]);
}

#[test]
fn test_integration_scores_are_bounded() {
    let matcher = Matcher::default();
    let request = create_request(BloodType::AbPos, Urgency::High);

    let donors: Vec<Donor> = BloodType::ALL
        .iter()
        .enumerate()
        .map(|(i, bt)| {
            let mut donor = create_donor(&i.to_string(), *bt);
            donor.total_donations = Some(i as u32 * 3);
            donor.kell = i % 2 == 0;
            donor
        })
        .collect();

    let result = matcher.rank_matches(&request, &donors);

    assert_eq!(result.matches.len(), 8);
    for pair in result.matches.windows(2) {
        assert!(pair[0].compatibility_score >= pair[1].compatibility_score);
    }
    for m in &result.matches {
        assert!(m.compatibility_score >= 0.0 && m.compatibility_score <= 100.0);
        assert_eq!(m.match_reasons[0], format!("Blood type {} compatible", m.donor_blood_type));
    }
}

#[test]
fn test_integration_ranking_is_repeatable() {
    let matcher = Matcher::default();
    let request = create_request(BloodType::OPos, Urgency::Standard);
    let donors: Vec<Donor> = (0..50)
        .map(|i| {
            let bt = if i % 2 == 0 { BloodType::OPos } else { BloodType::ONeg };
            let mut donor = create_donor(&i.to_string(), bt);
            donor.total_donations = Some(i % 9);
            donor
        })
        .collect();

    let first = matcher.rank_matches(&request, &donors);
    let second = matcher.rank_matches(&request, &donors);

    assert_eq!(first, second);
}

#[test]
fn test_integration_single_and_batch_agree() {
    let matcher = Matcher::default();
    let request = create_request(BloodType::BNeg, Urgency::Critical);

    let mut donor = create_donor("1", BloodType::BNeg);
    donor.willing_for_emergency = true;
    donor.recent_vaccination = true;

    let pair = matcher.score_pair(&donor, &request);
    let ranked = matcher.rank_matches(&request, std::slice::from_ref(&donor));

    assert!(pair.compatible);
    assert_eq!(pair.score, ranked.matches[0].compatibility_score);
    assert_eq!(pair.warnings, ranked.matches[0].warnings);
}

#[test]
fn test_integration_learned_model_path() {
    let matcher = emergency_model_matcher();
    let request = create_request(BloodType::OPos, Urgency::Standard);

    let mut willing = create_donor("willing", BloodType::ONeg);
    willing.willing_for_emergency = true;
    let donors = vec![create_donor("reluctant", BloodType::OPos), willing];

    let result = matcher.rank_matches(&request, &donors);

    assert!(result.model_used);
    assert_eq!(result.matches[0].donor_id.as_deref(), Some("willing"));
    assert!((result.matches[0].compatibility_score - 90.0).abs() < 1e-9);
    assert!((result.matches[1].compatibility_score - 50.0).abs() < 1e-9);
    assert_eq!(result.matches[1].priority, Priority::Medium);
}

#[test]
fn test_integration_model_not_used_when_nothing_scored() {
    let matcher = emergency_model_matcher();
    let request = create_request(BloodType::ONeg, Urgency::Critical);

    let result = matcher.rank_matches(&request, &[create_donor("1", BloodType::APos)]);

    assert!(result.matches.is_empty());
    assert!(!result.model_used);

    let pair = matcher.score_pair(&create_donor("1", BloodType::APos), &request);
    assert!(!pair.compatible);
    assert!(!pair.model_used);
}

#[test]
fn test_integration_concurrent_ranking() {
    let matcher = Arc::new(Matcher::default());
    let request = Arc::new(create_request(BloodType::AbNeg, Urgency::High));
    let donors: Arc<Vec<Donor>> = Arc::new(
        (0..200)
            .map(|i| {
                let bt = [BloodType::ONeg, BloodType::ANeg, BloodType::BNeg, BloodType::AbNeg][i % 4];
                let mut donor = create_donor(&i.to_string(), bt);
                donor.total_donations = Some((i % 11) as u32);
                donor
            })
            .collect(),
    );

    let expected = matcher.rank_matches(&request, &donors);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let matcher = Arc::clone(&matcher);
            let request = Arc::clone(&request);
            let donors = Arc::clone(&donors);
            thread::spawn(move || matcher.rank_matches(&request, &donors))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_integration_donors_from_json() {
    let matcher = Matcher::default();
    let request: RecipientRequest = serde_json::from_value(json!({
        "id": 7,
        "bloodType": "o+",
        "urgency": "CRITICAL"
    }))
    .unwrap();

    let donors: Vec<Donor> = serde_json::from_value(json!([
        { "donorId": 1001, "bloodType": "O+", "willingForEmergency": true },
        { "id": "x", "bloodType": "unknown" },
        { "bloodType": "O-", "recentSurgery": true }
    ]))
    .unwrap();

    let result = matcher.rank_matches(&request, &donors);

    assert_eq!(request.id.as_deref(), Some("7"));
    assert_eq!(result.total_matches_found, 2);
    assert_eq!(result.matches[0].donor_id.as_deref(), Some("1001"));
    assert_eq!(result.matches[0].compatibility_score, 80.0);
    assert_eq!(result.matches[1].donor_name, "Anonymous");
    assert_eq!(result.matches[1].warnings, vec!["Recent surgery"]);
}
