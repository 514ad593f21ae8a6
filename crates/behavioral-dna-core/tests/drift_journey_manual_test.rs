//! Manual verification of drift analysis and journey characterization
//! against a real snapshot store.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use uuid::Uuid;

use behavioral_dna_core::drift::{DriftAnalyzer, DriftSeverity, DriftUrgency};
use behavioral_dna_core::journey::{JourneyCharacterizer, JourneyType};
use behavioral_dna_core::stubs::InMemorySnapshotStore;
use behavioral_dna_core::traits::{SnapshotStore, TimeRange};
use behavioral_dna_core::types::{
    BehavioralDna, DimensionMembership, MembershipVector, RetentionClass, SegmentId, Snapshot,
};

/// One-dimension snapshot at a given age.
fn tier_snapshot(
    entity: Uuid,
    version: Uuid,
    ids: &[SegmentId],
    weights: &[f32],
    days_ago: i64,
) -> Snapshot {
    let vector = MembershipVector::from_parts(ids, weights).unwrap();
    let mut memberships = BTreeMap::new();
    memberships.insert("tier".to_string(), DimensionMembership { version, vector });

    let captured_at = Utc::now() - Duration::days(days_ago);
    Snapshot {
        id: Uuid::new_v4(),
        entity_id: entity,
        dna: BehavioralDna {
            entity_id: entity,
            memberships,
            confidence: 0.9,
            observation_count: 200,
            cold_start: false,
            computed_at: captured_at,
        },
        captured_at,
        retention: RetentionClass::Weekly,
    }
}

// =============================================================================
// NINETY-DAY TIER SHIFT
// =============================================================================

#[test]
fn test_fsv_ninety_day_tier_shift() {
    println!("[FSV] tier [0.9, 0.1] -> [0.1, 0.9] over 90 days");

    let entity = Uuid::new_v4();
    let version = Uuid::new_v4();
    let ids = [Uuid::new_v4(), Uuid::new_v4()];

    let t0 = tier_snapshot(entity, version, &ids, &[0.9, 0.1], 90);
    let t1 = tier_snapshot(entity, version, &ids, &[0.1, 0.9], 0);

    let report = DriftAnalyzer::default().compare(&t0, &t1, None).unwrap();
    let drift = &report.dimensions[0];

    println!(
        "[STATE] magnitude={:.4}, normalized={:.4}, severity={}, velocity={:.5}/day",
        drift.magnitude, drift.normalized, drift.severity, drift.velocity_per_day
    );

    // Per-segment delta is 0.8 each way: magnitude 0.8 * sqrt(2), which
    // normalizes (by sqrt(2)) to 0.8.
    assert!((drift.normalized - 0.8).abs() < 1e-3);
    assert_eq!(drift.severity, DriftSeverity::Major);

    // 0.8 / 90 ~ 0.0089/day: above the 0.005 high bar, below 0.01 urgent.
    assert!(drift.velocity_per_day < 0.01);
    assert!(drift.velocity_per_day > 0.005);
    assert_eq!(drift.urgency, DriftUrgency::High);

    println!("[PASS] test_fsv_ninety_day_tier_shift");
}

// =============================================================================
// STORE-BACKED JOURNEYS
// =============================================================================

#[tokio::test]
async fn test_fsv_quiet_history_reads_stable_from_store() {
    println!("[FSV] ten quiet snapshots through the store classify stable");

    let store = InMemorySnapshotStore::new();
    let entity = Uuid::new_v4();
    let version = Uuid::new_v4();
    let ids = [Uuid::new_v4(), Uuid::new_v4()];

    for i in 0..10 {
        let wobble = (i % 2) as f32 * 0.02;
        let snapshot = tier_snapshot(
            entity,
            version,
            &ids,
            &[0.75 + wobble, 0.25 - wobble],
            (10 - i) as i64,
        );
        store.append(snapshot).await.unwrap();
    }

    let history = store.history(entity, TimeRange::all()).await.unwrap();
    assert_eq!(history.len(), 10);

    let journey = JourneyCharacterizer::default()
        .characterize(&history, None)
        .unwrap();

    println!(
        "[STATE] type={}, stability={:.3}, pairs={}",
        journey.journey_type,
        journey.stability_score,
        journey.drift_records.len()
    );
    assert_eq!(journey.journey_type, JourneyType::Stable);
    assert!(journey.stability_score > 0.8);
    assert_eq!(journey.drift_records.len(), 9);

    println!("[PASS] test_fsv_quiet_history_reads_stable_from_store");
}

#[tokio::test]
async fn test_fsv_four_dimension_upheaval_is_exploratory() {
    println!("[FSV] major drift on four distinct dimensions classifies exploratory");

    let store = InMemorySnapshotStore::new();
    let entity = Uuid::new_v4();
    let names = ["engagement", "spend", "channel", "timing"];
    let versions: Vec<Uuid> = names.iter().map(|_| Uuid::new_v4()).collect();
    let segment_ids: Vec<[SegmentId; 2]> =
        names.iter().map(|_| [Uuid::new_v4(), Uuid::new_v4()]).collect();

    for step in 0..4usize {
        let weights: &[f32] = if step % 2 == 0 { &[1.0, 0.0] } else { &[0.0, 1.0] };
        let mut memberships = BTreeMap::new();
        for (d, name) in names.iter().enumerate() {
            memberships.insert(
                name.to_string(),
                DimensionMembership {
                    version: versions[d],
                    vector: MembershipVector::from_parts(&segment_ids[d], weights).unwrap(),
                },
            );
        }
        let captured_at = Utc::now() - Duration::days((4 - step) as i64);
        store
            .append(Snapshot {
                id: Uuid::new_v4(),
                entity_id: entity,
                dna: BehavioralDna {
                    entity_id: entity,
                    memberships,
                    confidence: 0.9,
                    observation_count: 120,
                    cold_start: false,
                    computed_at: captured_at,
                },
                captured_at,
                retention: RetentionClass::Daily,
            })
            .await
            .unwrap();
    }

    let history = store.history(entity, TimeRange::all()).await.unwrap();
    let journey = JourneyCharacterizer::default()
        .characterize(&history, None)
        .unwrap();

    println!(
        "[STATE] type={}, dominant={:?}",
        journey.journey_type, journey.dominant_dimensions
    );
    assert_eq!(journey.journey_type, JourneyType::Exploratory);
    assert!(!journey.dominant_dimensions.is_empty());

    println!("[PASS] test_fsv_four_dimension_upheaval_is_exploratory");
}

// =============================================================================
// WINDOWED QUERIES
// =============================================================================

#[tokio::test]
async fn test_fsv_time_window_restricts_journey() {
    let store = InMemorySnapshotStore::new();
    let entity = Uuid::new_v4();
    let version = Uuid::new_v4();
    let ids = [Uuid::new_v4(), Uuid::new_v4()];

    for days_ago in [50, 40, 5, 2] {
        store
            .append(tier_snapshot(entity, version, &ids, &[0.6, 0.4], days_ago))
            .await
            .unwrap();
    }

    let recent = TimeRange {
        start: Some(Utc::now() - Duration::days(10)),
        end: None,
    };
    let history = store.history(entity, recent).await.unwrap();
    assert_eq!(history.len(), 2, "window keeps only the recent captures");

    let journey = JourneyCharacterizer::default()
        .characterize(&history, None)
        .unwrap();
    assert_eq!(journey.drift_records.len(), 1);
    println!("[PASS] test_fsv_time_window_restricts_journey");
}
