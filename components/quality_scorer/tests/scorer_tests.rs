//! Score monotonicity and save decisions

use echo_types::{HookStatus, Severity};
use pretty_assertions::assert_eq;
use quality_scorer::{QualityInputs, QualityScorer, SaveLocation, SavePolicy};

fn inputs(tick_samples: u64) -> QualityInputs {
    QualityInputs {
        tick_samples,
        session_duration_ms: 5_000,
        deep_analysis_enabled: true,
        phase_samples: 0,
        sub_timing_entries: 3,
        hook_status: HookStatus::Partial,
        watchdog_active: true,
        used_fallback_heartbeat: false,
    }
}

#[test]
fn test_more_ticks_never_lower_the_score() {
    let scorer = QualityScorer::new();
    let mut previous = 0;
    for ticks in 0..250 {
        let score = scorer.score(&inputs(ticks)).score;
        assert!(score >= previous, "score dropped at {} ticks", ticks);
        previous = score;
    }
}

#[test]
fn test_issue_list_matches_deductions() {
    let result = QualityScorer::new().score(&inputs(50));
    let ids: Vec<_> = result.issues.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["short_sample", "short_session", "no_phase_data", "hook_partial"]);
    assert_eq!(result.score, 100 - 5 - 8 - 15 - 10);
    assert_eq!(result.issues[0].severity, Severity::Info);
}

#[test]
fn test_result_serializes_for_reports() {
    let result = QualityScorer::new().score(&inputs(0));
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["issues"][0]["id"], "no_tick_data");
    assert_eq!(json["issues"][0]["severity"], "critical");
}

#[test]
fn test_policy_routes_low_scores() {
    let policy = SavePolicy::new(70);
    let low = QualityScorer::new().score(&inputs(0));
    assert_eq!(policy.save_location(low.score), SaveLocation::LowQuality);
    assert!(!policy.should_save(low.score));
}
