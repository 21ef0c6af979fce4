//! Behaviour tests for field reconciliation and scoring
//!
//! These tests pin down the merge rules per field and the status and
//! confidence that follow from the merged field counts.

use crossquote_core::reconcile::{reconcile, reconcile_number, relative_difference};
use crossquote_core::scoring::{confidence, score};
use crossquote_core::{
    BasicInfo, ComprehensiveQuote, FieldTag, PriceData, ScoringPolicy, ToleranceBands,
    ValidationStatus, ValuationData,
};

const EPSILON: f64 = 1e-9;

fn with_price(current_price: Option<f64>) -> ComprehensiveQuote {
    ComprehensiveQuote {
        price_data: PriceData {
            current_price,
            ..PriceData::default()
        },
        ..ComprehensiveQuote::default()
    }
}

fn price_tolerance() -> ToleranceBands {
    ToleranceBands {
        price: 0.005,
        ..ToleranceBands::default()
    }
}

// =============================================================================
// Numeric fields
// =============================================================================

#[test]
fn when_difference_is_within_tolerance_the_mean_is_kept() {
    let pairs = [(100.0, 100.3), (250.0, 249.0), (-4.0, -4.01), (0.0, 0.0), (1e9, 1.004e9)];

    for (a, b) in pairs {
        assert!(relative_difference(a, b) <= 0.005, "({a}, {b}) within band");

        let (merged, tag) = reconcile_number(Some(a), Some(b), 0.005);

        assert_eq!(tag, FieldTag::Matched, "({a}, {b})");
        let merged = merged.expect("merged value");
        assert!((merged - (a + b) / 2.0).abs() < EPSILON * a.abs().max(1.0));
    }
}

#[test]
fn when_difference_exceeds_tolerance_the_primary_wins() {
    let pairs = [(100.0, 110.0), (5.0, 0.0), (0.0, 3.0), (-10.0, 10.0)];

    for (a, b) in pairs {
        let (merged, tag) = reconcile_number(Some(a), Some(b), 0.005);

        assert_eq!(tag, FieldTag::Conflicting, "({a}, {b})");
        assert_eq!(merged, Some(a));
    }
}

#[test]
fn one_sided_values_are_supplemented_and_absent_pairs_are_empty() {
    assert_eq!(reconcile_number(Some(7.5), None, 0.01), (Some(7.5), FieldTag::Supplemented));
    assert_eq!(reconcile_number(None, Some(7.5), 0.01), (Some(7.5), FieldTag::Supplemented));
    assert_eq!(reconcile_number(None, None, 0.01), (None, FieldTag::Empty));
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn scenario_close_prices_match() {
    // Given: 100 vs 100.3 under a 0.5% price band
    let primary = with_price(Some(100.0));
    let secondary = with_price(Some(100.3));

    // When
    let result = reconcile(Some(&primary), Some(&secondary), &price_tolerance());

    // Then
    assert_eq!(result.tag_of("priceData.currentPrice"), FieldTag::Matched);
    let merged = result.merged.price_data.current_price.expect("merged price");
    assert!((merged - 100.15).abs() < EPSILON);
}

#[test]
fn scenario_distant_prices_conflict() {
    let primary = with_price(Some(100.0));
    let secondary = with_price(Some(110.0));

    let result = reconcile(Some(&primary), Some(&secondary), &price_tolerance());

    assert_eq!(result.tag_of("priceData.currentPrice"), FieldTag::Conflicting);
    assert_eq!(result.merged.price_data.current_price, Some(100.0));
}

#[test]
fn scenario_missing_ratio_is_supplemented() {
    let primary = ComprehensiveQuote::default();
    let secondary = ComprehensiveQuote {
        valuation_data: ValuationData {
            per: Some(15.2),
            ..ValuationData::default()
        },
        ..ComprehensiveQuote::default()
    };

    let result = reconcile(Some(&primary), Some(&secondary), &ToleranceBands::default());

    assert_eq!(result.tag_of("valuationData.per"), FieldTag::Supplemented);
    assert_eq!(result.merged.valuation_data.per, Some(15.2));
    assert_eq!(result.supplemented_fields, vec!["valuationData.per"]);
}

// =============================================================================
// Text fields
// =============================================================================

#[test]
fn identical_names_count_as_supplemented_not_matched() {
    let record = ComprehensiveQuote {
        basic_info: BasicInfo {
            name: Some(String::from("Samsung Electronics")),
            ..BasicInfo::default()
        },
        ..ComprehensiveQuote::default()
    };

    let result = reconcile(Some(&record), Some(&record), &ToleranceBands::default());

    assert_eq!(result.tag_of("basicInfo.name"), FieldTag::Supplemented);
    assert_eq!(result.matched(), 0);
}

#[test]
fn blank_primary_text_falls_through_to_secondary() {
    let primary = ComprehensiveQuote {
        basic_info: BasicInfo {
            exchange: Some(String::from("  ")),
            ..BasicInfo::default()
        },
        ..ComprehensiveQuote::default()
    };
    let secondary = ComprehensiveQuote {
        basic_info: BasicInfo {
            exchange: Some(String::from("NASDAQ")),
            ..BasicInfo::default()
        },
        ..ComprehensiveQuote::default()
    };

    let result = reconcile(Some(&primary), Some(&secondary), &ToleranceBands::default());

    assert_eq!(result.merged.basic_info.exchange.as_deref(), Some("NASDAQ"));
}

// =============================================================================
// Status and confidence
// =============================================================================

#[test]
fn all_absent_records_are_empty_with_zero_confidence() {
    let result = reconcile(None, None, &ToleranceBands::default());

    let validation = score(&result, &ScoringPolicy::default());

    assert_eq!(validation.status, ValidationStatus::Empty);
    assert_eq!(validation.confidence, 0.0);
    assert!(validation.matched_fields.is_empty());
    assert!(validation.conflicting_fields.is_empty());
    assert!(validation.supplemented_fields.is_empty());
}

#[test]
fn a_single_responding_source_is_single() {
    let record = with_price(Some(42.0));

    let validation = score(
        &reconcile(Some(&record), None, &ToleranceBands::default()),
        &ScoringPolicy::default(),
    );

    assert_eq!(validation.status, ValidationStatus::Single);
    assert_eq!(validation.supplemented_fields, vec!["priceData.currentPrice"]);
    // 0.65 * 0.7
    assert_eq!(validation.confidence, 0.46);
}

#[test]
fn confidence_is_ordered_by_status_for_equal_counts() {
    let policy = ScoringPolicy::default();

    for (matched, conflicting) in [(1, 1), (4, 2), (10, 3)] {
        let at = |status| confidence(status, matched, conflicting, &policy);

        assert!(at(ValidationStatus::Match) > at(ValidationStatus::Partial));
        assert!(at(ValidationStatus::Partial) > at(ValidationStatus::Conflict));
        assert!(at(ValidationStatus::Partial) > at(ValidationStatus::Single));
        assert!(at(ValidationStatus::Conflict) > at(ValidationStatus::Empty));
        assert!(at(ValidationStatus::Single) > at(ValidationStatus::Empty));
    }
}

#[test]
fn mixed_agreement_is_partial() {
    let primary = ComprehensiveQuote {
        price_data: PriceData {
            current_price: Some(100.0),
            open: Some(99.0),
            ..PriceData::default()
        },
        ..ComprehensiveQuote::default()
    };
    let secondary = ComprehensiveQuote {
        price_data: PriceData {
            current_price: Some(100.1),
            open: Some(120.0),
            ..PriceData::default()
        },
        ..ComprehensiveQuote::default()
    };

    let validation = score(
        &reconcile(Some(&primary), Some(&secondary), &price_tolerance()),
        &ScoringPolicy::default(),
    );

    assert_eq!(validation.status, ValidationStatus::Partial);
    assert_eq!(validation.matched_fields, vec!["priceData.currentPrice"]);
    assert_eq!(validation.conflicting_fields, vec!["priceData.open"]);
    // 0.85 * (0.7 + 0.3 * 0.5) = 0.7225
    assert_eq!(validation.confidence, 0.72);
}
