//! Property tests for chunk planning and the two-observation phase rule.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use sectorcycle_core::analysis::{classify, phase_for_pair};
use sectorcycle_core::data::plan_chunks;
use sectorcycle_core::domain::{MacroObservation, Phase, TimeSeries};

// ── Strategies ───────────────────────────────────────────────────────

fn arb_start() -> impl Strategy<Value = NaiveDate> {
    (0i64..10_000).prop_map(|offset| {
        NaiveDate::from_ymd_opt(1995, 1, 1).unwrap() + Duration::days(offset)
    })
}

fn arb_growth() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![Just(None), (-5.0..5.0_f64).prop_map(Some)]
}

// ── Chunk plans ──────────────────────────────────────────────────────

proptest! {
    /// Chunks are contiguous, non-overlapping, bounded, and cover the span exactly.
    #[test]
    fn chunks_tile_the_span(
        start in arb_start(),
        span_days in 0i64..9_000,
        max_chunk_days in 1u32..3_000,
    ) {
        let end = start + Duration::days(span_days);
        let plan = plan_chunks(start, end, max_chunk_days).unwrap();
        let chunks = plan.chunks();

        prop_assert!(!chunks.is_empty());
        prop_assert_eq!(chunks[0].start, start);
        prop_assert_eq!(chunks[chunks.len() - 1].end, end);

        for chunk in chunks {
            prop_assert!(chunk.start <= chunk.end);
            prop_assert!(chunk.days() <= i64::from(max_chunk_days));
        }
        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[0].end + Duration::days(1), pair[1].start);
        }

        let covered: i64 = chunks.iter().map(|c| c.days()).sum();
        prop_assert_eq!(covered, span_days + 1);
    }

    /// Only the final chunk may be shorter than the maximum.
    #[test]
    fn only_last_chunk_is_short(
        start in arb_start(),
        span_days in 0i64..9_000,
        max_chunk_days in 1u32..3_000,
    ) {
        let end = start + Duration::days(span_days);
        let plan = plan_chunks(start, end, max_chunk_days).unwrap();
        let chunks = plan.chunks();
        for chunk in &chunks[..chunks.len() - 1] {
            prop_assert_eq!(chunk.days(), i64::from(max_chunk_days));
        }
    }

    /// Inverted ranges never produce a plan.
    #[test]
    fn inverted_range_is_rejected(start in arb_start(), back in 1i64..1_000) {
        let end = start - Duration::days(back);
        prop_assert!(plan_chunks(start, end, 2_000).is_err());
    }
}

// ── Phase rule ───────────────────────────────────────────────────────

proptest! {
    /// Classification agrees with the pairwise rule at every index.
    #[test]
    fn classify_matches_pairwise_rule(growth in prop::collection::vec(arb_growth(), 0..40)) {
        let rows: Vec<MacroObservation> = growth
            .iter()
            .enumerate()
            .map(|(i, g)| MacroObservation {
                date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap() + Duration::days(91 * i as i64),
                level: 1.0,
                growth_rate: *g,
            })
            .collect();
        let phased = classify(&TimeSeries::from_rows(rows));

        prop_assert_eq!(phased.len(), growth.len());
        if let Some(first) = phased.first() {
            prop_assert_eq!(first.phase, Phase::Expansion);
        }
        for i in 1..phased.len() {
            prop_assert_eq!(phased[i].phase, phase_for_pair(growth[i - 1], growth[i]));
        }
    }
}
