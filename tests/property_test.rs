//! Property tests over randomly generated price paths.

mod common;

use common::*;
use proptest::prelude::*;
use revscan::domain::backtest::{self, BacktestConfig};
use revscan::domain::indicator::{self, WindowConfig};
use revscan::domain::signal::FilterProfile;
use revscan::domain::trade::{self, ExitPolicy, ExitReason, LifeLine};

/// Per-bar (close return, open offset, upper wick, lower wick).
fn moves(min: usize, max: usize) -> impl Strategy<Value = Vec<(f64, f64, f64, f64)>> {
    prop::collection::vec(
        (-0.09f64..0.09, -0.03f64..0.03, 0.0f64..0.04, 0.0f64..0.04),
        min..max,
    )
}

fn bars_from(start: f64, moves: &[(f64, f64, f64, f64)]) -> Vec<PriceBar> {
    let mut prev = start;
    moves
        .iter()
        .enumerate()
        .map(|(i, &(ret, gap, up, down))| {
            let open = prev * (1.0 + gap);
            let close = prev * (1.0 + ret);
            prev = close;
            make_bar(
                i,
                open,
                open.max(close) * (1.0 + up),
                open.min(close) * (1.0 - down),
                close,
                1000 + (i % 9) as i64 * 150,
            )
        })
        .collect()
}

fn within_percent_range(v: Option<f64>) -> bool {
    v.is_none_or(|x| (-1e-9..=100.0 + 1e-9).contains(&x))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn snapshots_never_look_ahead(m in moves(70, 110), cut in 59usize..70) {
        let s = series("P", bars_from(20.0, &m));
        let windows = WindowConfig::default();
        let full = indicator::compute(&s, &windows);
        let prefix = indicator::compute(&s.truncated(cut + 1), &windows);
        prop_assert_eq!(&full[cut], &prefix[cut]);
    }

    #[test]
    fn oscillators_stay_in_range(m in moves(61, 120)) {
        let s = series("P", bars_from(15.0, &m));
        for snap in indicator::compute(&s, &WindowConfig::default()) {
            prop_assert!(within_percent_range(snap.rsi), "rsi {:?}", snap.rsi);
            prop_assert!(within_percent_range(snap.k), "k {:?}", snap.k);
            prop_assert!(within_percent_range(snap.d), "d {:?}", snap.d);
        }
    }

    #[test]
    fn trades_terminate_within_horizon(
        m in moves(2, 60),
        entry_frac in 0.0f64..1.0,
        horizon in 1usize..25,
    ) {
        let s = series("P", bars_from(10.0, &m));
        let entry = ((s.len() - 1) as f64 * entry_frac) as usize;
        let policy = ExitPolicy {
            life_line: Some(LifeLine { day: 2, threshold: 0.5 }),
            ..ExitPolicy::default()
        };
        let t = trade::simulate(&s, entry, horizon, &policy).unwrap();

        prop_assert!(t.exit_index > entry);
        prop_assert!(t.exit_index - entry <= horizon);
        prop_assert!(t.exit_index < s.len());
        prop_assert!(t.return_pct >= policy.stop_loss);
        if t.exit_reason == ExitReason::StoppedOut {
            prop_assert_eq!(t.return_pct, policy.stop_loss);
        }
    }

    #[test]
    fn trailing_exit_requires_trigger(
        m in moves(10, 60),
        horizon in 1usize..30,
    ) {
        let s = series("P", bars_from(10.0, &m));
        let policy = ExitPolicy::default();
        let t = trade::simulate(&s, 0, horizon, &policy).unwrap();
        if t.exit_reason == ExitReason::TrailingStopExit {
            prop_assert!(t.peak_return >= policy.trailing_trigger);
            prop_assert!(t.return_pct >= 2.0);
        }
    }

    #[test]
    fn aggregation_ignores_universe_order(
        paths in prop::collection::vec(moves(100, 120), 2..5),
        rotate in 0usize..4,
    ) {
        let universe: Vec<PriceSeries> = paths
            .iter()
            .enumerate()
            .map(|(i, m)| series(&format!("S{i}"), bars_from(10.0 + i as f64, m)))
            .collect();
        let mut shuffled = universe.clone();
        let n = shuffled.len();
        shuffled.rotate_left(rotate % n);
        shuffled.swap(0, n - 1);

        let profile = FilterProfile::permissive("all");
        let policy = ExitPolicy::default();
        let config = BacktestConfig { workers: 3, horizons: vec![3, 5], ..BacktestConfig::default() };
        let a = backtest::run(&universe, &profile, &policy, &config).unwrap();
        let b = backtest::run(&shuffled, &profile, &policy, &config).unwrap();

        prop_assert_eq!(a.summaries, b.summaries);
        prop_assert_eq!(a.trades, b.trades);
    }
}
