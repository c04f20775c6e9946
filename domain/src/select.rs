//! Weighted selection over a redirect list's entries.
//!
//! Entries with a positive weight form a cumulative distribution scaled to
//! 100; a single draw in `[0, 100]` (two decimal places) picks the first
//! entry whose cumulative value reaches it. Entries with weight `<= 0` are
//! never picked while any positive weight exists. When no weight is positive
//! every entry is equally likely.

use crate::{Entry, RandomSource};

/// Draws are integers in `0..=DRAW_SCALE`, divided by 100 to land in `[0, 100]`.
const DRAW_SCALE: u32 = 10_000;

/// Cumulative lookup table built from a list's entries.
#[derive(Clone, Debug, PartialEq)]
pub enum Distribution {
    /// No entries at all.
    Empty,
    /// No positive weights: uniform over `n` entries.
    Uniform(usize),
    /// `(entry index, cumulative percentage)` in ascending index order.
    Cumulative(Vec<(usize, f64)>),
}

impl Distribution {
    pub fn build(entries: &[Entry]) -> Self {
        if entries.is_empty() {
            return Distribution::Empty;
        }
        let positive = || {
            entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.weight > 0.0 && e.weight.is_finite())
                .map(|(i, e)| (i, e.weight))
        };
        let largest = positive().map(|(_, w)| w).fold(0.0_f64, f64::max);
        if largest <= 0.0 {
            return Distribution::Uniform(entries.len());
        }
        // Weights near f64::MAX overflow the sum; divide by the largest first.
        let scale = if positive().map(|(_, w)| w).sum::<f64>().is_finite() {
            1.0
        } else {
            largest
        };
        let total: f64 = positive().map(|(_, w)| w / scale).sum();
        let mut running = 0.0;
        let table = positive()
            .map(|(i, w)| {
                running += (w / scale / total) * 100.0;
                (i, running)
            })
            .collect();
        Distribution::Cumulative(table)
    }

    /// Pick an entry index. `None` only for an empty distribution.
    pub fn pick(&self, rng: &dyn RandomSource) -> Option<usize> {
        match self {
            Distribution::Empty => None,
            Distribution::Uniform(n) => {
                let upper = u32::try_from(n - 1).unwrap_or(u32::MAX);
                Some(rng.draw(upper) as usize)
            }
            Distribution::Cumulative(table) => {
                let r = f64::from(rng.draw(DRAW_SCALE)) / 100.0;
                table
                    .iter()
                    .find(|(_, cumulative)| *cumulative >= r)
                    .or_else(|| table.last())
                    .map(|(i, _)| *i)
            }
        }
    }

    /// Effective percentage per entry (same length as the entries the
    /// distribution was built from).
    pub fn shares(&self, len: usize) -> Vec<f64> {
        match self {
            Distribution::Empty => vec![0.0; len],
            Distribution::Uniform(n) => vec![100.0 / *n as f64; len],
            Distribution::Cumulative(table) => {
                let mut out = vec![0.0; len];
                let mut previous = 0.0;
                for (i, cumulative) in table {
                    if let Some(slot) = out.get_mut(*i) {
                        *slot = cumulative - previous;
                    }
                    previous = *cumulative;
                }
                out
            }
        }
    }
}

/// Select one URL from `entries` with a fresh draw. `None` only when
/// `entries` is empty.
pub fn select<'a>(entries: &'a [Entry], rng: &dyn RandomSource) -> Option<&'a str> {
    let idx = Distribution::build(entries).pick(rng)?;
    entries.get(idx).map(|e| e.url.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;
    use std::collections::HashMap;

    /// Always returns the same draw, clamped to the requested bound.
    struct FixedDraw(u32);
    impl RandomSource for FixedDraw {
        fn draw(&self, upper: u32) -> u32 {
            self.0.min(upper)
        }
    }

    fn entries(pairs: &[(&str, f64)]) -> Vec<Entry> {
        pairs.iter().map(|(u, w)| Entry::new(*u, *w)).collect()
    }

    fn tally(entries: &[Entry], draws: usize, seed: u64) -> HashMap<String, usize> {
        let rng = SeededRandom::new(seed);
        let mut counts = HashMap::new();
        for _ in 0..draws {
            let url = select(entries, &rng).expect("non-empty");
            *counts.entry(url.to_string()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn empty_entries_select_nothing() {
        assert_eq!(select(&[], &FixedDraw(0)), None);
        assert_eq!(Distribution::build(&[]), Distribution::Empty);
    }

    #[test]
    fn cumulative_table_skips_non_positive_weights() {
        let e = entries(&[("a", 0.0), ("b", 25.0), ("c", -1.0), ("d", 75.0)]);
        match Distribution::build(&e) {
            Distribution::Cumulative(t) => {
                assert_eq!(t.len(), 2);
                assert_eq!(t[0], (1, 25.0));
                assert_eq!(t[1].0, 3);
                assert!((t[1].1 - 100.0).abs() < 1e-9);
            }
            other => panic!("expected cumulative table, got {:?}", other),
        }
    }

    #[test]
    fn threshold_comparison_is_inclusive() {
        let e = entries(&[("https://a.com", 70.0), ("https://b.com", 30.0)]);
        assert_eq!(select(&e, &FixedDraw(0)), Some("https://a.com"));
        assert_eq!(select(&e, &FixedDraw(7000)), Some("https://a.com"));
        assert_eq!(select(&e, &FixedDraw(7001)), Some("https://b.com"));
        assert_eq!(select(&e, &FixedDraw(10_000)), Some("https://b.com"));
    }

    #[test]
    fn rounding_overshoot_falls_back_to_last_positive_entry() {
        // 1/3 + 1/3 + 1/3 scaled to 100 may sum just below 100.0
        let table = Distribution::Cumulative(vec![(0, 33.0), (2, 99.99)]);
        assert_eq!(table.pick(&FixedDraw(10_000)), Some(2));
    }

    #[test]
    fn uniform_fallback_reaches_every_index() {
        let e = entries(&[("a", 0.0), ("b", 0.0), ("c", 0.0)]);
        let d = Distribution::build(&e);
        assert_eq!(d, Distribution::Uniform(3));
        assert_eq!(d.pick(&FixedDraw(0)), Some(0));
        assert_eq!(d.pick(&FixedDraw(2)), Some(2));
        assert_eq!(d.pick(&FixedDraw(u32::MAX)), Some(2));
    }

    #[test]
    fn shares_report_effective_percentages() {
        let e = entries(&[("a", 1.0), ("b", 0.0), ("c", 3.0)]);
        let shares = Distribution::build(&e).shares(e.len());
        assert!((shares[0] - 25.0).abs() < 1e-9);
        assert_eq!(shares[1], 0.0);
        assert!((shares[2] - 75.0).abs() < 1e-9);

        let zero = entries(&[("a", 0.0), ("b", 0.0)]);
        assert_eq!(Distribution::build(&zero).shares(2), vec![50.0, 50.0]);
    }

    #[test]
    fn seventy_thirty_split_over_ten_thousand_draws() {
        let e = entries(&[("https://a.com", 70.0), ("https://b.com", 30.0)]);
        let counts = tally(&e, 10_000, 42);
        let a = counts.get("https://a.com").copied().unwrap_or(0) as i64;
        let b = counts.get("https://b.com").copied().unwrap_or(0) as i64;
        assert_eq!(a + b, 10_000);
        assert!((a - 7_000).abs() <= 150, "a.com chosen {} times", a);
        assert!((b - 3_000).abs() <= 150, "b.com chosen {} times", b);
    }

    #[test]
    fn frequencies_converge_to_normalized_weights() {
        // weights need not sum to 100
        let e = entries(&[("a", 5.0), ("b", 2.5), ("c", 12.5)]);
        let draws = 100_000;
        let counts = tally(&e, draws, 1234);
        for (url, expected) in [("a", 0.25), ("b", 0.125), ("c", 0.625)] {
            let freq = counts.get(url).copied().unwrap_or(0) as f64 / draws as f64;
            assert!((freq - expected).abs() < 0.01, "{} freq {}", url, freq);
        }
    }

    #[test]
    fn all_zero_weights_are_uniform() {
        let e = entries(&[("https://a.com", 0.0), ("https://b.com", 0.0)]);
        let draws = 100_000;
        let counts = tally(&e, draws, 99);
        for url in ["https://a.com", "https://b.com"] {
            let freq = counts.get(url).copied().unwrap_or(0) as f64 / draws as f64;
            assert!((freq - 0.5).abs() < 0.01, "{} freq {}", url, freq);
        }
    }

    #[test]
    fn negative_and_zero_weights_are_never_selected() {
        let e = entries(&[("neg", -10.0), ("pos", 1.0), ("zero", 0.0)]);
        let counts = tally(&e, 5_000, 7);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get("pos"), Some(&5_000));
    }

    #[test]
    fn huge_weights_keep_their_split_and_exclude_zeros() {
        let e = entries(&[("big-a", 1e308), ("big-b", 1e308), ("zero", 0.0)]);
        assert_eq!(
            Distribution::build(&e),
            Distribution::Cumulative(vec![(0, 50.0), (1, 100.0)])
        );
        let counts = tally(&e, 3_000, 3);
        assert_eq!(counts.get("zero"), None);
        let a = counts.get("big-a").copied().unwrap_or(0) as i64;
        assert!((a - 1_500).abs() <= 150, "big-a chosen {} times", a);
    }

    #[test]
    fn tiny_weights_normalize_like_ordinary_ones() {
        let e = entries(&[("a", 1e-300), ("b", 3e-300)]);
        let shares = Distribution::build(&e).shares(e.len());
        assert!((shares[0] - 25.0).abs() < 1e-9, "{:?}", shares);
        assert!((shares[1] - 75.0).abs() < 1e-9, "{:?}", shares);
    }
}
