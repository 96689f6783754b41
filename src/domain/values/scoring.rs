//! Pure scoring of structured price levels against realised daily bars.

use serde::{Deserialize, Serialize};

/// Trading days covered by the long evaluation window.
pub const EVALUATION_WINDOW_DAYS: usize = 5;

pub const TARGET_WEIGHT: f64 = 0.4;
pub const TIMING_WEIGHT: f64 = 0.3;
pub const RISK_WEIGHT: f64 = 0.3;
pub const HUMAN_BLEND: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Aggregated OHLC over a span of bars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowOhlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl WindowOhlc {
    pub fn from_bars(bars: &[Bar]) -> Option<Self> {
        let first = bars.first()?;
        let last = bars.last()?;
        Some(Self {
            open: first.open,
            high: bars.iter().map(|b| b.high).fold(f64::MIN, f64::max),
            low: bars.iter().map(|b| b.low).fold(f64::MAX, f64::min),
            close: last.close,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevels {
    pub base: f64,
    pub target: f64,
    pub support: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowOutcome {
    pub target_achieved: bool,
    /// 1-based index of the first bar whose high reached the target.
    pub target_achieved_days: Option<u32>,
    pub support_breached: bool,
    pub max_high: f64,
    pub min_low: f64,
    pub one_day: Option<WindowOhlc>,
    pub five_day: Option<WindowOhlc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
    pub target_accuracy: f64,
    pub timing: f64,
    pub risk_management: f64,
}

impl SubScores {
    pub fn automatic(&self) -> f64 {
        TARGET_WEIGHT * self.target_accuracy
            + TIMING_WEIGHT * self.timing
            + RISK_WEIGHT * self.risk_management
    }
}

/// Walks `bars` (ascending, first bar is the first trading day after the report)
/// up to the evaluation window and records target touches and support breaches.
pub fn check_window(levels: &PriceLevels, bars: &[Bar]) -> Option<WindowOutcome> {
    let window = &bars[..bars.len().min(EVALUATION_WINDOW_DAYS)];
    if window.is_empty() {
        return None;
    }

    let target_achieved_days = window
        .iter()
        .position(|b| b.high >= levels.target)
        .map(|i| i as u32 + 1);
    let support_breached = window.iter().any(|b| b.low <= levels.support);

    Some(WindowOutcome {
        target_achieved: target_achieved_days.is_some(),
        target_achieved_days,
        support_breached,
        max_high: window.iter().map(|b| b.high).fold(f64::MIN, f64::max),
        min_low: window.iter().map(|b| b.low).fold(f64::MAX, f64::min),
        one_day: WindowOhlc::from_bars(&window[..1]),
        five_day: if window.len() >= EVALUATION_WINDOW_DAYS {
            WindowOhlc::from_bars(window)
        } else {
            None
        },
    })
}

/// 100 when the target was reached, otherwise the share of the base→target
/// distance that the best high covered, clipped to [0, 100].
pub fn target_accuracy_score(levels: &PriceLevels, outcome: &WindowOutcome) -> f64 {
    if outcome.target_achieved {
        return 100.0;
    }
    let span = levels.target - levels.base;
    if span.abs() < f64::EPSILON {
        return 0.0;
    }
    ((outcome.max_high - levels.base) / span * 100.0).clamp(0.0, 100.0)
}

/// 100 for a first-day touch, decaying linearly by `100 / W` per day so that a
/// touch one day past the window would score 0. No touch scores 0.
pub fn timing_score(outcome: &WindowOutcome) -> f64 {
    let window = EVALUATION_WINDOW_DAYS as f64;
    match outcome.target_achieved_days {
        Some(d) => (100.0 * (window + 1.0 - d as f64) / window).clamp(0.0, 100.0),
        None => 0.0,
    }
}

/// 100 when support held, otherwise penalised by breach depth relative to support.
pub fn risk_management_score(levels: &PriceLevels, outcome: &WindowOutcome) -> f64 {
    if !outcome.support_breached {
        return 100.0;
    }
    if levels.support <= 0.0 {
        return 0.0;
    }
    let depth = (outcome.min_low - levels.support).abs() / levels.support * 100.0;
    (100.0 - depth).max(0.0)
}

pub fn sub_scores(levels: &PriceLevels, outcome: &WindowOutcome) -> SubScores {
    SubScores {
        target_accuracy: target_accuracy_score(levels, outcome),
        timing: timing_score(outcome),
        risk_management: risk_management_score(levels, outcome),
    }
}

/// Human score on a 0-100 scale from three 1-5 ratings.
pub fn human_score(quality: u8, usefulness: u8, overall: u8) -> f64 {
    (quality as f64 + usefulness as f64 + overall as f64) / 3.0 * 20.0
}

pub fn final_score(auto: f64, human: Option<f64>) -> f64 {
    match human {
        Some(h) => (1.0 - HUMAN_BLEND) * auto + HUMAN_BLEND * h,
        None => auto,
    }
}

/// Percent change from `t0` to `tn`, rounded to two decimals. A zero base yields 0.
pub fn price_change_pct(t0: f64, tn: f64) -> f64 {
    if t0 == 0.0 {
        return 0.0;
    }
    ((tn - t0) / t0 * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(highs: &[f64], lows: &[f64]) -> Vec<Bar> {
        highs
            .iter()
            .zip(lows)
            .map(|(&h, &l)| Bar { open: (h + l) / 2.0, high: h, low: l, close: (h + l) / 2.0 })
            .collect()
    }

    #[test]
    fn test_five_day_window() {
        let levels = PriceLevels { base: 100.0, target: 110.0, support: 95.0 };
        let b = bars(&[102.0, 108.0, 111.0, 109.0, 107.0], &[99.0, 97.0, 100.0, 98.0, 96.0]);
        let out = check_window(&levels, &b).unwrap();
        assert!(out.target_achieved);
        assert_eq!(out.target_achieved_days, Some(3));
        assert!(!out.support_breached);
        assert_eq!(out.five_day.unwrap().high, 111.0);
        assert_eq!(out.five_day.unwrap().low, 96.0);
        assert_eq!(out.one_day.unwrap().high, 102.0);

        let s = sub_scores(&levels, &out);
        assert_eq!(s.target_accuracy, 100.0);
        assert!((s.timing - 60.0).abs() < 1e-9);
        assert_eq!(s.risk_management, 100.0);
        assert!((s.automatic() - (40.0 + 18.0 + 30.0)).abs() < 1e-9);
    }

    #[test]
    fn test_partial_progress_and_breach() {
        let levels = PriceLevels { base: 100.0, target: 110.0, support: 95.0 };
        let b = bars(&[105.0, 104.0], &[96.0, 90.0]);
        let out = check_window(&levels, &b).unwrap();
        assert!(!out.target_achieved);
        assert!(out.support_breached);
        assert!(out.five_day.is_none());
        let s = sub_scores(&levels, &out);
        assert!((s.target_accuracy - 50.0).abs() < 1e-9);
        assert_eq!(s.timing, 0.0);
        // |90 - 95| / 95 * 100 = 5.263...
        assert!((s.risk_management - (100.0 - 500.0 / 95.0)).abs() < 1e-9);
    }

    #[test]
    fn test_only_first_five_bars_count() {
        let levels = PriceLevels { base: 100.0, target: 110.0, support: 95.0 };
        let b = bars(&[101.0; 6].iter().copied().chain([120.0]).collect::<Vec<_>>(), &[99.0; 7]);
        let out = check_window(&levels, &b).unwrap();
        assert!(!out.target_achieved);
    }

    #[test]
    fn test_empty_window() {
        let levels = PriceLevels { base: 100.0, target: 110.0, support: 95.0 };
        assert!(check_window(&levels, &[]).is_none());
    }

    #[test]
    fn test_human_blend() {
        assert!((human_score(5, 4, 3) - 80.0).abs() < 1e-9);
        assert!((final_score(60.0, Some(80.0)) - 70.0).abs() < 1e-9);
        assert_eq!(final_score(60.0, None), 60.0);
    }

    #[test]
    fn test_price_change_pct() {
        assert_eq!(price_change_pct(100.0, 110.0), 10.0);
        assert_eq!(price_change_pct(100.0, 95.0), -5.0);
        assert_eq!(price_change_pct(0.0, 100.0), 0.0);
        assert_eq!(price_change_pct(3.0, 4.0), 33.33);
    }
}
