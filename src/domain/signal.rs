//! Entry signal evaluation.
//!
//! A [`FilterProfile`] enumerates thresholds per factor group; a group whose
//! thresholds are all `None`/`false` is disabled. Enabled groups are combined
//! with logical AND. Any undefined indicator an enabled group needs makes the
//! whole predicate false.
//!
//! Filter families differ only in their profile values, never in control flow.

use crate::domain::indicator::IndicatorSnapshot;
use chrono::NaiveDate;
use std::fmt;

/// Numeric band with optional bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Exclude the endpoints.
    pub strict: bool,
}

impl Band {
    pub fn closed(min: f64, max: f64) -> Self {
        Band {
            min: Some(min),
            max: Some(max),
            strict: false,
        }
    }

    pub fn open(min: f64, max: f64) -> Self {
        Band {
            min: Some(min),
            max: Some(max),
            strict: true,
        }
    }

    pub fn at_least(min: f64) -> Self {
        Band {
            min: Some(min),
            max: None,
            strict: false,
        }
    }

    pub fn at_most(max: f64) -> Self {
        Band {
            min: None,
            max: Some(max),
            strict: false,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let above = match self.min {
            Some(min) if self.strict => value > min,
            Some(min) => value >= min,
            None => true,
        };
        let below = match self.max {
            Some(max) if self.strict => value < max,
            Some(max) => value <= max,
            None => true,
        };
        above && below
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (l, r) = if self.strict { ("(", ")") } else { ("[", "]") };
        let min = self.min.map_or("-inf".to_string(), |v| v.to_string());
        let max = self.max.map_or("+inf".to_string(), |v| v.to_string());
        write!(f, "{l}{min}, {max}{r}")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiquidityFilter {
    pub max_avg_turnover: Option<f64>,
    pub min_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MomentumFilter {
    pub rsi: Option<Band>,
    pub kdj_k: Option<Band>,
    /// K crosses above D today.
    pub kdj_golden_cross: bool,
}

/// Requires DIF > DEA when present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacdFilter {
    pub min_dif: Option<f64>,
    /// Histogram must exceed yesterday's histogram times this factor.
    pub min_hist_acceleration: Option<f64>,
    pub above_dif_trend: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StabilizationFilter {
    /// Close must be at least MA5 times this ratio.
    pub stand_still_ratio: Option<f64>,
    /// MA5's one-day change must be larger than yesterday's.
    pub require_ma5_slowing: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendFilter {
    /// MA5 > MA10 > MA20.
    pub require_ma_alignment: bool,
    pub require_ma5_rising: bool,
    pub require_above_ma20: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakoutFilter {
    /// Close must exceed the prior high times this factor.
    pub margin: f64,
    pub require_up_candle: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeFilter {
    pub ratio: Option<Band>,
    pub require_increase: bool,
    pub require_obv_rising: bool,
}

/// Thresholds and enabled factor groups for one filter family.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterProfile {
    pub name: String,
    pub price: Option<Band>,
    pub liquidity: LiquidityFilter,
    pub momentum: MomentumFilter,
    pub macd: Option<MacdFilter>,
    pub bias: Option<Band>,
    pub stabilization: StabilizationFilter,
    pub trend: TrendFilter,
    pub breakout: Option<BreakoutFilter>,
    pub volume: VolumeFilter,
    /// Minimum distance from close up to MA60, in percent.
    pub min_profit_potential: Option<f64>,
    /// Reject days that already rose more than this percent.
    pub max_today_change: Option<f64>,
}

pub const BUILTIN_PROFILES: &[&str] = &[
    "oversold_reversal",
    "slope_confirmed",
    "breakout_momentum",
    "sniper_pro",
];

impl FilterProfile {
    /// A profile with every factor group disabled.
    pub fn permissive(name: &str) -> Self {
        FilterProfile {
            name: name.to_string(),
            price: None,
            liquidity: LiquidityFilter::default(),
            momentum: MomentumFilter::default(),
            macd: None,
            bias: None,
            stabilization: StabilizationFilter::default(),
            trend: TrendFilter::default(),
            breakout: None,
            volume: VolumeFilter::default(),
            min_profit_potential: None,
            max_today_change: None,
        }
    }

    /// Deeply oversold, low-turnover names that have just stood back above MA5.
    pub fn oversold_reversal() -> Self {
        FilterProfile {
            price: Some(Band::at_least(5.0)),
            liquidity: LiquidityFilter {
                max_avg_turnover: Some(2.0),
                min_amount: None,
            },
            momentum: MomentumFilter {
                rsi: Some(Band::at_most(28.0)),
                kdj_k: Some(Band::at_most(25.0)),
                kdj_golden_cross: false,
            },
            bias: Some(Band::closed(-18.0, -8.0)),
            stabilization: StabilizationFilter {
                stand_still_ratio: Some(1.005),
                require_ma5_slowing: false,
            },
            volume: VolumeFilter {
                ratio: Some(Band::closed(0.5, 1.2)),
                require_increase: true,
                require_obv_rising: false,
            },
            min_profit_potential: Some(18.0),
            max_today_change: Some(4.0),
            ..Self::permissive("oversold_reversal")
        }
    }

    /// Oversold reversal with a looser MA5 stand and a decelerating MA5 decline.
    pub fn slope_confirmed() -> Self {
        let mut profile = Self::oversold_reversal();
        profile.name = "slope_confirmed".to_string();
        profile.stabilization = StabilizationFilter {
            stand_still_ratio: Some(0.95),
            require_ma5_slowing: true,
        };
        profile
    }

    /// Trend breakout above the 40-day high with MACD and KDJ confirmation.
    pub fn breakout_momentum() -> Self {
        FilterProfile {
            momentum: MomentumFilter {
                rsi: Some(Band::open(65.0, 82.0)),
                kdj_k: None,
                kdj_golden_cross: true,
            },
            macd: Some(MacdFilter {
                min_dif: None,
                min_hist_acceleration: Some(1.1),
                above_dif_trend: false,
            }),
            trend: TrendFilter {
                require_ma_alignment: true,
                require_ma5_rising: false,
                require_above_ma20: false,
            },
            breakout: Some(BreakoutFilter {
                margin: 1.01,
                require_up_candle: true,
            }),
            volume: VolumeFilter {
                ratio: Some(Band::open(2.0, 4.5)),
                require_increase: false,
                require_obv_rising: false,
            },
            ..Self::permissive("breakout_momentum")
        }
    }

    /// Liquid mid-priced breakouts with a rising MA5, early KDJ cross and
    /// DIF above its 60-day trend.
    pub fn sniper_pro() -> Self {
        FilterProfile {
            price: Some(Band::closed(5.0, 20.0)),
            liquidity: LiquidityFilter {
                max_avg_turnover: None,
                min_amount: Some(8.0e7),
            },
            momentum: MomentumFilter {
                rsi: Some(Band::open(60.0, 80.0)),
                kdj_k: Some(Band {
                    min: None,
                    max: Some(70.0),
                    strict: true,
                }),
                kdj_golden_cross: true,
            },
            macd: Some(MacdFilter {
                min_dif: Some(-0.05),
                min_hist_acceleration: None,
                above_dif_trend: true,
            }),
            bias: Some(Band::at_most(12.0)),
            trend: TrendFilter {
                require_ma_alignment: false,
                require_ma5_rising: true,
                require_above_ma20: true,
            },
            breakout: Some(BreakoutFilter {
                margin: 1.01,
                require_up_candle: false,
            }),
            volume: VolumeFilter {
                ratio: Some(Band::open(2.0, 5.0)),
                require_increase: false,
                require_obv_rising: true,
            },
            ..Self::permissive("sniper_pro")
        }
    }

    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "oversold_reversal" => Some(Self::oversold_reversal()),
            "slope_confirmed" => Some(Self::slope_confirmed()),
            "breakout_momentum" => Some(Self::breakout_momentum()),
            "sniper_pro" => Some(Self::sniper_pro()),
            _ => None,
        }
    }
}

/// Factor groups, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Factor {
    Price,
    Liquidity,
    Momentum,
    Macd,
    Bias,
    Stabilization,
    Trend,
    Breakout,
    Volume,
    Potential,
    SameDayChange,
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Factor::Price => "price",
            Factor::Liquidity => "liquidity",
            Factor::Momentum => "momentum",
            Factor::Macd => "macd",
            Factor::Bias => "bias",
            Factor::Stabilization => "stabilization",
            Factor::Trend => "trend",
            Factor::Breakout => "breakout",
            Factor::Volume => "volume",
            Factor::Potential => "potential",
            Factor::SameDayChange => "same_day_change",
        };
        write!(f, "{name}")
    }
}

/// Outcome of evaluating one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// The factor's threshold was not met.
    Rejected(Factor),
    /// The factor needed an indicator that is undefined on this day.
    Undefined(Factor),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

type Check = Option<bool>;

fn check_price(t: &IndicatorSnapshot, p: &FilterProfile) -> Check {
    Some(p.price.is_none_or(|band| band.contains(t.close)))
}

fn check_liquidity(t: &IndicatorSnapshot, p: &FilterProfile) -> Check {
    let liq = &p.liquidity;
    if let Some(max) = liq.max_avg_turnover {
        if t.avg_turnover? > max {
            return Some(false);
        }
    }
    if let Some(min) = liq.min_amount {
        if t.amount? < min {
            return Some(false);
        }
    }
    Some(true)
}

fn check_momentum(t: &IndicatorSnapshot, y: &IndicatorSnapshot, p: &FilterProfile) -> Check {
    let m = &p.momentum;
    if let Some(band) = m.rsi {
        if !band.contains(t.rsi?) {
            return Some(false);
        }
    }
    if let Some(band) = m.kdj_k {
        if !band.contains(t.k?) {
            return Some(false);
        }
    }
    if m.kdj_golden_cross {
        let crossed = t.k? > t.d? && y.k? <= y.d?;
        if !crossed {
            return Some(false);
        }
    }
    Some(true)
}

fn check_macd(t: &IndicatorSnapshot, y: &IndicatorSnapshot, p: &FilterProfile) -> Check {
    let Some(macd) = &p.macd else {
        return Some(true);
    };
    let dif = t.dif?;
    if dif <= t.dea? {
        return Some(false);
    }
    if let Some(min) = macd.min_dif {
        if dif <= min {
            return Some(false);
        }
    }
    if let Some(factor) = macd.min_hist_acceleration {
        if t.macd_hist? <= y.macd_hist? * factor {
            return Some(false);
        }
    }
    if macd.above_dif_trend && dif <= t.dif_trend? {
        return Some(false);
    }
    Some(true)
}

fn check_bias(t: &IndicatorSnapshot, p: &FilterProfile) -> Check {
    match p.bias {
        Some(band) => Some(band.contains(t.bias20?)),
        None => Some(true),
    }
}

fn check_stabilization(t: &IndicatorSnapshot, y: &IndicatorSnapshot, p: &FilterProfile) -> Check {
    let s = &p.stabilization;
    if let Some(ratio) = s.stand_still_ratio {
        if t.close < t.ma5? * ratio {
            return Some(false);
        }
    }
    if s.require_ma5_slowing && t.ma5_delta? <= y.ma5_delta? {
        return Some(false);
    }
    Some(true)
}

fn check_trend(t: &IndicatorSnapshot, p: &FilterProfile) -> Check {
    let tr = &p.trend;
    if tr.require_ma_alignment && !(t.ma5? > t.ma10? && t.ma10? > t.ma20?) {
        return Some(false);
    }
    if tr.require_ma5_rising && t.ma5_slope? <= 0.0 {
        return Some(false);
    }
    if tr.require_above_ma20 && t.close <= t.ma20? {
        return Some(false);
    }
    Some(true)
}

fn check_breakout(t: &IndicatorSnapshot, p: &FilterProfile) -> Check {
    let Some(b) = &p.breakout else {
        return Some(true);
    };
    if t.close <= t.prior_high? * b.margin {
        return Some(false);
    }
    if b.require_up_candle && t.close <= t.open {
        return Some(false);
    }
    Some(true)
}

fn check_volume(t: &IndicatorSnapshot, y: &IndicatorSnapshot, p: &FilterProfile) -> Check {
    let v = &p.volume;
    if let Some(band) = v.ratio {
        if !band.contains(t.volume_ratio?) {
            return Some(false);
        }
    }
    if v.require_increase && t.volume <= y.volume {
        return Some(false);
    }
    if v.require_obv_rising && t.obv? <= y.obv? {
        return Some(false);
    }
    Some(true)
}

fn check_potential(t: &IndicatorSnapshot, p: &FilterProfile) -> Check {
    match p.min_profit_potential {
        Some(min) => Some(t.profit_potential? >= min),
        None => Some(true),
    }
}

fn check_change(t: &IndicatorSnapshot, p: &FilterProfile) -> Check {
    match p.max_today_change {
        Some(max) => Some(t.change_pct? <= max),
        None => Some(true),
    }
}

/// Evaluate every enabled factor group and report the first that fails.
pub fn explain(
    today: &IndicatorSnapshot,
    yesterday: &IndicatorSnapshot,
    profile: &FilterProfile,
) -> Verdict {
    let checks: [(Factor, Check); 11] = [
        (Factor::Price, check_price(today, profile)),
        (Factor::Liquidity, check_liquidity(today, profile)),
        (Factor::Momentum, check_momentum(today, yesterday, profile)),
        (Factor::Macd, check_macd(today, yesterday, profile)),
        (Factor::Bias, check_bias(today, profile)),
        (
            Factor::Stabilization,
            check_stabilization(today, yesterday, profile),
        ),
        (Factor::Trend, check_trend(today, profile)),
        (Factor::Breakout, check_breakout(today, profile)),
        (Factor::Volume, check_volume(today, yesterday, profile)),
        (Factor::Potential, check_potential(today, profile)),
        (Factor::SameDayChange, check_change(today, profile)),
    ];

    for (factor, result) in checks {
        match result {
            Some(true) => {}
            Some(false) => return Verdict::Rejected(factor),
            None => return Verdict::Undefined(factor),
        }
    }
    Verdict::Pass
}

/// True when `today` is an entry signal under `profile`.
pub fn evaluate(
    today: &IndicatorSnapshot,
    yesterday: &IndicatorSnapshot,
    profile: &FilterProfile,
) -> bool {
    explain(today, yesterday, profile).passed()
}

/// A day on which the evaluator fired, with the triggering snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySignal {
    pub code: String,
    pub index: usize,
    pub date: NaiveDate,
    pub snapshot: IndicatorSnapshot,
}

/// Evaluate every index in `range` (index 0 is never a signal).
pub fn scan_signals(
    code: &str,
    snapshots: &[IndicatorSnapshot],
    profile: &FilterProfile,
    range: std::ops::Range<usize>,
) -> Vec<EntrySignal> {
    let end = range.end.min(snapshots.len());
    let start = range.start.max(1);

    (start..end)
        .filter(|&i| evaluate(&snapshots[i], &snapshots[i - 1], profile))
        .map(|i| EntrySignal {
            code: code.to_string(),
            index: i,
            date: snapshots[i].date,
            snapshot: snapshots[i].clone(),
        })
        .collect()
}
