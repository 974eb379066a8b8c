//! Configuration validation.
//!
//! Validates every config section before a run. The typed readers here are
//! strict: a key that is present but does not parse is an error, never a
//! silent fallback to the default.

use crate::domain::error::RevscanError;
use crate::domain::signal::{BUILTIN_PROFILES, Band};
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;

/// Numeric `[signal]` keys that override the selected profile.
pub const SIGNAL_NUMBER_KEYS: &[&str] = &[
    "min_price",
    "max_price",
    "max_avg_turnover",
    "min_amount",
    "min_rsi",
    "max_rsi",
    "min_kdj_k",
    "max_kdj_k",
    "min_bias",
    "max_bias",
    "stand_still_ratio",
    "min_volume_ratio",
    "max_volume_ratio",
    "min_profit_potential",
    "max_today_change",
    "breakout_margin",
    "min_dif",
    "hist_acceleration",
];

/// Boolean `[signal]` keys that switch factor checks on or off.
pub const SIGNAL_BOOL_KEYS: &[&str] = &[
    "require_volume_increase",
    "require_obv_rising",
    "require_ma5_slowing",
    "require_ma_alignment",
    "require_ma5_rising",
    "require_above_ma20",
    "kdj_golden_cross",
    "above_dif_trend",
];

/// Indicator window keys in `[signal]`.
pub const SIGNAL_WINDOW_KEYS: &[&str] = &[
    "rsi_period",
    "kdj_window",
    "turnover_window",
    "volume_window",
    "breakout_window",
];

const SIGNAL_BAND_KEYS: &[(&str, &str)] = &[
    ("min_price", "max_price"),
    ("min_rsi", "max_rsi"),
    ("min_kdj_k", "max_kdj_k"),
    ("min_bias", "max_bias"),
    ("min_volume_ratio", "max_volume_ratio"),
];

fn raw(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, RevscanError> {
    raw(config, section, key)
        .map(|v| {
            v.parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .ok_or_else(|| {
                    RevscanError::config_invalid(section, key, format!("'{v}' is not a number"))
                })
        })
        .transpose()
}

pub fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<usize>, RevscanError> {
    raw(config, section, key)
        .map(|v| {
            v.parse::<usize>().map_err(|_| {
                RevscanError::config_invalid(
                    section,
                    key,
                    format!("'{v}' is not a non-negative integer"),
                )
            })
        })
        .transpose()
}

pub fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<bool>, RevscanError> {
    raw(config, section, key)
        .map(|v| match v.to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(RevscanError::config_invalid(
                section,
                key,
                format!("'{v}' is not a boolean"),
            )),
        })
        .transpose()
}

/// Comma-separated list of positive integers.
pub fn read_usize_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Vec<usize>>, RevscanError> {
    let Some(v) = raw(config, section, key) else {
        return Ok(None);
    };
    v.split(',')
        .map(|token| {
            let token = token.trim();
            token.parse::<usize>().map_err(|_| {
                RevscanError::config_invalid(section, key, format!("'{token}' is not an integer"))
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Reject a band whose lower bound exceeds its upper bound.
pub fn check_band(section: &str, key: &str, band: &Band) -> Result<(), RevscanError> {
    if let (Some(min), Some(max)) = (band.min, band.max) {
        if min > max {
            return Err(RevscanError::config_invalid(
                section,
                key,
                format!("lower bound {min} exceeds upper bound {max}"),
            ));
        }
    }
    Ok(())
}

pub fn validate_all(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    validate_signal_config(config)?;
    validate_exit_config(config)?;
    validate_backtest_config(config)?;
    Ok(())
}

pub fn validate_signal_config(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    validate_profile_name(config)?;
    for key in SIGNAL_NUMBER_KEYS {
        read_f64(config, "signal", key)?;
    }
    for key in SIGNAL_BOOL_KEYS {
        read_bool(config, "signal", key)?;
    }
    validate_windows(config)?;
    validate_signal_bands(config)?;
    Ok(())
}

pub fn validate_exit_config(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    validate_stop_loss(config)?;
    validate_trailing(config)?;
    validate_life_line(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    validate_horizons(config)?;
    validate_positive(config, "backtest", "min_history")?;
    validate_positive(config, "backtest", "lookback")?;
    validate_positive(config, "backtest", "workers")?;
    validate_entry_gap(config)?;
    validate_codes(config)?;
    Ok(())
}

fn validate_profile_name(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    match raw(config, "signal", "profile") {
        Some(name) if !BUILTIN_PROFILES.contains(&name.as_str()) => {
            Err(RevscanError::UnknownProfile { name })
        }
        _ => Ok(()),
    }
}

fn validate_windows(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    for key in SIGNAL_WINDOW_KEYS {
        validate_positive(config, "signal", key)?;
    }
    Ok(())
}

fn validate_signal_bands(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    for (min_key, max_key) in SIGNAL_BAND_KEYS {
        let min = read_f64(config, "signal", min_key)?;
        let max = read_f64(config, "signal", max_key)?;
        check_band(
            "signal",
            min_key,
            &Band {
                min,
                max,
                strict: false,
            },
        )?;
    }
    Ok(())
}

fn validate_positive(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), RevscanError> {
    if read_usize(config, section, key)? == Some(0) {
        return Err(RevscanError::config_invalid(
            section,
            key,
            format!("{key} must be at least 1"),
        ));
    }
    Ok(())
}

fn validate_stop_loss(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    if let Some(value) = read_f64(config, "exit", "stop_loss")? {
        if value >= 0.0 {
            return Err(RevscanError::config_invalid(
                "exit",
                "stop_loss",
                "stop_loss must be negative",
            ));
        }
    }
    Ok(())
}

fn validate_trailing(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    if let Some(value) = read_f64(config, "exit", "trailing_trigger")? {
        if value <= 0.0 {
            return Err(RevscanError::config_invalid(
                "exit",
                "trailing_trigger",
                "trailing_trigger must be positive",
            ));
        }
    }
    if let Some(value) = read_f64(config, "exit", "trailing_drawback")? {
        if value <= 0.0 || value > 1.0 {
            return Err(RevscanError::config_invalid(
                "exit",
                "trailing_drawback",
                "trailing_drawback must be in (0, 1]",
            ));
        }
    }
    read_f64(config, "exit", "trailing_floor")?;
    Ok(())
}

fn validate_life_line(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    let day = read_usize(config, "exit", "life_line_day")?;
    let threshold = read_f64(config, "exit", "life_line_threshold")?;
    match (day, threshold) {
        (Some(0), _) => Err(RevscanError::config_invalid(
            "exit",
            "life_line_day",
            "life_line_day must be at least 1",
        )),
        (None, Some(_)) => Err(RevscanError::ConfigMissing {
            section: "exit".to_string(),
            key: "life_line_day".to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_horizons(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    if let Some(horizons) = read_usize_list(config, "backtest", "horizons")? {
        if horizons.is_empty() || horizons.contains(&0) {
            return Err(RevscanError::config_invalid(
                "backtest",
                "horizons",
                "horizons must be positive day counts",
            ));
        }
    }
    Ok(())
}

fn validate_entry_gap(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    let min = read_f64(config, "backtest", "entry_gap_min")?;
    let max = read_f64(config, "backtest", "entry_gap_max")?;
    check_band(
        "backtest",
        "entry_gap_min",
        &Band {
            min,
            max,
            strict: false,
        },
    )
}

fn validate_codes(config: &dyn ConfigPort) -> Result<(), RevscanError> {
    if let Some(codes) = raw(config, "backtest", "codes") {
        parse_codes(&codes)
            .map_err(|e| RevscanError::config_invalid("backtest", "codes", e.to_string()))?;
    }
    Ok(())
}
