//! Index-addressed window primitives the indicator engine is built from.
//!
//! Every function takes a column of `f64` values and returns a column of the
//! same length. `NaN` marks an undefined value: windows that are not yet full,
//! windows containing an undefined input, and zero denominators all yield
//! `NaN`, never zero. Output at index `i` reads only inputs `0..=i`.

/// Simple moving average. Undefined until `window` defined values are in view.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }

    let mut sum = 0.0;
    let mut nan_count = 0usize;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            nan_count += 1;
        } else {
            sum += v;
        }

        if i >= window {
            let leaving = values[i - window];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }

        if i + 1 >= window && nan_count == 0 {
            out[i] = sum / window as f64;
        }
    }

    out
}

/// Rolling minimum over the trailing `window` values.
pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling_fold(values, window, f64::min)
}

/// Rolling maximum over the trailing `window` values.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling_fold(values, window, f64::max)
}

fn rolling_fold(values: &[f64], window: usize, f: fn(f64, f64) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }

    for i in (window - 1)..values.len() {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = slice.iter().copied().reduce(f).unwrap_or(f64::NAN);
    }

    out
}

/// Least-squares slope of the trailing `window` values against `0..window`.
pub fn rolling_slope(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window < 2 {
        return out;
    }

    let n = window as f64;
    let x_mean = (n - 1.0) / 2.0;
    let sxx: f64 = (0..window).map(|x| (x as f64 - x_mean).powi(2)).sum();

    for i in (window - 1)..values.len() {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let y_mean = slice.iter().sum::<f64>() / n;
        let sxy: f64 = slice
            .iter()
            .enumerate()
            .map(|(x, &y)| (x as f64 - x_mean) * (y - y_mean))
            .sum();
        out[i] = sxy / sxx;
    }

    out
}

/// Lag a column by `periods`, filling the head with `NaN`.
pub fn shift(values: &[f64], periods: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in periods..values.len() {
        out[i] = values[i - periods];
    }
    out
}

/// First difference; index 0 is undefined.
pub fn diff(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        out[i] = values[i] - values[i - 1];
    }
    out
}

/// Element-wise `num / den`, undefined on a zero or undefined denominator.
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 || den.is_nan() || num.is_nan() {
        f64::NAN
    } else {
        num / den
    }
}

/// Exponentially weighted mean with smoothing factor `alpha`.
///
/// With `adjust` the weights are normalised over the observed history
/// (`sum((1-alpha)^k * x) / sum((1-alpha)^k)`); without it the classic
/// recursive form `y = (1-alpha) * y + alpha * x` seeded with the first
/// observation is used. Leading undefined inputs are skipped; an undefined
/// input after the first observation decays the existing weights and repeats
/// the previous output.
pub fn ewm(values: &[f64], alpha: f64, adjust: bool) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    let decay = 1.0 - alpha;
    let new_weight = if adjust { 1.0 } else { alpha };

    let mut weighted = f64::NAN;
    let mut old_weight = 1.0;

    for (i, &cur) in values.iter().enumerate() {
        let observed = !cur.is_nan();

        if !weighted.is_nan() {
            old_weight *= decay;
            if observed {
                if weighted != cur {
                    weighted =
                        (old_weight * weighted + new_weight * cur) / (old_weight + new_weight);
                }
                if adjust {
                    old_weight += new_weight;
                } else {
                    old_weight = 1.0;
                }
            }
        } else if observed {
            weighted = cur;
            old_weight = 1.0;
        }

        out[i] = weighted;
    }

    out
}

/// EWM parameterised by span: `alpha = 2 / (span + 1)`.
pub fn ewm_span(values: &[f64], span: f64, adjust: bool) -> Vec<f64> {
    ewm(values, 2.0 / (span + 1.0), adjust)
}

/// EWM parameterised by center of mass: `alpha = 1 / (1 + com)`.
pub fn ewm_com(values: &[f64], com: f64, adjust: bool) -> Vec<f64> {
    ewm(values, 1.0 / (1.0 + com), adjust)
}

/// On-balance volume: cumulative `sign(close change) * volume`.
pub fn obv(closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len());
    let mut total = 0.0;
    for i in 0..closes.len() {
        if i > 0 {
            let change = closes[i] - closes[i - 1];
            let signed = if change > 0.0 {
                volumes[i]
            } else if change < 0.0 {
                -volumes[i]
            } else {
                0.0
            };
            if !signed.is_nan() {
                total += signed;
            }
        }
        out.push(total);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rolling_mean_warmup_and_values() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!(close(out[2], 2.0));
        assert!(close(out[3], 3.0));
        assert!(close(out[4], 4.0));
    }

    #[test]
    fn rolling_mean_nan_poisons_window() {
        let out = rolling_mean(&[1.0, f64::NAN, 3.0, 4.0, 5.0, 6.0], 2);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert!(close(out[3], 3.5));
        assert!(close(out[5], 5.5));
    }

    #[test]
    fn rolling_mean_zero_window_is_undefined() {
        let out = rolling_mean(&[1.0, 2.0], 0);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rolling_min_max() {
        let values = [5.0, 3.0, 4.0, 1.0, 2.0];
        let mins = rolling_min(&values, 3);
        let maxs = rolling_max(&values, 3);
        assert!(mins[1].is_nan());
        assert!(close(mins[2], 3.0));
        assert!(close(mins[4], 1.0));
        assert!(close(maxs[2], 5.0));
        assert!(close(maxs[3], 4.0));
        assert!(close(maxs[4], 4.0));
    }

    #[test]
    fn rolling_slope_of_line() {
        let values = [1.0, 3.0, 5.0, 7.0, 9.0];
        let out = rolling_slope(&values, 5);
        assert!(close(out[4], 2.0));
        assert!(out[3].is_nan());
    }

    #[test]
    fn shift_and_diff() {
        let values = [1.0, 4.0, 9.0];
        let s = shift(&values, 1);
        assert!(s[0].is_nan());
        assert!(close(s[1], 1.0));
        assert!(close(s[2], 4.0));

        let d = diff(&values);
        assert!(d[0].is_nan());
        assert!(close(d[1], 3.0));
        assert!(close(d[2], 5.0));
    }

    #[test]
    fn safe_div_guards_zero() {
        assert!(safe_div(1.0, 0.0).is_nan());
        assert!(safe_div(f64::NAN, 2.0).is_nan());
        assert!(close(safe_div(1.0, 4.0), 0.25));
    }

    #[test]
    fn ewm_recursive_matches_hand_calculation() {
        // alpha = 0.5, seeded with first value
        let out = ewm(&[10.0, 20.0, 30.0], 0.5, false);
        assert!(close(out[0], 10.0));
        assert!(close(out[1], 15.0));
        assert!(close(out[2], 22.5));
    }

    #[test]
    fn ewm_adjusted_matches_weighted_average() {
        // alpha = 1/3 → decay 2/3; y2 = (x2 + d*x1 + d^2*x0) / (1 + d + d^2)
        let out = ewm_com(&[10.0, 20.0, 30.0], 2.0, true);
        let d = 2.0 / 3.0;
        let y1 = (20.0 + d * 10.0) / (1.0 + d);
        let y2 = (30.0 + d * 20.0 + d * d * 10.0) / (1.0 + d + d * d);
        assert!(close(out[0], 10.0));
        assert!(close(out[1], y1));
        assert!(close(out[2], y2));
    }

    #[test]
    fn ewm_skips_leading_nan() {
        let out = ewm(&[f64::NAN, f64::NAN, 50.0, 60.0], 0.5, false);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!(close(out[2], 50.0));
        assert!(close(out[3], 55.0));
    }

    #[test]
    fn ewm_interior_nan_repeats_previous() {
        let out = ewm(&[10.0, f64::NAN, 10.0], 0.5, true);
        assert!(close(out[1], 10.0));
        assert!(close(out[2], 10.0));
    }

    #[test]
    fn ewm_span_alpha() {
        // span 3 → alpha 0.5
        let a = ewm_span(&[10.0, 20.0], 3.0, false);
        assert!(close(a[1], 15.0));
    }

    #[test]
    fn obv_accumulates_signed_volume() {
        let out = obv(&[10.0, 11.0, 10.5, 10.5], &[100.0, 200.0, 50.0, 70.0]);
        assert_eq!(out, vec![0.0, 200.0, 150.0, 150.0]);
    }
}
