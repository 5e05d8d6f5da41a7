// =============================================================================
// Average Directional Index (ADX)
// =============================================================================
//
// ADX quantifies trend strength regardless of direction.
//
//   1. +DM / -DM per bar.
//   2. True Range per bar.
//   3. Wilder's smoothing (period) of +DM, -DM, TR.
//   4. +DI = smoothed(+DM) / smoothed(TR) * 100, -DI likewise.
//   5. DX  = |+DI - -DI| / (+DI + -DI) * 100
//   6. ADX = Wilder's smoothed average of DX over `period` bars.
//
//   ADX > 25  => trending market
//   ADX < 20  => ranging / choppy market
// =============================================================================

use crate::bar::Bar;

/// Most recent ADX value from a slice of bars (oldest first).
///
/// `None` when `period` is zero, fewer than `2 * period + 1` bars are
/// supplied, or an intermediate result is non-finite.
pub fn calculate_adx(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 {
        return None;
    }

    let min_bars = 2 * period + 1;
    if bars.len() < min_bars {
        return None;
    }

    let period_f = period as f64;
    let n = bars.len();
    let bar_count = n - 1;

    let mut plus_dm = Vec::with_capacity(bar_count);
    let mut minus_dm = Vec::with_capacity(bar_count);
    let mut tr_vals = Vec::with_capacity(bar_count);

    for i in 1..n {
        let high = bars[i].high;
        let low = bars[i].low;
        let prev_high = bars[i - 1].high;
        let prev_low = bars[i - 1].low;
        let prev_close = bars[i - 1].close;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        let up_move = high - prev_high;
        let down_move = prev_low - low;

        let pdm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let mdm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

        plus_dm.push(pdm);
        minus_dm.push(mdm);
        tr_vals.push(tr);
    }

    let mut smooth_plus_dm: f64 = plus_dm[..period].iter().sum();
    let mut smooth_minus_dm: f64 = minus_dm[..period].iter().sum();
    let mut smooth_tr: f64 = tr_vals[..period].iter().sum();

    let mut dx_values: Vec<f64> = Vec::with_capacity(bar_count - period + 1);

    if let Some(dx) = compute_dx(smooth_plus_dm, smooth_minus_dm, smooth_tr) {
        dx_values.push(dx);
    } else {
        return None;
    }

    for i in period..bar_count {
        smooth_plus_dm = smooth_plus_dm - smooth_plus_dm / period_f + plus_dm[i];
        smooth_minus_dm = smooth_minus_dm - smooth_minus_dm / period_f + minus_dm[i];
        smooth_tr = smooth_tr - smooth_tr / period_f + tr_vals[i];

        if let Some(dx) = compute_dx(smooth_plus_dm, smooth_minus_dm, smooth_tr) {
            dx_values.push(dx);
        } else {
            return None;
        }
    }

    if dx_values.len() < period {
        return None;
    }

    let adx_seed: f64 = dx_values[..period].iter().sum::<f64>() / period_f;
    if !adx_seed.is_finite() {
        return None;
    }

    let mut adx = adx_seed;
    for &dx in &dx_values[period..] {
        adx = (adx * (period_f - 1.0) + dx) / period_f;
        if !adx.is_finite() {
            return None;
        }
    }

    Some(adx)
}

fn compute_dx(smooth_plus_dm: f64, smooth_minus_dm: f64, smooth_tr: f64) -> Option<f64> {
    if smooth_tr == 0.0 {
        return None;
    }

    let plus_di = (smooth_plus_dm / smooth_tr) * 100.0;
    let minus_di = (smooth_minus_dm / smooth_tr) * 100.0;

    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return Some(0.0);
    }

    let dx = ((plus_di - minus_di).abs() / di_sum) * 100.0;

    if dx.is_finite() {
        Some(dx)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar { open_time: 0, close_time: 0, open, high, low, close, volume: 1.0, is_closed: true }
    }

    #[test]
    fn adx_period_zero() {
        let bars = vec![bar(1.0, 2.0, 0.5, 1.5); 50];
        assert!(calculate_adx(&bars, 0).is_none());
    }

    #[test]
    fn adx_insufficient_data() {
        let bars = vec![bar(1.0, 2.0, 0.5, 1.5); 10];
        assert!(calculate_adx(&bars, 14).is_none());
    }

    #[test]
    fn adx_strong_uptrend() {
        let bars: Vec<Bar> = (0..60)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                bar(base, base + 1.5, base - 0.5, base + 1.0)
            })
            .collect();

        let value = calculate_adx(&bars, 14).unwrap();
        assert!(value > 25.0, "expected ADX > 25 for strong trend, got {value}");
    }

    #[test]
    fn adx_flat_market() {
        let bars = vec![bar(100.0, 101.0, 99.0, 100.0); 60];
        let value = calculate_adx(&bars, 14).unwrap();
        assert!(value < 1.0, "expected ADX near 0 for flat market, got {value}");
    }

    #[test]
    fn adx_result_range() {
        let bars: Vec<Bar> = (0..100)
            .map(|i| {
                let base = 50.0 + (i as f64 * 0.3).sin() * 10.0;
                bar(base - 0.5, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        if let Some(value) = calculate_adx(&bars, 14) {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn adx_minimum_bars_exact() {
        let period = 5;
        let min = 2 * period + 1;
        let bars: Vec<Bar> = (0..min)
            .map(|i| {
                let base = 100.0 + i as f64;
                bar(base, base + 1.0, base - 0.5, base + 0.5)
            })
            .collect();
        assert!(calculate_adx(&bars, period).is_some());
        assert!(calculate_adx(&bars[..min - 1], period).is_none());
    }
}
