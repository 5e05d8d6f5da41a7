// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the SMA of the first `period`
//          gains / losses.
// Step 3 — Apply Wilder's exponential smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Thresholds: RSI > 70 => OVERBOUGHT, RSI < 30 => OVERSOLD.
// =============================================================================

/// Compute the full RSI series for the given `closes` and `period`.
///
/// `period == 0` or fewer than `period + 1` closes yields an empty vec.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (sum_gain, sum_loss) = deltas[..period].iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
        if d > 0.0 {
            (g + d, l)
        } else {
            (g, l + d.abs())
        }
    });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    let first_rsi = match rsi_from_averages(avg_gain, avg_loss) {
        Some(v) => v,
        None => return Vec::new(),
    };

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    result.push(first_rsi);

    for &delta in &deltas[period..] {
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { delta.abs() } else { 0.0 };

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match rsi_from_averages(avg_gain, avg_loss) {
            Some(rsi) => result.push(rsi),
            None => break,
        }
    }

    result
}

/// Most recent RSI value together with a human-readable label.
pub fn current_rsi(closes: &[f64], period: usize) -> Option<(f64, &'static str)> {
    let series = calculate_rsi(closes, period);
    let value = *series.last()?;

    let label = if value >= 70.0 {
        "OVERBOUGHT"
    } else if value <= 30.0 {
        "OVERSOLD"
    } else {
        "NEUTRAL"
    };

    Some((value, label))
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_empty_input() {
        assert!(calculate_rsi(&[], 14).is_empty());
    }

    #[test]
    fn rsi_period_zero() {
        assert!(calculate_rsi(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn rsi_insufficient_data() {
        assert!(calculate_rsi(&(1..=14).map(|x| x as f64).collect::<Vec<_>>(), 14).is_empty());
    }

    #[test]
    fn rsi_all_gains() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let series = calculate_rsi(&closes, 14);
        assert!(!series.is_empty());
        for &v in &series {
            assert!((v - 100.0).abs() < 1e-10);
        }
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let series = calculate_rsi(&closes, 14);
        for &v in &series {
            assert!(v.abs() < 1e-10);
        }
    }

    #[test]
    fn rsi_flat_market() {
        let closes = vec![100.0; 30];
        let series = calculate_rsi(&closes, 14);
        for &v in &series {
            assert!((v - 50.0).abs() < 1e-10);
        }
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let series = calculate_rsi(&closes, 14);
        for &v in &series {
            assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn current_rsi_overbought() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let (val, label) = current_rsi(&closes, 14).unwrap();
        assert!((val - 100.0).abs() < 1e-10);
        assert_eq!(label, "OVERBOUGHT");
    }

    #[test]
    fn current_rsi_oversold() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let (val, label) = current_rsi(&closes, 14).unwrap();
        assert!(val.abs() < 1e-10);
        assert_eq!(label, "OVERSOLD");
    }

    #[test]
    fn current_rsi_none_on_bad_input() {
        assert!(current_rsi(&[], 14).is_none());
    }
}
