// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The first EMA value is seeded with the SMA of the first `period` closes.
// =============================================================================

/// Compute the EMA series for `closes` over `period`.
///
/// `period == 0` or `closes.len() < period` yields an empty vec.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let sma: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(sma);

    let mut prev_ema = sma;
    for &close in &closes[period..] {
        let ema = close * multiplier + prev_ema * (1.0 - multiplier);
        if !ema.is_finite() {
            break;
        }
        result.push(ema);
        prev_ema = ema;
    }

    result
}

/// EMA-9 / EMA-21 / EMA-55 stack alignment: `Some((is_bullish, strength))`.
pub fn ema_trend_aligned(closes: &[f64]) -> Option<(bool, f64)> {
    if closes.len() < 55 {
        return None;
    }

    let ema9 = calculate_ema(closes, 9);
    let ema21 = calculate_ema(closes, 21);
    let ema55 = calculate_ema(closes, 55);

    let e9 = *ema9.last()?;
    let e21 = *ema21.last()?;
    let e55 = *ema55.last()?;

    let bullish = e9 > e21 && e21 > e55;
    let bearish = e9 < e21 && e21 < e55;

    if !bullish && !bearish {
        return None;
    }
    if e55 == 0.0 {
        return None;
    }

    let strength = (e9 - e55).abs() / e55;
    if !strength.is_finite() {
        return None;
    }

    Some((bullish, strength))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ascending(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_period_zero() {
        assert!(calculate_ema(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn ema_insufficient_data() {
        assert!(calculate_ema(&[1.0, 2.0], 5).is_empty());
    }

    #[test]
    fn ema_period_equals_length() {
        let ema = calculate_ema(&[2.0, 4.0, 6.0], 3);
        assert_eq!(ema.len(), 1);
        assert!((ema[0] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn ema_known_values() {
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ema = calculate_ema(&closes, 5);
        assert_eq!(ema.len(), 6);

        let mult = 2.0 / 6.0;
        let mut expected = 3.0;
        let mut expected_vec = vec![expected];
        for &c in &closes[5..] {
            expected = c * mult + expected * (1.0 - mult);
            expected_vec.push(expected);
        }
        for (a, b) in ema.iter().zip(expected_vec.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn ema_handles_nan_in_input() {
        let closes = vec![1.0, 2.0, 3.0, f64::NAN, 5.0];
        let ema = calculate_ema(&closes, 3);
        assert_eq!(ema.len(), 1);
    }

    #[test]
    fn trend_aligned_insufficient_data() {
        assert!(ema_trend_aligned(&ascending(50)).is_none());
    }

    #[test]
    fn trend_aligned_bullish_ascending() {
        let (is_bullish, strength) = ema_trend_aligned(&ascending(200)).unwrap();
        assert!(is_bullish);
        assert!(strength > 0.0 && strength.is_finite());
    }

    #[test]
    fn trend_aligned_bearish_descending() {
        let closes: Vec<f64> = (1..=200).rev().map(|x| x as f64).collect();
        let (is_bullish, _) = ema_trend_aligned(&closes).unwrap();
        assert!(!is_bullish);
    }

    #[test]
    fn trend_aligned_flat_returns_none() {
        assert!(ema_trend_aligned(&vec![100.0; 200]).is_none());
    }
}
