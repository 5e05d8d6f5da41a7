// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band = SMA, upper = SMA + k*sigma, lower = SMA - k*sigma.
// BBW = (upper - lower) / middle * 100 — the regime detector's primary
// volatility metric.
// =============================================================================

#[derive(Debug, Clone)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerResult> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let sum: f64 = window.iter().sum();
    let middle = sum / period as f64;

    if middle == 0.0 {
        return None;
    }

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;
    let width = (upper - lower) / middle * 100.0;

    if width.is_finite() {
        Some(BollingerResult { upper, middle, lower, width })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert!(bb.upper > bb.middle);
        assert!(bb.lower < bb.middle);
        assert!(bb.width > 0.0);
    }

    #[test]
    fn bollinger_insufficient_data() {
        assert!(calculate_bollinger(&[1.0, 2.0, 3.0], 20, 2.0).is_none());
    }

    #[test]
    fn bollinger_flat() {
        let bb = calculate_bollinger(&vec![100.0; 20], 20, 2.0).unwrap();
        assert!((bb.width - 0.0).abs() < 1e-10);
    }
}
