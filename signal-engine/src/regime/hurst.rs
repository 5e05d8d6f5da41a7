// =============================================================================
// Hurst Exponent — Rescaled Range (R/S) Analysis
// =============================================================================
//
//   H > 0.55  => trending / persistent (momentum regime)
//   H ~ 0.50  => random walk (geometric Brownian motion)
//   H < 0.45  => mean-reverting / anti-persistent
//
// For each window size n in {8, 16, 32, 64}: split into non-overlapping
// chunks, compute R/S per chunk, average across chunks. Regress log(avg R/S)
// on log(n); the OLS slope is the Hurst exponent, clamped to [0, 1].
// =============================================================================

use tracing::trace;

const MIN_CLOSES: usize = 64;
const WINDOW_SIZES: [usize; 4] = [8, 16, 32, 64];

pub fn calculate_hurst_exponent(closes: &[f64]) -> Option<f64> {
    if closes.len() < MIN_CLOSES {
        trace!(len = closes.len(), min = MIN_CLOSES, "Hurst: insufficient data");
        return None;
    }

    let mut log_n: Vec<f64> = Vec::with_capacity(WINDOW_SIZES.len());
    let mut log_rs: Vec<f64> = Vec::with_capacity(WINDOW_SIZES.len());

    for &window in &WINDOW_SIZES {
        if window > closes.len() {
            continue;
        }

        let num_chunks = closes.len() / window;
        if num_chunks == 0 {
            continue;
        }

        let mut rs_sum: f64 = 0.0;
        let mut valid_chunks: usize = 0;

        for chunk_idx in 0..num_chunks {
            let start = chunk_idx * window;
            let end = start + window;
            let chunk = &closes[start..end];

            let mean = chunk.iter().sum::<f64>() / window as f64;
            let variance = chunk.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / window as f64;
            let std_dev = variance.sqrt();

            if std_dev < f64::EPSILON {
                continue;
            }

            let mut cumulative = Vec::with_capacity(window);
            let mut running = 0.0_f64;
            for &val in chunk {
                running += val - mean;
                cumulative.push(running);
            }

            let range = cumulative.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
                - cumulative.iter().cloned().fold(f64::INFINITY, f64::min);

            rs_sum += range / std_dev;
            valid_chunks += 1;
        }

        if valid_chunks == 0 {
            continue;
        }

        let avg_rs = rs_sum / valid_chunks as f64;
        log_n.push((window as f64).ln());
        log_rs.push(avg_rs.ln());
    }

    if log_n.len() < 2 {
        trace!("Hurst: insufficient valid window sizes for regression");
        return None;
    }

    let n = log_n.len() as f64;
    let x_mean = log_n.iter().sum::<f64>() / n;
    let y_mean = log_rs.iter().sum::<f64>() / n;

    let mut numerator = 0.0_f64;
    let mut denominator = 0.0_f64;

    for i in 0..log_n.len() {
        let dx = log_n[i] - x_mean;
        let dy = log_rs[i] - y_mean;
        numerator += dx * dy;
        denominator += dx * dx;
    }

    if denominator.abs() < f64::EPSILON {
        trace!("Hurst: degenerate regression (zero variance in log_n)");
        return None;
    }

    let hurst = (numerator / denominator).clamp(0.0, 1.0);
    trace!(hurst = format!("{:.4}", hurst), points = log_n.len(), "Hurst exponent computed");

    Some(hurst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_series(len: usize) -> Vec<f64> {
        let mut v = Vec::with_capacity(len);
        let mut price = 100.0;
        for i in 0..len {
            price += 0.5 + 0.1 * (i as f64).sin().abs();
            v.push(price);
        }
        v
    }

    fn mean_reverting_series(len: usize) -> Vec<f64> {
        let mut v = Vec::with_capacity(len);
        for i in 0..len {
            let base = 100.0;
            let oscillation = if i % 2 == 0 { 5.0 } else { -5.0 };
            v.push(base + oscillation + 0.01 * (i as f64));
        }
        v
    }

    fn pseudorandom_walk(len: usize, seed: u64) -> Vec<f64> {
        let mut v = Vec::with_capacity(len);
        let mut price = 100.0;
        let mut state = seed;
        for _ in 0..len {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let r = (state as f64 / u64::MAX as f64) - 0.5;
            price += r;
            v.push(price);
        }
        v
    }

    #[test]
    fn test_insufficient_data_returns_none() {
        assert!(calculate_hurst_exponent(&vec![1.0; 63]).is_none());
    }

    #[test]
    fn test_flat_series_returns_none() {
        assert!(calculate_hurst_exponent(&vec![42.0; 128]).is_none());
    }

    #[test]
    fn test_trending_series_high_hurst() {
        let h = calculate_hurst_exponent(&trending_series(256)).unwrap();
        assert!(h > 0.50, "got {:.4}", h);
    }

    #[test]
    fn test_mean_reverting_series_low_hurst() {
        let h = calculate_hurst_exponent(&mean_reverting_series(256)).unwrap();
        assert!(h < 0.55, "got {:.4}", h);
    }

    #[test]
    fn test_hurst_clamped_to_unit_interval() {
        let h = calculate_hurst_exponent(&trending_series(128)).unwrap();
        assert!((0.0..=1.0).contains(&h));
    }

    #[test]
    fn test_random_walk_near_half() {
        let h = calculate_hurst_exponent(&pseudorandom_walk(512, 123_456_789)).unwrap();
        assert!((0.25..=0.80).contains(&h), "got {:.4}", h);
    }

    #[test]
    fn test_determinism() {
        let closes = trending_series(256);
        assert_eq!(calculate_hurst_exponent(&closes), calculate_hurst_exponent(&closes));
    }
}
