// =============================================================================
// Rate-Limit Tracker — monitors venue API usage to avoid 429s
// =============================================================================
//
// Carried from the teacher's `binance/rate_limit.rs`: reads the venue's
// used-weight header after every request and keeps an atomic counter any
// task may query lock-free. The teacher's order-placement counters
// (`X-MBX-ORDER-COUNT-*`) were dropped here — this system only ever issues
// read-only REST calls (klines, quotes, exchange info, account snapshots),
// never places orders, so there is no per-order budget to track.
// =============================================================================

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tracing::warn;

const WEIGHT_HARD_LIMIT: u32 = 1000;
const WEIGHT_WARN_THRESHOLD: u32 = 800;

pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
        }
    }

    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        if let Some(w) = header_u32(headers, "X-MBX-USED-WEIGHT-1M") {
            let prev = self.used_weight_1m.swap(w, Ordering::Relaxed);
            if w >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
                warn!(used_weight = w, hard_limit = WEIGHT_HARD_LIMIT, "rate-limit weight crossed warning threshold");
            }
        }
    }

    pub fn can_send_request(&self, weight: u32) -> bool {
        let current = self.used_weight_1m.load(Ordering::Relaxed);
        let allowed = current + weight <= WEIGHT_HARD_LIMIT;
        if !allowed {
            warn!(current_weight = current, requested_weight = weight, "request blocked — would exceed rate-limit");
        }
        allowed
    }

    pub fn reset_1m_weight(&self) {
        self.used_weight_1m.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.used_weight_1m.load(Ordering::Relaxed),
        }
    }
}

fn header_u32(headers: &reqwest::header::HeaderMap, name: &str) -> Option<u32> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight_1m.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_request_that_would_exceed_hard_limit() {
        let tracker = RateLimitTracker::new();
        tracker.used_weight_1m.store(990, Ordering::Relaxed);
        assert!(!tracker.can_send_request(50));
        assert!(tracker.can_send_request(5));
    }
}
