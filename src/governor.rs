//! External-call throttling.
//!
//! A [`ResourceGovernor`] observes the rate of provider and index calls and
//! recommends how hard the pipeline may push. The tier table is a pure
//! function of a [`LoadSample`], making it deterministic and easy to test.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Sliding window over which calls are counted.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Observed external-call load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSample {
    /// Calls started within the rate window.
    pub calls_in_window: usize,
    /// Calls currently awaiting a response.
    pub in_flight: usize,
}

/// Load classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadTier {
    /// Little traffic; full concurrency.
    Idle,
    /// Steady traffic; reduced concurrency.
    Moderate,
    /// Heavy traffic; low concurrency, short pauses.
    Busy,
    /// At the provider's comfort limit; serial calls with back-off.
    Saturated,
}

impl std::fmt::Display for LoadTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Moderate => write!(f, "moderate"),
            Self::Busy => write!(f, "busy"),
            Self::Saturated => write!(f, "saturated"),
        }
    }
}

/// Throttle recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleDecision {
    /// Load tier the decision was derived from.
    pub tier: LoadTier,
    /// Maximum concurrent batched calls (e.g. relevance scoring).
    pub max_concurrency: usize,
    /// Pause before issuing the next non-essential call.
    pub delay: Duration,
}

/// Computes a [`ThrottleDecision`] from observed load.
///
/// In-flight calls weigh four times a completed call.
///
/// | Tier      | Weighted load | Concurrency | Delay  |
/// |-----------|---------------|-------------|--------|
/// | Idle      | <30           | 5           | 0      |
/// | Moderate  | 30–119        | 3           | 0      |
/// | Busy      | 120–299       | 2           | 250 ms |
/// | Saturated | 300+          | 1           | 1 s    |
#[must_use]
pub const fn compute_throttle(sample: &LoadSample) -> ThrottleDecision {
    let load = sample
        .calls_in_window
        .saturating_add(sample.in_flight.saturating_mul(4));

    if load < 30 {
        ThrottleDecision {
            tier: LoadTier::Idle,
            max_concurrency: 5,
            delay: Duration::ZERO,
        }
    } else if load < 120 {
        ThrottleDecision {
            tier: LoadTier::Moderate,
            max_concurrency: 3,
            delay: Duration::ZERO,
        }
    } else if load < 300 {
        ThrottleDecision {
            tier: LoadTier::Busy,
            max_concurrency: 2,
            delay: Duration::from_millis(250),
        }
    } else {
        ThrottleDecision {
            tier: LoadTier::Saturated,
            max_concurrency: 1,
            delay: Duration::from_secs(1),
        }
    }
}

/// Samples load and recommends throttling.
pub trait ResourceGovernor: Send + Sync {
    /// Records that an external call started.
    fn call_started(&self);

    /// Records that an external call finished.
    fn call_finished(&self);

    /// Current recommendation.
    fn recommend(&self) -> ThrottleDecision;
}

/// Governor counting calls in a sliding window plus in-flight calls.
#[derive(Debug)]
pub struct CallRateGovernor {
    window: Duration,
    started: Mutex<VecDeque<Instant>>,
    in_flight: AtomicUsize,
}

impl Default for CallRateGovernor {
    fn default() -> Self {
        Self::new()
    }
}

impl CallRateGovernor {
    /// Creates a governor with the standard one-minute window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(RATE_WINDOW)
    }

    /// Creates a governor with a custom window.
    #[must_use]
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            started: Mutex::new(VecDeque::new()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Current load sample, expiring calls older than the window.
    #[must_use]
    pub fn sample(&self) -> LoadSample {
        let calls_in_window = self.started.lock().map_or(0, |mut started| {
            let now = Instant::now();
            while started
                .front()
                .is_some_and(|t| now.duration_since(*t) > self.window)
            {
                started.pop_front();
            }
            started.len()
        });
        LoadSample {
            calls_in_window,
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }
}

impl ResourceGovernor for CallRateGovernor {
    fn call_started(&self) {
        if let Ok(mut started) = self.started.lock() {
            started.push_back(Instant::now());
        }
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    fn call_finished(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    fn recommend(&self) -> ThrottleDecision {
        compute_throttle(&self.sample())
    }
}

/// Marks one external call as in flight until dropped.
pub struct CallGuard<'a> {
    governor: &'a dyn ResourceGovernor,
}

impl<'a> CallGuard<'a> {
    /// Records a call start on `governor`.
    #[must_use]
    pub fn new(governor: &'a dyn ResourceGovernor) -> Self {
        governor.call_started();
        Self { governor }
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.governor.call_finished();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 0, LoadTier::Idle ; "zero")]
    #[test_case(29, 0, LoadTier::Idle ; "29 is idle")]
    #[test_case(30, 0, LoadTier::Moderate ; "30 is moderate")]
    #[test_case(119, 0, LoadTier::Moderate ; "119 is moderate")]
    #[test_case(120, 0, LoadTier::Busy ; "120 is busy")]
    #[test_case(299, 0, LoadTier::Busy ; "299 is busy")]
    #[test_case(300, 0, LoadTier::Saturated ; "300 is saturated")]
    #[test_case(26, 1, LoadTier::Moderate ; "in flight weighs four")]
    #[test_case(usize::MAX, usize::MAX, LoadTier::Saturated ; "saturating")]
    fn test_tier_boundaries(calls: usize, in_flight: usize, expected: LoadTier) {
        let decision = compute_throttle(&LoadSample {
            calls_in_window: calls,
            in_flight,
        });
        assert_eq!(decision.tier, expected);
    }

    #[test]
    fn test_tier_ordering_and_concurrency() {
        assert!(LoadTier::Idle < LoadTier::Saturated);
        let idle = compute_throttle(&LoadSample::default());
        assert_eq!(idle.max_concurrency, 5);
        assert_eq!(idle.delay, Duration::ZERO);
        let saturated = compute_throttle(&LoadSample {
            calls_in_window: 1000,
            in_flight: 0,
        });
        assert_eq!(saturated.max_concurrency, 1);
        assert_eq!(saturated.delay, Duration::from_secs(1));
    }

    #[test]
    fn test_guard_tracks_in_flight() {
        let governor = CallRateGovernor::new();
        {
            let _guard = CallGuard::new(&governor);
            assert_eq!(governor.sample().in_flight, 1);
        }
        let sample = governor.sample();
        assert_eq!(sample.in_flight, 0);
        assert_eq!(sample.calls_in_window, 1);
    }

    #[test]
    fn test_calls_expire_from_window() {
        let governor = CallRateGovernor::with_window(Duration::from_millis(10));
        governor.call_started();
        governor.call_finished();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(governor.sample().calls_in_window, 0);
    }

    #[test]
    fn test_finish_without_start_does_not_underflow() {
        let governor = CallRateGovernor::new();
        governor.call_finished();
        assert_eq!(governor.sample().in_flight, 0);
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(LoadTier::Busy.to_string(), "busy");
    }
}
