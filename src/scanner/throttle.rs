// SPDX-License-Identifier: GPL-3.0-only

//! Sampling cadence: minimum frame interval plus 1-of-N frame skipping

use crate::config::ScannerConfig;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    skip_factor: u32,
    last_sample: Option<Instant>,
    sampled: u64,
}

impl FrameThrottle {
    pub fn new(min_interval: Duration, skip_factor: u32) -> Self {
        Self {
            min_interval,
            skip_factor: skip_factor.max(1),
            last_sample: None,
            sampled: 0,
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(config.frame_interval(), config.skip_factor)
    }

    /// Whether the frame arriving at `now` should be processed
    ///
    /// Frames closer than the minimum interval to the previous sample are
    /// not sampled at all. Of the sampled frames, the first and then every
    /// `skip_factor`-th one is processed.
    pub fn should_process(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_sample
            && now.saturating_duration_since(last) < self.min_interval
        {
            return false;
        }
        self.last_sample = Some(now);

        let process = self.sampled % u64::from(self.skip_factor) == 0;
        self.sampled += 1;
        process
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_factor() {
        let mut throttle = FrameThrottle::new(Duration::ZERO, 4);
        let now = Instant::now();
        let processed: Vec<bool> = (0..8).map(|_| throttle.should_process(now)).collect();
        assert_eq!(
            processed,
            vec![true, false, false, false, true, false, false, false]
        );
    }

    #[test]
    fn test_min_interval() {
        let mut throttle = FrameThrottle::new(Duration::from_millis(33), 1);
        let start = Instant::now();
        assert!(throttle.should_process(start));
        assert!(!throttle.should_process(start + Duration::from_millis(10)));
        assert!(throttle.should_process(start + Duration::from_millis(40)));
    }

    #[test]
    fn test_rate_bounded_under_flood() {
        // 1000 fps input, 30 fps cap, 1 in 4
        let mut throttle = FrameThrottle::new(Duration::from_millis(33), 4);
        let start = Instant::now();
        let processed = (0..1000u64)
            .filter(|i| throttle.should_process(start + Duration::from_millis(*i)))
            .count();
        assert!(processed <= 8, "processed {}", processed);
    }
}
