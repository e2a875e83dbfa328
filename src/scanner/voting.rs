// SPDX-License-Identifier: GPL-3.0-only

//! Quorum voting over recent frame outcomes

use crate::config::ScannerConfig;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Voter state as seen from the outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterState {
    /// Collecting outcomes, may trigger
    Accumulating,
    /// Recently triggered, outcomes are recorded but cannot trigger
    CoolingDown,
}

/// Emitted when the quorum is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub at: Instant,
    /// Valid outcomes in the window at the moment of triggering
    pub valid_count: usize,
}

/// Sliding window of pass/fail outcomes with a post-trigger cooldown
///
/// Triggers when the newest outcome is a pass and at least `required` of
/// the last `capacity` outcomes passed. Triggering clears the window.
/// Once a cooldown ends with the quorum already met, an invalid frame still
/// does not fire; the next valid one does.
#[derive(Debug, Clone)]
pub struct TemporalVoter {
    window: VecDeque<bool>,
    capacity: usize,
    required: usize,
    cooldown: Duration,
    last_trigger: Option<Instant>,
}

impl TemporalVoter {
    pub fn new(capacity: usize, required: usize, cooldown: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            required: required.clamp(1, capacity),
            cooldown,
            last_trigger: None,
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(config.window_size, config.required_valid, config.cooldown())
    }

    /// Push one outcome, returning a trigger when the quorum is reached
    pub fn record(&mut self, valid: bool, now: Instant) -> Option<Trigger> {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(valid);

        let valid_count = self.valid_count();
        if !valid || valid_count < self.required || self.is_cooling_down(now) {
            return None;
        }

        debug!(valid_count, window = self.window.len(), "Quorum reached");
        self.window.clear();
        self.last_trigger = Some(now);
        Some(Trigger {
            at: now,
            valid_count,
        })
    }

    pub fn state(&self, now: Instant) -> VoterState {
        if self.is_cooling_down(now) {
            VoterState::CoolingDown
        } else {
            VoterState::Accumulating
        }
    }

    fn is_cooling_down(&self, now: Instant) -> bool {
        self.last_trigger
            .map(|at| now.saturating_duration_since(at) < self.cooldown)
            .unwrap_or(false)
    }

    pub fn valid_count(&self) -> usize {
        self.window.iter().filter(|v| **v).count()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }

    /// Forget all outcomes and the cooldown
    pub fn reset(&mut self) {
        self.window.clear();
        self.last_trigger = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter() -> TemporalVoter {
        TemporalVoter::from_config(&ScannerConfig::default())
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut voter = voter();
        let start = Instant::now();
        for i in 0..100 {
            voter.record(i % 3 == 0, start + Duration::from_millis(i));
            assert!(voter.len() <= voter.capacity());
        }
    }

    #[test]
    fn test_five_valid_trigger_once_and_clear() {
        let mut voter = voter();
        let start = Instant::now();
        let mut triggers = 0;
        for i in 0..5 {
            if voter
                .record(true, start + Duration::from_millis(33 * i))
                .is_some()
            {
                triggers += 1;
            }
        }
        assert_eq!(triggers, 1);
        assert!(voter.is_empty());
    }

    #[test]
    fn test_quorum_tolerates_dropped_frames() {
        let mut voter = voter();
        let now = Instant::now();
        let pattern = [true, false, true, true, false, true];
        let fired: Vec<bool> = pattern
            .iter()
            .map(|v| voter.record(*v, now).is_some())
            .collect();
        assert_eq!(fired, vec![false, false, false, false, false, false]);
        assert!(voter.record(true, now).is_some());
    }

    #[test]
    fn test_invalid_outcome_never_triggers() {
        let mut voter = TemporalVoter::new(10, 5, Duration::ZERO);
        let now = Instant::now();
        for _ in 0..4 {
            assert!(voter.record(true, now).is_none());
        }
        assert!(voter.record(false, now).is_none());
        assert_eq!(voter.valid_count(), 4);
    }

    #[test]
    fn test_cooldown_spacing() {
        let cooldown = Duration::from_millis(2000);
        let mut voter = TemporalVoter::new(10, 5, cooldown);
        let start = Instant::now();
        let mut triggers = Vec::new();
        // Every frame valid, 30 fps for 7 seconds
        for i in 0..210u64 {
            let now = start + Duration::from_millis(i * 33);
            if let Some(trigger) = voter.record(true, now) {
                triggers.push(trigger.at);
            }
        }
        assert!(triggers.len() >= 3);
        for pair in triggers.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= cooldown);
        }
    }

    #[test]
    fn test_outcomes_recorded_during_cooldown() {
        let mut voter = TemporalVoter::new(10, 2, Duration::from_secs(2));
        let start = Instant::now();
        voter.record(true, start);
        assert!(voter.record(true, start).is_some());

        let later = start + Duration::from_millis(500);
        assert_eq!(voter.state(later), VoterState::CoolingDown);
        assert!(voter.record(true, later).is_none());
        assert!(voter.record(true, later).is_none());
        assert_eq!(voter.valid_count(), 2);

        // Quorum already met, so the first valid frame after cooldown fires
        let after = start + Duration::from_secs(3);
        assert_eq!(voter.state(after), VoterState::Accumulating);
        assert!(voter.record(true, after).is_some());
    }

    #[test]
    fn test_invalid_frame_after_cooldown_waits_for_valid() {
        let mut voter = TemporalVoter::new(10, 2, Duration::from_secs(2));
        let start = Instant::now();
        voter.record(true, start);
        assert!(voter.record(true, start).is_some());

        let later = start + Duration::from_millis(500);
        voter.record(true, later);
        voter.record(true, later);

        let after = start + Duration::from_secs(3);
        assert!(voter.record(false, after).is_none());
        assert_eq!(voter.valid_count(), 2);
        assert!(voter.record(true, after).is_some());
    }
}
