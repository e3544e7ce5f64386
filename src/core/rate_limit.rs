//! Sliding-window rate guard for transaction submissions.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window admission gate for transaction submissions.
///
/// Created once per process and handed to the dispatcher; its history is
/// lost on restart. Not shared across processes.
#[derive(Debug)]
pub struct SlidingWindowGuard {
    max: usize,
    window: Duration,
    admitted: VecDeque<Instant>,
}

impl SlidingWindowGuard {
    /// Admits at most `max` submissions in any `window`.
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            admitted: VecDeque::new(),
        }
    }

    /// Admits a submission now, recording it when admitted.
    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&mut self, now: Instant) -> bool {
        while let Some(&front) = self.admitted.front() {
            if now.saturating_duration_since(front) >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
        if self.admitted.len() < self.max {
            self.admitted.push_back(now);
            true
        } else {
            false
        }
    }

    /// Submissions currently counted against the window.
    pub fn in_window(&self) -> usize {
        self.admitted.len()
    }
}
