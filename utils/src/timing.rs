// Helpers to handle budgeting subsystems based on time
//
// Austin Shafer - 2020
use std::time::{SystemTime, UNIX_EPOCH};

// Helper to get the current time in milliseconds
pub fn get_current_millis() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

// Manages subsystem timings
//
// The motivation for this is frame pacing: a frame loop wants to
// run once every period ms. This struct keeps track of how much
// time is remaining before an action needs to be called, and callers
// can use this number for their sleep values.
//
// This isn't a timing subsystem, but rather a helper
// for tracking timing information.
pub struct TimingManager {
    // length of time we are counting down from
    tm_period: u32,
    // the last time we reset this manager
    tm_start: u32,
}

impl TimingManager {
    // create a new manager to track time
    // periods of length `period`
    pub fn new(period: u32) -> TimingManager {
        TimingManager {
            tm_period: period,
            tm_start: get_current_millis(),
        }
    }

    // Reset the manager to the current time
    pub fn reset(&mut self) {
        self.tm_start = get_current_millis();
    }

    // Returns true if period ms have passed
    // since this manager was reset
    pub fn is_overdue(&self) -> bool {
        self.elapsed() >= self.tm_period
    }

    // Returns the number of ms remaining in this
    // tracker
    //
    // If 0 is returned, it is overdue and we
    // should reset it.
    pub fn time_remaining(&self) -> u32 {
        self.tm_period.saturating_sub(self.elapsed())
    }

    fn elapsed(&self) -> u32 {
        get_current_millis().wrapping_sub(self.tm_start)
    }
}
