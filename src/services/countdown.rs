/// Outcome of a single one-second tick evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Timer is stopped or already expired; nothing to do.
    Idle,
    Running(u64),
    Expired,
}

/// One-second countdown seeded from the server's `seconds_remaining`. The
/// session loop drives `tick()` from a periodic interval; the timer never
/// consults the wall clock itself, so a resumed session stays consistent
/// with server-side elapsed time.
#[derive(Debug, Default)]
pub struct CountdownTimer {
    remaining: u64,
    running: bool,
    expired: bool,
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, initial_seconds: u64) {
        self.remaining = initial_seconds;
        self.running = true;
        self.expired = false;
    }

    /// Idempotent; a stopped timer keeps its last value for display.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Below one minute; the session view switches the clock to red here.
    pub fn is_low(&self) -> bool {
        self.remaining < 60
    }

    /// Evaluate one tick. `Expired` is returned exactly once per `start`;
    /// the remaining value never goes below zero.
    pub fn tick(&mut self) -> TimerTick {
        if !self.running || self.expired {
            return TimerTick::Idle;
        }
        if self.remaining > 0 {
            self.remaining -= 1;
        }
        if self.remaining == 0 {
            self.expired = true;
            self.running = false;
            TimerTick::Expired
        } else {
            TimerTick::Running(self.remaining)
        }
    }
}
