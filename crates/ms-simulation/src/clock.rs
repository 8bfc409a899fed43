use ms_core::Time;

/// Global clock of one run: current time, fired-event counter and checksum.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    time: Time,
    events: u64,
    checksum: f64,
}

impl SimClock {
    /// A clock at time zero with no events fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current global time.
    pub fn time(&self) -> Time {
        self.time
    }

    /// Move the global clock.
    pub fn set_time(&mut self, time: Time) {
        self.time = time;
    }

    /// Record a fired event at `time`. Returns the new event count.
    pub fn fire(&mut self, time: Time) -> u64 {
        self.time = time;
        self.events += 1;
        self.events
    }

    /// Number of events fired.
    pub fn events(&self) -> u64 {
        self.events
    }

    /// Add `time * weight` to the checksum.
    pub fn accumulate(&mut self, time: Time, weight: f64) {
        self.checksum += time * weight;
    }

    /// Accumulated checksum.
    pub fn checksum(&self) -> f64 {
        self.checksum
    }

    /// Back to time zero with no events and a zero checksum.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
