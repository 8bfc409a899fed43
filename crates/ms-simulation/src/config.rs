use serde::{Deserialize, Serialize};

/// How entity clocks follow the global clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePolicy {
    /// Every active entity is aged to the time of each event before it fires.
    #[default]
    Eager,
    /// Only the owner of an event is aged when it fires; other entities are
    /// aged when a link to them is followed.
    JustInTime,
}

/// Configuration for one simulation run (one replicate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed of the run's random streams.
    pub seed: u64,
    /// Replicate (sub-run) id, mixed into every random stream.
    pub member: u32,
    /// Entity aging policy.
    pub time_policy: TimePolicy,
    /// Let entities age backward instead of failing.
    pub allow_time_travel: bool,
    /// Let links be followed to entities whose clock is ahead.
    pub allow_clairvoyance: bool,
    /// Treat events later than their entity's censor time as not occurring.
    pub censor_event_time: bool,
    /// Accumulate the event checksum.
    pub event_checksum: bool,
    /// Record fired events and link changes in the trace log.
    pub event_trace: bool,
    /// Reject attribute assignments made while dirty events are cleaned.
    pub verify_attribute_modification: bool,
    /// Maximum trace log size (oldest records dropped when exceeded). 0 = unlimited.
    pub max_trace_records: usize,
    /// Multilink size above which a one-time warning is logged.
    pub multilink_warning_threshold: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            member: 0,
            time_policy: TimePolicy::Eager,
            allow_time_travel: false,
            allow_clairvoyance: false,
            censor_event_time: false,
            event_checksum: true,
            event_trace: false,
            verify_attribute_modification: true,
            max_trace_records: 0,
            multilink_warning_threshold: 1000,
        }
    }
}

impl SimConfig {
    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the replicate id.
    pub fn with_member(mut self, member: u32) -> Self {
        self.member = member;
        self
    }

    /// Set the aging policy.
    pub fn with_time_policy(mut self, policy: TimePolicy) -> Self {
        self.time_policy = policy;
        self
    }

    /// Allow or forbid aging backward.
    pub fn with_time_travel(mut self, allow: bool) -> Self {
        self.allow_time_travel = allow;
        self
    }

    /// Allow or forbid reading entities ahead of the global clock.
    pub fn with_clairvoyance(mut self, allow: bool) -> Self {
        self.allow_clairvoyance = allow;
        self
    }

    /// Enable or disable the censor-time ceiling.
    pub fn with_censor_event_time(mut self, enabled: bool) -> Self {
        self.censor_event_time = enabled;
        self
    }

    /// Enable or disable the event checksum.
    pub fn with_event_checksum(mut self, enabled: bool) -> Self {
        self.event_checksum = enabled;
        self
    }

    /// Enable or disable the trace log.
    pub fn with_event_trace(mut self, enabled: bool) -> Self {
        self.event_trace = enabled;
        self
    }

    /// Enable or disable the assignment check during cleaning.
    pub fn with_verify_attribute_modification(mut self, enabled: bool) -> Self {
        self.verify_attribute_modification = enabled;
        self
    }

    /// Set the maximum trace log size (0 = unlimited).
    pub fn with_max_trace_records(mut self, max: usize) -> Self {
        self.max_trace_records = max;
        self
    }

    /// Set the multilink warning threshold.
    pub fn with_multilink_warning_threshold(mut self, threshold: usize) -> Self {
        self.multilink_warning_threshold = threshold;
        self
    }

    /// Returns `true` for the just-in-time policy.
    pub fn just_in_time(&self) -> bool {
        self.time_policy == TimePolicy::JustInTime
    }
}
