/// Simulation time. Entity clocks, event times and the global clock all use it.
pub type Time = f64;

/// The time of an event that does not occur.
pub const TIME_INFINITE: Time = f64::INFINITY;

/// Returns `true` for a time at which an event can actually fire.
pub fn is_finite_time(t: Time) -> bool {
    t.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_time_is_not_finite() {
        assert!(!is_finite_time(TIME_INFINITE));
        assert!(!is_finite_time(f64::NAN));
        assert!(is_finite_time(0.0));
    }
}
