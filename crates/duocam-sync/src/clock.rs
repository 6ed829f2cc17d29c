use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall clock time in seconds since the unix epoch.
///
/// Flash times are recorded as wall clock instants so they can be compared
/// across sessions and persisted.
pub trait Clock: Send {
    /// The current time in seconds.
    fn now(&self) -> f64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(a > 1.0e9);
        assert!(b >= a);
    }
}
