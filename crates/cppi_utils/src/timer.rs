use std::time::{Duration, Instant};

/// Simple stopwatch helper for wall-clock measurements.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start_new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time in whole microseconds, saturating at `u64::MAX`.
    pub fn elapsed_us(&self) -> u64 {
        u64::try_from(self.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_is_monotonic() {
        let watch = Stopwatch::start_new();
        let first = watch.elapsed();
        std::thread::sleep(Duration::from_millis(2));
        assert!(watch.elapsed() > first);
        assert!(watch.elapsed_us() >= 2000);
    }
}
