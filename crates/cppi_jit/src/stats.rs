/// Counters for trampoline synthesis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisStats {
    /// Trampolines compiled successfully
    pub compiled: u64,

    /// Requests answered from the cache
    pub cache_hits: u64,

    /// Requests that produced no trampoline
    pub failures: u64,

    /// Total time spent compiling (microseconds)
    pub total_time_us: u64,

    /// Minimum compilation time (microseconds)
    pub min_time_us: u64,

    /// Maximum compilation time (microseconds)
    pub max_time_us: u64,
}

impl SynthesisStats {
    pub fn new() -> Self {
        Self {
            min_time_us: u64::MAX,
            ..Default::default()
        }
    }

    /// Record a successful compilation
    pub fn record_compilation(&mut self, duration_us: u64) {
        self.compiled += 1;
        self.total_time_us = self.total_time_us.saturating_add(duration_us);
        self.min_time_us = self.min_time_us.min(duration_us);
        self.max_time_us = self.max_time_us.max(duration_us);
    }

    pub fn record_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Average compilation time (microseconds)
    pub fn avg_time_us(&self) -> f64 {
        if self.compiled == 0 {
            0.0
        } else {
            self.total_time_us as f64 / self.compiled as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_compilation() {
        let mut stats = SynthesisStats::new();
        assert_eq!(stats.avg_time_us(), 0.0);
        stats.record_compilation(30);
        stats.record_compilation(10);
        stats.record_hit();
        stats.record_failure();
        assert_eq!(stats.compiled, 2);
        assert_eq!(stats.min_time_us, 10);
        assert_eq!(stats.max_time_us, 30);
        assert_eq!(stats.avg_time_us(), 20.0);
        assert_eq!((stats.cache_hits, stats.failures), (1, 1));
    }
}
