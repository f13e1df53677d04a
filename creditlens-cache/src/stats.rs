//! Cache usage counters.

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by a settled entry.
    pub hits: u64,
    /// Lookups that issued a new request.
    pub misses: u64,
    /// Lookups that joined an in-flight request.
    pub coalesced: u64,
    /// Completions dropped by the stale-response guard.
    pub discarded: u64,
    /// Entries removed by invalidation.
    pub invalidated: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0). Coalesced lookups count as hits.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits + self.coalesced;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 6,
            coalesced: 2,
            misses: 2,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }
}
