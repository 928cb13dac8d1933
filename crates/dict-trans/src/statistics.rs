//! Lookup counters for a translation context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Counters shared by a [`TranslationContext`](crate::TranslationContext) and
/// every context derived from it.
///
/// All counters are atomics, so recording never needs `&mut` access and the
/// owning context stays `Send + Sync`.
#[derive(Debug)]
pub struct ProcessingStatistics {
    system_dict_lookups: AtomicU64,
    table_dict_lookups: AtomicU64,
    expression_evaluations: AtomicU64,
    successful_translations: AtomicU64,
    failed_translations: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    created_at: DateTime<Utc>,
}

impl Default for ProcessingStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStatistics {
    /// Creates zeroed counters stamped with the current time.
    pub fn new() -> Self {
        Self {
            system_dict_lookups: AtomicU64::new(0),
            table_dict_lookups: AtomicU64::new(0),
            expression_evaluations: AtomicU64::new(0),
            successful_translations: AtomicU64::new(0),
            failed_translations: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            created_at: Utc::now(),
        }
    }

    pub(crate) fn record_system_lookup(&self) {
        self.system_dict_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_table_lookup(&self) {
        self.table_dict_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expression_evaluation(&self) {
        self.expression_evaluations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome(&self, success: bool) {
        if success {
            self.successful_translations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_translations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// System dictionary lookups with a non-null code.
    pub fn system_dict_lookups(&self) -> u64 {
        self.system_dict_lookups.load(Ordering::Relaxed)
    }

    /// Table dictionary lookups with a non-null code.
    pub fn table_dict_lookups(&self) -> u64 {
        self.table_dict_lookups.load(Ordering::Relaxed)
    }

    /// Expression evaluations.
    pub fn expression_evaluations(&self) -> u64 {
        self.expression_evaluations.load(Ordering::Relaxed)
    }

    /// Lookups that found a name.
    pub fn successful_translations(&self) -> u64 {
        self.successful_translations.load(Ordering::Relaxed)
    }

    /// Lookups that found nothing.
    pub fn failed_translations(&self) -> u64 {
        self.failed_translations.load(Ordering::Relaxed)
    }

    /// Dictionary fetches served from the builder cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Dictionary fetches that went to the data source.
    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// When these counters were created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// System lookups, table lookups and expression evaluations.
    pub fn total_lookups(&self) -> u64 {
        self.system_dict_lookups() + self.table_dict_lookups() + self.expression_evaluations()
    }

    /// Successful plus failed translations.
    pub fn total_translations(&self) -> u64 {
        self.successful_translations() + self.failed_translations()
    }

    /// Fraction of lookups that found a name, or 0.0 with no lookups.
    pub fn success_rate(&self) -> f64 {
        ratio(self.successful_translations(), self.total_translations())
    }

    /// Fraction of fetches served from cache, or 0.0 with no fetches.
    pub fn cache_hit_rate(&self) -> f64 {
        ratio(self.cache_hits(), self.cache_hits() + self.cache_misses())
    }

    /// Time since creation.
    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or_default()
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            system_dict_lookups: self.system_dict_lookups(),
            table_dict_lookups: self.table_dict_lookups(),
            expression_evaluations: self.expression_evaluations(),
            successful_translations: self.successful_translations(),
            failed_translations: self.failed_translations(),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            success_rate: self.success_rate(),
            cache_hit_rate: self.cache_hit_rate(),
            created_at: self.created_at,
        }
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Point-in-time copy of [`ProcessingStatistics`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatisticsSnapshot {
    /// System dictionary lookups.
    pub system_dict_lookups: u64,
    /// Table dictionary lookups.
    pub table_dict_lookups: u64,
    /// Expression evaluations.
    pub expression_evaluations: u64,
    /// Lookups that found a name.
    pub successful_translations: u64,
    /// Lookups that found nothing.
    pub failed_translations: u64,
    /// Fetches served from cache.
    pub cache_hits: u64,
    /// Fetches sent to the data source.
    pub cache_misses: u64,
    /// Successful over total translations.
    pub success_rate: f64,
    /// Hits over total fetches.
    pub cache_hit_rate: f64,
    /// Creation time of the counters.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_are_zero_without_activity() {
        let stats = ProcessingStatistics::new();
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.cache_hit_rate(), 0.0);
        assert_eq!(stats.total_lookups(), 0);
    }

    #[test]
    fn test_counters_and_rates() {
        let stats = ProcessingStatistics::new();
        stats.record_system_lookup();
        stats.record_outcome(true);
        stats.record_table_lookup();
        stats.record_outcome(false);
        stats.record_system_lookup();
        stats.record_outcome(true);
        stats.record_expression_evaluation();
        stats.record_cache_hit();
        stats.record_cache_miss();
        stats.record_cache_miss();
        stats.record_cache_miss();

        assert_eq!(stats.total_lookups(), 4);
        assert_eq!(stats.total_translations(), 3);
        assert!((stats.success_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
        assert!((stats.cache_hit_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_copies_values() {
        let stats = ProcessingStatistics::new();
        stats.record_expression_evaluation();
        let snapshot = stats.snapshot();
        stats.record_expression_evaluation();

        assert_eq!(snapshot.expression_evaluations, 1);
        assert_eq!(stats.expression_evaluations(), 2);
        assert_eq!(snapshot.created_at, stats.created_at());
    }

    #[test]
    fn test_elapsed_is_monotonic_from_creation() {
        let stats = ProcessingStatistics::new();
        assert!(stats.elapsed() < Duration::from_secs(60));
    }
}
