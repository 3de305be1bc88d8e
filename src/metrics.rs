//! Sink metrics
//!
//! Relaxed atomic counters updated on the logging hot path. With the
//! `metrics` feature the counters are mirrored into the `metrics` facade.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time copy of the sink counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Connection resolutions requested
    pub resolutions: usize,
    /// Resolutions served from the cache
    pub cache_hits: usize,
    /// Resolutions that missed the cache
    pub cache_misses: usize,
    /// Database handles constructed
    pub handles_created: usize,
    /// Database sharding sequences attempted
    pub database_provisions: usize,
    /// Collection sharding sequences attempted
    pub collection_provisions: usize,
    /// Administrative commands issued
    pub admin_commands: usize,
    /// Administrative commands answered with "already applied"
    pub already_applied: usize,
    /// Single-document insert calls
    pub single_inserts: usize,
    /// Batched insert calls
    pub batch_inserts: usize,
    /// Documents handed to the store
    pub documents_written: usize,
    /// Unacknowledged writes the store rejected
    pub dropped_writes: usize,
    /// Events whose document could not be built
    pub format_failures: usize,
    /// Absent events skipped
    pub skipped_events: usize,
    /// Time since the collector was created
    pub uptime: Duration,
}

impl SinkStats {
    /// Share of resolutions served from the cache, as a percentage
    pub fn cache_hit_rate(&self) -> f64 {
        if self.resolutions == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / self.resolutions as f64 * 100.0
    }
}

/// Counter collector shared by the resolver, provisioner and sink
#[derive(Debug)]
pub struct MetricsCollector {
    // Resolution
    resolutions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    handles_created: AtomicUsize,

    // Provisioning
    database_provisions: AtomicUsize,
    collection_provisions: AtomicUsize,
    admin_commands: AtomicUsize,
    already_applied: AtomicUsize,

    // Writes
    single_inserts: AtomicUsize,
    batch_inserts: AtomicUsize,
    documents_written: AtomicUsize,
    dropped_writes: AtomicUsize,
    format_failures: AtomicUsize,
    skipped_events: AtomicUsize,

    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn add(counter: &AtomicUsize, _name: &'static str, n: usize) {
    counter.fetch_add(n, Ordering::Relaxed);
    #[cfg(feature = "metrics")]
    metrics::counter!(_name, n as u64);
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            resolutions: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            cache_misses: AtomicUsize::new(0),
            handles_created: AtomicUsize::new(0),
            database_provisions: AtomicUsize::new(0),
            collection_provisions: AtomicUsize::new(0),
            admin_commands: AtomicUsize::new(0),
            already_applied: AtomicUsize::new(0),
            single_inserts: AtomicUsize::new(0),
            batch_inserts: AtomicUsize::new(0),
            documents_written: AtomicUsize::new(0),
            dropped_writes: AtomicUsize::new(0),
            format_failures: AtomicUsize::new(0),
            skipped_events: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a cache hit
    pub fn record_cache_hit(&self) {
        add(&self.resolutions, "mongolog.resolutions", 1);
        add(&self.cache_hits, "mongolog.cache.hits", 1);
    }

    /// Record a cache miss
    pub fn record_cache_miss(&self) {
        add(&self.resolutions, "mongolog.resolutions", 1);
        add(&self.cache_misses, "mongolog.cache.misses", 1);
    }

    /// Record a newly constructed database handle
    pub fn record_handle_created(&self) {
        add(&self.handles_created, "mongolog.handles.created", 1);
    }

    /// Record a database sharding attempt
    pub fn record_database_provision(&self) {
        add(&self.database_provisions, "mongolog.provision.database", 1);
    }

    /// Record a collection sharding attempt
    pub fn record_collection_provision(&self) {
        add(&self.collection_provisions, "mongolog.provision.collection", 1);
    }

    /// Record an administrative command
    pub fn record_admin_command(&self) {
        add(&self.admin_commands, "mongolog.admin.commands", 1);
    }

    /// Record an "already applied" reply
    pub fn record_already_applied(&self) {
        add(&self.already_applied, "mongolog.admin.already_applied", 1);
    }

    /// Record a single-document insert
    pub fn record_single_insert(&self) {
        add(&self.single_inserts, "mongolog.inserts.single", 1);
        add(&self.documents_written, "mongolog.documents", 1);
    }

    /// Record a batched insert of `count` documents
    pub fn record_batch_insert(&self, count: usize) {
        add(&self.batch_inserts, "mongolog.inserts.batch", 1);
        add(&self.documents_written, "mongolog.documents", count);
    }

    /// Record `count` documents lost to a failed unacknowledged write
    pub fn record_dropped_writes(&self, count: usize) {
        add(&self.dropped_writes, "mongolog.documents.dropped", count);
    }

    /// Record a document that failed to build
    pub fn record_format_failure(&self) {
        add(&self.format_failures, "mongolog.format.failures", 1);
    }

    /// Record `count` absent events skipped
    pub fn record_skipped_events(&self, count: usize) {
        add(&self.skipped_events, "mongolog.events.skipped", count);
    }

    /// Take a snapshot of all counters
    pub fn snapshot(&self) -> SinkStats {
        SinkStats {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            handles_created: self.handles_created.load(Ordering::Relaxed),
            database_provisions: self.database_provisions.load(Ordering::Relaxed),
            collection_provisions: self.collection_provisions.load(Ordering::Relaxed),
            admin_commands: self.admin_commands.load(Ordering::Relaxed),
            already_applied: self.already_applied.load(Ordering::Relaxed),
            single_inserts: self.single_inserts.load(Ordering::Relaxed),
            batch_inserts: self.batch_inserts.load(Ordering::Relaxed),
            documents_written: self.documents_written.load(Ordering::Relaxed),
            dropped_writes: self.dropped_writes.load(Ordering::Relaxed),
            format_failures: self.format_failures.load(Ordering::Relaxed),
            skipped_events: self.skipped_events.load(Ordering::Relaxed),
            uptime: self.start_time.elapsed(),
        }
    }
}
