use ahash::AHashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;

/// Metric names recorded by the bot team runtime.
pub mod names {
    pub const BOT_EXECUTIONS_TOTAL: &str = "bot_executions_total";
    pub const ADMISSION_REJECTED_TOTAL: &str = "admission_rejected_total";
    pub const BOT_EXECUTION_DURATION_SECONDS: &str = "bot_execution_duration_seconds";
    pub const BOTS_WORKING: &str = "bots_working";
    pub const CHAIN_RUNS_TOTAL: &str = "chain_runs_total";
    pub const DELEGATIONS_TOTAL: &str = "delegations_total";
    pub const DISCUSSION_MESSAGES_TOTAL: &str = "discussion_messages_total";
    pub const GENERATION_JOBS_DROPPED_TOTAL: &str = "generation_jobs_dropped_total";
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Sorted `key=value` pairs distinguishing series of one metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let mut v: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        v.sort();
        Self(v)
    }

    /// `{key="value",...}`, or empty when there are no labels.
    pub fn prometheus_str(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let inner: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v.replace('"', "\\\"")))
            .collect();
        format!("{{{}}}", inner.join(","))
    }
}

type SeriesKey = (String, Labels);

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Histogram {
    bounds: Vec<f64>,
    counts: Vec<AtomicU64>,
    sum_bits: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    fn new(bounds: &[f64]) -> Self {
        Self {
            bounds: bounds.to_vec(),
            counts: bounds.iter().map(|_| AtomicU64::new(0)).collect(),
            sum_bits: AtomicU64::new(0f64.to_bits()),
            count: AtomicU64::new(0),
        }
    }

    fn observe(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        if let Some(idx) = self.bounds.iter().position(|b| value <= *b) {
            self.counts[idx].fetch_add(1, Ordering::Relaxed);
        }
    }

    fn sum(&self) -> f64 {
        f64::from_bits(self.sum_bits.load(Ordering::Relaxed))
    }

    /// Cumulative count per upper bound.
    fn cumulative(&self) -> Vec<(f64, u64)> {
        let mut running = 0;
        self.bounds
            .iter()
            .zip(&self.counts)
            .map(|(bound, count)| {
                running += count.load(Ordering::Relaxed);
                (*bound, running)
            })
            .collect()
    }
}

/// Buckets for bot and remote-call durations, in seconds.
pub const EXECUTION_BUCKETS: &[f64] = &[0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0];

// ---------------------------------------------------------------------------
// MetricsCollector
// ---------------------------------------------------------------------------

/// In-process metrics registry: labelled counters, gauges and histograms.
///
/// Series are registered lazily on first use; values are atomics so the
/// hot path only takes a read lock.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: RwLock<AHashMap<SeriesKey, AtomicU64>>,
    gauges: RwLock<AHashMap<SeriesKey, AtomicI64>>,
    histograms: RwLock<AHashMap<String, Histogram>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Counters -----------------------------------------------------------

    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.increment_counter_by(name, labels, 1);
    }

    pub fn increment_counter_by(&self, name: &str, labels: &[(&str, &str)], amount: u64) {
        let key = (name.to_string(), Labels::new(labels));
        {
            let map = self.counters.read().expect("metrics lock poisoned");
            if let Some(c) = map.get(&key) {
                c.fetch_add(amount, Ordering::Relaxed);
                return;
            }
        }
        let mut map = self.counters.write().expect("metrics lock poisoned");
        map.entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(amount, Ordering::Relaxed);
    }

    pub fn get_counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = (name.to_string(), Labels::new(labels));
        let map = self.counters.read().expect("metrics lock poisoned");
        map.get(&key).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }

    /// Sum of a counter across all of its label sets.
    pub fn counter_total(&self, name: &str) -> u64 {
        let map = self.counters.read().expect("metrics lock poisoned");
        map.iter()
            .filter(|((n, _), _)| n == name)
            .map(|(_, c)| c.load(Ordering::Relaxed))
            .sum()
    }

    // -- Gauges -------------------------------------------------------------

    pub fn set_gauge(&self, name: &str, value: i64) {
        self.with_gauge(name, |g| g.store(value, Ordering::Relaxed));
    }

    /// Add `delta` (may be negative) to a gauge.
    pub fn add_gauge(&self, name: &str, delta: i64) {
        self.with_gauge(name, |g| {
            g.fetch_add(delta, Ordering::Relaxed);
        });
    }

    pub fn get_gauge(&self, name: &str) -> i64 {
        let key = (name.to_string(), Labels::new(&[]));
        let map = self.gauges.read().expect("metrics lock poisoned");
        map.get(&key).map(|g| g.load(Ordering::Relaxed)).unwrap_or(0)
    }

    fn with_gauge(&self, name: &str, f: impl FnOnce(&AtomicI64)) {
        let key = (name.to_string(), Labels::new(&[]));
        {
            let map = self.gauges.read().expect("metrics lock poisoned");
            if let Some(g) = map.get(&key) {
                f(g);
                return;
            }
        }
        let mut map = self.gauges.write().expect("metrics lock poisoned");
        f(map.entry(key).or_insert_with(|| AtomicI64::new(0)));
    }

    // -- Histograms ---------------------------------------------------------

    /// Record an observation; unknown histograms get [`EXECUTION_BUCKETS`].
    pub fn record_histogram(&self, name: &str, value: f64) {
        {
            let map = self.histograms.read().expect("metrics lock poisoned");
            if let Some(h) = map.get(name) {
                h.observe(value);
                return;
            }
        }
        let mut map = self.histograms.write().expect("metrics lock poisoned");
        map.entry(name.to_string())
            .or_insert_with(|| Histogram::new(EXECUTION_BUCKETS))
            .observe(value);
    }

    /// `(count, sum)` for a histogram, zero if never observed.
    pub fn histogram_summary(&self, name: &str) -> (u64, f64) {
        let map = self.histograms.read().expect("metrics lock poisoned");
        map.get(name)
            .map(|h| (h.count.load(Ordering::Relaxed), h.sum()))
            .unwrap_or((0, 0.0))
    }

    // -- Export --------------------------------------------------------------

    /// Prometheus text exposition format, series sorted by name then labels.
    pub fn export_prometheus(&self) -> String {
        let mut out = String::new();

        let counters = self.counters.read().expect("metrics lock poisoned");
        write_family(&mut out, "counter", counters.iter().map(|(k, v)| (k, v.load(Ordering::Relaxed) as i64)));
        drop(counters);

        let gauges = self.gauges.read().expect("metrics lock poisoned");
        write_family(&mut out, "gauge", gauges.iter().map(|(k, v)| (k, v.load(Ordering::Relaxed))));
        drop(gauges);

        let histograms = self.histograms.read().expect("metrics lock poisoned");
        let mut names: Vec<&String> = histograms.keys().collect();
        names.sort();
        for name in names {
            let h = &histograms[name];
            let count = h.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "# TYPE {name} histogram");
            for (bound, cumulative) in h.cumulative() {
                let _ = writeln!(out, "{name}_bucket{{le=\"{bound}\"}} {cumulative}");
            }
            let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {count}");
            let _ = writeln!(out, "{name}_sum {}", h.sum());
            let _ = writeln!(out, "{name}_count {count}");
        }
        out
    }

    pub fn export_json(&self) -> serde_json::Value {
        let series_key = |(name, labels): &SeriesKey| format!("{}{}", name, labels.prometheus_str());

        let counters: serde_json::Map<String, serde_json::Value> = self
            .counters
            .read()
            .expect("metrics lock poisoned")
            .iter()
            .map(|(k, v)| (series_key(k), serde_json::json!(v.load(Ordering::Relaxed))))
            .collect();

        let gauges: serde_json::Map<String, serde_json::Value> = self
            .gauges
            .read()
            .expect("metrics lock poisoned")
            .iter()
            .map(|(k, v)| (series_key(k), serde_json::json!(v.load(Ordering::Relaxed))))
            .collect();

        let histograms: serde_json::Map<String, serde_json::Value> = self
            .histograms
            .read()
            .expect("metrics lock poisoned")
            .iter()
            .map(|(name, h)| {
                let buckets: Vec<serde_json::Value> = h
                    .cumulative()
                    .into_iter()
                    .map(|(le, count)| serde_json::json!({ "le": le, "count": count }))
                    .collect();
                (
                    name.clone(),
                    serde_json::json!({
                        "buckets": buckets,
                        "sum": h.sum(),
                        "count": h.count.load(Ordering::Relaxed),
                    }),
                )
            })
            .collect();

        serde_json::json!({
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        })
    }
}

fn write_family<'a>(out: &mut String, kind: &str, series: impl Iterator<Item = (&'a SeriesKey, i64)>) {
    let mut rows: Vec<(&SeriesKey, i64)> = series.collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));
    let mut current: Option<&str> = None;
    for ((name, labels), value) in rows {
        if current != Some(name.as_str()) {
            let _ = writeln!(out, "# TYPE {name} {kind}");
            current = Some(name.as_str());
        }
        let _ = writeln!(out, "{}{} {}", name, labels.prometheus_str(), value);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
