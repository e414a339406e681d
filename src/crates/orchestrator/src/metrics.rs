//! Service metrics.
//!
//! Counters, histograms and gauges tracked with atomics and rendered in
//! the Prometheus text exposition format for `GET /metrics`. Label sets
//! are small and bounded (agent names, risk levels, node names), so a
//! concurrent map per metric is sufficient.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Histogram bucket upper bounds in seconds.
const BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 3600.0];

/// A counter with a fixed label schema.
pub struct Counter {
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
    values: DashMap<Vec<String>, Arc<AtomicU64>>,
}

impl Counter {
    fn new(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> Self {
        Self {
            name,
            help,
            labels,
            values: DashMap::new(),
        }
    }

    /// Increment the counter for a label combination.
    pub fn inc(&self, label_values: &[&str]) {
        debug_assert_eq!(label_values.len(), self.labels.len());
        let key: Vec<String> = label_values.iter().map(|s| s.to_string()).collect();
        self.values
            .entry(key)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter by an arbitrary amount.
    pub fn inc_by(&self, label_values: &[&str], amount: u64) {
        debug_assert_eq!(label_values.len(), self.labels.len());
        let key: Vec<String> = label_values.iter().map(|s| s.to_string()).collect();
        self.values
            .entry(key)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(amount, Ordering::Relaxed);
    }

    /// Current value for a label combination.
    pub fn get(&self, label_values: &[&str]) -> u64 {
        let key: Vec<String> = label_values.iter().map(|s| s.to_string()).collect();
        self.values
            .get(&key)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!("# HELP {} {}\n", self.name, self.help));
        out.push_str(&format!("# TYPE {} counter\n", self.name));
        if self.labels.is_empty() && self.values.is_empty() {
            out.push_str(&format!("{} 0\n", self.name));
            return;
        }
        for entry in self.values.iter() {
            let labels = format_labels(self.labels, entry.key());
            out.push_str(&format!(
                "{}{} {}\n",
                self.name,
                labels,
                entry.value().load(Ordering::Relaxed)
            ));
        }
    }
}

/// A gauge with a fixed label schema.
pub struct Gauge {
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
    values: DashMap<Vec<String>, Arc<AtomicI64>>,
}

impl Gauge {
    fn new(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> Self {
        Self {
            name,
            help,
            labels,
            values: DashMap::new(),
        }
    }

    fn cell(&self, label_values: &[&str]) -> Arc<AtomicI64> {
        debug_assert_eq!(label_values.len(), self.labels.len());
        let key: Vec<String> = label_values.iter().map(|s| s.to_string()).collect();
        self.values
            .entry(key)
            .or_insert_with(|| Arc::new(AtomicI64::new(0)))
            .clone()
    }

    /// Set the gauge to an absolute value.
    pub fn set(&self, label_values: &[&str], value: i64) {
        self.cell(label_values).store(value, Ordering::Relaxed);
    }

    /// Increment the gauge.
    pub fn inc(&self, label_values: &[&str]) {
        self.cell(label_values).fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the gauge, saturating at zero.
    pub fn dec(&self, label_values: &[&str]) {
        let cell = self.cell(label_values);
        let mut current = cell.load(Ordering::Relaxed);
        while current > 0 {
            match cell.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Current value for a label combination.
    pub fn get(&self, label_values: &[&str]) -> i64 {
        self.cell(label_values).load(Ordering::Relaxed)
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!("# HELP {} {}\n", self.name, self.help));
        out.push_str(&format!("# TYPE {} gauge\n", self.name));
        if self.labels.is_empty() && self.values.is_empty() {
            out.push_str(&format!("{} 0\n", self.name));
            return;
        }
        for entry in self.values.iter() {
            let labels = format_labels(self.labels, entry.key());
            out.push_str(&format!(
                "{}{} {}\n",
                self.name,
                labels,
                entry.value().load(Ordering::Relaxed)
            ));
        }
    }
}

struct HistogramCell {
    bucket_counts: Vec<AtomicU64>,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl HistogramCell {
    fn new() -> Self {
        Self {
            bucket_counts: BUCKETS.iter().map(|_| AtomicU64::new(0)).collect(),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }
}

/// A histogram of seconds with a fixed label schema.
pub struct Histogram {
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
    values: DashMap<Vec<String>, Arc<HistogramCell>>,
}

impl Histogram {
    fn new(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> Self {
        Self {
            name,
            help,
            labels,
            values: DashMap::new(),
        }
    }

    /// Record an observation in seconds.
    pub fn observe(&self, label_values: &[&str], seconds: f64) {
        debug_assert_eq!(label_values.len(), self.labels.len());
        let key: Vec<String> = label_values.iter().map(|s| s.to_string()).collect();
        let cell = self
            .values
            .entry(key)
            .or_insert_with(|| Arc::new(HistogramCell::new()))
            .clone();

        for (i, bound) in BUCKETS.iter().enumerate() {
            if seconds <= *bound {
                cell.bucket_counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        cell.sum_micros
            .fetch_add((seconds * 1e6) as u64, Ordering::Relaxed);
        cell.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of observations for a label combination.
    pub fn count(&self, label_values: &[&str]) -> u64 {
        let key: Vec<String> = label_values.iter().map(|s| s.to_string()).collect();
        self.values
            .get(&key)
            .map(|c| c.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!("# HELP {} {}\n", self.name, self.help));
        out.push_str(&format!("# TYPE {} histogram\n", self.name));
        for entry in self.values.iter() {
            let cell = entry.value();
            for (i, bound) in BUCKETS.iter().enumerate() {
                let labels =
                    format_labels_with(self.labels, entry.key(), "le", &format!("{bound}"));
                out.push_str(&format!(
                    "{}_bucket{} {}\n",
                    self.name,
                    labels,
                    cell.bucket_counts[i].load(Ordering::Relaxed)
                ));
            }
            let count = cell.count.load(Ordering::Relaxed);
            let labels = format_labels_with(self.labels, entry.key(), "le", "+Inf");
            out.push_str(&format!("{}_bucket{} {}\n", self.name, labels, count));

            let labels = format_labels(self.labels, entry.key());
            let sum = cell.sum_micros.load(Ordering::Relaxed) as f64 / 1e6;
            out.push_str(&format!("{}_sum{} {}\n", self.name, labels, sum));
            out.push_str(&format!("{}_count{} {}\n", self.name, labels, count));
        }
    }
}

fn format_labels(names: &[&str], values: &[String]) -> String {
    if names.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{name}=\"{value}\""))
        .collect();
    format!("{{{}}}", pairs.join(","))
}

fn format_labels_with(names: &[&str], values: &[String], extra_name: &str, extra: &str) -> String {
    let mut pairs: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{name}=\"{value}\""))
        .collect();
    pairs.push(format!("{extra_name}=\"{extra}\""));
    format!("{{{}}}", pairs.join(","))
}

/// The service's metric registry.
pub struct Metrics {
    /// Approval requests created, by agent and risk
    pub approvals_created_total: Counter,
    /// Approvals resolved, by agent, risk and terminal status
    pub approvals_resolved_total: Counter,
    /// Pending approvals moved to expired by the sweep
    pub approvals_timeouts_total: Counter,
    /// Node invocations, by node and outcome
    pub node_invocations_total: Counter,
    /// LLM calls, by agent and model
    pub llm_calls_total: Counter,
    /// Webhook deliveries ignored as duplicates
    pub webhook_duplicate_total: Counter,
    /// Resume tickets rejected as stale
    pub stale_resume_total: Counter,
    /// Time from approval creation to resolution
    pub approval_latency_seconds: Histogram,
    /// Node execution duration, by node
    pub node_duration_seconds: Histogram,
    /// LLM round-trip latency
    pub llm_latency_seconds: Histogram,
    /// Pending approvals, by risk
    pub approvals_backlog: Gauge,
    /// Runs currently occupying a worker
    pub active_workflows: Gauge,
}

impl Metrics {
    /// Create a registry with all metrics zeroed.
    pub fn new() -> Self {
        Self {
            approvals_created_total: Counter::new(
                "approvals_created_total",
                "Approval requests created",
                &["agent", "risk"],
            ),
            approvals_resolved_total: Counter::new(
                "approvals_resolved_total",
                "Approval requests resolved",
                &["agent", "risk", "status"],
            ),
            approvals_timeouts_total: Counter::new(
                "approvals_timeouts_total",
                "Approval requests expired by the sweep",
                &[],
            ),
            node_invocations_total: Counter::new(
                "node_invocations_total",
                "Graph node invocations",
                &["node", "outcome"],
            ),
            llm_calls_total: Counter::new(
                "llm_calls_total",
                "LLM chat completions issued",
                &["agent", "model"],
            ),
            webhook_duplicate_total: Counter::new(
                "webhook_duplicate_total",
                "Webhook deliveries ignored as duplicates",
                &[],
            ),
            stale_resume_total: Counter::new(
                "stale_resume_total",
                "Resume tickets rejected as stale",
                &[],
            ),
            approval_latency_seconds: Histogram::new(
                "approval_latency_seconds",
                "Time from approval creation to resolution",
                &[],
            ),
            node_duration_seconds: Histogram::new(
                "node_duration_seconds",
                "Node execution duration",
                &["node"],
            ),
            llm_latency_seconds: Histogram::new(
                "llm_latency_seconds",
                "LLM round-trip latency",
                &[],
            ),
            approvals_backlog: Gauge::new(
                "approvals_backlog",
                "Pending approval requests",
                &["risk"],
            ),
            active_workflows: Gauge::new("active_workflows", "Runs currently executing", &[]),
        }
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.approvals_created_total.render(&mut out);
        self.approvals_resolved_total.render(&mut out);
        self.approvals_timeouts_total.render(&mut out);
        self.node_invocations_total.render(&mut out);
        self.llm_calls_total.render(&mut out);
        self.webhook_duplicate_total.render(&mut out);
        self.stale_resume_total.render(&mut out);
        self.approval_latency_seconds.render(&mut out);
        self.node_duration_seconds.render(&mut out);
        self.llm_latency_seconds.render(&mut out);
        self.approvals_backlog.render(&mut out);
        self.active_workflows.render(&mut out);
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_labels() {
        let metrics = Metrics::new();
        metrics
            .approvals_created_total
            .inc(&["infrastructure", "critical"]);
        metrics
            .approvals_created_total
            .inc(&["infrastructure", "critical"]);
        metrics.approvals_created_total.inc(&["cicd", "high"]);

        assert_eq!(
            metrics
                .approvals_created_total
                .get(&["infrastructure", "critical"]),
            2
        );
        assert_eq!(metrics.approvals_created_total.get(&["cicd", "high"]), 1);
        assert_eq!(metrics.approvals_created_total.get(&["cicd", "low"]), 0);
    }

    #[test]
    fn test_gauge_saturates_at_zero() {
        let metrics = Metrics::new();
        metrics.active_workflows.inc(&[]);
        metrics.active_workflows.dec(&[]);
        metrics.active_workflows.dec(&[]);
        assert_eq!(metrics.active_workflows.get(&[]), 0);
    }

    #[test]
    fn test_histogram_counts_observations() {
        let metrics = Metrics::new();
        metrics.node_duration_seconds.observe(&["supervisor"], 0.2);
        metrics.node_duration_seconds.observe(&["supervisor"], 1.7);
        assert_eq!(metrics.node_duration_seconds.count(&["supervisor"]), 2);
    }

    #[test]
    fn test_render_exposition_format() {
        let metrics = Metrics::new();
        metrics.approvals_created_total.inc(&["docs", "low"]);
        metrics.active_workflows.set(&[], 3);
        metrics.approval_latency_seconds.observe(&[], 12.0);

        let text = metrics.render();
        assert!(text.contains("# TYPE approvals_created_total counter"));
        assert!(text.contains("approvals_created_total{agent=\"docs\",risk=\"low\"} 1"));
        assert!(text.contains("# TYPE active_workflows gauge"));
        assert!(text.contains("active_workflows 3"));
        assert!(text.contains("approval_latency_seconds_count 1"));
        assert!(text.contains("le=\"+Inf\""));
    }
}
