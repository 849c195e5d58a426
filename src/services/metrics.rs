use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::clients::prometheus::TimeSeriesSource;
use crate::error::QueryError;
use crate::models::metrics::{ContainerMetric, MetricKind, MetricsResponse, RawSample};

/// Which containers a query covers.
#[derive(Debug, Clone, Copy)]
pub enum EntityFilter<'a> {
    /// Every named container.
    Fleet,
    /// The single container with this `id` label.
    Entity(&'a str),
}

impl EntityFilter<'_> {
    fn selector(&self) -> String {
        match self {
            EntityFilter::Fleet => r#"name!="""#.to_string(),
            EntityFilter::Entity(id) => {
                format!(r#"id="{}""#, id.replace('\\', r"\\").replace('"', r#"\""#))
            }
        }
    }
}

pub fn expression(kind: MetricKind, filter: EntityFilter<'_>) -> String {
    let sel = filter.selector();
    match kind {
        MetricKind::CpuPercent => {
            format!("rate(container_cpu_usage_seconds_total{{{}}}[5m]) * 100", sel)
        }
        MetricKind::MemoryUsageBytes => format!("container_memory_usage_bytes{{{}}}", sel),
        MetricKind::MemoryLimitBytes => format!("container_spec_memory_limit_bytes{{{}}}", sel),
        MetricKind::NetworkRxBytes => format!("container_network_receive_bytes_total{{{}}}", sel),
        MetricKind::NetworkTxBytes => format!("container_network_transmit_bytes_total{{{}}}", sel),
    }
}

/// Creates or updates one record per container id. Unnamed series are
/// cgroup aggregates, not containers, and are dropped. The last sample for
/// an id wins.
pub fn merge_usage(records: &mut HashMap<String, ContainerMetric>, samples: &[RawSample]) {
    for s in samples {
        if s.name.is_empty() {
            continue;
        }
        let record = records
            .entry(s.id.clone())
            .or_insert_with(|| ContainerMetric {
                container_id: s.id.clone(),
                ..Default::default()
            });
        record.container_name = s.name.clone();
        record.set(s.kind, s.value);
    }
}

/// Fills in records a usage pass already created; never creates one.
pub fn merge_supplement(records: &mut HashMap<String, ContainerMetric>, samples: &[RawSample]) {
    for s in samples {
        if let Some(record) = records.get_mut(&s.id) {
            record.set(s.kind, s.value);
        }
    }
}

/// Outer join of CPU and memory usage, with limits applied to the result.
pub fn join(
    cpu: &[RawSample],
    memory: &[RawSample],
    limits: &[RawSample],
) -> HashMap<String, ContainerMetric> {
    let mut records = HashMap::new();
    merge_usage(&mut records, cpu);
    merge_usage(&mut records, memory);
    merge_supplement(&mut records, limits);
    records
}

/// Runs the container queries against a time-series backend and joins them.
pub struct ContainerMetricsService {
    source: Arc<dyn TimeSeriesSource>,
    timeout: Duration,
}

impl ContainerMetricsService {
    pub fn new(source: Arc<dyn TimeSeriesSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    async fn fetch(
        &self,
        kind: MetricKind,
        filter: EntityFilter<'_>,
        at: DateTime<Utc>,
    ) -> Result<Vec<RawSample>, QueryError> {
        let expr = expression(kind, filter);
        let samples = tokio::time::timeout(self.timeout, self.source.query(&expr, at))
            .await
            .map_err(|_| {
                QueryError::Metrics(format!("{}: timed out after {:?}", expr, self.timeout))
            })??;
        Ok(samples.into_iter().map(|s| s.into_raw(kind)).collect())
    }

    /// Fleet-wide records. Any single query may fail; the call fails only
    /// when neither CPU nor memory usage could be read.
    pub async fn container_metrics(
        &self,
        at: DateTime<Utc>,
    ) -> Result<MetricsResponse, QueryError> {
        let f = EntityFilter::Fleet;
        let (cpu, memory, limit, rx, tx) = tokio::join!(
            self.fetch(MetricKind::CpuPercent, f, at),
            self.fetch(MetricKind::MemoryUsageBytes, f, at),
            self.fetch(MetricKind::MemoryLimitBytes, f, at),
            self.fetch(MetricKind::NetworkRxBytes, f, at),
            self.fetch(MetricKind::NetworkTxBytes, f, at),
        );

        let (cpu, memory) = match (cpu, memory) {
            (Err(cpu_err), Err(mem_err)) => {
                warn!("memory query failed: {}", mem_err);
                return Err(cpu_err);
            }
            (cpu, memory) => (or_empty("cpu", cpu), or_empty("memory", memory)),
        };

        let mut metrics = join(&cpu, &memory, &or_empty("memory limit", limit));
        merge_supplement(&mut metrics, &or_empty("network rx", rx));
        merge_supplement(&mut metrics, &or_empty("network tx", tx));

        Ok(MetricsResponse {
            timestamp: at,
            metrics,
        })
    }

    /// One container's record. CPU or memory transport errors fail the call;
    /// empty results leave the field at zero.
    pub async fn single_container_metrics(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<ContainerMetric, QueryError> {
        let f = EntityFilter::Entity(id);
        let (cpu, memory, limit) = tokio::join!(
            self.fetch(MetricKind::CpuPercent, f, at),
            self.fetch(MetricKind::MemoryUsageBytes, f, at),
            self.fetch(MetricKind::MemoryLimitBytes, f, at),
        );
        let cpu = cpu?;
        let memory = memory?;

        let mut metric = ContainerMetric {
            container_id: id.to_string(),
            ..Default::default()
        };
        if let Some(s) = cpu.first() {
            metric.container_name = s.name.clone();
            metric.cpu_usage = s.value;
        }
        if let Some(s) = memory.first() {
            if metric.container_name.is_empty() {
                metric.container_name = s.name.clone();
            }
            metric.memory_usage = s.value;
        }
        if let Some(s) = or_empty("memory limit", limit).first() {
            metric.memory_limit = s.value;
        }
        Ok(metric)
    }
}

fn or_empty(what: &str, result: Result<Vec<RawSample>, QueryError>) -> Vec<RawSample> {
    result.unwrap_or_else(|e| {
        warn!("{} query failed, continuing without it: {}", what, e);
        Vec::new()
    })
}
