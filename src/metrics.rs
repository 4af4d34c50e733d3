//! Metric sinks.
//!
//! The training loop reports scalars through [`MetricsSink::emit`] and never
//! talks to a telemetry backend directly. Each record is a key, a value and
//! a monotonic step index (update count for losses, episode index for
//! rewards and costs).

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One emitted scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub key: String,
    pub value: f64,
    pub step: u64,
}

pub trait MetricsSink {
    fn emit(&mut self, key: &str, value: f64, step: u64) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Forwards every record to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn emit(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        tracing::info!(target: "metrics", key, value, step, "metric");
        Ok(())
    }
}

/// Appends one JSON object per record to a file.
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = File::options()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open metrics log {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl MetricsSink for JsonlSink {
    fn emit(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        let record = MetricRecord {
            key: key.to_string(),
            value,
            step,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("failed to flush metrics log")
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub records: Vec<MetricRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(step, value)` pairs emitted under `key`, in emission order.
    pub fn values(&self, key: &str) -> Vec<(u64, f64)> {
        self.records
            .iter()
            .filter(|r| r.key == key)
            .map(|r| (r.step, r.value))
            .collect()
    }
}

impl MetricsSink for MemorySink {
    fn emit(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        self.records.push(MetricRecord {
            key: key.to_string(),
            value,
            step,
        });
        Ok(())
    }
}

/// Fan-out to several sinks.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn MetricsSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl MetricsSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl MetricsSink for MultiSink {
    fn emit(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        for sink in &mut self.sinks {
            sink.emit(key, value, step)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

impl<S: MetricsSink + ?Sized> MetricsSink for &mut S {
    fn emit(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        (**self).emit(key, value, step)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_filters_by_key() {
        let mut sink = MemorySink::new();
        sink.emit("reward/train", 1.5, 0).unwrap();
        sink.emit("cost/train", 0.0, 0).unwrap();
        sink.emit("reward/train", 2.5, 1).unwrap();
        assert_eq!(sink.values("reward/train"), vec![(0, 1.5), (1, 2.5)]);
        assert!(sink.values("missing").is_empty());
    }

    #[test]
    fn jsonl_sink_writes_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/metrics.jsonl");
        {
            let mut sink = JsonlSink::create(&path).unwrap();
            sink.emit("loss/policy", -0.25, 3).unwrap();
            sink.emit("avg_reward/test", 4.0, 1).unwrap();
            sink.flush().unwrap();
        }
        let text = fs::read_to_string(&path).unwrap();
        let records: Vec<MetricRecord> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "loss/policy");
        assert_eq!(records[1].step, 1);
    }

    #[test]
    fn multi_sink_fans_out() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");
        let mut multi = MultiSink::new()
            .with(TracingSink)
            .with(JsonlSink::create(&a).unwrap())
            .with(JsonlSink::create(&b).unwrap());
        multi.emit("cost/train", 1.0, 7).unwrap();
        multi.flush().unwrap();

        for path in [a, b] {
            assert_eq!(fs::read_to_string(path).unwrap().lines().count(), 1);
        }
    }
}
