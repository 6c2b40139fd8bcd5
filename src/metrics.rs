use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::HarnessError;

/// The two operation kinds a benchmark batch measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Write,
    Read,
}

impl Operation {
    /// Report section order: writes first, then reads.
    pub fn all() -> [Operation; 2] {
        [Operation::Write, Operation::Read]
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Write => write!(f, "write"),
            Operation::Read => write!(f, "read"),
        }
    }
}

/// Throughput statistics derived from one timed batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub ops_per_sec: f64,
    pub mb_per_sec: f64,
}

impl Throughput {
    /// Derive rates from a batch measurement.
    ///
    /// A zero elapsed time cannot come from a real batch and is rejected
    /// rather than divided by.
    pub fn derive(
        op_count: usize,
        elapsed: Duration,
        payload_size: usize,
    ) -> Result<Self, HarnessError> {
        if elapsed.is_zero() {
            return Err(HarnessError::ZeroElapsed { op_count });
        }
        let secs = elapsed.as_secs_f64();
        Ok(Self {
            ops_per_sec: op_count as f64 / secs,
            mb_per_sec: (op_count * payload_size) as f64 / secs / (1024.0 * 1024.0),
        })
    }
}

/// One measured benchmark cell. Immutable once constructed; the driver
/// accumulates these in execution order and hands the whole sequence to the
/// reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub operation: Operation,
    pub implementation: String,
    pub blob_size: usize,
    pub concurrency: usize,
    pub operations: usize,
    pub elapsed: Duration,
    pub ops_per_sec: f64,
    pub mb_per_sec: f64,
}

impl BenchmarkResult {
    pub fn new(
        operation: Operation,
        implementation: &str,
        blob_size: usize,
        concurrency: usize,
        operations: usize,
        elapsed: Duration,
    ) -> Result<Self, HarnessError> {
        let throughput = Throughput::derive(operations, elapsed, blob_size)?;
        Ok(Self {
            operation,
            implementation: implementation.to_string(),
            blob_size,
            concurrency,
            operations,
            elapsed,
            ops_per_sec: throughput.ops_per_sec,
            mb_per_sec: throughput.mb_per_sec,
        })
    }
}
