//! Harness error taxonomy.
//!
//! Three conditions matter to the driver: a server that never became
//! reachable (fatal to that implementation's pass, with the child's captured
//! output attached for postmortem), a storage operation that failed inside a
//! batch (aborts the batch and propagates), and an interrupt delivered while
//! a pass was running. Benign conditions — a container-creation race, a
//! not-found that a check asserts for — are classified by the helpers in
//! [`crate::client`] and never become variants here.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to the benchmark driver.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The server-under-test did not accept a TCP connection within the
    /// readiness timeout. Carries everything the child wrote to its standard
    /// streams so the failure can be diagnosed after the process is gone.
    #[error("{label} did not become ready on port {port} within {timeout:?}")]
    Startup {
        label: String,
        port: u16,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    /// An individual read/write/list/delete call failed. The containing
    /// batch is aborted and no partial result is recorded.
    #[error("storage operation failed: {0}")]
    Operation(#[from] azure_core::error::Error),

    /// The run was interrupted (Ctrl-C) while a pass was in flight.
    #[error("benchmark run interrupted")]
    Interrupted,

    /// A batch finished with zero elapsed time. Wall-clock time cannot be
    /// zero for a real batch, so this is a harness bug, not a measurement.
    #[error("batch of {op_count} operations reported zero elapsed time")]
    ZeroElapsed { op_count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_display_names_the_implementation() {
        let err = HarnessError::Startup {
            label: "azurite-rs".to_string(),
            port: 10123,
            timeout: Duration::from_secs(30),
            stdout: String::new(),
            stderr: String::new(),
        };
        let msg = err.to_string();
        assert!(msg.contains("azurite-rs"));
        assert!(msg.contains("10123"));
    }
}
