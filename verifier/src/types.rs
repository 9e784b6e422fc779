//! Userspace result types
//!
//! Types produced by one measurement cycle. The kernel-side record layout
//! lives in the `flow-probe-common` crate; everything here is userspace
//! only.

use serde::{Deserialize, Serialize};

/// Totals from draining the flow table once.
///
/// Transient — computed once per run and handed to the verdict and the
/// report.
#[derive(Debug, Default, Clone, Copy)]
pub struct DrainResult {
    /// Records read and deleted during the drain
    pub flows: u64,
    /// Packets across the drained records
    pub packets: u64,
    /// Bytes across the drained records
    pub bytes: u64,
}

/// One run's report, written when `--report` is given.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CaptureReport {
    /// ISO 8601 timestamp when the run finished
    pub timestamp: String,
    /// Filter object the run verified
    pub object: String,
    /// Length of the capture window in seconds
    pub duration_seconds: u64,
    /// Flows drained from the table
    pub flows: u64,
    /// Packets across the drained flows
    pub packets: u64,
    /// Bytes across the drained flows
    pub bytes: u64,
    /// "PASS" or "FAIL"
    pub verdict: String,
}
