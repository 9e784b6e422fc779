//! Flow Filter Verifier Library
//!
//! Reusable components of the verification harness: the filter loader, the
//! raw capture socket, the timed window, the flow table drain, the verdict,
//! and the run report.

pub mod drain;
pub mod loader;
pub mod report;
pub mod socket;
pub mod types;
pub mod verdict;
pub mod window;

pub use drain::{drain_flow_table, FlowTable, KernelFlowTable};
pub use loader::FilterLoader;
pub use report::JsonReportWriter;
pub use socket::RawCaptureSocket;
pub use types::{CaptureReport, DrainResult};
pub use verdict::Verdict;
