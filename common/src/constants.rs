//! Shared constants for the flow filter object
//!
//! These names and values are part of the contract with the pre-compiled
//! kernel object; the verifier resolves maps and programs by these names.

// ============================================================================
// Map names
// ============================================================================

/// Hash map populated by the filter with one record per observed flow.
pub const FLOW_TABLE_MAP: &str = "flow_table";

/// Program-array map used for tail-call dispatch between filter programs.
pub const DISPATCH_MAP: &str = "jmp_map";

// ============================================================================
// Program names
// ============================================================================

/// Entry-point socket filter attached to the capture socket.
pub const FLOW_FILTER_PROGRAM: &str = "socket_flow_table";

/// Ordered tail-call targets written into the dispatch map.
///
/// Entry i is written at dispatch index i. Only encapsulation variants of
/// the filter object define these programs.
pub const DISPATCH_PROGRAMS: &[&str] = &["socket_network_layer"];

// ============================================================================
// Capture defaults
// ============================================================================

/// Default length of the capture window in seconds.
pub const DEFAULT_CAPTURE_SECS: u64 = 2;
