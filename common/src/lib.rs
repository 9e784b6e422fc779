//! Wire contract shared between the kernel flow filter and its verifier
//!
//! This crate pins down everything the userspace verifier and the
//! pre-compiled kernel object must agree on: the flow-record byte layout,
//! the names of the maps and programs inside the object, and the default
//! capture window.

#![no_std]

pub mod constants;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use types::FlowRecord;
