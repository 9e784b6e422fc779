//! Timed capture window
//!
//! While the verifier sleeps, the attached filter runs in the kernel and
//! fills the flow table. Nothing here touches shared state.

use std::thread;
use std::time::Duration;

/// Block the calling thread for the whole capture window.
///
/// Deliberately a plain blocking wait: no cancellation, no polling, no
/// early exit. The measurement is one fixed, unconditional window.
pub fn run_for(window: Duration) {
    println!("listen traffic for {}sec ...", window.as_secs());
    thread::sleep(window);
}
