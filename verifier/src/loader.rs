//! Filter object loader
//!
//! Loads the pre-compiled filter object into the kernel and owns every
//! kernel resource it creates: programs, maps, and the dispatch-table
//! handle. Dropping the loader releases all of them.

use anyhow::{Context, Result};
use aya::{
    maps::{MapData, ProgramArray},
    programs::{socket_filter::SocketFilterLinkId, SocketFilter},
    Bpf,
};
use flow_probe_common::{DISPATCH_MAP, DISPATCH_PROGRAMS, FLOW_FILTER_PROGRAM, FLOW_TABLE_MAP};
use log::{debug, info};
use std::os::fd::{BorrowedFd, RawFd};

use crate::drain::KernelFlowTable;

/// Loaded filter object and its kernel resources.
///
/// Loading is atomic: either every program and map the object defines is
/// resident in the kernel, or the load failed and nothing is.
pub struct FilterLoader {
    bpf: Bpf,
    // The kernel flushes program-array entries when the last userspace
    // reference to the map drops; the handle has to outlive the capture
    // window.
    _dispatch: Option<ProgramArray<MapData>>,
}

impl FilterLoader {
    /// Load every program and map the object defines into the kernel.
    ///
    /// # Arguments
    ///
    /// * `data` - Raw bytes of the compiled filter object
    ///
    /// # Returns
    ///
    /// FilterLoader owning the kernel-resident object
    pub fn load(data: &[u8]) -> Result<Self> {
        info!("Loading filter object ({} bytes)...", data.len());

        let bpf = Bpf::load(data).with_context(|| {
            format!(
                "unable to load filter object (host {})",
                std::env::consts::ARCH
            )
        })?;

        info!("Filter object loaded");

        Ok(Self {
            bpf,
            _dispatch: None,
        })
    }

    /// Populate the tail-call dispatch table.
    ///
    /// Writes `(index, program)` for every entry of the configured dispatch
    /// list, in list order, and touches nothing else in the map. Must
    /// complete fully before the filter is attached; a partially populated
    /// table is never used.
    pub fn init_dispatch_table(&mut self) -> Result<()> {
        let map = self
            .bpf
            .take_map(DISPATCH_MAP)
            .with_context(|| format!("map {DISPATCH_MAP} not found"))?;
        let mut dispatch =
            ProgramArray::try_from(map).context("dispatch map has unexpected type")?;

        for (index, name) in DISPATCH_PROGRAMS.iter().copied().enumerate() {
            let program: &mut SocketFilter = self
                .bpf
                .program_mut(name)
                .with_context(|| format!("program {name} not found"))?
                .try_into()
                .with_context(|| format!("program {name} is not a socket filter"))?;
            program
                .load()
                .with_context(|| format!("failed to load {name}"))?;
            let fd = program
                .fd()
                .with_context(|| format!("no kernel fd for {name}"))?;
            dispatch
                .set(index as u32, fd, 0)
                .with_context(|| format!("failed to write dispatch entry {index}"))?;
            info!("  ✓ dispatch[{index}] -> {name}");
        }

        self._dispatch = Some(dispatch);
        Ok(())
    }

    /// Attach the flow filter to a capture socket.
    ///
    /// # Arguments
    ///
    /// * `socket` - Descriptor of the raw capture socket
    ///
    /// # Returns
    ///
    /// Link id to pass back to [`detach`](Self::detach)
    pub fn attach(&mut self, socket: RawFd) -> Result<SocketFilterLinkId> {
        let program = self.flow_filter()?;
        program
            .load()
            .with_context(|| format!("failed to load {FLOW_FILTER_PROGRAM}"))?;
        // SAFETY: `socket` is a valid raw descriptor owned by the caller for
        // the duration of this call; the borrow does not outlive it.
        let borrowed = unsafe { BorrowedFd::borrow_raw(socket) };
        let link = program
            .attach(borrowed)
            .context("kernel rejected socket filter attachment")?;
        info!("  ✓ Attached {FLOW_FILTER_PROGRAM} to capture socket");
        Ok(link)
    }

    /// Detach a previously attached flow filter.
    ///
    /// Attempted exactly once per successful attach, after the capture
    /// window and the drain, whatever the drain's outcome was.
    pub fn detach(&mut self, link: SocketFilterLinkId) -> Result<()> {
        let program = self.flow_filter()?;
        program
            .detach(link)
            .context("failed to detach socket filter")?;
        debug!("Detached {FLOW_FILTER_PROGRAM}");
        Ok(())
    }

    /// Drain view of the flow table.
    pub fn flow_table(&mut self) -> Result<KernelFlowTable<'_>> {
        let map = self
            .bpf
            .map_mut(FLOW_TABLE_MAP)
            .with_context(|| format!("map {FLOW_TABLE_MAP} not found"))?;
        KernelFlowTable::new(map)
    }

    fn flow_filter(&mut self) -> Result<&mut SocketFilter> {
        self.bpf
            .program_mut(FLOW_FILTER_PROGRAM)
            .with_context(|| format!("program {FLOW_FILTER_PROGRAM} not found"))?
            .try_into()
            .with_context(|| format!("program {FLOW_FILTER_PROGRAM} is not a socket filter"))
    }
}
