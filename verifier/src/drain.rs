//! Flow table drain
//!
//! Cursor-based next-key iteration over the flow table: read the record at
//! the next key, count it, delete the key, advance. Read-then-delete order
//! is the invariant here — an entry is never deleted before its record has
//! been read.

use anyhow::{Context, Result};
use aya::maps::{HashMap, Map, MapData};
use flow_probe_common::{types::RawFlowRecord, FlowRecord};
use log::{debug, warn};

use crate::types::DrainResult;

/// Minimal surface of the kernel flow table.
///
/// How these calls cross into kernel address space is an adapter concern;
/// the drain only ever sees keys and encoded records.
pub trait FlowTable {
    /// Next key strictly after `cursor` in table iteration order, or the
    /// first key when there is no cursor yet. `None` means end of table.
    fn next_key(&mut self, cursor: Option<u64>) -> Result<Option<u64>>;

    /// Read the encoded record stored at `key`.
    fn read(&mut self, key: u64) -> Result<RawFlowRecord>;

    /// Delete the entry at `key`.
    fn delete(&mut self, key: u64) -> Result<()>;
}

/// Drain every record out of the flow table, counting as it goes.
///
/// `next_key` and `read` failures are treated as natural end of table, not
/// errors (the kernel reports end-of-iteration as an error). A failed
/// delete is logged and the cursor still advances past the key, so a record
/// read once is counted exactly once either way. A drain that ends with
/// count 0 is a data point, not a failure; the verdict layer decides what
/// it means.
pub fn drain_flow_table<T: FlowTable>(table: &mut T) -> DrainResult {
    let mut result = DrainResult::default();
    let mut cursor = None;

    loop {
        let key = match table.next_key(cursor) {
            Ok(Some(key)) => key,
            Ok(None) => break,
            Err(err) => {
                debug!("flow table cursor ended: {err:#}");
                break;
            }
        };
        let raw = match table.read(key) {
            Ok(raw) => raw,
            Err(err) => {
                debug!("flow table read ended at {key:#x}: {err:#}");
                break;
            }
        };

        let record = FlowRecord::decode(&raw);
        debug!(
            "flow {:#x}: {} packets / {} bytes (proto {})",
            record.key, record.packets, record.bytes, record.protocol
        );
        result.flows += 1;
        result.packets += record.packets;
        result.bytes += record.bytes;

        // Delete only after the record has been read and counted.
        if let Err(err) = table.delete(key) {
            warn!("failed to delete flow {key:#x}: {err:#}");
        }
        cursor = Some(key);
    }

    result
}

/// Flow table adapter over the kernel map.
pub struct KernelFlowTable<'a> {
    map: HashMap<&'a mut MapData, u64, RawFlowRecord>,
}

impl<'a> KernelFlowTable<'a> {
    /// Wrap the kernel flow table map.
    ///
    /// Fails if the map's key/value sizes do not match the record contract.
    pub fn new(map: &'a mut Map) -> Result<Self> {
        let map = HashMap::try_from(map).context("flow table has unexpected key/value size")?;
        Ok(Self { map })
    }
}

impl FlowTable for KernelFlowTable<'_> {
    fn next_key(&mut self, cursor: Option<u64>) -> Result<Option<u64>> {
        let mut keys = self.map.keys();
        let Some(cursor) = cursor else {
            return Ok(keys.next().transpose()?);
        };
        // Kernel get_next_key semantics: the key following the cursor, or a
        // restart from the head once the cursor entry has been deleted.
        let mut head = None;
        let mut seen_cursor = false;
        for key in keys {
            let key = key?;
            if seen_cursor {
                return Ok(Some(key));
            }
            if head.is_none() {
                head = Some(key);
            }
            if key == cursor {
                seen_cursor = true;
            }
        }
        if seen_cursor {
            Ok(None)
        } else {
            Ok(head)
        }
    }

    fn read(&mut self, key: u64) -> Result<RawFlowRecord> {
        Ok(self.map.get(&key, 0)?)
    }

    fn delete(&mut self, key: u64) -> Result<()> {
        Ok(self.map.remove(&key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::collections::{BTreeMap, HashSet};
    use std::ops::Bound::{Excluded, Unbounded};

    /// In-memory stand-in for the kernel flow table with injectable faults.
    ///
    /// Mirrors the kernel cursor semantics the adapter reproduces: next key
    /// after the cursor while it exists, restart from the head once it has
    /// been deleted.
    #[derive(Default)]
    struct FakeFlowTable {
        entries: BTreeMap<u64, RawFlowRecord>,
        fail_delete: HashSet<u64>,
        fail_read: HashSet<u64>,
        fail_next_on_call: Option<u32>,
        next_calls: u32,
    }

    impl FakeFlowTable {
        fn insert(&mut self, record: FlowRecord) {
            self.entries.insert(record.key, record.encode());
        }
    }

    impl FlowTable for FakeFlowTable {
        fn next_key(&mut self, cursor: Option<u64>) -> Result<Option<u64>> {
            self.next_calls += 1;
            if self.fail_next_on_call == Some(self.next_calls) {
                bail!("simulated cursor fault");
            }
            match cursor {
                None => Ok(self.entries.keys().next().copied()),
                Some(cursor) if self.entries.contains_key(&cursor) => Ok(self
                    .entries
                    .range((Excluded(cursor), Unbounded))
                    .next()
                    .map(|(key, _)| *key)),
                Some(_) => Ok(self.entries.keys().next().copied()),
            }
        }

        fn read(&mut self, key: u64) -> Result<RawFlowRecord> {
            if self.fail_read.contains(&key) {
                bail!("simulated read fault");
            }
            self.entries.get(&key).copied().context("no such flow")
        }

        fn delete(&mut self, key: u64) -> Result<()> {
            if self.fail_delete.contains(&key) {
                bail!("simulated delete fault");
            }
            self.entries.remove(&key).map(|_| ()).context("no such flow")
        }
    }

    fn flow(key: u64, packets: u64, bytes: u64) -> FlowRecord {
        FlowRecord {
            key,
            start_ns: 100,
            last_ns: 200,
            src_addr: [0; 16],
            dst_addr: [0; 16],
            src_port: 0,
            dst_port: 0,
            protocol: 6,
            ip_version: 4,
            _padding: [0; 2],
            packets,
            bytes,
        }
    }

    #[test]
    fn drains_and_deletes_every_entry() {
        let mut table = FakeFlowTable::default();
        table.insert(flow(1, 2, 120));
        table.insert(flow(2, 3, 180));
        table.insert(flow(3, 5, 300));

        let result = drain_flow_table(&mut table);

        assert_eq!(result.flows, 3);
        assert_eq!(result.packets, 10);
        assert_eq!(result.bytes, 600);
        assert!(table.entries.is_empty());
    }

    #[test]
    fn second_drain_finds_nothing() {
        let mut table = FakeFlowTable::default();
        table.insert(flow(7, 1, 60));
        table.insert(flow(8, 1, 60));

        assert_eq!(drain_flow_table(&mut table).flows, 2);
        assert_eq!(drain_flow_table(&mut table).flows, 0);
    }

    #[test]
    fn empty_table_drains_to_zero() {
        let mut table = FakeFlowTable::default();
        let result = drain_flow_table(&mut table);
        assert_eq!(result.flows, 0);
        assert_eq!(result.packets, 0);
        assert_eq!(result.bytes, 0);
    }

    #[test]
    fn entry_is_counted_once_when_its_delete_fails() {
        let mut table = FakeFlowTable::default();
        table.insert(flow(1, 1, 10));
        table.insert(flow(2, 1, 10));
        table.insert(flow(3, 1, 10));
        table.fail_delete.insert(2);

        let result = drain_flow_table(&mut table);

        // Read before delete: the record was read, so it is reported —
        // exactly once, never re-visited, and never silently lost.
        assert_eq!(result.flows, 3);
        assert!(table.entries.contains_key(&2));
        assert_eq!(table.entries.len(), 1);
    }

    #[test]
    fn cursor_fault_ends_the_drain() {
        let mut table = FakeFlowTable::default();
        table.insert(flow(1, 1, 10));
        table.insert(flow(2, 1, 10));
        table.insert(flow(3, 1, 10));
        // first two calls succeed, the third faults
        table.fail_next_on_call = Some(3);

        let result = drain_flow_table(&mut table);

        assert_eq!(result.flows, 2);
        assert_eq!(table.entries.len(), 1);
    }

    #[test]
    fn read_fault_ends_the_drain_without_deleting() {
        let mut table = FakeFlowTable::default();
        table.insert(flow(1, 1, 10));
        table.fail_read.insert(1);

        let result = drain_flow_table(&mut table);

        // Never delete-without-read: the unread entry stays in the table.
        assert_eq!(result.flows, 0);
        assert!(table.entries.contains_key(&1));
    }
}
