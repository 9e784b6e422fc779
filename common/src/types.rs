//! Kernel-native flow record and its byte layout
//!
//! The kernel filter stores one fixed-layout record per flow in the flow
//! table. Field order, sizes, padding, and byte order are a contract, not
//! an implementation detail: the verifier decodes records with an explicit
//! byte-layout reader instead of trusting that two runtimes happen to lay
//! the struct out the same way.

/// Byte offsets of every field inside an encoded [`FlowRecord`].
///
/// All multi-byte fields are little-endian. The two padding bytes at
/// [`layout::PADDING`] keep the counters 8-byte aligned and are always
/// zero on encode.
pub mod layout {
    pub const KEY: usize = 0;
    pub const START_NS: usize = 8;
    pub const LAST_NS: usize = 16;
    pub const SRC_ADDR: usize = 24;
    pub const DST_ADDR: usize = 40;
    pub const SRC_PORT: usize = 56;
    pub const DST_PORT: usize = 58;
    pub const PROTOCOL: usize = 60;
    pub const IP_VERSION: usize = 61;
    pub const PADDING: usize = 62;
    pub const PACKETS: usize = 64;
    pub const BYTES: usize = 72;

    /// Total encoded size of one record.
    pub const SIZE: usize = 80;
}

/// One classified flow as recorded by the kernel filter.
///
/// Addresses are 16 bytes (IPv4 addresses are v4-mapped); ports are in
/// network byte order as captured off the wire.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowRecord {
    /// Flow hash key, identical to the record's key in the flow table
    pub key: u64,
    /// Timestamp of the first packet of the flow (nanoseconds)
    pub start_ns: u64,
    /// Timestamp of the most recent packet of the flow (nanoseconds)
    pub last_ns: u64,
    /// Source address (v4-mapped for IPv4)
    pub src_addr: [u8; 16],
    /// Destination address (v4-mapped for IPv4)
    pub dst_addr: [u8; 16],
    /// Source transport port (network byte order)
    pub src_port: u16,
    /// Destination transport port (network byte order)
    pub dst_port: u16,
    /// Transport protocol number (IPPROTO_*)
    pub protocol: u8,
    /// IP version of the flow (4 or 6)
    pub ip_version: u8,
    /// Padding for alignment
    pub _padding: [u8; 2],
    /// Packets observed on the flow
    pub packets: u64,
    /// Bytes observed on the flow
    pub bytes: u64,
}

// The repr(C) struct and the explicit layout must describe the same record.
const _: () = {
    assert!(core::mem::size_of::<FlowRecord>() == layout::SIZE);
    assert!(core::mem::size_of::<FlowRecord>() % core::mem::align_of::<FlowRecord>() == 0);
};

/// Raw encoded form of one record, as read out of the kernel map.
pub type RawFlowRecord = [u8; layout::SIZE];

impl FlowRecord {
    /// Encoded size of one record; also the flow table's value size.
    pub const SIZE: usize = layout::SIZE;

    /// Decode a record from its kernel-encoded form.
    pub fn decode(buf: &RawFlowRecord) -> Self {
        Self {
            key: read_u64(buf, layout::KEY),
            start_ns: read_u64(buf, layout::START_NS),
            last_ns: read_u64(buf, layout::LAST_NS),
            src_addr: read_addr(buf, layout::SRC_ADDR),
            dst_addr: read_addr(buf, layout::DST_ADDR),
            src_port: read_u16(buf, layout::SRC_PORT),
            dst_port: read_u16(buf, layout::DST_PORT),
            protocol: buf[layout::PROTOCOL],
            ip_version: buf[layout::IP_VERSION],
            _padding: [0; 2],
            packets: read_u64(buf, layout::PACKETS),
            bytes: read_u64(buf, layout::BYTES),
        }
    }

    /// Encode a record into its kernel form (the codec's inverse).
    pub fn encode(&self) -> RawFlowRecord {
        let mut buf = [0u8; layout::SIZE];
        buf[layout::KEY..layout::KEY + 8].copy_from_slice(&self.key.to_le_bytes());
        buf[layout::START_NS..layout::START_NS + 8].copy_from_slice(&self.start_ns.to_le_bytes());
        buf[layout::LAST_NS..layout::LAST_NS + 8].copy_from_slice(&self.last_ns.to_le_bytes());
        buf[layout::SRC_ADDR..layout::SRC_ADDR + 16].copy_from_slice(&self.src_addr);
        buf[layout::DST_ADDR..layout::DST_ADDR + 16].copy_from_slice(&self.dst_addr);
        buf[layout::SRC_PORT..layout::SRC_PORT + 2].copy_from_slice(&self.src_port.to_le_bytes());
        buf[layout::DST_PORT..layout::DST_PORT + 2].copy_from_slice(&self.dst_port.to_le_bytes());
        buf[layout::PROTOCOL] = self.protocol;
        buf[layout::IP_VERSION] = self.ip_version;
        buf[layout::PACKETS..layout::PACKETS + 8].copy_from_slice(&self.packets.to_le_bytes());
        buf[layout::BYTES..layout::BYTES + 8].copy_from_slice(&self.bytes.to_le_bytes());
        buf
    }
}

fn read_u64(buf: &RawFlowRecord, offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn read_u16(buf: &RawFlowRecord, offset: usize) -> u16 {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(&buf[offset..offset + 2]);
    u16::from_le_bytes(bytes)
}

fn read_addr(buf: &RawFlowRecord, offset: usize) -> [u8; 16] {
    let mut addr = [0u8; 16];
    addr.copy_from_slice(&buf[offset..offset + 16]);
    addr
}
