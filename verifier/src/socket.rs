//! Raw capture socket
//!
//! An AF_PACKET socket left unbound so the kernel delivers every link-layer
//! packet from every interface to it — the surface the attached filter
//! observes during the capture window.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use anyhow::{Context, Result};

/// EtherType matching all link-layer protocols.
const ETH_P_ALL: u16 = 0x0003;

// The protocol argument of socket(2) is in network byte order.
#[cfg(target_endian = "little")]
const _: () = assert!(ETH_P_ALL.to_be() == 0x0300);

/// Raw capture socket, all interfaces, all packet types.
///
/// Owns one OS descriptor; OwnedFd closes it exactly once on drop.
pub struct RawCaptureSocket {
    fd: OwnedFd,
}

impl RawCaptureSocket {
    /// Open the capture socket. Requires CAP_NET_RAW.
    pub fn open() -> Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                ETH_P_ALL.to_be() as libc::c_int,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error())
                .context("socket(AF_PACKET, SOCK_RAW) failed");
        }

        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }
}

impl AsRawFd for RawCaptureSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
