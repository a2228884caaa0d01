//! Raw Ethernet frames mirrored by the driver.
//!
//! Sub-interfaces are identified inside a frame by its VLAN tags: a
//! single 802.1Q tag carries the xid directly, an 802.1ad pair carries
//! the outer and inner VLAN ids that [`Xid::pack`] composes.

use std::fmt;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::xid::{VLAN_VID_MASK, Xid};

/// Length of a hardware address.
pub const ETH_ALEN: usize = 6;

/// Offset of the EtherType (or first TPID).
pub const ETH_P: usize = 2 * ETH_ALEN;
/// Offset of the outer tag control information.
pub const ETH_VLAN_TCI: usize = ETH_P + 2;
/// Offset of the type following the outer tag.
pub const ETH_VLAN_P: usize = ETH_VLAN_TCI + 2;
/// Offset of the inner tag control information.
pub const ETH_C_VLAN_TCI: usize = ETH_VLAN_P + 2;
/// Offset of the type following the inner tag.
pub const ETH_C_VLAN_P: usize = ETH_C_VLAN_TCI + 2;

/// Priority bits of a VLAN tag control field.
pub const VLAN_PRIO_MASK: u16 = 0xe000;

/// An EtherType value in host order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EthType(pub u16);

impl EthType {
    pub const ETH_P_802_3: EthType = EthType(0x0001);
    pub const ETH_P_ALL: EthType = EthType(0x0003);
    pub const ETH_P_IP: EthType = EthType(0x0800);
    pub const ETH_P_ARP: EthType = EthType(0x0806);
    pub const ETH_P_8021Q: EthType = EthType(0x8100);
    pub const ETH_P_IPV6: EthType = EthType(0x86dd);
    pub const ETH_P_8021AD: EthType = EthType(0x88a8);
    pub const ETH_P_LLDP: EthType = EthType(0x88cc);

    /// Smallest value that is a type rather than an 802.3 length.
    pub const MIN_TYPE: u16 = 0x0200;
}

impl fmt::Display for EthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

fn be16(b: &[u8], off: usize) -> Option<u16> {
    b.get(off..off + 2).map(|s| u16::from_be_bytes([s[0], s[1]]))
}

/// The sub-interface id encoded in a frame's VLAN tags.
///
/// Untagged or truncated frames yield `Xid(0)`.
pub fn extract_xid(frame: &[u8]) -> Xid {
    match be16(frame, ETH_P).map(EthType) {
        Some(EthType::ETH_P_8021AD) => {
            match (be16(frame, ETH_VLAN_TCI), be16(frame, ETH_C_VLAN_TCI)) {
                (Some(outer), Some(inner)) => Xid::pack(
                    u32::from(outer & VLAN_VID_MASK),
                    u32::from(inner & VLAN_VID_MASK),
                ),
                _ => Xid(0),
            }
        }
        Some(EthType::ETH_P_8021Q) => be16(frame, ETH_VLAN_TCI)
            .map(|tci| Xid(u32::from(tci & VLAN_VID_MASK)))
            .unwrap_or_default(),
        _ => Xid(0),
    }
}

/// Write `xid` into the outer tag control field.
///
/// Only a single tag is written; a double-tagged frame keeps its inner tag.
pub fn set_xid(frame: &mut [u8], xid: Xid) -> Result<()> {
    let len = frame.len();
    let tci = frame
        .get_mut(ETH_VLAN_TCI..ETH_VLAN_TCI + 2)
        .ok_or_else(|| Error::truncated("frame", ETH_VLAN_TCI + 2, len))?;
    tci.copy_from_slice(&(xid.get() as u16).to_be_bytes());
    Ok(())
}

/// The payload type after walking any VLAN tags.
///
/// Length-typed frames (below 0x0200) report [`EthType::ETH_P_802_3`].
pub fn eth_type(frame: &[u8]) -> EthType {
    let outer = be16(frame, ETH_P);
    let p = match outer.map(EthType) {
        Some(EthType::ETH_P_8021AD) => be16(frame, ETH_C_VLAN_P),
        Some(EthType::ETH_P_8021Q) => be16(frame, ETH_VLAN_P),
        _ => outer,
    };
    match p {
        Some(p) if p >= EthType::MIN_TYPE => EthType(p),
        _ => EthType::ETH_P_802_3,
    }
}

/// Set the priority bits of the outer tag so the driver hands the frame
/// to the upper device rather than its port.
pub(crate) fn mark_exception(frame: &mut [u8]) -> Result<()> {
    let b = frame
        .get_mut(ETH_VLAN_TCI)
        .ok_or_else(|| Error::malformed("frame", "no VLAN tag to mark"))?;
    *b |= (VLAN_PRIO_MASK >> 8) as u8;
    Ok(())
}

/// A raw frame received on the driver's link.
pub struct Frame {
    buf: Buffer,
}

impl Frame {
    pub(crate) fn new(buf: Buffer) -> Self {
        Self { buf }
    }

    /// Destination hardware address.
    pub fn dst(&self) -> Option<[u8; ETH_ALEN]> {
        self.buf.get(..ETH_ALEN)?.try_into().ok()
    }

    /// Source hardware address.
    pub fn src(&self) -> Option<[u8; ETH_ALEN]> {
        self.buf.get(ETH_ALEN..2 * ETH_ALEN)?.try_into().ok()
    }

    /// Interface the frame belongs to, from its VLAN tags.
    pub fn xid(&self) -> Xid {
        extract_xid(&self.buf)
    }

    /// Retag the frame for `xid`.
    pub fn set_xid(&mut self, xid: Xid) -> Result<()> {
        set_xid(&mut self.buf, xid)
    }

    /// Ethertype after any VLAN tags.
    pub fn eth_type(&self) -> EthType {
        eth_type(&self.buf)
    }

    /// Frame bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable frame bytes.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Take the underlying buffer back.
    pub fn into_buffer(self) -> Buffer {
        self.buf
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.buf.len())
            .field("xid", &self.xid())
            .field("eth_type", &self.eth_type())
            .finish()
    }
}
