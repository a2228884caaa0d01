//! Interface identifiers.
//!
//! An [`Xid`] is either a kernel ifindex (below [`VLAN_N_VID`]) or a
//! packed pair of VLAN ids naming a sub-interface the kernel never sees.

use std::fmt;

/// Number of VLAN ids; also the threshold between ifindex and packed xids.
pub const VLAN_N_VID: u32 = 4096;

/// Mask applied to a VLAN tag control field to obtain the id.
pub const VLAN_VID_MASK: u16 = 0x0fff;

/// Interface identifier used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Xid(pub u32);

impl Xid {
    /// Compose an xid from an outer and inner VLAN id.
    pub const fn pack(vid: u32, cvid: u32) -> Self {
        Xid(vid.wrapping_add(cvid.wrapping_mul(VLAN_N_VID)))
    }

    /// Split into `(vid, cvid)`.
    pub const fn unpack(self) -> (u32, u32) {
        (self.vid(), self.cvid())
    }

    /// Outer VLAN id, or the ifindex when this is not a packed xid.
    pub const fn vid(self) -> u32 {
        self.0 % VLAN_N_VID
    }

    /// Inner (customer) VLAN id.
    pub const fn cvid(self) -> u32 {
        self.0 / VLAN_N_VID
    }

    /// True when this xid is a plain kernel ifindex.
    pub const fn is_ifindex(self) -> bool {
        self.0 < VLAN_N_VID
    }

    /// The raw value.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for Xid {
    fn from(v: u32) -> Self {
        Xid(v)
    }
}

impl From<Xid> for u32 {
    fn from(x: Xid) -> Self {
        x.0
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ifindex() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "{}.{}", self.vid(), self.cvid())
        }
    }
}
