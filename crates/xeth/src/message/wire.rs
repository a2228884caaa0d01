//! Fixed wire layouts of control messages.
//!
//! Every message starts with a 16-byte [`Header`]: fourteen zero bytes
//! (where a mirrored frame would carry its hardware addresses), the
//! protocol version and the kind. Multi-byte fields are big-endian.

use zerocopy::byteorder::network_endian::{I16, I32, U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::kind::{Kind, MSG_VERSION};
use crate::error::{Error, Result};

/// Length of the zero prefix shared with an Ethernet address pair.
pub const ZERO_PREFIX_LEN: usize = 14;

/// Maximum interface name length, including the terminator.
pub const IFNAMSIZ: usize = 16;

macro_rules! wire_struct {
    ($(#[$m:meta])* $name:ident { $($(#[$fm:meta])* $field:ident : $ty:ty),* $(,)? }) => {
        $(#[$m])*
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
        pub struct $name {
            $($(#[$fm])* pub $field: $ty,)*
        }

        impl $name {
            /// Size of this structure on the wire.
            pub const SIZE: usize = std::mem::size_of::<Self>();
        }
    };
}

wire_struct!(
    /// Common control message header.
    Header {
        zero: [u8; ZERO_PREFIX_LEN],
        version: u8,
        kind: u8,
    }
);

impl Header {
    /// Header for an outbound message of `kind`.
    pub fn new(kind: Kind) -> Self {
        Self {
            zero: [0; ZERO_PREFIX_LEN],
            version: MSG_VERSION,
            kind: kind as u8,
        }
    }
}

wire_struct!(
    /// Carrier change request.
    Carrier {
        header: Header,
        xid: U32,
        flag: u8,
        pad: [u8; 3],
    }
);

wire_struct!(
    /// Link or ethtool stat update request.
    Stat {
        header: Header,
        xid: U32,
        index: U32,
        count: U64,
    }
);

wire_struct!(
    /// Link speed request.
    Speed {
        header: Header,
        xid: U32,
        mbps: U32,
    }
);

wire_struct!(
    /// Ethtool private flags.
    EthtoolFlags {
        header: Header,
        xid: U32,
        flags: U32,
    }
);

wire_struct!(
    /// Ethtool link settings.
    EthtoolSettings {
        header: Header,
        xid: U32,
        speed: U32,
        duplex: u8,
        port: u8,
        phy_address: u8,
        autoneg: u8,
        mdio_support: u8,
        eth_tp_mdix: u8,
        eth_tp_mdix_ctrl: u8,
        pad: u8,
    }
);

wire_struct!(
    /// Ethtool link mode bitmap (supported, advertising or partner).
    LinkModes {
        header: Header,
        xid: U32,
        pad: U32,
        modes: U64,
    }
);

wire_struct!(
    /// Interface info.
    IfInfo {
        header: Header,
        ifname: [u8; IFNAMSIZ],
        net: U64,
        ifindex: I32,
        xid: U32,
        iflinkindex: I32,
        flags: U32,
        addr: [u8; 6],
        kind: u8,
        reason: u8,
        features: U64,
        port: I16,
        subport: I16,
        id: U16,
        pad: [u8; 2],
    }
);

wire_struct!(
    /// IPv4 address add or delete.
    Ifa {
        header: Header,
        xid: U32,
        event: U32,
        address: [u8; 4],
        mask: [u8; 4],
    }
);

wire_struct!(
    /// IPv6 address add or delete.
    Ifa6 {
        header: Header,
        xid: U32,
        event: U32,
        address: [u8; 16],
        length: u8,
        pad: [u8; 7],
    }
);

wire_struct!(
    /// IPv4 route, followed by `nhs` [`NextHop`] records.
    FibEntry {
        header: Header,
        net: U64,
        address: [u8; 4],
        mask: [u8; 4],
        event: u8,
        nhs: u8,
        tos: u8,
        rtn_type: u8,
        table: U32,
    }
);

wire_struct!(
    NextHop {
        xid: U32,
        weight: I32,
        flags: U32,
        gw: [u8; 4],
        scope: u8,
        pad: [u8; 7],
    }
);

wire_struct!(
    /// IPv6 route, followed by `1 + nsiblings` [`NextHop6`] records.
    Fib6Entry {
        header: Header,
        net: U64,
        address: [u8; 16],
        length: u8,
        event: u8,
        nsiblings: u8,
        rtn_type: u8,
        table: U32,
    }
);

wire_struct!(
    NextHop6 {
        xid: U32,
        weight: I32,
        flags: U32,
        reserved: U32,
        gw: [u8; 16],
    }
);

wire_struct!(
    /// Neighbor update.
    NeighUpdate {
        header: Header,
        net: U64,
        xid: U32,
        family: u8,
        len: u8,
        reserved: U16,
        dst: [u8; 16],
        lladdr: [u8; 6],
        pad: [u8; 2],
    }
);

wire_struct!(
    /// Upper device link or unlink.
    ChangeUpperXid {
        header: Header,
        upper: U32,
        lower: U32,
        linking: u8,
        pad: [u8; 7],
    }
);

wire_struct!(
    /// Network namespace add or delete.
    NetNs {
        header: Header,
        net: U64,
    }
);

/// Borrow a fixed layout from the front of `b`.
pub fn parse<'a, T>(kind: Kind, b: &'a [u8]) -> Result<&'a T>
where
    T: FromBytes + Immutable + KnownLayout,
{
    T::ref_from_prefix(b)
        .map(|(r, _)| r)
        .map_err(|_| Error::truncated(kind.name(), std::mem::size_of::<T>(), b.len()))
}

/// Borrow `n` trailing records of `T` starting at `off`.
pub fn parse_tail<'a, T>(kind: Kind, b: &'a [u8], off: usize, n: usize) -> Result<&'a [T]>
where
    T: FromBytes + Immutable + KnownLayout,
{
    let expected = off + n * std::mem::size_of::<T>();
    let rest = b
        .get(off..)
        .ok_or_else(|| Error::truncated(kind.name(), expected, b.len()))?;
    <[T]>::ref_from_prefix_with_elems(rest, n)
        .map(|(r, _)| r)
        .map_err(|_| Error::truncated(kind.name(), expected, b.len()))
}

/// Minimum length of a message of `kind`, given its fixed part.
///
/// Route messages also account for their declared next-hop tails.
pub fn min_len(kind: Kind, b: &[u8]) -> usize {
    match kind {
        Kind::Break | Kind::DumpIfInfo | Kind::DumpFibInfo => Header::SIZE,
        Kind::LinkStat | Kind::EthtoolStat => Stat::SIZE,
        Kind::Carrier => Carrier::SIZE,
        Kind::Speed => Speed::SIZE,
        Kind::EthtoolFlags => EthtoolFlags::SIZE,
        Kind::EthtoolSettings => EthtoolSettings::SIZE,
        Kind::EthtoolLinkModesSupported
        | Kind::EthtoolLinkModesAdvertising
        | Kind::EthtoolLinkModesLpAdvertising => LinkModes::SIZE,
        Kind::IfInfo => IfInfo::SIZE,
        Kind::Ifa => Ifa::SIZE,
        Kind::Ifa6 => Ifa6::SIZE,
        Kind::FibEntry => match FibEntry::ref_from_prefix(b) {
            Ok((m, _)) => FibEntry::SIZE + usize::from(m.nhs) * NextHop::SIZE,
            Err(_) => FibEntry::SIZE,
        },
        Kind::Fib6Entry => match Fib6Entry::ref_from_prefix(b) {
            Ok((m, _)) => Fib6Entry::SIZE + (1 + usize::from(m.nsiblings)) * NextHop6::SIZE,
            Err(_) => Fib6Entry::SIZE,
        },
        Kind::NeighUpdate => NeighUpdate::SIZE,
        Kind::ChangeUpperXid => ChangeUpperXid::SIZE,
        Kind::NetNsAdd | Kind::NetNsDel => NetNs::SIZE,
    }
}
