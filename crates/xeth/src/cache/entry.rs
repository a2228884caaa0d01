//! Per-interface cached state.

use std::fmt;
use std::net::IpAddr;

use super::associates::Associates;
use crate::message::{DevKind, Reason};
use crate::xid::Xid;

/// Kernel `IFF_UP`.
pub const IFF_UP: u32 = libc::IFF_UP as u32;

/// Ethernet hardware address.
pub type HardwareAddr = [u8; 6];

/// Network namespace id as reported by the driver; zero is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetNs(pub u64);

impl NetNs {
    pub const DEFAULT: NetNs = NetNs(0);

    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

impl fmt::Display for NetNs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// An IP address with its prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IpNetwork {
    pub addr: IpAddr,
    pub prefix_len: u8,
}

impl IpNetwork {
    /// A network from an address and prefix length.
    pub fn new(addr: IpAddr, prefix_len: u8) -> Self {
        Self { addr, prefix_len }
    }

    /// Build from an address and a dotted netmask.
    pub fn from_mask(addr: IpAddr, mask: [u8; 4]) -> Self {
        Self {
            addr,
            prefix_len: u32::from_be_bytes(mask).leading_ones() as u8,
        }
    }

    pub fn is_ipv4(&self) -> bool {
        self.addr.is_ipv4()
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

/// Ethtool link settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EthtoolSettings {
    /// Speed in Mb/s.
    pub speed: u32,
    pub duplex: u8,
    pub port: u8,
    pub phy_address: u8,
    pub autoneg: u8,
    pub mdio_support: u8,
    pub eth_tp_mdix: u8,
    pub eth_tp_mdix_ctrl: u8,
}

/// Which ethtool link mode bitmap a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LinkModeSet {
    Supported,
    Advertising,
    LpAdvertising,
}

/// Ethtool link mode bitmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LinkModes {
    pub supported: u64,
    pub advertising: u64,
    pub lp_advertising: u64,
}

impl LinkModes {
    /// Replace one of the three mode masks.
    pub fn set(&mut self, which: LinkModeSet, modes: u64) {
        match which {
            LinkModeSet::Supported => self.supported = modes,
            LinkModeSet::Advertising => self.advertising = modes,
            LinkModeSet::LpAdvertising => self.lp_advertising = modes,
        }
    }
}

/// What the host reports for an interface outside the driver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemInterface {
    pub ifindex: i32,
    pub name: String,
    pub addr: HardwareAddr,
    pub flags: u32,
}

/// Cached state of one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InterfaceEntry {
    pub xid: Xid,
    /// Kernel ifindex, zero when the device is not registered.
    pub ifindex: i32,
    pub name: String,
    /// Parent ifindex.
    pub link: Option<i32>,
    pub netns: NetNs,
    pub addr: HardwareAddr,
    /// Kernel `IFF_*` flags.
    pub flags: u32,
    pub kind: DevKind,
    /// Why the entry was last updated.
    pub reason: Reason,
    /// Front-panel port, negative when not a port.
    pub port: i16,
    pub subport: i16,
    pub id: u16,
    pub features: u64,
    pub ipnets: Vec<IpNetwork>,
    pub ethtool_flags: u32,
    pub ethtool_settings: EthtoolSettings,
    pub link_modes: LinkModes,
    /// Last carrier state successfully sent to the driver.
    pub carrier: Option<bool>,
    pub uppers: Associates,
    pub lowers: Associates,
}

impl InterfaceEntry {
    /// A blank entry for `xid`.
    pub fn new(xid: Xid) -> Self {
        Self {
            xid,
            ifindex: 0,
            name: String::new(),
            link: None,
            netns: NetNs::DEFAULT,
            addr: [0; 6],
            flags: 0,
            kind: DevKind::Unspec,
            reason: Reason::New,
            port: -1,
            subport: -1,
            id: 0,
            features: 0,
            ipnets: Vec::new(),
            ethtool_flags: 0,
            ethtool_settings: EthtoolSettings::default(),
            link_modes: LinkModes::default(),
            carrier: None,
            uppers: Associates::new(),
            lowers: Associates::new(),
        }
    }

    /// Seed an entry from a host snapshot.
    pub fn from_system(xid: Xid, sys: &SystemInterface) -> Self {
        let mut entry = Self::new(xid);
        entry.ifindex = sys.ifindex;
        entry.name = sys.name.clone();
        entry.addr = sys.addr;
        entry.flags = sys.flags;
        entry
    }

    /// Whether `IFF_UP` is set.
    pub fn is_up(&self) -> bool {
        self.flags & IFF_UP != 0
    }

    /// True for physical front-panel ports, the only name-indexed kind.
    pub fn is_port(&self) -> bool {
        self.kind == DevKind::Port
    }
}

impl fmt::Display for InterfaceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.xid, self.name)?;
        if let Some(link) = self.link {
            write!(f, "@{}", link)?;
        }
        write!(f, ": <{:#x}> reason {:?}", self.flags, self.reason)?;
        if self.port >= 0 {
            write!(f, " port {}", self.port)?;
        }
        if self.subport >= 0 {
            write!(f, " subport {}", self.subport)?;
        }
        if !self.netns.is_default() {
            write!(f, " netns {}", self.netns)?;
        }
        if !self.uppers.is_empty() {
            write!(f, " uppers [{}]", self.uppers)?;
        }
        if !self.lowers.is_empty() {
            write!(f, " lowers [{}]", self.lowers)?;
        }
        for net in &self.ipnets {
            write!(f, " {}", net)?;
        }
        Ok(())
    }
}
