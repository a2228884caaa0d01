//! Typed events decoded from the driver.

use std::net::IpAddr;

use super::kind::{DevKind, FibEvent, Reason};
use crate::cache::{EthtoolSettings, HardwareAddr, IpNetwork, LinkModeSet, NetNs};
use crate::frame::Frame;
use crate::xid::Xid;

/// Decoded interface info record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InterfaceInfo {
    pub xid: Xid,
    pub ifindex: i32,
    pub name: String,
    pub link: Option<i32>,
    pub netns: NetNs,
    pub addr: HardwareAddr,
    pub flags: u32,
    pub kind: DevKind,
    pub reason: Reason,
    pub features: u64,
    pub port: i16,
    pub subport: i16,
    pub id: u16,
}

/// A route next hop.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NextHop {
    pub xid: Xid,
    pub weight: i32,
    pub flags: u32,
    pub gateway: IpAddr,
    /// IPv4 only; zero for IPv6 routes.
    pub scope: u8,
}

/// An IPv4 or IPv6 route.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FibEntry {
    pub netns: NetNs,
    pub dst: IpNetwork,
    pub event: FibEvent,
    pub table: u32,
    pub tos: u8,
    pub rtn_type: u8,
    pub next_hops: Vec<NextHop>,
}

/// A neighbor table update.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Neighbor {
    pub netns: NetNs,
    pub xid: Xid,
    pub dst: IpAddr,
    /// All zero when the neighbor is unresolved.
    pub lladdr: HardwareAddr,
}

/// Events delivered to the session consumer.
///
/// For every interface-affecting event the cache already reflects the
/// change by the time the event is seen.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Event {
    /// End of a dump.
    Break,
    DevNew(InterfaceInfo),
    DevDel(Xid),
    DevUp(Xid),
    DevDown(Xid),
    DevDump(InterfaceInfo),
    DevReg {
        xid: Xid,
        netns: NetNs,
        ifindex: i32,
    },
    DevUnreg {
        xid: Xid,
        ifindex: i32,
    },
    DevFeatures {
        xid: Xid,
        features: u64,
    },
    AddrAdd {
        xid: Xid,
        net: IpNetwork,
    },
    AddrDel {
        xid: Xid,
        net: IpNetwork,
    },
    /// `lower` joined `upper`.
    Join {
        lower: Xid,
        upper: Xid,
    },
    /// `lower` left `upper`.
    Quit {
        lower: Xid,
        upper: Xid,
    },
    EthtoolFlags {
        xid: Xid,
        flags: u32,
    },
    EthtoolSettings {
        xid: Xid,
        settings: EthtoolSettings,
    },
    LinkModesSupported {
        xid: Xid,
        modes: u64,
    },
    LinkModesAdvertising {
        xid: Xid,
        modes: u64,
    },
    LinkModesLpAdvertising {
        xid: Xid,
        modes: u64,
    },
    FibEntry(FibEntry),
    Neighbor(Neighbor),
    NetNsAdd(NetNs),
    NetNsDel(NetNs),
    /// A mirrored data frame, still holding its buffer.
    #[cfg_attr(feature = "serde", serde(skip))]
    Frame(Frame),
}

impl Event {
    /// The interface this event is about, if any.
    pub fn xid(&self) -> Option<Xid> {
        match self {
            Self::DevNew(info) | Self::DevDump(info) => Some(info.xid),
            Self::DevDel(xid) | Self::DevUp(xid) | Self::DevDown(xid) => Some(*xid),
            Self::DevReg { xid, .. }
            | Self::DevUnreg { xid, .. }
            | Self::DevFeatures { xid, .. }
            | Self::AddrAdd { xid, .. }
            | Self::AddrDel { xid, .. }
            | Self::EthtoolFlags { xid, .. }
            | Self::EthtoolSettings { xid, .. }
            | Self::LinkModesSupported { xid, .. }
            | Self::LinkModesAdvertising { xid, .. }
            | Self::LinkModesLpAdvertising { xid, .. } => Some(*xid),
            Self::Join { lower, .. } | Self::Quit { lower, .. } => Some(*lower),
            Self::Neighbor(n) => Some(n.xid),
            Self::Frame(f) => Some(f.xid()),
            Self::Break | Self::FibEntry(_) | Self::NetNsAdd(_) | Self::NetNsDel(_) => None,
        }
    }

    pub fn is_break(&self) -> bool {
        matches!(self, Self::Break)
    }

    pub(crate) fn link_modes(which: LinkModeSet, xid: Xid, modes: u64) -> Self {
        match which {
            LinkModeSet::Supported => Self::LinkModesSupported { xid, modes },
            LinkModeSet::Advertising => Self::LinkModesAdvertising { xid, modes },
            LinkModeSet::LpAdvertising => Self::LinkModesLpAdvertising { xid, modes },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;

    #[test]
    fn test_event_xid() {
        assert_eq!(Event::DevUp(Xid(3)).xid(), Some(Xid(3)));
        assert_eq!(
            Event::Join {
                lower: Xid(1),
                upper: Xid(2)
            }
            .xid(),
            Some(Xid(1))
        );
        assert_eq!(Event::Break.xid(), None);
        assert!(Event::Break.is_break());
        let f = Frame::new(BufferPool::clone_from_slice(&[1u8; 14]));
        assert_eq!(Event::Frame(f).xid(), Some(Xid(0)));
    }
}
