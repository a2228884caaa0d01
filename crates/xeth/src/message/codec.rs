//! Classify, validate, decode and encode control messages.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use tracing::{debug, trace};
use zerocopy::IntoBytes;
use zerocopy::byteorder::network_endian::{U32, U64};

use super::event::{Event, FibEntry, InterfaceInfo, Neighbor, NextHop};
use super::kind::{CARRIER_OFF, CARRIER_ON, DevKind, IFA_ADD, Kind, MSG_VERSION, Reason};
use super::wire::{self, Header, ZERO_PREFIX_LEN};
use crate::buffer::{Buffer, BufferPool};
use crate::cache::{
    EthtoolSettings, InterfaceCache, IpNetwork, LinkModeSet, NetNs, Resolution, Update,
};
use crate::counters::Counters;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::transport::Priority;
use crate::xid::Xid;

/// Outbound requests a caller can originate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    DumpIfInfo,
    DumpFibInfo,
    Carrier { xid: Xid, on: bool },
    LinkStat { xid: Xid, index: u32, count: u64 },
    EthtoolStat { xid: Xid, index: u32, count: u64 },
    Speed { xid: Xid, mbps: u32 },
}

impl Request {
    /// Wire kind this request encodes to.
    pub fn kind(&self) -> Kind {
        match self {
            Self::DumpIfInfo => Kind::DumpIfInfo,
            Self::DumpFibInfo => Kind::DumpFibInfo,
            Self::Carrier { .. } => Kind::Carrier,
            Self::LinkStat { .. } => Kind::LinkStat,
            Self::EthtoolStat { .. } => Kind::EthtoolStat,
            Self::Speed { .. } => Kind::Speed,
        }
    }

    /// Stats may be shed under load; everything else must be delivered.
    pub fn priority(&self) -> Priority {
        match self {
            Self::LinkStat { .. } | Self::EthtoolStat { .. } => Priority::Low,
            _ => Priority::High,
        }
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::DumpIfInfo | Self::DumpFibInfo => Header::SIZE,
            Self::Carrier { .. } => wire::Carrier::SIZE,
            Self::LinkStat { .. } | Self::EthtoolStat { .. } => wire::Stat::SIZE,
            Self::Speed { .. } => wire::Speed::SIZE,
        }
    }
}

/// True when `b` is a mirrored Ethernet frame rather than a control message.
pub fn is_frame(b: &[u8]) -> bool {
    b.iter().take(ZERO_PREFIX_LEN).any(|&x| x != 0)
}

/// The kind byte of a control message.
pub fn classify(b: &[u8]) -> Result<Kind> {
    let h = wire::parse::<Header>(Kind::Break, b)
        .map_err(|_| Error::truncated("unknown", Header::SIZE, b.len()))?;
    Kind::try_from(h.kind)
}

/// Check a control message's header and its length for its kind.
pub fn validate(b: &[u8]) -> Result<Kind> {
    let kind = classify(b)?;
    if is_frame(b) {
        return Err(Error::malformed(kind.name(), "non-zero header prefix"));
    }
    let version = b[ZERO_PREFIX_LEN];
    if version != MSG_VERSION {
        return Err(Error::malformed(
            kind.name(),
            format!("version {} (want {})", version, MSG_VERSION),
        ));
    }
    let min = wire::min_len(kind, b);
    if b.len() < min {
        return Err(Error::truncated(kind.name(), min, b.len()));
    }
    Ok(kind)
}

/// Decoder and encoder bound to a session's cache, counters and pool.
///
/// Decoding an interface-affecting message updates the cache before the
/// event is returned.
#[derive(Debug, Clone)]
pub struct Codec {
    cache: Arc<InterfaceCache>,
    counters: Arc<Counters>,
    pool: BufferPool,
}

impl Codec {
    /// A codec updating `cache` and `counters`, encoding into buffers from `pool`.
    pub fn new(cache: Arc<InterfaceCache>, counters: Arc<Counters>, pool: BufferPool) -> Self {
        Self {
            cache,
            counters,
            pool,
        }
    }

    /// The cache decoded messages are applied to.
    pub fn cache(&self) -> &Arc<InterfaceCache> {
        &self.cache
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Decode one received buffer.
    ///
    /// A buffer that fails validation leaves the cache untouched.
    pub fn decode(&self, buf: Buffer) -> Result<Event> {
        if is_frame(&buf) {
            return Ok(Event::Frame(Frame::new(buf)));
        }
        let kind = validate(&buf)?;
        trace!(%kind, len = buf.len(), "decode");
        let b: &[u8] = &buf;
        match kind {
            Kind::Break => Ok(Event::Break),
            Kind::IfInfo => self.ifinfo(b),
            Kind::Ifa => self.ifa(b),
            Kind::Ifa6 => self.ifa6(b),
            Kind::ChangeUpperXid => {
                let m = wire::parse::<wire::ChangeUpperXid>(kind, b)?;
                let (lower, upper) = (Xid(m.lower.get()), Xid(m.upper.get()));
                if m.linking != 0 {
                    self.track(lower, self.cache.join(lower, upper));
                    Ok(Event::Join { lower, upper })
                } else {
                    self.track(lower, self.cache.quit(lower, upper));
                    Ok(Event::Quit { lower, upper })
                }
            }
            Kind::EthtoolFlags => {
                let m = wire::parse::<wire::EthtoolFlags>(kind, b)?;
                let (xid, flags) = (Xid(m.xid.get()), m.flags.get());
                self.track(xid, self.cache.apply(xid, Update::EthtoolFlags(flags)));
                Ok(Event::EthtoolFlags { xid, flags })
            }
            Kind::EthtoolSettings => {
                let m = wire::parse::<wire::EthtoolSettings>(kind, b)?;
                let xid = Xid(m.xid.get());
                let settings = EthtoolSettings {
                    speed: m.speed.get(),
                    duplex: m.duplex,
                    port: m.port,
                    phy_address: m.phy_address,
                    autoneg: m.autoneg,
                    mdio_support: m.mdio_support,
                    eth_tp_mdix: m.eth_tp_mdix,
                    eth_tp_mdix_ctrl: m.eth_tp_mdix_ctrl,
                };
                self.track(xid, self.cache.apply(xid, Update::EthtoolSettings(settings)));
                Ok(Event::EthtoolSettings { xid, settings })
            }
            Kind::EthtoolLinkModesSupported => self.link_modes(kind, b, LinkModeSet::Supported),
            Kind::EthtoolLinkModesAdvertising => {
                self.link_modes(kind, b, LinkModeSet::Advertising)
            }
            Kind::EthtoolLinkModesLpAdvertising => {
                self.link_modes(kind, b, LinkModeSet::LpAdvertising)
            }
            Kind::FibEntry => self.fib4(b),
            Kind::Fib6Entry => self.fib6(b),
            Kind::NeighUpdate => self.neighbor(b),
            Kind::NetNsAdd => {
                let m = wire::parse::<wire::NetNs>(kind, b)?;
                Ok(Event::NetNsAdd(NetNs(m.net.get())))
            }
            Kind::NetNsDel => {
                let m = wire::parse::<wire::NetNs>(kind, b)?;
                Ok(Event::NetNsDel(NetNs(m.net.get())))
            }
            Kind::LinkStat
            | Kind::EthtoolStat
            | Kind::DumpIfInfo
            | Kind::Carrier
            | Kind::Speed
            | Kind::DumpFibInfo => Err(Error::malformed(kind.name(), "not a driver event")),
        }
    }

    /// Encode `req` into a pool buffer of exactly its wire size.
    pub fn encode(&self, req: &Request) -> Buffer {
        let mut buf = self.pool.acquire(req.size());
        let header = Header::new(req.kind());
        match *req {
            Request::DumpIfInfo | Request::DumpFibInfo => {
                buf.copy_from_slice(header.as_bytes());
            }
            Request::Carrier { xid, on } => {
                let m = wire::Carrier {
                    header,
                    xid: U32::new(xid.get()),
                    flag: if on { CARRIER_ON } else { CARRIER_OFF },
                    pad: [0; 3],
                };
                buf.copy_from_slice(m.as_bytes());
            }
            Request::LinkStat { xid, index, count } | Request::EthtoolStat { xid, index, count } => {
                let m = wire::Stat {
                    header,
                    xid: U32::new(xid.get()),
                    index: U32::new(index),
                    count: U64::new(count),
                };
                buf.copy_from_slice(m.as_bytes());
            }
            Request::Speed { xid, mbps } => {
                let m = wire::Speed {
                    header,
                    xid: U32::new(xid.get()),
                    mbps: U32::new(mbps),
                };
                buf.copy_from_slice(m.as_bytes());
            }
        }
        buf
    }

    fn track(&self, xid: Xid, res: Resolution) {
        if !res.is_known() {
            self.counters.inc_unknown();
            debug!(%xid, "unknown xid");
        }
    }

    /// Count an xid that neither the cache nor the host knows.
    fn check(&self, xid: Xid) {
        if xid.get() != 0 && self.cache.resolve(xid).is_none() {
            self.counters.inc_unknown();
            debug!(%xid, "unknown xid");
        }
    }

    fn ifinfo(&self, b: &[u8]) -> Result<Event> {
        let m = wire::parse::<wire::IfInfo>(Kind::IfInfo, b)?;
        let reason = Reason::try_from(m.reason)?;
        let xid = Xid(m.xid.get());
        let event = match reason {
            Reason::New | Reason::Dump => {
                let info = interface_info(m, reason);
                self.cache.apply(xid, Update::IfInfo(info.clone()));
                if reason == Reason::New {
                    Event::DevNew(info)
                } else {
                    Event::DevDump(info)
                }
            }
            Reason::Del => {
                if self.cache.remove(xid).is_none() {
                    self.counters.inc_unknown();
                    debug!(%xid, "delete of unknown xid");
                }
                Event::DevDel(xid)
            }
            Reason::Up | Reason::Down => {
                self.track(xid, self.cache.apply(xid, Update::Reason(reason)));
                if reason == Reason::Up {
                    Event::DevUp(xid)
                } else {
                    Event::DevDown(xid)
                }
            }
            Reason::Reg => {
                let netns = NetNs(m.net.get());
                let ifindex = m.ifindex.get();
                let res = self.cache.apply_all(
                    xid,
                    [
                        Update::Reason(reason),
                        Update::NetNs(netns),
                        Update::Ifindex(ifindex),
                    ],
                );
                self.track(xid, res);
                Event::DevReg {
                    xid,
                    netns,
                    ifindex,
                }
            }
            Reason::Unreg => {
                let ifindex = m.ifindex.get();
                let res = self
                    .cache
                    .apply_all(xid, [Update::Reason(reason), Update::Ifindex(ifindex)]);
                self.track(xid, res);
                Event::DevUnreg { xid, ifindex }
            }
            Reason::Features => {
                let features = m.features.get();
                let res = self
                    .cache
                    .apply_all(xid, [Update::Reason(reason), Update::Features(features)]);
                self.track(xid, res);
                Event::DevFeatures { xid, features }
            }
        };
        Ok(event)
    }

    fn ifa(&self, b: &[u8]) -> Result<Event> {
        let m = wire::parse::<wire::Ifa>(Kind::Ifa, b)?;
        let xid = Xid(m.xid.get());
        let net = IpNetwork::from_mask(IpAddr::V4(Ipv4Addr::from(m.address)), m.mask);
        Ok(self.address(xid, m.event.get() == IFA_ADD, net))
    }

    fn ifa6(&self, b: &[u8]) -> Result<Event> {
        let m = wire::parse::<wire::Ifa6>(Kind::Ifa6, b)?;
        let xid = Xid(m.xid.get());
        let net = IpNetwork::new(IpAddr::V6(Ipv6Addr::from(m.address)), m.length);
        Ok(self.address(xid, m.event.get() == IFA_ADD, net))
    }

    fn address(&self, xid: Xid, add: bool, net: IpNetwork) -> Event {
        if add {
            self.track(xid, self.cache.apply(xid, Update::AddrAdd(net)));
            Event::AddrAdd { xid, net }
        } else {
            self.track(xid, self.cache.apply(xid, Update::AddrDel(net)));
            Event::AddrDel { xid, net }
        }
    }

    fn link_modes(&self, kind: Kind, b: &[u8], which: LinkModeSet) -> Result<Event> {
        let m = wire::parse::<wire::LinkModes>(kind, b)?;
        let (xid, modes) = (Xid(m.xid.get()), m.modes.get());
        self.track(xid, self.cache.apply(xid, Update::LinkModes(which, modes)));
        Ok(Event::link_modes(which, xid, modes))
    }

    fn fib4(&self, b: &[u8]) -> Result<Event> {
        let m = wire::parse::<wire::FibEntry>(Kind::FibEntry, b)?;
        let nhs = wire::parse_tail::<wire::NextHop>(
            Kind::FibEntry,
            b,
            wire::FibEntry::SIZE,
            usize::from(m.nhs),
        )?;
        let next_hops = nhs
            .iter()
            .map(|nh| NextHop {
                xid: Xid(nh.xid.get()),
                weight: nh.weight.get(),
                flags: nh.flags.get(),
                gateway: IpAddr::V4(Ipv4Addr::from(nh.gw)),
                scope: nh.scope,
            })
            .collect::<Vec<_>>();
        for nh in &next_hops {
            self.check(nh.xid);
        }
        Ok(Event::FibEntry(FibEntry {
            netns: NetNs(m.net.get()),
            dst: IpNetwork::from_mask(IpAddr::V4(Ipv4Addr::from(m.address)), m.mask),
            event: m.event.into(),
            table: m.table.get(),
            tos: m.tos,
            rtn_type: m.rtn_type,
            next_hops,
        }))
    }

    fn fib6(&self, b: &[u8]) -> Result<Event> {
        let m = wire::parse::<wire::Fib6Entry>(Kind::Fib6Entry, b)?;
        let nhs = wire::parse_tail::<wire::NextHop6>(
            Kind::Fib6Entry,
            b,
            wire::Fib6Entry::SIZE,
            1 + usize::from(m.nsiblings),
        )?;
        let next_hops = nhs
            .iter()
            .map(|nh| NextHop {
                xid: Xid(nh.xid.get()),
                weight: nh.weight.get(),
                flags: nh.flags.get(),
                gateway: IpAddr::V6(Ipv6Addr::from(nh.gw)),
                scope: 0,
            })
            .collect::<Vec<_>>();
        for nh in &next_hops {
            self.check(nh.xid);
        }
        Ok(Event::FibEntry(FibEntry {
            netns: NetNs(m.net.get()),
            dst: IpNetwork::new(IpAddr::V6(Ipv6Addr::from(m.address)), m.length),
            event: m.event.into(),
            table: m.table.get(),
            tos: 0,
            rtn_type: m.rtn_type,
            next_hops,
        }))
    }

    fn neighbor(&self, b: &[u8]) -> Result<Event> {
        let m = wire::parse::<wire::NeighUpdate>(Kind::NeighUpdate, b)?;
        let xid = Xid(m.xid.get());
        let dst = if i32::from(m.family) == libc::AF_INET {
            IpAddr::V4(Ipv4Addr::new(m.dst[0], m.dst[1], m.dst[2], m.dst[3]))
        } else {
            IpAddr::V6(Ipv6Addr::from(m.dst))
        };
        self.check(xid);
        Ok(Event::Neighbor(Neighbor {
            netns: NetNs(m.net.get()),
            xid,
            dst,
            lladdr: m.lladdr,
        }))
    }
}

fn interface_info(m: &wire::IfInfo, reason: Reason) -> InterfaceInfo {
    let len = m
        .ifname
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(m.ifname.len());
    let link = m.iflinkindex.get();
    InterfaceInfo {
        xid: Xid(m.xid.get()),
        ifindex: m.ifindex.get(),
        name: String::from_utf8_lossy(&m.ifname[..len]).into_owned(),
        link: (link > 0).then_some(link),
        netns: NetNs(m.net.get()),
        addr: m.addr,
        flags: m.flags.get(),
        kind: DevKind::from(m.kind),
        reason,
        features: m.features.get(),
        port: m.port.get(),
        subport: m.subport.get(),
        id: m.id.get(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{IFF_UP, SystemInterface, SystemLookup};
    use crate::message::FibEvent;
    use zerocopy::byteorder::network_endian::{I16, I32, U16};

    #[derive(Debug)]
    struct NoLookup;

    impl SystemLookup for NoLookup {
        fn by_index(&self, _: i32) -> Option<SystemInterface> {
            None
        }
    }

    fn codec() -> Codec {
        Codec::new(
            Arc::new(InterfaceCache::with_lookup(Arc::new(NoLookup))),
            Arc::new(Counters::new()),
            BufferPool::default(),
        )
    }

    fn buf(b: &[u8]) -> Buffer {
        BufferPool::clone_from_slice(b)
    }

    fn ifinfo(xid: u32, name: &str, kind: DevKind, reason: Reason) -> Vec<u8> {
        let mut ifname = [0u8; 16];
        ifname[..name.len()].copy_from_slice(name.as_bytes());
        wire::IfInfo {
            header: Header::new(Kind::IfInfo),
            ifname,
            net: U64::new(0),
            ifindex: I32::new(xid as i32),
            xid: U32::new(xid),
            iflinkindex: I32::new(0),
            flags: U32::new(IFF_UP),
            addr: [2, 0, 0, 0, 0, xid as u8],
            kind: kind as u8,
            reason: reason as u8,
            features: U64::new(0x10),
            port: I16::new(1),
            subport: I16::new(-1),
            id: U16::new(0),
            pad: [0; 2],
        }
        .as_bytes()
        .to_vec()
    }

    fn ifa(xid: u32, event: u32, addr: [u8; 4], mask: [u8; 4]) -> Vec<u8> {
        wire::Ifa {
            header: Header::new(Kind::Ifa),
            xid: U32::new(xid),
            event: U32::new(event),
            address: addr,
            mask,
        }
        .as_bytes()
        .to_vec()
    }

    #[test]
    fn test_validate_header() {
        let good = Header::new(Kind::Break);
        assert_eq!(validate(good.as_bytes()).unwrap(), Kind::Break);

        let mut bad_version = good;
        bad_version.version = MSG_VERSION + 1;
        assert!(validate(bad_version.as_bytes()).unwrap_err().is_malformed());

        let mut bad_kind = good;
        bad_kind.kind = 200;
        assert!(validate(bad_kind.as_bytes()).unwrap_err().is_malformed());

        let mut prefixed = good;
        prefixed.zero[3] = 1;
        assert!(validate(prefixed.as_bytes()).is_err());

        assert!(classify(&[0u8; 8]).unwrap_err().is_malformed());
    }

    #[test]
    fn test_frame_disambiguation() {
        let mut b = ifinfo(3, "xeth1", DevKind::Port, Reason::New);
        b[0] = 0x01;
        let c = codec();
        match c.decode(buf(&b)).unwrap() {
            Event::Frame(f) => assert_eq!(f.bytes().len(), b.len()),
            other => panic!("expected frame, got {:?}", other),
        }
        assert!(c.cache().is_empty());
    }

    #[test]
    fn test_short_buffers_do_not_mutate() {
        let c = codec();
        let samples = [
            ifinfo(3, "xeth1", DevKind::Port, Reason::New),
            ifa(3, IFA_ADD, [10, 0, 0, 1], [255, 255, 255, 0]),
            wire::ChangeUpperXid {
                header: Header::new(Kind::ChangeUpperXid),
                upper: U32::new(9),
                lower: U32::new(3),
                linking: 1,
                pad: [0; 7],
            }
            .as_bytes()
            .to_vec(),
            wire::EthtoolFlags {
                header: Header::new(Kind::EthtoolFlags),
                xid: U32::new(3),
                flags: U32::new(1),
            }
            .as_bytes()
            .to_vec(),
        ];
        for full in &samples {
            for len in Header::SIZE..full.len() {
                let err = c.decode(buf(&full[..len])).unwrap_err();
                assert!(err.is_malformed(), "len {}: {}", len, err);
            }
        }
        assert!(c.cache().is_empty());
        assert_eq!(c.counters.snapshot().unknown, 0);
    }

    #[test]
    fn test_ifinfo_new_and_delete() {
        let c = codec();
        let ev = c
            .decode(buf(&ifinfo(3, "xeth1", DevKind::Port, Reason::New)))
            .unwrap();
        match ev {
            Event::DevNew(info) => {
                assert_eq!(info.name, "xeth1");
                assert_eq!(info.link, None);
                assert_eq!(info.features, 0x10);
            }
            other => panic!("unexpected {:?}", other),
        }
        let entry = c.cache().by_name("xeth1").unwrap();
        assert_eq!(entry.xid, Xid(3));
        assert!(entry.is_up());

        let ev = c
            .decode(buf(&ifinfo(3, "xeth1", DevKind::Port, Reason::Down)))
            .unwrap();
        assert!(matches!(ev, Event::DevDown(Xid(3))));
        assert!(!c.cache().get(Xid(3)).unwrap().is_up());

        let ev = c
            .decode(buf(&ifinfo(3, "xeth1", DevKind::Port, Reason::Del)))
            .unwrap();
        assert!(matches!(ev, Event::DevDel(Xid(3))));
        assert!(c.cache().get(Xid(3)).is_none());
        assert!(c.cache().by_name("xeth1").is_none());
    }

    #[test]
    fn test_ifinfo_reg_features() {
        let c = codec();
        c.decode(buf(&ifinfo(3, "xeth1", DevKind::Port, Reason::Dump)))
            .unwrap();
        let ev = c
            .decode(buf(&ifinfo(3, "xeth1", DevKind::Port, Reason::Features)))
            .unwrap();
        assert!(matches!(ev, Event::DevFeatures { features: 0x10, .. }));
        let ev = c
            .decode(buf(&ifinfo(3, "xeth1", DevKind::Port, Reason::Unreg)))
            .unwrap();
        assert!(matches!(ev, Event::DevUnreg { ifindex: 3, .. }));
        assert_eq!(c.cache().get(Xid(3)).unwrap().reason, Reason::Unreg);
        assert_eq!(c.counters.snapshot().unknown, 0);
    }

    #[test]
    fn test_address_add_delete() {
        let c = codec();
        c.decode(buf(&ifinfo(3, "xeth1", DevKind::Port, Reason::New)))
            .unwrap();
        let ev = c
            .decode(buf(&ifa(3, IFA_ADD, [10, 0, 0, 1], [255, 255, 255, 0])))
            .unwrap();
        match ev {
            Event::AddrAdd { net, .. } => assert_eq!(net.to_string(), "10.0.0.1/24"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.cache().get(Xid(3)).unwrap().ipnets.len(), 1);

        c.decode(buf(&ifa(3, 2, [10, 0, 0, 1], [0, 0, 0, 0])))
            .unwrap();
        assert!(c.cache().get(Xid(3)).unwrap().ipnets.is_empty());
    }

    #[test]
    fn test_join_quit() {
        let c = codec();
        let msg = |linking| {
            wire::ChangeUpperXid {
                header: Header::new(Kind::ChangeUpperXid),
                upper: U32::new(9),
                lower: U32::new(3),
                linking,
                pad: [0; 7],
            }
            .as_bytes()
            .to_vec()
        };
        let ev = c.decode(buf(&msg(1))).unwrap();
        assert!(matches!(
            ev,
            Event::Join {
                lower: Xid(3),
                upper: Xid(9)
            }
        ));
        assert!(c.cache().get(Xid(3)).unwrap().uppers.contains(Xid(9)));
        assert!(c.cache().get(Xid(9)).unwrap().lowers.contains(Xid(3)));

        c.decode(buf(&msg(0))).unwrap();
        assert!(c.cache().get(Xid(3)).unwrap().uppers.is_empty());
        assert!(c.cache().get(Xid(9)).unwrap().lowers.is_empty());
    }

    #[test]
    fn test_unknown_xid_counted() {
        let c = codec();
        let ev = c
            .decode(buf(&ifinfo(42, "x", DevKind::Port, Reason::Up)))
            .unwrap();
        assert!(matches!(ev, Event::DevUp(Xid(42))));
        assert_eq!(c.counters.snapshot().unknown, 1);
    }

    #[test]
    fn test_fib_entry() {
        let c = codec();
        let mut b = wire::FibEntry {
            header: Header::new(Kind::FibEntry),
            net: U64::new(0),
            address: [10, 1, 0, 0],
            mask: [255, 255, 0, 0],
            event: 0,
            nhs: 2,
            tos: 0,
            rtn_type: 1,
            table: U32::new(254),
        }
        .as_bytes()
        .to_vec();
        for (xid, gw) in [(3u32, [10, 0, 0, 2]), (0, [10, 0, 0, 3])] {
            let nh = wire::NextHop {
                xid: U32::new(xid),
                weight: I32::new(1),
                flags: U32::new(0),
                gw,
                scope: 0,
                pad: [0; 7],
            };
            b.extend_from_slice(nh.as_bytes());
        }
        c.decode(buf(&ifinfo(3, "xeth1", DevKind::Port, Reason::New)))
            .unwrap();

        match c.decode(buf(&b)).unwrap() {
            Event::FibEntry(fib) => {
                assert_eq!(fib.dst.to_string(), "10.1.0.0/16");
                assert_eq!(fib.event, FibEvent::Replace);
                assert_eq!(fib.table, 254);
                assert_eq!(fib.next_hops.len(), 2);
                assert_eq!(fib.next_hops[0].xid, Xid(3));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.counters.snapshot().unknown, 0);

        // declared next hops beyond the buffer
        let err = c.decode(buf(&b[..b.len() - 1])).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_fib6_entry() {
        let c = codec();
        let mut b = wire::Fib6Entry {
            header: Header::new(Kind::Fib6Entry),
            address: Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0).octets(),
            length: 32,
            nsiblings: 0,
            ..Default::default()
        }
        .as_bytes()
        .to_vec();
        assert!(c.decode(buf(&b)).unwrap_err().is_malformed());
        b.extend_from_slice(wire::NextHop6::default().as_bytes());
        match c.decode(buf(&b)).unwrap() {
            Event::FibEntry(fib) => {
                assert_eq!(fib.dst.to_string(), "2001:db8::/32");
                assert_eq!(fib.next_hops.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_neighbor_and_netns() {
        let c = codec();
        let mut dst = [0u8; 16];
        dst[..4].copy_from_slice(&[192, 168, 1, 1]);
        let b = wire::NeighUpdate {
            header: Header::new(Kind::NeighUpdate),
            net: U64::new(5),
            xid: U32::new(0),
            family: libc::AF_INET as u8,
            len: 4,
            dst,
            lladdr: [0, 1, 2, 3, 4, 5],
            ..Default::default()
        };
        match c.decode(buf(b.as_bytes())).unwrap() {
            Event::Neighbor(n) => {
                assert_eq!(n.dst, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)));
                assert_eq!(n.netns, NetNs(5));
            }
            other => panic!("unexpected {:?}", other),
        }

        let ns = wire::NetNs {
            header: Header::new(Kind::NetNsDel),
            net: U64::new(7),
        };
        assert!(matches!(
            c.decode(buf(ns.as_bytes())).unwrap(),
            Event::NetNsDel(NetNs(7))
        ));
    }

    #[test]
    fn test_link_modes_and_settings() {
        let c = codec();
        let m = wire::LinkModes {
            header: Header::new(Kind::EthtoolLinkModesAdvertising),
            xid: U32::new(3),
            pad: U32::new(0),
            modes: U64::new(0xff),
        };
        let ev = c.decode(buf(m.as_bytes())).unwrap();
        assert!(matches!(ev, Event::LinkModesAdvertising { modes: 0xff, .. }));
        assert_eq!(c.cache().get(Xid(3)).unwrap().link_modes.advertising, 0xff);

        let s = wire::EthtoolSettings {
            header: Header::new(Kind::EthtoolSettings),
            xid: U32::new(3),
            speed: U32::new(100_000),
            autoneg: 1,
            ..Default::default()
        };
        c.decode(buf(s.as_bytes())).unwrap();

        // A short record is reported under its own kind.
        let lp = wire::LinkModes {
            header: Header::new(Kind::EthtoolLinkModesLpAdvertising),
            ..Default::default()
        };
        let short = &lp.as_bytes()[..wire::LinkModes::SIZE - 1];
        match c.link_modes(Kind::EthtoolLinkModesLpAdvertising, short, LinkModeSet::LpAdvertising) {
            Err(Error::MalformedMessage { kind, .. }) => {
                assert_eq!(kind, Kind::EthtoolLinkModesLpAdvertising.name());
            }
            other => panic!("unexpected {other:?}"),
        }
        let e = c.cache().get(Xid(3)).unwrap();
        assert_eq!(e.ethtool_settings.speed, 100_000);
        assert_eq!(e.ethtool_settings.autoneg, 1);
    }

    #[test]
    fn test_encode_sizes_and_kinds() {
        let c = codec();
        let reqs = [
            Request::DumpIfInfo,
            Request::DumpFibInfo,
            Request::Carrier {
                xid: Xid(3),
                on: true,
            },
            Request::LinkStat {
                xid: Xid(3),
                index: 1,
                count: 2,
            },
            Request::EthtoolStat {
                xid: Xid(3),
                index: 1,
                count: 2,
            },
            Request::Speed {
                xid: Xid(3),
                mbps: 25_000,
            },
        ];
        for req in reqs {
            let b = c.encode(&req);
            assert_eq!(b.len(), req.size());
            assert!(b.is_pooled());
            assert_eq!(validate(&b).unwrap(), req.kind());
        }
    }

    #[test]
    fn test_encode_carrier_fields() {
        let c = codec();
        let b = c.encode(&Request::Carrier {
            xid: Xid(0x0102),
            on: true,
        });
        let m = wire::parse::<wire::Carrier>(Kind::Carrier, &b).unwrap();
        assert_eq!(m.xid.get(), 0x0102);
        assert_eq!(m.flag, CARRIER_ON);
        assert_eq!(&b[16..20], &[0, 0, 1, 2]);
    }

    #[test]
    fn test_outbound_kind_rejected() {
        let c = codec();
        let b = c.encode(&Request::Speed {
            xid: Xid(1),
            mbps: 1,
        });
        assert!(c.decode(b).unwrap_err().is_malformed());
    }
}
