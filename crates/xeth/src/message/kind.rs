//! Message discriminants and the enumerations carried in messages.

use std::fmt;

use crate::error::{Error, Result};

/// Protocol version carried in every control message header.
pub const MSG_VERSION: u8 = 3;

/// Control message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum Kind {
    Break = 0,
    LinkStat = 1,
    EthtoolStat = 2,
    EthtoolFlags = 3,
    EthtoolSettings = 4,
    EthtoolLinkModesSupported = 5,
    EthtoolLinkModesAdvertising = 6,
    EthtoolLinkModesLpAdvertising = 7,
    DumpIfInfo = 8,
    Carrier = 9,
    Speed = 10,
    IfInfo = 11,
    Ifa = 12,
    DumpFibInfo = 13,
    FibEntry = 14,
    Ifa6 = 15,
    Fib6Entry = 16,
    NeighUpdate = 17,
    ChangeUpperXid = 18,
    NetNsAdd = 19,
    NetNsDel = 20,
}

impl Kind {
    /// Short lowercase name used in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Break => "break",
            Self::LinkStat => "link-stat",
            Self::EthtoolStat => "ethtool-stat",
            Self::EthtoolFlags => "ethtool-flags",
            Self::EthtoolSettings => "ethtool-settings",
            Self::EthtoolLinkModesSupported => "link-modes-supported",
            Self::EthtoolLinkModesAdvertising => "link-modes-advertising",
            Self::EthtoolLinkModesLpAdvertising => "link-modes-lp-advertising",
            Self::DumpIfInfo => "dump-ifinfo",
            Self::Carrier => "carrier",
            Self::Speed => "speed",
            Self::IfInfo => "ifinfo",
            Self::Ifa => "ifa",
            Self::DumpFibInfo => "dump-fibinfo",
            Self::FibEntry => "fib-entry",
            Self::Ifa6 => "ifa6",
            Self::Fib6Entry => "fib6-entry",
            Self::NeighUpdate => "neigh-update",
            Self::ChangeUpperXid => "change-upper-xid",
            Self::NetNsAdd => "netns-add",
            Self::NetNsDel => "netns-del",
        }
    }
}

impl TryFrom<u8> for Kind {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self> {
        Ok(match v {
            0 => Self::Break,
            1 => Self::LinkStat,
            2 => Self::EthtoolStat,
            3 => Self::EthtoolFlags,
            4 => Self::EthtoolSettings,
            5 => Self::EthtoolLinkModesSupported,
            6 => Self::EthtoolLinkModesAdvertising,
            7 => Self::EthtoolLinkModesLpAdvertising,
            8 => Self::DumpIfInfo,
            9 => Self::Carrier,
            10 => Self::Speed,
            11 => Self::IfInfo,
            12 => Self::Ifa,
            13 => Self::DumpFibInfo,
            14 => Self::FibEntry,
            15 => Self::Ifa6,
            16 => Self::Fib6Entry,
            17 => Self::NeighUpdate,
            18 => Self::ChangeUpperXid,
            19 => Self::NetNsAdd,
            20 => Self::NetNsDel,
            _ => return Err(Error::malformed("unknown", format!("kind {}", v))),
        })
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why an ifinfo message was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum Reason {
    #[default]
    New = 0,
    Del = 1,
    Up = 2,
    Down = 3,
    Dump = 4,
    Reg = 5,
    Unreg = 6,
    Features = 7,
}

impl TryFrom<u8> for Reason {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self> {
        Ok(match v {
            0 => Self::New,
            1 => Self::Del,
            2 => Self::Up,
            3 => Self::Down,
            4 => Self::Dump,
            5 => Self::Reg,
            6 => Self::Unreg,
            7 => Self::Features,
            _ => return Err(Error::malformed("ifinfo", format!("reason {}", v))),
        })
    }
}

/// Driver device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum DevKind {
    #[default]
    Unspec = 0,
    /// Physical front-panel port.
    Port = 1,
    Vlan = 2,
    Bridge = 3,
    Lag = 4,
}

impl From<u8> for DevKind {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Port,
            2 => Self::Vlan,
            3 => Self::Bridge,
            4 => Self::Lag,
            _ => Self::Unspec,
        }
    }
}

/// Carrier flag values.
pub const CARRIER_OFF: u8 = 0;
pub const CARRIER_ON: u8 = 1;

/// Ifa event values.
pub const IFA_ADD: u32 = 1;
pub const IFA_DEL: u32 = 2;

/// FIB notifier events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FibEvent {
    Replace,
    Append,
    Add,
    Del,
    Other(u8),
}

impl From<u8> for FibEvent {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::Replace,
            1 => Self::Append,
            2 => Self::Add,
            3 => Self::Del,
            n => Self::Other(n),
        }
    }
}

impl From<FibEvent> for u8 {
    fn from(e: FibEvent) -> u8 {
        match e {
            FibEvent::Replace => 0,
            FibEvent::Append => 1,
            FibEvent::Add => 2,
            FibEvent::Del => 3,
            FibEvent::Other(n) => n,
        }
    }
}
