//! Driver control messages.
//!
//! Control messages and mirrored frames share one receive path. A
//! message begins with a zero prefix where a frame carries its hardware
//! addresses, which is how [`Codec::decode`] tells the two apart.

mod codec;
mod event;
mod kind;
pub mod wire;

pub use codec::{Codec, Request, classify, is_frame, validate};
pub use event::{Event, FibEntry, InterfaceInfo, Neighbor, NextHop};
pub use kind::{
    CARRIER_OFF, CARRIER_ON, DevKind, FibEvent, IFA_ADD, IFA_DEL, Kind, MSG_VERSION, Reason,
};
