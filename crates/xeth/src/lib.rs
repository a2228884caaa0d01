//! Async sideband control for the xeth switch driver.
//!
//! The driver exposes its front-panel ports as ordinary netdevs and talks
//! to userspace over two local channels: an abstract `SOCK_SEQPACKET`
//! socket named after the driver device, carrying small fixed-layout
//! control messages, and the driver's own link, where mirrored frames
//! arrive VLAN tagged with the port's [`Xid`].
//!
//! This crate keeps a live [`InterfaceCache`] of those ports and their
//! uppers, routes and neighbors as the driver reports them, and pushes
//! carrier, speed and statistics back down through a two-tier transmit
//! queue where statistics are shed under load and everything else waits.
//!
//! # Features
//!
//! - `serde` - `Serialize` for cache entries, events and counters
//!
//! # Example
//!
//! ```ignore
//! use xeth::{Event, Session};
//!
//! #[tokio::main]
//! async fn main() -> xeth::Result<()> {
//!     let mut session = Session::builder("platina-mk1")
//!         .raw_frames(false)
//!         .start()
//!         .await?;
//!     session.dump_ifinfo().await?;
//!
//!     while let Some(event) = session.recv().await {
//!         match event? {
//!             Event::Break => break,
//!             Event::DevDump(info) => println!("{}: {}", info.xid, info.name),
//!             _ => {}
//!         }
//!     }
//!     session.stop();
//!     session.join().await;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod cache;
pub mod config;
pub mod counters;
pub mod error;
pub mod frame;
pub mod message;
pub mod session;
pub mod transport;
pub mod util;
pub mod xid;

pub use buffer::{Buffer, BufferPool};
pub use cache::{InterfaceCache, InterfaceEntry, Update};
pub use config::{SessionBuilder, SessionConfig};
pub use counters::CounterSnapshot;
pub use error::{Error, Result};
pub use frame::Frame;
pub use message::{Event, Kind, Request};
pub use session::Session;
pub use transport::{Priority, SessionState, StopHandle};
pub use xid::Xid;
