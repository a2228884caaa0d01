//! Control and raw sockets.
//!
//! Both are plain libc sockets opened non-blocking and registered with the
//! tokio reactor through [`AsyncFd`].

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

fn socket(domain: libc::c_int, ty: libc::c_int, protocol: libc::c_int) -> io::Result<OwnedFd> {
    // SAFETY: plain syscall, the returned descriptor is checked before use.
    let fd = unsafe { libc::socket(domain, ty | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC, protocol) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd is a freshly created descriptor owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn cvt(ret: isize) -> io::Result<usize> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

fn cvt_unit(ret: libc::c_int) -> io::Result<()> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Address of `@name` in the abstract Unix namespace.
fn abstract_addr(name: &str) -> io::Result<(libc::sockaddr_un, libc::socklen_t)> {
    // SAFETY: sockaddr_un is plain old data.
    let mut addr: libc::sockaddr_un = unsafe { mem::zeroed() };
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

    let name = name.as_bytes();
    if name.is_empty() || name.len() >= addr.sun_path.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid abstract socket name",
        ));
    }
    // sun_path[0] stays NUL.
    for (dst, src) in addr.sun_path[1..].iter_mut().zip(name) {
        *dst = *src as libc::c_char;
    }
    let len = mem::size_of::<libc::sa_family_t>() + 1 + name.len();
    Ok((addr, len as libc::socklen_t))
}

fn link_addr(ifindex: i32, protocol: libc::c_int) -> libc::sockaddr_ll {
    // SAFETY: sockaddr_ll is plain old data.
    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as libc::c_ushort;
    addr.sll_protocol = (protocol as u16).to_be();
    addr.sll_ifindex = ifindex;
    addr
}

/// The driver's control channel, a `SOCK_SEQPACKET` Unix socket.
///
/// Every send and receive moves exactly one message.
#[derive(Debug)]
pub struct ControlSocket {
    fd: AsyncFd<OwnedFd>,
}

impl ControlSocket {
    fn from_fd(fd: OwnedFd) -> io::Result<Self> {
        Ok(Self {
            fd: AsyncFd::new(fd)?,
        })
    }

    /// Make one connection attempt to `@name`.
    ///
    /// Fails with `ECONNREFUSED` while nobody listens and with `EAGAIN`
    /// when the listener's backlog is full.
    pub fn connect(name: &str) -> io::Result<Self> {
        let fd = socket(libc::AF_UNIX, libc::SOCK_SEQPACKET, 0)?;
        let (addr, len) = abstract_addr(name)?;
        // SAFETY: addr is a valid sockaddr_un of the given length.
        cvt_unit(unsafe {
            libc::connect(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_un as *const libc::sockaddr,
                len,
            )
        })?;
        Self::from_fd(fd)
    }

    /// A connected pair, handy for in-process peers.
    pub fn pair() -> io::Result<(Self, Self)> {
        let mut fds = [0 as RawFd; 2];
        // SAFETY: fds has room for the two descriptors socketpair writes.
        cvt_unit(unsafe {
            libc::socketpair(
                libc::AF_UNIX,
                libc::SOCK_SEQPACKET | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                0,
                fds.as_mut_ptr(),
            )
        })?;
        // SAFETY: both descriptors were just created and are unowned.
        let (a, b) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        Ok((Self::from_fd(a)?, Self::from_fd(b)?))
    }

    /// Send one message.
    pub async fn send(&self, msg: &[u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.ready(Interest::WRITABLE).await?;

            // SAFETY: msg is valid for reads of msg.len() bytes.
            match guard.try_io(|inner| {
                cvt(unsafe {
                    libc::send(
                        inner.as_raw_fd(),
                        msg.as_ptr().cast(),
                        msg.len(),
                        libc::MSG_NOSIGNAL,
                    )
                })
            }) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive one message into `buf`. Zero means the peer has gone.
    pub async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            // SAFETY: buf is valid for writes of buf.len() bytes.
            match guard.try_io(|inner| {
                cvt(unsafe { libc::recv(inner.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len(), 0) })
            }) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    /// Shut down both directions, waking any pending receive.
    pub fn shutdown(&self) -> io::Result<()> {
        // SAFETY: plain syscall on a descriptor we own.
        cvt_unit(unsafe { libc::shutdown(self.fd.as_raw_fd(), libc::SHUT_RDWR) })
    }
}

impl AsRawFd for ControlSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}

/// The listening end of `@name`, as the driver holds it.
///
/// Used by simulators and tests that stand in for the driver.
#[derive(Debug)]
pub struct ControlListener {
    fd: AsyncFd<OwnedFd>,
}

impl ControlListener {
    /// Listen on the abstract address `name`, as the driver does.
    pub fn bind(name: &str) -> io::Result<Self> {
        let fd = socket(libc::AF_UNIX, libc::SOCK_SEQPACKET, 0)?;
        let (addr, len) = abstract_addr(name)?;
        // SAFETY: addr is a valid sockaddr_un of the given length.
        cvt_unit(unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_un as *const libc::sockaddr,
                len,
            )
        })?;
        // SAFETY: plain syscall on a descriptor we own.
        cvt_unit(unsafe { libc::listen(fd.as_raw_fd(), 1) })?;
        Ok(Self {
            fd: AsyncFd::new(fd)?,
        })
    }

    /// Wait for the next connecting session.
    pub async fn accept(&self) -> io::Result<ControlSocket> {
        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            match guard.try_io(|inner| {
                // SAFETY: null peer address pointers are allowed by accept4.
                let fd = unsafe {
                    libc::accept4(
                        inner.as_raw_fd(),
                        std::ptr::null_mut(),
                        std::ptr::null_mut(),
                        libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                    )
                };
                if fd < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    // SAFETY: fd was just returned by accept4.
                    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
                }
            }) {
                Ok(result) => return ControlSocket::from_fd(result?),
                Err(_would_block) => continue,
            }
        }
    }
}

/// An `AF_PACKET` socket bound to the driver's interface.
///
/// Receives every frame the driver mirrors to userspace and sends
/// exception frames back.
#[derive(Debug)]
pub struct RawSocket {
    fd: AsyncFd<OwnedFd>,
    ifindex: i32,
}

impl RawSocket {
    /// Open and bind to `ifindex`. Needs `CAP_NET_RAW`.
    pub fn bind(ifindex: i32) -> io::Result<Self> {
        let fd = socket(
            libc::AF_PACKET,
            libc::SOCK_RAW,
            (libc::ETH_P_ALL as u16).to_be() as libc::c_int,
        )?;
        let addr = link_addr(ifindex, libc::ETH_P_ALL);
        // SAFETY: addr is a valid sockaddr_ll.
        cvt_unit(unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        })?;
        Ok(Self {
            fd: AsyncFd::new(fd)?,
            ifindex,
        })
    }

    /// Interface the socket is bound to.
    pub fn ifindex(&self) -> i32 {
        self.ifindex
    }

    /// Receive one frame, returning its length and source link index.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, i32)> {
        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            match guard.try_io(|inner| {
                // SAFETY: sockaddr_ll is plain old data.
                let mut from: libc::sockaddr_ll = unsafe { mem::zeroed() };
                let mut len = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
                // SAFETY: buf and from are valid for writes of their sizes.
                let n = cvt(unsafe {
                    libc::recvfrom(
                        inner.as_raw_fd(),
                        buf.as_mut_ptr().cast(),
                        buf.len(),
                        0,
                        &mut from as *mut libc::sockaddr_ll as *mut libc::sockaddr,
                        &mut len,
                    )
                })?;
                Ok((n, from.sll_ifindex))
            }) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    /// Send a frame to the bound interface as an exception.
    pub async fn send_exception(&self, frame: &[u8]) -> io::Result<usize> {
        let mut to = link_addr(self.ifindex, libc::ETH_P_ARP);
        to.sll_hatype = libc::ARPHRD_ETHER;
        loop {
            let mut guard = self.fd.ready(Interest::WRITABLE).await?;

            // SAFETY: frame and to are valid for reads of their sizes.
            match guard.try_io(|inner| {
                cvt(unsafe {
                    libc::sendto(
                        inner.as_raw_fd(),
                        frame.as_ptr().cast(),
                        frame.len(),
                        0,
                        &to as *const libc::sockaddr_ll as *const libc::sockaddr,
                        mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
                    )
                })
            }) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }
}
