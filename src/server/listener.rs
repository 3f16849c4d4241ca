use std::fs::File;
use std::io;
use std::net::SocketAddr;

use mio::net::{TcpListener, TcpStream};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::warn;

/// Creates a non-blocking listening socket on `addr`.
pub fn bind(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    let std_listener: std::net::TcpListener = socket.into();
    Ok(TcpListener::from_std(std_listener))
}

/// Accepts the next pending connection.
///
/// Returns `Ok(None)` once the accept queue is drained. Errors that only
/// concern the connection being accepted are logged and skipped; errors
/// that would repeat for every pending connection are returned.
pub fn accept(listener: &TcpListener) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    loop {
        match listener.accept() {
            Ok(accepted) => return Ok(Some(accepted)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_fd_exhaustion(&e) || is_memory_exhaustion(&e) => return Err(e),
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        }
    }
}

/// The process or the system is out of file descriptors.
pub fn is_fd_exhaustion(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(libc::EMFILE | libc::ENFILE))
}

fn is_memory_exhaustion(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(libc::ENOBUFS | libc::ENOMEM))
}

/// A descriptor held in reserve so that a pending connection can still be
/// accepted and closed once the process runs out of descriptors.
///
/// The listener is edge-triggered: a connection left in the accept queue
/// gets no further readiness event, so it has to be drained.
#[derive(Debug)]
pub struct SpareFd {
    file: Option<File>,
}

impl SpareFd {
    pub fn open() -> io::Result<Self> {
        Ok(Self {
            file: Some(File::open("/dev/null")?),
        })
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Gives up the spare descriptor, accepts one pending connection and
    /// closes it, then takes the spare back.
    ///
    /// Returns the refused peer, or `None` if nothing was pending.
    pub fn shed(&mut self, listener: &TcpListener) -> io::Result<Option<SocketAddr>> {
        self.file = None;
        let shed = loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    drop(stream);
                    break Ok(Some(peer));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        self.file = Some(File::open("/dev/null")?);
        shed
    }
}

/// Raises the soft `RLIMIT_NOFILE` towards `wanted`, bounded by the hard
/// limit. Returns the soft limit in effect afterwards.
pub fn raise_nofile_limit(wanted: u64) -> io::Result<u64> {
    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `rlim` is a valid, writable `rlimit`.
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let wanted = wanted as libc::rlim_t;
    if rlim.rlim_cur >= wanted {
        return Ok(rlim.rlim_cur as u64);
    }

    rlim.rlim_cur = if rlim.rlim_max == libc::RLIM_INFINITY {
        wanted
    } else {
        wanted.min(rlim.rlim_max)
    };
    // SAFETY: `rlim` holds a soft limit no larger than the hard limit.
    if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &rlim) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(rlim.rlim_cur as u64)
}
