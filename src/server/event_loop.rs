use std::io;
use std::net::SocketAddr;

use anyhow::{Context, anyhow};
use mio::event::Event;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Registry, Token, Waker};
use tracing::{debug, info, trace, warn};

use crate::config::{Config, StaticFilesConfig};
use crate::http::connection::{Connection, ConnectionState, Step};
use crate::server::listener::{self, SpareFd};
use crate::server::pool::{SlotId, SlotPool};
use crate::server::signal::Shutdown;

/// Token of the waker used to interrupt a blocked poll.
const WAKE_TOKEN: Token = Token(usize::MAX);

/// Descriptors needed besides the connections: stdio, the poll, the
/// waker, the listener and the spare.
const RESERVED_FDS: u64 = 64;

/// Single-threaded static file server.
///
/// One edge-triggered poll drives every connection. Connections live in a
/// fixed pool of slots; the listener holds one slot for as long as it is
/// open.
pub struct Server {
    poll: Poll,
    events: Events,
    dispatcher: Dispatcher,
    shutdown: Shutdown,
}

/// Everything an event callback touches, split from the poll so events can
/// be iterated while connections are mutated.
struct Dispatcher {
    registry: Registry,
    listener: Option<TcpListener>,
    listener_slot: SlotId,
    local_addr: SocketAddr,
    pool: SlotPool<Connection>,
    spare: SpareFd,
    files: StaticFilesConfig,
}

impl Server {
    /// Binds the listening socket and allocates the connection pool.
    pub fn bind(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let addr = config.listen_addr()?;
        let listener = listener::bind(addr, config.server.backlog)
            .with_context(|| format!("failed to listen on {addr}"))?;
        Self::with_listener(listener, config)
    }

    /// Builds a server around an already listening socket.
    pub fn with_listener(mut listener: TcpListener, config: &Config) -> anyhow::Result<Self> {
        let server = &config.server;
        let files = config.static_files.clone();
        let path_capacity = files.root.as_os_str().len() + server.header_capacity;

        // Each connection holds its socket and, while sending, a file.
        let wanted = 2 * server.max_connections as u64 + RESERVED_FDS;
        match listener::raise_nofile_limit(wanted) {
            Ok(limit) if limit < wanted => warn!(
                limit,
                wanted,
                "descriptor limit below pool size, excess connections will be shed"
            ),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to raise descriptor limit"),
        }
        let spare = SpareFd::open().context("failed to open spare descriptor")?;

        let mut pool = SlotPool::new(server.max_connections, || {
            Connection::new(server.header_capacity, server.max_tokens, path_capacity)
        })?;

        let poll = Poll::new().context("failed to create poll")?;
        let registry = poll
            .registry()
            .try_clone()
            .context("failed to clone poll registry")?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN).context("failed to create waker")?;

        let listener_slot = pool
            .acquire()
            .ok_or_else(|| anyhow!("no slot left for the listener"))?;
        if let Some(conn) = pool.get_mut(listener_slot) {
            conn.listen();
        }
        registry
            .register(&mut listener, listener_slot.token(), Interest::READABLE)
            .context("failed to register listener")?;

        let local_addr = listener.local_addr()?;

        Ok(Self {
            poll,
            events: Events::with_capacity(server.max_events),
            dispatcher: Dispatcher {
                registry,
                listener: Some(listener),
                listener_slot,
                local_addr,
                pool,
                spare,
                files,
            },
            shutdown: Shutdown::new(waker),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.dispatcher.local_addr
    }

    /// A handle that stops [`Server::run`] from another thread or a
    /// signal handler.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Runs the event loop until shutdown is triggered or a fatal error
    /// occurs, then closes every open connection.
    pub fn run(&mut self) -> anyhow::Result<()> {
        info!(
            addr = %self.dispatcher.local_addr,
            slots = self.dispatcher.pool.capacity(),
            "Listening"
        );

        let result = self.event_loop();
        self.dispatcher.close_all();
        result
    }

    fn event_loop(&mut self) -> anyhow::Result<()> {
        while !self.shutdown.is_triggered() {
            match self.poll.poll(&mut self.events, None) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("readiness wait failed"),
            }

            if self.shutdown.is_triggered() {
                break;
            }

            for event in self.events.iter() {
                self.dispatcher.dispatch(event)?;
            }
        }
        Ok(())
    }
}

fn is_hangup(event: &Event) -> bool {
    event.is_error() || (event.is_read_closed() && event.is_write_closed())
}

impl Dispatcher {
    fn dispatch(&mut self, event: &Event) -> anyhow::Result<()> {
        if event.token() == WAKE_TOKEN {
            return Ok(());
        }

        let id = SlotId::from_token(event.token());
        let Some(conn) = self.pool.get_mut(id) else {
            trace!(slot = id.index(), "event for released slot");
            return Ok(());
        };

        if is_hangup(event) {
            if id == self.listener_slot {
                warn!("listener failed, no longer accepting connections");
            }
            return self.teardown(id);
        }

        let step = match conn.state() {
            ConnectionState::Accepting => return self.accept_connections(),
            ConnectionState::ReadingHeader if event.is_readable() => conn.on_readable(&self.files),
            ConnectionState::WritingHeader | ConnectionState::SendingFile
                if event.is_writable() =>
            {
                conn.on_writable()
            }
            _ => Step::Wait,
        };

        self.apply(id, step)
    }

    fn apply(&mut self, id: SlotId, step: Step) -> anyhow::Result<()> {
        match step {
            Step::Wait => Ok(()),
            Step::Rearm(interest) => {
                let stream = self
                    .pool
                    .get_mut(id)
                    .and_then(Connection::stream_mut)
                    .ok_or_else(|| anyhow!("slot {} has no socket to rearm", id.index()))?;
                self.registry
                    .reregister(stream, id.token(), interest)
                    .context("failed to modify readiness interest")
            }
            Step::Close => self.teardown(id),
        }
    }

    /// Accepts every pending connection. A connection that finds the pool
    /// full, or no descriptor left for it, is closed straight away.
    fn accept_connections(&mut self) -> anyhow::Result<()> {
        loop {
            let Some(tcp) = self.listener.as_ref() else {
                return Ok(());
            };

            let (mut stream, peer) = match listener::accept(tcp) {
                Ok(Some(accepted)) => accepted,
                Ok(None) => return Ok(()),
                Err(e) if listener::is_fd_exhaustion(&e) => match self.spare.shed(tcp) {
                    Ok(Some(peer)) => {
                        warn!(%peer, error = %e, "out of descriptors, refusing connection");
                        continue;
                    }
                    Ok(None) => return Ok(()),
                    Err(e) => {
                        warn!(error = %e, "failed to shed connection");
                        return Ok(());
                    }
                },
                Err(e) => {
                    warn!(error = %e, "accept stopped");
                    return Ok(());
                }
            };

            let Some(id) = self.pool.acquire() else {
                warn!(%peer, "connection pool exhausted, refusing connection");
                drop(stream);
                continue;
            };

            self.registry
                .register(&mut stream, id.token(), Interest::READABLE)
                .context("failed to register connection")?;

            let conn = self
                .pool
                .get_mut(id)
                .ok_or_else(|| anyhow!("slot {} lost after acquire", id.index()))?;
            conn.open(stream, peer);
            debug!(%peer, slot = id.index(), "accepted connection");
        }
    }

    /// Deregisters and closes the slot's socket and file, then releases it.
    fn teardown(&mut self, id: SlotId) -> anyhow::Result<()> {
        if id == self.listener_slot {
            if let Some(mut listener) = self.listener.take() {
                self.registry
                    .deregister(&mut listener)
                    .context("failed to deregister listener")?;
            }
        }

        let conn = self
            .pool
            .get_mut(id)
            .ok_or_else(|| anyhow!("teardown of slot {} it does not own", id.index()))?;
        let peer = conn.peer();
        if let Some(mut stream) = conn.close() {
            self.registry
                .deregister(&mut stream)
                .context("failed to deregister connection")?;
        }
        self.pool.release(id)?;

        debug!(peer = ?peer, slot = id.index(), "connection closed");
        Ok(())
    }

    /// Forcibly closes every slot still in use, the listener included.
    fn close_all(&mut self) {
        for id in self.pool.occupied() {
            if let Err(e) = self.teardown(id) {
                warn!(slot = id.index(), error = %e, "cleanup failed");
            }
        }
        info!("All connections closed");
    }
}
