use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::PathBuf;

use mio::Interest;
use mio::net::TcpStream;
use tracing::{debug, trace};

use crate::config::StaticFilesConfig;
use crate::http::handler;
use crate::http::parser::{find_headers_end, tokenize};
use crate::http::request::{Request, TokenList};
use crate::http::response::ResponseBuffer;
use crate::http::writer::{FileTransfer, Progress, write_header};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The listener's own slot.
    Accepting,
    ReadingHeader,
    WritingHeader,
    SendingFile,
    Closed,
}

/// What the event loop should do after a callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing more can be done until the next event.
    Wait,
    /// Switch the registration to a new interest.
    Rearm(Interest),
    /// Tear the connection down.
    Close,
}

/// All per-connection state, allocated once and reused for every
/// connection that lands in the same pool slot.
#[derive(Debug)]
pub struct Connection {
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    state: ConnectionState,
    request: Box<[u8]>,
    received: usize,
    tokens: TokenList,
    response: ResponseBuffer,
    keep_alive: bool,
    transfer: FileTransfer,
    path: PathBuf,
}

impl Connection {
    pub fn new(header_capacity: usize, max_tokens: usize, path_capacity: usize) -> Self {
        Self {
            stream: None,
            peer: None,
            state: ConnectionState::Closed,
            request: vec![0u8; header_capacity].into_boxed_slice(),
            received: 0,
            tokens: TokenList::with_capacity(max_tokens),
            response: ResponseBuffer::with_capacity(header_capacity),
            keep_alive: true,
            transfer: FileTransfer::default(),
            path: PathBuf::with_capacity(path_capacity),
        }
    }

    /// Marks this slot as the listener's.
    pub fn listen(&mut self) {
        self.state = ConnectionState::Accepting;
    }

    /// Starts serving a freshly accepted socket.
    pub fn open(&mut self, stream: TcpStream, peer: SocketAddr) {
        self.stream = Some(stream);
        self.peer = Some(peer);
        self.keep_alive = true;
        self.transfer.finish();
        self.reset_request();
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn stream_mut(&mut self) -> Option<&mut TcpStream> {
        self.stream.as_mut()
    }

    /// Drops any open file and hands back the socket so the caller can
    /// deregister it before it is closed.
    pub fn close(&mut self) -> Option<TcpStream> {
        self.state = ConnectionState::Closed;
        self.transfer.finish();
        self.received = 0;
        self.tokens.clear();
        self.response.clear();
        self.peer = None;
        self.stream.take()
    }

    fn reset_request(&mut self) {
        self.received = 0;
        self.tokens.clear();
        self.response.clear();
        self.state = ConnectionState::ReadingHeader;
    }

    /// Reads until the socket would block or a full header has arrived.
    pub fn on_readable(&mut self, files: &StaticFilesConfig) -> Step {
        if self.state != ConnectionState::ReadingHeader {
            return Step::Wait;
        }
        let Some(stream) = self.stream.as_mut() else {
            return Step::Close;
        };

        // The last byte is kept for the terminating sentinel.
        let limit = self.request.len() - 1;
        loop {
            if self.received >= limit {
                debug!(peer = ?self.peer, "request header exceeds buffer");
                return Step::Close;
            }

            match stream.read(&mut self.request[self.received..limit]) {
                Ok(0) => {
                    trace!(peer = ?self.peer, "peer closed");
                    return Step::Close;
                }
                Ok(n) => {
                    let scan_from = self.received.saturating_sub(3);
                    self.received += n;
                    if let Some(end) = find_headers_end(&self.request[scan_from..self.received]) {
                        return self.process(scan_from + end + 4, files);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Step::Wait,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(peer = ?self.peer, error = %e, "read failed");
                    return Step::Close;
                }
            }
        }
    }

    fn process(&mut self, header_len: usize, files: &StaticFilesConfig) -> Step {
        // Anything after the blank line is not part of this request.
        self.request[header_len] = 0;

        if let Err(e) = tokenize(&mut self.request, header_len, &mut self.tokens) {
            debug!(peer = ?self.peer, error = %e, "tokenize failed");
            return Step::Close;
        }

        let request = Request::new(&self.request, self.tokens.as_slice());
        let reply = handler::respond(&request, files, &mut self.path, &mut self.response);

        self.keep_alive = reply.keep_alive;
        self.transfer.prepare(reply.body);
        self.state = ConnectionState::WritingHeader;
        Step::Rearm(Interest::WRITABLE)
    }

    /// Sends the response header, then the file body if one follows.
    pub fn on_writable(&mut self) -> Step {
        let Some(stream) = self.stream.as_mut() else {
            return Step::Close;
        };

        match self.state {
            ConnectionState::WritingHeader => match write_header(stream, &mut self.response) {
                Ok(Progress::Blocked) => Step::Wait,
                Ok(Progress::Done) => {
                    if self.transfer.is_pending() {
                        self.transfer.rewind();
                        self.state = ConnectionState::SendingFile;
                        Step::Rearm(Interest::WRITABLE)
                    } else {
                        self.finish_exchange()
                    }
                }
                Err(e) => {
                    debug!(peer = ?self.peer, error = %e, "header write failed");
                    Step::Close
                }
            },
            ConnectionState::SendingFile => match self.transfer.send(stream) {
                Ok(Progress::Blocked) => Step::Wait,
                Ok(Progress::Done) => {
                    self.transfer.finish();
                    self.finish_exchange()
                }
                Err(e) => {
                    debug!(
                        peer = ?self.peer,
                        error = %e,
                        offset = self.transfer.offset(),
                        remaining = self.transfer.remaining(),
                        "file transfer failed"
                    );
                    Step::Close
                }
            },
            _ => Step::Wait,
        }
    }

    fn finish_exchange(&mut self) -> Step {
        if self.keep_alive {
            self.reset_request();
            Step::Rearm(Interest::READABLE)
        } else {
            Step::Close
        }
    }
}
