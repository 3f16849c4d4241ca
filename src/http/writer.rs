use std::fs::File;
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};

use mio::net::TcpStream;

use crate::http::handler::FileBody;
use crate::http::response::ResponseBuffer;

/// Largest count a single `sendfile` call will move on Linux.
const MAX_SENDFILE_CHUNK: usize = 0x7fff_f000;

/// How far a non-blocking write got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Everything was written.
    Done,
    /// The socket stopped accepting data; wait for the next writable event.
    Blocked,
}

/// Sends as much of the unsent response header as the socket takes.
pub fn write_header(stream: &mut TcpStream, response: &mut ResponseBuffer) -> io::Result<Progress> {
    while !response.is_complete() {
        match stream.write(response.remaining()) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "connection closed while writing",
                ));
            }
            Ok(n) => response.advance(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Progress::Blocked),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Progress::Done)
}

/// Progress of a file body being sent after its header.
#[derive(Debug, Default)]
pub struct FileTransfer {
    file: Option<File>,
    len: u64,
    offset: libc::off_t,
    remaining: u64,
}

impl FileTransfer {
    /// Takes ownership of the file to send once the header is out.
    pub fn prepare(&mut self, body: Option<FileBody>) {
        match body {
            Some(body) => {
                self.len = body.len;
                self.file = Some(body.file);
            }
            None => self.finish(),
        }
        self.offset = 0;
        self.remaining = 0;
    }

    /// Whether a file body follows the header.
    pub fn is_pending(&self) -> bool {
        self.file.is_some()
    }

    /// Starts the transfer from the beginning of the file.
    pub fn rewind(&mut self) {
        self.offset = 0;
        self.remaining = self.len;
    }

    pub fn offset(&self) -> u64 {
        self.offset as u64
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Closes the file, if any.
    pub fn finish(&mut self) {
        self.file = None;
        self.len = 0;
        self.offset = 0;
        self.remaining = 0;
    }

    /// Moves file bytes straight to the socket until the file is done or
    /// the socket would block.
    pub fn send(&mut self, stream: &TcpStream) -> io::Result<Progress> {
        let Some(file) = self.file.as_ref() else {
            return Ok(Progress::Done);
        };

        while self.remaining > 0 {
            let count = self.remaining.min(MAX_SENDFILE_CHUNK as u64) as usize;
            match sendfile(stream.as_raw_fd(), file.as_raw_fd(), &mut self.offset, count) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "file shorter than announced",
                    ));
                }
                Ok(n) => self.remaining -= n as u64,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Progress::Blocked),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(Progress::Done)
    }
}

fn sendfile(out: RawFd, input: RawFd, offset: &mut libc::off_t, count: usize) -> io::Result<usize> {
    // SAFETY: both descriptors are owned by live objects for the duration of
    // the call, and `offset` is a valid exclusive pointer.
    let n = unsafe { libc::sendfile(out, input, offset, count) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}
