//! Shared helpers for end-to-end tests: a server on a background thread
//! serving a temporary directory, and blocking client utilities.

#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use httpc::config::Config;
use httpc::server::{Server, Shutdown};
use tempfile::TempDir;

pub const HELLO: &[u8] = b"Hello, World!\n";
pub const BIG_LEN: usize = 4 * 1024 * 1024;

/// Deterministic contents of `big.bin`.
pub fn big_contents() -> Vec<u8> {
    (0..BIG_LEN).map(|i| (i % 251) as u8).collect()
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
    shutdown: Shutdown,
    handle: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestServer {
    pub fn start() -> Self {
        Self::start_with(|_| {})
    }

    /// Starts a server on an ephemeral port; `tweak` adjusts the config
    /// after the listen address and document root are filled in.
    pub fn start_with(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), HELLO).unwrap();
        fs::write(dir.path().join("empty.txt"), b"").unwrap();
        fs::write(dir.path().join("big.bin"), big_contents()).unwrap();

        let mut config = Config::default();
        config.server.listen_addr = "127.0.0.1:0".to_string();
        config.server.max_connections = 64;
        config.static_files.root = dir.path().to_path_buf();
        tweak(&mut config);

        let mut server = Server::bind(&config).unwrap();
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();
        let handle = thread::spawn(move || server.run());

        Self {
            addr,
            dir,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream.set_nodelay(true).unwrap();
        stream
    }

    /// Stops the server and returns what `run` returned.
    pub fn stop(mut self) -> anyhow::Result<()> {
        self.shutdown.trigger();
        self.handle.take().unwrap().join().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown.trigger();
            let _ = handle.join();
        }
    }
}

/// Reads up to and including the blank line ending a response header.
pub fn read_header(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).unwrap();
        assert_eq!(
            n,
            1,
            "connection closed mid-header: {:?}",
            String::from_utf8_lossy(&head)
        );
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

pub fn content_length(head: &str) -> Option<usize> {
    head.lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .map(|v| v.trim().parse().unwrap())
}

pub fn read_body(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).unwrap();
    body
}

/// Sends `request` and reads back the header and, for `200 OK` to a GET,
/// the body.
pub fn exchange(stream: &mut TcpStream, request: &str) -> (String, Vec<u8>) {
    stream.write_all(request.as_bytes()).unwrap();
    let head = read_header(stream);
    let body = if request.starts_with("GET ") && head.starts_with("HTTP/1.1 200 ") {
        read_body(stream, content_length(&head).unwrap())
    } else {
        Vec::new()
    };
    (head, body)
}

/// True once the peer has closed: a read returns EOF or a reset.
pub fn is_closed(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 64];
    match stream.read(&mut buf) {
        Ok(0) => true,
        Ok(n) => panic!(
            "unexpected bytes: {:?}",
            String::from_utf8_lossy(&buf[..n])
        ),
        Err(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
        ),
    }
}
