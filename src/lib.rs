//! httpc - single-threaded static file server
//!
//! Non-blocking HTTP/1.1 file serving over one edge-triggered event loop
//! and a fixed pool of connection slots.

#[cfg(not(target_os = "linux"))]
compile_error!("httpc relies on Linux sendfile(2)");

pub mod config;
pub mod http;
pub mod server;
