//! HTTP protocol implementation.
//!
//! A small HTTP/1.1 static file server: request headers are tokenized in
//! place, the response header is built into a fixed buffer, and file bodies
//! go from the file to the socket with `sendfile`.
//!
//! # Architecture
//!
//! - **`connection`**: Per-slot connection record and its state machine
//! - **`parser`**: Finds the end of a header block and tokenizes it
//! - **`request`**: Tokens and the request view built on them
//! - **`handler`**: Picks the status, opens the file, writes the header
//! - **`response`**: Status codes and the fixed response buffer
//! - **`date`**: RFC 1123 dates for `Last-Modified`
//! - **`writer`**: Non-blocking header writes and file transfer
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────────┐
//!        │  ReadingHeader  │ ← Wait for a full header block
//!        └────────┬────────┘
//!                 │ Blank line received, response built
//!                 ▼
//!        ┌─────────────────┐
//!        │  WritingHeader  │ ← Send the response header
//!        └────────┬────────┘
//!                 ├─ File follows → SendingFile
//!                 ▼
//!        ┌─────────────────┐
//!        │   SendingFile   │ ← sendfile until the body is out
//!        └────────┬────────┘
//!                 ├─ Keep-Alive → ReadingHeader (same connection)
//!                 └─ Close → Closed
//! ```
//!
//! Any read, write or transfer failure closes the connection from whatever
//! state it is in.

pub mod connection;
pub mod date;
pub mod handler;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
