//! Event loop, connection pool and process plumbing.

pub mod event_loop;
pub mod listener;
pub mod pool;
pub mod signal;

pub use event_loop::Server;
pub use signal::Shutdown;
