//! Interrupt handling.
//!
//! The signal handler only flips a flag and wakes the poll; the event loop
//! checks the flag once per iteration and does the actual teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use mio::Waker;

/// Stops a running server from any thread.
#[derive(Debug, Clone)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl Shutdown {
    pub fn new(waker: Waker) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            waker: Arc::new(waker),
        }
    }

    /// Sets the flag and wakes the loop. Returns `true` if it was already set.
    pub fn trigger(&self) -> bool {
        let already = self.flag.swap(true, Ordering::SeqCst);
        if let Err(e) = self.waker.wake() {
            tracing::warn!(error = %e, "failed to wake event loop");
        }
        already
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Install a SIGINT/SIGTERM handler that triggers `shutdown`.
///
/// A second signal exits the process immediately.
pub fn install_signal_handler(shutdown: Shutdown) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        if shutdown.trigger() {
            tracing::warn!("Received second signal, forcing immediate exit");
            std::process::exit(1);
        }
        tracing::info!("Shutdown signal received");
    })
    .context("failed to set signal handler")
}
