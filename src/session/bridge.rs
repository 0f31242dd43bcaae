//! Turn serializer and sync/async bridge
//!
//! The presentation shell is synchronous; the agent is not. `TurnBridge`
//! owns one dedicated thread running a tokio runtime, created once and reused
//! for every turn. Commands reach it through a single-slot channel and the
//! caller blocks on a oneshot reply.
//!
//! Rejection rule: a submission made while another is in flight is refused
//! immediately with a `Busy` failure. Nothing is queued or coalesced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::core::{PilotError, Result};
use crate::session::lifecycle::SessionManager;
use crate::session::result::TurnResult;

struct TurnRequest {
    command: String,
    reply: oneshot::Sender<TurnResult>,
}

/// Clears the busy flag however the turn ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Synchronous front door to the agent session
pub struct TurnBridge {
    tx: Option<mpsc::Sender<TurnRequest>>,
    busy: AtomicBool,
    last_result: Mutex<Option<TurnResult>>,
    worker: Option<JoinHandle<()>>,
}

impl TurnBridge {
    /// Start the execution context and hand it the session
    pub fn start(manager: SessionManager) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (tx, rx) = mpsc::channel(1);

        let worker = thread::Builder::new()
            .name("webpilot-agent".to_string())
            .spawn(move || runtime.block_on(Self::worker_loop(manager, rx)))?;

        info!("Agent execution context started");

        Ok(Self {
            tx: Some(tx),
            busy: AtomicBool::new(false),
            last_result: Mutex::new(None),
            worker: Some(worker),
        })
    }

    async fn worker_loop(mut manager: SessionManager, mut rx: mpsc::Receiver<TurnRequest>) {
        while let Some(request) = rx.recv().await {
            debug!(command = %request.command, "Turn started");
            let result = manager.run_turn(&request.command).await;
            debug!(success = result.is_success(), "Turn finished");

            if request.reply.send(result).is_err() {
                error!("Turn result dropped: the caller went away");
            }
        }

        manager.shutdown().await;
    }

    /// Run one command to completion and return its result.
    ///
    /// Blocks the calling thread for the whole turn. If another turn is in
    /// flight, returns a `Busy` failure at once and leaves `last_result`
    /// untouched.
    ///
    /// # Panics
    ///
    /// Must be called from synchronous code, not from inside an async runtime.
    pub fn submit(&self, command: &str) -> TurnResult {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Submission rejected: turn in flight");
            return TurnResult::busy();
        }
        let _guard = BusyGuard(&self.busy);

        let result = self.dispatch(command);
        *self
            .last_result
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(result.clone());
        result
    }

    fn dispatch(&self, command: &str) -> TurnResult {
        let tx = match self.tx.as_ref() {
            Some(tx) => tx,
            None => {
                return TurnResult::from_error(PilotError::generation(
                    "the agent session has shut down",
                ))
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = TurnRequest {
            command: command.to_string(),
            reply: reply_tx,
        };

        if tx.blocking_send(request).is_err() {
            return TurnResult::from_error(PilotError::generation(
                "the agent execution context is not running",
            ));
        }

        reply_rx.blocking_recv().unwrap_or_else(|_| {
            TurnResult::from_error(PilotError::generation(
                "the agent stopped before finishing the turn",
            ))
        })
    }

    /// The most recent result, as last rendered
    pub fn last_result(&self) -> Option<TurnResult> {
        self.last_result
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Whether a turn is executing right now
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Stop accepting turns, close the tool connections and join the worker
    pub fn shutdown(&mut self) {
        // Closing the channel ends the worker loop
        self.tx.take();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Agent execution context panicked");
            }
        }
    }
}

impl Drop for TurnBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
