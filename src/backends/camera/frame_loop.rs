// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for blocking capture loops
//!
//! Platform capture APIs (V4L2 mmap streams) block on every dequeue, so they
//! run on a dedicated thread. The thread opens the device itself because the
//! stream borrows it, then reports readiness through [`CaptureContext::ready`]
//! so acquisition failures surface to the caller of [`CaptureThread::spawn`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Handle given to the capture body
pub struct CaptureContext {
    stop_signal: Arc<AtomicBool>,
    ready_tx: Option<mpsc::Sender<Result<(), String>>>,
}

impl CaptureContext {
    /// Report that the device is open and frames will follow
    pub fn ready(&mut self) {
        if let Some(tx) = self.ready_tx.take() {
            let _ = tx.send(Ok(()));
        }
    }

    /// Whether the owner asked the loop to end
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

/// Controller for a capture loop running in its own thread
pub struct CaptureThread {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureThread {
    /// Start a capture body and wait until it reports readiness or fails
    ///
    /// An `Err` returned by the body before [`CaptureContext::ready`] is
    /// handed back to the caller; later errors are only logged.
    pub fn spawn<F>(name: &str, body: F) -> Result<Self, String>
    where
        F: FnOnce(&mut CaptureContext) -> Result<(), String> + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let mut context = CaptureContext {
            stop_signal: Arc::clone(&stop_signal),
            ready_tx: Some(ready_tx),
        };
        let thread_name = name.to_string();

        info!(name = %name, "Starting capture thread");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let result = body(&mut context);
                match (result, context.ready_tx.take()) {
                    (Err(e), Some(tx)) => {
                        let _ = tx.send(Err(e));
                    }
                    (Err(e), None) => {
                        warn!(name = %thread_name, error = %e, "Capture loop failed");
                    }
                    (Ok(()), Some(tx)) => {
                        let _ = tx.send(Err("Capture ended before the first frame".to_string()));
                    }
                    (Ok(()), None) => {}
                }
                info!(name = %thread_name, "Capture thread exiting");
            })
            .map_err(|e| format!("Failed to spawn capture thread: {}", e))?;

        let mut controller = Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(controller),
            Ok(Err(e)) => {
                controller.join();
                Err(e)
            }
            Err(_) => {
                controller.join();
                Err("Capture thread exited during initialization".to_string())
            }
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture thread stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!(name = %self.name, "Capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn test_body_runs_until_stopped() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = CaptureThread::spawn("test-loop", move |ctx| {
            ctx.ready();
            while !ctx.should_stop() {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
            }
            Ok(())
        })
        .unwrap();

        assert!(controller.is_running());
        thread::sleep(Duration::from_millis(20));
        controller.stop();
        assert!(!controller.is_running());
        assert!(counter.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_init_failure_is_reported() {
        let result = CaptureThread::spawn("test-fail-init", |_ctx| {
            Err("no such device".to_string())
        });

        assert_eq!(result.err().as_deref(), Some("no such device"));
    }

    #[test]
    fn test_body_ending_without_ready_is_an_error() {
        let result = CaptureThread::spawn("test-no-ready", |_ctx| Ok(()));
        assert!(result.is_err());
    }
}
