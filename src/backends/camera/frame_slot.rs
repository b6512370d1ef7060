// SPDX-License-Identifier: GPL-3.0-only

//! Latest-frame slot shared between a capture producer and its stream handle

use super::types::CameraFrame;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;

/// Holds the most recent frame and signals when the first one arrives
///
/// Producers call [`FrameSlot::publish`]; consumers read with
/// [`FrameSlot::latest`] and await [`FrameSlot::wait_first_frame`].
pub struct FrameSlot {
    latest: Mutex<Option<CameraFrame>>,
    rendered: watch::Sender<bool>,
    live: AtomicBool,
    frames: AtomicU64,
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSlot {
    pub fn new() -> Self {
        let (rendered, _) = watch::channel(false);
        Self {
            latest: Mutex::new(None),
            rendered,
            live: AtomicBool::new(true),
            frames: AtomicU64::new(0),
        }
    }

    /// Store a new frame. Ignored once the slot is closed.
    pub fn publish(&self, frame: CameraFrame) {
        if !self.is_live() {
            return;
        }
        *self.latest.lock().unwrap() = Some(frame);
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.rendered.send_if_modified(|rendered| {
            let first = !*rendered;
            *rendered = true;
            first
        });
    }

    pub fn latest(&self) -> Option<CameraFrame> {
        self.latest.lock().unwrap().clone()
    }

    /// Resolves once a frame has been published
    pub async fn wait_first_frame(&self) {
        let mut rx = self.rendered.subscribe();
        if rx.wait_for(|rendered| *rendered).await.is_err() {
            // Sender lives as long as the slot, so this is unreachable while
            // borrowed; park rather than report a frame that never came.
            std::future::pending::<()>().await;
        }
    }

    /// Mark the slot closed and drop the held frame
    pub fn close(&self) {
        self.live.store(false, Ordering::SeqCst);
        *self.latest.lock().unwrap() = None;
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Number of frames published so far
    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}
