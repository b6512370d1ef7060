// SPDX-License-Identifier: GPL-3.0-only

//! Isolated decode worker
//!
//! Symbol decoding is CPU-bound and may come from code we do not trust to
//! stay well behaved, so it runs on its own thread behind a request channel.
//! The worker reports ready once its decoder is built. A decoder that errors
//! or panics produces `None` for that request; the worker keeps serving.

use super::fallback::{DecodeRequest, DecodeService, DecodedSymbol};
use super::Point;
use crate::constants::DECODE_WORKER_THREAD;
use async_trait::async_trait;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

/// Raw output of a [`SymbolDecoder`]
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    /// Engine symbology tag
    pub symbol: String,
    pub data: String,
    /// Every point the engine reports for the symbol, in any order
    pub points: Vec<(f32, f32)>,
}

/// Synchronous decoding engine run inside the worker
pub trait SymbolDecoder: Send {
    /// Scan a tightly packed luma raster for the first readable symbol
    fn scan(&mut self, width: u32, height: u32, luma: &[u8]) -> Result<Option<ScanResult>, String>;
}

struct Job {
    request: DecodeRequest,
    reply: oneshot::Sender<Option<DecodedSymbol>>,
}

/// Handle to the decode thread
pub struct DecodeWorker {
    jobs: mpsc::UnboundedSender<Job>,
    ready: watch::Receiver<bool>,
}

impl DecodeWorker {
    /// Start the worker; `factory` builds the decoder on the worker thread
    pub fn spawn<F>(factory: F) -> std::io::Result<Self>
    where
        F: FnOnce() -> Box<dyn SymbolDecoder> + Send + 'static,
    {
        let (jobs, mut job_rx) = mpsc::unbounded_channel::<Job>();
        let (ready_tx, ready) = watch::channel(false);

        thread::Builder::new()
            .name(DECODE_WORKER_THREAD.to_string())
            .spawn(move || {
                let mut decoder = match panic::catch_unwind(AssertUnwindSafe(factory)) {
                    Ok(decoder) => decoder,
                    Err(_) => {
                        error!("Decoder initialization panicked");
                        return;
                    }
                };

                let _ = ready_tx.send(true);
                info!("Decode worker ready");

                while let Some(job) = job_rx.blocking_recv() {
                    let result = run_job(decoder.as_mut(), &job.request);
                    let _ = job.reply.send(result);
                }

                debug!("Decode worker exiting");
            })?;

        Ok(Self { jobs, ready })
    }
}

fn run_job(decoder: &mut dyn SymbolDecoder, request: &DecodeRequest) -> Option<DecodedSymbol> {
    let scan = panic::catch_unwind(AssertUnwindSafe(|| {
        decoder.scan(request.width, request.height, &request.luma)
    }));

    let result = match scan {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => {
            debug!(error = %e, "Decoder error");
            return None;
        }
        Err(_) => {
            warn!("Decoder panicked");
            return None;
        }
    };

    let polygon = if request.options.include_polygon {
        convex_hull(&result.points)
    } else {
        Vec::new()
    };

    Some(DecodedSymbol {
        data: result.data,
        symbol: result.symbol,
        polygon,
    })
}

#[async_trait]
impl DecodeService for DecodeWorker {
    async fn wait_ready(&self) -> bool {
        let mut ready = self.ready.clone();
        ready.wait_for(|ready| *ready).await.is_ok()
    }

    async fn decode(&self, request: DecodeRequest) -> Option<DecodedSymbol> {
        let (reply, response) = oneshot::channel();
        if self.jobs.send(Job { request, reply }).is_err() {
            warn!("Decode worker is gone");
            return None;
        }
        response.await.ok().flatten()
    }
}

/// Convex hull of a point set, counter-clockwise, without collinear points
pub fn convex_hull(points: &[(f32, f32)]) -> Vec<Point> {
    let mut pts: Vec<(f32, f32)> = points.to_vec();
    pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    pts.dedup();

    if pts.len() < 3 {
        return pts.into_iter().map(|(x, y)| Point::new(x, y)).collect();
    }

    fn cross(o: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    }

    let mut hull: Vec<(f32, f32)> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();

    hull.into_iter().map(|(x, y)| Point::new(x, y)).collect()
}
