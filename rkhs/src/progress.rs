/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines progress reporting messages, sinks, and helper functions for long-running processes.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Progress reporting primitives for landmark selection, augmentation and alignment.

use std::fmt::Debug;
use std::sync::{Arc, mpsc};
use std::thread;

/// Progress events emitted during long-running computations.
#[derive(Debug, Clone)]
pub enum ProgressMsg {
    /// A landmark was added to the selected set.
    SelectionStep {
        selected: usize,
        target: usize,
        residual: f64,
        progress: f64,
    },

    /// A full sweep of the pairwise-swap descent finished.
    DescentSweep {
        sweep: usize,
        objective: f64,
        swaps: usize,
    },

    /// The oldest points were dropped to respect the pool cap.
    PoolEvicted { num_evicted: usize },

    /// Arbitrary informational message.
    Message { message: String },
}

/// Sink that consumes progress messages.
pub trait ProgressSink: Send + Sync + Debug {
    fn emit(&self, msg: ProgressMsg);
}

/// Progress sink that forwards messages over a channel.
#[derive(Debug)]
pub struct ClosureSink {
    tx: mpsc::SyncSender<ProgressMsg>,
}

impl ProgressSink for ClosureSink {
    #[inline]
    fn emit(&self, msg: ProgressMsg) {
        let _ = self.tx.try_send(msg);
    }
}

/// Spawns a listener thread that runs a handler closure for each progress message.
///
/// The listener exits once every clone of the returned sink has been dropped.
pub fn closure_sink<F>(
    buffer: usize,
    mut handler: F,
) -> (Arc<dyn ProgressSink>, thread::JoinHandle<()>)
where
    F: FnMut(ProgressMsg) + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel::<ProgressMsg>(buffer.max(1));
    let sink: Arc<dyn ProgressSink> = Arc::new(ClosureSink { tx });

    let handle = thread::spawn(move || {
        while let Ok(msg) = rx.recv() {
            handler(msg);
        }
    });

    (sink, handle)
}

#[inline]
pub(crate) fn emit(sink: Option<&Arc<dyn ProgressSink>>, msg: ProgressMsg) {
    if let Some(sink) = sink {
        sink.emit(msg);
    }
}

/// Fraction of a greedy selection that is complete, in `[0, 1]`.
///
/// Whichever of the point budget or the residual tolerance is closer to
/// being met determines the progress.
#[inline]
pub(crate) fn selection_progress(
    selected: usize,
    target: usize,
    residual: f64,
    start_residual: f64,
    tol: f64,
) -> f64 {
    let by_count = if target == 0 {
        1.0
    } else {
        selected as f64 / target as f64
    };

    let by_residual = if residual <= tol || start_residual <= tol {
        1.0
    } else if tol > 0.0 && residual > 0.0 {
        (start_residual.log10() - residual.log10()) / (start_residual.log10() - tol.log10())
    } else {
        0.0
    };

    by_count.max(by_residual).clamp(0.0, 1.0)
}
