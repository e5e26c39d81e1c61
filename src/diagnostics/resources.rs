// SPDX-License-Identifier: MPL-2.0
//! Native resource accounting.
//!
//! Every adapter that owns a native handle (demux context, codec context,
//! scaler, resampler, encoder) holds a [`ResourceGuard`]. The guard bumps a
//! per-kind counter on creation and decrements it on drop, so a session can
//! prove that closing it released everything it opened.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Category of native handle being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Source,
    Decoder,
    VideoConverter,
    AudioResampler,
    Recorder,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Source,
        ResourceKind::Decoder,
        ResourceKind::VideoConverter,
        ResourceKind::AudioResampler,
        ResourceKind::Recorder,
    ];

    fn slot(self) -> usize {
        match self {
            ResourceKind::Source => 0,
            ResourceKind::Decoder => 1,
            ResourceKind::VideoConverter => 2,
            ResourceKind::AudioResampler => 3,
            ResourceKind::Recorder => 4,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Source => "source",
            ResourceKind::Decoder => "decoder",
            ResourceKind::VideoConverter => "video converter",
            ResourceKind::AudioResampler => "audio resampler",
            ResourceKind::Recorder => "recorder",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct Counters {
    live: [AtomicI64; 5],
    opened: [AtomicI64; 5],
}

/// Shared counter of live native handles.
///
/// Cloning shares the same counters.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    counters: Arc<Counters>,
}

impl ResourceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly opened handle and returns its guard.
    #[must_use]
    pub fn acquire(&self, kind: ResourceKind) -> ResourceGuard {
        self.counters.live[kind.slot()].fetch_add(1, Ordering::SeqCst);
        self.counters.opened[kind.slot()].fetch_add(1, Ordering::SeqCst);
        ResourceGuard {
            tracker: self.clone(),
            kind,
        }
    }

    /// Handles of `kind` currently alive.
    #[must_use]
    pub fn live(&self, kind: ResourceKind) -> i64 {
        self.counters.live[kind.slot()].load(Ordering::SeqCst)
    }

    /// Total handles of `kind` ever opened.
    #[must_use]
    pub fn opened(&self, kind: ResourceKind) -> i64 {
        self.counters.opened[kind.slot()].load(Ordering::SeqCst)
    }

    /// Sum of live handles across all kinds.
    #[must_use]
    pub fn live_total(&self) -> i64 {
        ResourceKind::ALL.iter().map(|&kind| self.live(kind)).sum()
    }

    fn release(&self, kind: ResourceKind) {
        self.counters.live[kind.slot()].fetch_sub(1, Ordering::SeqCst);
    }
}

/// RAII token for one live native handle.
#[derive(Debug)]
pub struct ResourceGuard {
    tracker: ResourceTracker,
    kind: ResourceKind,
}

impl ResourceGuard {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.tracker.release(self.kind);
    }
}
