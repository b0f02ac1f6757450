/// Progress reporting for the delete walker.
///
/// The walker never talks to a UI directly. It reports through the
/// [`ProgressSink`] capability, which the host binds to whatever progress
/// surface it owns (a dialog, a status bar, nothing at all). The sink also
/// carries the cancellation flag: cancellation is *observed* by the walker,
/// never initiated by it.
use std::time::Duration;

use crate::deleter::walk::DeleteSummary;

/// Capability injected into the walker for progress and cancellation.
///
/// All methods take `&self`: a real sink is shared between the walk thread
/// and whoever owns the cancel button, so implementations use interior
/// mutability (atomics, channels). The cancelled flag may flip at any
/// moment from another thread; the walker reads it fresh at every
/// checkpoint and assumes no ordering beyond that, so `Ordering::Relaxed`
/// is enough on the implementation side.
pub trait ProgressSink {
    /// Set (or refine) the total number of work units for this walk.
    ///
    /// Called at most once, before any filesystem entry is visited.
    fn estimate(&self, total: u64);

    /// Report `units` of completed work.
    ///
    /// The walker guarantees the cumulative total never exceeds the value
    /// passed to [`estimate`](Self::estimate).
    fn advance(&self, units: u64);

    /// Whether cancellation has been requested.
    fn is_cancelled(&self) -> bool;
}

/// Sink used when the caller supplies none: never cancelled, ignores
/// progress. With this sink the walker also skips the root-listing
/// estimation step entirely.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn estimate(&self, _total: u64) {}

    fn advance(&self, _units: u64) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Progress updates sent from the delete thread to the host.
///
/// These carry only lightweight counters; per-entry diagnostics go to the
/// `tracing` log stream instead. Partial failure is visible only as a
/// count — a host that needs to know *what* survived re-inspects the
/// filesystem afterwards.
#[derive(Debug)]
pub enum DeleteEvent {
    /// Total work units for this walk (direct entries of the root,
    /// capped), sent once before deletion starts.
    Estimated { total: u64 },
    /// `units` of work completed. One unit corresponds to one direct
    /// child directory of the root fully processed.
    Advanced { units: u64 },
    /// The walk ran to the end of the tree.
    Complete {
        summary: DeleteSummary,
        duration: Duration,
    },
    /// The walk stopped at a cancellation checkpoint. Entries deleted
    /// before the checkpoint stay deleted.
    Cancelled { summary: DeleteSummary },
}
