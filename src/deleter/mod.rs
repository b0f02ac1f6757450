/// Deleter module — orchestrates recursive directory deletion.
///
/// The core walker in [`walk`] is synchronous and single-threaded; hosts
/// that want it off their UI thread use [`start_delete`], which runs the
/// walk on a named background thread and bridges progress and
/// cancellation through a channel plus an atomic flag. Hosts with their
/// own threading just implement [`progress::ProgressSink`] and drive
/// [`walk::DeleteWalker`] directly.
pub mod progress;
pub mod walk;

use progress::{DeleteEvent, ProgressSink};
use walk::{DeleteWalker, WalkStatus};

use crossbeam_channel::{Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::info;

/// Maximum number of progress messages that may queue up in the channel.
///
/// Deletion emits at most one `Advanced` per direct child of the root
/// (itself capped by the estimation pass) plus a handful of lifecycle
/// messages, so this bound is generous; if a host stops draining, the
/// walk stalls at the next progress point rather than consuming
/// unbounded heap.
pub const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Handle to a running or completed delete. Allows cancellation and
/// receiving progress updates.
pub struct DeleteHandle {
    /// Receiver for progress updates from the delete thread.
    pub events_rx: Receiver<DeleteEvent>,
    /// Flag to request cancellation.
    cancel_flag: Arc<AtomicBool>,
    /// Join handle for the delete thread.
    _thread: Option<thread::JoinHandle<()>>,
}

impl DeleteHandle {
    /// Request the walk to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

/// Sink that bridges the walker to a channel and a shared cancel flag.
///
/// The flag is flipped from the host thread (a cancel button, a drop
/// guard) while the walker polls it at checkpoints; `Relaxed` is enough
/// because each checkpoint re-reads the flag and no other state is
/// published through it.
struct ChannelSink {
    events_tx: Sender<DeleteEvent>,
    cancel_flag: Arc<AtomicBool>,
}

impl ProgressSink for ChannelSink {
    fn estimate(&self, total: u64) {
        let _ = self.events_tx.send(DeleteEvent::Estimated { total });
    }

    fn advance(&self, units: u64) {
        let _ = self.events_tx.send(DeleteEvent::Advanced { units });
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

/// Start deleting `root` on a background thread.
///
/// Returns a [`DeleteHandle`] for receiving progress and requesting
/// cancellation. The final event is always [`DeleteEvent::Complete`] or
/// [`DeleteEvent::Cancelled`]; per-entry failures never surface here,
/// they are logged and counted in the summary.
pub fn start_delete(root: PathBuf) -> DeleteHandle {
    let (events_tx, events_rx) = crossbeam_channel::bounded::<DeleteEvent>(EVENT_CHANNEL_CAPACITY);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel_flag.clone();

    let thread = thread::Builder::new()
        .name("sweepdir-deleter".into())
        .spawn(move || {
            info!("Starting delete of {}", root.display());

            let sink = ChannelSink {
                events_tx: events_tx.clone(),
                cancel_flag: cancel_clone,
            };
            let report = DeleteWalker::new(&root, Some(&sink)).run();

            let _ = events_tx.send(match report.status {
                WalkStatus::Completed => DeleteEvent::Complete {
                    summary: report.summary,
                    duration: report.duration,
                },
                WalkStatus::Cancelled => DeleteEvent::Cancelled {
                    summary: report.summary,
                },
            });
        })
        .expect("failed to spawn deleter thread");

    DeleteHandle {
        events_rx,
        cancel_flag,
        _thread: Some(thread),
    }
}
