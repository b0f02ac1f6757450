/// SweepDir — recursive directory deletion with progress and cancellation.
///
/// This crate contains the delete engine only, with zero UI dependencies.
/// It is designed to be embedded in larger tools (an IDE clearing a
/// workspace directory, a build system wiping an output tree) that bring
/// their own progress rendering and their own decision about *what* to
/// delete.
///
/// # Modules
///
/// - [`deleter`] — The recursive delete walker, the [`deleter::progress::ProgressSink`]
///   capability it reports through, and a background-thread runner with
///   channel-based progress delivery.
pub mod deleter;

pub use deleter::progress::{DeleteEvent, NoopSink, ProgressSink};
pub use deleter::walk::{DeleteReport, DeleteSummary, DeleteWalker, WalkStatus};
pub use deleter::{start_delete, DeleteHandle};
