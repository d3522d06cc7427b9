//! Events emitted by the print-job worker back to its controller.

use std::path::PathBuf;

use image::RgbaImage;

use crate::photo::Photo;

/// Message severity for the progress log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Everything a job can report. The worker never raises; outcomes travel
/// exclusively through these events.
#[derive(Debug)]
pub enum Event {
    /// Progress-log line.
    Log { severity: Severity, message: String },
    /// Proportional progress, one tick per photo or page.
    Progress { done: usize, total: usize },
    /// Result of a prepare job: the photo list with crops resolved.
    Prepared(Vec<Photo>),
    /// Result of a preview job.
    PreviewReady(RgbaImage),
    /// A page file was written during export.
    PageWritten(PathBuf),
    /// Terminal event of every job. `completed` is false on cancellation
    /// or failure.
    Finished { completed: bool },
}
