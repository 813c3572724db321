//! Sync warnings and the [`Notifier`] capability.
//!
//! Conditions that suggest the cloud sync of a save directory is incomplete
//! never abort decoding on their own.  They are raised as [`SyncWarning`]s;
//! the notifier decides whether processing of the current unit continues.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use crate::reader::Guid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncWarning {
    /// The index names a container whose `container.<N>` table is absent.
    MissingContainer { container: String },
    /// Neither candidate blob of a file exists.
    MissingFile { container: String, file: String },
    /// Both candidate blobs of a file exist and nothing says which is current.
    AmbiguousFile { container: String, file: String, primary: Guid, secondary: Guid },
    /// A reassembled save is missing one of its parts.
    MissingPart { container: String, index: u32 },
    /// Backup directories made by the Xbox app were skipped.
    BackupsSkipped { dir: PathBuf },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::MissingContainer { container } => {
                write!(f, "Missing container \"{container}\"")
            }
            SyncWarning::MissingFile { container, file } => {
                write!(f, "Missing file \"{file}\" inside container \"{container}\"")
            }
            SyncWarning::AmbiguousFile { container, file, primary, secondary } => write!(
                f,
                "Two files exist for container \"{container}\" file \"{file}\": \
                 {primary} and {secondary}, can't choose one"
            ),
            SyncWarning::MissingPart { container, index } => {
                write!(f, "Missing part {index} of save \"{container}\"")
            }
            SyncWarning::BackupsSkipped { dir } => {
                write!(f, "Skipped Xbox app backups in {}", dir.display())
            }
        }
    }
}

impl SyncWarning {
    /// Whether the warning means extracted saves may be corrupt, as opposed
    /// to merely incomplete.
    pub fn is_sync_problem(&self) -> bool {
        !matches!(self, SyncWarning::BackupsSkipped { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    Continue,
    Abort,
}

/// Processing of the current unit was stopped by the notifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Aborted after sync warning: {0}")]
pub struct Aborted(pub SyncWarning);

/// Receives sync warnings and blocks until they are acknowledged.
pub trait Notifier {
    fn notify(&mut self, warning: &SyncWarning) -> Acknowledgement;
}

impl<F> Notifier for F
where
    F: FnMut(&SyncWarning) -> Acknowledgement,
{
    fn notify(&mut self, warning: &SyncWarning) -> Acknowledgement {
        self(warning)
    }
}

/// Log the warning and pass it to the notifier.
pub fn raise(notifier: &mut dyn Notifier, warning: SyncWarning) -> Result<(), Aborted> {
    warn!(%warning, "sync warning");
    match notifier.notify(&warning) {
        Acknowledgement::Continue => Ok(()),
        Acknowledgement::Abort    => Err(Aborted(warning)),
    }
}

/// Always continues.  Warnings are already logged by [`raise`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, _warning: &SyncWarning) -> Acknowledgement {
        Acknowledgement::Continue
    }
}

/// Keeps every warning it receives and always continues.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub warnings: Vec<SyncWarning>,
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, warning: &SyncWarning) -> Acknowledgement {
        self.warnings.push(warning.clone());
        Acknowledgement::Continue
    }
}
