//! Dual-GUID file resolution.
//!
//! Each file table row names two candidate blobs.  Resolution is stateless:
//!
//! | GUIDs | Blobs on disk | Result |
//! |-------|---------------|--------|
//! | equal | any | the single candidate |
//! | differ | exactly one | that one |
//! | differ | none | [`ResolveError::MissingFile`] |
//! | differ | both | [`ResolveError::AmbiguousFile`] |
//!
//! When both blobs exist the file is dropped rather than guessing which
//! copy the sync left current.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::container::FileDescriptor;
use crate::fs::SaveFs;
use crate::notify::{raise, Aborted, Notifier, SyncWarning};
use crate::reader::Guid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Missing file \"{file}\"")]
    MissingFile { file: String },
    #[error("Two copies exist for file \"{file}\": {primary} and {secondary}")]
    AmbiguousFile { file: String, primary: Guid, secondary: Guid },
}

impl ResolveError {
    pub fn into_warning(self, container: &str) -> SyncWarning {
        let container = container.to_owned();
        match self {
            ResolveError::MissingFile { file } => SyncWarning::MissingFile { container, file },
            ResolveError::AmbiguousFile { file, primary, secondary } => {
                SyncWarning::AmbiguousFile { container, file, primary, secondary }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub name:   String,
    pub path:   PathBuf,
    pub exists: bool,
}

/// A container after its file table has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name:   String,
    pub number: u8,
    pub files:  Vec<ResolvedFile>,
}

impl Container {
    pub fn file(&self, name: &str) -> Option<&ResolvedFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

pub fn resolve_file(
    fs: &dyn SaveFs,
    container_dir: &Path,
    file: &FileDescriptor,
) -> Result<ResolvedFile, ResolveError> {
    let primary = container_dir.join(file.primary_guid.to_hex_upper());

    if file.has_single_copy() {
        let exists = fs.is_file(&primary);
        return Ok(ResolvedFile { name: file.name.clone(), path: primary, exists });
    }

    let secondary = container_dir.join(file.secondary_guid.to_hex_upper());
    let path = match (fs.is_file(&primary), fs.is_file(&secondary)) {
        (true, false) => primary,
        (false, true) => secondary,
        (true, true) => {
            return Err(ResolveError::AmbiguousFile {
                file:      file.name.clone(),
                primary:   file.primary_guid,
                secondary: file.secondary_guid,
            })
        }
        (false, false) => return Err(ResolveError::MissingFile { file: file.name.clone() }),
    };
    debug!(file = %file.name, path = %path.display(), "resolved stale GUID reference");
    Ok(ResolvedFile { name: file.name.clone(), path, exists: true })
}

/// Resolve a container's file table.  Unresolvable rows are reported to the
/// notifier and dropped; order is otherwise preserved.
pub fn resolve_files(
    fs: &dyn SaveFs,
    container_dir: &Path,
    container_name: &str,
    files: &[FileDescriptor],
    notifier: &mut dyn Notifier,
) -> Result<Vec<ResolvedFile>, Aborted> {
    let mut resolved = Vec::with_capacity(files.len());
    for file in files {
        match resolve_file(fs, container_dir, file) {
            Ok(r)    => resolved.push(r),
            Err(err) => raise(notifier, err.into_warning(container_name))?,
        }
    }
    Ok(resolved)
}
