//! Zip output for reconstructed saves.
//!
//! Artifact paths are written verbatim as entry names, so `/` segments
//! become folders in the archive.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{self, Seek, Write};
use std::path::Path;

use chrono::{DateTime, TimeZone};
use thiserror::Error;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::fs::SaveFs;
use crate::reconstruct::SaveArtifact;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Two artifacts share the path \"{0}\"")]
    DuplicatePath(String),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// `<game>_<user>_<YYYY-MM-DD_HH_MM_SS>.zip`, with the game name lowercased
/// and made filename-safe.
pub fn zip_file_name<Tz>(game_name: &str, user_label: &str, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let game = game_name
        .replace([' ', ':'], "_")
        .replace('\'', "")
        .to_lowercase();
    format!("{game}_{user_label}_{}.zip", at.format("%Y-%m-%d_%H_%M_%S"))
}

/// Short BLAKE3 digest of an artifact's content, for listings.
pub fn short_digest(data: &[u8]) -> String {
    hex::encode(&blake3::hash(data).as_bytes()[..6])
}

pub fn write_zip<W: Write + Seek>(
    writer: W,
    artifacts: &[SaveArtifact],
    fs: &dyn SaveFs,
) -> Result<W, ArchiveError> {
    let mut seen = HashSet::new();
    for a in artifacts {
        if !seen.insert(a.relative_path.as_str()) {
            return Err(ArchiveError::DuplicatePath(a.relative_path.clone()));
        }
    }

    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    for artifact in artifacts {
        let data = artifact.read(fs)?;
        zip.start_file(artifact.relative_path.as_str(), options)?;
        zip.write_all(&data)?;
        debug!(entry = %artifact.relative_path, bytes = data.len(), "archived");
    }
    Ok(zip.finish()?)
}

/// Write `artifacts` to a new zip at `path`.  Never overwrites.
pub fn create_zip(path: &Path, artifacts: &[SaveArtifact], fs: &dyn SaveFs) -> Result<(), ArchiveError> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    write_zip(file, artifacts, fs)?.sync_all()?;
    Ok(())
}
