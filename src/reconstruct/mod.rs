//! Reconstruction engine: decoded containers → named save artifacts.
//!
//! Each [`Strategy`] maps the resolved containers of one user onto the file
//! layout the desktop builds of a game expect.  All strategies preserve the
//! container order of the index and keep no state between calls, so running
//! a strategy twice over the same containers yields the same artifacts.
//!
//! Artifact paths use `/` as separator; archivers turn those segments into
//! directories.

pub mod starfield;

use std::borrow::Cow;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use crate::fs::SaveFs;
use crate::handler::{HandlerArgs, Strategy};
use crate::notify::{Aborted, Notifier};
use crate::resolve::{Container, ResolvedFile};

pub use starfield::MissingPartPolicy;

#[derive(Error, Debug)]
pub enum ReconstructError {
    #[error("{strategy}: {detail}")]
    InvariantViolation { strategy: Strategy, detail: String },
    #[error("Missing part {index} of save \"{container}\"")]
    MissingPart { container: String, index: u32 },
    #[error("Invalid handler argument {key}=\"{value}\"")]
    InvalidArgument { key: &'static str, value: String },
    #[error(transparent)]
    Aborted(#[from] Aborted),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Artifacts ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// A resolved blob in the container store.
    File(PathBuf),
    /// Content synthesized during reconstruction.
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveArtifact {
    pub relative_path: String,
    pub source:        ArtifactSource,
}

impl SaveArtifact {
    pub fn file(relative_path: impl Into<String>, file: &ResolvedFile) -> Self {
        Self {
            relative_path: relative_path.into(),
            source:        ArtifactSource::File(file.path.clone()),
        }
    }

    pub fn bytes(relative_path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            relative_path: relative_path.into(),
            source:        ArtifactSource::Bytes(data.into()),
        }
    }

    pub fn read<'a>(&'a self, fs: &dyn SaveFs) -> io::Result<Cow<'a, [u8]>> {
        match &self.source {
            ArtifactSource::File(path) => fs.read(path).map(Cow::Owned),
            ArtifactSource::Bytes(data) => Ok(Cow::Borrowed(data.as_slice())),
        }
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

/// Run `strategy` over the resolved containers of one user.
///
/// Only Starfield reads blob contents; every other strategy just names the
/// resolved files.
pub fn reconstruct(
    strategy: Strategy,
    args: &HandlerArgs,
    containers: &[Container],
    fs: &dyn SaveFs,
    notifier: &mut dyn Notifier,
) -> Result<Vec<SaveArtifact>, ReconstructError> {
    debug!(%strategy, containers = containers.len(), "reconstructing saves");
    let artifacts = match strategy {
        Strategy::OneContainerOneFile => per_container(containers, |c| {
            Some(format!("{}{}", c.name, args.suffix()))
        }),
        Strategy::OneContainerManyFiles => single_container(strategy, containers)
            .iter()
            .flat_map(|c| &c.files)
            .map(|f| SaveArtifact::file(format!("{}{}", f.name, args.suffix()), f))
            .collect(),
        Strategy::OneContainerManyFilesFolder => containers
            .iter()
            .flat_map(|c| c.files.iter().map(move |f| (c, f)))
            .map(|(c, f)| SaveArtifact::file(format!("{}/{}", c.name, f.name), f))
            .collect(),
        Strategy::Control => control(containers),
        Strategy::Starfield => starfield::reassemble_all(containers, args, fs, notifier)?,
        Strategy::LiesOfP => per_container(containers, |c| {
            Some(format!("{}.sav", strip_numeric_prefix(&c.name)))
        }),
        Strategy::Palworld => per_container(containers, |c| {
            Some(format!("{}.sav", c.name.replace('-', "/")))
        }),
        Strategy::LikeADragon => like_a_dragon(containers, args),
        Strategy::Cricket24 => cricket_24(containers)?,
        Strategy::Forza => containers
            .iter()
            .flat_map(|c| c.files.iter().map(move |f| (c, f)))
            .map(|(c, f)| SaveArtifact::file(format!("{}.{}", c.name, f.name), f))
            .collect(),
        Strategy::ArcadeParadise => {
            let file = containers
                .first()
                .and_then(|c| c.files.first())
                .ok_or_else(|| ReconstructError::InvariantViolation {
                    strategy,
                    detail: "no save file in the first container".into(),
                })?;
            vec![SaveArtifact::file("RATSaveData.dat", file)]
        }
        Strategy::StateOfDecay2 => single_container(strategy, containers)
            .iter()
            .flat_map(|c| &c.files)
            .map(|f| {
                let base = f.name.rsplit('/').next().unwrap_or(&f.name);
                SaveArtifact::file(format!("{base}.sav"), f)
            })
            .collect(),
        Strategy::RailwayEmpire2 => containers
            .iter()
            .filter_map(|c| c.file("savegame").map(|f| SaveArtifact::file(c.name.clone(), f)))
            .collect(),
        Strategy::CoralIsland => per_container(containers, |c| {
            let name = format!("{}.sav", c.name);
            Some(match name.strip_prefix("Backup") {
                Some(rest) => format!("Backup/{rest}"),
                None => name,
            })
        }),
    };
    Ok(artifacts)
}

// ── Strategy helpers ─────────────────────────────────────────────────────────

/// One artifact per container from its first file.  Containers whose files
/// were all dropped during resolution produce nothing.
fn per_container<F>(containers: &[Container], name: F) -> Vec<SaveArtifact>
where
    F: Fn(&Container) -> Option<String>,
{
    containers
        .iter()
        .filter_map(|c| match c.files.first() {
            Some(file) => name(c).map(|n| SaveArtifact::file(n, file)),
            None => {
                debug!(container = %c.name, "container has no files, skipping");
                None
            }
        })
        .collect()
}

fn single_container(strategy: Strategy, containers: &[Container]) -> &[Container] {
    if containers.len() > 1 {
        warn!(%strategy, count = containers.len(), "expected a single container, using the first");
    }
    &containers[..containers.len().min(1)]
}

/// Split a container name into its parent path and final segment.
pub(crate) fn split_parent(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('/') {
        Some((parent, base)) => (Some(parent), base),
        None => (None, name),
    }
}

/// Drop a leading run of ASCII digits.  A name made only of digits is kept.
fn strip_numeric_prefix(name: &str) -> &str {
    let rest = name.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.is_empty() { name } else { rest }
}

fn control(containers: &[Container]) -> Vec<SaveArtifact> {
    let mut out = Vec::new();
    for c in containers {
        out.push(SaveArtifact::bytes(
            format!("{}/--containerDisplayName.chunk", c.name),
            c.name.as_bytes(),
        ));
        for f in &c.files {
            out.push(SaveArtifact::file(format!("{}/{}.chunk", c.name, f.name), f));
        }
    }
    out
}

fn like_a_dragon(containers: &[Container], args: &HandlerArgs) -> Vec<SaveArtifact> {
    let mut out = Vec::new();
    for c in containers {
        let (parent, base) = split_parent(&c.name);
        let base = match base {
            "datasav" => "data.sav",
            "datasys" => "data.sys",
            other     => other,
        };
        let target = match parent {
            Some(p) => format!("{p}/{base}"),
            None    => base.to_owned(),
        };
        let named = |n: &str| c.files.iter().find(|f| f.name.eq_ignore_ascii_case(n));

        if let Some(data) = named("data") {
            out.push(SaveArtifact::file(target, data));
        }
        if let (Some(format), Some(icon)) = (args.icon_format(), named("icon")) {
            let stem = parent.unwrap_or(base);
            out.push(SaveArtifact::file(format!("{stem}_icon.{format}"), icon));
        }
    }
    out
}

fn cricket_24(containers: &[Container]) -> Result<Vec<SaveArtifact>, ReconstructError> {
    let mut out = Vec::new();
    for c in containers {
        for f in &c.files {
            let name = f.name.strip_suffix(".CHUNK0").unwrap_or(&f.name);
            if name.contains("CHUNK") {
                return Err(ReconstructError::InvariantViolation {
                    strategy: Strategy::Cricket24,
                    detail:   format!("unexpected chunked file \"{}\" in \"{}\"", f.name, c.name),
                });
            }
            out.push(SaveArtifact::file(format!("{}/{name}.SAV", c.name), f));
        }
    }
    Ok(out)
}
