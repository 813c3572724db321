//! Starfield save reassembly.
//!
//! The desktop build stores one `.sfs` file per save.  The store build splits
//! it into parts inside one container per save, named `Saves/<save>.sfs`.
//! Two part layouts exist:
//!
//! | Layout | Parts | Index |
//! |--------|-------|-------|
//! | toc    | `toc` (dropped), `BlobData<N>` | `N` |
//! | legacy | `BETHESDAPFH`, `P<n>P` | `0`, `n + 1` |
//!
//! Both layouts number parts from 0.  Parts are concatenated in index
//! order, and every part except the last is padded to a 16-byte boundary
//! with a prefix of `"padding\0padding\0"`.

use std::collections::BTreeMap;
use std::io;

use tracing::{debug, info};

use super::{split_parent, ReconstructError, SaveArtifact};
use crate::fs::SaveFs;
use crate::handler::{HandlerArgs, Strategy};
use crate::notify::{raise, Notifier, SyncWarning};
use crate::resolve::{Container, ResolvedFile};

/// Parent folder of save containers; other containers hold settings.
pub const SAVES_FOLDER: &str = "Saves";

pub const ALIGNMENT: usize = 16;

pub const PADDING: &[u8; ALIGNMENT] = b"padding\0padding\0";

const HEADER_PART: &str = "BETHESDAPFH";
const TOC_PART: &str = "toc";
const BLOB_PREFIX: &str = "BlobData";

/// What to do when a part of a save is missing from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPartPolicy {
    /// Warn and build the save from the parts that exist.
    #[default]
    Skip,
    /// Fail the game.
    Fail,
}

impl MissingPartPolicy {
    /// Read from the `missing_parts` handler argument.
    pub fn from_args(args: &HandlerArgs) -> Result<Self, ReconstructError> {
        match args.get("missing_parts") {
            None | Some("skip") => Ok(MissingPartPolicy::Skip),
            Some("fail") => Ok(MissingPartPolicy::Fail),
            Some(other) => Err(ReconstructError::InvalidArgument {
                key:   "missing_parts",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartLayout {
    Toc,
    Legacy,
}

impl PartLayout {
    pub fn detect(container: &Container) -> Self {
        if container.files.iter().any(|f| f.name == TOC_PART) {
            PartLayout::Toc
        } else {
            PartLayout::Legacy
        }
    }

    /// Ordinal of a part file, `None` if the name does not fit the layout.
    pub fn part_index(self, name: &str) -> Option<u32> {
        match self {
            PartLayout::Toc => name.strip_prefix(BLOB_PREFIX)?.parse().ok(),
            PartLayout::Legacy if name == HEADER_PART => Some(0),
            PartLayout::Legacy => {
                let n: u32 = name.strip_prefix('P')?.strip_suffix('P')?.parse().ok()?;
                n.checked_add(1)
            }
        }
    }
}

/// Concatenate parts in order, padding every boundary but the last to
/// [`ALIGNMENT`].
pub fn concat_parts<I>(parts: I) -> Vec<u8>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    let mut out = Vec::new();
    let mut parts = parts.into_iter().peekable();
    while let Some(part) = parts.next() {
        out.extend_from_slice(&part);
        let rem = part.len() % ALIGNMENT;
        if rem != 0 && parts.peek().is_some() {
            out.extend_from_slice(&PADDING[..ALIGNMENT - rem]);
        }
    }
    out
}

pub(super) fn reassemble_all(
    containers: &[Container],
    args: &HandlerArgs,
    fs: &dyn SaveFs,
    notifier: &mut dyn Notifier,
) -> Result<Vec<SaveArtifact>, ReconstructError> {
    let policy = MissingPartPolicy::from_args(args)?;
    let mut out = Vec::new();
    for container in containers {
        if let Some(artifact) = reassemble(container, policy, fs, notifier)? {
            out.push(artifact);
        }
    }
    Ok(out)
}

/// Rebuild one `.sfs` file.  Returns `None` for containers outside
/// [`SAVES_FOLDER`] and for saves with no readable parts.
pub fn reassemble(
    container: &Container,
    policy: MissingPartPolicy,
    fs: &dyn SaveFs,
    notifier: &mut dyn Notifier,
) -> Result<Option<SaveArtifact>, ReconstructError> {
    let (parent, sfs_name) = split_parent(&container.name);
    if parent.and_then(|p| p.rsplit('/').next()) != Some(SAVES_FOLDER) {
        debug!(container = %container.name, "not a save container, skipping");
        return Ok(None);
    }

    let layout = PartLayout::detect(container);
    let mut present: BTreeMap<u32, &ResolvedFile> = BTreeMap::new();
    for file in container.files.iter().filter(|f| f.name != TOC_PART) {
        let index = layout.part_index(&file.name).ok_or_else(|| violation(format!(
            "unexpected part \"{}\" in {:?} layout save \"{}\"",
            file.name, layout, container.name
        )))?;
        if present.insert(index, file).is_some() {
            return Err(violation(format!(
                "duplicate part {index} in save \"{}\"",
                container.name
            )));
        }
    }

    let Some(&last) = present.keys().next_back() else {
        return Ok(None);
    };

    let mut parts = Vec::with_capacity(present.len());
    for index in 0..=last {
        match read_part(fs, present.get(&index).copied())? {
            Some(data) => parts.push(data),
            None => match policy {
                MissingPartPolicy::Fail => {
                    return Err(ReconstructError::MissingPart {
                        container: container.name.clone(),
                        index,
                    })
                }
                MissingPartPolicy::Skip => raise(
                    notifier,
                    SyncWarning::MissingPart { container: container.name.clone(), index },
                )?,
            },
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }
    let data = concat_parts(parts);
    info!(save = sfs_name, bytes = data.len(), ?layout, "reassembled save");
    Ok(Some(SaveArtifact::bytes(sfs_name, data)))
}

fn read_part(fs: &dyn SaveFs, file: Option<&ResolvedFile>) -> Result<Option<Vec<u8>>, ReconstructError> {
    let Some(file) = file else { return Ok(None) };
    match fs.read(&file.path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn violation(detail: String) -> ReconstructError {
    ReconstructError::InvariantViolation { strategy: Strategy::Starfield, detail }
}
