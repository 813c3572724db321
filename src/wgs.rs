//! Walking a package's WGS ("wgs") save store.
//!
//! ```text
//! <packages root>/<package>/SystemAppData/wgs/
//!     <user id hex>_<title id hex>/
//!         containers.index
//!         <container GUID>/
//!             container.<N>
//!             <file GUID> ...
//!     t/                       (ignored)
//!     <..backup..>/            (skipped, reported)
//! ```
//!
//! A decode failure aborts the user directory it occurred in; missing
//! containers and files only degrade the result and are reported through
//! the [`Notifier`].

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::container::decode_container;
use crate::fs::SaveFs;
use crate::index::{decode_index_with, IndexSchema, INDEX_FILE_NAME};
use crate::notify::{raise, Aborted, Notifier, SyncWarning};
use crate::reader::{DecodeError, Timestamp};
use crate::resolve::{resolve_files, Container};

/// Xbox app package whose local state names the signed-in account.
pub const XBOX_APP_PACKAGE: &str = "Microsoft.XboxApp_8wekyb3d8bbwe";

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Failed to decode {path}: {source}")]
    Decode { path: PathBuf, source: DecodeError },
    #[error(transparent)]
    Aborted(#[from] Aborted),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// The save store directory of a package.
pub fn wgs_dir(packages_root: &Path, package: &str) -> PathBuf {
    packages_root.join(package).join("SystemAppData").join("wgs")
}

// ── User directories ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDir {
    pub user_id:  u64,
    pub title_id: String,
    pub path:     PathBuf,
}

/// List the user directories of a WGS store.  A missing store yields an
/// empty list.
pub fn find_user_dirs(
    fs: &dyn SaveFs,
    wgs_dir: &Path,
    notifier: &mut dyn Notifier,
) -> Result<Vec<UserDir>, ReadError> {
    if !fs.is_dir(wgs_dir) {
        return Ok(Vec::new());
    }

    let mut has_backups = false;
    let mut users = Vec::new();
    for entry in fs.read_dir(wgs_dir)? {
        if !fs.is_dir(&entry) {
            continue;
        }
        let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == "t" {
            continue;
        }
        if name.contains("backup") {
            has_backups = true;
            continue;
        }
        match parse_user_dir_name(name) {
            Some((user_id, title_id)) => users.push(UserDir {
                user_id,
                title_id: title_id.to_owned(),
                path: entry.clone(),
            }),
            None => debug!(dir = name, "not a user directory"),
        }
    }

    if has_backups {
        raise(notifier, SyncWarning::BackupsSkipped { dir: wgs_dir.to_owned() })?;
    }
    Ok(users)
}

fn parse_user_dir_name(name: &str) -> Option<(u64, &str)> {
    let (user, title) = name.split_once('_')?;
    if title.contains('_') {
        return None;
    }
    Some((u64::from_str_radix(user, 16).ok()?, title))
}

// ── Containers ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContainers {
    pub store_package_name: String,
    pub creation_time:      Timestamp,
    pub containers:         Vec<Container>,
}

/// Decode the index of one user directory and resolve every container it
/// names.
pub fn read_user_containers(
    fs: &dyn SaveFs,
    user_dir: &Path,
    schema: IndexSchema,
    notifier: &mut dyn Notifier,
) -> Result<UserContainers, ReadError> {
    let index_path = user_dir.join(INDEX_FILE_NAME);
    let index = decode_index_with(fs.open(&index_path)?, schema)
        .map_err(|source| ReadError::Decode { path: index_path.clone(), source })?;

    info!(
        package = %index.store_package_name,
        created = %index.creation_time,
        containers = index.containers.len(),
        "most recent synced save"
    );

    let mut containers = Vec::with_capacity(index.containers.len());
    for desc in &index.containers {
        let container_dir = user_dir.join(desc.dir_name());
        let table_path = container_dir.join(desc.file_table_name());
        if !fs.is_file(&table_path) {
            raise(notifier, SyncWarning::MissingContainer { container: desc.name.clone() })?;
            continue;
        }

        let table = decode_container(fs.open(&table_path)?)
            .map_err(|source| ReadError::Decode { path: table_path.clone(), source })?;
        let files = resolve_files(fs, &container_dir, &desc.name, &table, notifier)?;
        debug!(container = %desc.name, files = files.len(), "resolved container");

        containers.push(Container {
            name:   desc.name.clone(),
            number: desc.container_number,
            files,
        });
    }

    Ok(UserContainers {
        store_package_name: index.store_package_name,
        creation_time:      index.creation_time,
        containers,
    })
}

// ── Account names ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LiveGamer {
    #[serde(rename = "XboxUserId")]
    user_id:  Option<serde_json::Value>,
    #[serde(rename = "Gamertag")]
    gamertag: Option<String>,
}

/// Gamertag of `user_id` if it is the account the Xbox app last signed in.
pub fn gamertag(fs: &dyn SaveFs, packages_root: &Path, user_id: u64) -> Option<String> {
    let path = packages_root
        .join(XBOX_APP_PACKAGE)
        .join("LocalState")
        .join("XboxLiveGamer.xml");
    let gamer: LiveGamer = serde_json::from_slice(&fs.read(&path).ok()?).ok()?;
    let known = match gamer.user_id? {
        serde_json::Value::Number(n) => n.as_u64()?,
        serde_json::Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    if known != user_id {
        return None;
    }
    gamer.gamertag
}

/// Display label for a user: gamertag when known, numeric id otherwise.
pub fn user_label(fs: &dyn SaveFs, packages_root: &Path, user: &UserDir) -> String {
    gamertag(fs, packages_root, user.user_id).unwrap_or_else(|| user.user_id.to_string())
}
