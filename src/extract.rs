//! High-level extraction API, the surface the CLI is built on.
//!
//! ```no_run
//! use std::path::Path;
//! use xgpsave::extract::Extractor;
//! use xgpsave::fs::StdFs;
//! use xgpsave::handler::HandlerRegistry;
//! use xgpsave::notify::LogNotifier;
//!
//! let registry = HandlerRegistry::from_path(Path::new("games.json"))?;
//! let extractor = Extractor::new(&StdFs, Path::new(r"C:\Users\me\AppData\Local\Packages"), &registry);
//! for game in extractor.installed_games() {
//!     for user in extractor.users(game, &mut LogNotifier)? {
//!         let saves = extractor.extract_user(&user, &mut LogNotifier)?;
//!         println!("{}: {} file(s)", game.name, saves.artifacts.len());
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::fs::SaveFs;
use crate::handler::{GameEntry, Handler, HandlerError, HandlerRegistry};
use crate::index::{decode_index_with, ContainerIndex, IndexSchema, INDEX_FILE_NAME};
use crate::notify::Notifier;
use crate::reconstruct::{reconstruct, ReconstructError, SaveArtifact};
use crate::wgs::{find_user_dirs, read_user_containers, user_label, wgs_dir, ReadError, UserContainers, UserDir};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error(transparent)]
    Reconstruct(#[from] ReconstructError),
}

impl ExtractError {
    /// The user answered a sync warning with [`Acknowledgement::Abort`].
    ///
    /// [`Acknowledgement::Abort`]: crate::notify::Acknowledgement::Abort
    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            ExtractError::Read(ReadError::Aborted(_)) | ExtractError::Reconstruct(ReconstructError::Aborted(_))
        )
    }
}

/// Everything recovered for one user of one game.
#[derive(Debug, Clone)]
pub struct UserSaves {
    pub label:     String,
    pub store:     UserContainers,
    pub handler:   Handler,
    pub artifacts: Vec<SaveArtifact>,
}

/// Extraction context: the filesystem, the packages root and the handler
/// registry every operation works against.
pub struct Extractor<'a> {
    fs:            &'a dyn SaveFs,
    packages_root: PathBuf,
    registry:      &'a HandlerRegistry,
    schema:        IndexSchema,
}

impl<'a> Extractor<'a> {
    pub fn new(fs: &'a dyn SaveFs, packages_root: &Path, registry: &'a HandlerRegistry) -> Self {
        Self {
            fs,
            packages_root: packages_root.to_owned(),
            registry,
            schema: IndexSchema::default(),
        }
    }

    pub fn with_schema(mut self, schema: IndexSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn packages_root(&self) -> &Path {
        &self.packages_root
    }

    /// Registry entries whose package is installed under the packages root.
    pub fn installed_games(&self) -> Vec<&'a GameEntry> {
        self.registry
            .games()
            .iter()
            .filter(|g| self.fs.is_dir(&self.packages_root.join(&g.package)))
            .collect()
    }

    pub fn users(&self, game: &GameEntry, notifier: &mut dyn Notifier) -> Result<Vec<UserDir>, ReadError> {
        find_user_dirs(self.fs, &wgs_dir(&self.packages_root, &game.package), notifier)
    }

    pub fn label(&self, user: &UserDir) -> String {
        user_label(self.fs, &self.packages_root, user)
    }

    /// Decode a user's index without resolving any containers.
    pub fn index(&self, user: &UserDir) -> Result<ContainerIndex, ReadError> {
        let path = user.path.join(INDEX_FILE_NAME);
        decode_index_with(self.fs.open(&path)?, self.schema)
            .map_err(|source| ReadError::Decode { path, source })
    }

    /// Decode, resolve and reconstruct the saves of one user.  The handler
    /// is chosen by the store package named in the user's own index.
    pub fn extract_user(
        &self,
        user: &UserDir,
        notifier: &mut dyn Notifier,
    ) -> Result<UserSaves, ExtractError> {
        let store = read_user_containers(self.fs, &user.path, self.schema, notifier)?;
        let handler = self.registry.handler_for(&store.store_package_name)?;
        let artifacts = reconstruct(handler.strategy, &handler.args, &store.containers, self.fs, notifier)?;
        info!(
            package = %store.store_package_name,
            strategy = %handler.strategy,
            artifacts = artifacts.len(),
            "reconstructed saves"
        );
        Ok(UserSaves { label: self.label(user), store, handler, artifacts })
    }
}
