pub mod reader;
pub mod index;
pub mod container;
pub mod fs;
pub mod notify;
pub mod resolve;
pub mod handler;
pub mod reconstruct;
pub mod wgs;
pub mod archive;
pub mod extract;

pub use reader::{DecodeError, Guid, Timestamp};
pub use index::{decode_index, ContainerDescriptor, ContainerIndex, IndexSchema};
pub use container::{decode_container, FileDescriptor};
pub use fs::{MemFs, SaveFs, StdFs};
pub use notify::{Acknowledgement, Notifier, SyncWarning};
pub use resolve::{resolve_files, Container, ResolvedFile};
pub use handler::{HandlerRegistry, Strategy};
pub use reconstruct::{reconstruct, SaveArtifact};
pub use extract::Extractor;
