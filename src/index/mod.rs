//! `containers.index` decoder.
//!
//! # Layout
//! ```text
//! [4B reserved][i32 container_count][4B reserved]
//! [string package_display_name]        (WithDisplayName schema only)
//! [string store_package_name]          ("<package>!<context>")
//! [FILETIME creation_time][4B reserved][string unused][8B reserved]
//! container_count × ContainerDescriptor
//! ```
//! and each descriptor is
//! ```text
//! [string name][string dup_name][string quoted_hex][u8 number][4B reserved]
//! [16B guid][FILETIME creation_time][16B reserved]
//! ```

use std::io::Read;

use tracing::debug;

use crate::reader::{DecodeError, Guid, Timestamp, WgsReadExt};

/// File name of the index inside a user's WGS directory.
pub const INDEX_FILE_NAME: &str = "containers.index";

/// Separator between the store package id and its trailing context suffix.
const PACKAGE_CONTEXT_SEPARATOR: char = '!';

/// Which header revision the index was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexSchema {
    #[default]
    Standard,
    /// Carries an extra display-name string before the store package name.
    WithDisplayName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    pub name:             String,
    /// Selects `container.<N>` inside the container directory.
    pub container_number: u8,
    pub container_guid:   Guid,
    pub creation_time:    Timestamp,
}

impl ContainerDescriptor {
    /// Name of the directory holding this container's data.
    pub fn dir_name(&self) -> String {
        self.container_guid.to_hex_upper()
    }

    /// Name of the file table inside [`Self::dir_name`].
    pub fn file_table_name(&self) -> String {
        format!("container.{}", self.container_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerIndex {
    pub package_display_name: Option<String>,
    /// Store package id with the `!<context>` suffix removed.
    pub store_package_name:   String,
    /// Creation time of the most recently synced container.
    pub creation_time:        Timestamp,
    pub containers:           Vec<ContainerDescriptor>,
}

impl ContainerIndex {
    pub fn into_parts(self) -> (String, Vec<ContainerDescriptor>) {
        (self.store_package_name, self.containers)
    }
}

/// Decode a `containers.index` stream written with the standard header.
pub fn decode_index<R: Read>(reader: R) -> Result<ContainerIndex, DecodeError> {
    decode_index_with(reader, IndexSchema::Standard)
}

pub fn decode_index_with<R: Read>(
    mut reader: R,
    schema: IndexSchema,
) -> Result<ContainerIndex, DecodeError> {
    reader.skip_reserved(4)?;
    let count = reader.read_i32_le()?;
    let count = usize::try_from(count).map_err(|_| DecodeError::NegativeLength(count))?;
    reader.skip_reserved(4)?;

    let package_display_name = match schema {
        IndexSchema::Standard        => None,
        IndexSchema::WithDisplayName => Some(reader.read_utf16_string(None)?),
    };

    let raw_package = reader.read_utf16_string(None)?;
    let store_package_name = raw_package
        .split(PACKAGE_CONTEXT_SEPARATOR)
        .next()
        .unwrap_or_default()
        .to_owned();

    let creation_time = reader.read_filetime()?;
    reader.skip_reserved(4)?;
    reader.read_utf16_string(None)?;
    reader.skip_reserved(8)?;

    debug!(package = %store_package_name, count, "decoding container index");

    // Capacity is capped; the count comes straight from disk.
    let mut containers = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        containers.push(decode_descriptor(&mut reader)?);
    }

    Ok(ContainerIndex {
        package_display_name,
        store_package_name,
        creation_time,
        containers,
    })
}

fn decode_descriptor<R: Read>(reader: &mut R) -> Result<ContainerDescriptor, DecodeError> {
    let name = reader.read_utf16_string(None)?;
    // Duplicate of the name, then a quoted hex number.
    reader.read_utf16_string(None)?;
    reader.read_utf16_string(None)?;
    let container_number = WgsReadExt::read_u8(reader)?;
    reader.skip_reserved(4)?;
    let container_guid = reader.read_guid()?;
    let creation_time = reader.read_filetime()?;
    reader.skip_reserved(16)?;
    Ok(ContainerDescriptor {
        name,
        container_number,
        container_guid,
        creation_time,
    })
}
