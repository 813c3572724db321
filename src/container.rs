//! `container.<N>` file table decoder.
//!
//! ```text
//! [4B reserved (observed 04 00 00 00)][i32 file_count]
//! file_count × [128B UTF-16 name, NUL padded][16B guid][16B guid]
//! ```

use std::io::Read;

use crate::reader::{DecodeError, Guid, WgsReadExt};

/// Width of the file name field, in UTF-16 code units.
pub const FILE_NAME_UNITS: usize = 64;

/// One row of a container's file table.
///
/// The two GUIDs name two candidate blobs in the container directory; they
/// differ when a sync replaced one copy and left a reference to the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name:           String,
    pub primary_guid:   Guid,
    pub secondary_guid: Guid,
}

impl FileDescriptor {
    pub fn has_single_copy(&self) -> bool {
        self.primary_guid == self.secondary_guid
    }
}

/// Decode a container file table.  The caller checks the file exists; a
/// missing table is a sync problem, not a decode failure.
pub fn decode_container<R: Read>(mut reader: R) -> Result<Vec<FileDescriptor>, DecodeError> {
    reader.skip_reserved(4)?;
    let count = reader.read_i32_le()?;
    let count = usize::try_from(count).map_err(|_| DecodeError::NegativeLength(count))?;

    let mut files = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let name = reader.read_utf16_string(Some(FILE_NAME_UNITS))?;
        let primary_guid = reader.read_guid()?;
        let secondary_guid = reader.read_guid()?;
        files.push(FileDescriptor { name, primary_guid, secondary_guid });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn row(buf: &mut Vec<u8>, name: &str, a: u8, b: u8) {
        let mut field: Vec<u8> = name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        field.resize(FILE_NAME_UNITS * 2, 0);
        buf.extend(field);
        buf.extend([a; 16]);
        buf.extend([b; 16]);
    }

    #[test]
    fn decodes_every_row() {
        let mut buf = vec![4, 0, 0, 0];
        buf.extend(2i32.to_le_bytes());
        row(&mut buf, "BETHESDAPFH", 1, 1);
        row(&mut buf, "P0P", 2, 3);

        let files = decode_container(Cursor::new(buf)).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "BETHESDAPFH");
        assert!(files[0].has_single_copy());
        assert_eq!(files[1].name, "P0P");
        assert!(!files[1].has_single_copy());
        assert_eq!(files[1].secondary_guid.to_hex_upper(), "03".repeat(16));
    }

    #[test]
    fn full_width_name_is_kept() {
        let long = "x".repeat(FILE_NAME_UNITS);
        let mut buf = vec![4, 0, 0, 0];
        buf.extend(1i32.to_le_bytes());
        row(&mut buf, &long, 9, 9);

        let files = decode_container(Cursor::new(buf)).unwrap();
        assert_eq!(files[0].name, long);
    }

    #[test]
    fn short_table_is_truncated() {
        let mut buf = vec![4, 0, 0, 0];
        buf.extend(3i32.to_le_bytes());
        row(&mut buf, "data", 1, 1);

        assert!(matches!(
            decode_container(Cursor::new(buf)),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
