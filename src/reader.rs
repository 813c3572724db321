//! Primitive decoding for the WGS container store.
//!
//! Every structure in `containers.index` and `container.<N>` is built from a
//! handful of primitives, read sequentially from a byte cursor:
//!
//! | Primitive | Layout |
//! |-----------|--------|
//! | `i32` / `u8` | little-endian |
//! | string | `[i32 char_count][char_count * 2 bytes UTF-16LE]` |
//! | fixed string | `[len * 2 bytes UTF-16LE]`, NUL padded |
//! | GUID | 16 bytes, `bytes_le` field order |
//! | FILETIME | `u64` count of 100 ns ticks since 1601-01-01T00:00:00Z |
//!
//! Trailing NUL characters are stripped from both string forms.
//!
//! # Endianness
//! All integers are little-endian.  GUIDs use the mixed-endian Windows
//! packing: the first three groups are little-endian, the 8-byte tail is
//! stored as-is.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt;
use std::io::{self, Read};
use thiserror::Error;
use uuid::Uuid;

/// Decoded FILETIME value.
pub type Timestamp = DateTime<Utc>;

/// FILETIME ticks per second (one tick is 100 ns).
pub const TICKS_PER_SECOND: u64 = 10_000_000;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Truncated input: needed {needed} more byte(s)")]
    Truncated { needed: usize },
    #[error("Negative length prefix: {0}")]
    NegativeLength(i32),
    #[error("Invalid UTF-16 string data")]
    InvalidUtf16,
    #[error("FILETIME out of range: {0} ticks")]
    TimestampOutOfRange(u64),
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl DecodeError {
    fn from_io(err: io::Error, needed: usize) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Truncated { needed }
        } else {
            DecodeError::Io(err)
        }
    }
}

// ── Guid ─────────────────────────────────────────────────────────────────────

/// A GUID as stored on disk.  Equality is byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid(pub Uuid);

impl Guid {
    /// Interpret 16 raw on-disk bytes using the `bytes_le` convention.
    pub fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Guid(Uuid::from_bytes_le(bytes))
    }

    /// The on-disk byte representation.
    pub fn to_bytes_le(&self) -> [u8; 16] {
        self.0.to_bytes_le()
    }

    /// Uppercase hex without separators, the form used for directory and
    /// blob file names inside a WGS user directory.
    pub fn to_hex_upper(&self) -> String {
        format!("{:X}", self.0.simple())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Convert a FILETIME tick count to an absolute UTC instant.
pub fn filetime_to_timestamp(ticks: u64) -> Option<Timestamp> {
    let epoch = Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0).single()?;
    let secs  = i64::try_from(ticks / TICKS_PER_SECOND).ok()?;
    let nanos = ((ticks % TICKS_PER_SECOND) * 100) as i64;
    epoch
        .checked_add_signed(Duration::seconds(secs))?
        .checked_add_signed(Duration::nanoseconds(nanos))
}

// ── Reader extension ─────────────────────────────────────────────────────────

/// Primitive readers over any [`Read`] cursor.
///
/// Short reads surface as [`DecodeError::Truncated`]; every method advances
/// the cursor by exactly the number of bytes it consumed.
pub trait WgsReadExt: Read {
    fn read_i32_le(&mut self) -> Result<i32, DecodeError> {
        ReadBytesExt::read_i32::<LittleEndian>(self).map_err(|e| DecodeError::from_io(e, 4))
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        ReadBytesExt::read_u8(self).map_err(|e| DecodeError::from_io(e, 1))
    }

    fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        ReadBytesExt::read_u64::<LittleEndian>(self).map_err(|e| DecodeError::from_io(e, 8))
    }

    /// Read exactly `n` bytes.  The buffer grows with the data actually
    /// available, so a bogus length cannot force a huge allocation.
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, DecodeError> {
        let mut buf = Vec::new();
        Read::take(&mut *self, n as u64)
            .read_to_end(&mut buf)
            .map_err(|e| DecodeError::from_io(e, n))?;
        if buf.len() < n {
            return Err(DecodeError::Truncated { needed: n - buf.len() });
        }
        Ok(buf)
    }

    /// Consume `n` reserved bytes without interpreting them.
    fn skip_reserved(&mut self, n: usize) -> Result<(), DecodeError> {
        self.read_bytes(n).map(|_| ())
    }

    fn read_filetime(&mut self) -> Result<Timestamp, DecodeError> {
        let ticks = self.read_u64_le()?;
        filetime_to_timestamp(ticks).ok_or(DecodeError::TimestampOutOfRange(ticks))
    }

    /// Read a UTF-16 string.  With `len == None` an `i32` character count
    /// prefix is read first; with `Some(len)` the field is fixed width.
    fn read_utf16_string(&mut self, len: Option<usize>) -> Result<String, DecodeError> {
        let len = match len {
            Some(len) => len,
            None => {
                let prefix = self.read_i32_le()?;
                usize::try_from(prefix).map_err(|_| DecodeError::NegativeLength(prefix))?
            }
        };
        let raw = self.read_bytes(len * 2)?;
        let mut units = vec![0u16; len];
        LittleEndian::read_u16_into(&raw, &mut units);
        let mut s = String::from_utf16(&units).map_err(|_| DecodeError::InvalidUtf16)?;
        let trimmed = s.trim_end_matches('\0').len();
        s.truncate(trimmed);
        Ok(s)
    }

    fn read_guid(&mut self) -> Result<Guid, DecodeError> {
        let mut bytes = [0u8; 16];
        self.read_exact(&mut bytes).map_err(|e| DecodeError::from_io(e, 16))?;
        Ok(Guid::from_bytes_le(bytes))
    }
}

impl<R: Read + ?Sized> WgsReadExt for R {}
