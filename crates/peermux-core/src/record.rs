//! Records - newline-terminated lines read from a peer

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

/// One line read from a peer's stream, always ending in `\n`
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Record(Bytes);

impl Record {
    pub const TERMINATOR: u8 = b'\n';

    /// Build a record from a line whose terminator was already removed
    pub fn from_line(line: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(line.len() + 1);
        buf.extend_from_slice(line);
        buf.put_u8(Self::TERMINATOR);
        Record(buf.freeze())
    }

    /// Wrap bytes that already end in `\n` without copying.
    ///
    /// Falls back to [`Record::from_line`] when the terminator is missing.
    pub fn from_terminated(bytes: Bytes) -> Self {
        if bytes.last() == Some(&Self::TERMINATOR) {
            Record(bytes)
        } else {
            Self::from_line(&bytes)
        }
    }

    /// Full record bytes, terminator included
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Line content without the terminator
    #[inline]
    pub fn line(&self) -> &[u8] {
        &self.0[..self.0.len() - 1]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true: a record holds at least its terminator
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl AsRef<[u8]> for Record {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Record> for Bytes {
    fn from(record: Record) -> Bytes {
        record.0
    }
}
