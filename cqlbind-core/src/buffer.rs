//! Shared byte buffers for protocol frames
//!
//! A frame is laid out in two stages. [`BufferBuilder::allocate`] hands out an
//! exclusively-owned, fixed-length region; the `encode_*` methods write a
//! primitive at an offset and return the next free offset, so a multi-field
//! frame is built by chaining calls:
//!
//! ```rust
//! use cqlbind_core::buffer::BufferBuilder;
//!
//! let mut builder = BufferBuilder::allocate(4 + 2);
//! let pos = builder.encode_i32(0, 2);
//! let pos = builder.encode_u16(pos, 0xCAFE);
//! assert_eq!(pos, builder.len());
//! let buffer = builder.freeze();
//! assert_eq!(buffer.as_slice(), &[0, 0, 0, 2, 0xCA, 0xFE]);
//! ```
//!
//! [`BufferBuilder::freeze`] turns the builder into an immutable [`Buffer`].
//! Cloning a `Buffer` shares the storage through an atomic reference count;
//! the bytes are released when the last clone is dropped.
//!
//! Writing past the end of a builder is a contract violation and panics.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

/// Length marker for a null `[bytes]` value
pub const NULL_LENGTH: i32 = -1;

/// Size of an `[int]` length prefix
pub const INT_SIZE: usize = 4;

/// Size of a `[short]` length prefix
pub const SHORT_SIZE: usize = 2;

/// Size of an encoded UUID
pub const UUID_SIZE: usize = 16;

/// Exclusively-owned byte region under construction
pub struct BufferBuilder {
    data: Box<[u8]>,
}

impl BufferBuilder {
    /// Allocate a zero-filled region of `len` bytes
    pub fn allocate(len: usize) -> Self {
        Self {
            data: vec![0u8; len].into_boxed_slice(),
        }
    }

    /// Total length of the region
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the region has zero length
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[track_caller]
    fn reserve(&mut self, offset: usize, size: usize) -> &mut [u8] {
        let end = offset.checked_add(size);
        match end {
            Some(end) if end <= self.data.len() => &mut self.data[offset..end],
            _ => panic!(
                "write of {} bytes at offset {} exceeds buffer length {}",
                size,
                offset,
                self.data.len()
            ),
        }
    }

    /// Write an unsigned byte
    #[track_caller]
    pub fn encode_byte(&mut self, offset: usize, value: u8) -> usize {
        self.reserve(offset, 1)[0] = value;
        offset + 1
    }

    /// Write a big-endian u16
    #[track_caller]
    pub fn encode_u16(&mut self, offset: usize, value: u16) -> usize {
        self.copy(offset, &value.to_be_bytes())
    }

    /// Write a big-endian i32
    #[track_caller]
    pub fn encode_i32(&mut self, offset: usize, value: i32) -> usize {
        self.copy(offset, &value.to_be_bytes())
    }

    /// Write a big-endian i64
    #[track_caller]
    pub fn encode_i64(&mut self, offset: usize, value: i64) -> usize {
        self.copy(offset, &value.to_be_bytes())
    }

    /// Write an IEEE-754 single precision float
    #[track_caller]
    pub fn encode_f32(&mut self, offset: usize, value: f32) -> usize {
        self.copy(offset, &value.to_be_bytes())
    }

    /// Write an IEEE-754 double precision float
    #[track_caller]
    pub fn encode_f64(&mut self, offset: usize, value: f64) -> usize {
        self.copy(offset, &value.to_be_bytes())
    }

    /// Write a boolean as a single byte
    #[track_caller]
    pub fn encode_bool(&mut self, offset: usize, value: bool) -> usize {
        self.encode_byte(offset, u8::from(value))
    }

    /// Copy raw bytes
    #[track_caller]
    pub fn copy(&mut self, offset: usize, bytes: &[u8]) -> usize {
        self.reserve(offset, bytes.len()).copy_from_slice(bytes);
        offset + bytes.len()
    }

    /// Write a `[string]`: u16 length followed by UTF-8 bytes
    #[track_caller]
    pub fn encode_string(&mut self, offset: usize, value: &str) -> usize {
        self.encode_short_bytes(offset, value.as_bytes())
    }

    /// Write a `[long string]`: i32 length followed by UTF-8 bytes
    #[track_caller]
    pub fn encode_long_string(&mut self, offset: usize, value: &str) -> usize {
        self.encode_bytes(offset, Some(value.as_bytes()))
    }

    /// Write `[bytes]`: i32 length then payload, or `-1` and nothing for null
    #[track_caller]
    pub fn encode_bytes(&mut self, offset: usize, value: Option<&[u8]>) -> usize {
        match value {
            Some(bytes) => {
                let len = i32::try_from(bytes.len())
                    .unwrap_or_else(|_| panic!("{} bytes do not fit an [int] length", bytes.len()));
                let pos = self.encode_i32(offset, len);
                self.copy(pos, bytes)
            }
            None => self.encode_i32(offset, NULL_LENGTH),
        }
    }

    /// Write `[short bytes]`: u16 length then payload
    #[track_caller]
    pub fn encode_short_bytes(&mut self, offset: usize, value: &[u8]) -> usize {
        let len = u16::try_from(value.len())
            .unwrap_or_else(|_| panic!("{} bytes do not fit a [short] length", value.len()));
        let pos = self.encode_u16(offset, len);
        self.copy(pos, value)
    }

    /// Write a `[string list]`: u16 count followed by each `[string]`
    #[track_caller]
    pub fn encode_string_list<S: AsRef<str>>(&mut self, offset: usize, values: &[S]) -> usize {
        let count = u16::try_from(values.len())
            .unwrap_or_else(|_| panic!("{} strings do not fit a [short] count", values.len()));
        let mut pos = self.encode_u16(offset, count);
        for value in values {
            pos = self.encode_string(pos, value.as_ref());
        }
        pos
    }

    /// Write a `[string map]`: u16 count followed by key/value `[string]` pairs
    #[track_caller]
    pub fn encode_string_map(&mut self, offset: usize, values: &BTreeMap<String, String>) -> usize {
        let count = u16::try_from(values.len())
            .unwrap_or_else(|_| panic!("{} entries do not fit a [short] count", values.len()));
        let mut pos = self.encode_u16(offset, count);
        for (key, value) in values {
            pos = self.encode_string(pos, key);
            pos = self.encode_string(pos, value);
        }
        pos
    }

    /// Write a 16-byte UUID in network order
    #[track_caller]
    pub fn encode_uuid(&mut self, offset: usize, value: &Uuid) -> usize {
        self.copy(offset, value.as_bytes())
    }

    /// Finish construction and publish the bytes as a shared buffer
    pub fn freeze(self) -> Buffer {
        Buffer {
            data: Arc::from(self.data),
        }
    }
}

/// Immutable, atomically reference-counted byte region
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Buffer {
    data: Arc<[u8]>,
}

impl Buffer {
    /// A zero-length buffer (an empty value, not a null)
    pub fn empty() -> Self {
        Self {
            data: Arc::from(Vec::new()),
        }
    }

    /// Copy a slice into a new shared buffer
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: Arc::from(bytes),
        }
    }

    /// Borrow the bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes in the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer has zero length
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of live handles sharing this storage
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.data)
    }

    /// Check if two handles share the same storage
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({} bytes: {})", self.data.len(), hex::encode(&self.data))
    }
}

/// Encoded size of a `[string]`
pub fn string_size(value: &str) -> usize {
    SHORT_SIZE + value.len()
}

/// Encoded size of a `[string list]`
pub fn string_list_size<S: AsRef<str>>(values: &[S]) -> usize {
    SHORT_SIZE + values.iter().map(|v| string_size(v.as_ref())).sum::<usize>()
}

/// Encoded size of a `[string map]`
pub fn string_map_size(values: &BTreeMap<String, String>) -> usize {
    SHORT_SIZE
        + values
            .iter()
            .map(|(k, v)| string_size(k) + string_size(v))
            .sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let mut builder = BufferBuilder::allocate(INT_SIZE);
        assert_eq!(builder.encode_i32(0, 16), 4);
        let buf = builder.freeze();
        assert_eq!(buf.as_slice(), &[0, 0, 0, 16]);
        assert_eq!(buf.ref_count(), 1);
    }

    #[test]
    fn test_copy_shares_storage() {
        let buf1 = BufferBuilder::allocate(INT_SIZE).freeze();

        {
            let buf2 = buf1.clone();
            assert!(buf1.ptr_eq(&buf2));
            assert_eq!(buf1.ref_count(), 2);
        }

        assert_eq!(buf1.ref_count(), 1);
    }

    #[test]
    fn test_assign_shares_storage() {
        let buf1 = BufferBuilder::allocate(INT_SIZE).freeze();
        let mut buf2 = Buffer::empty();
        assert_eq!(buf2.ref_count(), 1);

        buf2 = buf1.clone();
        assert!(buf1.ptr_eq(&buf2));
        assert_eq!(buf1.ref_count(), 2);

        drop(buf2);
        assert_eq!(buf1.ref_count(), 1);
    }

    #[test]
    fn test_storage_outlives_original_handle() {
        let mut builder = BufferBuilder::allocate(2);
        builder.encode_u16(0, 0xBEEF);
        let original = builder.freeze();
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.ref_count(), 1);
        assert_eq!(copy.as_slice(), &[0xBE, 0xEF]);
    }

    #[test]
    fn test_ref_count_across_threads() {
        let buf = Buffer::from_slice(b"shared");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let local = buf.clone();
                std::thread::spawn(move || local.len())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 6);
        }
        assert_eq!(buf.ref_count(), 1);
    }

    #[test]
    fn test_chained_primitives() {
        let mut builder = BufferBuilder::allocate(1 + 2 + 4 + 8 + 4 + 8 + 1);
        let mut pos = builder.encode_byte(0, 0x7F);
        pos = builder.encode_u16(pos, 0x0102);
        pos = builder.encode_i32(pos, -2);
        pos = builder.encode_i64(pos, 1);
        pos = builder.encode_f32(pos, 1.5);
        pos = builder.encode_f64(pos, -0.25);
        pos = builder.encode_bool(pos, true);
        assert_eq!(pos, builder.len());

        let buf = builder.freeze();
        assert_eq!(buf[0], 0x7F);
        assert_eq!(&buf[1..3], &[0x01, 0x02]);
        assert_eq!(&buf[3..7], &[0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(&buf[7..15], &[0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(&buf[15..19], &1.5f32.to_be_bytes());
        assert_eq!(&buf[19..27], &(-0.25f64).to_be_bytes());
        assert_eq!(buf[27], 1);
    }

    #[test]
    fn test_null_bytes_writes_no_payload() {
        let mut builder = BufferBuilder::allocate(INT_SIZE);
        assert_eq!(builder.encode_bytes(0, None), INT_SIZE);
        assert_eq!(builder.freeze().as_slice(), &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_empty_bytes_is_not_null() {
        let mut builder = BufferBuilder::allocate(INT_SIZE);
        builder.encode_bytes(0, Some(&[][..]));
        assert_eq!(builder.freeze().as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_strings() {
        let list = ["ab", "c"];
        let mut map = BTreeMap::new();
        map.insert("CQL_VERSION".to_string(), "3.0.0".to_string());

        let size = string_size("hi") + string_list_size(&list) + string_map_size(&map) + 4 + 3;
        let mut builder = BufferBuilder::allocate(size);
        let mut pos = builder.encode_string(0, "hi");
        pos = builder.encode_string_list(pos, &list);
        pos = builder.encode_string_map(pos, &map);
        pos = builder.encode_long_string(pos, "xyz");
        assert_eq!(pos, size);

        let buf = builder.freeze();
        assert_eq!(&buf[0..4], &[0, 2, b'h', b'i']);
        assert_eq!(&buf[4..13], &[0, 2, 0, 2, b'a', b'b', 0, 1, b'c']);
        assert_eq!(&buf[13..15], &[0, 1]);
        assert_eq!(&buf[15..17], &[0, 11]);
        assert_eq!(&buf[size - 7..], &[0, 0, 0, 3, b'x', b'y', b'z']);
    }

    #[test]
    fn test_uuid() {
        let uuid = Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff);
        let mut builder = BufferBuilder::allocate(UUID_SIZE);
        builder.encode_uuid(0, &uuid);
        assert_eq!(builder.freeze().as_slice(), uuid.as_bytes());
    }

    #[test]
    #[should_panic(expected = "exceeds buffer length")]
    fn test_write_past_end_panics() {
        let mut builder = BufferBuilder::allocate(3);
        builder.encode_i32(0, 1);
    }

    #[test]
    #[should_panic(expected = "exceeds buffer length")]
    fn test_offset_overflow_panics() {
        let mut builder = BufferBuilder::allocate(3);
        builder.encode_byte(usize::MAX, 1);
    }
}
