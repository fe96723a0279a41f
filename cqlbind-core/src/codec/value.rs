//! Bindable application values
//!
//! [`BindValue`] is the closed set of value kinds the codec accepts. Each
//! kind declares which schema types it may be bound against and knows its
//! native payload encoding; framing (`[bytes]` or `[short bytes]`) is applied
//! on top by [`BindValue::encode`] and [`BindValue::encode_item`].

use super::collection::Collection;
use super::tuple::TupleValue;
use super::user_type::UserTypeValue;
use crate::buffer::{Buffer, BufferBuilder, INT_SIZE, SHORT_SIZE, UUID_SIZE};
use crate::error::{Error, Result};
use crate::types::{DataType, ScalarKind, DEFAULT_MAX_DEPTH};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

/// Arbitrary precision decimal: two's complement big-endian unscaled value
/// and a base-10 scale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    pub unscaled: Vec<u8>,
    pub scale: i32,
}

impl Decimal {
    pub fn new(unscaled: Vec<u8>, scale: i32) -> Self {
        Self { unscaled, scale }
    }

    /// `value * 10^-scale` with the shortest varint encoding of `value`
    pub fn from_i64(value: i64, scale: i32) -> Self {
        Self {
            unscaled: varint_from_i64(value),
            scale,
        }
    }

    /// Unscaled value, if it fits an i64
    pub fn unscaled_i64(&self) -> Option<i64> {
        if self.unscaled.is_empty() || self.unscaled.len() > 8 {
            return None;
        }
        let fill = if self.unscaled[0] & 0x80 != 0 { 0xFF } else { 0x00 };
        let mut bytes = [fill; 8];
        bytes[8 - self.unscaled.len()..].copy_from_slice(&self.unscaled);
        Some(i64::from_be_bytes(bytes))
    }
}

fn varint_from_i64(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// A value that can be bound to a statement position, collection item,
/// UDT field or tuple element
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Inet(IpAddr),
    Decimal(Decimal),
    Collection(Collection),
    UserType(UserTypeValue),
    Tuple(TupleValue),
    /// Pre-encoded payload for a custom marshal class
    Custom(Vec<u8>),
}

impl BindValue {
    pub fn is_null(&self) -> bool {
        matches!(self, BindValue::Null)
    }

    /// Human-readable kind name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            BindValue::Null => "null",
            BindValue::Int32(_) => "int32",
            BindValue::Int64(_) => "int64",
            BindValue::Float(_) => "float",
            BindValue::Double(_) => "double",
            BindValue::Boolean(_) => "boolean",
            BindValue::String(_) => "string",
            BindValue::Bytes(_) => "bytes",
            BindValue::Uuid(_) => "uuid",
            BindValue::Inet(_) => "inet",
            BindValue::Decimal(_) => "decimal",
            BindValue::Collection(_) => "collection",
            BindValue::UserType(_) => "user type",
            BindValue::Tuple(_) => "tuple",
            BindValue::Custom(_) => "custom",
        }
    }

    /// Schema scalar kinds this value may be bound against
    pub fn compatible_kinds(&self) -> &'static [ScalarKind] {
        match self {
            BindValue::Int32(_) => &[ScalarKind::Int],
            BindValue::Int64(_) => &[ScalarKind::BigInt, ScalarKind::Counter, ScalarKind::Timestamp],
            BindValue::Float(_) => &[ScalarKind::Float],
            BindValue::Double(_) => &[ScalarKind::Double],
            BindValue::Boolean(_) => &[ScalarKind::Boolean],
            BindValue::String(_) => &[ScalarKind::Ascii, ScalarKind::Text, ScalarKind::Varchar],
            BindValue::Bytes(_) => &[ScalarKind::Blob],
            BindValue::Uuid(_) => &[ScalarKind::Uuid, ScalarKind::TimeUuid],
            BindValue::Inet(_) => &[ScalarKind::Inet],
            BindValue::Decimal(_) => &[ScalarKind::Decimal],
            BindValue::Null
            | BindValue::Collection(_)
            | BindValue::UserType(_)
            | BindValue::Tuple(_)
            | BindValue::Custom(_) => &[],
        }
    }

    /// Whether this value may be bound against `data_type`
    ///
    /// Only fails when comparing nested types exceeds [`DEFAULT_MAX_DEPTH`].
    pub fn is_valid_for(&self, data_type: &DataType) -> Result<bool> {
        self.is_valid_within(data_type, DEFAULT_MAX_DEPTH)
    }

    /// Like [`BindValue::is_valid_for`], comparing nested types at most
    /// `max_depth` levels deep
    pub fn is_valid_within(&self, data_type: &DataType, max_depth: usize) -> Result<bool> {
        match (self, data_type) {
            (BindValue::Null, _) => Ok(true),
            (BindValue::Collection(collection), _) => collection.is_valid_for(data_type, max_depth),
            (BindValue::UserType(value), DataType::UserDefined(_)) => {
                DataType::UserDefined(Arc::clone(value.user_type()))
                    .equals_with_limit(data_type, max_depth)
            }
            (BindValue::Tuple(value), DataType::Tuple(_)) => {
                DataType::Tuple(Arc::clone(value.tuple_type())).equals_with_limit(data_type, max_depth)
            }
            (BindValue::Custom(_), DataType::Custom(_)) => Ok(true),
            (BindValue::Bytes(_), DataType::Custom(_)) => Ok(true),
            (_, DataType::Scalar(kind)) => Ok(self.compatible_kinds().contains(kind)),
            _ => Ok(false),
        }
    }

    /// Fail with [`Error::InvalidValueType`] unless the value fits `data_type`
    pub fn validate(&self, data_type: &DataType) -> Result<()> {
        self.validate_within(data_type, DEFAULT_MAX_DEPTH)
    }

    /// Like [`BindValue::validate`] with an explicit nesting limit
    pub fn validate_within(&self, data_type: &DataType, max_depth: usize) -> Result<()> {
        if self.is_valid_within(data_type, max_depth)? {
            Ok(())
        } else {
            Err(Error::invalid_value_type(format!(
                "{} value cannot be bound to {}",
                self.kind_name(),
                data_type
            )))
        }
    }

    /// Native payload without length framing; `None` for null
    pub fn payload(&self, protocol_version: u8) -> Result<Option<Buffer>> {
        let payload = match self {
            BindValue::Null => return Ok(None),
            BindValue::Int32(v) => build(INT_SIZE, |b| b.encode_i32(0, *v)),
            BindValue::Int64(v) => build(8, |b| b.encode_i64(0, *v)),
            BindValue::Float(v) => build(INT_SIZE, |b| b.encode_f32(0, *v)),
            BindValue::Double(v) => build(8, |b| b.encode_f64(0, *v)),
            BindValue::Boolean(v) => build(1, |b| b.encode_bool(0, *v)),
            BindValue::String(v) => Buffer::from_slice(v.as_bytes()),
            BindValue::Bytes(v) | BindValue::Custom(v) => Buffer::from_slice(v),
            BindValue::Uuid(v) => build(UUID_SIZE, |b| b.encode_uuid(0, v)),
            BindValue::Inet(IpAddr::V4(addr)) => Buffer::from_slice(&addr.octets()),
            BindValue::Inet(IpAddr::V6(addr)) => Buffer::from_slice(&addr.octets()),
            BindValue::Decimal(d) => build(INT_SIZE + d.unscaled.len(), |b| {
                let pos = b.encode_i32(0, d.scale);
                b.copy(pos, &d.unscaled)
            }),
            BindValue::Collection(collection) => collection.payload(protocol_version)?,
            BindValue::UserType(value) => value.payload(),
            BindValue::Tuple(value) => value.payload(),
        };
        Ok(Some(payload))
    }

    /// Encode as `[bytes]`: i32 length then payload, `-1` for null
    pub fn encode(&self, protocol_version: u8) -> Result<Buffer> {
        let payload = self.payload(protocol_version)?;
        Ok(frame_bytes(payload.as_deref()))
    }

    /// Encode as a collection item
    ///
    /// Items use `[short bytes]` below protocol v3 and `[bytes]` otherwise.
    /// Collections cannot hold nulls.
    pub fn encode_item(&self, protocol_version: u8) -> Result<Buffer> {
        let payload = self
            .payload(protocol_version)?
            .ok_or_else(|| Error::invalid_value_type("collection items cannot be null"))?;

        if protocol_version < 3 {
            if payload.len() > u16::MAX as usize {
                return Err(Error::invalid_value_type(format!(
                    "collection item of {} bytes exceeds the [short bytes] limit",
                    payload.len()
                )));
            }
            Ok(build(SHORT_SIZE + payload.len(), |b| {
                b.encode_short_bytes(0, &payload)
            }))
        } else {
            Ok(frame_bytes(Some(payload.as_slice())))
        }
    }
}

/// Allocate exactly `len` bytes and fill them with `write`
pub(crate) fn build(len: usize, write: impl FnOnce(&mut BufferBuilder) -> usize) -> Buffer {
    let mut builder = BufferBuilder::allocate(len);
    let end = write(&mut builder);
    debug_assert_eq!(end, len, "encoded size does not match allocation");
    builder.freeze()
}

/// `[bytes]` framing of an optional payload
pub(crate) fn frame_bytes(payload: Option<&[u8]>) -> Buffer {
    let len = INT_SIZE + payload.map_or(0, <[u8]>::len);
    build(len, |b| b.encode_bytes(0, payload))
}

impl fmt::Display for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindValue::Null => write!(f, "NULL"),
            BindValue::Int32(v) => write!(f, "{}", v),
            BindValue::Int64(v) => write!(f, "{}", v),
            BindValue::Float(v) => write!(f, "{}", v),
            BindValue::Double(v) => write!(f, "{}", v),
            BindValue::Boolean(v) => write!(f, "{}", v),
            BindValue::String(v) => write!(f, "'{}'", v),
            BindValue::Bytes(v) | BindValue::Custom(v) => write!(f, "0x{}", hex::encode(v)),
            BindValue::Uuid(v) => write!(f, "{}", v),
            BindValue::Inet(v) => write!(f, "{}", v),
            BindValue::Decimal(d) => write!(f, "decimal(0x{}, scale {})", hex::encode(&d.unscaled), d.scale),
            BindValue::Collection(c) => write!(f, "{}[{} items]", c.kind_name(), c.len()),
            BindValue::UserType(u) => write!(f, "{}.{}{{...}}", u.user_type().keyspace(), u.user_type().type_name()),
            BindValue::Tuple(t) => write!(f, "tuple({} elements)", t.len()),
        }
    }
}

impl From<i32> for BindValue {
    fn from(v: i32) -> Self {
        BindValue::Int32(v)
    }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::Int64(v)
    }
}

impl From<f32> for BindValue {
    fn from(v: f32) -> Self {
        BindValue::Float(v)
    }
}

impl From<f64> for BindValue {
    fn from(v: f64) -> Self {
        BindValue::Double(v)
    }
}

impl From<bool> for BindValue {
    fn from(v: bool) -> Self {
        BindValue::Boolean(v)
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::String(v.to_string())
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        BindValue::String(v)
    }
}

impl From<Vec<u8>> for BindValue {
    fn from(v: Vec<u8>) -> Self {
        BindValue::Bytes(v)
    }
}

impl From<&[u8]> for BindValue {
    fn from(v: &[u8]) -> Self {
        BindValue::Bytes(v.to_vec())
    }
}

impl From<Uuid> for BindValue {
    fn from(v: Uuid) -> Self {
        BindValue::Uuid(v)
    }
}

impl From<IpAddr> for BindValue {
    fn from(v: IpAddr) -> Self {
        BindValue::Inet(v)
    }
}

impl From<Decimal> for BindValue {
    fn from(v: Decimal) -> Self {
        BindValue::Decimal(v)
    }
}

impl From<Collection> for BindValue {
    fn from(v: Collection) -> Self {
        BindValue::Collection(v)
    }
}

impl From<UserTypeValue> for BindValue {
    fn from(v: UserTypeValue) -> Self {
        BindValue::UserType(v)
    }
}

impl From<TupleValue> for BindValue {
    fn from(v: TupleValue) -> Self {
        BindValue::Tuple(v)
    }
}

/// Timestamps bind as milliseconds since the Unix epoch
impl From<chrono::DateTime<chrono::Utc>> for BindValue {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        BindValue::Int64(v.timestamp_millis())
    }
}

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(BindValue::Null, Into::into)
    }
}
