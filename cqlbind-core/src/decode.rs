//! Zero-copy views over response values
//!
//! A [`DecodeView`] pairs a borrowed slice of a response frame with the
//! resolved type of the value it holds. Nothing is copied: collection, map,
//! UDT and tuple iterators walk the slice with a cursor and hand out child
//! views borrowing the same bytes. The borrow checker keeps views from
//! outliving the response buffer.

use crate::codec::Decimal;
use crate::config::MAX_PROTOCOL_VERSION;
use crate::error::{Error, Result};
use crate::metadata::ResultMetadata;
use crate::types::{CollectionKind, CollectionType, DataType, ScalarKind, UserType};
use nom::{
    bytes::complete::take,
    number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16},
    IResult,
};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use uuid::Uuid;

fn finish<'a, T>(result: IResult<&'a [u8], T>, what: &str) -> Result<(&'a [u8], T)> {
    match result {
        Ok(parsed) => Ok(parsed),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(Error::decode(format!(
            "truncated {} ({:?} with {} bytes left)",
            what,
            e.code,
            e.input.len()
        ))),
        Err(nom::Err::Incomplete(_)) => Err(Error::decode(format!("incomplete {}", what))),
    }
}

/// Read a `[bytes]` value (`None` for null)
pub fn parse_bytes(input: &[u8]) -> IResult<&[u8], Option<&[u8]>> {
    let (input, len) = be_i32(input)?;
    if len < 0 {
        return Ok((input, None));
    }
    let (input, bytes) = take(len as usize)(input)?;
    Ok((input, Some(bytes)))
}

/// Read a `[short bytes]` value
pub fn parse_short_bytes(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u16(input)?;
    take(len as usize)(input)
}

fn parse_count(input: &[u8], short: bool) -> IResult<&[u8], usize> {
    if short {
        let (input, count) = be_u16(input)?;
        Ok((input, count as usize))
    } else {
        let (input, count) = be_i32(input)?;
        Ok((input, count.max(0) as usize))
    }
}

fn parse_item(input: &[u8], short: bool) -> IResult<&[u8], Option<&[u8]>> {
    if short {
        let (input, bytes) = parse_short_bytes(input)?;
        Ok((input, Some(bytes)))
    } else {
        parse_bytes(input)
    }
}

/// Read-only view of one value
#[derive(Debug, Clone, Copy)]
pub struct DecodeView<'a> {
    data_type: &'a DataType,
    data: Option<&'a [u8]>,
    protocol_version: u8,
}

impl<'a> DecodeView<'a> {
    /// View over an already unframed payload (`None` for null)
    pub fn new(data_type: &'a DataType, data: Option<&'a [u8]>, protocol_version: u8) -> Self {
        Self {
            data_type,
            data,
            protocol_version,
        }
    }

    /// Read one `[bytes]` value from the front of `input`
    ///
    /// Returns the view and the rest of the input.
    pub fn from_frame(
        data_type: &'a DataType,
        input: &'a [u8],
        protocol_version: u8,
    ) -> Result<(Self, &'a [u8])> {
        let (rest, data) = finish(parse_bytes(input), "value")?;
        Ok((Self::new(data_type, data, protocol_version), rest))
    }

    pub fn data_type(&self) -> &'a DataType {
        self.data_type
    }

    /// Raw payload, `None` for null
    pub fn bytes(&self) -> Option<&'a [u8]> {
        self.data
    }

    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    fn short_framing(&self) -> bool {
        self.protocol_version < 3
    }

    fn non_null(&self) -> Result<&'a [u8]> {
        self.data
            .ok_or_else(|| Error::decode(format!("{} value is null", self.data_type)))
    }

    fn collection(&self) -> Result<&'a CollectionType> {
        match self.data_type {
            DataType::Collection(c) => Ok(c),
            other => Err(Error::decode(format!("{} is not a collection", other))),
        }
    }

    /// Wire count of a collection (entries for maps); 0 for null
    pub fn count(&self) -> Result<usize> {
        self.collection()?;
        match self.data {
            None => Ok(0),
            Some(data) => {
                let (_, count) = finish(parse_count(data, self.short_framing()), "collection count")?;
                Ok(count)
            }
        }
    }

    /// Items of a list or set, or keys and values of a map in wire order
    pub fn items(&self) -> Result<CollectionIter<'a>> {
        let collection = self.collection()?;
        let (input, count) = match self.data {
            None => (&[][..], 0),
            Some(data) => finish(parse_count(data, self.short_framing()), "collection count")?,
        };
        let remaining = match collection.kind() {
            CollectionKind::Map => count.saturating_mul(2),
            _ => count,
        };
        Ok(CollectionIter {
            collection,
            input,
            position: 0,
            remaining,
            protocol_version: self.protocol_version,
        })
    }

    /// Key/value pairs of a map
    pub fn entries(&self) -> Result<MapIter<'a>> {
        if !self.data_type.is_map() {
            return Err(Error::decode(format!("{} is not a map", self.data_type)));
        }
        Ok(MapIter {
            items: self.items()?,
        })
    }

    /// Fields of a UDT value as `(name, view)` in declared order
    ///
    /// Values written before fields were added to the type end early; the
    /// iteration stops at the end of the payload.
    pub fn fields(&self) -> Result<UserTypeIter<'a>> {
        let user_type = match self.data_type {
            DataType::UserDefined(u) => &**u,
            other => return Err(Error::decode(format!("{} is not a user type", other))),
        };
        Ok(UserTypeIter {
            user_type,
            input: self.data.unwrap_or(&[]),
            position: 0,
        })
    }

    /// Elements of a tuple value
    pub fn elements(&self) -> Result<TupleIter<'a>> {
        let element_types = match self.data_type {
            DataType::Tuple(t) => t.element_types(),
            other => return Err(Error::decode(format!("{} is not a tuple", other))),
        };
        Ok(TupleIter {
            element_types,
            input: self.data.unwrap_or(&[]),
            position: 0,
        })
    }

    fn scalar_bytes(&self, kinds: &[ScalarKind]) -> Result<&'a [u8]> {
        match self.data_type {
            DataType::Scalar(kind) if kinds.contains(kind) => self.non_null(),
            other => Err(Error::decode(format!(
                "cannot read {} as {}",
                other,
                kinds
                    .iter()
                    .map(|k| k.cql_name())
                    .collect::<Vec<_>>()
                    .join("/")
            ))),
        }
    }

    fn fixed<T>(
        &self,
        kinds: &[ScalarKind],
        width: usize,
        parser: fn(&'a [u8]) -> IResult<&'a [u8], T>,
    ) -> Result<T> {
        let data = self.scalar_bytes(kinds)?;
        if data.len() != width {
            return Err(Error::decode(format!(
                "expected {} bytes for {}, found {}",
                width,
                self.data_type,
                data.len()
            )));
        }
        let (_, value) = finish(parser(data), "scalar")?;
        Ok(value)
    }

    pub fn as_i32(&self) -> Result<i32> {
        self.fixed(&[ScalarKind::Int], 4, be_i32)
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.fixed(
            &[ScalarKind::BigInt, ScalarKind::Counter, ScalarKind::Timestamp],
            8,
            be_i64,
        )
    }

    pub fn as_f32(&self) -> Result<f32> {
        self.fixed(&[ScalarKind::Float], 4, be_f32)
    }

    pub fn as_f64(&self) -> Result<f64> {
        self.fixed(&[ScalarKind::Double], 8, be_f64)
    }

    pub fn as_bool(&self) -> Result<bool> {
        let data = self.scalar_bytes(&[ScalarKind::Boolean])?;
        match data {
            [b] => Ok(*b != 0),
            _ => Err(Error::decode(format!(
                "expected 1 byte for boolean, found {}",
                data.len()
            ))),
        }
    }

    pub fn as_str(&self) -> Result<&'a str> {
        let data =
            self.scalar_bytes(&[ScalarKind::Ascii, ScalarKind::Text, ScalarKind::Varchar])?;
        std::str::from_utf8(data).map_err(|e| Error::decode(format!("invalid UTF-8: {}", e)))
    }

    /// Raw payload of any non-null value
    pub fn as_bytes(&self) -> Result<&'a [u8]> {
        self.non_null()
    }

    pub fn as_uuid(&self) -> Result<Uuid> {
        let data = self.scalar_bytes(&[ScalarKind::Uuid, ScalarKind::TimeUuid])?;
        Uuid::from_slice(data).map_err(|e| Error::decode(format!("invalid uuid: {}", e)))
    }

    pub fn as_inet(&self) -> Result<IpAddr> {
        let data = self.scalar_bytes(&[ScalarKind::Inet])?;
        if let Ok(octets) = <[u8; 4]>::try_from(data) {
            return Ok(IpAddr::V4(Ipv4Addr::from(octets)));
        }
        if let Ok(octets) = <[u8; 16]>::try_from(data) {
            return Ok(IpAddr::V6(Ipv6Addr::from(octets)));
        }
        Err(Error::decode(format!(
            "expected 4 or 16 bytes for inet, found {}",
            data.len()
        )))
    }

    pub fn as_decimal(&self) -> Result<Decimal> {
        let data = self.scalar_bytes(&[ScalarKind::Decimal])?;
        let (unscaled, scale) = finish(be_i32(data), "decimal scale")?;
        Ok(Decimal::new(unscaled.to_vec(), scale))
    }
}

/// Cursor over the items of a collection
pub struct CollectionIter<'a> {
    collection: &'a CollectionType,
    input: &'a [u8],
    position: usize,
    remaining: usize,
    protocol_version: u8,
}

impl<'a> Iterator for CollectionIter<'a> {
    type Item = Result<DecodeView<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let short = self.protocol_version < 3;
        match finish(parse_item(self.input, short), "collection item") {
            Ok((rest, data)) => {
                self.input = rest;
                let data_type = self.collection.item_type(self.position);
                self.position += 1;
                Some(Ok(DecodeView::new(data_type, data, self.protocol_version)))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// Cursor over map entries
pub struct MapIter<'a> {
    items: CollectionIter<'a>,
}

impl<'a> Iterator for MapIter<'a> {
    type Item = Result<(DecodeView<'a>, DecodeView<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = match self.items.next()? {
            Ok(key) => key,
            Err(e) => return Some(Err(e)),
        };
        match self.items.next() {
            Some(Ok(value)) => Some(Ok((key, value))),
            Some(Err(e)) => Some(Err(e)),
            None => Some(Err(Error::decode("map entry is missing its value"))),
        }
    }
}

/// Cursor over UDT fields
pub struct UserTypeIter<'a> {
    user_type: &'a UserType,
    input: &'a [u8],
    position: usize,
}

impl<'a> Iterator for UserTypeIter<'a> {
    type Item = Result<(&'a str, DecodeView<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let field = self.user_type.fields().get(self.position)?;
        if self.input.is_empty() {
            return None;
        }
        self.position += 1;

        match finish(parse_bytes(self.input), "user type field") {
            Ok((rest, data)) => {
                self.input = rest;
                let view = DecodeView::new(&field.data_type, data, MAX_PROTOCOL_VERSION);
                Some(Ok((field.name.as_str(), view)))
            }
            Err(e) => {
                self.position = self.user_type.fields().len();
                Some(Err(e))
            }
        }
    }
}

/// Cursor over tuple elements
pub struct TupleIter<'a> {
    element_types: &'a [std::sync::Arc<DataType>],
    input: &'a [u8],
    position: usize,
}

impl<'a> Iterator for TupleIter<'a> {
    type Item = Result<DecodeView<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let data_type = self.element_types.get(self.position)?;
        if self.input.is_empty() {
            return None;
        }
        self.position += 1;

        match finish(parse_bytes(self.input), "tuple element") {
            Ok((rest, data)) => {
                self.input = rest;
                Some(Ok(DecodeView::new(data_type, data, MAX_PROTOCOL_VERSION)))
            }
            Err(e) => {
                self.position = self.element_types.len();
                Some(Err(e))
            }
        }
    }
}

/// Rows of a `Rows` result body, each a sequence of `[bytes]` cells
pub struct RowsView<'a> {
    metadata: &'a ResultMetadata,
    input: &'a [u8],
    remaining: usize,
    protocol_version: u8,
}

impl<'a> RowsView<'a> {
    /// `input` starts at the `[int]` row count
    pub fn new(metadata: &'a ResultMetadata, input: &'a [u8], protocol_version: u8) -> Result<Self> {
        let (input, count) = finish(be_i32(input), "row count")?;
        Ok(Self {
            metadata,
            input,
            remaining: count.max(0) as usize,
            protocol_version,
        })
    }

    /// Rows not yet yielded
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<'a> Iterator for RowsView<'a> {
    type Item = Result<Row<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let mut columns = Vec::with_capacity(self.metadata.len());
        for column in self.metadata.columns() {
            match DecodeView::from_frame(&column.data_type, self.input, self.protocol_version) {
                Ok((view, rest)) => {
                    self.input = rest;
                    columns.push(view);
                }
                Err(e) => {
                    self.remaining = 0;
                    return Some(Err(e));
                }
            }
        }

        Some(Ok(Row {
            metadata: self.metadata,
            columns,
        }))
    }
}

/// One decoded row
#[derive(Debug, Clone)]
pub struct Row<'a> {
    metadata: &'a ResultMetadata,
    columns: Vec<DecodeView<'a>>,
}

impl<'a> Row<'a> {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<DecodeView<'a>> {
        self.columns.get(index).copied()
    }

    /// First column named `name`
    pub fn column_by_name(&self, name: &str) -> Result<DecodeView<'a>> {
        self.metadata
            .indices_of(name)
            .first()
            .and_then(|&i| self.column(i))
            .ok_or_else(|| Error::name_not_found(name))
    }

    pub fn columns(&self) -> &[DecodeView<'a>] {
        &self.columns
    }
}
