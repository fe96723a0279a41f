//! List, set and map values

use super::value::{build, BindValue};
use crate::buffer::{Buffer, INT_SIZE, SHORT_SIZE};
use crate::error::{Error, Result};
use crate::types::{CollectionKind, DataType};
use std::sync::Arc;

/// Collection value under construction
///
/// Items are kept in append order; map items alternate key, value. A
/// collection created from a schema type checks each item as it is appended,
/// an untyped one is checked item by item when it is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    kind: CollectionKind,
    data_type: Option<Arc<DataType>>,
    items: Vec<BindValue>,
}

impl Collection {
    /// Untyped collection of the given kind
    pub fn new(kind: CollectionKind, capacity: usize) -> Self {
        Self {
            kind,
            data_type: None,
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn list(capacity: usize) -> Self {
        Self::new(CollectionKind::List, capacity)
    }

    pub fn set(capacity: usize) -> Self {
        Self::new(CollectionKind::Set, capacity)
    }

    pub fn map(capacity: usize) -> Self {
        Self::new(CollectionKind::Map, capacity)
    }

    /// Collection typed by a resolved collection type
    pub fn with_type(data_type: Arc<DataType>, capacity: usize) -> Result<Self> {
        let kind = match &*data_type {
            DataType::Collection(c) => c.kind(),
            other => {
                return Err(Error::invalid_value_type(format!(
                    "{} is not a collection type",
                    other
                )))
            }
        };
        Ok(Self {
            kind,
            data_type: Some(data_type),
            items: Vec::with_capacity(capacity),
        })
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self.kind {
            CollectionKind::List => "list",
            CollectionKind::Set => "set",
            CollectionKind::Map => "map",
        }
    }

    pub fn data_type(&self) -> Option<&Arc<DataType>> {
        self.data_type.as_ref()
    }

    pub fn items(&self) -> &[BindValue] {
        &self.items
    }

    /// Number of appended items (keys and values both count for maps)
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Count written on the wire: entries for maps, items otherwise
    pub fn item_count(&self) -> usize {
        match self.kind {
            CollectionKind::Map => self.items.len() / 2,
            _ => self.items.len(),
        }
    }

    /// Append an item
    ///
    /// Nulls are rejected. On a typed collection the item must fit the
    /// element type for its position (key or value for maps).
    pub fn append(&mut self, value: impl Into<BindValue>) -> Result<()> {
        let value = value.into();
        if value.is_null() {
            return Err(Error::invalid_value_type("collection items cannot be null"));
        }
        if let Some(own) = self.data_type.as_deref() {
            if let DataType::Collection(c) = own {
                value.validate_within(c.item_type(self.items.len()), own.comparison_depth())?;
            }
        }
        self.items.push(value);
        Ok(())
    }

    /// Whether the collection may be bound against `data_type`
    pub(crate) fn is_valid_for(&self, data_type: &DataType, max_depth: usize) -> Result<bool> {
        let schema = match data_type {
            DataType::Collection(c) if c.kind() == self.kind => c,
            _ => return Ok(false),
        };

        if let Some(own) = &self.data_type {
            return own.equals_with_limit(data_type, max_depth);
        }

        for (position, item) in self.items.iter().enumerate() {
            if !item.is_valid_within(schema.item_type(position), max_depth)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Count then items, framed for `protocol_version`
    pub(crate) fn payload(&self, protocol_version: u8) -> Result<Buffer> {
        if self.kind == CollectionKind::Map && self.items.len() % 2 != 0 {
            return Err(Error::InvalidItemCount {
                count: self.items.len(),
            });
        }

        let frames = self
            .items
            .iter()
            .map(|item| item.encode_item(protocol_version))
            .collect::<Result<Vec<_>>>()?;
        let items_len: usize = frames.iter().map(Buffer::len).sum();
        let count = self.item_count();

        if protocol_version < 3 {
            let count = u16::try_from(count).map_err(|_| {
                Error::invalid_value_type(format!("{} items exceed the [short] count limit", count))
            })?;
            Ok(build(SHORT_SIZE + items_len, |b| {
                let pos = b.encode_u16(0, count);
                frames.iter().fold(pos, |pos, frame| b.copy(pos, frame))
            }))
        } else {
            let count = i32::try_from(count).map_err(|_| {
                Error::invalid_value_type(format!("{} items exceed the [int] count limit", count))
            })?;
            Ok(build(INT_SIZE + items_len, |b| {
                let pos = b.encode_i32(0, count);
                frames.iter().fold(pos, |pos, frame| b.copy(pos, frame))
            }))
        }
    }
}
