use super::value::BindValue;
use crate::buffer::{Buffer, BufferBuilder, INT_SIZE};
use crate::error::{Error, Result};
use crate::types::DataType;

/// Fixed set of bind positions, each unset or holding an encoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slots {
    values: Vec<Option<Buffer>>,
}

impl Slots {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            values: vec![None; count],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Buffer> {
        self.values.get(index).and_then(Option::as_ref)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.values.len() {
            Ok(())
        } else {
            Err(Error::IndexOutOfBounds {
                index,
                count: self.values.len(),
            })
        }
    }

    /// Encode `value` once and store it at every index in `indices`
    ///
    /// Every index is bounds-checked and type-checked (comparing nested types
    /// at most `max_depth` levels deep) before anything is written, so a
    /// failure leaves all positions untouched.
    pub(crate) fn assign<'t, F>(
        &mut self,
        indices: &[usize],
        value: &BindValue,
        protocol_version: u8,
        max_depth: usize,
        type_at: F,
    ) -> Result<()>
    where
        F: Fn(usize) -> Option<&'t DataType>,
    {
        for &index in indices {
            self.check_index(index)?;
            if let Some(data_type) = type_at(index) {
                value.validate_within(data_type, max_depth)?;
            }
        }

        let payload = value.payload(protocol_version)?;
        for &index in indices {
            self.values[index] = payload.clone();
        }
        Ok(())
    }

    /// Size of every slot framed as `[bytes]`
    pub(crate) fn encoded_len(&self) -> usize {
        self.values
            .iter()
            .map(|v| INT_SIZE + v.as_ref().map_or(0, Buffer::len))
            .sum()
    }

    /// Write every slot as `[bytes]`, unset slots as null
    pub(crate) fn write(&self, builder: &mut BufferBuilder, offset: usize) -> usize {
        self.values
            .iter()
            .fold(offset, |pos, v| builder.encode_bytes(pos, v.as_deref()))
    }
}
