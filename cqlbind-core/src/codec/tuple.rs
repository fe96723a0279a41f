//! Tuple values

use super::slots::Slots;
use super::value::{build, frame_bytes, BindValue};
use crate::buffer::Buffer;
use crate::config::MAX_PROTOCOL_VERSION;
use crate::error::{Error, Result};
use crate::types::{DataType, TupleType};
use std::sync::Arc;

/// Value of a tuple type, filled by element index
#[derive(Debug, Clone)]
pub struct TupleValue {
    tuple_type: Arc<TupleType>,
    elements: Slots,
}

impl TupleValue {
    pub fn new(tuple_type: Arc<TupleType>) -> Self {
        let elements = Slots::new(tuple_type.element_types().len());
        Self {
            tuple_type,
            elements,
        }
    }

    pub fn from_data_type(data_type: &DataType) -> Result<Self> {
        match data_type {
            DataType::Tuple(tuple_type) => Ok(Self::new(Arc::clone(tuple_type))),
            other => Err(Error::invalid_value_type(format!("{} is not a tuple type", other))),
        }
    }

    pub fn tuple_type(&self) -> &Arc<TupleType> {
        &self.tuple_type
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Buffer> {
        self.elements.get(index)
    }

    pub fn set(&mut self, index: usize, value: impl Into<BindValue>) -> Result<()> {
        let value = value.into();
        let max_depth = DataType::Tuple(Arc::clone(&self.tuple_type)).comparison_depth();
        let tuple_type = &self.tuple_type;
        self.elements.assign(&[index], &value, MAX_PROTOCOL_VERSION, max_depth, |i| {
            tuple_type.element_types().get(i).map(|t| &**t)
        })
    }

    pub(crate) fn payload(&self) -> Buffer {
        build(self.elements.encoded_len(), |b| self.elements.write(b, 0))
    }

    pub fn encode(&self) -> Buffer {
        frame_bytes(Some(self.payload().as_slice()))
    }
}

impl PartialEq for TupleValue {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
            && DataType::Tuple(Arc::clone(&self.tuple_type))
                == DataType::Tuple(Arc::clone(&other.tuple_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarKind;

    fn pair() -> Arc<TupleType> {
        Arc::new(TupleType::new(vec![
            DataType::scalar(ScalarKind::Text),
            DataType::scalar(ScalarKind::BigInt),
        ]))
    }

    #[test]
    fn test_set_and_encode() {
        let mut value = TupleValue::new(pair());
        value.set(0, "a").unwrap();
        value.set(1, 2i64).unwrap();

        let encoded = value.encode();
        assert_eq!(
            encoded.as_slice(),
            &[0, 0, 0, 17, 0, 0, 0, 1, b'a', 0, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0, 2]
        );
    }

    #[test]
    fn test_set_rejects_bad_index_and_type() {
        let mut value = TupleValue::new(pair());
        assert_eq!(
            value.set(2, "x").unwrap_err(),
            Error::IndexOutOfBounds { index: 2, count: 2 }
        );
        assert!(matches!(value.set(1, 2i32), Err(Error::InvalidValueType(_))));
        assert!(value.get(1).is_none());
    }

    #[test]
    fn test_tuple_value_validity() {
        let value = BindValue::Tuple(TupleValue::new(pair()));
        let same = TupleType::new(vec![
            DataType::scalar(ScalarKind::Text),
            DataType::scalar(ScalarKind::BigInt),
        ])
        .into_data_type();
        let other = TupleType::new(vec![DataType::scalar(ScalarKind::Text)]).into_data_type();
        assert!(value.is_valid_for(&same).unwrap());
        assert!(!value.is_valid_for(&other).unwrap());
    }
}
