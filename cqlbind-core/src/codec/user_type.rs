//! User-defined type values

use super::slots::Slots;
use super::value::{build, BindValue};
use crate::buffer::Buffer;
use crate::config::MAX_PROTOCOL_VERSION;
use crate::error::{Error, Result};
use crate::types::{DataType, UserType};
use std::sync::Arc;

/// Value of a user-defined type, filled one field at a time
///
/// Fields nested inside a UDT always use the v3+ collection framing, since
/// user types do not exist in earlier protocol versions.
#[derive(Debug, Clone)]
pub struct UserTypeValue {
    user_type: Arc<UserType>,
    fields: Slots,
}

impl UserTypeValue {
    pub fn new(user_type: Arc<UserType>) -> Self {
        let fields = Slots::new(user_type.fields().len());
        Self { user_type, fields }
    }

    /// Build an empty value for a resolved `UserDefined` type
    pub fn from_data_type(data_type: &DataType) -> Result<Self> {
        match data_type {
            DataType::UserDefined(user_type) => Ok(Self::new(Arc::clone(user_type))),
            other => Err(Error::invalid_value_type(format!(
                "{} is not a user-defined type",
                other
            ))),
        }
    }

    pub fn user_type(&self) -> &Arc<UserType> {
        &self.user_type
    }

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.len() == 0
    }

    /// Encoded payload of a field, `None` when unset or null
    pub fn get(&self, index: usize) -> Option<&Buffer> {
        self.fields.get(index)
    }

    /// Set the field at `index`
    pub fn set(&mut self, index: usize, value: impl Into<BindValue>) -> Result<()> {
        let value = value.into();
        let user_type = &self.user_type;
        let max_depth = self.comparison_depth();
        self.fields.assign(&[index], &value, MAX_PROTOCOL_VERSION, max_depth, |i| {
            user_type.fields().get(i).map(|f| &*f.data_type)
        })
    }

    /// Set every field named `name`
    ///
    /// With duplicate field names all of them receive the value, or none do.
    pub fn set_by_name(&mut self, name: &str, value: impl Into<BindValue>) -> Result<()> {
        let value = value.into();
        let user_type = &self.user_type;
        let indices = user_type.field_indices(name);
        if indices.is_empty() {
            return Err(Error::name_not_found(name));
        }
        let max_depth = self.comparison_depth();
        self.fields.assign(indices, &value, MAX_PROTOCOL_VERSION, max_depth, |i| {
            user_type.fields().get(i).map(|f| &*f.data_type)
        })
    }

    fn comparison_depth(&self) -> usize {
        DataType::UserDefined(Arc::clone(&self.user_type)).comparison_depth()
    }

    /// Concatenated `[bytes]` of every field in declared order
    pub(crate) fn payload(&self) -> Buffer {
        build(self.fields.encoded_len(), |b| self.fields.write(b, 0))
    }

    /// Encode as `[bytes]`
    pub fn encode(&self) -> Buffer {
        super::value::frame_bytes(Some(self.payload().as_slice()))
    }
}

impl PartialEq for UserTypeValue {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
            && DataType::UserDefined(Arc::clone(&self.user_type))
                == DataType::UserDefined(Arc::clone(&other.user_type))
    }
}
