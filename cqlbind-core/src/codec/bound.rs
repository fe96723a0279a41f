//! Statement parameter blocks

use super::slots::Slots;
use super::value::{build, BindValue};
use crate::buffer::{Buffer, SHORT_SIZE};
use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::metadata::ResultMetadata;
use std::sync::Arc;

/// Values bound to a statement's positional parameters
///
/// With prepared metadata every bind is checked against the column type and
/// parameters can be bound by name; without it values are accepted as is.
#[derive(Debug, Clone)]
pub struct BoundValues {
    values: Slots,
    metadata: Option<Arc<ResultMetadata>>,
    protocol_version: u8,
    max_type_depth: usize,
}

impl BoundValues {
    /// Unprepared parameters with no schema to check against
    ///
    /// Fails with [`Error::Configuration`] if `config` does not validate.
    pub fn new(count: usize, config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            values: Slots::new(count),
            metadata: None,
            protocol_version: config.protocol_version,
            max_type_depth: config.max_type_depth,
        })
    }

    /// Parameters of a prepared statement
    ///
    /// Column types are compared at most `config.max_type_depth` levels deep.
    pub fn prepared(metadata: Arc<ResultMetadata>, config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            values: Slots::new(metadata.len()),
            metadata: Some(metadata),
            protocol_version: config.protocol_version,
            max_type_depth: config.max_type_depth,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.len() == 0
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    pub fn metadata(&self) -> Option<&Arc<ResultMetadata>> {
        self.metadata.as_ref()
    }

    /// Encoded payload at `index`, `None` when unset or null
    pub fn get(&self, index: usize) -> Option<&Buffer> {
        self.values.get(index)
    }

    pub fn bind(&mut self, index: usize, value: impl Into<BindValue>) -> Result<()> {
        let value = value.into();
        let metadata = self.metadata.as_deref();
        self.values.assign(&[index], &value, self.protocol_version, self.max_type_depth, |i| {
            metadata.and_then(|m| m.column(i)).map(|c| &*c.data_type)
        })
    }

    /// Bind every parameter named `name`, all or nothing
    pub fn bind_by_name(&mut self, name: &str, value: impl Into<BindValue>) -> Result<()> {
        let value = value.into();
        let metadata = self
            .metadata
            .as_deref()
            .ok_or_else(|| Error::name_not_found(name))?;
        let indices = metadata.indices_of(name);
        if indices.is_empty() {
            return Err(Error::name_not_found(name));
        }
        self.values.assign(indices, &value, self.protocol_version, self.max_type_depth, |i| {
            metadata.column(i).map(|c| &*c.data_type)
        })
    }

    /// `[short]` count followed by each value as `[bytes]`
    pub fn encode(&self) -> Result<Buffer> {
        let count = u16::try_from(self.values.len()).map_err(|_| {
            Error::invalid_value_type(format!(
                "{} parameters exceed the [short] count limit",
                self.values.len()
            ))
        })?;
        Ok(build(SHORT_SIZE + self.values.encoded_len(), |b| {
            let pos = b.encode_u16(0, count);
            self.values.write(b, pos)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Collection;
    use crate::metadata::ColumnDefinition;
    use crate::types::{DataType, ScalarKind};

    fn prepared() -> BoundValues {
        let metadata = ResultMetadata::new(vec![
            ColumnDefinition::new("ks", "t", "id", DataType::scalar(ScalarKind::Int)),
            ColumnDefinition::new("ks", "t", "name", DataType::scalar(ScalarKind::Text)),
            ColumnDefinition::new("ks", "t", "id", DataType::scalar(ScalarKind::Int)),
            ColumnDefinition::new(
                "ks",
                "t",
                "props",
                DataType::map(
                    DataType::scalar(ScalarKind::Text),
                    DataType::scalar(ScalarKind::Text),
                    false,
                ),
            ),
        ]);
        BoundValues::prepared(Arc::new(metadata), &CodecConfig::default()).unwrap()
    }

    #[test]
    fn test_unprepared_accepts_anything() {
        let mut values = BoundValues::new(2, &CodecConfig::for_protocol(2)).unwrap();
        values.bind(0, "text").unwrap();
        values.bind(1, 3.5f64).unwrap();
        assert_eq!(values.protocol_version(), 2);
        assert_eq!(values.bind(2, 1).unwrap_err(), Error::IndexOutOfBounds { index: 2, count: 2 });
        assert!(matches!(values.bind_by_name("x", 1), Err(Error::NameNotFound(_))));
    }

    #[test]
    fn test_prepared_checks_types() {
        let mut values = prepared();
        assert!(matches!(values.bind(1, 5), Err(Error::InvalidValueType(_))));
        assert!(values.get(1).is_none());
        values.bind(1, "bob").unwrap();
        assert_eq!(values.get(1).unwrap().as_slice(), b"bob");
    }

    #[test]
    fn test_bind_by_name_duplicates() {
        let mut values = prepared();
        values.bind_by_name("id", 9).unwrap();
        assert_eq!(values.get(0).unwrap().as_slice(), &9i32.to_be_bytes());
        assert_eq!(values.get(2).unwrap().as_slice(), &9i32.to_be_bytes());

        assert!(values.bind_by_name("id", "nine").is_err());
        assert_eq!(values.get(0).unwrap().as_slice(), &9i32.to_be_bytes());
        assert!(matches!(values.bind_by_name("nope", 1), Err(Error::NameNotFound(_))));
    }

    #[test]
    fn test_odd_map_writes_nothing() {
        let mut values = prepared();
        let mut props = Collection::map(3);
        props.append("a").unwrap();
        props.append("b").unwrap();
        props.append("c").unwrap();
        assert_eq!(values.bind(3, props).unwrap_err(), Error::InvalidItemCount { count: 3 });
        assert!(values.get(3).is_none());
    }

    #[test]
    fn test_encode_parameter_block() {
        let mut values = BoundValues::new(3, &CodecConfig::default()).unwrap();
        values.bind(0, 1).unwrap();
        values.bind(2, "").unwrap();
        let encoded = values.encode().unwrap();
        assert_eq!(
            encoded.as_slice(),
            &[0, 3, 0, 0, 0, 4, 0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = BoundValues::new(1, &CodecConfig::for_protocol(0)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let config = CodecConfig {
            max_type_depth: 0,
            ..CodecConfig::default()
        };
        let metadata = Arc::new(ResultMetadata::default());
        assert!(matches!(
            BoundValues::prepared(metadata, &config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_configured_depth_applies_to_binds() {
        let deep = (0..70).fold(DataType::scalar(ScalarKind::Int), |inner, _| {
            DataType::list(inner, false)
        });
        let metadata = Arc::new(ResultMetadata::new(vec![ColumnDefinition::new(
            "ks",
            "t",
            "nested",
            Arc::clone(&deep),
        )]));

        let config = CodecConfig {
            max_type_depth: 100,
            ..CodecConfig::default()
        };
        let mut values = BoundValues::prepared(Arc::clone(&metadata), &config).unwrap();
        values
            .bind(0, Collection::with_type(Arc::clone(&deep), 0).unwrap())
            .unwrap();
        assert!(values.get(0).is_some());

        let mut values = BoundValues::prepared(metadata, &CodecConfig::default()).unwrap();
        assert_eq!(
            values
                .bind(0, Collection::with_type(deep, 0).unwrap())
                .unwrap_err(),
            Error::TypeTooDeep { max_depth: 64 }
        );
        assert!(values.get(0).is_none());
    }
}
