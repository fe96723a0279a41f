//! Recursive-descent parser for marshal class names
//!
//! Cassandra describes column, key and UDT field types with Java class names
//! such as:
//!
//! ```text
//! org.apache.cassandra.db.marshal.MapType(
//!     org.apache.cassandra.db.marshal.UTF8Type,
//!     org.apache.cassandra.db.marshal.ListType(org.apache.cassandra.db.marshal.Int32Type))
//! ```
//!
//! [`TypeParser::parse_one`] turns one such name into a [`DataType`] tree and
//! [`TypeParser::parse_with_composite`] resolves a whole key validator or
//! comparator, including `CompositeType` components and the
//! `ColumnToCollectionType` side table.

use super::lexer::Lexer;
use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::types::{
    DataType, ScalarKind, TupleType, UserType, UserTypeField, DEFAULT_MAX_DEPTH,
};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const REVERSED_TYPE: &str = "org.apache.cassandra.db.marshal.ReversedType";
pub const FROZEN_TYPE: &str = "org.apache.cassandra.db.marshal.FrozenType";
pub const COMPOSITE_TYPE: &str = "org.apache.cassandra.db.marshal.CompositeType";
pub const COLLECTION_TYPE: &str = "org.apache.cassandra.db.marshal.ColumnToCollectionType";
pub const LIST_TYPE: &str = "org.apache.cassandra.db.marshal.ListType";
pub const SET_TYPE: &str = "org.apache.cassandra.db.marshal.SetType";
pub const MAP_TYPE: &str = "org.apache.cassandra.db.marshal.MapType";
pub const UDT_TYPE: &str = "org.apache.cassandra.db.marshal.UserType";
pub const TUPLE_TYPE: &str = "org.apache.cassandra.db.marshal.TupleType";

static SCALAR_TYPES: Lazy<HashMap<&'static str, ScalarKind>> = Lazy::new(|| {
    [
        ("org.apache.cassandra.db.marshal.AsciiType", ScalarKind::Ascii),
        ("org.apache.cassandra.db.marshal.LongType", ScalarKind::BigInt),
        ("org.apache.cassandra.db.marshal.BytesType", ScalarKind::Blob),
        ("org.apache.cassandra.db.marshal.BooleanType", ScalarKind::Boolean),
        ("org.apache.cassandra.db.marshal.CounterColumnType", ScalarKind::Counter),
        ("org.apache.cassandra.db.marshal.DecimalType", ScalarKind::Decimal),
        ("org.apache.cassandra.db.marshal.DoubleType", ScalarKind::Double),
        ("org.apache.cassandra.db.marshal.FloatType", ScalarKind::Float),
        ("org.apache.cassandra.db.marshal.InetAddressType", ScalarKind::Inet),
        ("org.apache.cassandra.db.marshal.Int32Type", ScalarKind::Int),
        ("org.apache.cassandra.db.marshal.UTF8Type", ScalarKind::Text),
        ("org.apache.cassandra.db.marshal.TimestampType", ScalarKind::Timestamp),
        ("org.apache.cassandra.db.marshal.DateType", ScalarKind::Timestamp),
        ("org.apache.cassandra.db.marshal.UUIDType", ScalarKind::Uuid),
        ("org.apache.cassandra.db.marshal.IntegerType", ScalarKind::Int),
        ("org.apache.cassandra.db.marshal.TimeUUIDType", ScalarKind::TimeUuid),
    ]
    .into_iter()
    .collect()
});

/// Scalar kind for a primitive marshal class name
pub fn lookup_scalar(class_name: &str) -> Option<ScalarKind> {
    SCALAR_TYPES.get(class_name).copied()
}

pub fn is_reversed(class_name: &str) -> bool {
    class_name.starts_with(REVERSED_TYPE)
}

pub fn is_frozen(class_name: &str) -> bool {
    class_name.starts_with(FROZEN_TYPE)
}

pub fn is_composite(class_name: &str) -> bool {
    class_name.starts_with(COMPOSITE_TYPE)
}

pub fn is_collection(class_name: &str) -> bool {
    class_name.starts_with(COLLECTION_TYPE)
}

pub fn is_user_type(class_name: &str) -> bool {
    class_name.starts_with(UDT_TYPE)
}

pub fn is_tuple_type(class_name: &str) -> bool {
    class_name.starts_with(TUPLE_TYPE)
}

/// One component of a resolved key descriptor
#[derive(Debug, Clone)]
pub struct KeyComponent {
    pub data_type: Arc<DataType>,
    pub reversed: bool,
}

/// Resolved key validator or comparator
#[derive(Debug, Clone)]
pub struct ParseResult {
    composite: bool,
    components: Vec<KeyComponent>,
    collections: BTreeMap<String, Arc<DataType>>,
}

impl ParseResult {
    fn single(data_type: Arc<DataType>, reversed: bool) -> Self {
        Self {
            composite: false,
            components: vec![KeyComponent { data_type, reversed }],
            collections: BTreeMap::new(),
        }
    }

    pub fn is_composite(&self) -> bool {
        self.composite
    }

    /// Key components in declaration order (exactly one when not composite)
    pub fn components(&self) -> &[KeyComponent] {
        &self.components
    }

    /// Collection-typed columns declared by a trailing `ColumnToCollectionType`
    pub fn collections(&self) -> &BTreeMap<String, Arc<DataType>> {
        &self.collections
    }

    /// Collection type of a non-key column, by name
    pub fn collection(&self, column: &str) -> Option<&Arc<DataType>> {
        self.collections.get(column)
    }
}

/// Marshal class parser with a nesting limit
#[derive(Debug, Clone, Copy)]
pub struct TypeParser {
    max_depth: usize,
}

impl Default for TypeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeParser {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Parser limited to `config.max_type_depth`, taken as is; validate the
    /// config first, since a limit of 0 rejects every type
    pub fn with_config(config: &CodecConfig) -> Self {
        Self {
            max_depth: config.max_type_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Parse a single (possibly nested) marshal class name
    pub fn parse_one(&self, class_name: &str) -> Result<Arc<DataType>> {
        self.parse_at(class_name, 1).map_err(|e| {
            log::debug!("failed to resolve marshal type {:?}: {}", class_name, e);
            e
        })
    }

    /// Parse a key validator or comparator, splitting composites
    pub fn parse_with_composite(&self, class_name: &str) -> Result<ParseResult> {
        self.parse_composite(class_name).map_err(|e| {
            log::debug!("failed to resolve key descriptor {:?}: {}", class_name, e);
            e
        })
    }

    fn parse_composite(&self, class_name: &str) -> Result<ParseResult> {
        let mut lexer = Lexer::new(class_name);
        let next = lexer.next_name();

        if !is_composite(next) {
            let data_type = self.parse_at(class_name, 1)?;
            return Ok(ParseResult::single(data_type, is_reversed(next)));
        }

        let mut params = lexer.type_params()?;
        lexer.expect_end()?;
        if params.is_empty() {
            return Err(lexer.error("composite type has no components"));
        }

        let mut collections = BTreeMap::new();
        let has_collections = params.last().map_or(false, |last| is_collection(last));
        if has_collections {
            if let Some(last) = params.pop() {
                let mut side = Lexer::new(&last);
                side.next_name();
                for (name_hex, type_name) in side.collection_params()? {
                    let column = decode_hex_name(&name_hex)?;
                    let data_type = self.parse_at(&type_name, 1)?;
                    collections.insert(column, data_type);
                }
            }
        }

        let mut components = Vec::with_capacity(params.len());
        for param in &params {
            let mut component = Lexer::new(param);
            let reversed = is_reversed(component.next_name());
            components.push(KeyComponent {
                data_type: self.parse_at(param, 1)?,
                reversed,
            });
        }

        Ok(ParseResult {
            composite: true,
            components,
            collections,
        })
    }

    fn parse_at(&self, class_name: &str, depth: usize) -> Result<Arc<DataType>> {
        if depth > self.max_depth {
            return Err(Error::TypeTooDeep {
                max_depth: self.max_depth,
            });
        }

        // Peel any number of ReversedType/FrozenType wrappers
        let mut frozen = false;
        let mut current = class_name.to_string();
        loop {
            let mut lexer = Lexer::new(&current);
            let next = lexer.next_name();
            if is_frozen(next) {
                frozen = true;
            } else if !is_reversed(next) {
                break;
            }
            let inner = nested_class_name(&mut lexer)?;
            current = inner;
        }

        let mut lexer = Lexer::new(&current);
        let next = lexer.next_name();
        if next.is_empty() {
            return Err(lexer.error("expected a type name"));
        }

        if next.starts_with(LIST_TYPE) || next.starts_with(SET_TYPE) {
            let params = lexer.type_params()?;
            lexer.expect_end()?;
            if params.len() != 1 {
                return Err(lexer.error(&format!(
                    "expected 1 type parameter for {}, found {}",
                    next,
                    params.len()
                )));
            }
            let element = self.parse_at(&params[0], depth + 1)?;
            return Ok(if next.starts_with(LIST_TYPE) {
                DataType::list(element, frozen)
            } else {
                DataType::set(element, frozen)
            });
        }

        if next.starts_with(MAP_TYPE) {
            let params = lexer.type_params()?;
            lexer.expect_end()?;
            if params.len() != 2 {
                return Err(lexer.error(&format!(
                    "expected 2 type parameters for {}, found {}",
                    next,
                    params.len()
                )));
            }
            let key = self.parse_at(&params[0], depth + 1)?;
            let value = self.parse_at(&params[1], depth + 1)?;
            return Ok(DataType::map(key, value, frozen));
        }

        if is_user_type(next) {
            return self.parse_user_type(&mut lexer, depth, frozen);
        }

        if is_tuple_type(next) {
            let params = lexer.type_params()?;
            lexer.expect_end()?;
            let mut element_types = Vec::with_capacity(params.len());
            for param in &params {
                element_types.push(self.parse_at(param, depth + 1)?);
            }
            return Ok(TupleType::new(element_types).into_data_type());
        }

        if frozen {
            log::warn!("frozen wrapper around non-collection type {}", next);
        }

        lexer.read_raw_arguments()?;
        lexer.expect_end()?;

        Ok(match lookup_scalar(next) {
            Some(kind) => DataType::scalar(kind),
            None => DataType::custom(next),
        })
    }

    fn parse_user_type(
        &self,
        lexer: &mut Lexer<'_>,
        depth: usize,
        frozen: bool,
    ) -> Result<Arc<DataType>> {
        lexer.expect(b'(')?;

        let keyspace = decode_hex_name(&lexer.read_one()?)?;
        lexer.skip_blank_and_comma();
        let type_name = decode_hex_name(&lexer.read_one()?)?;

        let mut fields = Vec::new();
        for (name_hex, type_name) in lexer.name_and_type_params()? {
            let name = decode_hex_name(&name_hex)?;
            let data_type = self.parse_at(&type_name, depth + 1)?;
            fields.push(UserTypeField::new(name, data_type));
        }
        lexer.expect_end()?;

        Ok(UserType::new(keyspace, type_name, fields)
            .frozen(frozen)
            .into_data_type())
    }
}

/// The single parameter of a `ReversedType(...)` / `FrozenType(...)` wrapper
fn nested_class_name(lexer: &mut Lexer<'_>) -> Result<String> {
    let mut params = lexer.type_params()?;
    lexer.expect_end()?;
    if params.len() != 1 {
        return Err(lexer.error(&format!(
            "expected 1 type parameter for wrapper, found {}",
            params.len()
        )));
    }
    Ok(params.remove(0))
}

fn decode_hex_name(hex_name: &str) -> Result<String> {
    let bytes = hex::decode(hex_name)?;
    String::from_utf8(bytes)
        .map_err(|_| Error::parse(format!("hex name {} is not valid UTF-8", hex_name)))
}

/// Parse a marshal class name with the default nesting limit
pub fn parse_one(class_name: &str) -> Result<Arc<DataType>> {
    TypeParser::new().parse_one(class_name)
}

/// Parse a key descriptor with the default nesting limit
pub fn parse_with_composite(class_name: &str) -> Result<ParseResult> {
    TypeParser::new().parse_with_composite(class_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CollectionKind;

    const P: &str = "org.apache.cassandra.db.marshal.";

    fn m(name: &str) -> String {
        format!("{}{}", P, name)
    }

    #[test]
    fn test_scalar_table() {
        assert_eq!(lookup_scalar(&m("Int32Type")), Some(ScalarKind::Int));
        assert_eq!(lookup_scalar(&m("DateType")), Some(ScalarKind::Timestamp));
        assert_eq!(lookup_scalar(&m("IntegerType")), Some(ScalarKind::Int));
        assert_eq!(lookup_scalar(&m("VarcharType")), None);
        assert_eq!(SCALAR_TYPES.len(), 16);
    }

    #[test]
    fn test_parse_scalar() {
        let t = parse_one(&m("Int32Type")).unwrap();
        assert_eq!(t.scalar_kind(), Some(ScalarKind::Int));

        let t = parse_one(&format!("  {}  ", m("UTF8Type"))).unwrap();
        assert_eq!(t.scalar_kind(), Some(ScalarKind::Text));
    }

    #[test]
    fn test_unknown_becomes_custom() {
        let t = parse_one("com.example.PointType").unwrap();
        assert!(matches!(&*t, DataType::Custom(name) if name == "com.example.PointType"));
    }

    #[test]
    fn test_parse_list_of_text() {
        let t = parse_one(&format!("{}({})", m("ListType"), m("UTF8Type"))).unwrap();
        match &*t {
            DataType::Collection(c) => {
                assert_eq!(c.kind(), CollectionKind::List);
                assert_eq!(c.element_types()[0].scalar_kind(), Some(ScalarKind::Text));
                assert!(!c.is_frozen());
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_frozen_and_reversed_wrappers() {
        let s = format!(
            "{}({}({}({})))",
            m("ReversedType"),
            m("FrozenType"),
            m("SetType"),
            m("UUIDType")
        );
        let t = parse_one(&s).unwrap();
        assert!(t.is_frozen());
        assert!(t.equals(&DataType::set(DataType::scalar(ScalarKind::Uuid), false)).unwrap());
    }

    #[test]
    fn test_map_arity() {
        let ok = format!("{}({},{})", m("MapType"), m("UTF8Type"), m("Int32Type"));
        assert!(parse_one(&ok).unwrap().is_map());

        let one = format!("{}({})", m("MapType"), m("UTF8Type"));
        assert!(matches!(parse_one(&one), Err(Error::Parse(_))));

        let three = format!("{}({},{},{})", m("MapType"), m("UTF8Type"), m("UTF8Type"), m("UTF8Type"));
        assert!(matches!(parse_one(&three), Err(Error::Parse(_))));

        let two_lists = format!("{}({},{})", m("ListType"), m("UTF8Type"), m("UTF8Type"));
        assert!(matches!(parse_one(&two_lists), Err(Error::Parse(_))));

        assert!(matches!(parse_one(&m("ListType")), Err(Error::Parse(_))));
    }

    #[test]
    fn test_user_type() {
        let s = format!("{}(6578,6974656d,737472656574:{})", m("UserType"), m("UTF8Type"));
        let t = parse_one(&s).unwrap();
        match &*t {
            DataType::UserDefined(udt) => {
                assert_eq!(udt.keyspace(), "ex");
                assert_eq!(udt.type_name(), "item");
                assert_eq!(udt.fields().len(), 1);
                assert_eq!(udt.fields()[0].name, "street");
                assert_eq!(udt.fields()[0].data_type.scalar_kind(), Some(ScalarKind::Text));
            }
            other => panic!("expected udt, got {:?}", other),
        }
    }

    #[test]
    fn test_user_type_preserves_field_order() {
        // "z" then "a": declaration order must not be sorted
        let s = format!(
            "{}(6b73,74, 7a:{} , 61:{})",
            m("UserType"),
            m("Int32Type"),
            m("UTF8Type")
        );
        let t = parse_one(&s).unwrap();
        let DataType::UserDefined(udt) = &*t else {
            panic!("expected udt");
        };
        let names: Vec<_> = udt.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a"]);
    }

    #[test]
    fn test_user_type_bad_hex() {
        let odd = format!("{}(657,74,61:{})", m("UserType"), m("UTF8Type"));
        assert!(matches!(parse_one(&odd), Err(Error::Parse(_))));

        let bad = format!("{}(6578,74,zz:{})", m("UserType"), m("UTF8Type"));
        assert!(matches!(parse_one(&bad), Err(Error::Parse(_))));
    }

    #[test]
    fn test_tuple() {
        let s = format!("{}({},{},{})", m("TupleType"), m("Int32Type"), m("UTF8Type"), m("BooleanType"));
        let t = parse_one(&s).unwrap();
        let DataType::Tuple(tuple) = &*t else {
            panic!("expected tuple");
        };
        assert_eq!(tuple.element_types().len(), 3);
        assert_eq!(tuple.element_types()[2].scalar_kind(), Some(ScalarKind::Boolean));
    }

    #[test]
    fn test_missing_close_paren() {
        let s = format!("{}({}", m("ListType"), m("UTF8Type"));
        assert!(matches!(parse_one(&s), Err(Error::Parse(_))));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let s = format!("{}({}) x", m("ListType"), m("UTF8Type"));
        assert!(matches!(parse_one(&s), Err(Error::Parse(_))));
    }

    #[test]
    fn test_depth_limit() {
        let mut s = m("UTF8Type");
        for _ in 0..10 {
            s = format!("{}({})", m("ListType"), s);
        }
        let shallow = TypeParser::with_config(&CodecConfig {
            max_type_depth: 5,
            ..CodecConfig::default()
        });
        assert_eq!(shallow.parse_one(&s).unwrap_err(), Error::TypeTooDeep { max_depth: 5 });
        assert_eq!(TypeParser::new().parse_one(&s).unwrap().depth(), 11);
    }

    #[test]
    fn test_single_key_descriptor() {
        let result = parse_with_composite(&format!("{}({})", m("ReversedType"), m("LongType"))).unwrap();
        assert!(!result.is_composite());
        assert_eq!(result.components().len(), 1);
        assert!(result.components()[0].reversed);
        assert_eq!(result.components()[0].data_type.scalar_kind(), Some(ScalarKind::BigInt));
    }

    #[test]
    fn test_composite_with_collections() {
        let s = format!(
            "{}({},{}({}),{}(74616773:{}({})))",
            m("CompositeType"),
            m("Int32Type"),
            m("ReversedType"),
            m("TimestampType"),
            m("ColumnToCollectionType"),
            m("SetType"),
            m("UTF8Type")
        );
        let result = parse_with_composite(&s).unwrap();
        assert!(result.is_composite());
        assert_eq!(result.components().len(), 2);
        assert!(!result.components()[0].reversed);
        assert!(result.components()[1].reversed);
        assert_eq!(
            result.components()[1].data_type.scalar_kind(),
            Some(ScalarKind::Timestamp)
        );
        let tags = result.collection("tags").unwrap();
        assert!(tags.equals(&DataType::set(DataType::scalar(ScalarKind::Text), false)).unwrap());
    }

    #[test]
    fn test_empty_composite_rejected() {
        assert!(matches!(
            parse_with_composite(&format!("{}()", m("CompositeType"))),
            Err(Error::Parse(_))
        ));
    }
}
