//! Type model for CQL schema types
//!
//! Resolved types form a tree of [`DataType`] nodes shared through `Arc`.
//! A tree is assembled once (by the type parser or by hand), then treated as
//! immutable and read concurrently by every statement bound against it.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Default nesting limit for structural comparison
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Levels rendered by `Display` before the rest of a type is elided
const DISPLAY_MAX_DEPTH: usize = 128;

/// Primitive value kinds of the native protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Text,
    Timestamp,
    Uuid,
    Varchar,
    TimeUuid,
    Inet,
    Unknown,
}

impl ScalarKind {
    /// Protocol `[option]` id for this kind
    pub fn option_id(self) -> u16 {
        match self {
            ScalarKind::Ascii => 0x0001,
            ScalarKind::BigInt => 0x0002,
            ScalarKind::Blob => 0x0003,
            ScalarKind::Boolean => 0x0004,
            ScalarKind::Counter => 0x0005,
            ScalarKind::Decimal => 0x0006,
            ScalarKind::Double => 0x0007,
            ScalarKind::Float => 0x0008,
            ScalarKind::Int => 0x0009,
            ScalarKind::Text => 0x000A,
            ScalarKind::Timestamp => 0x000B,
            ScalarKind::Uuid => 0x000C,
            ScalarKind::Varchar => 0x000D,
            ScalarKind::TimeUuid => 0x000F,
            ScalarKind::Inet => 0x0010,
            ScalarKind::Unknown => 0xFFFF,
        }
    }

    /// Fixed payload width, if the kind has one
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            ScalarKind::Boolean => Some(1),
            ScalarKind::Int | ScalarKind::Float => Some(4),
            ScalarKind::BigInt
            | ScalarKind::Counter
            | ScalarKind::Double
            | ScalarKind::Timestamp => Some(8),
            ScalarKind::Uuid | ScalarKind::TimeUuid => Some(16),
            _ => None,
        }
    }

    /// CQL name of the kind
    pub fn cql_name(self) -> &'static str {
        match self {
            ScalarKind::Ascii => "ascii",
            ScalarKind::BigInt => "bigint",
            ScalarKind::Blob => "blob",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Counter => "counter",
            ScalarKind::Decimal => "decimal",
            ScalarKind::Double => "double",
            ScalarKind::Float => "float",
            ScalarKind::Int => "int",
            ScalarKind::Text => "text",
            ScalarKind::Timestamp => "timestamp",
            ScalarKind::Uuid => "uuid",
            ScalarKind::Varchar => "varchar",
            ScalarKind::TimeUuid => "timeuuid",
            ScalarKind::Inet => "inet",
            ScalarKind::Unknown => "unknown",
        }
    }
}

/// Collection flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    List,
    Set,
    Map,
}

impl CollectionKind {
    /// Number of element types a collection of this kind carries
    pub fn arity(self) -> usize {
        match self {
            CollectionKind::List | CollectionKind::Set => 1,
            CollectionKind::Map => 2,
        }
    }

    /// Protocol `[option]` id
    pub fn option_id(self) -> u16 {
        match self {
            CollectionKind::List => 0x0020,
            CollectionKind::Map => 0x0021,
            CollectionKind::Set => 0x0022,
        }
    }

    fn cql_name(self) -> &'static str {
        match self {
            CollectionKind::List => "list",
            CollectionKind::Set => "set",
            CollectionKind::Map => "map",
        }
    }
}

/// A resolved schema type
#[derive(Debug, Clone)]
pub enum DataType {
    Scalar(ScalarKind),
    Collection(CollectionType),
    UserDefined(Arc<UserType>),
    Tuple(Arc<TupleType>),
    Custom(String),
}

impl DataType {
    /// Shorthand for a shared scalar type
    pub fn scalar(kind: ScalarKind) -> Arc<DataType> {
        Arc::new(DataType::Scalar(kind))
    }

    /// Shared list type
    pub fn list(element: Arc<DataType>, frozen: bool) -> Arc<DataType> {
        Arc::new(DataType::Collection(CollectionType::list(element, frozen)))
    }

    /// Shared set type
    pub fn set(element: Arc<DataType>, frozen: bool) -> Arc<DataType> {
        Arc::new(DataType::Collection(CollectionType::set(element, frozen)))
    }

    /// Shared map type
    pub fn map(key: Arc<DataType>, value: Arc<DataType>, frozen: bool) -> Arc<DataType> {
        Arc::new(DataType::Collection(CollectionType::map(key, value, frozen)))
    }

    /// Shared custom type
    pub fn custom(class_name: impl Into<String>) -> Arc<DataType> {
        Arc::new(DataType::Custom(class_name.into()))
    }

    /// Protocol `[option]` id of the outermost type
    pub fn option_id(&self) -> u16 {
        match self {
            DataType::Scalar(kind) => kind.option_id(),
            DataType::Collection(c) => c.kind().option_id(),
            DataType::UserDefined(_) => 0x0030,
            DataType::Tuple(_) => 0x0031,
            DataType::Custom(_) => 0x0000,
        }
    }

    /// The scalar kind, if this is a scalar
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            DataType::Scalar(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, DataType::Collection(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, DataType::Collection(c) if c.kind() == CollectionKind::Map)
    }

    pub fn is_user_type(&self) -> bool {
        matches!(self, DataType::UserDefined(_))
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, DataType::Tuple(_))
    }

    /// Whether the type is marked frozen at the schema level
    pub fn is_frozen(&self) -> bool {
        match self {
            DataType::Collection(c) => c.is_frozen(),
            DataType::UserDefined(u) => u.is_frozen(),
            _ => false,
        }
    }

    /// Structural equality with the default depth limit
    ///
    /// Frozen flags are ignored. Comparing trees nested deeper than
    /// [`DEFAULT_MAX_DEPTH`] fails with [`Error::TypeTooDeep`].
    pub fn equals(&self, other: &DataType) -> Result<bool> {
        self.equals_with_limit(other, DEFAULT_MAX_DEPTH)
    }

    /// Structural equality with an explicit depth limit
    pub fn equals_with_limit(&self, other: &DataType, max_depth: usize) -> Result<bool> {
        equals_at(self, other, 0, max_depth)
    }

    /// Depth of the type tree (a scalar has depth 1)
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1usize)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(node.children().map(|c| (&**c, level + 1)));
        }
        deepest
    }

    /// Nesting limit for checking values against this type
    ///
    /// The type's own depth, never less than [`DEFAULT_MAX_DEPTH`], so any
    /// type that could be resolved can also be bound.
    pub fn comparison_depth(&self) -> usize {
        self.depth().max(DEFAULT_MAX_DEPTH)
    }

    fn children(&self) -> Box<dyn Iterator<Item = &Arc<DataType>> + '_> {
        match self {
            DataType::Collection(c) => Box::new(c.element_types().iter()),
            DataType::UserDefined(u) => Box::new(u.fields().iter().map(|f| &f.data_type)),
            DataType::Tuple(t) => Box::new(t.element_types().iter()),
            DataType::Scalar(_) | DataType::Custom(_) => Box::new(std::iter::empty()),
        }
    }
}

fn equals_at(a: &DataType, b: &DataType, depth: usize, max_depth: usize) -> Result<bool> {
    if depth >= max_depth {
        return Err(Error::TypeTooDeep { max_depth });
    }

    match (a, b) {
        (DataType::Scalar(x), DataType::Scalar(y)) => Ok(x == y),
        (DataType::Custom(x), DataType::Custom(y)) => Ok(x == y),
        (DataType::Collection(x), DataType::Collection(y)) => {
            if x.kind() != y.kind() {
                return Ok(false);
            }
            all_equal(x.element_types(), y.element_types(), depth, max_depth)
        }
        (DataType::Tuple(x), DataType::Tuple(y)) => {
            all_equal(x.element_types(), y.element_types(), depth, max_depth)
        }
        (DataType::UserDefined(x), DataType::UserDefined(y)) => {
            if x.fields().len() != y.fields().len() {
                return Ok(false);
            }
            for (fx, fy) in x.fields().iter().zip(y.fields()) {
                if fx.name != fy.name {
                    return Ok(false);
                }
                if !equals_at(&fx.data_type, &fy.data_type, depth + 1, max_depth)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn all_equal(
    xs: &[Arc<DataType>],
    ys: &[Arc<DataType>],
    depth: usize,
    max_depth: usize,
) -> Result<bool> {
    if xs.len() != ys.len() {
        return Ok(false);
    }
    for (x, y) in xs.iter().zip(ys) {
        if !equals_at(x, y, depth + 1, max_depth)? {
            return Ok(false);
        }
    }
    Ok(true)
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        matches!(self.equals(other), Ok(true))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, self, 0)
    }
}

fn write_type(f: &mut fmt::Formatter<'_>, data_type: &DataType, level: usize) -> fmt::Result {
    if level >= DISPLAY_MAX_DEPTH {
        return write!(f, "...");
    }

    match data_type {
        DataType::Scalar(kind) => write!(f, "{}", kind.cql_name()),
        DataType::Collection(c) => {
            if c.is_frozen() {
                write!(f, "frozen<")?;
            }
            write!(f, "{}<", c.kind().cql_name())?;
            write_list(f, c.element_types(), level)?;
            write!(f, ">")?;
            if c.is_frozen() {
                write!(f, ">")?;
            }
            Ok(())
        }
        DataType::UserDefined(u) => write!(f, "{}.{}", u.keyspace(), u.type_name()),
        DataType::Tuple(t) => {
            write!(f, "tuple<")?;
            write_list(f, t.element_types(), level)?;
            write!(f, ">")
        }
        DataType::Custom(class_name) => write!(f, "'{}'", class_name),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, types: &[Arc<DataType>], level: usize) -> fmt::Result {
    for (i, t) in types.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_type(f, t, level + 1)?;
    }
    Ok(())
}

/// List, set or map type
#[derive(Debug, Clone)]
pub struct CollectionType {
    kind: CollectionKind,
    element_types: Vec<Arc<DataType>>,
    frozen: bool,
}

impl CollectionType {
    pub fn list(element: Arc<DataType>, frozen: bool) -> Self {
        Self {
            kind: CollectionKind::List,
            element_types: vec![element],
            frozen,
        }
    }

    pub fn set(element: Arc<DataType>, frozen: bool) -> Self {
        Self {
            kind: CollectionKind::Set,
            element_types: vec![element],
            frozen,
        }
    }

    pub fn map(key: Arc<DataType>, value: Arc<DataType>, frozen: bool) -> Self {
        Self {
            kind: CollectionKind::Map,
            element_types: vec![key, value],
            frozen,
        }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// One element type for list/set, key and value for map
    pub fn element_types(&self) -> &[Arc<DataType>] {
        &self.element_types
    }

    /// Type of the item at `position` in the flat item sequence
    ///
    /// Map items alternate key, value.
    pub fn item_type(&self, position: usize) -> &Arc<DataType> {
        &self.element_types[position % self.element_types.len()]
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// Ordered name → positions index
///
/// Names may repeat; a lookup returns every matching position, first
/// declared first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameIndex {
    entries: BTreeMap<String, Vec<usize>>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from names in declaration order
    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index = Self::new();
        for (position, name) in names.into_iter().enumerate() {
            index.insert(name, position);
        }
        index
    }

    pub fn insert(&mut self, name: &str, position: usize) {
        self.entries.entry(name.to_string()).or_default().push(position);
    }

    /// All positions carrying `name`, in declaration order
    pub fn get(&self, name: &str) -> &[usize] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Field of a user-defined type
#[derive(Debug, Clone)]
pub struct UserTypeField {
    pub name: String,
    pub data_type: Arc<DataType>,
}

impl UserTypeField {
    pub fn new(name: impl Into<String>, data_type: Arc<DataType>) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// User-defined type definition
#[derive(Debug, Clone)]
pub struct UserType {
    keyspace: String,
    type_name: String,
    fields: Vec<UserTypeField>,
    index: NameIndex,
    frozen: bool,
}

impl UserType {
    pub fn new(
        keyspace: impl Into<String>,
        type_name: impl Into<String>,
        fields: Vec<UserTypeField>,
    ) -> Self {
        let index = NameIndex::from_names(fields.iter().map(|f| f.name.as_str()));
        Self {
            keyspace: keyspace.into(),
            type_name: type_name.into(),
            fields,
            index,
            frozen: false,
        }
    }

    /// Mark the type frozen
    pub fn frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Fields in wire order
    pub fn fields(&self) -> &[UserTypeField] {
        &self.fields
    }

    /// Indices of every field named `name`
    pub fn field_indices(&self, name: &str) -> &[usize] {
        self.index.get(name)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Wrap into a shared [`DataType`]
    pub fn into_data_type(self) -> Arc<DataType> {
        Arc::new(DataType::UserDefined(Arc::new(self)))
    }
}

/// Tuple type definition
#[derive(Debug, Clone)]
pub struct TupleType {
    element_types: Vec<Arc<DataType>>,
}

impl TupleType {
    pub fn new(element_types: Vec<Arc<DataType>>) -> Self {
        Self { element_types }
    }

    pub fn element_types(&self) -> &[Arc<DataType>] {
        &self.element_types
    }

    pub fn into_data_type(self) -> Arc<DataType> {
        Arc::new(DataType::Tuple(Arc::new(self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text() -> Arc<DataType> {
        DataType::scalar(ScalarKind::Text)
    }

    fn int() -> Arc<DataType> {
        DataType::scalar(ScalarKind::Int)
    }

    #[test]
    fn test_scalar_equality() {
        assert_eq!(*text(), *text());
        assert_ne!(*text(), *int());
        assert_ne!(
            DataType::Scalar(ScalarKind::Text),
            DataType::Scalar(ScalarKind::Varchar)
        );
    }

    #[test]
    fn test_collection_equality_ignores_frozen() {
        let a = DataType::list(text(), true);
        let b = DataType::list(text(), false);
        assert!(a.equals(&b).unwrap());
        assert!(a.is_frozen());
        assert!(!b.is_frozen());
    }

    #[test]
    fn test_collection_kinds_differ() {
        let list = DataType::list(text(), false);
        let set = DataType::set(text(), false);
        assert!(!list.equals(&set).unwrap());
        assert!(set.is_collection());
        assert!(!set.is_map());
        assert!(DataType::map(text(), int(), false).is_map());
    }

    #[test]
    fn test_nested_equality_returns_true() {
        let build = || DataType::list(DataType::set(DataType::map(text(), int(), false), false), false);
        assert!(build().equals(&build()).unwrap());

        let other = DataType::list(DataType::set(DataType::map(text(), text(), false), false), false);
        assert!(!build().equals(&other).unwrap());
    }

    #[test]
    fn test_cross_variant_is_false() {
        let tuple = TupleType::new(vec![text()]).into_data_type();
        let list = DataType::list(text(), false);
        assert!(!tuple.equals(&list).unwrap());
        assert!(!DataType::custom("x").equals(&text()).unwrap());
    }

    #[test]
    fn test_user_type_equality_compares_field_names() {
        let a = UserType::new("ks", "addr", vec![UserTypeField::new("street", text())]).into_data_type();
        let b = UserType::new("ks", "addr", vec![UserTypeField::new("city", text())]).into_data_type();
        let c = UserType::new("ks", "addr", vec![UserTypeField::new("street", text())])
            .frozen(true)
            .into_data_type();
        assert!(!a.equals(&b).unwrap());
        assert!(a.equals(&c).unwrap());
    }

    #[test]
    fn test_name_index_duplicates() {
        let udt = UserType::new(
            "ks",
            "dup",
            vec![
                UserTypeField::new("a", text()),
                UserTypeField::new("b", int()),
                UserTypeField::new("a", text()),
            ],
        );
        assert_eq!(udt.field_indices("a"), &[0, 2]);
        assert_eq!(udt.field_indices("b"), &[1]);
        assert!(udt.field_indices("zzz").is_empty());
    }

    #[test]
    fn test_type_too_deep() {
        let mut t = text();
        for _ in 0..10 {
            t = DataType::list(t, false);
        }
        assert_eq!(t.depth(), 11);
        assert_eq!(
            t.equals_with_limit(&t, 5),
            Err(Error::TypeTooDeep { max_depth: 5 })
        );
        assert!(t.equals_with_limit(&t, 11).unwrap());
    }

    #[test]
    fn test_option_ids_and_display() {
        assert_eq!(DataType::Scalar(ScalarKind::Int).option_id(), 0x0009);
        assert_eq!(DataType::map(text(), int(), false).option_id(), 0x0021);
        assert_eq!(DataType::map(text(), int(), true).to_string(), "frozen<map<text, int>>");
        assert_eq!(ScalarKind::BigInt.fixed_size(), Some(8));
        assert_eq!(ScalarKind::Blob.fixed_size(), None);
    }

    #[test]
    fn test_depth_and_display_of_very_deep_type() {
        let levels = 100_000;
        let mut t = int();
        for _ in 0..levels {
            t = DataType::list(t, false);
        }
        assert_eq!(t.depth(), levels + 1);
        assert_eq!(t.comparison_depth(), levels + 1);

        let rendered = t.to_string();
        assert!(rendered.starts_with("list<list<"));
        assert!(rendered.contains("..."));
        assert_eq!(rendered.matches("list<").count(), DISPLAY_MAX_DEPTH);

        // Tear down iteratively; dropping the chain recursively would overflow.
        while let Ok(DataType::Collection(c)) = Arc::try_unwrap(t) {
            t = Arc::clone(&c.element_types()[0]);
        }
    }

    #[test]
    fn test_comparison_depth_floor() {
        assert_eq!(int().comparison_depth(), DEFAULT_MAX_DEPTH);
    }
}
