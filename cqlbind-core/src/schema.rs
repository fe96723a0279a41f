//! Resolved schema snapshots
//!
//! A refresh parses every marshal class string of the incoming metadata into
//! a new [`Schema`], then publishes it in one step. Readers take an
//! `Arc<Schema>` snapshot and never observe a half-built schema. If any
//! type fails to resolve, the refresh is rejected and the previously
//! published snapshot stays in place.

use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::parser::{ParseResult, TypeParser};
use crate::types::{DataType, UserType, UserTypeField};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A user type as reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTypeDefinition {
    pub keyspace: String,
    pub type_name: String,
    pub field_names: Vec<String>,
    /// Marshal class name of each field, parallel to `field_names`
    pub field_types: Vec<String>,
}

/// Key descriptors of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub keyspace: String,
    pub table: String,
    pub key_validator: String,
    pub comparator: String,
}

/// A regular column and its validator class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinitionRow {
    pub keyspace: String,
    pub table: String,
    pub column: String,
    pub validator: String,
}

/// Everything delivered by one metadata refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaRefresh {
    pub user_types: Vec<UserTypeDefinition>,
    pub tables: Vec<TableDefinition>,
    pub columns: Vec<ColumnDefinitionRow>,
}

/// Resolved table metadata
#[derive(Debug, Clone)]
pub struct TableSchema {
    keyspace: String,
    name: String,
    partition_key: ParseResult,
    clustering_key: ParseResult,
    columns: HashMap<String, Arc<DataType>>,
}

impl TableSchema {
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved key validator
    pub fn partition_key(&self) -> &ParseResult {
        &self.partition_key
    }

    /// Resolved comparator
    pub fn clustering_key(&self) -> &ParseResult {
        &self.clustering_key
    }

    /// Type of a column, falling back to the comparator's collection table
    pub fn column_type(&self, column: &str) -> Option<&Arc<DataType>> {
        self.columns
            .get(column)
            .or_else(|| self.clustering_key.collection(column))
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Immutable snapshot of every resolved user type and table
#[derive(Debug, Default)]
pub struct Schema {
    user_types: HashMap<String, HashMap<String, Arc<DataType>>>,
    tables: HashMap<String, HashMap<String, Arc<TableSchema>>>,
}

impl Schema {
    pub fn user_type(&self, keyspace: &str, name: &str) -> Option<&Arc<DataType>> {
        self.user_types.get(keyspace)?.get(name)
    }

    pub fn table(&self, keyspace: &str, name: &str) -> Option<&Arc<TableSchema>> {
        self.tables.get(keyspace)?.get(name)
    }

    pub fn column_type(&self, keyspace: &str, table: &str, column: &str) -> Option<&Arc<DataType>> {
        self.table(keyspace, table)?.column_type(column)
    }

    pub fn user_type_count(&self) -> usize {
        self.user_types.values().map(HashMap::len).sum()
    }

    pub fn table_count(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }
}

/// Holder of the currently published schema
#[derive(Debug)]
pub struct SchemaRegistry {
    parser: TypeParser,
    current: RwLock<Arc<Schema>>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::with_parser(TypeParser::new())
    }
}

impl SchemaRegistry {
    /// Empty registry resolving types with the limits in `config`
    ///
    /// Fails with [`Error::Configuration`] if `config` does not validate.
    pub fn new(config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_parser(TypeParser::with_config(config)))
    }

    fn with_parser(parser: TypeParser) -> Self {
        Self {
            parser,
            current: RwLock::new(Arc::new(Schema::default())),
        }
    }

    /// The currently published schema
    pub fn snapshot(&self) -> Arc<Schema> {
        Arc::clone(&self.current.read())
    }

    pub fn user_type(&self, keyspace: &str, name: &str) -> Option<Arc<DataType>> {
        self.snapshot().user_type(keyspace, name).cloned()
    }

    pub fn table(&self, keyspace: &str, name: &str) -> Option<Arc<TableSchema>> {
        self.snapshot().table(keyspace, name).cloned()
    }

    pub fn column_type(&self, keyspace: &str, table: &str, column: &str) -> Option<Arc<DataType>> {
        self.snapshot().column_type(keyspace, table, column).cloned()
    }

    /// Resolve `refresh` and publish it as the new schema
    ///
    /// On failure nothing is published and [`Error::Schema`] names the
    /// offending element.
    pub fn refresh(&self, refresh: &SchemaRefresh) -> Result<Arc<Schema>> {
        let schema = match self.build(refresh) {
            Ok(schema) => Arc::new(schema),
            Err(e) => {
                log::warn!("schema refresh rejected: {}", e);
                return Err(e);
            }
        };

        *self.current.write() = Arc::clone(&schema);
        log::debug!(
            "published schema with {} user types and {} tables",
            schema.user_type_count(),
            schema.table_count()
        );
        Ok(schema)
    }

    fn build(&self, refresh: &SchemaRefresh) -> Result<Schema> {
        let mut schema = Schema::default();

        for def in &refresh.user_types {
            if def.field_names.len() != def.field_types.len() {
                return Err(Error::schema(format!(
                    "user type {}.{}: {} field names but {} field types",
                    def.keyspace,
                    def.type_name,
                    def.field_names.len(),
                    def.field_types.len()
                )));
            }
            let data_type = self.resolve_user_type(def).map_err(|e| {
                Error::schema(format!("user type {}.{}: {}", def.keyspace, def.type_name, e))
            })?;
            schema
                .user_types
                .entry(def.keyspace.clone())
                .or_default()
                .insert(def.type_name.clone(), data_type);
        }

        let mut tables: HashMap<(String, String), TableSchema> = HashMap::new();
        for def in &refresh.tables {
            let resolve = |class_name: &str| {
                self.parser.parse_with_composite(class_name).map_err(|e| {
                    Error::schema(format!("table {}.{}: {}", def.keyspace, def.table, e))
                })
            };
            let table = TableSchema {
                keyspace: def.keyspace.clone(),
                name: def.table.clone(),
                partition_key: resolve(def.key_validator.as_str())?,
                clustering_key: resolve(def.comparator.as_str())?,
                columns: HashMap::new(),
            };
            tables.insert((def.keyspace.clone(), def.table.clone()), table);
        }

        for row in &refresh.columns {
            let data_type = self.parser.parse_one(&row.validator).map_err(|e| {
                Error::schema(format!(
                    "column {}.{}.{}: {}",
                    row.keyspace, row.table, row.column, e
                ))
            })?;
            let table = tables
                .get_mut(&(row.keyspace.clone(), row.table.clone()))
                .ok_or_else(|| {
                    Error::schema(format!(
                        "column {}.{}.{} belongs to an unknown table",
                        row.keyspace, row.table, row.column
                    ))
                })?;
            table.columns.insert(row.column.clone(), data_type);
        }

        for ((keyspace, name), table) in tables {
            schema
                .tables
                .entry(keyspace)
                .or_default()
                .insert(name, Arc::new(table));
        }

        Ok(schema)
    }

    fn resolve_user_type(&self, def: &UserTypeDefinition) -> Result<Arc<DataType>> {
        let mut fields = Vec::with_capacity(def.field_names.len());
        for (name, class_name) in def.field_names.iter().zip(&def.field_types) {
            fields.push(UserTypeField::new(
                name.clone(),
                self.parser.parse_one(class_name)?,
            ));
        }
        Ok(UserType::new(def.keyspace.clone(), def.type_name.clone(), fields).into_data_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarKind;

    const P: &str = "org.apache.cassandra.db.marshal.";

    fn m(name: &str) -> String {
        format!("{}{}", P, name)
    }

    fn refresh() -> SchemaRefresh {
        SchemaRefresh {
            user_types: vec![UserTypeDefinition {
                keyspace: "ks".into(),
                type_name: "address".into(),
                field_names: vec!["street".into(), "zip".into()],
                field_types: vec![m("UTF8Type"), m("Int32Type")],
            }],
            tables: vec![TableDefinition {
                keyspace: "ks".into(),
                table: "users".into(),
                key_validator: m("UUIDType"),
                comparator: format!("{}({})", m("CompositeType"), m("UTF8Type")),
            }],
            columns: vec![ColumnDefinitionRow {
                keyspace: "ks".into(),
                table: "users".into(),
                column: "emails".into(),
                validator: format!("{}({})", m("SetType"), m("UTF8Type")),
            }],
        }
    }

    #[test]
    fn test_refresh_publishes() {
        let registry = SchemaRegistry::default();
        registry.refresh(&refresh()).unwrap();

        let udt = registry.user_type("ks", "address").unwrap();
        assert!(udt.is_user_type());
        let table = registry.table("ks", "users").unwrap();
        assert_eq!(
            table.partition_key().components()[0].data_type.scalar_kind(),
            Some(ScalarKind::Uuid)
        );
        assert!(table.clustering_key().is_composite());
        assert!(registry.column_type("ks", "users", "emails").unwrap().is_collection());
        assert!(registry.column_type("ks", "users", "nope").is_none());
    }

    #[test]
    fn test_failed_refresh_keeps_previous_snapshot() {
        let registry = SchemaRegistry::default();
        registry.refresh(&refresh()).unwrap();
        let before = registry.snapshot();

        let mut bad = refresh();
        bad.columns[0].validator = format!("{}({}", m("ListType"), m("UTF8Type"));
        let err = registry.refresh(&bad).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert!(Arc::ptr_eq(&before, &registry.snapshot()));
    }

    #[test]
    fn test_unknown_table_rejected() {
        let registry = SchemaRegistry::default();
        let mut bad = refresh();
        bad.columns[0].table = "ghost".into();
        assert!(registry.refresh(&bad).is_err());
        assert!(registry.table("ks", "users").is_none());
    }

    #[test]
    fn test_mismatched_user_type_fields() {
        let registry = SchemaRegistry::default();
        let mut bad = refresh();
        bad.user_types[0].field_types.pop();
        let err = registry.refresh(&bad).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema error: user type ks.address: 2 field names but 1 field types"
        );
    }

    #[test]
    fn test_concurrent_readers() {
        let registry = Arc::new(SchemaRegistry::default());
        registry.refresh(&refresh()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert!(registry.user_type("ks", "address").is_some());
                    }
                })
            })
            .collect();
        for _ in 0..10 {
            registry.refresh(&refresh()).unwrap();
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_registry_rejects_invalid_config() {
        let config = CodecConfig {
            max_type_depth: 0,
            ..CodecConfig::default()
        };
        assert!(matches!(SchemaRegistry::new(&config), Err(Error::Configuration(_))));

        let registry = SchemaRegistry::new(&CodecConfig::for_protocol(3)).unwrap();
        registry.refresh(&refresh()).unwrap();
        assert_eq!(registry.snapshot().table_count(), 1);
    }
}
