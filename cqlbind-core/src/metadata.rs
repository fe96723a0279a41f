//! Column definitions of prepared statements and result sets

use crate::types::{DataType, NameIndex};
use std::sync::Arc;

/// A single column of a prepared statement or result set
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub keyspace: String,
    pub table: String,
    pub name: String,
    pub data_type: Arc<DataType>,
}

impl ColumnDefinition {
    pub fn new(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        data_type: Arc<DataType>,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered column definitions with a name index
#[derive(Debug, Clone, Default)]
pub struct ResultMetadata {
    columns: Vec<ColumnDefinition>,
    index: NameIndex,
}

impl ResultMetadata {
    pub fn new(columns: Vec<ColumnDefinition>) -> Self {
        let index = NameIndex::from_names(columns.iter().map(|c| c.name.as_str()));
        Self { columns, index }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDefinition> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Positions of every column named `name`
    pub fn indices_of(&self, name: &str) -> &[usize] {
        self.index.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarKind;

    #[test]
    fn test_indices_of() {
        let int = DataType::scalar(ScalarKind::Int);
        let metadata = ResultMetadata::new(vec![
            ColumnDefinition::new("ks", "t", "id", Arc::clone(&int)),
            ColumnDefinition::new("ks", "t", "v", Arc::clone(&int)),
            ColumnDefinition::new("ks", "t", "id", int),
        ]);
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata.indices_of("id"), &[0, 2]);
        assert!(metadata.indices_of("missing").is_empty());
        assert_eq!(metadata.column(1).map(|c| c.name.as_str()), Some("v"));
    }
}
