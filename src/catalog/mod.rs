//! Database catalog.

use std::any::Any;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::datatypes::DataType;
use crate::error::OptimizerError;

pub mod mutable;

pub type CatalogRef = Arc<dyn Catalog>;
pub type TableRef = Arc<Table>;
pub type IndexRef = Arc<Index>;
pub type ColumnRef = Arc<Column>;

/// Provides access to database objects used by the optimizer.
pub trait Catalog: Debug + Sync + Send {
    /// Returns this catalog as [Any] in order it can be downcast to its implementation.
    fn as_any(&self) -> &dyn Any;

    /// Returns a table with the given name.
    fn get_table(&self, name: &str) -> Option<TableRef>;

    /// Returns an index with the given name.
    fn get_index(&self, name: &str) -> Option<IndexRef>;

    /// Returns all indexes of the given table.
    fn get_indexes(&self, table: &str) -> Vec<IndexRef>;
}

/// Represents a database table.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<ColumnRef>,
}

impl Table {
    /// The name of this table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The columns of this table.
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    /// Returns a column with the given name.
    pub fn get_column(&self, name: &str) -> Option<ColumnRef> {
        self.columns.iter().find(|c| c.name == name).cloned()
    }
}

/// A builder to create instances of a [table].
///
/// [table]: crate::catalog::Table
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnRef>,
}

impl TableBuilder {
    /// Creates a builder for a table with the given name.
    pub fn new(name: &str) -> Self {
        TableBuilder {
            name: name.to_string(),
            columns: Vec::new(),
        }
    }

    /// Adds a column with the given name and data type to this table.
    pub fn add_column(mut self, name: &str, data_type: DataType) -> TableBuilder {
        let column = Column::new(name.to_string(), Some(self.name.clone()), data_type);
        self.columns.push(Arc::new(column));
        self
    }

    /// Creates an instance of a [table] with previously specified properties.
    ///
    /// [table]: crate::catalog::Table
    pub fn build(self) -> Result<Table, OptimizerError> {
        let mut names = HashSet::new();

        for col in self.columns.iter() {
            let col_name = col.name();
            if !names.insert(col_name) {
                let message = format!("Table: column already exists. Column: {} table: {}", col_name, self.name);
                return Err(OptimizerError::argument(message));
            }
        }

        Ok(Table {
            name: self.name,
            columns: self.columns,
        })
    }
}

/// Represents a database index.
#[derive(Debug, Clone)]
pub struct Index {
    name: String,
    table: String,
    columns: Vec<ColumnRef>,
    primary: bool,
}

impl Index {
    /// The name of this index.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the table this index is defined for.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the key columns of this index in key order.
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    /// Returns `true` if this is the primary index of its table.
    pub fn is_primary(&self) -> bool {
        self.primary
    }
}

/// A builder to create instances of an [Index].
///
/// [Index]: crate::catalog::Index
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    name: String,
    table: TableRef,
    columns: Vec<String>,
    primary: bool,
}

impl IndexBuilder {
    /// Creates a builder for an index with the given name.
    pub fn new(table: TableRef, name: &str) -> Self {
        IndexBuilder {
            name: name.to_string(),
            table,
            columns: Vec::new(),
            primary: false,
        }
    }

    /// Adds a key column to this index.
    pub fn add_column(mut self, column: &str) -> IndexBuilder {
        self.columns.push(column.into());
        self
    }

    /// Marks this index as the primary index of its table.
    pub fn primary(mut self) -> IndexBuilder {
        self.primary = true;
        self
    }

    /// Creates an instance of an [index] with previously specified properties.
    ///
    /// [index]: crate::catalog::Index
    pub fn build(mut self) -> Result<Index, OptimizerError> {
        if self.columns.is_empty() {
            return Err(OptimizerError::argument("Index: no columns have been specified"));
        }

        let mut columns = Vec::with_capacity(self.columns.len());

        for col_name in std::mem::take(&mut self.columns) {
            let col = match self.table.get_column(col_name.as_str()) {
                Some(col) if columns.contains(&col) => {
                    let message = format!("Index: column has been specified more than once. Column: {}", col_name);
                    return Err(OptimizerError::argument(message));
                }
                Some(col) => col,
                None => {
                    let message =
                        format!("Index: column does not exist. Table: {}, column: {}", &self.table.name, col_name);
                    return Err(OptimizerError::argument(message));
                }
            };

            columns.push(col);
        }

        Ok(Index {
            name: self.name,
            table: self.table.name.clone(),
            columns,
            primary: self.primary,
        })
    }
}

/// A column of a database table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    table: Option<String>,
    data_type: DataType,
}

impl Column {
    fn new(column_name: String, table_name: Option<String>, data_type: DataType) -> Self {
        Column {
            name: column_name,
            table: table_name,
            data_type,
        }
    }

    /// The name of this column.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the table this column belongs to.
    /// If table is not specified then this column is derived from some expression.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// The data type of this column.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

#[cfg(test)]
mod test {
    use crate::catalog::{IndexBuilder, TableBuilder};
    use crate::datatypes::DataType;
    use crate::error::OptimizerError;
    use std::fmt::Debug;
    use std::sync::Arc;

    #[test]
    fn test_table() -> Result<(), OptimizerError> {
        let table = TableBuilder::new("A")
            .add_column("a1", DataType::Int32)
            .add_column("a2", DataType::String)
            .build()?;

        assert_eq!(table.name(), "A", "name");
        assert_eq!(table.columns().len(), 2, "num columns");

        assert_eq!(table.columns()[0].name(), "a1", "column a1 name");
        assert_eq!(table.columns()[0].table(), Some("A"), "column a1 table");
        assert_eq!(table.columns()[0].data_type(), &DataType::Int32, "column a1 data type");

        Ok(())
    }

    #[test]
    fn test_table_adding_multiple_columns_with_the_same_name_is_not_allowed() {
        let res = TableBuilder::new("A")
            .add_column("a1", DataType::Int32)
            .add_column("a2", DataType::String)
            .add_column("a1", DataType::Bool)
            .build();

        expect_error(res, "Table: column already exists")
    }

    #[test]
    fn test_index() -> Result<(), OptimizerError> {
        let table = TableBuilder::new("A")
            .add_column("a1", DataType::Int32)
            .add_column("a2", DataType::String)
            .build()?;
        let table = Arc::new(table);
        let index = IndexBuilder::new(table.clone(), "A_a1_index").add_column("a1").build()?;

        assert_eq!(index.name(), "A_a1_index", "index name");
        assert_eq!(index.table(), "A", "table name");
        assert_eq!(index.columns().len(), 1, "columns num");
        assert!(!index.is_primary(), "not primary");

        let primary = IndexBuilder::new(table, "A_pk").add_column("a1").primary().build()?;
        assert!(primary.is_primary(), "primary");

        Ok(())
    }

    #[test]
    fn test_index_reject_index_that_uses_column_multiple_times() -> Result<(), OptimizerError> {
        let table = TableBuilder::new("A")
            .add_column("a1", DataType::Int32)
            .add_column("a2", DataType::String)
            .build()?;

        let res = IndexBuilder::new(Arc::new(table), "A_a1_index").add_column("a1").add_column("a1").build();

        expect_error(res, "Index: column has been specified more than once");

        Ok(())
    }

    #[test]
    fn test_index_reject_index_that_uses_unknown_column() -> Result<(), OptimizerError> {
        let table = TableBuilder::new("A")
            .add_column("a1", DataType::Int32)
            .add_column("a2", DataType::String)
            .build()?;

        let res = IndexBuilder::new(Arc::new(table), "A_a1_index").add_column("a1").add_column("a4").build();

        expect_error(res, "Index: column does not exist");

        Ok(())
    }

    #[test]
    fn test_index_reject_index_without_columns() -> Result<(), OptimizerError> {
        let table = TableBuilder::new("A").add_column("a1", DataType::Int32).build()?;

        let res = IndexBuilder::new(Arc::new(table), "A_a1_idx").build();

        expect_error(res, "Index: no columns have been specified");

        Ok(())
    }

    fn expect_error<T>(result: Result<T, OptimizerError>, message: &str)
    where
        T: Debug,
    {
        match result {
            Ok(r) => panic!("Unexpected result: {:?}", r),
            Err(OptimizerError::Argument(err)) => {
                assert!(err.message().contains(message), "Unexpected error: {}. Expected: {}", err.message(), message);
            }
            Err(err) => panic!("Unexpected error: {}. Expected: {}", err, message),
        }
    }
}
