use crate::{
    error::Result,
    sql::{engine::Catalog, schema::Schema},
    storage::{Table, TableRef, TableStore},
};

/// The in-memory store is the catalog queries run against
impl Catalog for TableStore {
    fn get_schema(&self, table_ref: &TableRef) -> Result<Schema> {
        TableStore::get_schema(self, table_ref)
    }

    fn scan_table(&self, table_ref: &TableRef) -> Result<Table> {
        self.get_table(table_ref)
    }
}
