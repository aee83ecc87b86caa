use crate::error::StoreError;
use crate::models::{Cell, Row};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A spreadsheet-like store of named tables, each a header row followed by
/// data rows. Every method is a single store operation.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Header of the table, `None` if the table does not exist.
    async fn read_header(&self, table: &str) -> Result<Option<Vec<String>>, StoreError>;

    async fn create_table(&self, table: &str, header: &[String]) -> Result<(), StoreError>;

    /// Wipes the table, header included, and writes `header` as its only row.
    async fn reset_table(&self, table: &str, header: &[String]) -> Result<(), StoreError>;

    /// Removes every data row, keeping the header.
    async fn clear_rows(&self, table: &str) -> Result<(), StoreError>;

    async fn append_rows(&self, table: &str, rows: &[Row]) -> Result<(), StoreError>;

    /// Swaps all data rows for `rows` in one operation.
    async fn replace_rows(&self, table: &str, rows: &[Row]) -> Result<(), StoreError>;

    async fn read_rows(&self, table: &str) -> Result<Vec<Row>, StoreError>;
}

fn header_row(header: &[String]) -> Row {
    header.iter().map(|h| Cell::text(h.as_str())).collect()
}

fn row_to_header(row: &Row) -> Vec<String> {
    row.iter().map(|c| c.to_string()).collect()
}

/// Process-local store. Each table's first row is its header.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later mutating call fail without touching the data.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Seeds a table verbatim, header row first.
    pub fn insert_raw(&self, table: &str, rows: Vec<Row>) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.insert(table.to_string(), rows);
        }
    }

    pub fn raw(&self, table: &str) -> Option<Vec<Row>> {
        self.tables.lock().ok()?.get(table).cloned()
    }

    fn check_writable(&self, table: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected {
                table: table.to_string(),
                reason: "store unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn with_tables<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Vec<Row>>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Rejected {
            table: String::new(),
            reason: "store lock poisoned".to_string(),
        })?;
        f(&mut tables)
    }
}

#[async_trait]
impl DestinationStore for InMemoryStore {
    async fn read_header(&self, table: &str) -> Result<Option<Vec<String>>, StoreError> {
        self.with_tables(|tables| {
            Ok(tables
                .get(table)
                .map(|rows| rows.first().map(row_to_header).unwrap_or_default()))
        })
    }

    async fn create_table(&self, table: &str, header: &[String]) -> Result<(), StoreError> {
        self.check_writable(table)?;
        self.with_tables(|tables| {
            tables.insert(table.to_string(), vec![header_row(header)]);
            Ok(())
        })
    }

    async fn reset_table(&self, table: &str, header: &[String]) -> Result<(), StoreError> {
        self.check_writable(table)?;
        self.with_tables(|tables| {
            tables.insert(table.to_string(), vec![header_row(header)]);
            Ok(())
        })
    }

    async fn clear_rows(&self, table: &str) -> Result<(), StoreError> {
        self.check_writable(table)?;
        self.with_tables(|tables| {
            let rows = tables
                .get_mut(table)
                .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
            rows.truncate(1);
            Ok(())
        })
    }

    async fn append_rows(&self, table: &str, new_rows: &[Row]) -> Result<(), StoreError> {
        self.check_writable(table)?;
        self.with_tables(|tables| {
            let rows = tables
                .get_mut(table)
                .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
            rows.extend_from_slice(new_rows);
            Ok(())
        })
    }

    async fn replace_rows(&self, table: &str, new_rows: &[Row]) -> Result<(), StoreError> {
        self.check_writable(table)?;
        self.with_tables(|tables| {
            let rows = tables
                .get_mut(table)
                .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
            rows.truncate(1);
            rows.extend_from_slice(new_rows);
            Ok(())
        })
    }

    async fn read_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        self.with_tables(|tables| {
            let rows = tables
                .get(table)
                .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
            Ok(rows.iter().skip(1).cloned().collect())
        })
    }
}
