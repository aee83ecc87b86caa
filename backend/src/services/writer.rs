use crate::error::StoreError;
use crate::models::{Cell, Row};
use crate::services::schema::{SheetCatalog, WriteMode};
use crate::services::store::DestinationStore;
use log::{error, info};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteOutcome {
    pub table: String,
    pub intended: usize,
    pub committed: usize,
    pub error: Option<String>,
}

impl WriteOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    fn failed(table: &str, intended: usize, err: StoreError) -> Self {
        WriteOutcome {
            table: table.to_string(),
            intended,
            committed: 0,
            error: Some(err.to_string()),
        }
    }
}

pub struct UpsertWriter<'a> {
    store: &'a dyn DestinationStore,
    catalog: &'a SheetCatalog,
}

impl<'a> UpsertWriter<'a> {
    pub fn new(store: &'a dyn DestinationStore, catalog: &'a SheetCatalog) -> Self {
        UpsertWriter { store, catalog }
    }

    /// Writes rows with the table's declared semantics in a single store call,
    /// so a failure commits nothing.
    pub async fn write(&self, table: &str, rows: Vec<Row>) -> WriteOutcome {
        let intended = rows.len();

        let Some(schema) = self.catalog.get(table) else {
            return WriteOutcome::failed(table, intended, StoreError::UnknownTable(table.to_string()));
        };

        let width = schema.headers.len();
        let mut padded = Vec::with_capacity(rows.len());
        for (idx, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                let err = StoreError::Rejected {
                    table: table.to_string(),
                    reason: format!("row {idx} has {} cells, header has {width}", row.len()),
                };
                error!("Refusing write to '{table}': {err}");
                return WriteOutcome::failed(table, intended, err);
            }
            row.resize(width, Cell::Empty);
            padded.push(row);
        }

        let result = match schema.mode {
            WriteMode::Append if padded.is_empty() => Ok(()),
            WriteMode::Append => self.store.append_rows(table, &padded).await,
            WriteMode::ReplaceAll if padded.is_empty() => self.store.clear_rows(table).await,
            WriteMode::ReplaceAll => self.store.replace_rows(table, &padded).await,
        };

        match result {
            Ok(()) => {
                info!("Wrote {intended} rows to '{table}' ({:?})", schema.mode);
                WriteOutcome {
                    table: table.to_string(),
                    intended,
                    committed: intended,
                    error: None,
                }
            }
            Err(e) => {
                error!("Failed to write {intended} rows to '{table}': {e}");
                WriteOutcome::failed(table, intended, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::schema::{SchemaManager, DAILY_METRICS, VIDEO_TAXONOMY};
    use crate::services::store::InMemoryStore;
    use pretty_assertions::assert_eq;

    fn row(tag: &str) -> Row {
        vec![Cell::text(tag)]
    }

    async fn prepared(catalog: &SheetCatalog) -> InMemoryStore {
        let store = InMemoryStore::new();
        let manager = SchemaManager::new(&store);
        for table in &catalog.tables {
            manager.ensure_table(table).await.unwrap();
        }
        store
    }

    fn first_cells(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r[0].to_string()).collect()
    }

    #[tokio::test]
    async fn replace_all_keeps_only_the_latest_rows() {
        let catalog = SheetCatalog::default();
        let store = prepared(&catalog).await;
        let writer = UpsertWriter::new(&store, &catalog);

        assert!(writer.write(VIDEO_TAXONOMY, vec![row("A"), row("B")]).await.success());
        assert!(writer.write(VIDEO_TAXONOMY, vec![row("C")]).await.success());

        let rows = store.read_rows(VIDEO_TAXONOMY).await.unwrap();
        assert_eq!(first_cells(&rows), vec!["C".to_string()]);
        // header untouched
        assert_eq!(
            store.read_header(VIDEO_TAXONOMY).await.unwrap().unwrap(),
            catalog.get(VIDEO_TAXONOMY).unwrap().headers
        );
    }

    #[tokio::test]
    async fn append_only_keeps_duplicates() {
        let catalog = SheetCatalog::default();
        let store = prepared(&catalog).await;
        let writer = UpsertWriter::new(&store, &catalog);

        assert!(writer.write(DAILY_METRICS, vec![row("X")]).await.success());
        assert!(writer.write(DAILY_METRICS, vec![row("X")]).await.success());

        let rows = store.read_rows(DAILY_METRICS).await.unwrap();
        assert_eq!(first_cells(&rows), vec!["X".to_string(), "X".to_string()]);
    }

    #[tokio::test]
    async fn short_rows_are_padded_to_the_header() {
        let catalog = SheetCatalog::default();
        let store = prepared(&catalog).await;
        let writer = UpsertWriter::new(&store, &catalog);

        writer.write(VIDEO_TAXONOMY, vec![row("A")]).await;

        let rows = store.read_rows(VIDEO_TAXONOMY).await.unwrap();
        assert_eq!(rows[0].len(), catalog.get(VIDEO_TAXONOMY).unwrap().headers.len());
        assert_eq!(rows[0][1], Cell::Empty);
    }

    #[tokio::test]
    async fn empty_replace_clears_data_rows() {
        let catalog = SheetCatalog::default();
        let store = prepared(&catalog).await;
        let writer = UpsertWriter::new(&store, &catalog);

        writer.write(VIDEO_TAXONOMY, vec![row("A")]).await;
        let outcome = writer.write(VIDEO_TAXONOMY, vec![]).await;

        assert!(outcome.success());
        assert!(store.read_rows(VIDEO_TAXONOMY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_write_leaves_the_table_as_it_was() {
        let catalog = SheetCatalog::default();
        let store = prepared(&catalog).await;
        let writer = UpsertWriter::new(&store, &catalog);
        writer.write(VIDEO_TAXONOMY, vec![row("A"), row("B")]).await;
        let before = store.raw(VIDEO_TAXONOMY).unwrap();

        store.set_fail_writes(true);
        let outcome = writer.write(VIDEO_TAXONOMY, vec![row("C")]).await;

        assert!(!outcome.success());
        assert_eq!(outcome.intended, 1);
        assert_eq!(outcome.committed, 0);
        assert_eq!(store.raw(VIDEO_TAXONOMY).unwrap(), before);
    }

    #[tokio::test]
    async fn oversized_rows_and_unknown_tables_are_rejected() {
        let catalog = SheetCatalog::default();
        let store = prepared(&catalog).await;
        let writer = UpsertWriter::new(&store, &catalog);

        let too_wide = vec![Cell::Empty; 50];
        let outcome = writer.write(DAILY_METRICS, vec![row("ok"), too_wide]).await;
        assert!(!outcome.success());
        assert!(store.read_rows(DAILY_METRICS).await.unwrap().is_empty());

        let outcome = writer.write("Unknown", vec![row("A")]).await;
        assert!(!outcome.success());
        assert_eq!(outcome.committed, 0);
    }
}
